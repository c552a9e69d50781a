//! The calculator registry: a process-wide table of `(entity_type,
//! calc_name) -> {fn, dependencies, description}`, topologically sorted at
//! registration time so dispatch never re-sorts per call.

use crate::entity::{Entity, EntityKind};
use crate::error::{CashCowError, Result};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap, VecDeque};

/// `as_of_date`, `scenario`, and the open `params` bag every calculator
/// invocation sees. Immutable and cheap to clone across threads/tasks.
#[derive(Debug, Clone)]
pub struct CalculationContext {
    pub as_of_date: NaiveDate,
    pub scenario: String,
    pub include_projections: bool,
    pub params: BTreeMap<String, serde_json::Value>,
}

impl CalculationContext {
    pub fn new(as_of_date: NaiveDate, scenario: impl Into<String>) -> Self {
        CalculationContext {
            as_of_date,
            scenario: scenario.into(),
            include_projections: true,
            params: BTreeMap::new(),
        }
    }
}

/// `(entity, ctx) -> Option<f64>`. `None` means "not applicable" (inactive
/// entity, missing prerequisite field) and is never a fault.
pub type Calculator = fn(&Entity, &CalculationContext) -> Option<f64>;

#[derive(Clone)]
pub struct CalculatorEntry {
    pub name: &'static str,
    pub entity_type: EntityKind,
    pub dependencies: Vec<&'static str>,
    pub description: &'static str,
    pub func: Calculator,
    /// Whether this calculator's value belongs in the entity's category
    /// total (§4.4's per-period sum into `employee_costs`/etc). Feeder
    /// calculators that another calculator already rolls up (e.g.
    /// `salary_calc`/`overhead_calc` underneath `total_cost_calc`) must set
    /// this `false`, or the roll-up and its own components get summed
    /// twice. Non-dollar calculators (`equity_vesting_calc`, which returns a
    /// share count) must also set this `false`.
    pub contributes_to_total: bool,
}

/// Introspection view of a registered calculator (§11's supplement:
/// enumerate what's registered the way a chart of accounts enumerates its
/// entries, but over calculators instead of ledger accounts).
#[derive(Debug, Clone)]
pub struct CalculatorInfo {
    pub name: &'static str,
    pub dependencies: Vec<&'static str>,
    pub description: &'static str,
    pub contributes_to_total: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct Key(EntityKind, &'static str);

pub struct CalculatorRegistry {
    entries: HashMap<Key, CalculatorEntry>,
    /// Per entity type, calculator names in dependency order. Rebuilt
    /// whenever registration changes the entry set.
    order: HashMap<EntityKind, Vec<&'static str>>,
}

impl CalculatorRegistry {
    pub fn new() -> Self {
        CalculatorRegistry {
            entries: HashMap::new(),
            order: HashMap::new(),
        }
    }

    /// Registers one calculator. Re-registration under the same key
    /// replaces the existing entry (idempotent registration, intended only
    /// for use at initialization). Re-sorts that entity type's dependency
    /// order and rejects the registration if it introduces a cycle.
    pub fn register(&mut self, entry: CalculatorEntry) -> Result<()> {
        let key = Key(entry.entity_type, entry.name);
        let entity_type = entry.entity_type;
        self.entries.insert(key, entry);
        self.resort(entity_type)
    }

    fn resort(&mut self, entity_type: EntityKind) -> Result<()> {
        let names: Vec<&'static str> = self
            .entries
            .keys()
            .filter(|k| k.0 == entity_type)
            .map(|k| k.1)
            .collect();

        let mut in_degree: HashMap<&'static str, usize> = names.iter().map(|n| (*n, 0)).collect();
        let mut dependents: HashMap<&'static str, Vec<&'static str>> =
            names.iter().map(|n| (*n, Vec::new())).collect();

        for name in &names {
            let entry = &self.entries[&Key(entity_type, name)];
            for dep in &entry.dependencies {
                if !names.contains(dep) {
                    log::warn!(
                        "calculator '{}' for entity type '{}' depends on unregistered calculator '{}'",
                        name,
                        entity_type.as_str(),
                        dep
                    );
                    continue;
                }
                *in_degree.get_mut(name).unwrap() += 1;
                dependents.get_mut(dep).unwrap().push(name);
            }
        }

        let mut queue: VecDeque<&'static str> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(n, _)| *n)
            .collect();
        let mut sorted_names: Vec<&'static str> = Vec::new();

        // stable order among ties, matching registration order
        let mut ordered_queue: Vec<&'static str> = names
            .iter()
            .filter(|n| queue.contains(n))
            .copied()
            .collect();
        queue.clear();
        queue.extend(ordered_queue.drain(..));

        while let Some(name) = queue.pop_front() {
            sorted_names.push(name);
            for dependent in dependents.get(name).cloned().unwrap_or_default() {
                let deg = in_degree.get_mut(dependent).unwrap();
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if sorted_names.len() != names.len() {
            let cycle: Vec<&str> = names
                .into_iter()
                .filter(|n| !sorted_names.contains(n))
                .collect();
            return Err(CashCowError::CyclicDependency {
                entity_type: entity_type.as_str().to_string(),
                cycle: cycle.join(", "),
            });
        }

        self.order.insert(entity_type, sorted_names);
        Ok(())
    }

    pub fn get(&self, entity_type: EntityKind, calc_name: &str) -> Option<&CalculatorEntry> {
        self.entries.get(&Key(entity_type, calc_name))
    }

    /// All calculators registered for `entity_type`, in topological order.
    pub fn calculators_for(&self, entity_type: EntityKind) -> Vec<CalculatorInfo> {
        self.order
            .get(&entity_type)
            .map(|names| {
                names
                    .iter()
                    .map(|name| {
                        let entry = &self.entries[&Key(entity_type, name)];
                        CalculatorInfo {
                            name: entry.name,
                            dependencies: entry.dependencies.clone(),
                            description: entry.description,
                            contributes_to_total: entry.contributes_to_total,
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Runs a single named calculator. Returns `Ok(None)` when the entity
    /// is inactive or the calculator judges itself inapplicable.
    pub fn calculate(
        &self,
        entity: &Entity,
        calc_name: &str,
        ctx: &CalculationContext,
    ) -> Result<Option<f64>> {
        let entry = self.get(entity.kind(), calc_name).ok_or_else(|| CashCowError::UnknownCalculator {
            entity_type: entity.kind().as_str().to_string(),
            calc_name: calc_name.to_string(),
        })?;

        if !entity.is_active(ctx.as_of_date) {
            return Ok(None);
        }

        Ok((entry.func)(entity, ctx))
    }

    /// Runs every calculator registered for `entity`'s type, in dependency
    /// order. A panic inside one calculator is not caught here — callers
    /// that need to isolate a faulty calculator should wrap `func` calls
    /// with `std::panic::catch_unwind`; in practice calculators are total
    /// functions over `Option<f64>` and never panic.
    pub fn calculate_all(&self, entity: &Entity, ctx: &CalculationContext) -> BTreeMap<String, f64> {
        let mut results = BTreeMap::new();
        if !entity.is_active(ctx.as_of_date) {
            return results;
        }

        for info in self.calculators_for(entity.kind()) {
            let entry = &self.entries[&Key(entity.kind(), info.name)];
            match (entry.func)(entity, ctx) {
                Some(value) => {
                    results.insert(info.name.to_string(), value);
                }
                None => {
                    log::trace!(
                        "calculator '{}' produced no value for entity '{}' at {}",
                        info.name,
                        entity.name(),
                        ctx.as_of_date
                    );
                }
            }
        }

        results
    }

    /// Sums only the calculators marked `contributes_to_total` for
    /// `entity`'s type — the figure the engine aggregates into a category
    /// total (§4.4). Feeder calculators already rolled up into a
    /// `total_*_calc` (and non-dollar calculators like equity vesting) are
    /// excluded so their values aren't counted twice; use `calculate_all`
    /// or `calculate` to inspect individual components.
    pub fn calculate_total(&self, entity: &Entity, ctx: &CalculationContext) -> f64 {
        if !entity.is_active(ctx.as_of_date) {
            return 0.0;
        }

        self.calculators_for(entity.kind())
            .iter()
            .filter(|info| info.contributes_to_total)
            .filter_map(|info| {
                let entry = &self.entries[&Key(entity.kind(), info.name)];
                (entry.func)(entity, ctx)
            })
            .sum()
    }
}

impl Default for CalculatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Employee, EntityHeader};
    use std::collections::BTreeSet;

    fn salary_calc(entity: &Entity, _ctx: &CalculationContext) -> Option<f64> {
        match entity {
            Entity::Employee(e) => Some(e.salary / 12.0),
            _ => None,
        }
    }

    fn overhead_calc(entity: &Entity, ctx: &CalculationContext) -> Option<f64> {
        match entity {
            Entity::Employee(e) => {
                let salary_monthly = salary_calc(entity, ctx)?;
                Some(salary_monthly * (e.overhead_multiplier - 1.0))
            }
            _ => None,
        }
    }

    fn sample_employee() -> Entity {
        Entity::Employee(Employee {
            header: EntityHeader {
                name: "Alice".to_string(),
                start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end_date: None,
                tags: BTreeSet::new(),
                notes: None,
            },
            salary: 120_000.0,
            overhead_multiplier: 1.3,
            pay_frequency: None,
            monthly_allowances: BTreeMap::new(),
            annual_budgets: BTreeMap::new(),
            equity_shares: 0.0,
            vesting_cliff_months: 0,
            vesting_months: 0,
            signing_bonus: 0.0,
            extra: BTreeMap::new(),
        })
    }

    #[test]
    fn registers_and_topologically_orders_dependents_after_dependencies() {
        let mut registry = CalculatorRegistry::new();
        registry
            .register(CalculatorEntry {
                name: "overhead_calc",
                entity_type: EntityKind::Employee,
                dependencies: vec!["salary_calc"],
                description: "overhead on top of salary",
                func: overhead_calc,
                contributes_to_total: true,
            })
            .unwrap();
        registry
            .register(CalculatorEntry {
                name: "salary_calc",
                entity_type: EntityKind::Employee,
                dependencies: vec![],
                description: "monthly salary",
                func: salary_calc,
                contributes_to_total: true,
            })
            .unwrap();

        let order = registry.calculators_for(EntityKind::Employee);
        let names: Vec<&str> = order.iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["salary_calc", "overhead_calc"]);
    }

    #[test]
    fn rejects_cyclic_dependencies() {
        let mut registry = CalculatorRegistry::new();
        registry
            .register(CalculatorEntry {
                name: "a",
                entity_type: EntityKind::Employee,
                dependencies: vec!["b"],
                description: "",
                func: salary_calc,
                contributes_to_total: true,
            })
            .unwrap();
        let result = registry.register(CalculatorEntry {
            name: "b",
            entity_type: EntityKind::Employee,
            dependencies: vec!["a"],
            description: "",
            func: salary_calc,
            contributes_to_total: true,
        });
        assert!(matches!(result, Err(CashCowError::CyclicDependency { .. })));
    }

    #[test]
    fn calculate_all_returns_none_for_inactive_entity() {
        let mut registry = CalculatorRegistry::new();
        registry
            .register(CalculatorEntry {
                name: "salary_calc",
                entity_type: EntityKind::Employee,
                dependencies: vec![],
                description: "",
                func: salary_calc,
                contributes_to_total: true,
            })
            .unwrap();
        let entity = sample_employee();
        let ctx = CalculationContext::new(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), "baseline");
        let results = registry.calculate_all(&entity, &ctx);
        assert!(results.is_empty());
    }

    #[test]
    fn calculate_unknown_calculator_is_an_error() {
        let registry = CalculatorRegistry::new();
        let entity = sample_employee();
        let ctx = CalculationContext::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), "baseline");
        let result = registry.calculate(&entity, "does_not_exist", &ctx);
        assert!(matches!(result, Err(CashCowError::UnknownCalculator { .. })));
    }
}
