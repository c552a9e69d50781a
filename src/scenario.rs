//! Named transformations over the entity set and calculation context.
//! Each scenario filters entities by name/tag, then rewrites a *copy* of
//! each surviving entity through an ordered list of override rules. The
//! source entity set, as returned by the store, is never mutated.

use crate::entity::{Entity, EntityKind, EntityStore};
use crate::error::{CashCowError, Result};
use crate::registry::CalculationContext;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

/// `include_patterns`/`exclude_patterns` are name globs (`*` wildcard
/// only); `include_tags`/`exclude_tags` match against an entity's tag set.
#[derive(Debug, Clone, Default)]
pub struct EntityFilters {
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub include_tags: Vec<String>,
    pub exclude_tags: Vec<String>,
}

impl EntityFilters {
    fn matches(&self, entity: &Entity) -> bool {
        if !self.include_patterns.is_empty()
            && !self.include_patterns.iter().any(|p| glob_match(p, entity.name()))
        {
            return false;
        }
        if self.exclude_patterns.iter().any(|p| glob_match(p, entity.name())) {
            return false;
        }
        if !self.include_tags.is_empty()
            && !self.include_tags.iter().any(|t| entity.tags().contains(t))
        {
            return false;
        }
        if self.exclude_tags.iter().any(|t| entity.tags().contains(t)) {
            return false;
        }
        true
    }
}

/// Minimal `*`-wildcard matcher. Only `*` is special; every other
/// character matches literally. Good enough for name patterns like
/// `"eng-*"` without pulling in a glob crate for a one-operator language.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn helper(pattern: &[u8], text: &[u8]) -> bool {
        match pattern.first() {
            None => text.is_empty(),
            Some(b'*') => {
                helper(&pattern[1..], text) || (!text.is_empty() && helper(pattern, &text[1..]))
            }
            Some(c) => text.first() == Some(c) && helper(&pattern[1..], &text[1..]),
        }
    }
    helper(pattern.as_bytes(), text.as_bytes())
}

#[derive(Debug, Clone)]
pub enum OverrideAction {
    Set(serde_json::Value),
    Multiply(f64),
    /// Shifts a date field forward by this many calendar months, e.g.
    /// delaying an employee's `start_date` to model slower hiring.
    ShiftMonths(u32),
}

/// Selects entities by type, name glob, or an exact name, then applies
/// `action` to the selected field. `entity` (an exact name) takes
/// precedence over `name_pattern` when both are given — see §9.
#[derive(Debug, Clone)]
pub struct OverrideRule {
    pub entity_type: Option<EntityKind>,
    pub name_pattern: Option<String>,
    pub entity: Option<String>,
    pub field: String,
    pub action: OverrideAction,
}

impl OverrideRule {
    fn selects(&self, candidate: &Entity) -> bool {
        if let Some(kind) = self.entity_type {
            if candidate.kind() != kind {
                return false;
            }
        }

        if self.entity.is_some() && self.name_pattern.is_some() {
            log::debug!(
                "override rule on field '{}' specifies both 'entity' and 'name_pattern'; \
                 the exact 'entity' selector takes precedence",
                self.field
            );
        }

        if let Some(exact) = &self.entity {
            return candidate.name() == exact;
        }
        if let Some(pattern) = &self.name_pattern {
            return glob_match(pattern, candidate.name());
        }
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scenario {
    pub name: String,
    pub description: String,
    pub assumptions: BTreeMap<String, serde_json::Value>,
    pub entity_filters: EntityFilters,
    pub entity_overrides: Vec<OverrideRule>,
}

impl Scenario {
    pub fn baseline() -> Self {
        Scenario {
            name: "baseline".to_string(),
            description: "Entity set and assumptions unchanged.".to_string(),
            ..Default::default()
        }
    }

    pub fn optimistic() -> Self {
        Scenario {
            name: "optimistic".to_string(),
            description: "Revenue runs hot, overhead is trimmed.".to_string(),
            entity_overrides: vec![
                OverrideRule {
                    entity_type: Some(EntityKind::Sale),
                    name_pattern: None,
                    entity: None,
                    field: "amount".to_string(),
                    action: OverrideAction::Multiply(1.25),
                },
                OverrideRule {
                    entity_type: Some(EntityKind::Employee),
                    name_pattern: None,
                    entity: None,
                    field: "overhead_multiplier".to_string(),
                    action: OverrideAction::Multiply(0.9),
                },
            ],
            ..Default::default()
        }
    }

    pub fn conservative() -> Self {
        Scenario {
            name: "conservative".to_string(),
            description: "Revenue runs cold, hiring is delayed.".to_string(),
            entity_overrides: vec![
                OverrideRule {
                    entity_type: Some(EntityKind::Sale),
                    name_pattern: None,
                    entity: None,
                    field: "amount".to_string(),
                    action: OverrideAction::Multiply(0.75),
                },
                OverrideRule {
                    entity_type: Some(EntityKind::Employee),
                    name_pattern: None,
                    entity: None,
                    field: "start_date".to_string(),
                    action: OverrideAction::ShiftMonths(2),
                },
            ],
            ..Default::default()
        }
    }

    pub fn cash_preservation() -> Self {
        Scenario {
            name: "cash_preservation".to_string(),
            description: "Aggressive expense cuts: discretionary spend filtered out, bonuses zeroed.".to_string(),
            entity_filters: EntityFilters {
                exclude_tags: vec!["discretionary".to_string()],
                ..Default::default()
            },
            entity_overrides: vec![OverrideRule {
                entity_type: Some(EntityKind::Employee),
                name_pattern: None,
                entity: None,
                field: "signing_bonus".to_string(),
                action: OverrideAction::Set(serde_json::json!(0.0)),
            }],
            ..Default::default()
        }
    }

    /// Filters then rewrites `source`, returning a new, independent
    /// `Vec<Entity>`. `source` itself is untouched.
    fn apply(&self, source: &[Entity]) -> Result<Vec<Entity>> {
        let mut result = Vec::new();

        for entity in source {
            if !self.entity_filters.matches(entity) {
                continue;
            }

            let mut current = entity.clone();
            for rule in &self.entity_overrides {
                if !rule.selects(&current) {
                    continue;
                }
                current = match &rule.action {
                    OverrideAction::Set(value) => current
                        .with_field(&rule.field, value.clone())
                        .map_err(CashCowError::Json)?,
                    OverrideAction::Multiply(multiplier) => current
                        .with_field_scaled(&rule.field, *multiplier)
                        .map_err(CashCowError::Json)?,
                    OverrideAction::ShiftMonths(months) => current
                        .with_field_shifted_months(&rule.field, *months)
                        .map_err(CashCowError::Json)?,
                };
            }
            result.push(current);
        }

        Ok(result)
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct EntitySetCacheKey {
    scenario: String,
    entity_set_version: u64,
}

/// Holds registered scenarios and caches their resolved entity sets by
/// scenario name, per §4.5.
pub struct ScenarioManager {
    store: Arc<dyn EntityStore>,
    scenarios: RwLock<HashMap<String, Scenario>>,
    entity_set_cache: RwLock<HashMap<EntitySetCacheKey, Vec<Entity>>>,
}

impl ScenarioManager {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        let mut scenarios = HashMap::new();
        for scenario in [
            Scenario::baseline(),
            Scenario::optimistic(),
            Scenario::conservative(),
            Scenario::cash_preservation(),
        ] {
            scenarios.insert(scenario.name.clone(), scenario);
        }

        ScenarioManager {
            store,
            scenarios: RwLock::new(scenarios),
            entity_set_cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, scenario: Scenario) {
        self.scenarios.write().unwrap().insert(scenario.name.clone(), scenario);
    }

    pub fn clear_cache(&self) {
        self.entity_set_cache.write().unwrap().clear();
    }

    /// Resolves a scenario's entity set, caching by `(scenario,
    /// entity_set_version)` so repeated calls avoid re-filtering.
    pub fn resolve(&self, scenario_name: &str) -> Result<(Vec<Entity>, u64)> {
        let version = self.store.version();
        let key = EntitySetCacheKey {
            scenario: scenario_name.to_string(),
            entity_set_version: version,
        };

        if let Some(cached) = self.entity_set_cache.read().unwrap().get(&key) {
            return Ok((cached.clone(), version));
        }

        let scenario = self
            .scenarios
            .read()
            .unwrap()
            .get(scenario_name)
            .cloned()
            .ok_or_else(|| CashCowError::ScenarioNotFound(scenario_name.to_string()))?;

        let source = self.store.load_all();
        let resolved = scenario.apply(&source)?;
        self.entity_set_cache.write().unwrap().insert(key, resolved.clone());

        Ok((resolved, version))
    }

    /// Builds the calculation context for a scenario: `params` seeded
    /// from its `assumptions`.
    pub fn context_for(&self, scenario_name: &str, as_of_date: NaiveDate) -> Result<CalculationContext> {
        let scenario = self
            .scenarios
            .read()
            .unwrap()
            .get(scenario_name)
            .cloned()
            .ok_or_else(|| CashCowError::ScenarioNotFound(scenario_name.to_string()))?;

        let mut ctx = CalculationContext::new(as_of_date, scenario_name);
        ctx.params = scenario.assumptions;
        Ok(ctx)
    }
}
