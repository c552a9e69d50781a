//! Built-in calculators, one module per entity type. `register_builtins`
//! is the composition root that wires all of them into a fresh registry.

pub mod employee;
pub mod equipment;
pub mod facility;
pub mod grant;
pub mod investment;
pub mod project;
pub mod sale;
pub mod service;
pub mod software;

use crate::entity::EntityKind;
use crate::error::Result;
use crate::registry::{CalculatorEntry, CalculatorRegistry};

pub fn register_builtins() -> Result<CalculatorRegistry> {
    let mut registry = CalculatorRegistry::new();

    // The employee calculators below are feeders into `total_cost_calc`'s
    // roll-up, so only `total_cost_calc` itself contributes to
    // `employee_costs` (§4.4) — summing the feeders too would double-count
    // them on top of the total that already contains them. `calculate_all`
    // still reports every feeder's own value for introspection; it's just
    // excluded from the category-total sum. `equity_vesting_calc` returns a
    // share count, not a dollar figure, so it never contributes either.
    registry.register(CalculatorEntry {
        name: "salary_calc",
        entity_type: EntityKind::Employee,
        dependencies: vec![],
        description: "base monthly salary",
        func: employee::salary_calc,
        contributes_to_total: false,
    })?;
    registry.register(CalculatorEntry {
        name: "overhead_calc",
        entity_type: EntityKind::Employee,
        dependencies: vec!["salary_calc"],
        description: "employer overhead on top of salary",
        func: employee::overhead_calc,
        contributes_to_total: false,
    })?;
    registry.register(CalculatorEntry {
        name: "allowances_calc",
        entity_type: EntityKind::Employee,
        dependencies: vec![],
        description: "monthly allowances and amortized annual budgets",
        func: employee::allowances_calc,
        contributes_to_total: false,
    })?;
    registry.register(CalculatorEntry {
        name: "equity_vesting_calc",
        entity_type: EntityKind::Employee,
        dependencies: vec![],
        description: "equity shares vesting this month (share count, not dollars)",
        func: employee::equity_vesting_calc,
        contributes_to_total: false,
    })?;
    registry.register(CalculatorEntry {
        name: "signing_bonus_calc",
        entity_type: EntityKind::Employee,
        dependencies: vec![],
        description: "signing bonus paid in the start month",
        func: employee::signing_bonus_calc,
        contributes_to_total: false,
    })?;
    registry.register(CalculatorEntry {
        name: "total_cost_calc",
        entity_type: EntityKind::Employee,
        dependencies: vec!["salary_calc", "overhead_calc", "allowances_calc", "signing_bonus_calc"],
        description: "total cash cost of the employee this month",
        func: employee::total_cost_calc,
        contributes_to_total: true,
    })?;

    registry.register(CalculatorEntry {
        name: "disbursement_calc",
        entity_type: EntityKind::Grant,
        dependencies: vec![],
        description: "scheduled or evenly-split grant disbursement",
        func: grant::disbursement_calc,
        contributes_to_total: true,
    })?;
    registry.register(CalculatorEntry {
        name: "milestone_calc",
        entity_type: EntityKind::Grant,
        dependencies: vec![],
        description: "milestone-triggered grant revenue",
        func: grant::milestone_calc,
        contributes_to_total: true,
    })?;

    registry.register(CalculatorEntry {
        name: "disbursement_calc",
        entity_type: EntityKind::Investment,
        dependencies: vec![],
        description: "tranche or lump-sum investment disbursement",
        func: investment::disbursement_calc,
        contributes_to_total: true,
    })?;

    registry.register(CalculatorEntry {
        name: "revenue_calc",
        entity_type: EntityKind::Sale,
        dependencies: vec![],
        description: "scheduled or delivery-date sale revenue",
        func: sale::revenue_calc,
        contributes_to_total: true,
    })?;

    registry.register(CalculatorEntry {
        name: "recurring_calc",
        entity_type: EntityKind::Service,
        dependencies: vec![],
        description: "recurring monthly service revenue",
        func: service::recurring_calc,
        contributes_to_total: true,
    })?;

    registry.register(CalculatorEntry {
        name: "recurring_calc",
        entity_type: EntityKind::Facility,
        dependencies: vec![],
        description: "recurring facility costs including amortized extras",
        func: facility::recurring_calc,
        contributes_to_total: true,
    })?;

    registry.register(CalculatorEntry {
        name: "recurring_calc",
        entity_type: EntityKind::Software,
        dependencies: vec![],
        description: "recurring software subscription and license maintenance",
        func: software::recurring_calc,
        contributes_to_total: true,
    })?;

    registry.register(CalculatorEntry {
        name: "one_time_calc",
        entity_type: EntityKind::Equipment,
        dependencies: vec![],
        description: "one-time purchase cost in the purchase month",
        func: equipment::one_time_calc,
        contributes_to_total: true,
    })?;
    registry.register(CalculatorEntry {
        name: "depreciation_calc",
        entity_type: EntityKind::Equipment,
        dependencies: vec![],
        description: "monthly depreciation under the selected method",
        func: equipment::depreciation_calc,
        contributes_to_total: true,
    })?;
    registry.register(CalculatorEntry {
        name: "maintenance_calc",
        entity_type: EntityKind::Equipment,
        dependencies: vec![],
        description: "equipment maintenance cost",
        func: equipment::maintenance_calc,
        contributes_to_total: true,
    })?;

    registry.register(CalculatorEntry {
        name: "burn_calc",
        entity_type: EntityKind::Project,
        dependencies: vec![],
        description: "project budget burn across milestones or the planned window",
        func: project::burn_calc,
        contributes_to_total: true,
    })?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_entity_kind_has_at_least_one_calculator() {
        let registry = register_builtins().unwrap();
        for kind in EntityKind::ALL {
            assert!(
                !registry.calculators_for(kind).is_empty(),
                "no calculators registered for {:?}",
                kind
            );
        }
    }
}
