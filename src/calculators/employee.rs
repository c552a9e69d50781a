//! Salary, overhead, allowances, equity vesting, and signing bonus for the
//! `employee` entity type (§4.3).

use crate::entity::Entity;
use crate::registry::CalculationContext;
use crate::utils::months_between;

fn as_employee<'a>(entity: &'a Entity) -> Option<&'a crate::entity::Employee> {
    match entity {
        Entity::Employee(e) => Some(e),
        _ => None,
    }
}

pub fn salary_calc(entity: &Entity, _ctx: &CalculationContext) -> Option<f64> {
    let e = as_employee(entity)?;
    Some(e.salary / 12.0)
}

pub fn overhead_calc(entity: &Entity, ctx: &CalculationContext) -> Option<f64> {
    let e = as_employee(entity)?;
    let salary_monthly = salary_calc(entity, ctx)?;
    Some(salary_monthly * (e.overhead_multiplier - 1.0))
}

pub fn allowances_calc(entity: &Entity, _ctx: &CalculationContext) -> Option<f64> {
    let e = as_employee(entity)?;
    let monthly: f64 = e.monthly_allowances.values().sum();
    let annualized: f64 = e.annual_budgets.values().map(|v| v / 12.0).sum();
    Some(monthly + annualized)
}

/// Fraction of `equity_shares` vesting this month: zero before the cliff,
/// then `1/vesting_months` per month until fully vested.
pub fn equity_vesting_calc(entity: &Entity, ctx: &CalculationContext) -> Option<f64> {
    let e = as_employee(entity)?;
    if e.equity_shares <= 0.0 || e.vesting_months == 0 {
        return None;
    }

    let elapsed = months_between(e.header.start_date, ctx.as_of_date);
    if elapsed < e.vesting_cliff_months as i64 || elapsed >= e.vesting_months as i64 {
        return Some(0.0);
    }

    Some(e.equity_shares / e.vesting_months as f64)
}

pub fn signing_bonus_calc(entity: &Entity, ctx: &CalculationContext) -> Option<f64> {
    let e = as_employee(entity)?;
    if e.signing_bonus <= 0.0 {
        return None;
    }
    if crate::utils::month_start(ctx.as_of_date) == crate::utils::month_start(e.header.start_date) {
        Some(e.signing_bonus)
    } else {
        Some(0.0)
    }
}

/// Sum of every cash-impacting component: salary, overhead, allowances,
/// and signing bonus. Equity vesting is non-cash and excluded.
pub fn total_cost_calc(entity: &Entity, ctx: &CalculationContext) -> Option<f64> {
    as_employee(entity)?;
    let salary = salary_calc(entity, ctx).unwrap_or(0.0);
    let overhead = overhead_calc(entity, ctx).unwrap_or(0.0);
    let allowances = allowances_calc(entity, ctx).unwrap_or(0.0);
    let bonus = signing_bonus_calc(entity, ctx).unwrap_or(0.0);
    Some(salary + overhead + allowances + bonus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Employee, EntityHeader};
    use chrono::NaiveDate;
    use std::collections::{BTreeMap, BTreeSet};

    fn employee(salary: f64, overhead: f64) -> Entity {
        Entity::Employee(Employee {
            header: EntityHeader {
                name: "Alice".to_string(),
                start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end_date: None,
                tags: BTreeSet::new(),
                notes: None,
            },
            salary,
            overhead_multiplier: overhead,
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
    fn total_cost_matches_e1_scenario() {
        let e = employee(120_000.0, 1.3);
        let ctx = CalculationContext::new(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(), "baseline");
        assert!((total_cost_calc(&e, &ctx).unwrap() - 13_000.0).abs() < 1e-9);
    }

    #[test]
    fn equity_vesting_is_zero_before_cliff_and_linear_after() {
        let mut e = employee(100_000.0, 1.0);
        if let Entity::Employee(ref mut emp) = e {
            emp.equity_shares = 1200.0;
            emp.vesting_cliff_months = 12;
            emp.vesting_months = 48;
        }
        let before_cliff = CalculationContext::new(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(), "baseline");
        assert_eq!(equity_vesting_calc(&e, &before_cliff), Some(0.0));

        let after_cliff = CalculationContext::new(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(), "baseline");
        let value = equity_vesting_calc(&e, &after_cliff).unwrap();
        assert!((value - 25.0).abs() < 1e-9);
    }

    #[test]
    fn signing_bonus_only_in_start_month() {
        let mut e = employee(100_000.0, 1.0);
        if let Entity::Employee(ref mut emp) = e {
            emp.signing_bonus = 5_000.0;
        }
        let start_month = CalculationContext::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), "baseline");
        assert_eq!(signing_bonus_calc(&e, &start_month), Some(5_000.0));

        let later = CalculationContext::new(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(), "baseline");
        assert_eq!(signing_bonus_calc(&e, &later), Some(0.0));
    }
}
