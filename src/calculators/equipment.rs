//! One-time purchase cost, depreciation (three methods), and maintenance
//! for the `equipment` entity type (§4.3).

use crate::entity::{DepreciationMethod, Entity};
use crate::registry::CalculationContext;
use crate::utils::{month_start, months_between};

fn as_equipment<'a>(entity: &'a Entity) -> Option<&'a crate::entity::Equipment> {
    match entity {
        Entity::Equipment(e) => Some(e),
        _ => None,
    }
}

pub fn one_time_calc(entity: &Entity, ctx: &CalculationContext) -> Option<f64> {
    let e = as_equipment(entity)?;
    if month_start(e.purchase_date) == month_start(ctx.as_of_date) {
        Some(e.cost)
    } else {
        Some(0.0)
    }
}

/// Monthly depreciation for the selected method, zero outside the
/// depreciation window `[purchase_date, purchase_date + depreciation_years)`.
pub fn depreciation_calc(entity: &Entity, ctx: &CalculationContext) -> Option<f64> {
    let e = as_equipment(entity)?;
    if e.depreciation_years <= 0.0 {
        return None;
    }

    let total_months = (e.depreciation_years * 12.0).round() as i64;
    if total_months <= 0 {
        return None;
    }

    let elapsed = months_between(month_start(e.purchase_date), month_start(ctx.as_of_date));
    if elapsed < 0 || elapsed >= total_months {
        return Some(0.0);
    }

    let depreciable_base = e.cost - e.residual_value;
    if depreciable_base <= 0.0 {
        return Some(0.0);
    }

    let monthly = match e.depreciation_method {
        DepreciationMethod::StraightLine => depreciable_base / total_months as f64,
        DepreciationMethod::DecliningBalance => {
            // double-declining balance against the remaining book value
            let rate = 2.0 / total_months as f64;
            let mut book_value = e.cost;
            for _ in 0..elapsed {
                book_value -= (book_value - e.residual_value).max(0.0) * rate;
            }
            ((book_value - e.residual_value).max(0.0) * rate).min(book_value - e.residual_value)
        }
        DepreciationMethod::SumOfYears => {
            let years = e.depreciation_years.ceil() as i64;
            let sum_of_years = years * (years + 1) / 2;
            let elapsed_years = elapsed / 12;
            let year_fraction = (years - elapsed_years) as f64 / sum_of_years as f64;
            depreciable_base * year_fraction / 12.0
        }
    };

    Some(monthly.max(0.0))
}

pub fn maintenance_calc(entity: &Entity, _ctx: &CalculationContext) -> Option<f64> {
    let e = as_equipment(entity)?;
    if e.maintenance_cost_annual > 0.0 {
        Some(e.maintenance_cost_annual / 12.0)
    } else if e.maintenance_percentage > 0.0 {
        Some(e.cost * e.maintenance_percentage / 12.0)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Equipment, EntityHeader};
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    fn equipment(method: DepreciationMethod) -> Entity {
        Entity::Equipment(Equipment {
            header: EntityHeader {
                name: "Server Rack".to_string(),
                start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end_date: None,
                tags: BTreeSet::new(),
                notes: None,
            },
            cost: 12_000.0,
            purchase_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            residual_value: 0.0,
            depreciation_years: 1.0,
            depreciation_method: method,
            maintenance_cost_annual: 0.0,
            maintenance_percentage: 0.0,
            extra: Default::default(),
        })
    }

    #[test]
    fn straight_line_depreciates_evenly_within_window() {
        let e = equipment(DepreciationMethod::StraightLine);
        let ctx = CalculationContext::new(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(), "baseline");
        assert!((depreciation_calc(&e, &ctx).unwrap() - 1_000.0).abs() < 1e-9);

        let outside = CalculationContext::new(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(), "baseline");
        assert_eq!(depreciation_calc(&e, &outside), Some(0.0));
    }

    #[test]
    fn one_time_cost_only_in_purchase_month() {
        let e = equipment(DepreciationMethod::StraightLine);
        let purchase_month = CalculationContext::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), "baseline");
        assert_eq!(one_time_calc(&e, &purchase_month), Some(12_000.0));
        let later = CalculationContext::new(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(), "baseline");
        assert_eq!(one_time_calc(&e, &later), Some(0.0));
    }
}
