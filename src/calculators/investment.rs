//! Investment disbursement: tranche schedule or lump sum in the start
//! month (§4.3).

use crate::entity::Entity;
use crate::registry::CalculationContext;
use crate::utils::month_start;

fn as_investment<'a>(entity: &'a Entity) -> Option<&'a crate::entity::Investment> {
    match entity {
        Entity::Investment(i) => Some(i),
        _ => None,
    }
}

pub fn disbursement_calc(entity: &Entity, ctx: &CalculationContext) -> Option<f64> {
    let i = as_investment(entity)?;
    let period = month_start(ctx.as_of_date);

    if !i.disbursement_schedule.is_empty() {
        let sum: f64 = i
            .disbursement_schedule
            .iter()
            .filter(|item| month_start(item.date) == period)
            .map(|item| item.value())
            .sum();
        return Some(sum);
    }

    if month_start(i.header.start_date) == period {
        Some(i.amount)
    } else {
        Some(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityHeader, Investment};
    use chrono::NaiveDate;
    use std::collections::{BTreeMap, BTreeSet};

    #[test]
    fn lump_sum_in_start_month_when_no_schedule() {
        let i = Entity::Investment(Investment {
            header: EntityHeader {
                name: "Series A".to_string(),
                start_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                end_date: None,
                tags: BTreeSet::new(),
                notes: None,
            },
            amount: 2_000_000.0,
            disbursement_schedule: vec![],
            extra: BTreeMap::new(),
        });

        let in_month = CalculationContext::new(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), "baseline");
        assert_eq!(disbursement_calc(&i, &in_month), Some(2_000_000.0));

        let other_month = CalculationContext::new(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(), "baseline");
        assert_eq!(disbursement_calc(&i, &other_month), Some(0.0));
    }
}
