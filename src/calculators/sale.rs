//! Sale revenue: scheduled payments, else the full amount at delivery
//! (or start) (§4.3).

use crate::entity::Entity;
use crate::registry::CalculationContext;
use crate::utils::month_start;

fn as_sale<'a>(entity: &'a Entity) -> Option<&'a crate::entity::Sale> {
    match entity {
        Entity::Sale(s) => Some(s),
        _ => None,
    }
}

pub fn revenue_calc(entity: &Entity, ctx: &CalculationContext) -> Option<f64> {
    let s = as_sale(entity)?;
    let period = month_start(ctx.as_of_date);

    if !s.payment_schedule.is_empty() {
        let sum: f64 = s
            .payment_schedule
            .iter()
            .filter(|item| month_start(item.date) == period)
            .map(|item| item.value())
            .sum();
        return Some(sum);
    }

    let recognition_month = s.delivery_date.unwrap_or(s.header.start_date);
    if month_start(recognition_month) == period {
        Some(s.amount)
    } else {
        Some(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityHeader, Sale};
    use chrono::NaiveDate;
    use std::collections::{BTreeMap, BTreeSet};

    #[test]
    fn revenue_recognized_in_delivery_month() {
        let s = Entity::Sale(Sale {
            header: EntityHeader {
                name: "BigDeal".to_string(),
                start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end_date: None,
                tags: BTreeSet::new(),
                notes: None,
            },
            amount: 1_000_000.0,
            payment_schedule: vec![],
            delivery_date: Some(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()),
            extra: BTreeMap::new(),
        });

        for m in 1..=12 {
            let ctx = CalculationContext::new(NaiveDate::from_ymd_opt(2024, m, 1).unwrap(), "baseline");
            let value = revenue_calc(&s, &ctx).unwrap();
            if m == 6 {
                assert_eq!(value, 1_000_000.0);
            } else {
                assert_eq!(value, 0.0);
            }
        }
    }
}
