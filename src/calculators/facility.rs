//! Facility recurring costs: base rent plus utilities, insurance,
//! amortized maintenance, and certification renewals (§4.3).

use crate::entity::Entity;
use crate::registry::CalculationContext;

fn as_facility<'a>(entity: &'a Entity) -> Option<&'a crate::entity::Facility> {
    match entity {
        Entity::Facility(f) => Some(f),
        _ => None,
    }
}

pub fn recurring_calc(entity: &Entity, ctx: &CalculationContext) -> Option<f64> {
    use chrono::Datelike;
    let f = as_facility(entity)?;

    let mut total = f.monthly_cost
        + f.utilities_monthly
        + f.internet_monthly
        + f.security_monthly
        + f.cleaning_monthly
        + f.insurance_annual / 12.0
        + f.property_tax_annual / 12.0
        + f.maintenance_monthly
        + f.maintenance_quarterly / 3.0
        + f.maintenance_annual / 12.0;

    if let Some(renewal_month) = f.certification_renewal_month {
        if ctx.as_of_date.month() == renewal_month {
            total += f.certification_renewal_cost;
        }
    }

    Some(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityHeader, Facility};
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    #[test]
    fn renewal_cost_only_applies_in_renewal_month() {
        let f = Entity::Facility(Facility {
            header: EntityHeader {
                name: "HQ".to_string(),
                start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end_date: None,
                tags: BTreeSet::new(),
                notes: None,
            },
            monthly_cost: 5_000.0,
            utilities_monthly: 0.0,
            internet_monthly: 0.0,
            security_monthly: 0.0,
            cleaning_monthly: 0.0,
            insurance_annual: 0.0,
            property_tax_annual: 0.0,
            maintenance_monthly: 0.0,
            maintenance_quarterly: 0.0,
            maintenance_annual: 0.0,
            certification_renewal_month: Some(3),
            certification_renewal_cost: 1_200.0,
            extra: Default::default(),
        });

        let march = CalculationContext::new(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), "baseline");
        assert_eq!(recurring_calc(&f, &march), Some(6_200.0));

        let april = CalculationContext::new(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(), "baseline");
        assert_eq!(recurring_calc(&f, &april), Some(5_000.0));
    }
}
