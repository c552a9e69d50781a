//! Recurring service revenue: `monthly_amount` in every active month
//! (§4.3).

use crate::entity::Entity;
use crate::registry::CalculationContext;

pub fn recurring_calc(entity: &Entity, _ctx: &CalculationContext) -> Option<f64> {
    match entity {
        Entity::Service(s) => Some(s.monthly_amount),
        _ => None,
    }
}
