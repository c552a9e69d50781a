//! Software subscription cost: annual billing preferred over monthly,
//! plus license maintenance (§4.3).

use crate::entity::Entity;
use crate::registry::CalculationContext;

fn as_software<'a>(entity: &'a Entity) -> Option<&'a crate::entity::Software> {
    match entity {
        Entity::Software(s) => Some(s),
        _ => None,
    }
}

pub fn recurring_calc(entity: &Entity, _ctx: &CalculationContext) -> Option<f64> {
    let s = as_software(entity)?;
    let base = match s.annual_cost {
        Some(annual) if annual > 0.0 => annual / 12.0,
        _ => s.monthly_cost,
    };
    let maintenance = s.maintenance_percentage * s.license_cost / 12.0;
    Some(base + maintenance)
}
