//! Grant disbursement: scheduled payments or milestones take precedence
//! over an even split of the total amount (§4.3).

use crate::entity::Entity;
use crate::registry::CalculationContext;
use crate::utils::{month_start, month_starts_in_range};

fn as_grant<'a>(entity: &'a Entity) -> Option<&'a crate::entity::Grant> {
    match entity {
        Entity::Grant(g) => Some(g),
        _ => None,
    }
}

pub fn disbursement_calc(entity: &Entity, ctx: &CalculationContext) -> Option<f64> {
    let g = as_grant(entity)?;
    let period = month_start(ctx.as_of_date);

    if !g.payment_schedule.is_empty() {
        let sum: f64 = g
            .payment_schedule
            .iter()
            .filter(|item| month_start(item.date) == period)
            .map(|item| item.value())
            .sum();
        return Some(sum);
    }

    // Milestones take precedence over the even-split fallback when both are
    // present; `milestone_calc` alone accounts for this grant's revenue.
    if !g.milestones.is_empty() {
        return Some(0.0);
    }

    let end = g.header.end_date.unwrap_or(g.header.start_date);
    let months = month_starts_in_range(g.header.start_date, end);
    if months.is_empty() || !months.contains(&period) {
        return Some(0.0);
    }
    Some(g.amount / months.len() as f64)
}

pub fn milestone_calc(entity: &Entity, ctx: &CalculationContext) -> Option<f64> {
    let g = as_grant(entity)?;
    if g.milestones.is_empty() {
        return None;
    }
    let period = month_start(ctx.as_of_date);
    let sum: f64 = g
        .milestones
        .iter()
        .filter(|m| month_start(m.date) == period)
        .filter(|m| matches!(m.status.as_deref(), Some("completed") | Some("planned") | None))
        .map(|m| m.value())
        .sum();
    Some(sum)
}
