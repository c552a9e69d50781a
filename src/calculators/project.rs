//! Project burn: uniform spend between milestones, or an even split of
//! the total budget across the planned window (§4.3).

use crate::entity::Entity;
use crate::registry::CalculationContext;
use crate::utils::{month_start, month_starts_in_range};

fn as_project<'a>(entity: &'a Entity) -> Option<&'a crate::entity::Project> {
    match entity {
        Entity::Project(p) => Some(p),
        _ => None,
    }
}

pub fn burn_calc(entity: &Entity, ctx: &CalculationContext) -> Option<f64> {
    let p = as_project(entity)?;
    let period = month_start(ctx.as_of_date);

    if !p.milestones.is_empty() {
        let mut sorted = p.milestones.clone();
        sorted.sort_by_key(|m| m.date);

        let mut window_start = p.header.start_date;
        for milestone in &sorted {
            let months = month_starts_in_range(window_start, milestone.date);
            if months.contains(&period) {
                return Some(milestone.value() / months.len() as f64);
            }
            window_start = crate::utils::next_month_start(milestone.date);
        }
        return Some(0.0);
    }

    let end = p.planned_end_date.unwrap_or(p.header.start_date);
    let months = month_starts_in_range(p.header.start_date, end);
    if months.is_empty() || !months.contains(&period) {
        return Some(0.0);
    }
    Some(p.total_budget / months.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityHeader, Project, ScheduleItem};
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    fn month(m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, 1).unwrap()
    }

    #[test]
    fn even_split_across_planned_window_without_milestones() {
        let p = Entity::Project(Project {
            header: EntityHeader {
                name: "Launch".to_string(),
                start_date: month(1),
                end_date: None,
                tags: BTreeSet::new(),
                notes: None,
            },
            total_budget: 120_000.0,
            planned_end_date: Some(month(12)),
            milestones: vec![],
            status: None,
            priority: None,
            risk_level: None,
            team_members: vec![],
            extra: Default::default(),
        });
        let ctx = CalculationContext::new(month(6), "baseline");
        assert_eq!(burn_calc(&p, &ctx), Some(10_000.0));
    }

    #[test]
    fn milestone_budgets_spread_uniformly_between_dates() {
        let p = Entity::Project(Project {
            header: EntityHeader {
                name: "Build".to_string(),
                start_date: month(1),
                end_date: None,
                tags: BTreeSet::new(),
                notes: None,
            },
            total_budget: 0.0,
            planned_end_date: None,
            milestones: vec![
                ScheduleItem { date: month(3), amount: Some(30_000.0), budget: None, status: None, extra: Default::default() },
                ScheduleItem { date: month(6), amount: Some(30_000.0), budget: None, status: None, extra: Default::default() },
            ],
            status: None,
            priority: None,
            risk_level: None,
            team_members: vec![],
            extra: Default::default(),
        });
        // Jan..Mar is the first window (3 months), so 10_000/month.
        let ctx = CalculationContext::new(month(2), "baseline");
        assert_eq!(burn_calc(&p, &ctx), Some(10_000.0));
    }
}
