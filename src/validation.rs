//! Schema, business-rule, and cross-reference checks over a set of
//! entities. Every pass collects all offending entities before returning;
//! none stop at the first failure.

use crate::entity::{DepreciationMethod, Entity, EntityKind};
use crate::utils::validate_month;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub entity: String,
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    fn missing_field(entity: &str, field: &str) -> Self {
        ValidationIssue {
            severity: Severity::Error,
            entity: entity.to_string(),
            field: field.to_string(),
            message: format!("missing or non-positive required field '{}'", field),
        }
    }

    fn invalid_rule(entity: &str, field: &str, reason: impl Into<String>) -> Self {
        ValidationIssue {
            severity: Severity::Error,
            entity: entity.to_string(),
            field: field.to_string(),
            message: reason.into(),
        }
    }

    fn reference_warning(entity: &str, field: &str, reference: &str) -> Self {
        ValidationIssue {
            severity: Severity::Warning,
            entity: entity.to_string(),
            field: field.to_string(),
            message: format!("references unknown entity '{}'", reference),
        }
    }
}

const VALID_STATUS: &[&str] = &["completed", "planned", "in_progress", "cancelled", "delayed"];
const VALID_PRIORITY: &[&str] = &["low", "medium", "high", "critical"];
const VALID_RISK_LEVEL: &[&str] = &["low", "medium", "high"];
const VALID_PAY_FREQUENCY: &[&str] = &["monthly", "biweekly", "weekly", "annual"];

fn is_percentage(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

/// §4.1's per-type required-field check: `MissingField` when the type's
/// anchor amount is absent or non-positive.
pub fn validate_required_fields(entity: &Entity) -> Vec<ValidationIssue> {
    let name = entity.name();
    let mut issues = Vec::new();

    match entity {
        Entity::Employee(e) => {
            if e.salary <= 0.0 {
                issues.push(ValidationIssue::missing_field(name, "salary"));
            }
        }
        Entity::Grant(e) => {
            if e.amount <= 0.0 {
                issues.push(ValidationIssue::missing_field(name, "amount"));
            }
        }
        Entity::Investment(e) => {
            if e.amount <= 0.0 {
                issues.push(ValidationIssue::missing_field(name, "amount"));
            }
        }
        Entity::Sale(e) => {
            if e.amount <= 0.0 {
                issues.push(ValidationIssue::missing_field(name, "amount"));
            }
        }
        Entity::Service(e) => {
            if e.monthly_amount <= 0.0 {
                issues.push(ValidationIssue::missing_field(name, "monthly_amount"));
            }
        }
        Entity::Facility(e) => {
            if e.monthly_cost <= 0.0 {
                issues.push(ValidationIssue::missing_field(name, "monthly_cost"));
            }
        }
        Entity::Software(e) => {
            let annual_ok = e.annual_cost.map_or(false, |a| a > 0.0);
            if e.monthly_cost <= 0.0 && !annual_ok {
                issues.push(ValidationIssue::missing_field(name, "monthly_cost"));
            }
        }
        Entity::Equipment(e) => {
            if e.cost <= 0.0 {
                issues.push(ValidationIssue::missing_field(name, "cost"));
            }
        }
        Entity::Project(e) => {
            if e.total_budget <= 0.0 {
                issues.push(ValidationIssue::missing_field(name, "total_budget"));
            }
        }
    }

    issues
}

/// §4.1's business-rule checks: percentage ranges, enumerated fields,
/// `overhead_multiplier` bounds, `end_date >= start_date`.
pub fn validate_business_rules(entity: &Entity) -> Vec<ValidationIssue> {
    let name = entity.name();
    let mut issues = Vec::new();

    let header = entity.header();
    if let Some(end) = header.end_date {
        if end < header.start_date {
            issues.push(ValidationIssue::invalid_rule(
                name,
                "end_date",
                "end_date must be on or after start_date",
            ));
        }
    }

    match entity {
        Entity::Employee(e) => {
            if !(1.0..=3.0).contains(&e.overhead_multiplier) {
                issues.push(ValidationIssue::invalid_rule(
                    name,
                    "overhead_multiplier",
                    "overhead_multiplier must be within [1.0, 3.0]",
                ));
            }
            if let Some(freq) = &e.pay_frequency {
                if !VALID_PAY_FREQUENCY.contains(&freq.as_str()) {
                    issues.push(ValidationIssue::invalid_rule(
                        name,
                        "pay_frequency",
                        format!("unrecognized pay_frequency '{}'", freq),
                    ));
                }
            }
        }
        Entity::Software(e) => {
            if !is_percentage(e.maintenance_percentage) {
                issues.push(ValidationIssue::invalid_rule(
                    name,
                    "maintenance_percentage",
                    "maintenance_percentage must be within [0,1]",
                ));
            }
        }
        Entity::Facility(e) => {
            if let Some(month) = e.certification_renewal_month {
                if let Err(err) = validate_month(month) {
                    issues.push(ValidationIssue::invalid_rule(name, "certification_renewal_month", err.to_string()));
                }
            }
        }
        Entity::Equipment(e) => {
            if !is_percentage(e.maintenance_percentage) {
                issues.push(ValidationIssue::invalid_rule(
                    name,
                    "maintenance_percentage",
                    "maintenance_percentage must be within [0,1]",
                ));
            }
            let _ = DepreciationMethod::StraightLine; // the enum itself enforces the valid set
        }
        Entity::Project(e) => {
            if let Some(status) = &e.status {
                if !VALID_STATUS.contains(&status.as_str()) {
                    issues.push(ValidationIssue::invalid_rule(
                        name,
                        "status",
                        format!("unrecognized status '{}'", status),
                    ));
                }
            }
            if let Some(priority) = &e.priority {
                if !VALID_PRIORITY.contains(&priority.as_str()) {
                    issues.push(ValidationIssue::invalid_rule(
                        name,
                        "priority",
                        format!("unrecognized priority '{}'", priority),
                    ));
                }
            }
            if let Some(risk) = &e.risk_level {
                if !VALID_RISK_LEVEL.contains(&risk.as_str()) {
                    issues.push(ValidationIssue::invalid_rule(
                        name,
                        "risk_level",
                        format!("unrecognized risk_level '{}'", risk),
                    ));
                }
            }
        }
        _ => {}
    }

    issues
}

/// §4.1's cross-reference check: named references (project team members,
/// milestone owners) that don't exist in the entity set are warnings, not
/// fatal errors.
pub fn validate_references(entity: &Entity, known_names: &BTreeSet<String>) -> Vec<ValidationIssue> {
    let name = entity.name();
    let mut issues = Vec::new();

    if let Entity::Project(p) = entity {
        for member in &p.team_members {
            if !known_names.contains(member) {
                issues.push(ValidationIssue::reference_warning(name, "team_members", member));
            }
        }
        for milestone in &p.milestones {
            if let Some(owner) = milestone.extra.get("owner").and_then(|v| v.as_str()) {
                if !known_names.contains(owner) {
                    issues.push(ValidationIssue::reference_warning(name, "milestones.owner", owner));
                }
            }
        }
    }

    issues
}

/// Runs all three passes over the whole entity set, collecting every
/// issue rather than stopping at the first entity that fails.
pub fn validate_all(entities: &[Entity]) -> Vec<ValidationIssue> {
    let known_names: BTreeSet<String> = entities.iter().map(|e| e.name().to_string()).collect();
    let mut issues = Vec::new();

    for entity in entities {
        issues.extend(validate_required_fields(entity));
        issues.extend(validate_business_rules(entity));
        issues.extend(validate_references(entity, &known_names));
    }

    issues
}

/// Entities with no `Severity::Error` issues, in input order. Entities
/// with only warnings are kept.
pub fn valid_entities(entities: Vec<Entity>) -> (Vec<Entity>, Vec<ValidationIssue>) {
    let known_names: BTreeSet<String> = entities.iter().map(|e| e.name().to_string()).collect();
    let mut kept = Vec::new();
    let mut issues = Vec::new();

    for entity in entities {
        let mut entity_issues = validate_required_fields(&entity);
        entity_issues.extend(validate_business_rules(&entity));
        entity_issues.extend(validate_references(&entity, &known_names));

        let has_error = entity_issues.iter().any(|i| i.severity == Severity::Error);
        if !has_error {
            kept.push(entity);
        } else {
            log::warn!(
                "excluding entity '{}' from entity set: {} validation error(s)",
                entity_issues[0].entity,
                entity_issues.iter().filter(|i| i.severity == Severity::Error).count()
            );
        }
        issues.extend(entity_issues);
    }

    (kept, issues)
}

pub fn kind_name(kind: EntityKind) -> &'static str {
    kind.as_str()
}
