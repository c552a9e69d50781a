//! The entity model: tagged records sharing a common header, each with
//! type-specific required fields plus an open bag of extras that round-trips
//! byte-equivalent through load/save.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

/// Open key -> value bag for fields a type doesn't know about. Flattened
/// into the surrounding struct on (de)serialization so a document loaded
/// from disk and saved back out is byte-equivalent.
pub type ExtraFields = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Employee,
    Grant,
    Investment,
    Sale,
    Service,
    Facility,
    Software,
    Equipment,
    Project,
}

impl EntityKind {
    pub const ALL: [EntityKind; 9] = [
        EntityKind::Employee,
        EntityKind::Grant,
        EntityKind::Investment,
        EntityKind::Sale,
        EntityKind::Service,
        EntityKind::Facility,
        EntityKind::Software,
        EntityKind::Equipment,
        EntityKind::Project,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Employee => "employee",
            EntityKind::Grant => "grant",
            EntityKind::Investment => "investment",
            EntityKind::Sale => "sale",
            EntityKind::Service => "service",
            EntityKind::Facility => "facility",
            EntityKind::Software => "software",
            EntityKind::Equipment => "equipment",
            EntityKind::Project => "project",
        }
    }
}

/// Fields shared by every entity type, flattened into the variant's own
/// struct so the on-disk document is one flat mapping (§6.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityHeader {
    pub name: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl EntityHeader {
    pub fn is_active(&self, date: NaiveDate) -> bool {
        self.start_date <= date && self.end_date.map_or(true, |end| date <= end)
    }
}

/// A dated, budgeted event nested inside a grant, sale, investment, or
/// project (`payment_schedule`, `disbursement_schedule`, `milestones`).
/// Independent of the parent entity's total except where a calculator
/// explicitly reconciles them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleItem {
    pub date: NaiveDate,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl ScheduleItem {
    /// `amount` if present, else `budget`, else `0.0`.
    pub fn value(&self) -> f64 {
        self.amount.or(self.budget).unwrap_or(0.0)
    }
}

fn default_overhead_multiplier() -> f64 {
    1.0
}

fn default_depreciation_years() -> f64 {
    5.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepreciationMethod {
    StraightLine,
    DecliningBalance,
    SumOfYears,
}

impl Default for DepreciationMethod {
    fn default() -> Self {
        DepreciationMethod::StraightLine
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    #[serde(flatten)]
    pub header: EntityHeader,
    pub salary: f64,
    #[serde(default = "default_overhead_multiplier")]
    pub overhead_multiplier: f64,
    #[serde(default)]
    pub pay_frequency: Option<String>,
    #[serde(default)]
    pub monthly_allowances: BTreeMap<String, f64>,
    #[serde(default)]
    pub annual_budgets: BTreeMap<String, f64>,
    #[serde(default)]
    pub equity_shares: f64,
    #[serde(default)]
    pub vesting_cliff_months: u32,
    #[serde(default)]
    pub vesting_months: u32,
    #[serde(default)]
    pub signing_bonus: f64,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grant {
    #[serde(flatten)]
    pub header: EntityHeader,
    pub amount: f64,
    #[serde(default)]
    pub payment_schedule: Vec<ScheduleItem>,
    #[serde(default)]
    pub milestones: Vec<ScheduleItem>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Investment {
    #[serde(flatten)]
    pub header: EntityHeader,
    pub amount: f64,
    #[serde(default)]
    pub disbursement_schedule: Vec<ScheduleItem>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    #[serde(flatten)]
    pub header: EntityHeader,
    pub amount: f64,
    #[serde(default)]
    pub payment_schedule: Vec<ScheduleItem>,
    #[serde(default)]
    pub delivery_date: Option<NaiveDate>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    #[serde(flatten)]
    pub header: EntityHeader,
    pub monthly_amount: f64,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Facility {
    #[serde(flatten)]
    pub header: EntityHeader,
    pub monthly_cost: f64,
    #[serde(default)]
    pub utilities_monthly: f64,
    #[serde(default)]
    pub internet_monthly: f64,
    #[serde(default)]
    pub security_monthly: f64,
    #[serde(default)]
    pub cleaning_monthly: f64,
    #[serde(default)]
    pub insurance_annual: f64,
    #[serde(default)]
    pub property_tax_annual: f64,
    #[serde(default)]
    pub maintenance_monthly: f64,
    #[serde(default)]
    pub maintenance_quarterly: f64,
    #[serde(default)]
    pub maintenance_annual: f64,
    #[serde(default)]
    pub certification_renewal_month: Option<u32>,
    #[serde(default)]
    pub certification_renewal_cost: f64,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Software {
    #[serde(flatten)]
    pub header: EntityHeader,
    #[serde(default)]
    pub monthly_cost: f64,
    #[serde(default)]
    pub annual_cost: Option<f64>,
    #[serde(default)]
    pub maintenance_percentage: f64,
    #[serde(default)]
    pub license_cost: f64,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Equipment {
    #[serde(flatten)]
    pub header: EntityHeader,
    pub cost: f64,
    pub purchase_date: NaiveDate,
    #[serde(default)]
    pub residual_value: f64,
    #[serde(default = "default_depreciation_years")]
    pub depreciation_years: f64,
    #[serde(default)]
    pub depreciation_method: DepreciationMethod,
    #[serde(default)]
    pub maintenance_cost_annual: f64,
    #[serde(default)]
    pub maintenance_percentage: f64,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    #[serde(flatten)]
    pub header: EntityHeader,
    pub total_budget: f64,
    #[serde(default)]
    pub planned_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub milestones: Vec<ScheduleItem>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub team_members: Vec<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Entity {
    Employee(Employee),
    Grant(Grant),
    Investment(Investment),
    Sale(Sale),
    Service(Service),
    Facility(Facility),
    Software(Software),
    Equipment(Equipment),
    Project(Project),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Employee(_) => EntityKind::Employee,
            Entity::Grant(_) => EntityKind::Grant,
            Entity::Investment(_) => EntityKind::Investment,
            Entity::Sale(_) => EntityKind::Sale,
            Entity::Service(_) => EntityKind::Service,
            Entity::Facility(_) => EntityKind::Facility,
            Entity::Software(_) => EntityKind::Software,
            Entity::Equipment(_) => EntityKind::Equipment,
            Entity::Project(_) => EntityKind::Project,
        }
    }

    pub fn header(&self) -> &EntityHeader {
        match self {
            Entity::Employee(e) => &e.header,
            Entity::Grant(e) => &e.header,
            Entity::Investment(e) => &e.header,
            Entity::Sale(e) => &e.header,
            Entity::Service(e) => &e.header,
            Entity::Facility(e) => &e.header,
            Entity::Software(e) => &e.header,
            Entity::Equipment(e) => &e.header,
            Entity::Project(e) => &e.header,
        }
    }

    pub fn name(&self) -> &str {
        &self.header().name
    }

    pub fn start_date(&self) -> NaiveDate {
        self.header().start_date
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.header().end_date
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.header().tags
    }

    pub fn is_active(&self, date: NaiveDate) -> bool {
        self.header().is_active(date)
    }

    /// Serializes the entity to its flat document form (§6.1): a single
    /// JSON object with `type`, the header fields, the type's own known
    /// fields, and the extras bag, all at the same level.
    pub fn to_document(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn from_document(doc: serde_json::Value) -> serde_json::Result<Entity> {
        serde_json::from_value(doc)
    }

    /// Generic field accessor over the flattened document: known fields and
    /// extras are indistinguishable to calculators, per §3.1.
    pub fn get_field(&self, name: &str, default: serde_json::Value) -> serde_json::Value {
        self.to_document()
            .get(name)
            .cloned()
            .unwrap_or(default)
    }

    pub fn get_field_f64(&self, name: &str, default: f64) -> f64 {
        self.get_field(name, serde_json::Value::Null)
            .as_f64()
            .unwrap_or(default)
    }

    /// Returns a copy of the entity with `field` set to `value`. Used by the
    /// scenario manager to rewrite a *copy* of an entity; never mutates
    /// `self` (§4.6's non-mutation invariant).
    pub fn with_field(&self, field: &str, value: serde_json::Value) -> serde_json::Result<Entity> {
        let mut doc = self.to_document();
        if let Some(obj) = doc.as_object_mut() {
            obj.insert(field.to_string(), value);
        }
        Entity::from_document(doc)
    }

    /// Returns a copy of the entity with `field` scaled by `multiplier`,
    /// leaving non-numeric or absent fields untouched.
    pub fn with_field_scaled(&self, field: &str, multiplier: f64) -> serde_json::Result<Entity> {
        let current = self.get_field_f64(field, 0.0);
        self.with_field(field, serde_json::json!(current * multiplier))
    }

    /// Returns a copy of the entity with date field `field` shifted forward
    /// by `months` calendar months, leaving non-date or absent fields
    /// untouched. Used by scenarios that model a delay (e.g. hiring pushed
    /// out by pushing `start_date` later) rather than a magnitude change.
    pub fn with_field_shifted_months(&self, field: &str, months: u32) -> serde_json::Result<Entity> {
        let current = self.get_field(field, serde_json::Value::Null);
        let shifted = match current.as_str().and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()) {
            Some(date) => date.checked_add_months(chrono::Months::new(months)).unwrap_or(date),
            None => return Ok(self.clone()),
        };
        self.with_field(field, serde_json::json!(shifted.format("%Y-%m-%d").to_string()))
    }
}

/// The consumed store interface (§6.2). Persistence, indexing, and file
/// layout are the store's concern; the core only ever reads through this
/// trait.
pub trait EntityStore: Send + Sync {
    fn load_all(&self) -> Vec<Entity>;
    fn load_by_type(&self, kind: EntityKind) -> Vec<Entity>;
    fn invalidate(&self);
    /// Monotonically increasing token bumped by the store on any mutation,
    /// used as part of the engine's table cache key (§9 open question:
    /// without this the cache would go stale silently).
    fn version(&self) -> u64;
}

/// A trivial in-memory `EntityStore`, useful for tests and for embedding
/// the core in a driver that already holds its entities in memory. The
/// real on-disk document loader/writer is out of scope for this crate.
pub struct InMemoryEntityStore {
    entities: RwLock<Vec<Entity>>,
    version: std::sync::atomic::AtomicU64,
}

impl InMemoryEntityStore {
    pub fn new(entities: Vec<Entity>) -> Self {
        Self {
            entities: RwLock::new(entities),
            version: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn set_entities(&self, entities: Vec<Entity>) {
        *self.entities.write().unwrap() = entities;
        self.version.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

impl EntityStore for InMemoryEntityStore {
    fn load_all(&self) -> Vec<Entity> {
        self.entities.read().unwrap().clone()
    }

    fn load_by_type(&self, kind: EntityKind) -> Vec<Entity> {
        self.entities
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.kind() == kind)
            .cloned()
            .collect()
    }

    fn invalidate(&self) {
        self.version.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    fn version(&self) -> u64 {
        self.version.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee(name: &str, start: NaiveDate, end: Option<NaiveDate>) -> Entity {
        Entity::Employee(Employee {
            header: EntityHeader {
                name: name.to_string(),
                start_date: start,
                end_date: end,
                tags: BTreeSet::new(),
                notes: None,
            },
            salary: 120_000.0,
            overhead_multiplier: 1.3,
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
    fn is_active_respects_open_and_closed_ranges() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let e = employee("Alice", start, Some(end));

        assert!(!e.is_active(NaiveDate::from_ymd_opt(2023, 12, 1).unwrap()));
        assert!(e.is_active(start));
        assert!(e.is_active(end));
        assert!(!e.is_active(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()));

        let open_ended = employee("Bob", start, None);
        assert!(open_ended.is_active(NaiveDate::from_ymd_opt(2099, 1, 1).unwrap()));
    }

    #[test]
    fn round_trips_through_document_with_extras_preserved() {
        let mut e = employee(
            "Carol",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            None,
        );
        if let Entity::Employee(ref mut emp) = e {
            emp.extra
                .insert("custom_note".to_string(), serde_json::json!("hello"));
        }

        let doc = e.to_document();
        let reloaded = Entity::from_document(doc).unwrap();

        assert_eq!(reloaded.name(), "Carol");
        assert_eq!(
            reloaded.get_field("custom_note", serde_json::Value::Null),
            serde_json::json!("hello")
        );
        assert_eq!(reloaded.get_field_f64("salary", 0.0), 120_000.0);
    }

    #[test]
    fn get_field_falls_back_to_default() {
        let e = employee("Dana", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), None);
        assert_eq!(
            e.get_field("does_not_exist", serde_json::json!("default")),
            serde_json::json!("default")
        );
    }

    #[test]
    fn with_field_scaled_does_not_mutate_original() {
        let e = employee("Erin", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), None);
        let scaled = e.with_field_scaled("salary", 1.5).unwrap();

        assert_eq!(e.get_field_f64("salary", 0.0), 120_000.0);
        assert_eq!(scaled.get_field_f64("salary", 0.0), 180_000.0);
    }

    #[test]
    fn schedule_item_prefers_amount_over_budget() {
        let item = ScheduleItem {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            amount: Some(10.0),
            budget: Some(20.0),
            status: None,
            extra: BTreeMap::new(),
        };
        assert_eq!(item.value(), 10.0);

        let budget_only = ScheduleItem {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            amount: None,
            budget: Some(20.0),
            status: None,
            extra: BTreeMap::new(),
        };
        assert_eq!(budget_only.value(), 20.0);
    }

    #[test]
    fn in_memory_store_bumps_version_on_mutation() {
        let store = InMemoryEntityStore::new(vec![]);
        let v0 = store.version();
        store.set_entities(vec![employee(
            "Fay",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            None,
        )]);
        assert!(store.version() > v0);
        assert_eq!(store.load_all().len(), 1);
        assert_eq!(store.load_by_type(EntityKind::Grant).len(), 0);
    }
}
