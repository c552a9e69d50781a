//! # CashCow
//!
//! A cash-flow forecasting engine for small companies. Entities
//! (employees, grants, investments, sales, services, facilities, software,
//! equipment, projects) carry an open, flexible schema; the engine turns a
//! date range and a scenario into a month-indexed forecast of revenue,
//! expenses, and cash balance, and the KPI layer reduces that forecast to
//! a flat metrics map plus a list of alerts.
//!
//! ## Layout
//!
//! - [`entity`] — the entity model and the `EntityStore` seam.
//! - [`validation`] — schema, business-rule, and cross-reference checks.
//! - [`registry`] — the calculator registry and its topological ordering.
//! - [`calculators`] — the built-in calculator set, one module per type.
//! - [`engine`] — the cash-flow engine: three execution modes, one kernel.
//! - [`scenario`] — named entity-set and context transformations.
//! - [`kpi`] — metrics and alerts derived from a forecast table.
//!
//! Document loading/writing, report rendering, and driver-level concerns
//! (CLI, web UI, Monte Carlo sweeps) are not part of this crate; they
//! consume the types here through [`entity::EntityStore`] and the engine's
//! public API.
//!
//! ## Example
//!
//! ```rust
//! use cashcow::calculators::register_builtins;
//! use cashcow::engine::{CashFlowEngine, ExecutionMode};
//! use cashcow::entity::{Employee, Entity, EntityHeader, InMemoryEntityStore};
//! use cashcow::scenario::ScenarioManager;
//! use chrono::NaiveDate;
//! use std::collections::{BTreeMap, BTreeSet};
//! use std::sync::Arc;
//!
//! # async fn run() -> cashcow::error::Result<()> {
//! let employee = Entity::Employee(Employee {
//!     header: EntityHeader {
//!         name: "Alice".to_string(),
//!         start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!         end_date: None,
//!         tags: BTreeSet::new(),
//!         notes: None,
//!     },
//!     salary: 120_000.0,
//!     overhead_multiplier: 1.3,
//!     pay_frequency: None,
//!     monthly_allowances: BTreeMap::new(),
//!     annual_budgets: BTreeMap::new(),
//!     equity_shares: 0.0,
//!     vesting_cliff_months: 0,
//!     vesting_months: 0,
//!     signing_bonus: 0.0,
//!     extra: BTreeMap::new(),
//! });
//!
//! let store = Arc::new(InMemoryEntityStore::new(vec![employee]));
//! let registry = register_builtins()?;
//! let scenarios = ScenarioManager::new(store);
//! let engine = CashFlowEngine::new(registry, scenarios);
//!
//! let table = engine
//!     .calculate(
//!         NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!         NaiveDate::from_ymd_opt(2024, 12, 1).unwrap(),
//!         "baseline",
//!         ExecutionMode::Sequential,
//!         0.0,
//!         None,
//!         None,
//!     )
//!     .await?;
//!
//! let kpis = cashcow::kpi::compute(&table, 0.0);
//! assert!(kpis.metrics.contains_key("runway_months"));
//! # Ok(())
//! # }
//! ```

pub mod calculators;
pub mod engine;
pub mod entity;
pub mod error;
pub mod kpi;
pub mod registry;
pub mod scenario;
pub mod utils;
pub mod validation;

pub use engine::{CashFlowEngine, ComparisonRow, ExecutionMode, ForecastRow, ForecastTable};
pub use entity::{Entity, EntityKind, EntityStore};
pub use error::{CashCowError, Result};
pub use kpi::{Alert, AlertLevel, KpiResult};
pub use registry::{CalculationContext, CalculatorRegistry};
pub use scenario::{Scenario, ScenarioManager};
