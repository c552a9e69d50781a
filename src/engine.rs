//! The cash-flow engine: iterates monthly periods, selects active
//! entities, runs the calculator registry, and aggregates into a wide
//! forecast table. Offers three execution modes that share one pure
//! per-period kernel so results are identical regardless of scheduling.

use crate::entity::{Entity, EntityKind};
use crate::error::{CashCowError, Result};
use crate::registry::{CalculationContext, CalculatorRegistry};
use crate::scenario::ScenarioManager;
use crate::utils::month_starts_in_range;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    Cooperative,
    Parallel,
}

/// One row of the forecast table, §3.3.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRow {
    pub period: NaiveDate,

    pub grant_revenue: f64,
    pub investment_revenue: f64,
    pub sales_revenue: f64,
    pub service_revenue: f64,
    pub total_revenue: f64,

    pub employee_costs: f64,
    pub facility_costs: f64,
    pub software_costs: f64,
    pub equipment_costs: f64,
    pub project_costs: f64,
    pub total_expenses: f64,

    pub net_cash_flow: f64,
    pub cumulative_cash_flow: f64,
    pub cash_balance: f64,

    pub revenue_growth_rate: Option<f64>,
    pub expense_growth_rate: Option<f64>,

    pub active_employees: u32,
    pub active_projects: u32,

    pub revenue_per_employee: Option<f64>,
    pub cost_per_employee: Option<f64>,

    /// Each expense category's share of `total_expenses` this period
    /// (§3.3's "percentage decompositions of expense categories"). `None`
    /// when there are no expenses to decompose.
    pub employee_cost_pct: Option<f64>,
    pub facility_cost_pct: Option<f64>,
    pub software_cost_pct: Option<f64>,
    pub equipment_cost_pct: Option<f64>,
    pub project_cost_pct: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ForecastTable {
    pub rows: Vec<ForecastRow>,
}

/// Unordered per-period sums, produced by the pure kernel. Assembled into
/// `ForecastRow`s (with derived columns) in a single left-to-right pass
/// afterward, regardless of which execution mode produced them.
#[derive(Debug, Clone)]
struct PeriodTotals {
    period: NaiveDate,
    grant_revenue: f64,
    investment_revenue: f64,
    sales_revenue: f64,
    service_revenue: f64,
    employee_costs: f64,
    facility_costs: f64,
    software_costs: f64,
    equipment_costs: f64,
    project_costs: f64,
    active_employees: u32,
    active_projects: u32,
}

impl PeriodTotals {
    fn new(period: NaiveDate) -> Self {
        PeriodTotals {
            period,
            grant_revenue: 0.0,
            investment_revenue: 0.0,
            sales_revenue: 0.0,
            service_revenue: 0.0,
            employee_costs: 0.0,
            facility_costs: 0.0,
            software_costs: 0.0,
            equipment_costs: 0.0,
            project_costs: 0.0,
            active_employees: 0,
            active_projects: 0,
        }
    }
}

/// The single-period kernel shared by all three execution modes. Pure:
/// depends only on its arguments, touches no shared mutable state.
fn compute_period(
    period: NaiveDate,
    entities: &[Entity],
    registry: &CalculatorRegistry,
    ctx_template: &CalculationContext,
) -> PeriodTotals {
    let mut totals = PeriodTotals::new(period);

    let mut ctx = ctx_template.clone();
    ctx.as_of_date = period;

    for entity in entities {
        if !entity.is_active(period) {
            continue;
        }

        let sum: f64 = registry.calculate_total(entity, &ctx);

        match entity.kind() {
            EntityKind::Grant => totals.grant_revenue += sum,
            EntityKind::Investment => totals.investment_revenue += sum,
            EntityKind::Sale => totals.sales_revenue += sum,
            EntityKind::Service => totals.service_revenue += sum,
            EntityKind::Employee => {
                totals.employee_costs += sum;
                totals.active_employees += 1;
            }
            EntityKind::Facility => totals.facility_costs += sum,
            EntityKind::Software => totals.software_costs += sum,
            EntityKind::Equipment => totals.equipment_costs += sum,
            EntityKind::Project => {
                totals.project_costs += sum;
                totals.active_projects += 1;
            }
        }
    }

    totals
}

fn assemble_rows(mut period_totals: Vec<PeriodTotals>, starting_cash: f64) -> ForecastTable {
    period_totals.sort_by_key(|t| t.period);

    let mut rows = Vec::with_capacity(period_totals.len());
    let mut cumulative = 0.0;
    let mut prev_total_revenue: Option<f64> = None;
    let mut prev_total_expenses: Option<f64> = None;

    for totals in period_totals {
        let total_revenue =
            totals.grant_revenue + totals.investment_revenue + totals.sales_revenue + totals.service_revenue;
        let total_expenses = totals.employee_costs
            + totals.facility_costs
            + totals.software_costs
            + totals.equipment_costs
            + totals.project_costs;
        let net_cash_flow = total_revenue - total_expenses;
        cumulative += net_cash_flow;
        let cash_balance = starting_cash + cumulative;

        let revenue_growth_rate = prev_total_revenue.and_then(|prev| {
            if prev.abs() > f64::EPSILON {
                Some((total_revenue - prev) / prev)
            } else {
                None
            }
        });
        let expense_growth_rate = prev_total_expenses.and_then(|prev| {
            if prev.abs() > f64::EPSILON {
                Some((total_expenses - prev) / prev)
            } else {
                None
            }
        });

        let revenue_per_employee = if totals.active_employees > 0 {
            Some(total_revenue / totals.active_employees as f64)
        } else {
            None
        };
        let cost_per_employee = if totals.active_employees > 0 {
            Some(total_expenses / totals.active_employees as f64)
        } else {
            None
        };

        let expense_pct = |amount: f64| {
            if total_expenses.abs() > f64::EPSILON {
                Some(amount / total_expenses)
            } else {
                None
            }
        };

        rows.push(ForecastRow {
            period: totals.period,
            grant_revenue: totals.grant_revenue,
            investment_revenue: totals.investment_revenue,
            sales_revenue: totals.sales_revenue,
            service_revenue: totals.service_revenue,
            total_revenue,
            employee_costs: totals.employee_costs,
            facility_costs: totals.facility_costs,
            software_costs: totals.software_costs,
            equipment_costs: totals.equipment_costs,
            project_costs: totals.project_costs,
            total_expenses,
            net_cash_flow,
            cumulative_cash_flow: cumulative,
            cash_balance,
            revenue_growth_rate,
            expense_growth_rate,
            active_employees: totals.active_employees,
            active_projects: totals.active_projects,
            revenue_per_employee,
            cost_per_employee,
            employee_cost_pct: expense_pct(totals.employee_costs),
            facility_cost_pct: expense_pct(totals.facility_costs),
            software_cost_pct: expense_pct(totals.software_costs),
            equipment_cost_pct: expense_pct(totals.equipment_costs),
            project_cost_pct: expense_pct(totals.project_costs),
        });

        prev_total_revenue = Some(total_revenue);
        prev_total_expenses = Some(total_expenses);
    }

    ForecastTable { rows }
}

/// One period's `cash_balance` across every scenario in a `compare()`
/// call, the side-by-side row §4.6's summary reducer folds the
/// per-scenario tables into.
#[derive(Debug, Clone)]
pub struct ComparisonRow {
    pub period: NaiveDate,
    pub cash_balance_by_scenario: BTreeMap<String, f64>,
}

/// Folds the output of `CashFlowEngine::compare` into one row per period,
/// each carrying every scenario's `cash_balance` for that period. Periods
/// present in any table are included; a scenario missing a period (a
/// compare across tables of different horizons) simply has no entry for
/// that row.
pub fn summarize_comparison(tables: &BTreeMap<String, ForecastTable>) -> Vec<ComparisonRow> {
    let mut periods: Vec<NaiveDate> = tables
        .values()
        .flat_map(|t| t.rows.iter().map(|r| r.period))
        .collect();
    periods.sort();
    periods.dedup();

    periods
        .into_iter()
        .map(|period| {
            let mut by_scenario = BTreeMap::new();
            for (name, table) in tables {
                if let Some(row) = table.rows.iter().find(|r| r.period == period) {
                    by_scenario.insert(name.clone(), row.cash_balance);
                }
            }
            ComparisonRow {
                period,
                cash_balance_by_scenario: by_scenario,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TableCacheKey {
    scenario: String,
    start: NaiveDate,
    end: NaiveDate,
    entity_set_version: u64,
    starting_cash_bits: u64,
}

/// Produces `ForecastTable`s for a scenario over a date range, in one of
/// three equivalent execution modes, with entity-set and table caching.
pub struct CashFlowEngine {
    registry: CalculatorRegistry,
    scenarios: ScenarioManager,
    table_cache: RwLock<HashMap<TableCacheKey, ForecastTable>>,
}

impl CashFlowEngine {
    pub fn new(registry: CalculatorRegistry, scenarios: ScenarioManager) -> Self {
        CashFlowEngine {
            registry,
            scenarios,
            table_cache: RwLock::new(HashMap::new()),
        }
    }

    /// `scenarios.compare(names[], start, end, starting_cash)` from §6.3
    /// and §4.6: runs each named scenario over the same range and returns
    /// the collection, keyed by scenario name.
    pub async fn compare(
        &self,
        names: &[&str],
        start: NaiveDate,
        end: NaiveDate,
        starting_cash: f64,
    ) -> Result<BTreeMap<String, ForecastTable>> {
        let mut tables = BTreeMap::new();
        for name in names {
            let table = self
                .calculate(start, end, name, ExecutionMode::Sequential, starting_cash, None, None)
                .await?;
            tables.insert(name.to_string(), table);
        }
        Ok(tables)
    }

    pub fn clear_cache(&self) {
        self.table_cache.write().unwrap().clear();
        self.scenarios.clear_cache();
    }

    /// `engine.calculate(...)` from §6.3.
    pub async fn calculate(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        scenario: &str,
        mode: ExecutionMode,
        starting_cash: f64,
        cancel: Option<CancellationToken>,
        deadline: Option<Duration>,
    ) -> Result<ForecastTable> {
        let (entities, entity_set_version) = self.scenarios.resolve(scenario)?;

        let key = TableCacheKey {
            scenario: scenario.to_string(),
            start,
            end,
            entity_set_version,
            starting_cash_bits: starting_cash.to_bits(),
        };
        if let Some(table) = self.table_cache.read().unwrap().get(&key) {
            log::trace!("table cache hit for scenario '{}'", scenario);
            return Ok(table.clone());
        }

        let periods = month_starts_in_range(start, end);
        let ctx_template = self.scenarios.context_for(scenario, start)?;

        let run = async {
            match mode {
                ExecutionMode::Sequential => Ok(self.run_sequential(&periods, &entities, &ctx_template)),
                ExecutionMode::Cooperative => {
                    self.run_cooperative(&periods, &entities, &ctx_template, cancel.clone()).await
                }
                ExecutionMode::Parallel => self.run_parallel(&periods, &entities, &ctx_template, cancel.clone()),
            }
        };

        let period_totals = if let Some(budget) = deadline {
            match tokio::time::timeout(budget, run).await {
                Ok(result) => result?,
                Err(_) => return Err(CashCowError::DeadlineExceeded),
            }
        } else {
            run.await?
        };

        let table = assemble_rows(period_totals, starting_cash);
        self.table_cache.write().unwrap().insert(key, table.clone());
        Ok(table)
    }

    fn run_sequential(
        &self,
        periods: &[NaiveDate],
        entities: &[Entity],
        ctx_template: &CalculationContext,
    ) -> Vec<PeriodTotals> {
        periods
            .iter()
            .map(|period| compute_period(*period, entities, &self.registry, ctx_template))
            .collect()
    }

    async fn run_cooperative(
        &self,
        periods: &[NaiveDate],
        entities: &[Entity],
        ctx_template: &CalculationContext,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<PeriodTotals>> {
        let mut totals = Vec::with_capacity(periods.len());

        for period in periods {
            if let Some(token) = &cancel {
                if token.is_cancelled() {
                    return Err(CashCowError::Cancelled);
                }
            }

            totals.push(compute_period(*period, entities, &self.registry, ctx_template));
            // Suspension point between periods only, never mid-entity.
            tokio::task::yield_now().await;
        }

        if let Some(token) = &cancel {
            if token.is_cancelled() {
                return Err(CashCowError::Cancelled);
            }
        }

        Ok(totals)
    }

    fn run_parallel(
        &self,
        periods: &[NaiveDate],
        entities: &[Entity],
        ctx_template: &CalculationContext,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<PeriodTotals>> {
        use rayon::prelude::*;

        let worker_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(periods.len().max(1));

        let fallback_period = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .build()
            .map_err(|e| CashCowError::EngineError {
                period: periods.first().copied().unwrap_or(fallback_period),
                entity: String::new(),
                cause: e.to_string(),
            })?;

        let cancelled = std::sync::atomic::AtomicBool::new(false);

        let totals: Vec<PeriodTotals> = pool.install(|| {
            periods
                .par_iter()
                .map(|period| {
                    if let Some(token) = &cancel {
                        if token.is_cancelled() {
                            cancelled.store(true, std::sync::atomic::Ordering::SeqCst);
                        }
                    }
                    compute_period(*period, entities, &self.registry, ctx_template)
                })
                .collect()
        });

        if cancelled.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(CashCowError::Cancelled);
        }

        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculators::register_builtins;
    use crate::entity::{Employee, EntityHeader, InMemoryEntityStore};
    use crate::scenario::ScenarioManager;
    use std::collections::{BTreeMap as Map, BTreeSet};
    use std::sync::Arc;

    fn employee(name: &str, salary: f64, overhead: f64) -> Entity {
        Entity::Employee(Employee {
            header: EntityHeader {
                name: name.to_string(),
                start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end_date: None,
                tags: BTreeSet::new(),
                notes: None,
            },
            salary,
            overhead_multiplier: overhead,
            pay_frequency: None,
            monthly_allowances: Map::new(),
            annual_budgets: Map::new(),
            equity_shares: 0.0,
            vesting_cliff_months: 0,
            vesting_months: 0,
            signing_bonus: 0.0,
            extra: Map::new(),
        })
    }

    fn engine_with(entities: Vec<Entity>) -> CashFlowEngine {
        let registry = register_builtins().unwrap();
        let store = Arc::new(InMemoryEntityStore::new(entities));
        let scenarios = ScenarioManager::new(store);
        CashFlowEngine::new(registry, scenarios)
    }

    #[tokio::test]
    async fn e1_single_employee_twelve_months() {
        let engine = engine_with(vec![employee("Alice", 120_000.0, 1.3)]);
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 12, 1).unwrap();

        let table = engine
            .calculate(start, end, "baseline", ExecutionMode::Sequential, 0.0, None, None)
            .await
            .unwrap();

        assert_eq!(table.rows.len(), 12);
        for row in &table.rows {
            assert!((row.employee_costs - 13_000.0).abs() < 1e-9);
            assert!((row.total_expenses - 13_000.0).abs() < 1e-9);
        }
        let last = table.rows.last().unwrap();
        assert!((last.cash_balance - (-156_000.0)).abs() < 1e-6);
    }

    #[tokio::test]
    async fn sequential_cooperative_and_parallel_modes_agree() {
        let engine = engine_with(vec![
            employee("Alice", 120_000.0, 1.3),
            employee("Bob", 90_000.0, 1.2),
        ]);
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 12, 1).unwrap();

        let sequential = engine
            .calculate(start, end, "baseline", ExecutionMode::Sequential, 1_000.0, None, None)
            .await
            .unwrap();
        let cooperative = engine
            .calculate(start, end, "baseline", ExecutionMode::Cooperative, 1_000.0, None, None)
            .await
            .unwrap();
        let parallel = engine
            .calculate(start, end, "baseline", ExecutionMode::Parallel, 1_000.0, None, None)
            .await
            .unwrap();

        for (a, b) in sequential.rows.iter().zip(cooperative.rows.iter()) {
            assert!((a.cash_balance - b.cash_balance).abs() < 1e-9);
        }
        for (a, b) in sequential.rows.iter().zip(parallel.rows.iter()) {
            assert!((a.cash_balance - b.cash_balance).abs() < 1e-9);
        }
    }

    #[tokio::test]
    async fn cancellation_aborts_with_no_partial_table() {
        let engine = engine_with(vec![employee("Alice", 120_000.0, 1.3)]);
        let token = CancellationToken::new();
        token.cancel();

        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 12, 1).unwrap();
        let result = engine
            .calculate(start, end, "baseline", ExecutionMode::Cooperative, 0.0, Some(token), None)
            .await;

        assert!(matches!(result, Err(CashCowError::Cancelled)));
    }

    #[tokio::test]
    async fn compare_runs_every_named_scenario_and_summary_reducer_aligns_by_period() {
        let engine = engine_with(vec![employee("Alice", 120_000.0, 1.3)]);
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let tables = engine
            .compare(&["baseline", "conservative"], start, end, 10_000.0)
            .await
            .unwrap();

        assert_eq!(tables.len(), 2);
        assert!(tables.contains_key("baseline"));
        assert!(tables.contains_key("conservative"));

        let summary = summarize_comparison(&tables);
        assert_eq!(summary.len(), 3);
        for row in &summary {
            assert_eq!(row.cash_balance_by_scenario.len(), 2);
        }
    }

    #[tokio::test]
    async fn repeated_calls_hit_the_table_cache() {
        let engine = engine_with(vec![employee("Alice", 120_000.0, 1.3)]);
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let first = engine
            .calculate(start, end, "baseline", ExecutionMode::Sequential, 0.0, None, None)
            .await
            .unwrap();
        let second = engine
            .calculate(start, end, "baseline", ExecutionMode::Sequential, 0.0, None, None)
            .await
            .unwrap();

        assert_eq!(first.rows, second.rows);
    }
}
