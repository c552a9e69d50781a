//! Consumes a `ForecastTable` and produces a flat metrics map plus a list
//! of threshold-triggered alerts (§4.7).

use crate::engine::ForecastTable;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone)]
pub struct Alert {
    pub level: AlertLevel,
    pub metric: String,
    pub message: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, Default)]
pub struct KpiResult {
    pub metrics: BTreeMap<String, f64>,
    pub alerts: Vec<Alert>,
}

const EPSILON: f64 = 1e-9;

/// First row where `cash_balance <= 0`, linearly interpolated between it
/// and the last positive row. `None` if the balance never crosses zero.
fn runway_months(table: &ForecastTable, starting_cash: f64, burn_rate: f64) -> f64 {
    let rows = &table.rows;
    for (idx, row) in rows.iter().enumerate() {
        if row.cash_balance <= 0.0 {
            if idx == 0 {
                return 0.0;
            }
            let prev_balance = rows[idx - 1].cash_balance;
            let next_balance = row.cash_balance;
            let fraction = prev_balance / (prev_balance - next_balance);
            return idx as f64 + fraction;
        }
    }
    starting_cash / burn_rate.max(EPSILON)
}

fn burn_rate(table: &ForecastTable) -> f64 {
    let negatives: Vec<f64> = table
        .rows
        .iter()
        .filter(|r| r.net_cash_flow < 0.0)
        .map(|r| r.net_cash_flow.abs())
        .collect();
    if negatives.is_empty() {
        0.0
    } else {
        negatives.iter().sum::<f64>() / negatives.len() as f64
    }
}

fn cash_efficiency(table: &ForecastTable) -> Option<f64> {
    let revenue_sum: f64 = table.rows.iter().map(|r| r.total_revenue).sum();
    let negative_outflow: f64 = table
        .rows
        .iter()
        .filter(|r| r.net_cash_flow < 0.0)
        .map(|r| r.net_cash_flow.abs())
        .sum();
    if negative_outflow.abs() < EPSILON {
        None
    } else {
        Some(revenue_sum / negative_outflow)
    }
}

fn months_to_breakeven(table: &ForecastTable) -> Option<f64> {
    let mut seen_negative = false;
    for (idx, row) in table.rows.iter().enumerate() {
        if row.cumulative_cash_flow < 0.0 {
            seen_negative = true;
        } else if seen_negative && row.cumulative_cash_flow >= 0.0 {
            return Some(idx as f64);
        }
    }
    None
}

fn sample_stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0);
    variance.sqrt()
}

fn quarter_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Monthly CAGR from the first quarter's mean revenue to the last
/// quarter's, over the number of periods between their midpoints.
fn revenue_growth_rate(table: &ForecastTable) -> f64 {
    let revenues: Vec<f64> = table.rows.iter().map(|r| r.total_revenue).collect();
    if revenues.len() < 2 {
        return 0.0;
    }

    let quarter_len = revenues.len().min(3);
    let early = quarter_mean(&revenues[..quarter_len]);
    let recent = quarter_mean(&revenues[revenues.len() - quarter_len..]);
    let periods = (revenues.len() - 1) as f64;

    if early.abs() < EPSILON || periods <= 0.0 {
        return 0.0;
    }

    (recent / early).powf(1.0 / periods) - 1.0
}

/// Closed-form OLS slope of `total_revenue` against the period index.
fn revenue_trend(table: &ForecastTable) -> f64 {
    let n = table.rows.len();
    if n < 2 {
        return 0.0;
    }

    let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let ys: Vec<f64> = table.rows.iter().map(|r| r.total_revenue).collect();

    let x_mean = xs.iter().sum::<f64>() / n as f64;
    let y_mean = ys.iter().sum::<f64>() / n as f64;

    let numerator: f64 = xs.iter().zip(&ys).map(|(x, y)| (x - x_mean) * (y - y_mean)).sum();
    let denominator: f64 = xs.iter().map(|x| (x - x_mean).powi(2)).sum();

    if denominator.abs() < EPSILON {
        0.0
    } else {
        numerator / denominator
    }
}

/// `1 - sum(share_i^2)` across the four revenue buckets (Herfindahl-style
/// diversification index: 0 means fully concentrated, approaches 1 as
/// revenue spreads evenly across buckets).
fn revenue_diversification(table: &ForecastTable) -> f64 {
    let grant: f64 = table.rows.iter().map(|r| r.grant_revenue).sum();
    let investment: f64 = table.rows.iter().map(|r| r.investment_revenue).sum();
    let sales: f64 = table.rows.iter().map(|r| r.sales_revenue).sum();
    let service: f64 = table.rows.iter().map(|r| r.service_revenue).sum();
    let total = grant + investment + sales + service;

    if total.abs() < EPSILON {
        return 0.0;
    }

    let shares = [grant, investment, sales, service].map(|v| v / total);
    1.0 - shares.iter().map(|s| s * s).sum::<f64>()
}

fn mean_active_employees(table: &ForecastTable) -> f64 {
    if table.rows.is_empty() {
        return 0.0;
    }
    table.rows.iter().map(|r| r.active_employees as f64).sum::<f64>() / table.rows.len() as f64
}

fn peak_active_employees(table: &ForecastTable) -> f64 {
    table.rows.iter().map(|r| r.active_employees).max().unwrap_or(0) as f64
}

fn rd_percentage(table: &ForecastTable) -> Option<f64> {
    let project_costs: f64 = table.rows.iter().map(|r| r.project_costs).sum();
    let total_expenses: f64 = table.rows.iter().map(|r| r.total_expenses).sum();
    if total_expenses.abs() < EPSILON {
        None
    } else {
        Some(project_costs / total_expenses)
    }
}

/// Revenue generated per dollar of employee cost: `sum(total_revenue) /
/// sum(employee_costs)`. `None` if the book has no employee spend.
fn employee_cost_efficiency(table: &ForecastTable) -> Option<f64> {
    let revenue: f64 = table.rows.iter().map(|r| r.total_revenue).sum();
    let employee_costs: f64 = table.rows.iter().map(|r| r.employee_costs).sum();
    if employee_costs.abs() < EPSILON {
        None
    } else {
        Some(revenue / employee_costs)
    }
}

fn revenue_concentration_risk(table: &ForecastTable) -> f64 {
    let grant: f64 = table.rows.iter().map(|r| r.grant_revenue).sum();
    let investment: f64 = table.rows.iter().map(|r| r.investment_revenue).sum();
    let sales: f64 = table.rows.iter().map(|r| r.sales_revenue).sum();
    let service: f64 = table.rows.iter().map(|r| r.service_revenue).sum();
    let total = grant + investment + sales + service;

    if total.abs() < EPSILON {
        return 0.0;
    }
    [grant, investment, sales, service]
        .iter()
        .map(|v| v / total)
        .fold(0.0, f64::max)
}

fn funding_dependency(table: &ForecastTable) -> Option<f64> {
    let grant: f64 = table.rows.iter().map(|r| r.grant_revenue).sum();
    let investment: f64 = table.rows.iter().map(|r| r.investment_revenue).sum();
    let total_revenue: f64 = table.rows.iter().map(|r| r.total_revenue).sum();
    if total_revenue.abs() < EPSILON {
        None
    } else {
        Some((grant + investment) / total_revenue)
    }
}

/// `Δrevenue% / Δexpenses%` from the first to the last row.
fn operating_leverage(table: &ForecastTable) -> Option<f64> {
    let first = table.rows.first()?;
    let last = table.rows.last()?;
    if first.total_revenue.abs() < EPSILON || first.total_expenses.abs() < EPSILON {
        return None;
    }

    let revenue_delta_pct = (last.total_revenue - first.total_revenue) / first.total_revenue;
    let expense_delta_pct = (last.total_expenses - first.total_expenses) / first.total_expenses;

    if expense_delta_pct.abs() < EPSILON {
        None
    } else {
        Some(revenue_delta_pct / expense_delta_pct)
    }
}

pub fn compute(table: &ForecastTable, starting_cash: f64) -> KpiResult {
    let mut metrics = BTreeMap::new();

    let burn = burn_rate(table);
    let runway = runway_months(table, starting_cash, burn);
    let volatility = sample_stddev(&table.rows.iter().map(|r| r.net_cash_flow).collect::<Vec<_>>());
    let mean_abs_net_flow = if table.rows.is_empty() {
        0.0
    } else {
        table.rows.iter().map(|r| r.net_cash_flow.abs()).sum::<f64>() / table.rows.len() as f64
    };

    metrics.insert("runway_months".to_string(), runway);
    metrics.insert("burn_rate".to_string(), burn);
    if let Some(v) = cash_efficiency(table) {
        metrics.insert("cash_efficiency".to_string(), v);
    }
    if let Some(v) = months_to_breakeven(table) {
        metrics.insert("months_to_breakeven".to_string(), v);
    }
    metrics.insert("cash_flow_volatility".to_string(), volatility);
    // Not itself a reported KPI, but the volatility alert's threshold
    // (§4.7: "> 2*mean(|net_cash_flow|)") needs it, and `alerts_for` takes
    // only the metrics map per §6.3's `kpis.alerts(metrics)` signature.
    metrics.insert("_mean_abs_net_cash_flow".to_string(), mean_abs_net_flow);

    metrics.insert("revenue_growth_rate".to_string(), revenue_growth_rate(table));
    metrics.insert("revenue_trend".to_string(), revenue_trend(table));
    metrics.insert("revenue_diversification".to_string(), revenue_diversification(table));

    metrics.insert("mean_active_employees".to_string(), mean_active_employees(table));
    metrics.insert("peak_active_employees".to_string(), peak_active_employees(table));
    if let Some(v) = rd_percentage(table) {
        metrics.insert("rd_percentage".to_string(), v);
    }
    if let Some(v) = employee_cost_efficiency(table) {
        metrics.insert("employee_cost_efficiency".to_string(), v);
    }
    if let Some(v) = operating_leverage(table) {
        metrics.insert("operating_leverage".to_string(), v);
    }
    metrics.insert(
        "revenue_concentration_risk".to_string(),
        revenue_concentration_risk(table),
    );
    if let Some(v) = funding_dependency(table) {
        metrics.insert("funding_dependency".to_string(), v);
    }

    let alerts = alerts_for(&metrics);
    metrics.remove("_mean_abs_net_cash_flow");

    KpiResult { metrics, alerts }
}

/// `kpis.alerts(metrics)` from §6.3: a pure function of the metrics map,
/// no side effects, matching §4.7's "alert generation has no side
/// effects".
pub fn alerts_for(metrics: &BTreeMap<String, f64>) -> Vec<Alert> {
    let mean_abs_net_flow = metrics.get("_mean_abs_net_cash_flow").copied().unwrap_or(0.0);
    let mut alerts = Vec::new();

    if let Some(&runway) = metrics.get("runway_months") {
        if runway < 3.0 {
            alerts.push(Alert {
                level: AlertLevel::Critical,
                metric: "runway_months".to_string(),
                message: "Runway below 3 months".to_string(),
                recommendation: "Secure additional funding or cut burn immediately.".to_string(),
            });
        } else if runway < 6.0 {
            alerts.push(Alert {
                level: AlertLevel::Warning,
                metric: "runway_months".to_string(),
                message: "Runway below 6 months".to_string(),
                recommendation: "Begin fundraising or reduce discretionary spend.".to_string(),
            });
        }
    }

    if let Some(&burn) = metrics.get("burn_rate") {
        if burn > 100_000.0 {
            alerts.push(Alert {
                level: AlertLevel::Warning,
                metric: "burn_rate".to_string(),
                message: "High burn rate".to_string(),
                recommendation: "Review largest expense categories for cuts.".to_string(),
            });
        }
    }

    if let Some(&concentration) = metrics.get("revenue_concentration_risk") {
        if concentration > 0.8 {
            alerts.push(Alert {
                level: AlertLevel::Warning,
                metric: "revenue_concentration_risk".to_string(),
                message: "Revenue highly concentrated".to_string(),
                recommendation: "Diversify revenue sources to reduce single-source risk.".to_string(),
            });
        }
    }

    if let Some(&volatility) = metrics.get("cash_flow_volatility") {
        if volatility > 2.0 * mean_abs_net_flow {
            alerts.push(Alert {
                level: AlertLevel::Info,
                metric: "cash_flow_volatility".to_string(),
                message: "High cash-flow volatility".to_string(),
                recommendation: "Smooth revenue or expense timing where possible.".to_string(),
            });
        }
    }

    if let Some(&rd) = metrics.get("rd_percentage") {
        if rd > 0.4 {
            alerts.push(Alert {
                level: AlertLevel::Info,
                metric: "rd_percentage".to_string(),
                message: "R&D spend above 40%".to_string(),
                recommendation: "Confirm R&D investment matches strategic priorities.".to_string(),
            });
        }
    }

    alerts
}
