use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CashCowError {
    #[error("invalid rule: {0}")]
    InvalidRule(String),

    #[error("no calculator named '{calc_name}' registered for entity type '{entity_type}'")]
    UnknownCalculator {
        entity_type: String,
        calc_name: String,
    },

    #[error("cyclic dependency among calculators for entity type '{entity_type}': {cycle}")]
    CyclicDependency { entity_type: String, cycle: String },

    #[error("engine error computing period {period} for entity '{entity}': {cause}")]
    EngineError {
        period: NaiveDate,
        entity: String,
        cause: String,
    },

    #[error("no scenario named '{0}' is registered")]
    ScenarioNotFound(String),

    #[error("calculation cancelled")]
    Cancelled,

    #[error("calculation exceeded its deadline")]
    DeadlineExceeded,

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CashCowError>;
