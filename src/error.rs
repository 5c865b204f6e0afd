use thiserror::Error;

use crate::models::OddsFormat;

/// Errors raised by the comparison core
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OddsError {
    /// A single quote carries a value that is not valid for its format.
    /// Recovered locally: the quote is dropped and counted.
    #[error("invalid {format} odds value: {value}")]
    InvalidOddsFormat { format: OddsFormat, value: f64 },

    /// Fewer than two usable sides for margin removal.
    /// Recovered locally: the market is skipped and counted.
    #[error("incomplete market: {0}")]
    IncompleteMarket(String),

    /// Run-level configuration is unusable. Fatal.
    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type OddsResult<T> = Result<T, OddsError>;
