//! Error types for the analysis engine
//!
//! Two kinds of failure, kept apart:
//! - data problems (bad HAR, bad DOM, bad timeline) are returned to the caller
//! - API misuse (mutating after freeze, finalizing twice) is a `Contract`
//!   error raised through `contract_violation!`, fatal in debug builds

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PagespeedError>;

#[derive(Debug, Error)]
pub enum PagespeedError {
    #[error("Input is not a JSON dictionary.")]
    InputNotDictionary,

    #[error("Failed to extract required field(s) from input JSON.")]
    MissingFields,

    #[error("could not parse HAR: {0}")]
    Har(String),

    #[error("error in timeline data: {0}")]
    Timeline(String),

    #[error("DOM error: {0}")]
    Dom(#[from] dom::DomError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid regex: {0}")]
    Regex(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid timing: {0}")]
    Timing(String),

    #[error("Contract violation: {0}")]
    Contract(String),
}

/// Report misuse of the API by its own caller.
///
/// Logs at error level, panics in debug builds, and evaluates to a
/// `PagespeedError::Contract` so release builds can degrade gracefully.
#[macro_export]
macro_rules! contract_violation {
    ($($arg:tt)*) => {{
        let message = format!($($arg)*);
        tracing::error!("{}", message);
        debug_assert!(false, "{}", message);
        $crate::error::PagespeedError::Contract(message)
    }};
}
