use thiserror::Error;

/// RFC parsing and validation errors
#[derive(Error, Debug)]
pub enum RfcError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("RRule error: {0}")]
    RRuleError(String),

    #[error("Invalid iterator state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type RfcResult<T> = std::result::Result<T, RfcError>;
