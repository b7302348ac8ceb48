use thiserror::Error;

/// Errors surfaced by the fee engine.
///
/// The enum is `Clone` so a single in-flight refresh can hand the same outcome
/// to every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeeError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("CSV error: {0}")]
    Csv(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FeeError {
    /// Only transient I/O failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FeeError::Network(_))
    }
}

impl From<csv::Error> for FeeError {
    fn from(err: csv::Error) -> Self {
        FeeError::Csv(err.to_string())
    }
}

impl From<std::io::Error> for FeeError {
    fn from(err: std::io::Error) -> Self {
        FeeError::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FeeError>;
