use thiserror::Error;

/// Errors raised below the service layer: settings and shared value types.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A setting is present but unusable.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A value could not be parsed into one of the shared types.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(&'static str),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
