use thiserror::Error;

/// Service layer errors - combines all error types
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    DatabaseError(#[from] adgroup_db::error::DbError),

    #[error(transparent)]
    CoreError(#[from] adgroup_core::error::CoreError),

    #[error("Diesel error: {0}")]
    DieselError(#[from] diesel::result::Error),

    /// Bad input shape or content.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Input refers to an entity that does not exist.
    #[error("Reference error: {0}")]
    ReferenceError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionError(String),

    /// The change would break a data invariant.
    #[error("Constraint violation: {0}")]
    ConstraintError(String),
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Failure category, for callers that map errors to responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Reference,
    NotFound,
    Permission,
    Constraint,
    Internal,
}

impl ServiceError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationError(_)
            | Self::CoreError(adgroup_core::error::CoreError::InvalidInput(_)) => {
                ErrorKind::Validation
            }
            Self::ReferenceError(_) => ErrorKind::Reference,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::PermissionError(_) => ErrorKind::Permission,
            Self::ConstraintError(_) => ErrorKind::Constraint,
            Self::DatabaseError(_) | Self::CoreError(_) | Self::DieselError(_) => {
                ErrorKind::Internal
            }
        }
    }
}
