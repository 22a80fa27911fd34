use sea_orm::DbErr;
use serde::Serialize;
use std::fmt;

/// Error types for store operations and session-level business rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusinessError {
    /// Malformed input, e.g. an import document or a missing required field
    ValidationError { field: String, message: String },
    /// Business rule violations (editor missing, operation already in flight)
    BusinessRuleViolation { rule: String, message: String },
    /// Operation referenced a sample that does not exist
    NotFound { resource: String, id: String },
    /// Session has not passed the access gate
    Forbidden { action: String, resource: String },
    /// Underlying storage I/O or transaction error
    StorageFailure { operation: String, message: String },
}

impl fmt::Display for BusinessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusinessError::ValidationError { field, message } => {
                write!(f, "Validation error in field '{field}': {message}")
            }
            BusinessError::BusinessRuleViolation { rule, message } => {
                write!(f, "Business rule '{rule}' violated: {message}")
            }
            BusinessError::NotFound { resource, id } => {
                write!(f, "{resource} with id '{id}' not found")
            }
            BusinessError::Forbidden { action, resource } => {
                write!(f, "Not authorized to {action} {resource}")
            }
            BusinessError::StorageFailure { operation, message } => {
                write!(f, "Storage failure during {operation}: {message}")
            }
        }
    }
}

impl std::error::Error for BusinessError {}

/// Stable machine-readable code, used in notifications and CLI exit paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    BusinessRuleViolation,
    ResourceNotFound,
    Forbidden,
    StorageFailure,
}

impl BusinessError {
    pub fn code(&self) -> ErrorCode {
        match self {
            BusinessError::ValidationError { .. } => ErrorCode::ValidationError,
            BusinessError::BusinessRuleViolation { .. } => ErrorCode::BusinessRuleViolation,
            BusinessError::NotFound { .. } => ErrorCode::ResourceNotFound,
            BusinessError::Forbidden { .. } => ErrorCode::Forbidden,
            BusinessError::StorageFailure { .. } => ErrorCode::StorageFailure,
        }
    }
}

/// Maps database errors into business errors with the operation as context.
/// Not-found and validation errors are raised by the store itself, so every
/// `DbErr` here is a storage failure.
pub struct ErrorMapper;

impl ErrorMapper {
    pub fn map_db_error(err: DbErr, context: &str) -> BusinessError {
        let message = match err {
            DbErr::Json(msg) => format!("stored row is malformed: {msg}"),
            other => other.to_string(),
        };
        BusinessError::StorageFailure {
            operation: context.to_string(),
            message,
        }
    }
}

#[macro_export]
macro_rules! validation_error {
    ($field:expr, $message:expr) => {
        $crate::common::errors::BusinessError::ValidationError {
            field: $field.to_string(),
            message: $message.to_string(),
        }
    };
}

#[macro_export]
macro_rules! business_rule_violation {
    ($rule:expr, $message:expr) => {
        $crate::common::errors::BusinessError::BusinessRuleViolation {
            rule: $rule.to_string(),
            message: $message.to_string(),
        }
    };
}

#[macro_export]
macro_rules! not_found {
    ($resource:expr, $id:expr) => {
        $crate::common::errors::BusinessError::NotFound {
            resource: $resource.to_string(),
            id: $id.to_string(),
        }
    };
}

#[macro_export]
macro_rules! storage_failure {
    ($operation:expr, $message:expr) => {
        $crate::common::errors::BusinessError::StorageFailure {
            operation: $operation.to_string(),
            message: $message.to_string(),
        }
    };
}

/// Extension trait to add business error conversion to `DbErr`
pub trait DbErrorExt {
    fn to_business_error(self, context: &str) -> BusinessError;
}

impl DbErrorExt for DbErr {
    fn to_business_error(self, context: &str) -> BusinessError {
        ErrorMapper::map_db_error(self, context)
    }
}

/// Extension for `Result<T, DbErr>` so store code can write `.context("add_sample")?`
pub trait DbResultExt<T> {
    /// # Errors
    /// Returns the mapped `BusinessError` when the inner result is an error.
    fn context(self, context: &str) -> BusinessResult<T>;
}

impl<T> DbResultExt<T> for Result<T, DbErr> {
    fn context(self, context: &str) -> BusinessResult<T> {
        self.map_err(|err| err.to_business_error(context))
    }
}

/// Result type alias for business operations
pub type BusinessResult<T> = Result<T, BusinessError>;
