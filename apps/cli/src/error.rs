//! # CLI Error Type
//!
//! Unified error type for commands: a machine-readable code and an
//! operator-facing message.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the tiffin CLI                         │
//! │                                                                         │
//! │  tiffin checkout 4 --cash 100                                           │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Command Function -> CliResult<()>                               │  │
//! │  │         │                                                        │  │
//! │  │  Database Error? ─── DbError::QueryFailed(..) ── logged ──┐      │  │
//! │  │         │                                                 │      │  │
//! │  │  Business rule? ─── CoreError::InsufficientPayment ── CliError ─►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  stderr: "error: Insufficient payment: total ₹220.00, tendered ₹1.00"   │
//! │  exit code: 4 (payment)                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Database internals never reach the terminal: they are logged with
//! `tracing::error!` and replaced by a generic message.

use std::process::ExitCode;

use serde::Serialize;
use tiffin_core::CoreError;
use tiffin_db::DbError;

use crate::state::ConfigError;

#[derive(Debug, Clone, Serialize)]
pub struct CliError {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    ValidationError,
    BusinessLogic,
    PaymentError,
    /// No token, or the token is expired or invalid.
    Unauthenticated,
    PermissionDenied,
    DatabaseError,
    BackupError,
    ConfigError,
    Internal,
}

impl ErrorCode {
    /// Process exit status for this kind of failure.
    pub fn exit_status(&self) -> u8 {
        match self {
            ErrorCode::ValidationError | ErrorCode::NotFound => 2,
            ErrorCode::BusinessLogic => 3,
            ErrorCode::PaymentError => 4,
            ErrorCode::Unauthenticated | ErrorCode::PermissionDenied => 5,
            ErrorCode::ConfigError => 6,
            ErrorCode::DatabaseError | ErrorCode::BackupError | ErrorCode::Internal => 1,
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        CliError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        CliError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        CliError::new(ErrorCode::ValidationError, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        CliError::new(ErrorCode::Unauthenticated, message)
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code.exit_status())
    }
}

impl From<DbError> for CliError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => CliError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => CliError::validation(format!(
                "{} '{}' already exists",
                field, value
            )),
            DbError::Core(e) => CliError::from(e),
            DbError::Backup(e) => {
                tracing::error!("Backup failed: {}", e);
                CliError::new(ErrorCode::BackupError, format!("Backup failed: {}", e))
            }
            DbError::ConnectionFailed(e) => {
                tracing::error!("Database connection failed: {}", e);
                CliError::new(ErrorCode::DatabaseError, "Could not open the database")
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Migration failed: {}", e);
                CliError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                CliError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::TransactionFailed(e) => {
                tracing::error!("Transaction failed: {}", e);
                CliError::new(ErrorCode::DatabaseError, "Database transaction failed")
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                CliError::validation("Invalid reference")
            }
            DbError::PoolExhausted => {
                CliError::new(ErrorCode::DatabaseError, "Database is busy, try again")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                CliError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let code = match &err {
            CoreError::MenuItemNotFound(_) | CoreError::OrderNotFound(_) => ErrorCode::NotFound,
            CoreError::InsufficientPayment { .. } => ErrorCode::PaymentError,
            CoreError::PermissionDenied { .. } => ErrorCode::PermissionDenied,
            CoreError::InvalidCredentials | CoreError::InvalidSession(_) => {
                ErrorCode::Unauthenticated
            }
            CoreError::QuantityTooLarge { .. }
            | CoreError::UnitMismatch { .. }
            | CoreError::Validation(_) => ErrorCode::ValidationError,
            CoreError::Credential(e) => {
                tracing::error!("Credential error: {}", e);
                return CliError::new(ErrorCode::Internal, "Could not process credentials");
            }
            CoreError::MenuItemUnavailable(_)
            | CoreError::CategoryNotEmpty { .. }
            | CoreError::CategoryInUse { .. }
            | CoreError::InvalidOrderStatus { .. }
            | CoreError::EmptyOrder(_)
            | CoreError::OrderTooLarge { .. } => ErrorCode::BusinessLogic,
        };
        CliError::new(code, err.to_string())
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::new(ErrorCode::ConfigError, err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::new(ErrorCode::Internal, format!("Could not encode output: {}", err))
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

#[cfg(test)]
mod tests {
    use super::*;
    use tiffin_core::ValidationError;

    #[test]
    fn test_core_error_codes() {
        let err = CliError::from(CoreError::InsufficientPayment {
            total: "₹220.00".to_string(),
            tendered: "₹1.00".to_string(),
        });
        assert_eq!(err.code, ErrorCode::PaymentError);
        assert_eq!(err.code.exit_status(), 4);

        let err = CliError::from(CoreError::PermissionDenied {
            role: "staff".to_string(),
            permission: "run backups".to_string(),
        });
        assert_eq!(err.code, ErrorCode::PermissionDenied);

        let err = CliError::from(CoreError::Validation(ValidationError::MustBePositive {
            field: "price".to_string(),
        }));
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[test]
    fn test_db_internals_are_hidden() {
        let err = CliError::from(DbError::QueryFailed("no such table: bills".to_string()));
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(!err.message.contains("bills"));

        let err = CliError::from(DbError::Core(CoreError::OrderNotFound(7)));
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.message, "No order for customer 7");
    }
}
