//! # Error Types
//!
//! Domain-specific error types for tiffin-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tiffin-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tiffin-db errors (separate crate)                                     │
//! │  └── DbError          - Database / backup failures (wraps CoreError)   │
//! │                                                                         │
//! │  CLI errors (in app)                                                   │
//! │  └── CliError         - What the operator sees                         │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → CliError → terminal     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Menu item cannot be found (or was soft-deleted).
    #[error("Menu item not found: {0}")]
    MenuItemNotFound(String),

    /// Menu item exists but is switched off for ordering.
    #[error("Menu item '{0}' is not available")]
    MenuItemUnavailable(String),

    /// Category still has active menu items.
    #[error("Category '{name}' still has {items} active item(s)")]
    CategoryNotEmpty { name: String, items: i64 },

    /// Removed items of the category are still on open orders.
    #[error("Category '{name}' has items on {orders} open order(s)")]
    CategoryInUse { name: String, orders: i64 },

    /// No order is open for this customer/table number.
    #[error("No order for customer {0}")]
    OrderNotFound(i64),

    /// Order is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Editing an order after it was completed or cancelled
    /// - Checking out a cancelled order
    #[error("Order {customer_number} is {current_status}, cannot {operation}")]
    InvalidOrderStatus {
        customer_number: i64,
        current_status: String,
        operation: String,
    },

    /// Checkout of an order with no lines.
    #[error("Order {0} has no items")]
    EmptyOrder(i64),

    /// Order has exceeded the maximum number of distinct lines.
    #[error("Order cannot have more than {max} items")]
    OrderTooLarge { max: usize },

    /// Line quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Cash tendered does not cover the bill.
    #[error("Insufficient payment: total {total}, tendered {tendered}")]
    InsufficientPayment { total: String, tendered: String },

    /// Recipe unit cannot be converted to the ingredient's unit.
    #[error("Cannot convert {from} to {to} for {ingredient}")]
    UnitMismatch {
        ingredient: String,
        from: String,
        to: String,
    },

    /// Role lacks the permission for an action.
    #[error("{role} is not allowed to {permission}")]
    PermissionDenied { role: String, permission: String },

    /// Username/password pair did not match an active user.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Session token missing, expired or tampered with.
    #[error("Invalid session: {0}")]
    InvalidSession(String),

    /// Password hashing failed (never includes the password).
    #[error("Credential error: {0}")]
    Credential(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UPI id, invalid unit).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., duplicate menu item name in a category).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InvalidOrderStatus {
            customer_number: 7,
            current_status: "cancelled".to_string(),
            operation: "add items".to_string(),
        };
        assert_eq!(err.to_string(), "Order 7 is cancelled, cannot add items");

        let err = CoreError::PermissionDenied {
            role: "staff".to_string(),
            permission: "manage menu".to_string(),
        };
        assert_eq!(err.to_string(), "staff is not allowed to manage menu");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Duplicate {
            field: "menu item".to_string(),
            value: "Masala Dosa".to_string(),
        };
        assert_eq!(err.to_string(), "menu item 'Masala Dosa' already exists");

        let err = ValidationError::MustBePositive {
            field: "price".to_string(),
        };
        assert_eq!(err.to_string(), "price must be positive");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::Required {
            field: "name".to_string(),
        }
        .into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
