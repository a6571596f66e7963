//! # Validation Module
//!
//! Input validation utilities for Tiffin POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: CLI argument parsing (clap)                                  │
//! │  ├── Types, required arguments                                         │
//! │  └── Immediate operator feedback                                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Repository call (Rust)                                       │
//! │  └── THIS MODULE: Business rule validation                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  ├── UNIQUE constraints                                                │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,no_run
//! use tiffin_core::validation::{validate_menu_item_name, validate_quantity};
//!
//! validate_menu_item_name("Masala Dosa").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::quantity::Quantity;
use crate::{MAX_ITEM_QUANTITY, MAX_ORDER_LINES, MAX_PRICE_PAISE};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Trims, rejects empty values and values longer than `max` characters.
fn validate_name(field: &str, value: &str, max: usize) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(value.to_string())
}

/// Validates a menu item name and returns it trimmed.
///
/// ## Example
/// ```rust
/// use tiffin_core::validation::validate_menu_item_name;
///
/// assert_eq!(validate_menu_item_name("  Idli ").unwrap(), "Idli");
/// assert!(validate_menu_item_name("").is_err());
/// ```
pub fn validate_menu_item_name(name: &str) -> ValidationResult<String> {
    validate_name("name", name, 100)
}

pub fn validate_category_name(name: &str) -> ValidationResult<String> {
    validate_name("category", name, 50)
}

pub fn validate_ingredient_name(name: &str) -> ValidationResult<String> {
    validate_name("ingredient", name, 100)
}

/// Optional free text (descriptions). Empty becomes `None`.
pub fn validate_description(description: Option<&str>) -> ValidationResult<Option<String>> {
    match description.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) if text.chars().count() > 500 => Err(ValidationError::TooLong {
            field: "description".to_string(),
            max: 500,
        }),
        Some(text) => Ok(Some(text.to_string())),
    }
}

/// Case-folded name used for duplicate checks and lookups.
///
/// Folds non-ASCII letters too, unlike SQLite's `NOCASE`.
///
/// ```rust
/// use tiffin_core::validation::name_key;
///
/// assert_eq!(name_key(" CRÈME Brûlée "), name_key("crème brûlée"));
/// ```
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Validates a login name.
///
/// ## Rules
/// - 3 to 32 characters
/// - ASCII letters, digits, `_`, `.` and `-` only
pub fn validate_username(username: &str) -> ValidationResult<String> {
    let username = username.trim();

    if username.is_empty() {
        return Err(ValidationError::Required {
            field: "username".to_string(),
        });
    }
    if username.len() < 3 {
        return Err(ValidationError::TooShort {
            field: "username".to_string(),
            min: 3,
        });
    }
    if username.len() > 32 {
        return Err(ValidationError::TooLong {
            field: "username".to_string(),
            max: 32,
        });
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "username".to_string(),
            reason: "must contain only letters, numbers, '_', '.' and '-'".to_string(),
        });
    }

    Ok(username.to_string())
}

/// Passwords are not trimmed. Minimum 6 characters, maximum 128.
pub fn validate_password(password: &str) -> ValidationResult<()> {
    let len = password.chars().count();
    if len < 6 {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: 6,
        });
    }
    if len > 128 {
        return Err(ValidationError::TooLong {
            field: "password".to_string(),
            max: 128,
        });
    }
    Ok(())
}

/// Optional customer phone: digits with an optional leading `+`, 7 to 15 digits.
///
/// ```rust
/// use tiffin_core::validation::validate_phone;
///
/// assert_eq!(validate_phone(Some(" +91 98765 43210 ")).unwrap().as_deref(), Some("+919876543210"));
/// assert_eq!(validate_phone(Some("")).unwrap(), None);
/// assert!(validate_phone(Some("call me")).is_err());
/// ```
pub fn validate_phone(phone: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(raw) = phone.map(str::trim).filter(|p| !p.is_empty()) else {
        return Ok(None);
    };

    let compact: String = raw.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
    let digits = compact.strip_prefix('+').unwrap_or(&compact);

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must contain only digits".to_string(),
        });
    }
    if !(7..=15).contains(&digits.len()) {
        return Err(ValidationError::OutOfRange {
            field: "phone digits".to_string(),
            min: 7,
            max: 15,
        });
    }

    Ok(Some(compact))
}

/// Validates a UPI virtual payment address (`handle@provider`).
///
/// ```rust
/// use tiffin_core::validation::validate_vpa;
///
/// assert!(validate_vpa("annapurna.tiffin@okaxis").is_ok());
/// assert!(validate_vpa("no-at-sign").is_err());
/// assert!(validate_vpa("two@at@signs").is_err());
/// ```
pub fn validate_vpa(vpa: &str) -> ValidationResult<String> {
    let vpa = vpa.trim();
    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "UPI id".to_string(),
        reason: reason.to_string(),
    };

    let (handle, provider) = vpa
        .split_once('@')
        .ok_or_else(|| invalid("must look like handle@provider"))?;

    if handle.is_empty() || provider.is_empty() || provider.contains('@') {
        return Err(invalid("must look like handle@provider"));
    }
    if !handle
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(invalid("handle may contain letters, numbers, '.', '_' and '-'"));
    }
    if !provider.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid("provider may contain letters and numbers only"));
    }
    if vpa.len() > 255 {
        return Err(ValidationError::TooLong {
            field: "UPI id".to_string(),
            max: 255,
        });
    }

    Ok(vpa.to_string())
}

/// Validates a search query.
///
/// ## Rules
/// - Can be empty (returns all results)
/// - Maximum 100 characters
///
/// ## Returns
/// The trimmed query string.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an order line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a menu price in paise. Free items are not allowed, and
/// prices stop at `MAX_PRICE_PAISE`.
///
/// ## Example
/// ```rust
/// use tiffin_core::validation::validate_price_paise;
///
/// assert!(validate_price_paise(14950).is_ok());
/// assert!(validate_price_paise(0).is_err());
/// assert!(validate_price_paise(-100).is_err());
/// assert!(validate_price_paise(i64::MAX).is_err());
/// ```
pub fn validate_price_paise(paise: i64) -> ValidationResult<()> {
    if paise <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "price".to_string(),
        });
    }

    if paise > MAX_PRICE_PAISE {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 1,
            max: MAX_PRICE_PAISE,
        });
    }

    Ok(())
}

/// Stock and recipe amounts must stay within `Quantity::MAX` either way.
pub fn validate_stock_amount(field: &str, amount: Quantity) -> ValidationResult<()> {
    if amount.milli().unsigned_abs() > Quantity::MAX.milli().unsigned_abs() {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: -Quantity::MAX.milli(),
            max: Quantity::MAX.milli(),
        });
    }
    Ok(())
}

/// Table/customer numbers start at 1.
pub fn validate_customer_number(number: i64) -> ValidationResult<()> {
    if number <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "customer number".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Checks that one more distinct line fits on an order.
pub fn validate_order_size(current_lines: usize) -> CoreResult<()> {
    if current_lines >= MAX_ORDER_LINES {
        return Err(CoreError::OrderTooLarge {
            max: MAX_ORDER_LINES,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
