//! # tiffin-core: Pure Business Logic for Tiffin POS
//!
//! This crate is the **heart** of Tiffin POS. It contains all business logic
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tiffin POS Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    tiffin CLI (apps/cli)                        │   │
//! │  │    login ──► order add ──► checkout ──► backup run             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ Session::require(Permission)           │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tiffin-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   order   │  │ inventory │  │   │
//! │  │   │ MenuItem  │  │   Money   │  │ Customer  │  │ deduction │  │   │
//! │  │   │   Bill    │  │ quantity  │  │   Order   │  │  alerts   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐                  │   │
//! │  │   │   auth    │  │    upi    │  │ validation│                  │   │
//! │  │   │   roles   │  │  deep     │  │   rules   │                  │   │
//! │  │   │ sessions  │  │  links    │  │  checks   │                  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘                  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tiffin-db (Database Layer)                   │   │
//! │  │        SQLite queries, migrations, repositories, backup         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain entities (MenuItem, Bill, Ingredient, etc.)
//! - [`money`] - Money in paise (no floating point!)
//! - [`quantity`] - Ingredient quantities and units
//! - [`order`] - The per-table order state machine
//! - [`payment`] - Cash / UPI settlement
//! - [`inventory`] - Recipe deduction planning and low-stock alerts
//! - [`auth`] - Roles, permissions, password hashing, session tokens
//! - [`upi`] - UPI deep-link construction
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **No I/O**: Database, network and file system access live in tiffin-db
//! 2. **Integer Money**: All monetary values are in paise (i64)
//! 3. **Integer Stock**: Ingredient amounts are milli-units of a base dimension
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use tiffin_core::money::Money;
//!
//! let chai = Money::from_paise(1500); // ₹15.00
//! let samosa = Money::parse_rupees("12.50").unwrap();
//!
//! let total = chai * 2 + samosa;
//! assert_eq!(total.to_string(), "₹42.50");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod auth;
pub mod error;
pub mod inventory;
pub mod money;
pub mod order;
pub mod payment;
pub mod quantity;
pub mod types;
pub mod upi;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use auth::{Permission, Role, Session, SessionManager, User};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use order::{CustomerOrder, OrderLine};
pub use quantity::{Dimension, Quantity, Unit};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines on one order.
pub const MAX_ORDER_LINES: usize = 100;

/// Maximum quantity of a single line.
///
/// Catches typing 1000 instead of 10.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Highest menu price in paise (₹10,00,000).
pub const MAX_PRICE_PAISE: i64 = 100_000_000;
