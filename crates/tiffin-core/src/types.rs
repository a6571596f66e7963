//! # Domain Types
//!
//! Core domain types used throughout Tiffin POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  MenuCategory   │◄──│    MenuItem     │◄──│   RecipeLine    │       │
//! │  │  id, name       │   │  category_id FK │   │  ingredient_id  │       │
//! │  └─────────────────┘   │  price_paise    │   │  quantity       │       │
//! │                        └────────┬────────┘   └────────┬────────┘       │
//! │                                 │ snapshot            │                │
//! │                        ┌────────▼────────┐   ┌────────▼────────┐       │
//! │                        │  CustomerOrder  │   │   Ingredient    │       │
//! │                        │  (order.rs)     │   │  InventoryItem  │       │
//! │                        └────────┬────────┘   └─────────────────┘       │
//! │                                 │ checkout                              │
//! │              ┌──────────────────┼──────────────────┐                    │
//! │     ┌────────▼────────┐ ┌───────▼───────┐ ┌────────▼────────┐          │
//! │     │      Bill       │ │   BillItem    │ │   SalesRecord   │          │
//! │     │  payment_method │ │  (snapshot)   │ │  (report copy)  │          │
//! │     └─────────────────┘ └───────────────┘ └─────────────────┘          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Monetary columns are `*_paise: i64`; ingredient amounts are `*_milli: i64`
//! (see [`crate::quantity`]). Accessors wrap them in [`Money`] / [`Quantity`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::quantity::{Quantity, Unit};

// =============================================================================
// Menu
// =============================================================================

/// A menu section such as "Starters" or "Beverages".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct MenuCategory {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A dish or drink that can be ordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct MenuItem {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Owning category (typed foreign key, survives category renames).
    pub category_id: String,

    /// Display name shown to staff and printed on the bill.
    pub name: String,

    pub description: Option<String>,

    /// Price in paise. Always > 0.
    pub price_paise: i64,

    pub is_vegetarian: bool,

    /// Temporarily off the menu (sold out, seasonal).
    pub is_available: bool,

    /// Soft delete flag.
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MenuItem {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_paise(self.price_paise)
    }

    /// Whether the item can be added to an order right now.
    pub fn is_orderable(&self) -> bool {
        self.is_active && self.is_available
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// The state of a table's order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Items are still being added.
    #[default]
    Pending,
    /// Billed and paid.
    Completed,
    /// Abandoned before billing.
    Cancelled,
}

impl OrderStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash payment.
    Cash,
    /// Paid through a UPI app (deep link or QR).
    Upi,
}

impl PaymentMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Upi => "upi",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Bill
// =============================================================================

/// A finalized, paid transaction. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Bill {
    pub id: String,
    /// Human-readable number printed on the bill: `YYYYMMDD-NNNN`.
    pub bill_number: String,
    /// Table/customer number the order was taken under.
    pub customer_number: i64,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub total_paise: i64,
    pub payment_method: PaymentMethod,
    /// Cash handed over (cash payments only).
    pub tendered_paise: Option<i64>,
    /// Change returned (cash payments only).
    pub change_paise: Option<i64>,
    /// UPI transaction reference, if the cashier recorded one.
    pub upi_reference: Option<String>,
    /// User who took the payment.
    pub cashier_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Bill {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_paise(self.total_paise)
    }
}

/// A line on a bill. Uses the snapshot pattern: name and price are frozen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct BillItem {
    pub id: String,
    pub bill_id: String,
    pub menu_item_id: String,
    pub name: String,
    pub unit_price_paise: i64,
    pub quantity: i64,
    pub total_price_paise: i64,
}

impl BillItem {
    #[inline]
    pub fn total_price(&self) -> Money {
        Money::from_paise(self.total_price_paise)
    }
}

// =============================================================================
// Inventory
// =============================================================================

/// A raw material tracked in stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Ingredient {
    pub id: String,
    pub name: String,
    /// Unit used for display and input. Storage is in the base of its dimension.
    pub unit: Unit,
    pub created_at: DateTime<Utc>,
}

/// Stock levels for one ingredient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryItem {
    pub ingredient_id: String,
    pub current_milli: i64,
    pub minimum_milli: i64,
    pub full_milli: i64,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    #[inline]
    pub fn current(&self) -> Quantity {
        Quantity::from_milli(self.current_milli)
    }

    #[inline]
    pub fn minimum(&self) -> Quantity {
        Quantity::from_milli(self.minimum_milli)
    }

    #[inline]
    pub fn full(&self) -> Quantity {
        Quantity::from_milli(self.full_milli)
    }
}

/// How much of an ingredient one serving of a menu item consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RecipeLine {
    pub menu_item_id: String,
    pub ingredient_id: String,
    /// Amount per serving in milli-base units of the ingredient's dimension.
    pub quantity_milli: i64,
    /// Unit the recipe was written in (display only).
    pub unit: Unit,
}

impl RecipeLine {
    #[inline]
    pub fn quantity(&self) -> Quantity {
        Quantity::from_milli(self.quantity_milli)
    }
}

// =============================================================================
// Reporting
// =============================================================================

/// Denormalized copy of a sold line, kept after bills are backed up and deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SalesRecord {
    pub id: String,
    /// Bill the sale came from (not a foreign key).
    pub bill_id: String,
    pub menu_item_id: String,
    pub item_name: String,
    pub category_name: Option<String>,
    pub quantity: i64,
    pub amount_paise: i64,
    pub payment_method: PaymentMethod,
    pub sold_at: DateTime<Utc>,
}
