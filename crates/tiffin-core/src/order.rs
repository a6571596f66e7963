//! # Customer Orders
//!
//! An in-progress, editable order tied to a table/customer number.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Lifecycle                                   │
//! │                                                                         │
//! │            add_item / set_quantity / remove_item                        │
//! │                   ┌──────────┐                                          │
//! │                   ▼          │                                          │
//! │              ┌─────────┐─────┘                                          │
//! │   (table) ──►│ Pending │                                                │
//! │              └────┬────┘                                                │
//! │          complete │    │ cancel                                         │
//! │                   ▼    ▼                                                │
//! │          ┌───────────┐ ┌───────────┐                                    │
//! │          │ Completed │ │ Cancelled │   (terminal, no further edits)     │
//! │          └───────────┘ └───────────┘                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every line freezes the menu item's name and price when first added, so a
//! price change on the menu never alters an order already on the table.
//! `total()` is always exactly the sum of line totals (integer paise).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{MenuItem, OrderStatus};
use crate::validation::{validate_order_size, validate_quantity};
use crate::MAX_ITEM_QUANTITY;

// =============================================================================
// Order Line
// =============================================================================

/// One menu item on an order, with its price frozen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub menu_item_id: String,
    pub name: String,
    pub unit_price_paise: i64,
    pub quantity: i64,
    pub total_price_paise: i64,
}

impl OrderLine {
    /// Creates a line from a menu item, capturing name and price now.
    pub fn from_menu_item(item: &MenuItem, quantity: i64) -> Self {
        OrderLine {
            menu_item_id: item.id.clone(),
            name: item.name.clone(),
            unit_price_paise: item.price_paise,
            quantity,
            total_price_paise: item.price().multiply_quantity(quantity).paise(),
        }
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_paise(self.unit_price_paise)
    }

    #[inline]
    pub fn total_price(&self) -> Money {
        Money::from_paise(self.total_price_paise)
    }

    fn set_quantity(&mut self, quantity: i64) {
        self.quantity = quantity;
        self.total_price_paise = self.unit_price().multiply_quantity(quantity).paise();
    }
}

// =============================================================================
// Customer Order
// =============================================================================

/// The order currently being built for a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerOrder {
    /// Table/customer number. One open order per number.
    pub customer_number: i64,
    pub customer_name: Option<String>,
    pub lines: Vec<OrderLine>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomerOrder {
    /// Opens an empty pending order.
    pub fn new(customer_number: i64, now: DateTime<Utc>) -> Self {
        CustomerOrder {
            customer_number,
            customer_name: None,
            lines: Vec::new(),
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Adds a menu item, or increases the quantity if it is already on the order.
    ///
    /// ## Errors
    /// - `InvalidOrderStatus` unless pending
    /// - `MenuItemUnavailable` for soft-deleted or switched-off items
    /// - `QuantityTooLarge` when the merged quantity exceeds 999
    /// - `OrderTooLarge` when a new line would exceed 100 lines
    pub fn add_item(&mut self, item: &MenuItem, quantity: i64) -> CoreResult<()> {
        self.ensure_pending("add items")?;
        validate_quantity(quantity)?;

        if !item.is_orderable() {
            return Err(CoreError::MenuItemUnavailable(item.name.clone()));
        }

        if let Some(line) = self.lines.iter_mut().find(|l| l.menu_item_id == item.id) {
            let merged = line.quantity + quantity;
            if merged > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: merged,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            line.set_quantity(merged);
            return Ok(());
        }

        validate_order_size(self.lines.len())?;
        self.lines.push(OrderLine::from_menu_item(item, quantity));
        Ok(())
    }

    /// Sets the quantity of a line. Zero removes it.
    pub fn set_quantity(&mut self, menu_item_id: &str, quantity: i64) -> CoreResult<()> {
        self.ensure_pending("change quantities")?;

        if quantity == 0 {
            return self.remove_item(menu_item_id);
        }
        validate_quantity(quantity)?;

        let line = self
            .lines
            .iter_mut()
            .find(|l| l.menu_item_id == menu_item_id)
            .ok_or_else(|| CoreError::MenuItemNotFound(menu_item_id.to_string()))?;
        line.set_quantity(quantity);
        Ok(())
    }

    /// Removes a line entirely.
    pub fn remove_item(&mut self, menu_item_id: &str) -> CoreResult<()> {
        self.ensure_pending("remove items")?;

        let before = self.lines.len();
        self.lines.retain(|l| l.menu_item_id != menu_item_id);
        if self.lines.len() == before {
            return Err(CoreError::MenuItemNotFound(menu_item_id.to_string()));
        }
        Ok(())
    }

    pub fn set_customer_name(&mut self, name: Option<String>) -> CoreResult<()> {
        self.ensure_pending("rename")?;
        self.customer_name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        Ok(())
    }

    /// Σ line totals.
    pub fn total(&self) -> Money {
        self.lines.iter().map(OrderLine::total_price).sum()
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Pending → Completed. Empty orders cannot be completed.
    pub fn complete(&mut self) -> CoreResult<()> {
        self.ensure_pending("check out")?;
        if self.lines.is_empty() {
            return Err(CoreError::EmptyOrder(self.customer_number));
        }
        self.status = OrderStatus::Completed;
        Ok(())
    }

    /// Pending → Cancelled.
    pub fn cancel(&mut self) -> CoreResult<()> {
        self.ensure_pending("cancel")?;
        self.status = OrderStatus::Cancelled;
        Ok(())
    }

    /// Serializes the lines for the `lines_json` column.
    pub fn lines_json(&self) -> CoreResult<String> {
        serde_json::to_string(&self.lines).map_err(|e| {
            CoreError::Validation(crate::ValidationError::InvalidFormat {
                field: "order lines".to_string(),
                reason: e.to_string(),
            })
        })
    }

    /// Parses lines stored in the `lines_json` column.
    pub fn parse_lines(json: &str) -> CoreResult<Vec<OrderLine>> {
        serde_json::from_str(json).map_err(|e| {
            CoreError::Validation(crate::ValidationError::InvalidFormat {
                field: "order lines".to_string(),
                reason: e.to_string(),
            })
        })
    }

    fn ensure_pending(&self, operation: &str) -> CoreResult<()> {
        if self.status != OrderStatus::Pending {
            return Err(CoreError::InvalidOrderStatus {
                customer_number: self.customer_number,
                current_status: self.status.to_string(),
                operation: operation.to_string(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn menu_item(id: &str, price_paise: i64) -> MenuItem {
        MenuItem {
            id: id.to_string(),
            category_id: "cat".to_string(),
            name: format!("Item {}", id),
            description: None,
            price_paise,
            is_vegetarian: true,
            is_available: true,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_add_same_item_merges_quantity() {
        let mut order = CustomerOrder::new(4, Utc::now());
        let dosa = menu_item("dosa", 9000);

        order.add_item(&dosa, 2).unwrap();
        order.add_item(&dosa, 1).unwrap();

        assert_eq!(order.lines.len(), 1);
        assert_eq!(order.lines[0].quantity, 3);
        assert_eq!(order.total(), Money::from_paise(27000));
    }

    #[test]
    fn test_price_is_frozen_on_add() {
        let mut order = CustomerOrder::new(1, Utc::now());
        let mut chai = menu_item("chai", 1500);
        order.add_item(&chai, 1).unwrap();

        chai.price_paise = 2000;
        order.add_item(&chai, 1).unwrap();

        assert_eq!(order.lines[0].unit_price_paise, 1500);
        assert_eq!(order.total().paise(), 3000);
    }

    #[test]
    fn test_total_equals_sum_of_lines() {
        let mut order = CustomerOrder::new(2, Utc::now());
        // 0.10 and 0.20 rupees: the pair that breaks doubles
        order.add_item(&menu_item("a", 10), 1).unwrap();
        order.add_item(&menu_item("b", 20), 1).unwrap();
        order.add_item(&menu_item("c", 333), 3).unwrap();

        let sum: i64 = order.lines.iter().map(|l| l.total_price_paise).sum();
        assert_eq!(order.total().paise(), sum);
        assert_eq!(order.total().paise(), 10 + 20 + 999);
    }

    #[test]
    fn test_set_quantity_zero_removes_line() {
        let mut order = CustomerOrder::new(3, Utc::now());
        order.add_item(&menu_item("a", 100), 2).unwrap();

        order.set_quantity("a", 5).unwrap();
        assert_eq!(order.lines[0].total_price_paise, 500);

        order.set_quantity("a", 0).unwrap();
        assert!(order.is_empty());
        assert!(order.set_quantity("a", 1).is_err());
    }

    #[test]
    fn test_quantity_limits() {
        let mut order = CustomerOrder::new(3, Utc::now());
        let item = menu_item("a", 100);

        assert!(order.add_item(&item, 0).is_err());
        order.add_item(&item, 999).unwrap();
        assert!(matches!(
            order.add_item(&item, 1),
            Err(CoreError::QuantityTooLarge { requested: 1000, .. })
        ));
    }

    #[test]
    fn test_unavailable_item_rejected() {
        let mut order = CustomerOrder::new(5, Utc::now());
        let mut item = menu_item("a", 100);
        item.is_available = false;

        assert!(matches!(
            order.add_item(&item, 1),
            Err(CoreError::MenuItemUnavailable(_))
        ));
    }

    #[test]
    fn test_terminal_states_reject_edits() {
        let mut order = CustomerOrder::new(6, Utc::now());
        order.add_item(&menu_item("a", 100), 1).unwrap();
        order.cancel().unwrap();

        assert!(matches!(
            order.add_item(&menu_item("b", 100), 1),
            Err(CoreError::InvalidOrderStatus { .. })
        ));
        assert!(order.complete().is_err());
        assert!(order.cancel().is_err());
    }

    #[test]
    fn test_empty_order_cannot_complete() {
        let mut order = CustomerOrder::new(8, Utc::now());
        assert!(matches!(order.complete(), Err(CoreError::EmptyOrder(8))));

        order.add_item(&menu_item("a", 100), 1).unwrap();
        order.complete().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
    }

    #[test]
    fn test_lines_json_roundtrip() {
        let mut order = CustomerOrder::new(9, Utc::now());
        order.add_item(&menu_item("a", 100), 2).unwrap();

        let json = order.lines_json().unwrap();
        assert_eq!(CustomerOrder::parse_lines(&json).unwrap(), order.lines);
        assert!(CustomerOrder::parse_lines("not json").is_err());
    }

    #[test]
    fn test_customer_name_trimmed() {
        let mut order = CustomerOrder::new(1, Utc::now());
        order.set_customer_name(Some("  Priya ".to_string())).unwrap();
        assert_eq!(order.customer_name.as_deref(), Some("Priya"));
        order.set_customer_name(Some("   ".to_string())).unwrap();
        assert_eq!(order.customer_name, None);
    }
}
