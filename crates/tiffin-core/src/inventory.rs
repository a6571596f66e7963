//! # Inventory Rules
//!
//! Recipe-driven stock deduction and low-stock detection.
//!
//! ## Deduction on Checkout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Order: 2 × Paneer Tikka, 3 × Lassi                                    │
//! │                                                                         │
//! │  Recipes:                                                               │
//! │    Paneer Tikka → paneer 150 g, curd 50 g                              │
//! │    Lassi        → curd 200 g, sugar 20 g                               │
//! │       │                                                                 │
//! │       ▼  plan_deductions()                                              │
//! │    paneer  2×150       = 300 g                                          │
//! │    curd    2×50 + 3×200 = 700 g                                         │
//! │    sugar   3×20        =  60 g                                          │
//! │       │                                                                 │
//! │       ▼  applied in the checkout transaction (tiffin-db)               │
//! │    current_stock -= amount   (no clamping: may go negative)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::order::OrderLine;
use crate::quantity::{Quantity, Unit};
use crate::types::RecipeLine;

// =============================================================================
// Deduction Planning
// =============================================================================

/// Total amount to take out of one ingredient for an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDeduction {
    pub ingredient_id: String,
    pub amount: Quantity,
}

/// Sums `recipe_qty × order_qty` per ingredient across all order lines.
///
/// Menu items with no recipe contribute nothing. The result is ordered by
/// ingredient id so concurrent checkouts touch rows in the same order.
/// A total that does not fit in an `i64` fails instead of wrapping.
pub fn plan_deductions(
    lines: &[OrderLine],
    recipes: &HashMap<String, Vec<RecipeLine>>,
) -> CoreResult<Vec<PlannedDeduction>> {
    let mut totals: BTreeMap<&str, Quantity> = BTreeMap::new();

    for line in lines {
        let Some(recipe) = recipes.get(&line.menu_item_id) else {
            continue;
        };
        for ingredient in recipe {
            let total = totals
                .entry(ingredient.ingredient_id.as_str())
                .or_default();
            *total = ingredient
                .quantity()
                .checked_mul(line.quantity)
                .and_then(|used| total.checked_add(used))
                .ok_or_else(|| too_much(&ingredient.ingredient_id))?;
        }
    }

    Ok(totals
        .into_iter()
        .filter(|(_, amount)| amount.milli() != 0)
        .map(|(id, amount)| PlannedDeduction {
            ingredient_id: id.to_string(),
            amount,
        })
        .collect())
}

fn too_much(ingredient_id: &str) -> CoreError {
    ValidationError::InvalidFormat {
        field: "recipe".to_string(),
        reason: format!("amount of ingredient {} is too large", ingredient_id),
    }
    .into()
}

/// Outcome of applying a planned deduction to stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockDeduction {
    pub ingredient_id: String,
    pub ingredient_name: String,
    pub unit: Unit,
    pub amount: Quantity,
    pub before: Quantity,
    pub after: Quantity,
}

impl StockDeduction {
    /// Stock went below zero: recorded, never blocked.
    pub fn went_negative(&self) -> bool {
        self.after.is_negative()
    }
}

/// Parses a per-serving recipe amount and checks it fits the ingredient's unit.
///
/// ```rust
/// use tiffin_core::inventory::recipe_amount;
/// use tiffin_core::quantity::{Quantity, Unit};
///
/// // Recipe written in grams for an ingredient stocked in kilograms
/// let q = recipe_amount("Paneer", Unit::Kilogram, "150", Unit::Gram).unwrap();
/// assert_eq!(q, Quantity::of(150, Unit::Gram));
///
/// assert!(recipe_amount("Milk", Unit::Litre, "2", Unit::Piece).is_err());
/// ```
pub fn recipe_amount(
    ingredient_name: &str,
    ingredient_unit: Unit,
    input: &str,
    recipe_unit: Unit,
) -> CoreResult<Quantity> {
    if !recipe_unit.converts_to(ingredient_unit) {
        return Err(CoreError::UnitMismatch {
            ingredient: ingredient_name.to_string(),
            from: recipe_unit.to_string(),
            to: ingredient_unit.to_string(),
        });
    }

    let amount = Quantity::parse(input, recipe_unit)?;
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "recipe quantity".to_string(),
        }
        .into());
    }
    Ok(amount)
}

// =============================================================================
// Stock Levels & Alerts
// =============================================================================

/// An ingredient joined with its inventory row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockLevel {
    pub ingredient_id: String,
    pub name: String,
    pub unit: Unit,
    pub current: Quantity,
    pub minimum: Quantity,
    pub full: Quantity,
}

impl StockLevel {
    /// `current / full × 100`, 0 when no full level is configured.
    pub fn percentage(&self) -> i64 {
        self.current.percentage_of(self.full)
    }

    /// At or below the configured minimum.
    pub fn is_low(&self) -> bool {
        self.current <= self.minimum
    }
}

/// A low-stock warning for one ingredient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAlert {
    pub ingredient_id: String,
    pub name: String,
    pub unit: Unit,
    pub current: Quantity,
    pub minimum: Quantity,
    pub percentage: i64,
}

impl StockAlert {
    /// One-line message for logs and notifications.
    pub fn message(&self) -> String {
        if self.current.is_negative() {
            format!(
                "{} is out of stock ({} recorded)",
                self.name,
                self.current.format_in(self.unit)
            )
        } else {
            format!(
                "{} is low: {} left (minimum {})",
                self.name,
                self.current.format_in(self.unit),
                self.minimum.format_in(self.unit)
            )
        }
    }
}

/// Low-stock alerts, most depleted first.
pub fn low_stock_alerts(levels: &[StockLevel]) -> Vec<StockAlert> {
    let mut alerts: Vec<StockAlert> = levels
        .iter()
        .filter(|l| l.is_low())
        .map(|l| StockAlert {
            ingredient_id: l.ingredient_id.clone(),
            name: l.name.clone(),
            unit: l.unit,
            current: l.current,
            minimum: l.minimum,
            percentage: l.percentage(),
        })
        .collect();

    alerts.sort_by(|a, b| {
        a.percentage
            .cmp(&b.percentage)
            .then_with(|| a.name.cmp(&b.name))
    });
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(menu_item_id: &str, quantity: i64) -> OrderLine {
        OrderLine {
            menu_item_id: menu_item_id.to_string(),
            name: menu_item_id.to_string(),
            unit_price_paise: 100,
            quantity,
            total_price_paise: 100 * quantity,
        }
    }

    fn recipe(menu_item_id: &str, ingredient_id: &str, grams: i64) -> RecipeLine {
        RecipeLine {
            menu_item_id: menu_item_id.to_string(),
            ingredient_id: ingredient_id.to_string(),
            quantity_milli: Quantity::of(grams, Unit::Gram).milli(),
            unit: Unit::Gram,
        }
    }

    #[test]
    fn test_plan_sums_across_lines() {
        let mut recipes = HashMap::new();
        recipes.insert(
            "tikka".to_string(),
            vec![recipe("tikka", "paneer", 150), recipe("tikka", "curd", 50)],
        );
        recipes.insert(
            "lassi".to_string(),
            vec![recipe("lassi", "curd", 200), recipe("lassi", "sugar", 20)],
        );

        let plan = plan_deductions(&[line("tikka", 2), line("lassi", 3)], &recipes).unwrap();

        assert_eq!(
            plan,
            vec![
                PlannedDeduction {
                    ingredient_id: "curd".to_string(),
                    amount: Quantity::of(700, Unit::Gram),
                },
                PlannedDeduction {
                    ingredient_id: "paneer".to_string(),
                    amount: Quantity::of(300, Unit::Gram),
                },
                PlannedDeduction {
                    ingredient_id: "sugar".to_string(),
                    amount: Quantity::of(60, Unit::Gram),
                },
            ]
        );
    }

    #[test]
    fn test_plan_skips_items_without_recipe() {
        let recipes = HashMap::new();
        assert!(plan_deductions(&[line("water", 4)], &recipes).unwrap().is_empty());
    }

    #[test]
    fn test_plan_refuses_overflowing_totals() {
        let mut recipes = HashMap::new();
        let mut huge = recipe("feast", "ghee", 0);
        huge.quantity_milli = i64::MAX / 2 + 1;
        recipes.insert("feast".to_string(), vec![huge]);

        assert!(plan_deductions(&[line("feast", 1)], &recipes).is_ok());
        assert!(matches!(
            plan_deductions(&[line("feast", 2)], &recipes),
            Err(CoreError::Validation(_))
        ));
        assert!(plan_deductions(&[line("feast", 1), line("feast", 1)], &recipes).is_err());
    }

    #[test]
    fn test_recipe_amount_units() {
        let q = recipe_amount("Milk", Unit::Litre, "250", Unit::Millilitre).unwrap();
        assert_eq!(q, Quantity::parse("0.25", Unit::Litre).unwrap());

        assert!(matches!(
            recipe_amount("Milk", Unit::Litre, "1", Unit::Gram),
            Err(CoreError::UnitMismatch { .. })
        ));
        assert!(recipe_amount("Milk", Unit::Litre, "0", Unit::Litre).is_err());
        assert!(recipe_amount("Milk", Unit::Litre, "-1", Unit::Litre).is_err());
    }

    #[test]
    fn test_low_stock_alerts_sorted() {
        let level = |id: &str, current: i64, minimum: i64| StockLevel {
            ingredient_id: id.to_string(),
            name: id.to_string(),
            unit: Unit::Kilogram,
            current: Quantity::of(current, Unit::Kilogram),
            minimum: Quantity::of(minimum, Unit::Kilogram),
            full: Quantity::of(10, Unit::Kilogram),
        };

        let alerts = low_stock_alerts(&[
            level("rice", 2, 2),
            level("dal", 8, 2),
            level("oil", -1, 1),
        ]);

        let names: Vec<&str> = alerts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["oil", "rice"]);
        assert_eq!(alerts[1].percentage, 20);
        assert!(alerts[0].message().contains("out of stock"));
        assert!(alerts[1].message().contains("minimum 2 kg"));
    }
}
