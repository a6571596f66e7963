//! # Inventory Repository
//!
//! Ingredients, stock levels and recipes.
//!
//! ## Storage
//! ```text
//! ingredients      (id, name, unit)                      unit: g kg ml l pcs
//!      │ 1:1
//! inventory_items  (current_milli, minimum_milli, full_milli)
//!      ▲ n
//! recipe_lines     (menu_item_id, ingredient_id, quantity_milli, unit)
//! ```
//!
//! Quantities are stored in milli-base units, so a recipe written in grams
//! and an ingredient stocked in kilograms share one integer scale.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tiffin_core::inventory::{
    low_stock_alerts, recipe_amount, PlannedDeduction, StockAlert, StockDeduction, StockLevel,
};
use tiffin_core::validation::{name_key, validate_ingredient_name, validate_stock_amount};
use tiffin_core::{Ingredient, Quantity, RecipeLine, Unit, ValidationError};

/// Input for a new ingredient. Amounts are in any unit of its dimension.
#[derive(Debug, Clone)]
pub struct NewIngredient {
    pub name: String,
    pub unit: Unit,
    pub initial: Quantity,
    pub minimum: Quantity,
    pub full: Quantity,
}

/// One line of a recipe as entered: `150 g of paneer`.
#[derive(Debug, Clone)]
pub struct RecipeInput {
    pub ingredient_id: String,
    pub amount: String,
    pub unit: Unit,
}

/// A recipe line joined with its ingredient.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct RecipeEntry {
    pub menu_item_id: String,
    pub ingredient_id: String,
    pub ingredient_name: String,
    pub quantity_milli: i64,
    pub unit: Unit,
}

impl RecipeEntry {
    pub fn quantity(&self) -> Quantity {
        Quantity::from_milli(self.quantity_milli)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StockRow {
    ingredient_id: String,
    name: String,
    unit: Unit,
    current_milli: i64,
    minimum_milli: i64,
    full_milli: i64,
}

impl From<StockRow> for StockLevel {
    fn from(row: StockRow) -> Self {
        StockLevel {
            ingredient_id: row.ingredient_id,
            name: row.name,
            unit: row.unit,
            current: Quantity::from_milli(row.current_milli),
            minimum: Quantity::from_milli(row.minimum_milli),
            full: Quantity::from_milli(row.full_milli),
        }
    }
}

const STOCK_SELECT: &str = r#"
    SELECT i.id AS ingredient_id, i.name, i.unit,
           inv.current_milli, inv.minimum_milli, inv.full_milli
    FROM ingredients i
    JOIN inventory_items inv ON inv.ingredient_id = i.id
"#;

/// Repository for inventory database operations.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    // =========================================================================
    // Ingredients & Stock
    // =========================================================================

    pub async fn create_ingredient(&self, new: NewIngredient) -> DbResult<StockLevel> {
        let name = validate_ingredient_name(&new.name)?;
        validate_stock_amount("stock", new.initial)?;
        validate_levels(new.minimum, new.full)?;

        let taken: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM ingredients WHERE name_key = ?1")
                .bind(name_key(&name))
                .fetch_one(&self.pool)
                .await?;
        if taken > 0 {
            return Err(DbError::duplicate("ingredient", name));
        }

        let now = Utc::now();
        let ingredient = Ingredient {
            id: Uuid::new_v4().to_string(),
            name,
            unit: new.unit,
            created_at: now,
        };

        debug!(id = %ingredient.id, name = %ingredient.name, unit = %ingredient.unit, "Creating ingredient");

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO ingredients (id, name, name_key, unit, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&ingredient.id)
        .bind(&ingredient.name)
        .bind(name_key(&ingredient.name))
        .bind(ingredient.unit)
        .bind(ingredient.created_at)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            r#"
            INSERT INTO inventory_items (ingredient_id, current_milli, minimum_milli, full_milli, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&ingredient.id)
        .bind(new.initial.milli())
        .bind(new.minimum.milli())
        .bind(new.full.milli())
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(StockLevel {
            ingredient_id: ingredient.id,
            name: ingredient.name,
            unit: ingredient.unit,
            current: new.initial,
            minimum: new.minimum,
            full: new.full,
        })
    }

    pub async fn get_ingredient(&self, id: &str) -> DbResult<Option<Ingredient>> {
        let ingredient = sqlx::query_as::<_, Ingredient>(
            "SELECT id, name, unit, created_at FROM ingredients WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ingredient)
    }

    /// Case-insensitive lookup by name.
    pub async fn find_ingredient_by_name(&self, name: &str) -> DbResult<Option<Ingredient>> {
        let ingredient = sqlx::query_as::<_, Ingredient>(
            "SELECT id, name, unit, created_at FROM ingredients WHERE name_key = ?1",
        )
        .bind(name_key(name))
        .fetch_optional(&self.pool)
        .await?;

        Ok(ingredient)
    }

    pub async fn get_level(&self, ingredient_id: &str) -> DbResult<Option<StockLevel>> {
        let sql = format!("{} WHERE i.id = ?1", STOCK_SELECT);
        let row = sqlx::query_as::<_, StockRow>(&sql)
            .bind(ingredient_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(StockLevel::from))
    }

    /// All ingredients with their stock, by name.
    pub async fn list_inventory(&self) -> DbResult<Vec<StockLevel>> {
        let mut conn = self.pool.acquire().await?;
        list_levels_in(&mut conn).await
    }

    /// Ingredients at or below their minimum, most depleted first.
    pub async fn low_stock(&self) -> DbResult<Vec<StockAlert>> {
        Ok(low_stock_alerts(&self.list_inventory().await?))
    }

    /// Adds `delta` to current stock. Negative deltas record wastage.
    ///
    /// The result must stay within `Quantity::MAX` either side of zero.
    pub async fn restock(&self, ingredient_id: &str, delta: Quantity) -> DbResult<StockLevel> {
        debug!(ingredient_id = %ingredient_id, delta_milli = delta.milli(), "Restocking");
        validate_stock_amount("restock", delta)?;

        let mut tx = self.pool.begin().await?;
        let current: Option<i64> = sqlx::query_scalar(
            "UPDATE inventory_items SET updated_at = ?2 WHERE ingredient_id = ?1 RETURNING current_milli",
        )
        .bind(ingredient_id)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?;
        let Some(current) = current else {
            return Err(DbError::not_found("Ingredient", ingredient_id));
        };

        let after = Quantity::from_milli(current)
            .checked_add(delta)
            .unwrap_or(Quantity::from_milli(i64::MAX));
        validate_stock_amount("stock", after)?;

        sqlx::query("UPDATE inventory_items SET current_milli = ?2 WHERE ingredient_id = ?1")
            .bind(ingredient_id)
            .bind(after.milli())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        self.level_after_update(ingredient_id, 1).await
    }

    /// Overwrites current stock (after a physical count).
    pub async fn set_stock(&self, ingredient_id: &str, current: Quantity) -> DbResult<StockLevel> {
        debug!(ingredient_id = %ingredient_id, current_milli = current.milli(), "Setting stock");
        validate_stock_amount("stock", current)?;

        let result = sqlx::query(
            "UPDATE inventory_items SET current_milli = ?2, updated_at = ?3 WHERE ingredient_id = ?1",
        )
        .bind(ingredient_id)
        .bind(current.milli())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.level_after_update(ingredient_id, result.rows_affected())
            .await
    }

    /// Sets the low-stock threshold and the "full" reference level.
    pub async fn set_levels(
        &self,
        ingredient_id: &str,
        minimum: Quantity,
        full: Quantity,
    ) -> DbResult<StockLevel> {
        validate_levels(minimum, full)?;

        let result = sqlx::query(
            r#"
            UPDATE inventory_items
            SET minimum_milli = ?2, full_milli = ?3, updated_at = ?4
            WHERE ingredient_id = ?1
            "#,
        )
        .bind(ingredient_id)
        .bind(minimum.milli())
        .bind(full.milli())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.level_after_update(ingredient_id, result.rows_affected())
            .await
    }

    async fn level_after_update(&self, ingredient_id: &str, rows: u64) -> DbResult<StockLevel> {
        if rows == 0 {
            return Err(DbError::not_found("Ingredient", ingredient_id));
        }
        self.get_level(ingredient_id)
            .await?
            .ok_or_else(|| DbError::not_found("Ingredient", ingredient_id))
    }

    // =========================================================================
    // Recipes
    // =========================================================================

    /// Replaces a menu item's recipe. An empty list clears it.
    ///
    /// Each amount is parsed in its own unit, which must share a dimension
    /// with the ingredient's unit (g ↔ kg, ml ↔ l).
    pub async fn set_recipe(
        &self,
        menu_item_id: &str,
        lines: &[RecipeInput],
    ) -> DbResult<Vec<RecipeEntry>> {
        let mut tx = self.pool.begin().await?;

        let exists: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM menu_items WHERE id = ?1 AND is_active = 1")
                .bind(menu_item_id)
                .fetch_one(&mut *tx)
                .await?;
        if exists == 0 {
            return Err(DbError::not_found("Menu item", menu_item_id));
        }

        let mut parsed: Vec<RecipeLine> = Vec::with_capacity(lines.len());
        for input in lines {
            let ingredient = sqlx::query_as::<_, Ingredient>(
                "SELECT id, name, unit, created_at FROM ingredients WHERE id = ?1",
            )
            .bind(&input.ingredient_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Ingredient", &input.ingredient_id))?;

            if parsed.iter().any(|l| l.ingredient_id == ingredient.id) {
                return Err(DbError::duplicate("recipe ingredient", ingredient.name));
            }

            let amount = recipe_amount(&ingredient.name, ingredient.unit, &input.amount, input.unit)?;
            parsed.push(RecipeLine {
                menu_item_id: menu_item_id.to_string(),
                ingredient_id: ingredient.id,
                quantity_milli: amount.milli(),
                unit: input.unit,
            });
        }

        sqlx::query("DELETE FROM recipe_lines WHERE menu_item_id = ?1")
            .bind(menu_item_id)
            .execute(&mut *tx)
            .await?;

        for line in &parsed {
            sqlx::query(
                r#"
                INSERT INTO recipe_lines (menu_item_id, ingredient_id, quantity_milli, unit)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(&line.menu_item_id)
            .bind(&line.ingredient_id)
            .bind(line.quantity_milli)
            .bind(line.unit)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(menu_item_id = %menu_item_id, lines = parsed.len(), "Recipe saved");

        self.get_recipe(menu_item_id).await
    }

    pub async fn get_recipe(&self, menu_item_id: &str) -> DbResult<Vec<RecipeEntry>> {
        let entries = sqlx::query_as::<_, RecipeEntry>(
            r#"
            SELECT r.menu_item_id, r.ingredient_id, i.name AS ingredient_name,
                   r.quantity_milli, r.unit
            FROM recipe_lines r
            JOIN ingredients i ON i.id = r.ingredient_id
            WHERE r.menu_item_id = ?1
            ORDER BY i.name COLLATE NOCASE
            "#,
        )
        .bind(menu_item_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

fn validate_levels(minimum: Quantity, full: Quantity) -> Result<(), ValidationError> {
    if minimum.is_negative() || full.is_negative() {
        return Err(ValidationError::MustBePositive {
            field: "stock level".to_string(),
        });
    }
    validate_stock_amount("minimum", minimum)?;
    validate_stock_amount("full", full)
}

// =============================================================================
// Connection-level helpers (shared with checkout)
// =============================================================================

pub(crate) async fn list_levels_in(conn: &mut SqliteConnection) -> DbResult<Vec<StockLevel>> {
    let sql = format!("{} ORDER BY i.name COLLATE NOCASE", STOCK_SELECT);
    let rows = sqlx::query_as::<_, StockRow>(&sql).fetch_all(conn).await?;

    Ok(rows.into_iter().map(StockLevel::from).collect())
}

/// Recipes for the given menu items, keyed by menu item id.
pub(crate) async fn recipes_for_in(
    conn: &mut SqliteConnection,
    menu_item_ids: &[&str],
) -> DbResult<HashMap<String, Vec<RecipeLine>>> {
    let mut recipes: HashMap<String, Vec<RecipeLine>> = HashMap::new();

    for id in menu_item_ids {
        if recipes.contains_key(*id) {
            continue;
        }
        let lines = sqlx::query_as::<_, RecipeLine>(
            r#"
            SELECT menu_item_id, ingredient_id, quantity_milli, unit
            FROM recipe_lines
            WHERE menu_item_id = ?1
            "#,
        )
        .bind(*id)
        .fetch_all(&mut *conn)
        .await?;
        recipes.insert((*id).to_string(), lines);
    }

    Ok(recipes)
}

/// Subtracts each planned amount from current stock. Never clamps: stock
/// may go negative, which is logged and reported back.
pub(crate) async fn apply_deductions_in(
    conn: &mut SqliteConnection,
    plan: &[PlannedDeduction],
    now: DateTime<Utc>,
) -> DbResult<Vec<StockDeduction>> {
    let mut applied = Vec::with_capacity(plan.len());

    for planned in plan {
        let sql = format!("{} WHERE i.id = ?1", STOCK_SELECT);
        let before: StockLevel = sqlx::query_as::<_, StockRow>(&sql)
            .bind(&planned.ingredient_id)
            .fetch_optional(&mut *conn)
            .await?
            .map(StockLevel::from)
            .ok_or_else(|| DbError::not_found("Ingredient", &planned.ingredient_id))?;

        let after = before
            .current
            .checked_sub(planned.amount)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "stock".to_string(),
                reason: format!("{} would go out of range", before.name),
            })?;

        sqlx::query(
            r#"
            UPDATE inventory_items
            SET current_milli = ?2, updated_at = ?3
            WHERE ingredient_id = ?1
            "#,
        )
        .bind(&planned.ingredient_id)
        .bind(after.milli())
        .bind(now)
        .execute(&mut *conn)
        .await?;

        let deduction = StockDeduction {
            ingredient_id: before.ingredient_id,
            ingredient_name: before.name,
            unit: before.unit,
            amount: planned.amount,
            before: before.current,
            after,
        };

        if deduction.went_negative() {
            warn!(
                ingredient = %deduction.ingredient_name,
                before = %deduction.before.format_in(deduction.unit),
                after = %deduction.after.format_in(deduction.unit),
                "Stock went negative"
            );
        } else {
            debug!(
                ingredient = %deduction.ingredient_name,
                amount_milli = deduction.amount.milli(),
                "Stock deducted"
            );
        }

        applied.push(deduction);
    }

    Ok(applied)
}
