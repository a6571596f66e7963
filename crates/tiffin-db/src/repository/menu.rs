//! # Menu Repository
//!
//! Categories and menu items.
//!
//! ## Category Link
//! ```text
//! menu_categories.id ◄──── menu_items.category_id   (FK, not the name)
//!
//! rename_category("Snacks" → "Chaat")  → items follow automatically
//! delete_category(..)                  → refused while active items remain
//! ```
//!
//! Items are never hard-deleted while active: `soft_delete_item` clears
//! `is_active`, which also frees the name for reuse in the category.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tiffin_core::validation::{
    name_key, validate_category_name, validate_description, validate_menu_item_name,
    validate_price_paise, validate_search_query,
};
use tiffin_core::{CoreError, MenuCategory, MenuItem};

/// Input for a new menu item.
#[derive(Debug, Clone)]
pub struct NewMenuItem {
    pub category_id: String,
    pub name: String,
    pub description: Option<String>,
    pub price_paise: i64,
    pub is_vegetarian: bool,
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct MenuItemChanges {
    pub category_id: Option<String>,
    pub name: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub price_paise: Option<i64>,
    pub is_vegetarian: Option<bool>,
}

const ITEM_COLUMNS: &str = r#"
    id, category_id, name, description, price_paise,
    is_vegetarian, is_available, is_active, created_at, updated_at
"#;

/// Repository for menu database operations.
#[derive(Debug, Clone)]
pub struct MenuRepository {
    pool: SqlitePool,
}

impl MenuRepository {
    pub fn new(pool: SqlitePool) -> Self {
        MenuRepository { pool }
    }

    // =========================================================================
    // Categories
    // =========================================================================

    pub async fn create_category(&self, name: &str) -> DbResult<MenuCategory> {
        let name = validate_category_name(name)?;
        self.ensure_category_name_free(&name, None).await?;

        let category = MenuCategory {
            id: Uuid::new_v4().to_string(),
            name,
            created_at: Utc::now(),
        };

        debug!(id = %category.id, name = %category.name, "Creating category");

        sqlx::query(
            "INSERT INTO menu_categories (id, name, name_key, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(name_key(&category.name))
        .bind(category.created_at)
        .execute(&self.pool)
        .await?;

        Ok(category)
    }

    /// Renames a category. Items keep pointing at it by id.
    pub async fn rename_category(&self, id: &str, name: &str) -> DbResult<MenuCategory> {
        let name = validate_category_name(name)?;
        let mut category = self.require_category(id).await?;
        self.ensure_category_name_free(&name, Some(id)).await?;

        debug!(id = %id, from = %category.name, to = %name, "Renaming category");

        sqlx::query("UPDATE menu_categories SET name = ?2, name_key = ?3 WHERE id = ?1")
            .bind(id)
            .bind(&name)
            .bind(name_key(&name))
            .execute(&self.pool)
            .await?;

        category.name = name;
        Ok(category)
    }

    /// Deletes a category with no active items. Soft-deleted items under it
    /// are removed with it (and their recipes), so the delete is refused
    /// while an open order still holds one of them.
    pub async fn delete_category(&self, id: &str) -> DbResult<()> {
        let category = self.require_category(id).await?;
        let mut tx = self.pool.begin().await?;

        let active: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM menu_items WHERE category_id = ?1 AND is_active = 1",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if active > 0 {
            return Err(CoreError::CategoryNotEmpty {
                name: category.name,
                items: active,
            }
            .into());
        }

        let orders: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(DISTINCT o.customer_number)
            FROM customer_orders o, json_each(o.lines_json) l
            WHERE json_extract(l.value, '$.menu_item_id') IN
                  (SELECT id FROM menu_items WHERE category_id = ?1)
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if orders > 0 {
            return Err(CoreError::CategoryInUse {
                name: category.name,
                orders,
            }
            .into());
        }

        sqlx::query("DELETE FROM menu_items WHERE category_id = ?1 AND is_active = 0")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM menu_categories WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(id = %id, name = %category.name, "Category deleted");
        Ok(())
    }

    pub async fn list_categories(&self) -> DbResult<Vec<MenuCategory>> {
        let categories = sqlx::query_as::<_, MenuCategory>(
            "SELECT id, name, created_at FROM menu_categories ORDER BY name COLLATE NOCASE",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    pub async fn get_category(&self, id: &str) -> DbResult<Option<MenuCategory>> {
        let category = sqlx::query_as::<_, MenuCategory>(
            "SELECT id, name, created_at FROM menu_categories WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    /// Case-insensitive lookup by name.
    pub async fn find_category_by_name(&self, name: &str) -> DbResult<Option<MenuCategory>> {
        let category = sqlx::query_as::<_, MenuCategory>(
            "SELECT id, name, created_at FROM menu_categories WHERE name_key = ?1",
        )
        .bind(name_key(name))
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    async fn require_category(&self, id: &str) -> DbResult<MenuCategory> {
        self.get_category(id)
            .await?
            .ok_or_else(|| DbError::not_found("Category", id))
    }

    async fn ensure_category_name_free(&self, name: &str, except_id: Option<&str>) -> DbResult<()> {
        let taken: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM menu_categories
            WHERE name_key = ?1 AND (?2 IS NULL OR id != ?2)
            "#,
        )
        .bind(name_key(name))
        .bind(except_id)
        .fetch_one(&self.pool)
        .await?;

        if taken > 0 {
            return Err(DbError::duplicate("category", name));
        }
        Ok(())
    }

    // =========================================================================
    // Items
    // =========================================================================

    /// Creates a menu item.
    ///
    /// ## Rules
    /// - price > 0
    /// - category must exist
    /// - name unique (case-insensitive) among active items of the category
    pub async fn create_item(&self, new: NewMenuItem) -> DbResult<MenuItem> {
        let name = validate_menu_item_name(&new.name)?;
        validate_price_paise(new.price_paise)?;
        let description = validate_description(new.description.as_deref())?;
        self.require_category(&new.category_id).await?;
        self.ensure_item_name_free(&new.category_id, &name, None).await?;

        let now = Utc::now();
        let item = MenuItem {
            id: Uuid::new_v4().to_string(),
            category_id: new.category_id,
            name,
            description,
            price_paise: new.price_paise,
            is_vegetarian: new.is_vegetarian,
            is_available: true,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %item.id, name = %item.name, price_paise = item.price_paise, "Creating menu item");

        sqlx::query(
            r#"
            INSERT INTO menu_items (
                id, category_id, name, description, price_paise,
                is_vegetarian, is_available, is_active, created_at, updated_at, name_key
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&item.id)
        .bind(&item.category_id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.price_paise)
        .bind(item.is_vegetarian)
        .bind(item.is_available)
        .bind(item.is_active)
        .bind(item.created_at)
        .bind(item.updated_at)
        .bind(name_key(&item.name))
        .execute(&self.pool)
        .await?;

        Ok(item)
    }

    /// Applies changes with the same validation as `create_item`.
    /// The duplicate check ignores the item itself.
    pub async fn update_item(&self, id: &str, changes: MenuItemChanges) -> DbResult<MenuItem> {
        let mut item = self.require_item(id).await?;

        if let Some(name) = changes.name {
            item.name = validate_menu_item_name(&name)?;
        }
        if let Some(price) = changes.price_paise {
            validate_price_paise(price)?;
            item.price_paise = price;
        }
        if let Some(description) = changes.description {
            item.description = validate_description(description.as_deref())?;
        }
        if let Some(category_id) = changes.category_id {
            self.require_category(&category_id).await?;
            item.category_id = category_id;
        }
        if let Some(veg) = changes.is_vegetarian {
            item.is_vegetarian = veg;
        }

        self.ensure_item_name_free(&item.category_id, &item.name, Some(id))
            .await?;
        item.updated_at = Utc::now();

        debug!(id = %id, "Updating menu item");

        sqlx::query(
            r#"
            UPDATE menu_items SET
                category_id = ?2, name = ?3, description = ?4,
                price_paise = ?5, is_vegetarian = ?6, updated_at = ?7, name_key = ?8
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&item.category_id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.price_paise)
        .bind(item.is_vegetarian)
        .bind(item.updated_at)
        .bind(name_key(&item.name))
        .execute(&self.pool)
        .await?;

        Ok(item)
    }

    /// Switches an item on or off for ordering (sold out, seasonal).
    pub async fn set_availability(&self, id: &str, available: bool) -> DbResult<()> {
        debug!(id = %id, available, "Setting availability");

        let result = sqlx::query(
            "UPDATE menu_items SET is_available = ?2, updated_at = ?3 WHERE id = ?1 AND is_active = 1",
        )
        .bind(id)
        .bind(available)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Menu item", id));
        }
        Ok(())
    }

    pub async fn soft_delete_item(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE menu_items SET is_active = 0, is_available = 0, updated_at = ?2
            WHERE id = ?1 AND is_active = 1
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Menu item", id));
        }

        info!(id = %id, "Menu item removed from menu");
        Ok(())
    }

    /// Any item row, including soft-deleted ones.
    pub async fn get_item(&self, id: &str) -> DbResult<Option<MenuItem>> {
        let sql = format!("SELECT {} FROM menu_items WHERE id = ?1", ITEM_COLUMNS);
        let item = sqlx::query_as::<_, MenuItem>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(item)
    }

    /// An active item, or `NotFound`.
    pub async fn require_item(&self, id: &str) -> DbResult<MenuItem> {
        match self.get_item(id).await? {
            Some(item) if item.is_active => Ok(item),
            _ => Err(DbError::not_found("Menu item", id)),
        }
    }

    /// Active items, optionally within one category, ordered by name.
    pub async fn list_items(
        &self,
        category_id: Option<&str>,
        include_unavailable: bool,
    ) -> DbResult<Vec<MenuItem>> {
        let sql = format!(
            r#"
            SELECT {} FROM menu_items
            WHERE is_active = 1
              AND (?1 IS NULL OR category_id = ?1)
              AND (?2 = 1 OR is_available = 1)
            ORDER BY name COLLATE NOCASE
            "#,
            ITEM_COLUMNS
        );

        let items = sqlx::query_as::<_, MenuItem>(&sql)
            .bind(category_id)
            .bind(include_unavailable)
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }

    /// Case-insensitive substring match on active item names.
    pub async fn search_items(&self, query: &str, limit: i64) -> DbResult<Vec<MenuItem>> {
        let query = validate_search_query(query)?;
        debug!(query = %query, limit, "Searching menu");

        let sql = format!(
            r#"
            SELECT {} FROM menu_items
            WHERE is_active = 1 AND instr(name_key, ?1) > 0
            ORDER BY is_available DESC, name COLLATE NOCASE
            LIMIT ?2
            "#,
            ITEM_COLUMNS
        );

        let items = sqlx::query_as::<_, MenuItem>(&sql)
            .bind(name_key(&query))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }

    async fn ensure_item_name_free(
        &self,
        category_id: &str,
        name: &str,
        except_id: Option<&str>,
    ) -> DbResult<()> {
        let taken: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM menu_items
            WHERE category_id = ?1
              AND name_key = ?2
              AND is_active = 1
              AND (?3 IS NULL OR id != ?3)
            "#,
        )
        .bind(category_id)
        .bind(name_key(name))
        .bind(except_id)
        .fetch_one(&self.pool)
        .await?;

        if taken > 0 {
            return Err(DbError::duplicate("menu item", name));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use tiffin_core::ValidationError;

    async fn setup() -> (Database, MenuCategory) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let category = db.menu().create_category("Starters").await.unwrap();
        (db, category)
    }

    fn new_item(category_id: &str, name: &str, price_paise: i64) -> NewMenuItem {
        NewMenuItem {
            category_id: category_id.to_string(),
            name: name.to_string(),
            description: None,
            price_paise,
            is_vegetarian: true,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_item() {
        let (db, cat) = setup().await;
        let item = db
            .menu()
            .create_item(new_item(&cat.id, "Paneer Tikka", 22000))
            .await
            .unwrap();

        let fetched = db.menu().get_item(&item.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Paneer Tikka");
        assert_eq!(fetched.price_paise, 22000);
        assert!(fetched.is_orderable());
    }

    #[tokio::test]
    async fn test_non_positive_price_rejected() {
        let (db, cat) = setup().await;

        for price in [0, -500] {
            let err = db
                .menu()
                .create_item(new_item(&cat.id, "Free Lunch", price))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                DbError::Core(CoreError::Validation(ValidationError::MustBePositive { .. }))
            ));
        }

        let item = db
            .menu()
            .create_item(new_item(&cat.id, "Papad", 3000))
            .await
            .unwrap();
        let changes = MenuItemChanges {
            price_paise: Some(0),
            ..Default::default()
        };
        assert!(db.menu().update_item(&item.id, changes).await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_name_in_category_rejected_case_insensitively() {
        let (db, cat) = setup().await;
        let other = db.menu().create_category("Mains").await.unwrap();

        db.menu()
            .create_item(new_item(&cat.id, "Veg Pakora", 9000))
            .await
            .unwrap();

        let err = db
            .menu()
            .create_item(new_item(&cat.id, "VEG pakora", 9500))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::Validation(ValidationError::Duplicate { .. }))
        ));

        // Same name in another category is fine
        db.menu()
            .create_item(new_item(&other.id, "Veg Pakora", 9000))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_excludes_self_from_duplicate_check() {
        let (db, cat) = setup().await;
        let item = db
            .menu()
            .create_item(new_item(&cat.id, "Aloo Tikki", 6000))
            .await
            .unwrap();
        db.menu()
            .create_item(new_item(&cat.id, "Samosa", 2000))
            .await
            .unwrap();

        let updated = db
            .menu()
            .update_item(
                &item.id,
                MenuItemChanges {
                    name: Some("aloo tikki".to_string()),
                    price_paise: Some(6500),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "aloo tikki");
        assert_eq!(updated.price_paise, 6500);

        let clash = MenuItemChanges {
            name: Some("samosa".to_string()),
            ..Default::default()
        };
        assert!(db.menu().update_item(&item.id, clash).await.is_err());
    }

    #[tokio::test]
    async fn test_soft_delete_frees_name_and_hides_item() {
        let (db, cat) = setup().await;
        let item = db
            .menu()
            .create_item(new_item(&cat.id, "Chilli Potato", 12000))
            .await
            .unwrap();

        db.menu().soft_delete_item(&item.id).await.unwrap();
        assert!(db.menu().require_item(&item.id).await.is_err());
        assert!(db.menu().list_items(None, true).await.unwrap().is_empty());

        db.menu()
            .create_item(new_item(&cat.id, "Chilli Potato", 13000))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_availability_filter_and_search() {
        let (db, cat) = setup().await;
        let dosa = db
            .menu()
            .create_item(new_item(&cat.id, "Masala Dosa", 9000))
            .await
            .unwrap();
        db.menu()
            .create_item(new_item(&cat.id, "Rava Dosa", 10000))
            .await
            .unwrap();
        db.menu().set_availability(&dosa.id, false).await.unwrap();

        assert_eq!(db.menu().list_items(None, false).await.unwrap().len(), 1);
        assert_eq!(
            db.menu().list_items(Some(&cat.id), true).await.unwrap().len(),
            2
        );

        let hits = db.menu().search_items("DOSA", 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        // Available items first
        assert_eq!(hits[0].name, "Rava Dosa");
    }

    #[tokio::test]
    async fn test_category_rename_keeps_items_and_delete_guard() {
        let (db, cat) = setup().await;
        let item = db
            .menu()
            .create_item(new_item(&cat.id, "Hara Bhara Kebab", 15000))
            .await
            .unwrap();

        db.menu().rename_category(&cat.id, "Appetizers").await.unwrap();
        let items = db.menu().list_items(Some(&cat.id), true).await.unwrap();
        assert_eq!(items.len(), 1);

        assert!(db.menu().create_category("appetizers").await.is_err());

        assert!(matches!(
            db.menu().delete_category(&cat.id).await,
            Err(DbError::Core(CoreError::CategoryNotEmpty { items: 1, .. }))
        ));

        db.menu().soft_delete_item(&item.id).await.unwrap();
        db.menu().delete_category(&cat.id).await.unwrap();
        assert!(db.menu().list_categories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_category_delete_waits_for_open_orders() {
        let (db, cat) = setup().await;
        let item = db
            .menu()
            .create_item(new_item(&cat.id, "Gobi Manchurian", 14000))
            .await
            .unwrap();
        db.orders().add_item(3, &item.id, 1).await.unwrap();
        db.menu().soft_delete_item(&item.id).await.unwrap();

        assert!(matches!(
            db.menu().delete_category(&cat.id).await,
            Err(DbError::Core(CoreError::CategoryInUse { orders: 1, .. }))
        ));
        assert!(db.menu().get_item(&item.id).await.unwrap().is_some());

        db.orders().cancel(3).await.unwrap();
        db.menu().delete_category(&cat.id).await.unwrap();
        assert!(db.menu().get_item(&item.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_names_fold_beyond_ascii() {
        let (db, cat) = setup().await;
        db.menu()
            .create_item(new_item(&cat.id, "Crème Brûlée", 18000))
            .await
            .unwrap();

        let err = db
            .menu()
            .create_item(new_item(&cat.id, "CRÈME BRÛLÉE", 18000))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::Validation(ValidationError::Duplicate { .. }))
        ));

        let hits = db.menu().search_items("BRÛLÉE", 10).await.unwrap();
        assert_eq!(hits.len(), 1);

        db.menu().create_category("Élan").await.unwrap();
        assert!(db.menu().create_category("élan").await.is_err());
        assert!(db.menu().find_category_by_name("ÉLAN").await.unwrap().is_some());
    }
}
