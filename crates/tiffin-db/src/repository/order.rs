//! # Order Repository
//!
//! Open orders, one per table/customer number.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  add_item(4, dosa, 2)  ──►  row created: Pending, lines_json [dosa×2]  │
//! │  add_item(4, dosa, 1)  ──►  merged:      lines_json [dosa×3]           │
//! │  set_quantity / remove_item / set_customer_name                        │
//! │        │                                                                │
//! │        ├── cancel(4)            → Cancelled, row deleted               │
//! │        └── bills().checkout(..) → Completed, row deleted, bill written │
//! │                                                                         │
//! │  Table 4 is free again once the row is gone.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every change is read-modify-write inside one transaction, with the state
//! rules enforced by [`CustomerOrder`].

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use tiffin_core::validation::validate_customer_number;
use tiffin_core::{CoreError, CoreResult, CustomerOrder, MenuItem, OrderStatus};

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    customer_number: i64,
    customer_name: Option<String>,
    lines_json: String,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for CustomerOrder {
    type Error = DbError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(CustomerOrder {
            customer_number: row.customer_number,
            customer_name: row.customer_name,
            lines: CustomerOrder::parse_lines(&row.lines_json)?,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for open customer orders.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    pub async fn get(&self, customer_number: i64) -> DbResult<Option<CustomerOrder>> {
        let mut conn = self.pool.acquire().await?;
        load_in(&mut conn, customer_number).await
    }

    /// Orders still being taken, by table number.
    pub async fn list_pending(&self) -> DbResult<Vec<CustomerOrder>> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT customer_number, customer_name, lines_json, status, created_at, updated_at
            FROM customer_orders
            WHERE status = ?1
            ORDER BY customer_number
            "#,
        )
        .bind(OrderStatus::Pending)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CustomerOrder::try_from).collect()
    }

    /// Adds a menu item to the table's order, opening the order if needed.
    ///
    /// Name and price are copied from the menu now; later menu edits do not
    /// change this order.
    pub async fn add_item(
        &self,
        customer_number: i64,
        menu_item_id: &str,
        quantity: i64,
    ) -> DbResult<CustomerOrder> {
        validate_customer_number(customer_number)?;
        debug!(customer_number, menu_item_id = %menu_item_id, quantity, "Adding item to order");

        let mut tx = self.pool.begin().await?;

        let item = load_menu_item_in(&mut tx, menu_item_id).await?;
        let now = Utc::now();
        let mut order = load_in(&mut tx, customer_number)
            .await?
            .unwrap_or_else(|| CustomerOrder::new(customer_number, now));

        order.add_item(&item, quantity)?;
        order.updated_at = now;
        save_in(&mut tx, &order).await?;

        tx.commit().await?;
        Ok(order)
    }

    /// Sets a line's quantity; 0 removes the line.
    pub async fn set_quantity(
        &self,
        customer_number: i64,
        menu_item_id: &str,
        quantity: i64,
    ) -> DbResult<CustomerOrder> {
        self.mutate(customer_number, |order| {
            order.set_quantity(menu_item_id, quantity)
        })
        .await
    }

    pub async fn remove_item(
        &self,
        customer_number: i64,
        menu_item_id: &str,
    ) -> DbResult<CustomerOrder> {
        self.mutate(customer_number, |order| order.remove_item(menu_item_id))
            .await
    }

    pub async fn set_customer_name(
        &self,
        customer_number: i64,
        name: Option<String>,
    ) -> DbResult<CustomerOrder> {
        self.mutate(customer_number, |order| order.set_customer_name(name))
            .await
    }

    /// Pending → Cancelled. The row is removed so the number can be reused.
    pub async fn cancel(&self, customer_number: i64) -> DbResult<CustomerOrder> {
        let mut tx = self.pool.begin().await?;

        let mut order = load_in(&mut tx, customer_number)
            .await?
            .ok_or(CoreError::OrderNotFound(customer_number))?;
        order.cancel()?;
        delete_in(&mut tx, customer_number).await?;

        tx.commit().await?;

        info!(
            customer_number,
            lines = order.lines.len(),
            "Order cancelled"
        );
        Ok(order)
    }

    async fn mutate<F>(&self, customer_number: i64, f: F) -> DbResult<CustomerOrder>
    where
        F: FnOnce(&mut CustomerOrder) -> CoreResult<()>,
    {
        let mut tx = self.pool.begin().await?;

        let mut order = load_in(&mut tx, customer_number)
            .await?
            .ok_or(CoreError::OrderNotFound(customer_number))?;
        f(&mut order)?;
        order.updated_at = Utc::now();
        save_in(&mut tx, &order).await?;

        tx.commit().await?;
        debug!(customer_number, lines = order.lines.len(), "Order updated");
        Ok(order)
    }
}

// =============================================================================
// Connection-level helpers (shared with checkout)
// =============================================================================

pub(crate) async fn load_in(
    conn: &mut SqliteConnection,
    customer_number: i64,
) -> DbResult<Option<CustomerOrder>> {
    let row = sqlx::query_as::<_, OrderRow>(
        r#"
        SELECT customer_number, customer_name, lines_json, status, created_at, updated_at
        FROM customer_orders
        WHERE customer_number = ?1
        "#,
    )
    .bind(customer_number)
    .fetch_optional(conn)
    .await?;

    row.map(CustomerOrder::try_from).transpose()
}

async fn save_in(conn: &mut SqliteConnection, order: &CustomerOrder) -> DbResult<()> {
    let lines_json = order.lines_json()?;

    sqlx::query(
        r#"
        INSERT INTO customer_orders (
            customer_number, customer_name, lines_json, status, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT (customer_number) DO UPDATE SET
            customer_name = excluded.customer_name,
            lines_json = excluded.lines_json,
            status = excluded.status,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(order.customer_number)
    .bind(&order.customer_name)
    .bind(&lines_json)
    .bind(order.status)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

pub(crate) async fn delete_in(conn: &mut SqliteConnection, customer_number: i64) -> DbResult<()> {
    sqlx::query("DELETE FROM customer_orders WHERE customer_number = ?1")
        .bind(customer_number)
        .execute(conn)
        .await?;
    Ok(())
}

async fn load_menu_item_in(conn: &mut SqliteConnection, id: &str) -> DbResult<MenuItem> {
    let item = sqlx::query_as::<_, MenuItem>(
        r#"
        SELECT id, category_id, name, description, price_paise,
               is_vegetarian, is_available, is_active, created_at, updated_at
        FROM menu_items
        WHERE id = ?1 AND is_active = 1
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    item.ok_or_else(|| CoreError::MenuItemNotFound(id.to_string()).into())
}
