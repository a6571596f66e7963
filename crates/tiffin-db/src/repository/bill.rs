//! # Bill Repository
//!
//! Bills, bill items, and the checkout transaction that creates them.
//!
//! ## Checkout (one transaction)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │   1. touch customer_orders row    ← takes the write lock first         │
//! │      (bill time is read after the lock is held)                        │
//! │   2. load order, Pending → Completed (must have lines)                 │
//! │   3. settle payment (cash change / UPI reference)                      │
//! │   4. INSERT bills, bill_items, sales_records                           │
//! │   5. plan + apply recipe deductions (no clamping, negatives warned)    │
//! │   6. DELETE customer_orders row                                        │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Any error before COMMIT → rollback: no bill, stock untouched,         │
//! │  order still open.                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::{inventory, order, settings};
use tiffin_core::inventory::{low_stock_alerts, plan_deductions, StockAlert, StockDeduction};
use tiffin_core::payment::{settle, Tender};
use tiffin_core::validation::validate_phone;
use tiffin_core::{Bill, BillItem, CoreError, CustomerOrder};

/// What the cashier submits to close a table.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub customer_number: i64,
    pub tender: Tender,
    pub customer_phone: Option<String>,
    /// Logged-in user taking the payment.
    pub cashier_id: Option<String>,
}

/// Everything checkout produced.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutReceipt {
    pub bill: Bill,
    pub items: Vec<BillItem>,
    pub deductions: Vec<StockDeduction>,
    /// Low-stock alerts for ingredients this order used.
    pub low_stock: Vec<StockAlert>,
}

impl CheckoutReceipt {
    /// Ingredients that went below zero.
    pub fn negative_stock(&self) -> impl Iterator<Item = &StockDeduction> {
        self.deductions.iter().filter(|d| d.went_negative())
    }
}

const BILL_COLUMNS: &str = r#"
    id, bill_number, customer_number, customer_name, customer_phone,
    total_paise, payment_method, tendered_paise, change_paise,
    upi_reference, cashier_id, created_at
"#;

/// Repository for bill database operations.
#[derive(Debug, Clone)]
pub struct BillRepository {
    pool: SqlitePool,
}

impl BillRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BillRepository { pool }
    }

    /// Converts the table's order into a paid bill and deducts stock.
    pub async fn checkout(&self, request: CheckoutRequest) -> DbResult<CheckoutReceipt> {
        let customer_phone = validate_phone(request.customer_phone.as_deref())?;

        debug!(
            customer_number = request.customer_number,
            method = %request.tender.method(),
            "Starting checkout"
        );

        let mut tx = self.pool.begin().await?;

        // Write first so a concurrent checkout waits here instead of
        // failing to upgrade a read lock later.
        let touched = sqlx::query(
            "UPDATE customer_orders SET updated_at = ?2 WHERE customer_number = ?1",
        )
        .bind(request.customer_number)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        if touched.rows_affected() == 0 {
            return Err(CoreError::OrderNotFound(request.customer_number).into());
        }

        // Stamped under the lock: a backup that committed before us used an
        // earlier cutoff, so this bill lands in the next window.
        let now = Utc::now();

        let mut order = order::load_in(&mut tx, request.customer_number)
            .await?
            .ok_or(CoreError::OrderNotFound(request.customer_number))?;
        order.complete()?;

        let total = order.total();
        let settlement = settle(total, &request.tender)?;
        let bill_number = settings::next_bill_number_in(&mut tx, now).await?;

        let bill = Bill {
            id: Uuid::new_v4().to_string(),
            bill_number,
            customer_number: order.customer_number,
            customer_name: order.customer_name.clone(),
            customer_phone,
            total_paise: total.paise(),
            payment_method: settlement.method,
            tendered_paise: settlement.tendered.map(|m| m.paise()),
            change_paise: settlement.change.map(|m| m.paise()),
            upi_reference: settlement.upi_reference,
            cashier_id: request.cashier_id,
            created_at: now,
        };

        insert_bill_in(&mut tx, &bill).await?;
        let items = insert_items_in(&mut tx, &bill, &order).await?;

        let item_ids: Vec<&str> = order
            .lines
            .iter()
            .map(|l| l.menu_item_id.as_str())
            .collect();
        let recipes = inventory::recipes_for_in(&mut tx, &item_ids).await?;
        let plan = plan_deductions(&order.lines, &recipes)?;
        let deductions = inventory::apply_deductions_in(&mut tx, &plan, now).await?;

        order::delete_in(&mut tx, order.customer_number).await?;

        let levels = inventory::list_levels_in(&mut tx).await?;
        let low_stock: Vec<StockAlert> = low_stock_alerts(&levels)
            .into_iter()
            .filter(|a| deductions.iter().any(|d| d.ingredient_id == a.ingredient_id))
            .collect();

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            bill_number = %bill.bill_number,
            customer_number = bill.customer_number,
            total = %total,
            method = %bill.payment_method,
            lines = items.len(),
            "Bill created"
        );
        for alert in &low_stock {
            warn!(ingredient = %alert.name, percentage = alert.percentage, "{}", alert.message());
        }

        Ok(CheckoutReceipt {
            bill,
            items,
            deductions,
            low_stock,
        })
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Bill>> {
        let sql = format!("SELECT {} FROM bills WHERE id = ?1", BILL_COLUMNS);
        let bill = sqlx::query_as::<_, Bill>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(bill)
    }

    pub async fn get_by_number(&self, bill_number: &str) -> DbResult<Option<Bill>> {
        let sql = format!("SELECT {} FROM bills WHERE bill_number = ?1", BILL_COLUMNS);
        let bill = sqlx::query_as::<_, Bill>(&sql)
            .bind(bill_number.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(bill)
    }

    pub async fn items(&self, bill_id: &str) -> DbResult<Vec<BillItem>> {
        let mut conn = self.pool.acquire().await?;
        items_in(&mut conn, bill_id).await
    }

    /// Most recent bills first.
    pub async fn list_recent(&self, limit: i64) -> DbResult<Vec<Bill>> {
        let sql = format!(
            "SELECT {} FROM bills ORDER BY created_at DESC LIMIT ?1",
            BILL_COLUMNS
        );
        let bills = sqlx::query_as::<_, Bill>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(bills)
    }

    /// Bills in `(after, up_to]`, oldest first. `after = None` has no lower bound.
    pub async fn list_between(
        &self,
        after: Option<DateTime<Utc>>,
        up_to: DateTime<Utc>,
    ) -> DbResult<Vec<Bill>> {
        let mut conn = self.pool.acquire().await?;
        list_between_in(&mut conn, after, up_to).await
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bills")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Connection-level helpers
// =============================================================================

async fn insert_bill_in(conn: &mut SqliteConnection, bill: &Bill) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO bills (
            id, bill_number, customer_number, customer_name, customer_phone,
            total_paise, payment_method, tendered_paise, change_paise,
            upi_reference, cashier_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&bill.id)
    .bind(&bill.bill_number)
    .bind(bill.customer_number)
    .bind(&bill.customer_name)
    .bind(&bill.customer_phone)
    .bind(bill.total_paise)
    .bind(bill.payment_method)
    .bind(bill.tendered_paise)
    .bind(bill.change_paise)
    .bind(&bill.upi_reference)
    .bind(&bill.cashier_id)
    .bind(bill.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Writes one bill item and one sales record per order line.
async fn insert_items_in(
    conn: &mut SqliteConnection,
    bill: &Bill,
    order: &CustomerOrder,
) -> DbResult<Vec<BillItem>> {
    let mut items = Vec::with_capacity(order.lines.len());

    for line in &order.lines {
        let item = BillItem {
            id: Uuid::new_v4().to_string(),
            bill_id: bill.id.clone(),
            menu_item_id: line.menu_item_id.clone(),
            name: line.name.clone(),
            unit_price_paise: line.unit_price_paise,
            quantity: line.quantity,
            total_price_paise: line.total_price_paise,
        };

        sqlx::query(
            r#"
            INSERT INTO bill_items (
                id, bill_id, menu_item_id, name, unit_price_paise, quantity, total_price_paise
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&item.id)
        .bind(&item.bill_id)
        .bind(&item.menu_item_id)
        .bind(&item.name)
        .bind(item.unit_price_paise)
        .bind(item.quantity)
        .bind(item.total_price_paise)
        .execute(&mut *conn)
        .await?;

        let category_name: Option<String> = sqlx::query_scalar(
            r#"
            SELECT c.name FROM menu_items m
            JOIN menu_categories c ON c.id = m.category_id
            WHERE m.id = ?1
            "#,
        )
        .bind(&line.menu_item_id)
        .fetch_optional(&mut *conn)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO sales_records (
                id, bill_id, menu_item_id, item_name, category_name,
                quantity, amount_paise, payment_method, sold_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&bill.id)
        .bind(&line.menu_item_id)
        .bind(&line.name)
        .bind(category_name)
        .bind(line.quantity)
        .bind(line.total_price_paise)
        .bind(bill.payment_method)
        .bind(bill.created_at)
        .execute(&mut *conn)
        .await?;

        items.push(item);
    }

    Ok(items)
}

pub(crate) async fn items_in(conn: &mut SqliteConnection, bill_id: &str) -> DbResult<Vec<BillItem>> {
    let items = sqlx::query_as::<_, BillItem>(
        r#"
        SELECT id, bill_id, menu_item_id, name, unit_price_paise, quantity, total_price_paise
        FROM bill_items
        WHERE bill_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(bill_id)
    .fetch_all(conn)
    .await?;

    Ok(items)
}

pub(crate) async fn list_between_in(
    conn: &mut SqliteConnection,
    after: Option<DateTime<Utc>>,
    up_to: DateTime<Utc>,
) -> DbResult<Vec<Bill>> {
    let sql = format!(
        r#"
        SELECT {} FROM bills
        WHERE (?1 IS NULL OR created_at > ?1) AND created_at <= ?2
        ORDER BY created_at, bill_number
        "#,
        BILL_COLUMNS
    );

    let bills = sqlx::query_as::<_, Bill>(&sql)
        .bind(after)
        .bind(up_to)
        .fetch_all(conn)
        .await?;

    Ok(bills)
}
