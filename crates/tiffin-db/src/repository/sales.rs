//! Sales reporting over `sales_records`.
//!
//! Sales records are written at checkout and never touched by backup, so
//! reports keep working after old bills have been exported and deleted.
//! Date ranges are inclusive calendar days in UTC.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use tiffin_core::Money;

/// Revenue for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyTotal {
    pub day: NaiveDate,
    pub revenue: Money,
    pub bill_count: i64,
    pub items_sold: i64,
}

/// A menu item ranked by quantity sold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct TopItem {
    pub menu_item_id: String,
    pub item_name: String,
    pub quantity: i64,
    pub revenue_paise: i64,
}

impl TopItem {
    pub fn revenue(&self) -> Money {
        Money::from_paise(self.revenue_paise)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CategoryTotal {
    /// `None` for items whose category was unknown at checkout.
    pub category_name: Option<String>,
    pub quantity: i64,
    pub revenue_paise: i64,
}

/// Totals for a date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SalesSummary {
    pub revenue: Money,
    pub bill_count: i64,
    pub items_sold: i64,
}

#[derive(sqlx::FromRow)]
struct DailyRow {
    day: String,
    revenue_paise: i64,
    bill_count: i64,
    items_sold: i64,
}

#[derive(Debug, Clone)]
pub struct SalesRepository {
    pool: SqlitePool,
}

impl SalesRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SalesRepository { pool }
    }

    /// One entry per day that had sales, oldest first.
    pub async fn daily_totals(&self, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<DailyTotal>> {
        debug!(%from, %to, "Daily totals");

        let rows = sqlx::query_as::<_, DailyRow>(
            r#"
            SELECT substr(sold_at, 1, 10) AS day,
                   SUM(amount_paise) AS revenue_paise,
                   COUNT(DISTINCT bill_id) AS bill_count,
                   SUM(quantity) AS items_sold
            FROM sales_records
            WHERE substr(sold_at, 1, 10) BETWEEN ?1 AND ?2
            GROUP BY day
            ORDER BY day
            "#,
        )
        .bind(from.to_string())
        .bind(to.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let day = NaiveDate::parse_from_str(&row.day, "%Y-%m-%d")
                    .map_err(|e| DbError::Internal(format!("bad sale date '{}': {}", row.day, e)))?;
                Ok(DailyTotal {
                    day,
                    revenue: Money::from_paise(row.revenue_paise),
                    bill_count: row.bill_count,
                    items_sold: row.items_sold,
                })
            })
            .collect()
    }

    /// Best sellers by quantity, ties broken by revenue then name.
    pub async fn top_items(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        limit: i64,
    ) -> DbResult<Vec<TopItem>> {
        debug!(%from, %to, limit, "Top items");

        let items = sqlx::query_as::<_, TopItem>(
            r#"
            SELECT menu_item_id,
                   MAX(item_name) AS item_name,
                   SUM(quantity) AS quantity,
                   SUM(amount_paise) AS revenue_paise
            FROM sales_records
            WHERE substr(sold_at, 1, 10) BETWEEN ?1 AND ?2
            GROUP BY menu_item_id
            ORDER BY quantity DESC, revenue_paise DESC, item_name
            LIMIT ?3
            "#,
        )
        .bind(from.to_string())
        .bind(to.to_string())
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    pub async fn category_totals(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<CategoryTotal>> {
        let totals = sqlx::query_as::<_, CategoryTotal>(
            r#"
            SELECT category_name,
                   SUM(quantity) AS quantity,
                   SUM(amount_paise) AS revenue_paise
            FROM sales_records
            WHERE substr(sold_at, 1, 10) BETWEEN ?1 AND ?2
            GROUP BY category_name
            ORDER BY revenue_paise DESC
            "#,
        )
        .bind(from.to_string())
        .bind(to.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(totals)
    }

    pub async fn total_between(&self, from: NaiveDate, to: NaiveDate) -> DbResult<SalesSummary> {
        let (revenue_paise, bill_count, items_sold): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(amount_paise), 0),
                   COUNT(DISTINCT bill_id),
                   COALESCE(SUM(quantity), 0)
            FROM sales_records
            WHERE substr(sold_at, 1, 10) BETWEEN ?1 AND ?2
            "#,
        )
        .bind(from.to_string())
        .bind(to.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(SalesSummary {
            revenue: Money::from_paise(revenue_paise),
            bill_count,
            items_sold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::bill::CheckoutRequest;
    use crate::repository::menu::NewMenuItem;
    use crate::{Database, DbConfig};
    use chrono::{Duration, Utc};
    use tiffin_core::payment::Tender;

    async fn sell(db: &Database, table: i64, lines: &[(&str, i64)]) {
        for (id, qty) in lines {
            db.orders().add_item(table, id, *qty).await.unwrap();
        }
        db.bills()
            .checkout(CheckoutRequest {
                customer_number: table,
                tender: Tender::Upi { reference: None },
                customer_phone: None,
                cashier_id: None,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reports_after_checkout() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mains = db.menu().create_category("Mains").await.unwrap();
        let drinks = db.menu().create_category("Drinks").await.unwrap();
        let new = |cat: &str, name: &str, price_paise: i64| NewMenuItem {
            category_id: cat.to_string(),
            name: name.to_string(),
            description: None,
            price_paise,
            is_vegetarian: true,
        };
        let thali = db.menu().create_item(new(&mains.id, "Thali", 18000)).await.unwrap();
        let chai = db.menu().create_item(new(&drinks.id, "Chai", 1500)).await.unwrap();

        sell(&db, 1, &[(&thali.id, 2), (&chai.id, 2)]).await;
        sell(&db, 2, &[(&chai.id, 5)]).await;

        let today = Utc::now().date_naive();
        let yesterday = today - Duration::days(1);

        let summary = db.sales().total_between(today, today).await.unwrap();
        assert_eq!(summary.bill_count, 2);
        assert_eq!(summary.items_sold, 9);
        assert_eq!(summary.revenue, Money::from_paise(2 * 18000 + 7 * 1500));

        let daily = db.sales().daily_totals(yesterday, today).await.unwrap();
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].day, today);
        assert_eq!(daily[0].revenue, summary.revenue);

        let top = db.sales().top_items(today, today, 1).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].item_name, "Chai");
        assert_eq!(top[0].quantity, 7);

        let cats = db.sales().category_totals(today, today).await.unwrap();
        assert_eq!(cats[0].category_name.as_deref(), Some("Mains"));

        let empty = db.sales().total_between(yesterday, yesterday).await.unwrap();
        assert_eq!(empty.revenue, Money::zero());
        assert_eq!(empty.bill_count, 0);
    }
}
