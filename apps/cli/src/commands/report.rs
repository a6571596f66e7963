//! Sales reports. Read from `sales_records`, so they survive bill backups.

use std::io::Write;

use chrono::{NaiveDate, Utc};
use clap::{Args, Subcommand};
use serde_json::json;

use super::Output;
use crate::error::{CliError, CliResult};
use crate::state::AppState;
use tiffin_core::{Money, Permission};

/// Inclusive date range, in UTC days. Both ends default to today.
#[derive(Debug, Clone, Args)]
pub struct Range {
    /// First day, YYYY-MM-DD
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last day, YYYY-MM-DD
    #[arg(long)]
    pub to: Option<NaiveDate>,
}

impl Range {
    fn resolve(&self) -> CliResult<(NaiveDate, NaiveDate)> {
        let today = Utc::now().date_naive();
        let to = self.to.unwrap_or(today);
        let from = self.from.unwrap_or(to);
        if from > to {
            return Err(CliError::validation(format!(
                "--from ({}) is after --to ({})",
                from, to
            )));
        }
        Ok((from, to))
    }
}

#[derive(Debug, Subcommand)]
pub enum ReportCommand {
    /// Revenue, bills and items for the range
    Summary {
        #[command(flatten)]
        range: Range,
    },

    /// One line per day
    Daily {
        #[command(flatten)]
        range: Range,
    },

    /// Best-selling items
    Top {
        #[command(flatten)]
        range: Range,

        #[arg(long, default_value_t = 10)]
        limit: i64,
    },

    /// Revenue per menu category
    Categories {
        #[command(flatten)]
        range: Range,
    },
}

pub async fn run(state: &AppState, command: ReportCommand, out: &mut Output<'_>) -> CliResult<()> {
    state.require(Permission::ViewReports).await?;
    let sales = state.db.sales();

    match command {
        ReportCommand::Summary { range } => {
            let (from, to) = range.resolve()?;
            let summary = sales.total_between(from, to).await?;
            if out.is_json() {
                return out.json(&json!({ "from": from, "to": to, "summary": summary }));
            }
            writeln!(out, "Sales {} to {}", from, to)?;
            writeln!(out, "  Revenue     {}", summary.revenue)?;
            writeln!(out, "  Bills       {}", summary.bill_count)?;
            writeln!(out, "  Items sold  {}", summary.items_sold)?;
        }
        ReportCommand::Daily { range } => {
            let (from, to) = range.resolve()?;
            let days = sales.daily_totals(from, to).await?;
            if out.is_json() {
                return out.json(&days);
            }
            if days.is_empty() {
                writeln!(out, "No sales between {} and {}", from, to)?;
                return Ok(());
            }
            writeln!(out, "{:<12} {:>6} {:>6} {:>14}", "DAY", "BILLS", "ITEMS", "REVENUE")?;
            for day in &days {
                writeln!(
                    out,
                    "{:<12} {:>6} {:>6} {:>14}",
                    day.day.to_string(),
                    day.bill_count,
                    day.items_sold,
                    day.revenue.to_string()
                )?;
            }
        }
        ReportCommand::Top { range, limit } => {
            let (from, to) = range.resolve()?;
            let items = sales.top_items(from, to, limit).await?;
            if out.is_json() {
                return out.json(&items);
            }
            if items.is_empty() {
                writeln!(out, "No sales between {} and {}", from, to)?;
            }
            for (rank, item) in items.iter().enumerate() {
                writeln!(
                    out,
                    "{:>2}. {:<32} {:>5} {:>14}",
                    rank + 1,
                    item.item_name,
                    item.quantity,
                    item.revenue().to_string()
                )?;
            }
        }
        ReportCommand::Categories { range } => {
            let (from, to) = range.resolve()?;
            let totals = sales.category_totals(from, to).await?;
            if out.is_json() {
                return out.json(&totals);
            }
            for total in &totals {
                writeln!(
                    out,
                    "{:<24} {:>5} {:>14}",
                    total.category_name.as_deref().unwrap_or("(uncategorised)"),
                    total.quantity,
                    Money::from_paise(total.revenue_paise).to_string()
                )?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::state::testing::state_as;
    use tiffin_core::payment::Tender;
    use tiffin_core::Role;
    use tiffin_db::repository::{CheckoutRequest, NewMenuItem};

    #[test]
    fn test_range_defaults_and_order() {
        let today = Utc::now().date_naive();
        let range = Range { from: None, to: None };
        assert_eq!(range.resolve().unwrap(), (today, today));

        let backwards = Range {
            from: NaiveDate::from_ymd_opt(2026, 3, 2),
            to: NaiveDate::from_ymd_opt(2026, 3, 1),
        };
        assert!(backwards.resolve().is_err());
    }

    #[tokio::test]
    async fn test_summary_counts_todays_sales() {
        let state = state_as(Role::Manager).await;
        let cat = state.db.menu().create_category("Drinks").await.unwrap();
        let chai = state
            .db
            .menu()
            .create_item(NewMenuItem {
                category_id: cat.id,
                name: "Masala Chai".to_string(),
                description: None,
                price_paise: 2000,
                is_vegetarian: true,
            })
            .await
            .unwrap();
        state.db.orders().add_item(2, &chai.id, 4).await.unwrap();
        state
            .db
            .bills()
            .checkout(CheckoutRequest {
                customer_number: 2,
                tender: Tender::Upi { reference: None },
                customer_phone: None,
                cashier_id: None,
            })
            .await
            .unwrap();

        let mut buf = Vec::new();
        let mut out = Output::new(&mut buf, false);
        let range = Range { from: None, to: None };
        run(&state, ReportCommand::Summary { range: range.clone() }, &mut out)
            .await
            .unwrap();
        run(&state, ReportCommand::Top { range, limit: 5 }, &mut out)
            .await
            .unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Revenue     ₹80.00"));
        assert!(text.contains("Bills       1"));
        assert!(text.contains(" 1. Masala Chai"));
    }

    #[tokio::test]
    async fn test_staff_cannot_view_reports() {
        let state = state_as(Role::Staff).await;
        let mut buf = Vec::new();
        let mut out = Output::new(&mut buf, false);
        let err = run(
            &state,
            ReportCommand::Summary {
                range: Range { from: None, to: None },
            },
            &mut out,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::PermissionDenied);
    }
}
