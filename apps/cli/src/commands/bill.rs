//! Checkout, bill lookup and UPI payment links.

use std::io::Write;

use clap::{Args, Subcommand};
use serde_json::json;

use super::{parse_money, Output};
use crate::error::{CliError, CliResult};
use crate::state::AppState;
use tiffin_core::payment::Tender;
use tiffin_core::upi::upi_payment_link;
use tiffin_core::{Bill, BillItem, CoreError, Money, Permission};
use tiffin_db::repository::{CheckoutReceipt, CheckoutRequest};

#[derive(Debug, Args)]
pub struct CheckoutArgs {
    /// Table/customer number
    pub customer: i64,

    /// Cash handed over, in rupees
    #[arg(long, conflicts_with = "upi", required_unless_present = "upi")]
    pub cash: Option<String>,

    /// Paid by UPI
    #[arg(long)]
    pub upi: bool,

    /// UPI transaction reference shown in the payer's app
    #[arg(long, requires = "upi")]
    pub reference: Option<String>,

    /// Customer's mobile number, printed on the bill
    #[arg(long)]
    pub phone: Option<String>,
}

#[derive(Debug, Args)]
pub struct UpiArgs {
    /// Table/customer number
    pub customer: i64,

    /// Note shown in the payer's app (default: restaurant and table)
    #[arg(long)]
    pub note: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum BillCommand {
    /// Show a bill by its number
    Show { number: String },

    /// List recent bills
    List {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

pub async fn checkout(state: &AppState, args: CheckoutArgs, out: &mut Output<'_>) -> CliResult<()> {
    let session = state.require(Permission::Checkout).await?;

    let tender = match args.cash {
        Some(cash) => Tender::Cash {
            tendered: parse_money(&cash)?,
        },
        None => Tender::Upi {
            reference: args.reference,
        },
    };

    let receipt = state
        .db
        .bills()
        .checkout(CheckoutRequest {
            customer_number: args.customer,
            tender,
            customer_phone: args.phone,
            cashier_id: Some(session.user_id),
        })
        .await?;

    if out.is_json() {
        return out.json(&receipt);
    }
    print_receipt(state, &receipt, out)
}

fn print_receipt(state: &AppState, receipt: &CheckoutReceipt, out: &mut Output<'_>) -> CliResult<()> {
    writeln!(out, "{}", state.config.restaurant_name)?;
    print_bill(&receipt.bill, &receipt.items, out)?;

    for deduction in receipt.negative_stock() {
        writeln!(
            out,
            "warning: {} stock is now {}",
            deduction.ingredient_name,
            deduction.after.format_in(deduction.unit)
        )?;
    }
    for alert in &receipt.low_stock {
        if !alert.current.is_negative() {
            writeln!(out, "low stock: {}", alert.message())?;
        }
    }
    Ok(())
}

fn print_bill(bill: &Bill, items: &[BillItem], out: &mut Output<'_>) -> CliResult<()> {
    writeln!(out, "Bill {}  {}", bill.bill_number, bill.created_at.format("%Y-%m-%d %H:%M"))?;
    match &bill.customer_name {
        Some(name) => writeln!(out, "Table #{} ({})", bill.customer_number, name)?,
        None => writeln!(out, "Table #{}", bill.customer_number)?,
    }
    if let Some(phone) = &bill.customer_phone {
        writeln!(out, "Phone {}", phone)?;
    }
    writeln!(out, "{}", "-".repeat(60))?;
    for item in items {
        writeln!(
            out,
            "{:>3} x {:<36} {:>16}",
            item.quantity,
            item.name,
            item.total_price().to_string()
        )?;
    }
    writeln!(out, "{}", "-".repeat(60))?;
    writeln!(out, "{:<42} {:>16}", "TOTAL", bill.total().to_string())?;

    match (bill.tendered_paise, bill.change_paise) {
        (Some(tendered), Some(change)) => {
            writeln!(out, "{:<42} {:>16}", "Cash", Money::from_paise(tendered).to_string())?;
            writeln!(out, "{:<42} {:>16}", "Change", Money::from_paise(change).to_string())?;
        }
        _ => {
            let label = match &bill.upi_reference {
                Some(reference) => format!("Paid by UPI (ref {})", reference),
                None => "Paid by UPI".to_string(),
            };
            writeln!(out, "{}", label)?;
        }
    }
    Ok(())
}

pub async fn run(state: &AppState, command: BillCommand, out: &mut Output<'_>) -> CliResult<()> {
    state.require(Permission::ViewReports).await?;
    let bills = state.db.bills();

    match command {
        BillCommand::Show { number } => {
            let bill = bills
                .get_by_number(number.trim())
                .await?
                .ok_or_else(|| CliError::not_found("Bill", &number))?;
            let items = bills.items(&bill.id).await?;
            if out.is_json() {
                return out.json(&json!({ "bill": bill, "items": items }));
            }
            print_bill(&bill, &items, out)?;
        }
        BillCommand::List { limit } => {
            let recent = bills.list_recent(limit).await?;
            if out.is_json() {
                return out.json(&recent);
            }
            if recent.is_empty() {
                writeln!(out, "No bills since the last backup")?;
            }
            for bill in &recent {
                writeln!(
                    out,
                    "{:<15} {:<17} #{:<5} {:<5} {:>12}",
                    bill.bill_number,
                    bill.created_at.format("%Y-%m-%d %H:%M"),
                    bill.customer_number,
                    bill.payment_method.as_str(),
                    bill.total().to_string()
                )?;
            }
        }
    }
    Ok(())
}

/// Prints a `upi://pay` link for an open order's total.
pub async fn upi(state: &AppState, args: UpiArgs, out: &mut Output<'_>) -> CliResult<()> {
    state.require(Permission::Checkout).await?;

    let payee = state.config.upi_payee.as_ref().ok_or_else(|| {
        CliError::validation("UPI is not configured: set TIFFIN_UPI_VPA (and optionally TIFFIN_UPI_PAYEE)")
    })?;
    let order = state
        .db
        .orders()
        .get(args.customer)
        .await?
        .ok_or(CoreError::OrderNotFound(args.customer))?;
    if order.is_empty() {
        return Err(CoreError::EmptyOrder(args.customer).into());
    }

    let note = args
        .note
        .unwrap_or_else(|| format!("{} table {}", state.config.restaurant_name, args.customer));
    let link = upi_payment_link(payee, order.total(), &note)?;

    if out.is_json() {
        return out.json(&json!({
            "customer_number": args.customer,
            "amount": order.total().to_decimal_string(),
            "link": link,
        }));
    }
    writeln!(out, "Pay {} to {}", order.total(), payee.payee_name)?;
    writeln!(out, "{}", link)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::state::testing::state_as;
    use tiffin_core::upi::UpiPayee;
    use tiffin_core::{Quantity, Role, Unit};
    use tiffin_db::repository::{NewIngredient, NewMenuItem, RecipeInput};

    async fn open_table(state: &AppState) {
        let db = &state.db;
        let cat = db.menu().create_category("Sweets").await.unwrap();
        let item = db
            .menu()
            .create_item(NewMenuItem {
                category_id: cat.id,
                name: "Gulab Jamun".to_string(),
                description: None,
                price_paise: 5000,
                is_vegetarian: true,
            })
            .await
            .unwrap();
        let khoya = db
            .inventory()
            .create_ingredient(NewIngredient {
                name: "Khoya".to_string(),
                unit: Unit::Gram,
                initial: Quantity::of(100, Unit::Gram),
                minimum: Quantity::of(50, Unit::Gram),
                full: Quantity::of(1000, Unit::Gram),
            })
            .await
            .unwrap();
        db.inventory()
            .set_recipe(
                &item.id,
                &[RecipeInput {
                    ingredient_id: khoya.ingredient_id,
                    amount: "40".to_string(),
                    unit: Unit::Gram,
                }],
            )
            .await
            .unwrap();
        db.orders().add_item(7, &item.id, 3).await.unwrap();
    }

    #[tokio::test]
    async fn test_cash_checkout_prints_change_and_stock_warning() {
        let state = state_as(Role::Staff).await;
        open_table(&state).await;

        let mut buf = Vec::new();
        let mut out = Output::new(&mut buf, false);
        checkout(
            &state,
            CheckoutArgs {
                customer: 7,
                cash: Some("200".to_string()),
                upi: false,
                reference: None,
                phone: None,
            },
            &mut out,
        )
        .await
        .unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("TOTAL"));
        assert!(text.contains("₹150.00"));
        assert!(text.contains("₹50.00"));
        assert!(text.contains("warning: Khoya stock is now -20"));
        assert!(state.db.orders().get(7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_short_cash_is_a_payment_error() {
        let state = state_as(Role::Staff).await;
        open_table(&state).await;

        let mut buf = Vec::new();
        let mut out = Output::new(&mut buf, false);
        let err = checkout(
            &state,
            CheckoutArgs {
                customer: 7,
                cash: Some("100".to_string()),
                upi: false,
                reference: None,
                phone: None,
            },
            &mut out,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::PaymentError);
        assert!(state.db.orders().get(7).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_upi_link_needs_payee() {
        let mut state = state_as(Role::Staff).await;
        open_table(&state).await;

        let mut buf = Vec::new();
        let mut out = Output::new(&mut buf, false);
        let args = || UpiArgs {
            customer: 7,
            note: None,
        };
        let err = upi(&state, args(), &mut out).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        state.config.upi_payee = Some(UpiPayee::new("annapurna@okaxis", "Annapurna").unwrap());
        upi(&state, args(), &mut out).await.unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("upi://pay?pa=annapurna%40okaxis"));
        assert!(text.contains("am=150.00"));
    }

    #[tokio::test]
    async fn test_staff_cannot_browse_bills() {
        let state = state_as(Role::Staff).await;
        let mut buf = Vec::new();
        let mut out = Output::new(&mut buf, false);
        let err = run(&state, BillCommand::List { limit: 5 }, &mut out)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PermissionDenied);
    }
}
