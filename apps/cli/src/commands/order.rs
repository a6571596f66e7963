//! Open order commands. Orders are keyed by table/customer number.

use std::io::Write;

use clap::Subcommand;

use super::{resolve_item, Output};
use crate::error::CliResult;
use crate::state::AppState;
use tiffin_core::{CustomerOrder, Permission};

#[derive(Debug, Subcommand)]
pub enum OrderCommand {
    /// List open orders
    List,

    /// Show one order
    Show { customer: i64 },

    /// Add an item (opens the order if needed)
    Add {
        customer: i64,

        /// Item name or id
        item: String,

        #[arg(long, short, default_value_t = 1)]
        qty: i64,
    },

    /// Set an item's quantity (0 removes it)
    Set {
        customer: i64,
        item: String,
        qty: i64,
    },

    /// Remove an item
    Remove { customer: i64, item: String },

    /// Set or clear the customer's name
    Name {
        customer: i64,

        /// Omit to clear
        name: Option<String>,
    },

    /// Cancel the order
    Cancel { customer: i64 },
}

pub async fn run(state: &AppState, command: OrderCommand, out: &mut Output<'_>) -> CliResult<()> {
    let db = &state.db;
    state.require(Permission::TakeOrders).await?;

    match command {
        OrderCommand::List => {
            let orders = db.orders().list_pending().await?;
            if out.is_json() {
                return out.json(&orders);
            }
            if orders.is_empty() {
                writeln!(out, "No open orders")?;
            }
            for order in &orders {
                writeln!(
                    out,
                    "#{:<5} {:<20} {:>3} item(s) {:>12}",
                    order.customer_number,
                    order.customer_name.as_deref().unwrap_or("-"),
                    order.total_quantity(),
                    order.total().to_string()
                )?;
            }
            return Ok(());
        }
        OrderCommand::Show { customer } => {
            let order = db
                .orders()
                .get(customer)
                .await?
                .ok_or(tiffin_core::CoreError::OrderNotFound(customer))?;
            return print_order(&order, out);
        }
        OrderCommand::Add {
            customer,
            item,
            qty,
        } => {
            let item = resolve_item(db, &item).await?;
            let order = db.orders().add_item(customer, &item.id, qty).await?;
            print_order(&order, out)?;
        }
        OrderCommand::Set {
            customer,
            item,
            qty,
        } => {
            let item = resolve_item(db, &item).await?;
            let order = db.orders().set_quantity(customer, &item.id, qty).await?;
            print_order(&order, out)?;
        }
        OrderCommand::Remove { customer, item } => {
            let item = resolve_item(db, &item).await?;
            let order = db.orders().remove_item(customer, &item.id).await?;
            print_order(&order, out)?;
        }
        OrderCommand::Name { customer, name } => {
            let order = db.orders().set_customer_name(customer, name).await?;
            print_order(&order, out)?;
        }
        OrderCommand::Cancel { customer } => {
            let order = db.orders().cancel(customer).await?;
            if out.is_json() {
                return out.json(&order);
            }
            writeln!(out, "Cancelled order #{}", order.customer_number)?;
        }
    }
    Ok(())
}

pub(crate) fn print_order(order: &CustomerOrder, out: &mut Output<'_>) -> CliResult<()> {
    if out.is_json() {
        return out.json(order);
    }

    match &order.customer_name {
        Some(name) => writeln!(out, "Order #{} ({})", order.customer_number, name)?,
        None => writeln!(out, "Order #{}", order.customer_number)?,
    }
    if order.lines.is_empty() {
        writeln!(out, "  (no items)")?;
    }
    for line in &order.lines {
        writeln!(
            out,
            "  {:>3} x {:<30} {:>10} {:>12}",
            line.quantity,
            line.name,
            line.unit_price().to_string(),
            line.total_price().to_string()
        )?;
    }
    writeln!(out, "  {:>58}", format!("Total {}", order.total()))?;
    Ok(())
}
