//! # Commands Module
//!
//! One module per subcommand group. Each exposes a clap `Subcommand` enum
//! and a `run` function taking the app state and an [`Output`].
//!
//! ```text
//! commands/
//! ├── mod.rs        ◄─── Output, name/id lookups
//! ├── account.rs    ◄─── init, login, whoami, user management
//! ├── menu.rs       ◄─── categories and menu items
//! ├── order.rs      ◄─── open orders per table
//! ├── bill.rs       ◄─── checkout, bill lookup, UPI links
//! ├── inventory.rs  ◄─── stock levels and recipes
//! ├── backup.rs     ◄─── incremental CSV backup
//! └── report.rs     ◄─── sales reports
//! ```
//!
//! ## Command Flow
//! ```text
//! tiffin order add 4 "Masala Dosa" --qty 2
//!        │
//!        ▼  state.require(Permission::TakeOrders)   (TIFFIN_TOKEN + users row)
//!        ▼  resolve_item(db, "Masala Dosa")
//!        ▼  db.orders().add_item(4, &item.id, 2)
//!        ▼  Output: text table, or JSON with --json
//! ```

pub mod account;
pub mod backup;
pub mod bill;
pub mod inventory;
pub mod menu;
pub mod order;
pub mod report;

use std::io::{self, Write};

use serde::Serialize;

use crate::error::{CliError, CliResult, ErrorCode};
use tiffin_core::{CoreError, Ingredient, MenuCategory, MenuItem, Money};
use tiffin_db::Database;

/// Where command results go: human text or `--json`.
pub struct Output<'a> {
    writer: &'a mut dyn Write,
    json: bool,
}

impl<'a> Output<'a> {
    pub fn new(writer: &'a mut dyn Write, json: bool) -> Self {
        Output { writer, json }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> CliResult<()> {
        serde_json::to_writer_pretty(&mut *self.writer, value)?;
        writeln!(self.writer)?;
        Ok(())
    }
}

impl Write for Output<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl From<io::Error> for CliError {
    fn from(err: io::Error) -> Self {
        CliError::new(ErrorCode::Internal, format!("Could not write output: {}", err))
    }
}

// =============================================================================
// Lookups by id or name
// =============================================================================

/// Finds an active menu item by id, exact name, or a unique partial name.
pub(crate) async fn resolve_item(db: &Database, reference: &str) -> CliResult<MenuItem> {
    if let Some(item) = db.menu().get_item(reference).await? {
        if item.is_active {
            return Ok(item);
        }
    }

    let mut matches = db.menu().search_items(reference, 20).await?;
    if let Some(pos) = matches
        .iter()
        .position(|i| i.name.eq_ignore_ascii_case(reference.trim()))
    {
        return Ok(matches.swap_remove(pos));
    }

    match matches.len() {
        0 => Err(CliError::not_found("Menu item", reference)),
        1 => Ok(matches.swap_remove(0)),
        _ => Err(CliError::validation(format!(
            "'{}' matches several items: {}",
            reference,
            matches
                .iter()
                .map(|i| i.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

pub(crate) async fn resolve_category(db: &Database, reference: &str) -> CliResult<MenuCategory> {
    if let Some(category) = db.menu().find_category_by_name(reference).await? {
        return Ok(category);
    }
    db.menu()
        .get_category(reference)
        .await?
        .ok_or_else(|| CliError::not_found("Category", reference))
}

pub(crate) async fn resolve_ingredient(db: &Database, reference: &str) -> CliResult<Ingredient> {
    if let Some(ingredient) = db.inventory().find_ingredient_by_name(reference).await? {
        return Ok(ingredient);
    }
    db.inventory()
        .get_ingredient(reference)
        .await?
        .ok_or_else(|| CliError::not_found("Ingredient", reference))
}

/// Parses a rupee amount typed by the operator (`149.50`, `₹20`).
pub(crate) fn parse_money(input: &str) -> CliResult<Money> {
    let cleaned = input.trim().trim_start_matches('₹');
    Money::parse_rupees(cleaned).map_err(|e| CliError::from(CoreError::from(e)))
}
