//! Command-line grammar.

use clap::{Parser, Subcommand};

use crate::commands::account::{InitArgs, UserCommand};
use crate::commands::backup::BackupCommand;
use crate::commands::bill::{BillCommand, CheckoutArgs, UpiArgs};
use crate::commands::inventory::{InventoryCommand, RecipeCommand};
use crate::commands::menu::{CategoryCommand, MenuCommand};
use crate::commands::order::OrderCommand;
use crate::commands::report::ReportCommand;

#[derive(Debug, Parser)]
#[command(name = "tiffin", version, about = "Point of sale for small restaurants")]
pub struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the database and the first admin account
    Init(InitArgs),

    /// Log in and print a session token
    Login {
        username: String,

        #[arg(long)]
        password: String,
    },

    /// Show the logged-in user
    Whoami,

    /// Menu items
    #[command(subcommand)]
    Menu(MenuCommand),

    /// Menu categories
    #[command(subcommand)]
    Category(CategoryCommand),

    /// Open orders per table
    #[command(subcommand)]
    Order(OrderCommand),

    /// Take payment for a table and print the bill
    Checkout(CheckoutArgs),

    /// Print a UPI payment link for a table's total
    Upi(UpiArgs),

    /// Look up bills
    #[command(subcommand)]
    Bill(BillCommand),

    /// Ingredient stock
    #[command(subcommand)]
    Inventory(InventoryCommand),

    /// Ingredients used per menu item
    #[command(subcommand)]
    Recipe(RecipeCommand),

    /// Export bills to CSV
    #[command(subcommand)]
    Backup(BackupCommand),

    /// Sales reports
    #[command(subcommand)]
    Report(ReportCommand),

    /// User accounts
    #[command(subcommand)]
    User(UserCommand),
}

impl Command {
    /// Commands that work without a session.
    pub fn is_public(&self) -> bool {
        matches!(self, Command::Init(_) | Command::Login { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_checkout() {
        let cli = Cli::try_parse_from(["tiffin", "checkout", "4", "--cash", "500"]).unwrap();
        match cli.command {
            Command::Checkout(args) => {
                assert_eq!(args.customer, 4);
                assert_eq!(args.cash.as_deref(), Some("500"));
                assert!(!args.upi);
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(Cli::try_parse_from(["tiffin", "checkout", "4"]).is_err());
        assert!(Cli::try_parse_from(["tiffin", "checkout", "4", "--cash", "5", "--upi"]).is_err());
        assert!(Cli::try_parse_from(["tiffin", "checkout", "4", "--reference", "X1"]).is_err());
    }

    #[test]
    fn test_parse_global_json() {
        let cli = Cli::try_parse_from(["tiffin", "order", "list", "--json"]).unwrap();
        assert!(cli.json);
        assert!(!cli.command.is_public());
    }
}
