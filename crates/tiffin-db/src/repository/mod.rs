//! # Repository Module
//!
//! One repository per aggregate, each a thin handle around the pool.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CLI command                                                            │
//! │       │  db.orders().add_item(4, &dosa_id, 2)                           │
//! │       ▼                                                                 │
//! │  OrderRepository ──► load_in / save_in (one transaction)               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Functions ending in `_in` take a `&mut SqliteConnection` so that
//! checkout and backup can run them inside their own transaction.
//!
//! ## Available Repositories
//!
//! - [`MenuRepository`] - Categories and menu items
//! - [`OrderRepository`] - Open per-table orders
//! - [`BillRepository`] - Checkout and bill lookup
//! - [`InventoryRepository`] - Ingredients, stock levels, recipes
//! - [`SalesRepository`] - Sales reports
//! - [`UserRepository`] - Staff accounts and login
//! - [`SettingsRepository`] - Key/value application settings

pub mod bill;
pub mod inventory;
pub mod menu;
pub mod order;
pub mod sales;
pub mod settings;
pub mod user;

pub use bill::{BillRepository, CheckoutReceipt, CheckoutRequest};
pub use inventory::{InventoryRepository, NewIngredient, RecipeEntry, RecipeInput};
pub use menu::{MenuItemChanges, MenuRepository, NewMenuItem};
pub use order::OrderRepository;
pub use sales::{CategoryTotal, DailyTotal, SalesRepository, SalesSummary, TopItem};
pub use settings::SettingsRepository;
pub use user::{Login, UserRepository};
