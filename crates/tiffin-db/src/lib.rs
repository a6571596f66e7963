//! # tiffin-db: Database Layer for Tiffin POS
//!
//! SQLite persistence for the restaurant: menu, open orders, bills,
//! inventory, users, sales history and the incremental bill backup.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tiffin POS Data Flow                             │
//! │                                                                         │
//! │  tiffin CLI (checkout 4 --cash 500)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tiffin-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │  menu, order  │    │  (embedded)  │  │   │
//! │  │   │               │◄───│  bill, stock  │    │ 001_initial  │  │   │
//! │  │   │ SqlitePool    │    │  user, sales  │    │  _schema.sql │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │            ▲                                                    │   │
//! │  │            │           ┌───────────────┐                        │   │
//! │  │            └───────────│ BackupService │──► bills_backup_*.csv  │   │
//! │  │                        └───────────────┘                        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │   SQLite Database (WAL)   <data dir>/tiffin.db                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//! - [`backup`] - Export-then-delete bill backup
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tiffin_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("tiffin.db")).await?;
//! let dosa = db.menu().search_items("dosa", 5).await?;
//! db.orders().add_item(4, &dosa[0].id, 2).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod backup;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use backup::{BackupArtifact, BackupBill, BackupReport, BackupService, BackupSink, CsvBackupSink};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::{
    BillRepository, CheckoutReceipt, CheckoutRequest, InventoryRepository, MenuRepository,
    OrderRepository, SalesRepository, SettingsRepository, UserRepository,
};
