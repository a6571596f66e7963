//! # Incremental Bill Backup
//!
//! Exports bills created since the last backup, then deletes exactly those
//! bills and records the new high-water mark.
//!
//! ## Protocol
//! ```text
//!   BEGIN + write lock (checkouts wait)
//!     last_backup_at ──────────────► now
//!          (exclusive)        (inclusive)
//!               │ bills in window
//!               ▼
//!     BackupSink::write()  ──► artifact (CSV file)
//!               │
//!     DELETE bills WHERE id IN exported ids   (bill_items cascade)
//!     app_settings.last_backup_at = now
//!   COMMIT ──► Ok(report)
//!             │ error
//!             ▼
//!   ROLLBACK + BackupSink::discard(artifact)
//!   (bills stay, timestamp unchanged, next run exports them again)
//! ```
//!
//! Sales records are not part of the backup; reports survive it.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, error, info};

use crate::error::{DbError, DbResult};
use crate::repository::{bill, settings};
use tiffin_core::{Bill, BillItem};

/// A bill with its line items, as handed to a sink.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupBill {
    pub bill: Bill,
    pub items: Vec<BillItem>,
}

impl BackupBill {
    /// `Masala Dosa x2; Filter Coffee x1`
    pub fn items_summary(&self) -> String {
        self.items
            .iter()
            .map(|i| format!("{} x{}", i.name, i.quantity))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Where a sink put an export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupArtifact {
    pub path: PathBuf,
    pub bill_count: usize,
}

/// Destination for exported bills.
///
/// `write` must leave a complete artifact or return an error; `discard`
/// removes an artifact whose deletion step failed.
pub trait BackupSink: Send + Sync {
    fn write(&self, taken_at: DateTime<Utc>, bills: &[BackupBill]) -> DbResult<BackupArtifact>;

    fn discard(&self, artifact: &BackupArtifact) -> DbResult<()>;
}

/// Outcome of one backup run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackupReport {
    /// Exclusive lower bound; `None` on the first backup.
    pub since: Option<DateTime<Utc>>,
    pub until: DateTime<Utc>,
    pub bills_exported: usize,
    /// `None` when there was nothing to export.
    pub artifact: Option<BackupArtifact>,
}

// =============================================================================
// CSV sink
// =============================================================================

const CSV_HEADERS: [&str; 6] = [
    "Bill ID",
    "Date",
    "Customer Name",
    "Customer Phone",
    "Total Amount",
    "Items",
];

/// Writes `bills_backup_YYYYMMDD_HHMMSS.csv` files into a directory.
#[derive(Debug, Clone)]
pub struct CsvBackupSink {
    dir: PathBuf,
}

impl CsvBackupSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        CsvBackupSink { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Opens a fresh file, adding `_2`, `_3`... if the second is taken.
    fn create_file(&self, taken_at: DateTime<Utc>) -> DbResult<(PathBuf, File)> {
        fs::create_dir_all(&self.dir)?;
        let stem = format!("bills_backup_{}", taken_at.format("%Y%m%d_%H%M%S"));

        for n in 1..=100 {
            let name = if n == 1 {
                format!("{}.csv", stem)
            } else {
                format!("{}_{}.csv", stem, n)
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(DbError::Backup(format!(
            "Too many backup files named {} in {}",
            stem,
            self.dir.display()
        )))
    }
}

fn write_rows(file: File, bills: &[BackupBill]) -> DbResult<()> {
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(CSV_HEADERS)?;

    for entry in bills {
        let bill = &entry.bill;
        writer.write_record([
            bill.bill_number.as_str(),
            &bill.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            bill.customer_name.as_deref().unwrap_or(""),
            bill.customer_phone.as_deref().unwrap_or(""),
            &bill.total().to_decimal_string(),
            &entry.items_summary(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

impl BackupSink for CsvBackupSink {
    fn write(&self, taken_at: DateTime<Utc>, bills: &[BackupBill]) -> DbResult<BackupArtifact> {
        let (path, file) = self.create_file(taken_at)?;

        if let Err(e) = write_rows(file, bills) {
            let _ = fs::remove_file(&path);
            return Err(e);
        }

        debug!(path = %path.display(), bills = bills.len(), "Backup file written");
        Ok(BackupArtifact {
            path,
            bill_count: bills.len(),
        })
    }

    fn discard(&self, artifact: &BackupArtifact) -> DbResult<()> {
        match fs::remove_file(&artifact.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// Service
// =============================================================================

#[derive(Debug, Clone)]
pub struct BackupService {
    pool: SqlitePool,
    reminder_interval: Duration,
}

impl BackupService {
    pub fn new(pool: SqlitePool, reminder_interval: Duration) -> Self {
        BackupService {
            pool,
            reminder_interval,
        }
    }

    pub async fn last_backup_at(&self) -> DbResult<Option<DateTime<Utc>>> {
        let mut conn = self.pool.acquire().await?;
        settings::last_backup_at_in(&mut conn).await
    }

    /// True when no backup was ever recorded or the last one is older than
    /// the reminder interval.
    pub async fn is_due(&self, now: DateTime<Utc>) -> DbResult<bool> {
        Ok(match self.last_backup_at().await? {
            None => true,
            Some(last) => now - last >= self.reminder_interval,
        })
    }

    /// Bills that the next run would export.
    pub async fn pending(&self, now: DateTime<Utc>) -> DbResult<Vec<BackupBill>> {
        let mut conn = self.pool.acquire().await?;
        let since = settings::last_backup_at_in(&mut conn).await?;
        window_in(&mut conn, since, now).await
    }

    /// Exports and deletes bills in `(last_backup_at, now]`.
    ///
    /// The whole run holds SQLite's write lock, so no checkout can commit
    /// between reading the window and advancing the timestamp.
    pub async fn run<S>(&self, now: DateTime<Utc>, sink: &S) -> DbResult<BackupReport>
    where
        S: BackupSink + ?Sized,
    {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE app_settings SET updated_at = updated_at WHERE key = ?1")
            .bind(settings::LAST_BACKUP_AT)
            .execute(&mut *tx)
            .await?;

        let since = settings::last_backup_at_in(&mut tx).await?;
        let bills = window_in(&mut tx, since, now).await?;

        debug!(
            since = ?since,
            until = %now,
            bills = bills.len(),
            "Starting backup"
        );

        if bills.is_empty() {
            finish(tx, now, &[]).await?;
            info!(until = %now, "Backup window empty, timestamp advanced");
            return Ok(BackupReport {
                since,
                until: now,
                bills_exported: 0,
                artifact: None,
            });
        }

        // Dropping `tx` on a sink error rolls back and releases the lock.
        let artifact = sink.write(now, &bills)?;
        let ids: Vec<&str> = bills.iter().map(|b| b.bill.id.as_str()).collect();

        if let Err(e) = finish(tx, now, &ids).await {
            error!(error = %e, path = %artifact.path.display(), "Backup delete failed, discarding export");
            if let Err(discard_err) = sink.discard(&artifact) {
                error!(error = %discard_err, path = %artifact.path.display(), "Could not discard backup file");
            }
            return Err(e);
        }

        info!(
            bills = ids.len(),
            path = %artifact.path.display(),
            until = %now,
            "Backup written"
        );

        Ok(BackupReport {
            since,
            until: now,
            bills_exported: ids.len(),
            artifact: Some(artifact),
        })
    }
}

async fn window_in(
    conn: &mut SqliteConnection,
    since: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> DbResult<Vec<BackupBill>> {
    let bills = bill::list_between_in(conn, since, now).await?;

    let mut window = Vec::with_capacity(bills.len());
    for b in bills {
        let items = bill::items_in(conn, &b.id).await?;
        window.push(BackupBill { bill: b, items });
    }
    Ok(window)
}

/// Deletes exported bills and advances the timestamp, then commits.
async fn finish(
    mut tx: Transaction<'_, Sqlite>,
    now: DateTime<Utc>,
    ids: &[&str],
) -> DbResult<()> {
    for id in ids {
        let result = sqlx::query("DELETE FROM bills WHERE id = ?1")
            .bind(*id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() != 1 {
            return Err(DbError::Backup(format!("Bill {} vanished during backup", id)));
        }
    }

    settings::set_in(&mut tx, settings::LAST_BACKUP_AT, &now.to_rfc3339(), now).await?;

    tx.commit()
        .await
        .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::bill::{CheckoutReceipt, CheckoutRequest};
    use crate::repository::menu::NewMenuItem;
    use crate::{Database, DbConfig};
    use std::sync::Mutex;
    use tiffin_core::payment::Tender;
    use tiffin_core::Money;

    fn cash(customer_number: i64) -> CheckoutRequest {
        CheckoutRequest {
            customer_number,
            tender: Tender::Cash {
                tendered: Money::from_paise(100_000),
            },
            customer_phone: None,
            cashier_id: None,
        }
    }

    async fn db_with_bills(count: i64) -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed_bills(&db, count).await;
        db
    }

    /// Checks out tables `1..=count`; returns the menu item used.
    async fn seed_bills(db: &Database, count: i64) -> String {
        let cat = db.menu().create_category("Tiffin").await.unwrap();
        let dosa = db
            .menu()
            .create_item(NewMenuItem {
                category_id: cat.id,
                name: "Masala Dosa".to_string(),
                description: None,
                price_paise: 9000,
                is_vegetarian: true,
            })
            .await
            .unwrap();

        for table in 1..=count {
            db.orders().add_item(table, &dosa.id, table).await.unwrap();
            db.orders()
                .set_customer_name(table, Some(format!("Guest {}", table)))
                .await
                .unwrap();
            db.bills().checkout(cash(table)).await.unwrap();
        }
        dosa.id
    }

    fn csv_files(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .map(|rd| rd.map(|e| e.unwrap().path()).collect())
            .unwrap_or_default();
        files.sort();
        files
    }

    #[tokio::test]
    async fn test_backup_exports_and_deletes() {
        let db = db_with_bills(2).await;
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvBackupSink::new(dir.path());
        let backup = db.backup(Duration::days(30));
        let now = Utc::now();

        assert!(backup.is_due(now).await.unwrap());
        let report = backup.run(now, &sink).await.unwrap();

        assert_eq!(report.since, None);
        assert_eq!(report.bills_exported, 2);
        assert_eq!(db.bills().count().await.unwrap(), 0);
        assert_eq!(backup.last_backup_at().await.unwrap(), Some(now));
        assert!(!backup.is_due(now).await.unwrap());
        assert!(backup.is_due(now + Duration::days(30)).await.unwrap());

        let files = csv_files(dir.path());
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("bills_backup_") && name.ends_with(".csv"));

        let mut reader = csv::Reader::from_path(&files[0]).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, CSV_HEADERS);
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[1][2], "Guest 2");
        assert_eq!(&rows[1][4], "180.00");
        assert_eq!(&rows[1][5], "Masala Dosa x2");

        // Sales history survives the backup.
        let today = now.date_naive();
        assert_eq!(db.sales().total_between(today, today).await.unwrap().bill_count, 2);
    }

    #[tokio::test]
    async fn test_second_run_only_exports_new_bills() {
        let db = db_with_bills(1).await;
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvBackupSink::new(dir.path());
        let backup = db.backup(Duration::days(30));

        backup.run(Utc::now(), &sink).await.unwrap();
        let empty = backup.run(Utc::now(), &sink).await.unwrap();
        assert_eq!(empty.bills_exported, 0);
        assert!(empty.artifact.is_none());
        assert_eq!(csv_files(dir.path()).len(), 1);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_bills_and_timestamp() {
        let db = db_with_bills(3).await;
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvBackupSink::new(dir.path());
        let backup = db.backup(Duration::days(30));

        sqlx::query(
            "CREATE TRIGGER block_bill_delete BEFORE DELETE ON bills \
             BEGIN SELECT RAISE(ABORT, 'disk full'); END",
        )
        .execute(db.pool())
        .await
        .unwrap();

        assert!(backup.run(Utc::now(), &sink).await.is_err());
        assert_eq!(db.bills().count().await.unwrap(), 3);
        assert_eq!(backup.last_backup_at().await.unwrap(), None);
        assert!(csv_files(dir.path()).is_empty());

        sqlx::query("DROP TRIGGER block_bill_delete")
            .execute(db.pool())
            .await
            .unwrap();

        let report = backup.run(Utc::now(), &sink).await.unwrap();
        assert_eq!(report.bills_exported, 3);
        assert_eq!(db.bills().count().await.unwrap(), 0);
    }

    /// Records what the service asked of it.
    #[derive(Default)]
    struct RecordingSink {
        written: Mutex<Vec<usize>>,
        discarded: Mutex<usize>,
        fail_write: bool,
    }

    impl BackupSink for RecordingSink {
        fn write(&self, _taken_at: DateTime<Utc>, bills: &[BackupBill]) -> DbResult<BackupArtifact> {
            if self.fail_write {
                return Err(DbError::Backup("read-only".to_string()));
            }
            self.written.lock().unwrap().push(bills.len());
            Ok(BackupArtifact {
                path: PathBuf::from("memory"),
                bill_count: bills.len(),
            })
        }

        fn discard(&self, _artifact: &BackupArtifact) -> DbResult<()> {
            *self.discarded.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_sink_failure_deletes_nothing() {
        let db = db_with_bills(2).await;
        let backup = db.backup(Duration::days(30));
        let sink = RecordingSink {
            fail_write: true,
            ..Default::default()
        };

        assert!(matches!(
            backup.run(Utc::now(), &sink).await,
            Err(DbError::Backup(_))
        ));
        assert_eq!(db.bills().count().await.unwrap(), 2);
        assert_eq!(backup.last_backup_at().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_window_upper_bound_is_inclusive_of_now_only() {
        let db = db_with_bills(1).await;
        let backup = db.backup(Duration::days(30));
        let sink = RecordingSink::default();

        let before_any = Utc::now() - Duration::hours(1);
        let report = backup.run(before_any, &sink).await.unwrap();
        assert_eq!(report.bills_exported, 0);
        assert_eq!(db.bills().count().await.unwrap(), 1);

        backup.run(Utc::now(), &sink).await.unwrap();
        assert_eq!(*sink.written.lock().unwrap(), vec![1]);
        assert_eq!(*sink.discarded.lock().unwrap(), 0);
    }

    /// Starts a checkout for another table while the export is written.
    struct CheckoutDuringWrite {
        db: Database,
        customer_number: i64,
        checkout: Mutex<Option<tokio::task::JoinHandle<DbResult<CheckoutReceipt>>>>,
    }

    impl BackupSink for CheckoutDuringWrite {
        fn write(&self, _taken_at: DateTime<Utc>, bills: &[BackupBill]) -> DbResult<BackupArtifact> {
            let db = self.db.clone();
            let request = cash(self.customer_number);
            let handle = tokio::spawn(async move { db.bills().checkout(request).await });
            *self.checkout.lock().unwrap() = Some(handle);
            std::thread::sleep(std::time::Duration::from_millis(200));

            Ok(BackupArtifact {
                path: PathBuf::from("memory"),
                bill_count: bills.len(),
            })
        }

        fn discard(&self, _artifact: &BackupArtifact) -> DbResult<()> {
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_checkout_during_export_lands_in_next_backup() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("tiffin.db")))
            .await
            .unwrap();
        let dosa = seed_bills(&db, 2).await;
        db.orders().add_item(9, &dosa, 1).await.unwrap();

        let backup = db.backup(Duration::days(30));
        let sink = CheckoutDuringWrite {
            db: db.clone(),
            customer_number: 9,
            checkout: Mutex::new(None),
        };

        let first = backup.run(Utc::now(), &sink).await.unwrap();
        assert_eq!(first.bills_exported, 2);

        let handle = sink.checkout.lock().unwrap().take().unwrap();
        let receipt = handle.await.unwrap().unwrap();
        assert!(receipt.bill.created_at > first.until);
        assert_eq!(db.bills().count().await.unwrap(), 1);

        let second = backup.run(Utc::now(), &RecordingSink::default()).await.unwrap();
        assert_eq!(second.bills_exported, 1);
        assert_eq!(db.bills().count().await.unwrap(), 0);
    }
}
