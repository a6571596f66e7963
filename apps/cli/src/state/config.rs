//! # Configuration
//!
//! Application configuration read once at startup from `TIFFIN_*`
//! environment variables. There is no config file.
//!
//! | Variable                      | Default                          |
//! |-------------------------------|----------------------------------|
//! | `TIFFIN_DB_PATH`              | `<data dir>/tiffin.db`           |
//! | `TIFFIN_BACKUP_DIR`           | `<data dir>/backups`             |
//! | `TIFFIN_RESTAURANT_NAME`      | `Tiffin POS`                     |
//! | `TIFFIN_UPI_VPA`              | unset (UPI links disabled)       |
//! | `TIFFIN_UPI_PAYEE`            | restaurant name                  |
//! | `TIFFIN_SESSION_SECRET`       | generated, stored in the db      |
//! | `TIFFIN_SESSION_HOURS`        | `12`                             |
//! | `TIFFIN_BACKUP_REMINDER_DAYS` | `30`                             |
//! | `TIFFIN_TOKEN`                | unset (only `init`/`login` work) |
//!
//! `<data dir>` is the platform data directory, e.g.
//! `~/.local/share/tiffin-pos` on Linux.

use std::path::PathBuf;

use chrono::Duration;
use directories::ProjectDirs;
use thiserror::Error;
use tiffin_core::upi::UpiPayee;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a positive whole number, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} is invalid: {reason}")]
    InvalidValue { var: &'static str, reason: String },

    #[error("Could not determine the app data directory; set TIFFIN_DB_PATH and TIFFIN_BACKUP_DIR")]
    NoDataDir,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub backup_dir: PathBuf,
    /// Printed on receipts and used as the default UPI payee name.
    pub restaurant_name: String,
    /// `None` when `TIFFIN_UPI_VPA` is unset.
    pub upi_payee: Option<UpiPayee>,
    /// `None` means use the secret stored in the database.
    pub session_secret: Option<String>,
    pub session_lifetime: Duration,
    pub backup_reminder: Duration,
    pub token: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the config from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let db_path = get("TIFFIN_DB_PATH").map(PathBuf::from);
        let backup_dir = get("TIFFIN_BACKUP_DIR").map(PathBuf::from);
        let (db_path, backup_dir) = match (db_path, backup_dir) {
            (Some(db), Some(backups)) => (db, backups),
            (db, backups) => {
                let data_dir = data_dir()?;
                (
                    db.unwrap_or_else(|| data_dir.join("tiffin.db")),
                    backups.unwrap_or_else(|| data_dir.join("backups")),
                )
            }
        };

        let restaurant_name =
            get("TIFFIN_RESTAURANT_NAME").unwrap_or_else(|| "Tiffin POS".to_string());

        let upi_payee = match get("TIFFIN_UPI_VPA") {
            Some(vpa) => {
                let payee = get("TIFFIN_UPI_PAYEE").unwrap_or_else(|| restaurant_name.clone());
                Some(UpiPayee::new(&vpa, &payee).map_err(|e| ConfigError::InvalidValue {
                    var: "TIFFIN_UPI_VPA",
                    reason: e.to_string(),
                })?)
            }
            None => None,
        };

        let session_hours = positive_number("TIFFIN_SESSION_HOURS", get("TIFFIN_SESSION_HOURS"), 12)?;
        let reminder_days = positive_number(
            "TIFFIN_BACKUP_REMINDER_DAYS",
            get("TIFFIN_BACKUP_REMINDER_DAYS"),
            30,
        )?;

        Ok(AppConfig {
            db_path,
            backup_dir,
            restaurant_name,
            upi_payee,
            session_secret: get("TIFFIN_SESSION_SECRET"),
            session_lifetime: Duration::hours(session_hours),
            backup_reminder: Duration::days(reminder_days),
            token: get("TIFFIN_TOKEN"),
        })
    }
}

fn positive_number(var: &'static str, value: Option<String>, default: i64) -> Result<i64, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.parse::<i64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidNumber { var, value }),
    }
}

/// Platform data directory, created if missing.
///
/// - **Linux**: `~/.local/share/tiffin-pos`
/// - **macOS**: `~/Library/Application Support/com.tiffin.pos`
/// - **Windows**: `%APPDATA%\tiffin\pos\data`
fn data_dir() -> Result<PathBuf, ConfigError> {
    let dirs = ProjectDirs::from("com", "tiffin", "pos").ok_or(ConfigError::NoDataDir)?;
    let dir = dirs.data_dir().to_path_buf();
    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::InvalidValue {
        var: "data directory",
        reason: format!("{}: {}", dir.display(), e),
    })?;
    Ok(dir)
}
