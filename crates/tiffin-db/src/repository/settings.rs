//! # Settings Repository
//!
//! Key/value rows in `app_settings`: the last backup timestamp and the
//! daily bill number sequence.
//!
//! The `*_in` functions take a connection so they can join a caller's
//! transaction (`&mut *tx`).

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

/// RFC 3339 time the last successful backup covered up to.
pub const LAST_BACKUP_AT: &str = "last_backup_at";

/// Last issued bill number, `YYYYMMDD-NNNN`.
pub const LAST_BILL_NUMBER: &str = "last_bill_number";

#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    pub async fn get(&self, key: &str) -> DbResult<Option<String>> {
        let mut conn = self.pool.acquire().await?;
        get_in(&mut conn, key).await
    }

    pub async fn set(&self, key: &str, value: &str) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        set_in(&mut conn, key, value, Utc::now()).await
    }

    /// `None` until the first backup has been recorded.
    pub async fn last_backup_at(&self) -> DbResult<Option<DateTime<Utc>>> {
        let mut conn = self.pool.acquire().await?;
        last_backup_at_in(&mut conn).await
    }
}

pub(crate) async fn get_in(conn: &mut SqliteConnection, key: &str) -> DbResult<Option<String>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM app_settings WHERE key = ?1")
        .bind(key)
        .fetch_optional(conn)
        .await?;

    Ok(value)
}

pub(crate) async fn set_in(
    conn: &mut SqliteConnection,
    key: &str,
    value: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    debug!(key = %key, "Writing setting");

    sqlx::query(
        r#"
        INSERT INTO app_settings (key, value, updated_at)
        VALUES (?1, ?2, ?3)
        ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(value)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(())
}

pub(crate) async fn last_backup_at_in(
    conn: &mut SqliteConnection,
) -> DbResult<Option<DateTime<Utc>>> {
    let Some(raw) = get_in(conn, LAST_BACKUP_AT).await? else {
        return Ok(None);
    };

    DateTime::parse_from_rfc3339(&raw)
        .map(|t| Some(t.with_timezone(&Utc)))
        .map_err(|e| DbError::Internal(format!("Corrupt {} setting '{}': {}", LAST_BACKUP_AT, raw, e)))
}

/// Issues the next bill number for `now`'s date. The sequence restarts daily.
pub(crate) async fn next_bill_number_in(
    conn: &mut SqliteConnection,
    now: DateTime<Utc>,
) -> DbResult<String> {
    let today = now.format("%Y%m%d").to_string();

    let seq = match get_in(conn, LAST_BILL_NUMBER).await? {
        Some(last) => match last.split_once('-') {
            Some((date, n)) if date == today => n
                .parse::<u32>()
                .map_err(|e| DbError::Internal(format!("Corrupt bill number '{}': {}", last, e)))?
                + 1,
            _ => 1,
        },
        None => 1,
    };

    let number = format!("{}-{:04}", today, seq);
    set_in(conn, LAST_BILL_NUMBER, &number, now).await?;
    Ok(number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::{Duration, TimeZone};

    #[tokio::test]
    async fn test_get_set() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let settings = db.settings();

        assert_eq!(settings.get("restaurant").await.unwrap(), None);
        settings.set("restaurant", "Annapurna").await.unwrap();
        settings.set("restaurant", "Annapurna Tiffins").await.unwrap();
        assert_eq!(
            settings.get("restaurant").await.unwrap().as_deref(),
            Some("Annapurna Tiffins")
        );
        assert_eq!(settings.last_backup_at().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_bill_numbers_restart_daily() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let day = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap();

        assert_eq!(next_bill_number_in(&mut conn, day).await.unwrap(), "20260314-0001");
        assert_eq!(next_bill_number_in(&mut conn, day).await.unwrap(), "20260314-0002");
        assert_eq!(
            next_bill_number_in(&mut conn, day + Duration::days(1)).await.unwrap(),
            "20260315-0001"
        );
    }
}
