//! # Application State
//!
//! Everything a command needs: the open database, the configuration, and
//! the session manager used to check `TIFFIN_TOKEN`.
//!
//! ```text
//! ┌──────────────────┐ ┌──────────────────┐ ┌──────────────────────┐
//! │    Database      │ │    AppConfig     │ │   SessionManager     │
//! │  • pool          │ │  • paths         │ │  • HS256 secret      │
//! │  • repositories  │ │  • UPI payee     │ │  • token lifetime    │
//! └──────────────────┘ └──────────────────┘ └──────────────────────┘
//! ```

mod config;

pub use config::{AppConfig, ConfigError};

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{CliError, CliResult};
use tiffin_core::{Permission, Session, SessionManager};
use tiffin_db::{BackupService, Database, DbConfig};

/// `app_settings` key holding the generated session secret.
const SESSION_SECRET_KEY: &str = "session_secret";

pub struct AppState {
    pub db: Database,
    pub config: AppConfig,
    pub sessions: SessionManager,
}

impl AppState {
    /// Opens the database (running migrations) and sets up sessions.
    pub async fn open(config: AppConfig) -> CliResult<Self> {
        debug!(db_path = %config.db_path.display(), "Opening database");
        let db = Database::new(DbConfig::new(&config.db_path)).await?;
        Self::with_database(db, config).await
    }

    pub async fn with_database(db: Database, config: AppConfig) -> CliResult<Self> {
        let secret = match &config.session_secret {
            Some(secret) => secret.clone(),
            None => stored_secret(&db).await?,
        };
        let sessions = SessionManager::new(secret, config.session_lifetime);

        Ok(AppState {
            db,
            config,
            sessions,
        })
    }

    /// The logged-in session, from `TIFFIN_TOKEN`. The account must still
    /// be active, and its current role applies.
    pub async fn session(&self) -> CliResult<Session> {
        let token = self.config.token.as_deref().ok_or_else(|| {
            CliError::unauthenticated("Not logged in: run `tiffin login <username>` and export TIFFIN_TOKEN")
        })?;
        let session = self.sessions.validate(token)?;
        let session = self.db.users().resume_session(session).await?;
        Ok(session)
    }

    /// The logged-in session, if its role holds `permission`.
    pub async fn require(&self, permission: Permission) -> CliResult<Session> {
        let session = self.session().await?;
        session.require(permission)?;
        debug!(user = %session.username, role = %session.role, ?permission, "Permission granted");
        Ok(session)
    }

    pub fn backup(&self) -> BackupService {
        self.db.backup(self.config.backup_reminder)
    }
}

/// Reads the per-database session secret, generating it on first use.
async fn stored_secret(db: &Database) -> CliResult<String> {
    if let Some(secret) = db.settings().get(SESSION_SECRET_KEY).await? {
        return Ok(secret);
    }

    let secret = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
    db.settings().set(SESSION_SECRET_KEY, &secret).await?;
    info!(at = %Utc::now(), "Generated session secret");
    Ok(secret)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use chrono::Duration;
    use std::path::PathBuf;
    use tiffin_core::Role;

    pub fn config() -> AppConfig {
        AppConfig {
            db_path: PathBuf::from(":memory:"),
            backup_dir: std::env::temp_dir().join("tiffin-test-backups"),
            restaurant_name: "Annapurna".to_string(),
            upi_payee: None,
            session_secret: Some("test-secret".to_string()),
            session_lifetime: Duration::hours(1),
            backup_reminder: Duration::days(30),
            token: None,
        }
    }

    /// In-memory state logged in as a fresh user with `role`.
    pub async fn state_as(role: Role) -> AppState {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut state = AppState::with_database(db, config()).await.unwrap();
        let name = format!("{}_user", role);
        state
            .db
            .users()
            .create_user(&name, "password", role)
            .await
            .unwrap();
        let login = state
            .db
            .users()
            .authenticate(&name, "password", &state.sessions)
            .await
            .unwrap();
        state.config.token = Some(login.token);
        state
    }
}
