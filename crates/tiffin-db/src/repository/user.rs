//! Staff accounts and login.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tiffin_core::auth::{hash_password, verify_password, verify_unknown_account};
use tiffin_core::validation::{validate_password, validate_username};
use tiffin_core::{CoreError, Role, Session, SessionManager, User, ValidationError};

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct Login {
    pub user: User,
    pub token: String,
}

const USER_COLUMNS: &str = "id, username, password_hash, role, is_active, created_at";

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    pub async fn create_user(&self, username: &str, password: &str, role: Role) -> DbResult<User> {
        let username = validate_username(username)?;
        validate_password(password)?;

        if self.find_by_username(&username).await?.is_some() {
            return Err(DbError::duplicate("username", username));
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            username,
            password_hash: hash_password(password)?,
            role,
            is_active: true,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO users (id, username, password_hash, role, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.is_active)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        info!(username = %user.username, role = %user.role, "User created");
        Ok(user)
    }

    /// Verifies credentials and signs a session token.
    ///
    /// Unknown user, wrong password and deactivated account all return
    /// `InvalidCredentials`.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
        sessions: &SessionManager,
    ) -> DbResult<Login> {
        let user = match self.find_by_username(username.trim()).await? {
            Some(u) => Some(u).filter(|u| verify_password(password, &u.password_hash)),
            None => {
                verify_unknown_account(password);
                None
            }
        };

        let user = match user {
            Some(u) if u.is_active => u,
            Some(u) => {
                warn!(username = %u.username, "Login refused for inactive user");
                return Err(CoreError::InvalidCredentials.into());
            }
            None => {
                debug!(username = %username.trim(), "Login failed");
                return Err(CoreError::InvalidCredentials.into());
            }
        };

        let token = sessions.issue(&user, Utc::now())?;
        info!(username = %user.username, role = %user.role, "Logged in");
        Ok(Login { user, token })
    }

    /// Re-reads the account behind a validated token. Deactivated or
    /// deleted accounts are refused and the role comes from the table.
    pub async fn resume_session(&self, session: Session) -> DbResult<Session> {
        let account = self.get(&session.user_id).await?;
        let username = session.username.clone();
        let session = session.confirm(account.as_ref()).map_err(|e| {
            warn!(username = %username, "Session refused: {}", e);
            e
        })?;
        Ok(session)
    }

    /// Creates the first admin if there are no users yet.
    ///
    /// Returns `None` when users already exist.
    pub async fn ensure_admin(&self, username: &str, password: &str) -> DbResult<Option<User>> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        if count > 0 {
            return Ok(None);
        }

        let admin = self.create_user(username, password, Role::Admin).await?;
        Ok(Some(admin))
    }

    /// Deactivates an account. The last active admin cannot be deactivated.
    pub async fn deactivate_user(&self, id: &str) -> DbResult<User> {
        let user = self
            .get(id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))?;

        if user.role == Role::Admin && user.is_active {
            self.keep_an_admin("deactivate").await?;
        }

        sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        info!(username = %user.username, "User deactivated");
        Ok(User {
            is_active: false,
            ..user
        })
    }

    /// Changes an account's role. The last active admin keeps theirs.
    pub async fn set_role(&self, id: &str, role: Role) -> DbResult<User> {
        let user = self
            .get(id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))?;

        if user.role == Role::Admin && role != Role::Admin && user.is_active {
            self.keep_an_admin("demote").await?;
        }

        sqlx::query("UPDATE users SET role = ?2 WHERE id = ?1")
            .bind(id)
            .bind(role)
            .execute(&self.pool)
            .await?;

        info!(username = %user.username, from = %user.role, to = %role, "Role changed");
        Ok(User { role, ..user })
    }

    /// Fails when only one active admin is left.
    async fn keep_an_admin(&self, action: &str) -> DbResult<()> {
        let admins: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE role = 'admin' AND is_active = 1",
        )
        .fetch_one(&self.pool)
        .await?;
        if admins <= 1 {
            return Err(ValidationError::InvalidFormat {
                field: "user".to_string(),
                reason: format!("cannot {} the last active admin", action),
            }
            .into());
        }
        Ok(())
    }

    pub async fn change_password(&self, id: &str, new_password: &str) -> DbResult<()> {
        validate_password(new_password)?;
        let hash = hash_password(new_password)?;

        let result = sqlx::query("UPDATE users SET password_hash = ?2 WHERE id = ?1")
            .bind(id)
            .bind(hash)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        info!(user_id = %id, "Password changed");
        Ok(())
    }

    pub async fn list_users(&self) -> DbResult<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM users ORDER BY username COLLATE NOCASE",
            USER_COLUMNS
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn find_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE username = ?1 COLLATE NOCASE",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::Duration;
    use tiffin_core::Permission;

    fn sessions() -> SessionManager {
        SessionManager::new("test-secret", Duration::hours(1))
    }

    #[tokio::test]
    async fn test_create_and_login() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let user = db
            .users()
            .create_user("meena", "chai-time", Role::Staff)
            .await
            .unwrap();
        assert_ne!(user.password_hash, "chai-time");

        let login = db
            .users()
            .authenticate("MEENA", "chai-time", &sessions())
            .await
            .unwrap();
        assert_eq!(login.user.id, user.id);

        let session = sessions().validate(&login.token).unwrap();
        assert_eq!(session.role, Role::Staff);
        assert!(session.require(Permission::Checkout).is_ok());
        assert!(session.require(Permission::ManageMenu).is_err());
    }

    #[tokio::test]
    async fn test_bad_credentials_and_inactive_users() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.users().ensure_admin("owner", "owner-pass").await.unwrap();
        let staff = db
            .users()
            .create_user("ravi", "secret1", Role::Staff)
            .await
            .unwrap();

        assert!(matches!(
            db.users().authenticate("ravi", "wrong", &sessions()).await,
            Err(DbError::Core(CoreError::InvalidCredentials))
        ));
        assert!(matches!(
            db.users().authenticate("nobody", "secret1", &sessions()).await,
            Err(DbError::Core(CoreError::InvalidCredentials))
        ));

        db.users().deactivate_user(&staff.id).await.unwrap();
        assert!(matches!(
            db.users().authenticate("ravi", "secret1", &sessions()).await,
            Err(DbError::Core(CoreError::InvalidCredentials))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_and_invalid_users() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.users().create_user("asha", "secret1", Role::Manager).await.unwrap();

        let dup = db.users().create_user("Asha", "secret2", Role::Staff).await;
        assert!(matches!(
            dup,
            Err(DbError::Core(CoreError::Validation(ValidationError::Duplicate { .. })))
        ));
        assert!(db.users().create_user("x", "secret1", Role::Staff).await.is_err());
        assert!(db.users().create_user("valid", "123", Role::Staff).await.is_err());
    }

    #[tokio::test]
    async fn test_ensure_admin_only_once() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let first = db.users().ensure_admin("owner", "owner-pass").await.unwrap();
        assert_eq!(first.map(|u| u.role), Some(Role::Admin));

        let second = db.users().ensure_admin("other", "other-pass").await.unwrap();
        assert!(second.is_none());
        assert_eq!(db.users().list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_last_admin_stays_active() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let admin = db
            .users()
            .ensure_admin("owner", "owner-pass")
            .await
            .unwrap()
            .unwrap();
        assert!(db.users().deactivate_user(&admin.id).await.is_err());
        assert!(db.users().set_role(&admin.id, Role::Manager).await.is_err());
        assert_eq!(
            db.users().set_role(&admin.id, Role::Admin).await.unwrap().role,
            Role::Admin
        );
    }

    #[tokio::test]
    async fn test_resume_session_follows_account() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.users().ensure_admin("owner", "owner-pass").await.unwrap();
        let second = db
            .users()
            .create_user("deputy", "deputy-pass", Role::Admin)
            .await
            .unwrap();
        let login = db
            .users()
            .authenticate("deputy", "deputy-pass", &sessions())
            .await
            .unwrap();
        let session = sessions().validate(&login.token).unwrap();

        let resumed = db.users().resume_session(session.clone()).await.unwrap();
        assert_eq!(resumed.role, Role::Admin);

        db.users().set_role(&second.id, Role::Staff).await.unwrap();
        let demoted = db.users().resume_session(session.clone()).await.unwrap();
        assert_eq!(demoted.role, Role::Staff);

        db.users().deactivate_user(&second.id).await.unwrap();
        assert!(matches!(
            db.users().resume_session(session).await,
            Err(DbError::Core(CoreError::InvalidSession(_)))
        ));
    }

    #[tokio::test]
    async fn test_change_password() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let user = db
            .users()
            .create_user("kiran", "old-pass", Role::Staff)
            .await
            .unwrap();

        db.users().change_password(&user.id, "new-pass").await.unwrap();
        assert!(db.users().authenticate("kiran", "old-pass", &sessions()).await.is_err());
        assert!(db.users().authenticate("kiran", "new-pass", &sessions()).await.is_ok());
        assert!(db.users().change_password("missing", "new-pass").await.is_err());
    }
}
