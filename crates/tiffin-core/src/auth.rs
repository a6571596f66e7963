//! # Roles, Permissions & Sessions
//!
//! Staff accounts, what each role may do, and signed session tokens.
//!
//! ## Permission Table
//! ```text
//! ┌──────────────────────┬─────────┬─────────┬─────────┐
//! │ Permission           │  Staff  │ Manager │  Admin  │
//! ├──────────────────────┼─────────┼─────────┼─────────┤
//! │ TakeOrders           │    ✓    │    ✓    │    ✓    │
//! │ Checkout             │    ✓    │    ✓    │    ✓    │
//! │ ViewMenu             │    ✓    │    ✓    │    ✓    │
//! │ ManageMenu           │         │    ✓    │    ✓    │
//! │ ManageInventory      │         │    ✓    │    ✓    │
//! │ ViewReports          │         │    ✓    │    ✓    │
//! │ RunBackup            │         │    ✓    │    ✓    │
//! │ ManageUsers          │         │         │    ✓    │
//! └──────────────────────┴─────────┴─────────┴─────────┘
//! ```
//!
//! ## Login Flow
//! ```text
//! username + password
//!        │
//!        ▼  verify_password()  (argon2, PHC string from users table)
//!  SessionManager::issue()  ──►  HS256 token { sub, username, role, iat, exp, jti }
//!        │
//!        ▼  stored by the operator (TIFFIN_TOKEN)
//!  SessionManager::validate() ──► Session ──► Session::require(Permission)
//! ```

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use std::sync::OnceLock;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};

// =============================================================================
// Roles & Permissions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Staff,
    Manager,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Staff, Role::Manager, Role::Admin];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Staff => "staff",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }

    /// Parses a role name, case-insensitively.
    pub fn parse(input: &str) -> Result<Role, ValidationError> {
        let wanted = input.trim().to_ascii_lowercase();
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == wanted)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "role".to_string(),
                allowed: Role::ALL.iter().map(|r| r.as_str().to_string()).collect(),
            })
    }

    /// Least privileged role that holds the permission.
    const fn minimum_for(permission: Permission) -> Role {
        match permission {
            Permission::TakeOrders | Permission::Checkout | Permission::ViewMenu => Role::Staff,
            Permission::ManageMenu
            | Permission::ManageInventory
            | Permission::ViewReports
            | Permission::RunBackup => Role::Manager,
            Permission::ManageUsers => Role::Admin,
        }
    }

    /// Roles are nested: every role holds the permissions of the ones below it.
    pub fn can(&self, permission: Permission) -> bool {
        *self >= Role::minimum_for(permission)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    TakeOrders,
    Checkout,
    ViewMenu,
    ManageMenu,
    ManageInventory,
    ViewReports,
    RunBackup,
    ManageUsers,
}

impl Permission {
    pub const fn describe(&self) -> &'static str {
        match self {
            Permission::TakeOrders => "take orders",
            Permission::Checkout => "check out orders",
            Permission::ViewMenu => "view the menu",
            Permission::ManageMenu => "manage the menu",
            Permission::ManageInventory => "manage inventory",
            Permission::ViewReports => "view reports",
            Permission::RunBackup => "run backups",
            Permission::ManageUsers => "manage users",
        }
    }
}

/// Fails with `PermissionDenied` unless `role` holds `permission`.
pub fn require(role: Role, permission: Permission) -> CoreResult<()> {
    if role.can(permission) {
        Ok(())
    } else {
        Err(CoreError::PermissionDenied {
            role: role.to_string(),
            permission: permission.describe().to_string(),
        })
    }
}

// =============================================================================
// Users
// =============================================================================

/// A staff account. `password_hash` is an argon2 PHC string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Hashes a password for storage.
pub fn hash_password(password: &str) -> CoreResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| CoreError::Credential(format!("Failed to hash password: {}", e)))?;

    Ok(hash.to_string())
}

/// Verifies a password against a stored hash. Malformed hashes never verify.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Burns the same argon2 work as a real check, for logins naming an
/// unknown account. Always fails.
pub fn verify_unknown_account(password: &str) -> bool {
    static DUMMY_HASH: OnceLock<String> = OnceLock::new();
    let hash = DUMMY_HASH.get_or_init(|| hash_password("no-such-account").unwrap_or_default());
    let _ = verify_password(password, hash);
    false
}

// =============================================================================
// Sessions
// =============================================================================

/// JWT claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id
    pub sub: String,
    pub username: String,
    pub role: Role,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    /// Token id
    pub jti: String,
}

/// A validated, logged-in user.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: String,
    pub username: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn require(&self, permission: Permission) -> CoreResult<()> {
        require(self.role, permission)
    }

    /// Checks the session against the account as it is now. A missing or
    /// inactive account ends the session; the stored role replaces the one
    /// signed into the token.
    pub fn confirm(self, account: Option<&User>) -> CoreResult<Session> {
        match account {
            Some(user) if user.id == self.user_id && user.is_active => Ok(Session {
                username: user.username.clone(),
                role: user.role,
                ..self
            }),
            Some(_) => Err(CoreError::InvalidSession("account is deactivated".to_string())),
            None => Err(CoreError::InvalidSession("account no longer exists".to_string())),
        }
    }
}

/// Issues and validates HS256 session tokens.
pub struct SessionManager {
    secret: String,
    lifetime: Duration,
}

impl SessionManager {
    pub fn new(secret: impl Into<String>, lifetime: Duration) -> Self {
        SessionManager {
            secret: secret.into(),
            lifetime,
        }
    }

    /// Signs a token for `user`, valid from `now` for the configured lifetime.
    pub fn issue(&self, user: &User, now: DateTime<Utc>) -> CoreResult<String> {
        let claims = SessionClaims {
            sub: user.id.clone(),
            username: user.username.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| CoreError::Credential(format!("Failed to sign session: {}", e)))
    }

    /// Checks signature and expiry and returns the session.
    pub fn validate(&self, token: &str) -> CoreResult<Session> {
        let data = decode::<SessionClaims>(
            token.trim(),
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| CoreError::InvalidSession(e.to_string()))?;

        let claims = data.claims;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| CoreError::InvalidSession("bad expiry".to_string()))?;

        Ok(Session {
            user_id: claims.sub,
            username: claims.username,
            role: claims.role,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        User {
            id: "u-1".to_string(),
            username: "meera".to_string(),
            password_hash: String::new(),
            role,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_role_hierarchy() {
        assert!(Role::Staff.can(Permission::Checkout));
        assert!(!Role::Staff.can(Permission::ManageMenu));
        assert!(Role::Manager.can(Permission::RunBackup));
        assert!(!Role::Manager.can(Permission::ManageUsers));
        assert!(Role::Admin.can(Permission::ManageUsers));

        let err = require(Role::Staff, Permission::ViewReports).unwrap_err();
        assert_eq!(err.to_string(), "staff is not allowed to view reports");
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("MANAGER").unwrap(), Role::Manager);
        assert!(Role::parse("owner").is_err());
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("chai-time").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(!hash.contains("chai-time"));
        assert!(verify_password("chai-time", &hash));
        assert!(!verify_password("coffee-time", &hash));
        assert!(!verify_password("chai-time", "not-a-hash"));
    }

    #[test]
    fn test_unknown_account_never_verifies() {
        assert!(!verify_unknown_account("no-such-account"));
        assert!(!verify_unknown_account("anything"));
    }

    #[test]
    fn test_confirm_uses_current_account() {
        let manager = SessionManager::new("test-secret", Duration::hours(12));
        let mut account = user(Role::Admin);
        let token = manager.issue(&account, Utc::now()).unwrap();
        let session = manager.validate(&token).unwrap();

        account.role = Role::Staff;
        let demoted = session.clone().confirm(Some(&account)).unwrap();
        assert_eq!(demoted.role, Role::Staff);
        assert!(demoted.require(Permission::ManageUsers).is_err());

        account.is_active = false;
        assert!(matches!(
            session.clone().confirm(Some(&account)),
            Err(CoreError::InvalidSession(_))
        ));
        assert!(matches!(session.confirm(None), Err(CoreError::InvalidSession(_))));
    }

    #[test]
    fn test_session_roundtrip() {
        let manager = SessionManager::new("test-secret", Duration::hours(12));
        let token = manager.issue(&user(Role::Manager), Utc::now()).unwrap();

        let session = manager.validate(&token).unwrap();
        assert_eq!(session.user_id, "u-1");
        assert_eq!(session.username, "meera");
        assert_eq!(session.role, Role::Manager);
        assert!(session.require(Permission::ManageInventory).is_ok());
        assert!(session.require(Permission::ManageUsers).is_err());
    }

    #[test]
    fn test_expired_session_rejected() {
        let manager = SessionManager::new("test-secret", Duration::hours(12));
        let token = manager
            .issue(&user(Role::Staff), Utc::now() - Duration::hours(13))
            .unwrap();

        assert!(matches!(
            manager.validate(&token),
            Err(CoreError::InvalidSession(_))
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = SessionManager::new("one", Duration::hours(1))
            .issue(&user(Role::Admin), Utc::now())
            .unwrap();

        assert!(SessionManager::new("two", Duration::hours(1))
            .validate(&token)
            .is_err());
    }
}
