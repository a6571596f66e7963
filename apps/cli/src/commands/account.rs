//! Account commands: first-run setup, login and user management.

use std::io::Write;

use clap::{Args, Subcommand};
use serde::Serialize;
use serde_json::json;

use super::Output;
use crate::error::{CliError, CliResult};
use crate::state::AppState;
use tiffin_core::{Permission, Role, User};

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Username for the first admin account
    #[arg(long, default_value = "admin")]
    pub username: String,

    #[arg(long)]
    pub password: String,
}

#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// List all accounts
    List,

    /// Create an account
    Add {
        username: String,

        #[arg(long, value_parser = parse_role, default_value = "staff")]
        role: Role,

        #[arg(long)]
        password: String,
    },

    /// Deactivate an account so it can no longer log in
    Deactivate { username: String },

    /// Change an account's role
    Role {
        username: String,

        #[arg(value_parser = parse_role)]
        role: Role,
    },

    /// Change a password (your own, or anyone's as admin)
    Passwd {
        /// Defaults to the logged-in user
        username: Option<String>,

        #[arg(long)]
        password: String,
    },
}

fn parse_role(input: &str) -> Result<Role, String> {
    Role::parse(input).map_err(|e| e.to_string())
}

#[derive(Serialize)]
struct UserRow<'a> {
    username: &'a str,
    role: Role,
    is_active: bool,
}

impl<'a> From<&'a User> for UserRow<'a> {
    fn from(user: &'a User) -> Self {
        UserRow {
            username: &user.username,
            role: user.role,
            is_active: user.is_active,
        }
    }
}

/// Creates the first admin. Only works on a database without users.
pub async fn init(state: &AppState, args: InitArgs, out: &mut Output<'_>) -> CliResult<()> {
    match state.db.users().ensure_admin(&args.username, &args.password).await? {
        Some(admin) => {
            if out.is_json() {
                out.json(&UserRow::from(&admin))?;
            } else {
                writeln!(out, "Database ready at {}", state.config.db_path.display())?;
                writeln!(out, "Created admin '{}'. Next: tiffin login {}", admin.username, admin.username)?;
            }
            Ok(())
        }
        None => Err(CliError::validation(
            "Users already exist; log in as an admin and use `tiffin user add`",
        )),
    }
}

pub async fn login(
    state: &AppState,
    username: &str,
    password: &str,
    out: &mut Output<'_>,
) -> CliResult<()> {
    let login = state
        .db
        .users()
        .authenticate(username, password, &state.sessions)
        .await?;
    let session = state.sessions.validate(&login.token)?;

    if out.is_json() {
        out.json(&json!({
            "username": login.user.username,
            "role": login.user.role,
            "expires_at": session.expires_at,
            "token": login.token,
        }))?;
    } else {
        writeln!(
            out,
            "Logged in as {} ({}), valid until {}",
            login.user.username,
            login.user.role,
            session.expires_at.format("%Y-%m-%d %H:%M UTC")
        )?;
        writeln!(out, "export TIFFIN_TOKEN={}", login.token)?;
    }
    Ok(())
}

pub async fn whoami(state: &AppState, out: &mut Output<'_>) -> CliResult<()> {
    let session = state.session().await?;
    if out.is_json() {
        out.json(&json!({
            "username": session.username,
            "role": session.role,
            "expires_at": session.expires_at,
        }))?;
    } else {
        writeln!(
            out,
            "{} ({}), session valid until {}",
            session.username,
            session.role,
            session.expires_at.format("%Y-%m-%d %H:%M UTC")
        )?;
    }
    Ok(())
}

pub async fn run(state: &AppState, command: UserCommand, out: &mut Output<'_>) -> CliResult<()> {
    match command {
        UserCommand::List => {
            state.require(Permission::ManageUsers).await?;
            let users = state.db.users().list_users().await?;
            if out.is_json() {
                let rows: Vec<UserRow> = users.iter().map(UserRow::from).collect();
                return out.json(&rows);
            }
            writeln!(out, "{:<24} {:<8} STATUS", "USERNAME", "ROLE")?;
            for user in &users {
                let status = if user.is_active { "active" } else { "inactive" };
                writeln!(out, "{:<24} {:<8} {}", user.username, user.role.as_str(), status)?;
            }
        }
        UserCommand::Add {
            username,
            role,
            password,
        } => {
            state.require(Permission::ManageUsers).await?;
            let user = state.db.users().create_user(&username, &password, role).await?;
            if out.is_json() {
                return out.json(&UserRow::from(&user));
            }
            writeln!(out, "Created {} '{}'", user.role, user.username)?;
        }
        UserCommand::Deactivate { username } => {
            let session = state.require(Permission::ManageUsers).await?;
            let user = find_user(state, &username).await?;
            if user.id == session.user_id {
                return Err(CliError::validation("You cannot deactivate your own account"));
            }
            state.db.users().deactivate_user(&user.id).await?;
            writeln!(out, "Deactivated '{}'", user.username)?;
        }
        UserCommand::Role { username, role } => {
            let session = state.require(Permission::ManageUsers).await?;
            let user = find_user(state, &username).await?;
            if user.id == session.user_id && role != user.role {
                return Err(CliError::validation("You cannot change your own role"));
            }
            let user = state.db.users().set_role(&user.id, role).await?;
            if out.is_json() {
                return out.json(&UserRow::from(&user));
            }
            writeln!(out, "'{}' is now {}", user.username, user.role)?;
        }
        UserCommand::Passwd { username, password } => {
            let session = state.session().await?;
            let target = match username {
                Some(name) if !name.eq_ignore_ascii_case(&session.username) => {
                    session.require(Permission::ManageUsers)?;
                    find_user(state, &name).await?
                }
                _ => find_user(state, &session.username).await?,
            };
            state.db.users().change_password(&target.id, &password).await?;
            writeln!(out, "Password changed for '{}'", target.username)?;
        }
    }
    Ok(())
}

async fn find_user(state: &AppState, username: &str) -> CliResult<User> {
    state
        .db
        .users()
        .find_by_username(username)
        .await?
        .ok_or_else(|| CliError::not_found("User", username))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::state::testing::state_as;

    #[tokio::test]
    async fn test_login_prints_token() {
        let state = state_as(Role::Staff).await;
        let mut buf = Vec::new();
        let mut out = Output::new(&mut buf, false);

        login(&state, "staff_user", "password", &mut out).await.unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Logged in as staff_user (staff)"));
        assert!(text.contains("export TIFFIN_TOKEN="));
    }

    #[tokio::test]
    async fn test_only_admin_manages_users() {
        let manager = state_as(Role::Manager).await;
        let mut buf = Vec::new();
        let mut out = Output::new(&mut buf, false);
        let err = run(
            &manager,
            UserCommand::Add {
                username: "new_cook".to_string(),
                role: Role::Staff,
                password: "secret1".to_string(),
            },
            &mut out,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::PermissionDenied);

        let admin = state_as(Role::Admin).await;
        run(
            &admin,
            UserCommand::Add {
                username: "new_cook".to_string(),
                role: Role::Staff,
                password: "secret1".to_string(),
            },
            &mut out,
        )
        .await
        .unwrap();
        assert!(admin.db.users().find_by_username("new_cook").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_staff_changes_own_password_only() {
        let staff = state_as(Role::Staff).await;
        let mut buf = Vec::new();
        let mut out = Output::new(&mut buf, false);

        run(
            &staff,
            UserCommand::Passwd {
                username: None,
                password: "better-pass".to_string(),
            },
            &mut out,
        )
        .await
        .unwrap();

        let err = run(
            &staff,
            UserCommand::Passwd {
                username: Some("someone_else".to_string()),
                password: "better-pass".to_string(),
            },
            &mut out,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::PermissionDenied);
    }

    #[tokio::test]
    async fn test_demoted_user_loses_permissions() {
        let mut state = state_as(Role::Admin).await;
        state.db.users().create_user("asha", "secret1", Role::Manager).await.unwrap();
        let asha = state
            .db
            .users()
            .authenticate("asha", "secret1", &state.sessions)
            .await
            .unwrap();

        let mut buf = Vec::new();
        let mut out = Output::new(&mut buf, false);
        run(
            &state,
            UserCommand::Role {
                username: "asha".to_string(),
                role: Role::Staff,
            },
            &mut out,
        )
        .await
        .unwrap();
        assert!(String::from_utf8(buf).unwrap().contains("'asha' is now staff"));

        state.config.token = Some(asha.token);
        let err = state.require(Permission::ViewReports).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PermissionDenied);
        assert!(state.require(Permission::Checkout).await.is_ok());
    }

    #[test]
    fn test_parse_role() {
        assert_eq!(parse_role("Manager").unwrap(), Role::Manager);
        assert!(parse_role("chef").is_err());
    }
}
