//! # Tiffin CLI Library
//!
//! The `tiffin` command: parses arguments, opens the database, checks the
//! session and runs one command.
//!
//! ## Module Organization
//! ```text
//! tiffin_cli/
//! ├── lib.rs          ◄─── You are here (startup & dispatch)
//! ├── cli.rs          ◄─── clap grammar
//! ├── state/
//! │   ├── mod.rs      ◄─── AppState: database, config, sessions
//! │   └── config.rs   ◄─── TIFFIN_* environment configuration
//! ├── commands/       ◄─── one module per command group
//! └── error.rs        ◄─── CliError and exit codes
//! ```
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Parse arguments (clap)                                              │
//! │  2. Initialize logging to stderr (RUST_LOG overrides the default)       │
//! │  3. Read AppConfig from TIFFIN_* variables                              │
//! │  4. Open SQLite (WAL), run migrations, load session secret              │
//! │  5. Run the command, writing to stdout                                  │
//! │  6. Remind about an overdue backup (logged-in, non-JSON only)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod cli;
pub mod commands;
pub mod error;
pub mod state;

use std::io::{self, Write};
use std::process::ExitCode;

use chrono::Utc;
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use commands::{account, backup, bill, inventory, menu, order, report, Output};
use error::CliResult;
use state::{AppConfig, AppState};
use tiffin_core::Permission;

/// Runs the CLI and returns the process exit code.
pub async fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            err.exit_code()
        }
    }
}

async fn execute(cli: Cli) -> CliResult<()> {
    let config = AppConfig::from_env()?;
    let state = AppState::open(config).await?;

    let stdout = io::stdout();
    let mut lock = stdout.lock();
    let mut out = Output::new(&mut lock, cli.json);

    let public = cli.command.is_public();
    let result = dispatch(&state, cli.command, &mut out).await;

    if result.is_ok() && !public && !out.is_json() {
        remind_backup(&state, &mut out).await;
    }
    out.flush()?;

    state.db.close().await;
    result
}

/// Routes a parsed command to its handler.
pub async fn dispatch(state: &AppState, command: Command, out: &mut Output<'_>) -> CliResult<()> {
    match command {
        Command::Init(args) => account::init(state, args, out).await,
        Command::Login { username, password } => account::login(state, &username, &password, out).await,
        Command::Whoami => account::whoami(state, out).await,
        Command::Menu(cmd) => menu::run(state, cmd, out).await,
        Command::Category(cmd) => menu::run_category(state, cmd, out).await,
        Command::Order(cmd) => order::run(state, cmd, out).await,
        Command::Checkout(args) => bill::checkout(state, args, out).await,
        Command::Upi(args) => bill::upi(state, args, out).await,
        Command::Bill(cmd) => bill::run(state, cmd, out).await,
        Command::Inventory(cmd) => inventory::run(state, cmd, out).await,
        Command::Recipe(cmd) => inventory::run_recipe(state, cmd, out).await,
        Command::Backup(cmd) => backup::run(state, cmd, out).await,
        Command::Report(cmd) => report::run(state, cmd, out).await,
        Command::User(cmd) => account::run(state, cmd, out).await,
    }
}

/// Prints a reminder for users who can run backups once one is due.
async fn remind_backup(state: &AppState, out: &mut Output<'_>) {
    if state.require(Permission::RunBackup).await.is_err() {
        return;
    }
    match state.backup().is_due(Utc::now()).await {
        Ok(true) => {
            let _ = writeln!(out, "\nReminder: a backup is due. Run `tiffin backup run`.");
        }
        Ok(false) => {}
        Err(e) => warn!(error = %e, "Could not check backup status"),
    }
}

/// Initializes the tracing subscriber. Logs go to stderr so stdout stays
/// clean for `--json`.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=tiffin_db=trace` - Trace the database layer only
/// - Default: warnings, plus info from the tiffin crates
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,tiffin=info,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::order::OrderCommand;
    use crate::state::testing::state_as;
    use tiffin_core::Role;

    #[tokio::test]
    async fn test_dispatch_routes_commands() {
        let state = state_as(Role::Staff).await;
        let mut buf = Vec::new();
        let mut out = Output::new(&mut buf, false);

        dispatch(&state, Command::Whoami, &mut out).await.unwrap();
        dispatch(&state, Command::Order(OrderCommand::List), &mut out)
            .await
            .unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("staff_user (staff)"));
        assert!(text.contains("No open orders"));
    }

    #[tokio::test]
    async fn test_backup_reminder_only_for_managers() {
        let staff = state_as(Role::Staff).await;
        let mut buf = Vec::new();
        let mut out = Output::new(&mut buf, false);
        remind_backup(&staff, &mut out).await;
        assert!(buf.is_empty());

        let manager = state_as(Role::Manager).await;
        let mut buf = Vec::new();
        let mut out = Output::new(&mut buf, false);
        remind_backup(&manager, &mut out).await;
        assert!(String::from_utf8(buf).unwrap().contains("a backup is due"));
    }
}
