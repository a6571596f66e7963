//! Incremental bill backup to CSV.

use std::io::Write;

use chrono::Utc;
use clap::Subcommand;
use serde_json::json;

use super::Output;
use crate::error::CliResult;
use crate::state::AppState;
use tiffin_core::Permission;
use tiffin_db::CsvBackupSink;

#[derive(Debug, Subcommand)]
pub enum BackupCommand {
    /// Export bills since the last backup, then delete them
    Run,

    /// Show when the last backup ran and what is pending
    Status,
}

pub async fn run(state: &AppState, command: BackupCommand, out: &mut Output<'_>) -> CliResult<()> {
    state.require(Permission::RunBackup).await?;
    let service = state.backup();
    let now = Utc::now();

    match command {
        BackupCommand::Run => {
            let sink = CsvBackupSink::new(state.config.backup_dir.clone());
            let report = service.run(now, &sink).await?;
            if out.is_json() {
                return out.json(&report);
            }
            match &report.artifact {
                Some(artifact) => writeln!(
                    out,
                    "Backed up {} bill(s) to {}",
                    report.bills_exported,
                    artifact.path.display()
                )?,
                None => writeln!(out, "No new bills; backup timestamp updated")?,
            }
        }
        BackupCommand::Status => {
            let last = service.last_backup_at().await?;
            let pending = service.pending(now).await?.len();
            let due = service.is_due(now).await?;
            if out.is_json() {
                return out.json(&json!({
                    "last_backup_at": last,
                    "pending_bills": pending,
                    "due": due,
                    "backup_dir": state.config.backup_dir,
                }));
            }
            match last {
                Some(at) => writeln!(out, "Last backup: {}", at.format("%Y-%m-%d %H:%M UTC"))?,
                None => writeln!(out, "Last backup: never")?,
            }
            writeln!(out, "Pending bills: {}", pending)?;
            writeln!(out, "Backup folder: {}", state.config.backup_dir.display())?;
            if due {
                writeln!(out, "A backup is due: run `tiffin backup run`")?;
            }
        }
    }
    Ok(())
}
