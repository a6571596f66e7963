//! `tiffin` binary. Setup and dispatch live in the library for testability.

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    tiffin_cli::run().await
}
