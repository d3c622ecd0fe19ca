pub mod auth;
pub mod config;
pub mod error;
pub mod requests;
pub mod server;
pub mod util;

pub mod tui;
// === CLI entrypoint ===
pub mod cli;

/// Entrypoint used by `main.rs` to run the full CLI.
pub async fn run_cli() -> anyhow::Result<()> {
    cli::cli().await
}
