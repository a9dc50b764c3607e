//! Binary crate for the `avatard` daemon.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Interactive configuration
//! - Tracing bootstrap and component wiring

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod runtime;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cmd = cli::Cli::parse();
    cmd.run().await
}

/// Structured JSON logging to stdout; `RUST_LOG` overrides the level.
fn init_tracing() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_current_span(false)
        .init();
}
