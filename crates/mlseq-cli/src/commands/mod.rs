//! CLI command implementations

pub mod models;
pub mod render;
pub mod split;

use anyhow::{Context, Result};

/// Current-thread runtime for commands that talk to the service.
fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")
}
