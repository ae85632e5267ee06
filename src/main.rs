use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod cli;
mod config;
mod error;
mod handlers;
mod permissions;
mod router;
mod schemas;
mod validation;

#[cfg(test)]
mod test_utils;

use cli::Cli;
use crate::config::Settings;

/// Main entry point for the useradmin service.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "useradmin=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load()?;
    let cli = Cli::parse();
    cli.run(settings).await?;

    Ok(())
}
