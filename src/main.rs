//! docwalk - Main Entry Point
//!
//! Extracts API documentation from the project in the given directory
//! (default: the current one) and writes the artifacts.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use docwalk::pipeline::Pipeline;
use docwalk::types::DocwalkConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let project_dir = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    let config = DocwalkConfig::load(&project_dir)
        .with_context(|| format!("failed to load configuration from {}", project_dir.display()))?;

    // Initialize tracing
    let filter = EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| "docwalk=info".into()));
    if config.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting docwalk v{}", env!("CARGO_PKG_VERSION"));
    info!(inputs = config.inputs.len(), project = %project_dir.display(), "Configuration loaded");

    let pipeline = Pipeline::builder(config).build()?;
    let output = pipeline.run_and_write().await?;

    info!(
        items = output.report.items.len(),
        home = output.report.home.as_deref().unwrap_or("-"),
        "Done"
    );
    Ok(())
}
