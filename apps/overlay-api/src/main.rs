//! PDF Overlay API Server
//!
//! Provides REST endpoints for:
//! - Document upload and management
//! - Placing text and signature elements on pages
//! - Downloading and streaming the processed PDF
//! - Typed signature previews

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod error;
mod handlers;
mod models;
mod range;
mod routes;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::parse();

    // Initialize tracing
    let mut filter = EnvFilter::from_default_env()
        .add_directive("overlay_api=info".parse()?)
        .add_directive("tower_http=debug".parse()?);
    if config.verbose {
        filter = filter
            .add_directive(Level::DEBUG.into())
            .add_directive("overlay_core=debug".parse()?);
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Initialize application state
    info!("Initializing PDF overlay API...");
    let state = AppState::connect(&config.database_url()).await?;
    let app = routes::router(Arc::new(state), config.body_limit());

    let addr = config.bind_addr()?;
    info!("Starting PDF overlay API on http://{}", addr);
    info!("Max upload size: {} MB", config.max_upload_mb);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
