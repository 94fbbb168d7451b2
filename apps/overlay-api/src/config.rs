//! Server configuration from command-line arguments and environment

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Command-line arguments for the overlay API server
#[derive(Parser, Debug, Clone)]
#[command(name = "overlay-api")]
#[command(about = "PDF overlay API: upload documents, place text and signatures, download results")]
pub struct Config {
    /// Host address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3001")]
    pub port: u16,

    /// SQLite connection string (defaults to the platform data directory)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Maximum request body size in megabytes
    #[arg(long, env = "MAX_UPLOAD_MB", default_value = "25")]
    pub max_upload_mb: usize,

    /// Enable verbose logging
    #[arg(short, long, env = "VERBOSE")]
    pub verbose: bool,
}

impl Config {
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    /// Uploads arrive base64-encoded inside JSON, so the limit applies to
    /// the encoded body.
    pub fn body_limit(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    pub fn database_url(&self) -> String {
        self.database_url.clone().unwrap_or_else(|| {
            let data_dir = dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("pdf-overlay");
            std::fs::create_dir_all(&data_dir).ok();
            format!("sqlite:{}/overlay.db?mode=rwc", data_dir.display())
        })
    }
}
