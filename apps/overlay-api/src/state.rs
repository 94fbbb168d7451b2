//! Application state for the overlay API

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub struct AppState {
    pub db: SqlitePool,
    /// One async lock per document id; element mutations and regeneration
    /// of the same document never interleave.
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AppState {
    pub async fn connect(database_url: &str) -> Result<Self> {
        tracing::info!("Connecting to database: {}", database_url);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Self::with_pool(pool).await
    }

    /// Private in-memory database. A single connection that is never
    /// recycled, since every new connection would see an empty database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        Self::run_migrations(&pool).await?;

        Ok(Self {
            db: pool,
            locks: Mutex::new(HashMap::new()),
        })
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                filename TEXT NOT NULL,
                document_hash TEXT NOT NULL,
                page_count INTEGER NOT NULL,
                pdf_data BLOB NOT NULL,
                processed_pdf BLOB,
                processed_filename TEXT,
                elements_json TEXT NOT NULL DEFAULT '{"next_id":0,"elements":[]}',
                status TEXT NOT NULL DEFAULT 'uploaded',
                error_message TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(pool)
        .await?;

        // Indexes for listing and status lookups
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status)
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_documents_created_at ON documents(created_at)
            "#,
        )
        .execute(pool)
        .await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Lock guarding mutations of one document.
    ///
    /// Entries nobody holds are dropped on every call, so the map only
    /// tracks documents with requests in flight.
    pub fn document_lock(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.retain(|key, lock| key == id || Arc::strong_count(lock) > 1);
        locks.entry(id.to_string()).or_default().clone()
    }

    #[cfg(test)]
    pub fn tracked_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
