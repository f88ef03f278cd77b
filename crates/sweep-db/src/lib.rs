//! Sweep Database Layer
//!
//! `SQLite` persistence for resumable runs. A run row records which
//! extractor it belongs to and how many items it covers; `run_results`
//! holds the index-aligned [`sweep_core::ResultTag`] snapshot written at
//! every checkpoint.
//!
//! # Example
//!
//! ```ignore
//! use sweep_db::{Database, SqliteSink};
//!
//! let db = Database::new("sweep.db").await?;
//! db.run_migrations().await?;
//! let run = sweep_db::runs::create_or_resume_run(db.pool(), &run_id, "microchip", items.len()).await?;
//! let prior = sweep_db::results::load_results(db.pool(), &run.id).await?;
//! let sink = SqliteSink::new(db.pool().clone(), run.id, items.clone());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod connection;
pub mod error;
pub mod migrations;
pub mod results;
pub mod runs;
pub mod sink;

// Re-export commonly used types
pub use connection::DatabasePool;
pub use error::{DatabaseError, Result};
pub use runs::Run;
pub use sink::SqliteSink;

use std::path::Path;

/// High-level database handle with migrations.
#[derive(Debug, Clone)]
pub struct Database {
    pool: DatabasePool,
}

impl Database {
    /// Open the database at `path` (or `:memory:`).
    ///
    /// # Errors
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let pool = DatabasePool::new(path).await?;
        Ok(Self { pool })
    }

    /// Open the database and bring its schema up to date.
    ///
    /// # Errors
    /// Returns `DatabaseError` if opening or migrating fails.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Self::new(path).await?;
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run all pending database migrations.
    ///
    /// # Errors
    /// Returns `DatabaseError::Migration` if any migration fails.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(self.pool.pool()).await
    }

    /// Get the current schema version.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the version cannot be queried.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(self.pool.pool()).await
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Sqlite> {
        self.pool.pool()
    }

    /// Close the database connection gracefully.
    pub async fn close(self) {
        self.pool.close().await;
    }
}
