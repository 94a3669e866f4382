//! Data Access Layer
//!
//! All database interaction lives here, split by component: task lifecycle,
//! level progression, word assignment, and the conversation recorder. Queries
//! are runtime-checked (`sqlx::query_as::<_, T>` with explicit binds) so the
//! crate builds without a live database; multi-statement operations run in
//! explicit transactions.

pub mod progression;
pub mod recorder;
pub mod tasks;
pub mod words;

#[cfg(test)]
mod tests;

use anyhow::Result;
use sqlx::PgPool;

/// Storage errors, with NotFound surfaced distinctly from transport failure
/// so the API boundary can map them to different status codes.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// A wrapper around the `PgPool` to provide a clear data access interface.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Creates a new `Db` instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs all pending `sqlx` migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}
