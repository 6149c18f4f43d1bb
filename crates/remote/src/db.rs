//! Database connection and pool management.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

/// Embedded migrations, applied on every connect.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

// A shelf is read far more than it is written; a handful of connections
// covers overlapping imports comfortably.
const POOL_SIZE: u32 = 5;

/// Connection pool for the shared library database.
///
/// This is the entry point for everything that touches book records. It
/// manages the SQLite pool and hands its connections to the record store.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to the library database at the given path.
    ///
    /// Creates the database file if it doesn't exist and runs migrations.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let options = Self::tuned_options().filename(path.as_ref()).create_if_missing(true);
        Self::open(options, POOL_SIZE).await
    }

    /// Connect to an in-memory database (useful for testing).
    ///
    /// Note:
    /// - The database vanishes when its connection closes.
    /// - Compiled unconditionally, not under `#[cfg(test)]`, so downstream
    ///   crates can use it from their own tests.
    pub async fn connect_in_memory() -> Result<Self> {
        // Each new connection to `:memory:` opens its own blank database, so
        // either share the cache or cap the pool at a single connection.
        Self::open(Self::tuned_options().filename(":memory:"), 1).await
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the connection pool, waiting for checked-out connections to
    /// come back first. The `Database` is unusable afterwards.
    pub async fn close(&self) {
        // Let SQLite update query planner statistics
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }

    async fn open(options: SqliteConnectOptions, size: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(size)
            // Query-based PRAGMAs are per-connection state; they have to run
            // on every connection the pool opens, not just the first one it
            // hands out.
            .after_connect(|conn, _meta| Box::pin(Self::apply_session_pragmas(conn)))
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    fn tuned_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            // WAL keeps list reads flowing while an import writes
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true)
            // NORMAL is durable enough under WAL for a record shelf
            .synchronous(SqliteSynchronous::Normal)
            // Two imports started in quick succession share one writer in
            // WAL mode; a short wait beats surfacing SQLITE_BUSY for that.
            .busy_timeout(std::time::Duration::from_millis(1500))
            // Record rows are small and reclaimed space gets reused.
            .auto_vacuum(sqlx::sqlite::SqliteAutoVacuum::None)
    }

    /// Session PRAGMAs that `SqliteConnectOptions` has no setter for. The
    /// numbers are sized for a table of small metadata rows.
    async fn apply_session_pragmas(conn: &mut SqliteConnection) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA wal_autocheckpoint = 512;
                PRAGMA cache_size = -2048;
                PRAGMA temp_store = MEMORY;
                PRAGMA analysis_limit = 400;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Bring the schema up to date.
    ///
    /// Runs automatically on every connect; safe to call again.
    #[instrument("migrating library schema")]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_in_memory_is_usable() {
        let db = Database::connect_in_memory().await.unwrap();
        let row: (i64,) = sqlx::query_as("SELECT count(*) FROM user_library")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(row.0, 0);
        db.close().await;
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = Database::connect_in_memory().await.unwrap();
        // Already applied by connect; a second run must be a no-op.
        db.migrate().await.unwrap();
        db.close().await;
    }

    #[tokio::test]
    async fn test_schema_constraint_is_present() {
        let db = Database::connect_in_memory().await.unwrap();
        // The per-owner dedup rule lives in the schema; make sure the unique
        // index actually made it into the migrated database.
        let indexes: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM pragma_index_list('user_library') WHERE \"unique\" = 1")
                .fetch_all(db.pool())
                .await
                .unwrap();
        assert!(!indexes.is_empty(), "user_library should carry a unique index");
        db.close().await;
    }

    #[tokio::test]
    async fn test_pragmas_are_applied() {
        let db = Database::connect_in_memory().await.unwrap();
        // One set through the connect options, one through after_connect.
        let row: (i64,) = sqlx::query_as("PRAGMA foreign_keys").fetch_one(db.pool()).await.unwrap();
        assert_eq!(row.0, 1, "foreign_keys should be ON");
        let row: (i64,) = sqlx::query_as("PRAGMA wal_autocheckpoint").fetch_one(db.pool()).await.unwrap();
        assert_eq!(row.0, 512, "WAL checkpoint interval should stick");
        db.close().await;
    }
}
