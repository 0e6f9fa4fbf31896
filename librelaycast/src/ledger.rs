//! Sync ledger: the set of post ids already relayed
//!
//! Backed by a single SQLite table. Rows are only ever inserted; a post id in
//! the table means its delivery was attempted and reported back to the loop.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, Result};

#[derive(Clone)]
pub struct Ledger {
    pool: SqlitePool,
}

impl Ledger {
    /// Open (and if needed create) the ledger database
    ///
    /// Expands `~`, creates missing parent directories and applies the
    /// embedded migrations, so no separate provisioning step is needed.
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
            }
        }

        // Forward slashes work for SQLite URLs on both Windows and Unix
        let db_url = format!("sqlite://{}", expanded_path.replace('\\', "/"));
        let options = SqliteConnectOptions::from_str(&db_url)
            .map_err(DbError::SqlxError)?
            .create_if_missing(true);

        // Single writer; idle connections are closed between ticks
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(0)
            .idle_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        debug!("Opened sync ledger at {}", expanded_path);

        Ok(Self { pool })
    }

    /// Check whether a post id was already relayed
    pub async fn exists(&self, post_id: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT 1 FROM synced_posts WHERE post_id = ?
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.is_some())
    }

    /// Record a post id
    ///
    /// Returns `Ok(false)` when the id was already present; that case is
    /// logged and otherwise ignored.
    pub async fn record_if_absent(&self, post_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO synced_posts (post_id) VALUES (?)
            "#,
        )
        .bind(post_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                info!("Post ID {} already exists in the ledger", post_id);
                Ok(false)
            }
            Err(e) => Err(DbError::SqlxError(e).into()),
        }
    }

    /// Number of recorded post ids
    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM synced_posts")
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(count)
    }

    /// Close the pool, waiting for in-flight statements
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_ledger() -> (TempDir, Ledger) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("synced_posts.db");
        let ledger = Ledger::new(db_path.to_str().unwrap()).await.unwrap();
        (temp_dir, ledger)
    }

    #[tokio::test]
    async fn test_new_ledger_is_empty() {
        let (_temp_dir, ledger) = create_test_ledger().await;
        assert_eq!(ledger.count().await.unwrap(), 0);
        assert!(!ledger.exists("109876543210").await.unwrap());
    }

    #[tokio::test]
    async fn test_record_then_exists() {
        let (_temp_dir, ledger) = create_test_ledger().await;

        assert!(ledger.record_if_absent("109876543210").await.unwrap());
        assert!(ledger.exists("109876543210").await.unwrap());
        assert!(!ledger.exists("109876543211").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_not_an_error() {
        let (_temp_dir, ledger) = create_test_ledger().await;

        assert!(ledger.record_if_absent("42").await.unwrap());
        assert!(!ledger.record_if_absent("42").await.unwrap());
        assert_eq!(ledger.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("synced_posts.db");
        let db_path = db_path.to_str().unwrap();

        {
            let ledger = Ledger::new(db_path).await.unwrap();
            ledger.record_if_absent("abc").await.unwrap();
            ledger.close().await;
        }

        let reopened = Ledger::new(db_path).await.unwrap();
        assert!(reopened.exists("abc").await.unwrap());
        assert_eq!(reopened.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("dir").join("ledger.db");

        let ledger = Ledger::new(db_path.to_str().unwrap()).await.unwrap();
        ledger.record_if_absent("1").await.unwrap();

        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_adopts_existing_table() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("legacy.db");
        let db_path = db_path.to_str().unwrap();

        // A database created without migrations, with one row already in it
        {
            let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path))
                .unwrap()
                .create_if_missing(true);
            let pool = SqlitePool::connect_with(options).await.unwrap();
            sqlx::query("CREATE TABLE synced_posts (post_id TEXT PRIMARY KEY)")
                .execute(&pool)
                .await
                .unwrap();
            sqlx::query("INSERT INTO synced_posts (post_id) VALUES ('legacy-1')")
                .execute(&pool)
                .await
                .unwrap();
            pool.close().await;
        }

        let ledger = Ledger::new(db_path).await.unwrap();
        assert!(ledger.exists("legacy-1").await.unwrap());
    }
}
