//! Account row storage for the dentro server.
//!
//! Each account owns exactly one row whose `content` column holds the
//! serialized clinic snapshot. Writes are plain upserts with no
//! concurrency token; the last writer wins.

use std::path::Path;
use std::str::FromStr;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub user_id: String,
    pub content: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct RowStore {
    pool: SqlitePool,
}

impl RowStore {
    /// Opens (creating if needed) the database and runs migrations.
    pub async fn open(db_path: &Path) -> Result<Self, sqlx::Error> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        let options = SqliteConnectOptions::from_str(&db_url)?.create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<UserRow>, sqlx::Error> {
        sqlx::query_as::<_, UserRow>(
            "SELECT user_id, content, updated_at FROM user_data WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Inserts or replaces the account's row.
    pub async fn upsert(&self, user_id: &str, content: &str) -> Result<(), sqlx::Error> {
        let updated_at = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO user_data (user_id, content, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                content = excluded.content,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(content)
        .bind(&updated_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(user_id, bytes = content.len(), "stored account row");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_creates_table() {
        let temp_dir = tempdir().unwrap();
        let store = RowStore::open(&temp_dir.path().join("nested/server.db"))
            .await
            .unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx_%' ORDER BY name",
        )
        .fetch_all(&store.pool)
        .await
        .unwrap();

        let table_names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
        assert_eq!(table_names, vec!["user_data"]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_single_row() {
        let temp_dir = tempdir().unwrap();
        let store = RowStore::open(&temp_dir.path().join("server.db"))
            .await
            .unwrap();

        assert!(store.get("clinic-a").await.unwrap().is_none());

        store.upsert("clinic-a", r#"{"lastUpdated":1}"#).await.unwrap();
        store.upsert("clinic-a", r#"{"lastUpdated":2}"#).await.unwrap();
        store.upsert("clinic-b", r#"{"lastUpdated":9}"#).await.unwrap();

        let row = store.get("clinic-a").await.unwrap().unwrap();
        assert_eq!(row.content, r#"{"lastUpdated":2}"#);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM user_data")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }
}
