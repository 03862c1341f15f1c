//! Fingerprint cache: maps a repo-relative path to its last processed state.
//!
//! A record is fresh only while its fingerprint equals the hash of the file
//! currently on disk. Every write is a single upsert, so a killed run keeps
//! the records of every file it finished.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::models::FileRecord;

#[derive(Clone)]
pub struct CacheStore {
    pool: SqlitePool,
}

impl CacheStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn lookup(&self, path: &str) -> Result<Option<FileRecord>> {
        let row = sqlx::query(
            "SELECT path, fingerprint, processed_at, content FROM file_records WHERE path = ?",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| FileRecord {
            path: row.get("path"),
            fingerprint: row.get("fingerprint"),
            processed_at: row.get("processed_at"),
            content: row.get("content"),
        }))
    }

    pub async fn store(&self, path: &str, fingerprint: &str, content: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO file_records (path, fingerprint, processed_at, content) VALUES (?, ?, ?, ?)
            ON CONFLICT(path) DO UPDATE SET
                fingerprint = excluded.fingerprint,
                processed_at = excluded.processed_at,
                content = excluded.content
            "#,
        )
        .bind(path)
        .bind(fingerprint)
        .bind(now)
        .bind(content)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn invalidate(&self, path: &str) -> Result<()> {
        sqlx::query("DELETE FROM file_records WHERE path = ?")
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM file_records")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn len(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM file_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// True when `record` was produced from content hashing to `fingerprint`.
pub fn is_fresh(record: Option<&FileRecord>, fingerprint: &str) -> bool {
    record.is_some_and(|r| r.fingerprint == fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state;
    use tempfile::TempDir;

    async fn open_cache(tmp: &TempDir) -> CacheStore {
        let pool = state::open(tmp.path()).await.unwrap();
        CacheStore::new(pool)
    }

    #[tokio::test]
    async fn store_then_lookup() {
        let tmp = TempDir::new().unwrap();
        let cache = open_cache(&tmp).await;

        assert!(cache.lookup("lib/a.py").await.unwrap().is_none());
        cache.store("lib/a.py", "abc", "\"\"\"Doc.\"\"\"\n").await.unwrap();

        let rec = cache.lookup("lib/a.py").await.unwrap().unwrap();
        assert_eq!(rec.fingerprint, "abc");
        assert_eq!(rec.content, "\"\"\"Doc.\"\"\"\n");
        assert!(rec.processed_at > 0);
    }

    #[tokio::test]
    async fn store_overwrites_existing_record() {
        let tmp = TempDir::new().unwrap();
        let cache = open_cache(&tmp).await;
        cache.store("a.py", "one", "1").await.unwrap();
        cache.store("a.py", "two", "2").await.unwrap();
        assert_eq!(cache.len().await.unwrap(), 1);
        assert_eq!(cache.lookup("a.py").await.unwrap().unwrap().fingerprint, "two");
    }

    #[tokio::test]
    async fn invalidate_and_clear() {
        let tmp = TempDir::new().unwrap();
        let cache = open_cache(&tmp).await;
        cache.store("a.py", "1", "").await.unwrap();
        cache.store("b.py", "2", "").await.unwrap();

        cache.invalidate("a.py").await.unwrap();
        assert!(cache.lookup("a.py").await.unwrap().is_none());
        assert!(cache.lookup("b.py").await.unwrap().is_some());

        assert_eq!(cache.clear().await.unwrap(), 1);
        assert_eq!(cache.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        {
            let cache = open_cache(&tmp).await;
            cache.store("a.py", "fp", "body").await.unwrap();
        }
        let cache = open_cache(&tmp).await;
        assert_eq!(cache.lookup("a.py").await.unwrap().unwrap().fingerprint, "fp");
    }

    #[test]
    fn freshness_requires_matching_fingerprint() {
        let rec = FileRecord {
            path: "a.py".into(),
            fingerprint: "abc".into(),
            processed_at: 0,
            content: String::new(),
        };
        assert!(is_fresh(Some(&rec), "abc"));
        assert!(!is_fresh(Some(&rec), "abd"));
        assert!(!is_fresh(None, "abc"));
    }
}
