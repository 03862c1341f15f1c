//! Knowledge accumulator: a growing natural-language summary per unit.
//!
//! Units are either a file (`lib/models.py`) or a class inside a file
//! (`lib/models.py::User`). Summaries only grow during normal operation;
//! new text is appended unless the existing summary already contains it.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::models::ContextSummary;

/// Separator between a file path and a class name in a unit identifier.
pub const UNIT_SEPARATOR: &str = "::";

pub fn class_unit_id(path: &str, class_name: &str) -> String {
    format!("{}{}{}", path, UNIT_SEPARATOR, class_name)
}

#[derive(Clone)]
pub struct KnowledgeStore {
    pool: SqlitePool,
}

impl KnowledgeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Current summary text for `unit_id`, or an empty string.
    pub async fn get(&self, unit_id: &str) -> Result<String> {
        Ok(self
            .get_summary(unit_id)
            .await?
            .map(|s| s.summary)
            .unwrap_or_default())
    }

    pub async fn get_summary(&self, unit_id: &str) -> Result<Option<ContextSummary>> {
        let row = sqlx::query(
            "SELECT unit_id, summary, fingerprint, updated_at FROM context_summaries WHERE unit_id = ?",
        )
        .bind(unit_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| row_to_summary(&row)))
    }

    /// Merge `new_summary` into the unit's summary and return the result.
    pub async fn update(
        &self,
        unit_id: &str,
        new_summary: &str,
        fingerprint: &str,
    ) -> Result<ContextSummary> {
        let existing = self.get(unit_id).await?;
        let merged = merge_summary(&existing, new_summary);
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO context_summaries (unit_id, summary, fingerprint, updated_at) VALUES (?, ?, ?, ?)
            ON CONFLICT(unit_id) DO UPDATE SET
                summary = excluded.summary,
                fingerprint = excluded.fingerprint,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(unit_id)
        .bind(&merged)
        .bind(fingerprint)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(ContextSummary {
            unit_id: unit_id.to_string(),
            summary: merged,
            fingerprint: fingerprint.to_string(),
            updated_at: now,
        })
    }

    pub async fn all(&self) -> Result<Vec<ContextSummary>> {
        let rows = sqlx::query(
            "SELECT unit_id, summary, fingerprint, updated_at FROM context_summaries ORDER BY unit_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_summary).collect())
    }

    /// Drop every summary and its vector. Used by `--no-cache` only.
    pub async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM summary_vectors")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM context_summaries")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

fn row_to_summary(row: &sqlx::sqlite::SqliteRow) -> ContextSummary {
    ContextSummary {
        unit_id: row.get("unit_id"),
        summary: row.get("summary"),
        fingerprint: row.get("fingerprint"),
        updated_at: row.get("updated_at"),
    }
}

/// Append `new` to `existing` unless it adds nothing.
pub fn merge_summary(existing: &str, new: &str) -> String {
    let existing = existing.trim();
    let new = new.trim();
    if new.is_empty() || existing.contains(new) {
        return existing.to_string();
    }
    if existing.is_empty() {
        return new.to_string();
    }
    format!("{}\n\n{}", existing, new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state;
    use tempfile::TempDir;

    #[test]
    fn merge_is_monotonic() {
        assert_eq!(merge_summary("", "A parser."), "A parser.");
        assert_eq!(merge_summary("A parser.", "A parser."), "A parser.");
        assert_eq!(merge_summary("A parser.", ""), "A parser.");
        assert_eq!(
            merge_summary("A parser.", "Handles errors."),
            "A parser.\n\nHandles errors."
        );
    }

    #[tokio::test]
    async fn update_accumulates_in_processing_order() {
        let tmp = TempDir::new().unwrap();
        let store = KnowledgeStore::new(state::open(tmp.path()).await.unwrap());

        assert_eq!(store.get("lib/a.py").await.unwrap(), "");
        store.update("lib/a.py", "Loads config.", "f1").await.unwrap();
        let merged = store
            .update("lib/a.py", "Validates paths.", "f2")
            .await
            .unwrap();

        assert_eq!(merged.summary, "Loads config.\n\nValidates paths.");
        assert_eq!(merged.fingerprint, "f2");
        assert_eq!(store.get("lib/a.py").await.unwrap(), merged.summary);
    }

    #[tokio::test]
    async fn class_units_are_listed_and_cleared() {
        let tmp = TempDir::new().unwrap();
        let store = KnowledgeStore::new(state::open(tmp.path()).await.unwrap());
        let unit = class_unit_id("lib/a.py", "Loader");
        assert_eq!(unit, "lib/a.py::Loader");

        store.update(&unit, "Loads things.", "f").await.unwrap();
        store.update("lib/a.py", "Module.", "f").await.unwrap();
        let ids: Vec<String> = store.all().await.unwrap().into_iter().map(|s| s.unit_id).collect();
        assert_eq!(ids, vec!["lib/a.py".to_string(), "lib/a.py::Loader".to_string()]);

        store.clear().await.unwrap();
        assert!(store.all().await.unwrap().is_empty());
    }
}
