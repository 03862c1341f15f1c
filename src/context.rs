//! Context retrieval over accumulated summaries.
//!
//! Summaries are embedded through an [`Embedder`] and stored next to the
//! summary rows. Retrieval embeds the query text and ranks every stored
//! vector by cosine similarity. When the embedding service cannot be reached,
//! retrieval returns nothing and the run continues without context.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::embedding::{self, Embedder};
use crate::hasher;
use crate::knowledge::UNIT_SEPARATOR;
use crate::models::ContextSummary;

pub struct ContextRetriever {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl ContextRetriever {
    pub fn new(pool: SqlitePool, embedder: Arc<dyn Embedder>, top_k: usize) -> Self {
        Self {
            pool,
            embedder,
            top_k,
        }
    }

    /// Related summaries for `unit_id`, most similar first, at most `top_k`.
    ///
    /// The unit itself and its class sub-units are never returned.
    pub async fn retrieve(&self, unit_id: &str, query_text: &str) -> Vec<ContextSummary> {
        if query_text.trim().is_empty() {
            return Vec::new();
        }

        let query_vec = match embedding::embed_one(self.embedder.as_ref(), query_text).await {
            Ok(v) => v,
            Err(e) => {
                warn!(unit = unit_id, error = %e, "context service unavailable, continuing without context");
                return Vec::new();
            }
        };

        match self.rank(unit_id, &query_vec).await {
            Ok(results) => results,
            Err(e) => {
                warn!(unit = unit_id, error = %e, "failed to read stored summary vectors");
                Vec::new()
            }
        }
    }

    async fn rank(&self, unit_id: &str, query_vec: &[f32]) -> Result<Vec<ContextSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT s.unit_id, s.summary, s.fingerprint, s.updated_at, v.embedding
            FROM summary_vectors v
            JOIN context_summaries s ON s.unit_id = v.unit_id
            WHERE v.model = ?
            "#,
        )
        .bind(self.embedder.model_name())
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<(f32, ContextSummary)> = rows
            .iter()
            .filter(|row| !belongs_to(row.get::<&str, _>("unit_id"), unit_id))
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let score = embedding::cosine_similarity(query_vec, &embedding::blob_to_vec(&blob));
                let summary = ContextSummary {
                    unit_id: row.get("unit_id"),
                    summary: row.get("summary"),
                    fingerprint: row.get("fingerprint"),
                    updated_at: row.get("updated_at"),
                };
                (score, summary)
            })
            .collect();

        // Score desc, unit id asc for determinism
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.unit_id.cmp(&b.1.unit_id))
        });
        scored.truncate(self.top_k);

        debug!(unit = unit_id, hits = scored.len(), "retrieved related summaries");
        Ok(scored.into_iter().map(|(_, s)| s).collect())
    }

    /// Embed and store the vector for `summary`. Returns whether a vector
    /// was written. Failures leave the summary without a vector.
    pub async fn index(&self, summary: &ContextSummary) -> bool {
        let content_hash = hasher::fingerprint(summary.summary.as_bytes());
        let model = self.embedder.model_name().to_string();

        let existing: Option<String> = sqlx::query_scalar(
            "SELECT content_hash FROM summary_vectors WHERE unit_id = ? AND model = ?",
        )
        .bind(&summary.unit_id)
        .bind(&model)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or(None);
        if existing.as_deref() == Some(content_hash.as_str()) {
            return false;
        }

        let vector = match embedding::embed_one(self.embedder.as_ref(), &summary.summary).await {
            Ok(v) => v,
            Err(e) => {
                warn!(unit = %summary.unit_id, error = %e, "failed to embed summary");
                return false;
            }
        };

        let result = sqlx::query(
            r#"
            INSERT INTO summary_vectors (unit_id, model, dims, content_hash, embedding)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(unit_id) DO UPDATE SET
                model = excluded.model,
                dims = excluded.dims,
                content_hash = excluded.content_hash,
                embedding = excluded.embedding
            "#,
        )
        .bind(&summary.unit_id)
        .bind(&model)
        .bind(vector.len() as i64)
        .bind(&content_hash)
        .bind(embedding::vec_to_blob(&vector))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => true,
            Err(e) => {
                warn!(unit = %summary.unit_id, error = %e, "failed to store summary vector");
                false
            }
        }
    }
}

/// True when `candidate` is `unit_id` or one of its sub-units.
fn belongs_to(candidate: &str, unit_id: &str) -> bool {
    candidate == unit_id
        || candidate
            .strip_prefix(unit_id)
            .is_some_and(|rest| rest.starts_with(UNIT_SEPARATOR))
}

/// Render retrieved summaries as prompt text, stopping before `max_chars`.
pub fn render_context(summaries: &[ContextSummary], max_chars: usize) -> String {
    let mut out = String::new();
    for s in summaries {
        let block = format!("### {}\n{}\n\n", s.unit_id, s.summary.trim());
        if out.len() + block.len() > max_chars {
            debug!("context budget reached");
            break;
        }
        out.push_str(&block);
    }
    out
}
