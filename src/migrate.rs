use anyhow::Result;
use sqlx::SqlitePool;

/// Create the state tables. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Cache store: one row per scanned file
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS file_records (
            path TEXT PRIMARY KEY,
            fingerprint TEXT NOT NULL,
            processed_at INTEGER NOT NULL,
            content TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Knowledge accumulator: one row per documented unit (file or class)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS context_summaries (
            unit_id TEXT PRIMARY KEY,
            summary TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Embedding vectors for summaries, keyed by unit
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS summary_vectors (
            unit_id TEXT PRIMARY KEY,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            content_hash TEXT NOT NULL,
            embedding BLOB NOT NULL,
            FOREIGN KEY (unit_id) REFERENCES context_summaries(unit_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_file_records_processed_at ON file_records(processed_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
