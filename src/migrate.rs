use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Creates the catalog schema. Idempotent.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // One row per distinct content hash, forever
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contents (
            id TEXT PRIMARY KEY,
            content_hash TEXT NOT NULL UNIQUE,
            perceptual_hash TEXT NOT NULL DEFAULT '',
            media_type TEXT NOT NULL,
            attributes_json TEXT NOT NULL DEFAULT 'null',
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // source_path uniqueness is enforced by the pipeline, not here
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS imports (
            id TEXT PRIMARY KEY,
            source_path TEXT NOT NULL,
            dest_path TEXT NOT NULL,
            content_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (content_id) REFERENCES contents(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_imports_source_path ON imports(source_path)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_imports_dest_path ON imports(dest_path)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_imports_content_id ON imports(content_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_contents_media_type ON contents(media_type)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_contents_perceptual_hash ON contents(perceptual_hash)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_contents_created_at ON contents(created_at DESC)")
        .execute(pool)
        .await?;

    Ok(())
}
