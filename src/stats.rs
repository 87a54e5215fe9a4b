//! Catalog statistics and health overview.
//!
//! Provides a quick summary of what's archived: content and import counts,
//! how much content is image-like (has a perceptual hash), and a per media
//! type breakdown. Used by `ftrack stats` to confirm reruns are progressing.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;

/// Per media type breakdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTypeStats {
    pub media_type: String,
    pub content_count: i64,
    pub import_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogStats {
    pub contents: i64,
    pub imports: i64,
    pub with_perceptual_hash: i64,
    pub last_import_ts: Option<i64>,
    pub by_media_type: Vec<MediaTypeStats>,
}

pub async fn collect(pool: &SqlitePool) -> Result<CatalogStats> {
    let contents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contents")
        .fetch_one(pool)
        .await?;

    let imports: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM imports")
        .fetch_one(pool)
        .await?;

    let with_perceptual_hash: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM contents WHERE perceptual_hash != ''")
            .fetch_one(pool)
            .await?;

    let last_import_ts: Option<i64> = sqlx::query_scalar("SELECT MAX(created_at) FROM imports")
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query(
        r#"
        SELECT
            c.media_type,
            COUNT(DISTINCT c.id) AS content_count,
            COUNT(i.id) AS import_count
        FROM contents c
        LEFT JOIN imports i ON i.content_id = c.id
        GROUP BY c.media_type
        ORDER BY content_count DESC, c.media_type ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let by_media_type = rows
        .iter()
        .map(|row| MediaTypeStats {
            media_type: row.get("media_type"),
            content_count: row.get("content_count"),
            import_count: row.get("import_count"),
        })
        .collect();

    Ok(CatalogStats {
        contents,
        imports,
        with_perceptual_hash,
        last_import_ts,
        by_media_type,
    })
}

/// Run the stats command: query the catalog and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let stats = collect(&pool).await?;
    pool.close().await;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("File Tracker Catalog Stats");
    println!("==========================");
    println!();
    println!("  Catalog:     {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Contents:    {}", stats.contents);
    println!("  Imports:     {}", stats.imports);
    println!("  Images:      {}", stats.with_perceptual_hash);
    println!(
        "  Last import: {}",
        match stats.last_import_ts {
            Some(ts) => format_ts_relative(ts),
            None => "never".to_string(),
        }
    );

    if !stats.by_media_type.is_empty() {
        println!();
        println!("  By media type:");
        println!("  {:<32} {:>8} {:>8}", "MEDIA TYPE", "CONTENTS", "IMPORTS");
        println!("  {}", "-".repeat(50));
        for s in &stats.by_media_type {
            println!(
                "  {:<32} {:>8} {:>8}",
                s.media_type, s.content_count, s.import_count
            );
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

pub(crate) fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
