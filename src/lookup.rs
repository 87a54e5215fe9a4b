//! Read-only catalog queries.
//!
//! `ftrack show` resolves a content hash or a source path to the content
//! record and every import of it. `ftrack similar` scans image content for
//! perceptual hashes within a Hamming distance of a given hash.

use anyhow::{bail, Result};
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::catalog::sqlite::content_from_row;
use crate::config::Config;
use crate::db;
use crate::fingerprint;
use crate::models::{ContentRecord, ImportRecord};
use crate::stats::format_ts_iso;

/// A content record together with every place it was imported from.
#[derive(Debug, Clone, Serialize)]
pub struct ContentDetail {
    pub content: ContentRecord,
    pub imports: Vec<ImportRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimilarMatch {
    pub distance: u32,
    pub content: ContentRecord,
}

/// Default Hamming radius for `ftrack similar`.
pub const DEFAULT_MAX_DISTANCE: u32 = 8;

/// Resolve `key` as a content hash first, then as a source path.
pub async fn find_detail(pool: &SqlitePool, key: &str) -> Result<Option<ContentDetail>> {
    let row = sqlx::query(
        "SELECT id, content_hash, perceptual_hash, media_type, attributes_json, created_at \
         FROM contents WHERE content_hash = ?",
    )
    .bind(key)
    .fetch_optional(pool)
    .await?;

    let row = match row {
        Some(row) => Some(row),
        None => {
            sqlx::query(
                "SELECT c.id, c.content_hash, c.perceptual_hash, c.media_type, c.attributes_json, c.created_at \
                 FROM contents c JOIN imports i ON i.content_id = c.id \
                 WHERE i.source_path = ? LIMIT 1",
            )
            .bind(key)
            .fetch_optional(pool)
            .await?
        }
    };

    let content = match row {
        Some(row) => content_from_row(&row),
        None => return Ok(None),
    };

    let import_rows = sqlx::query(
        "SELECT id, source_path, dest_path, content_id, created_at FROM imports \
         WHERE content_id = ? ORDER BY created_at ASC, rowid ASC",
    )
    .bind(&content.id)
    .fetch_all(pool)
    .await?;

    let imports = import_rows
        .iter()
        .map(|row| ImportRecord {
            id: row.get("id"),
            source_path: row.get("source_path"),
            dest_path: row.get("dest_path"),
            content_id: row.get("content_id"),
            created_at: row.get("created_at"),
        })
        .collect();

    Ok(Some(ContentDetail { content, imports }))
}

/// Image content whose perceptual hash is within `max_distance` bits of
/// `target`, nearest first.
pub async fn find_similar(
    pool: &SqlitePool,
    target: &str,
    max_distance: u32,
) -> Result<Vec<SimilarMatch>> {
    if fingerprint::hamming_distance(target, target).is_none() {
        bail!("not a perceptual hash: {}", target);
    }

    let rows = sqlx::query(
        "SELECT id, content_hash, perceptual_hash, media_type, attributes_json, created_at \
         FROM contents WHERE perceptual_hash != ''",
    )
    .fetch_all(pool)
    .await?;

    let mut matches: Vec<SimilarMatch> = rows
        .iter()
        .map(content_from_row)
        .filter_map(|content| {
            let distance = fingerprint::hamming_distance(target, &content.perceptual_hash)?;
            (distance <= max_distance).then_some(SimilarMatch { distance, content })
        })
        .collect();

    matches.sort_by(|a, b| {
        a.distance
            .cmp(&b.distance)
            .then_with(|| a.content.content_hash.cmp(&b.content.content_hash))
    });
    Ok(matches)
}

/// CLI entry point for `ftrack show`.
pub async fn run_show(config: &Config, key: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let detail = find_detail(&pool, key).await;
    pool.close().await;

    let detail = match detail? {
        Some(d) => d,
        None => bail!("no content or import matches: {}", key),
    };

    let content = &detail.content;
    println!("--- Content ---");
    println!("id:              {}", content.id);
    println!("content_hash:    {}", content.content_hash);
    if !content.perceptual_hash.is_empty() {
        println!("perceptual_hash: {}", content.perceptual_hash);
    }
    println!("media_type:      {}", content.media_type);
    println!("created_at:      {}", format_ts_iso(content.created_at));
    println!("attributes:      {}", content.attributes_json);
    println!();

    println!("--- Imports ({}) ---", detail.imports.len());
    for import in &detail.imports {
        println!("[{}]", format_ts_iso(import.created_at));
        println!("  source: {}", import.source_path);
        println!("  dest:   {}", import.dest_path);
    }

    Ok(())
}

/// CLI entry point for `ftrack similar`.
pub async fn run_similar(config: &Config, target: &str, max_distance: u32) -> Result<()> {
    let pool = db::connect(config).await?;
    let matches = find_similar(&pool, target, max_distance).await;
    pool.close().await;
    let matches = matches?;

    if matches.is_empty() {
        println!("No similar images within distance {}.", max_distance);
        return Ok(());
    }

    println!("{:>4}  {:<16}  {:<40}  MEDIA TYPE", "DIST", "PHASH", "CONTENT HASH");
    for m in &matches {
        println!(
            "{:>4}  {:<16}  {:<40}  {}",
            m.distance, m.content.perceptual_hash, m.content.content_hash, m.content.media_type
        );
    }

    Ok(())
}
