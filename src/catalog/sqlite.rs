//! SQLite-backed [`Catalog`] implementation.
//!
//! The unit of work is a single [`sqlx::Transaction`], opened lazily by the
//! first staged creation and closed by `commit` or `rollback`. Dropping the
//! catalog with an open unit of work rolls it back.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Attributes, ContentRecord, ImportLocation, ImportRecord};

use super::Catalog;

/// SQLite implementation of the [`Catalog`] trait.
pub struct SqliteCatalog {
    pool: SqlitePool,
    tx: Option<Transaction<'static, Sqlite>>,
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool, tx: None }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn unit_of_work(&mut self) -> Result<&mut Transaction<'static, Sqlite>> {
        let tx = match self.tx.take() {
            Some(tx) => tx,
            None => self.pool.begin().await?,
        };
        Ok(self.tx.insert(tx))
    }
}

pub(crate) fn content_from_row(row: &SqliteRow) -> ContentRecord {
    ContentRecord {
        id: row.get("id"),
        content_hash: row.get("content_hash"),
        perceptual_hash: row.get("perceptual_hash"),
        media_type: row.get("media_type"),
        attributes_json: row.get("attributes_json"),
        created_at: row.get("created_at"),
    }
}

async fn count_imports<'c, E>(executor: E, source_path: &str) -> sqlx::Result<i64>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_scalar("SELECT COUNT(*) FROM imports WHERE source_path = ?")
        .bind(source_path)
        .fetch_one(executor)
        .await
}

async fn fetch_content<'c, E>(executor: E, content_hash: &str) -> sqlx::Result<Option<ContentRecord>>
where
    E: Executor<'c, Database = Sqlite>,
{
    let row = sqlx::query(
        "SELECT id, content_hash, perceptual_hash, media_type, attributes_json, created_at \
         FROM contents WHERE content_hash = ?",
    )
    .bind(content_hash)
    .fetch_optional(executor)
    .await?;

    Ok(row.as_ref().map(content_from_row))
}

async fn fetch_imports<'c, E>(executor: E, content_id: &str) -> sqlx::Result<Vec<ImportLocation>>
where
    E: Executor<'c, Database = Sqlite>,
{
    let rows = sqlx::query(
        "SELECT source_path, dest_path FROM imports WHERE content_id = ? ORDER BY created_at ASC, rowid ASC",
    )
    .bind(content_id)
    .fetch_all(executor)
    .await?;

    Ok(rows
        .iter()
        .map(|row| ImportLocation {
            source_path: row.get("source_path"),
            dest_path: row.get("dest_path"),
        })
        .collect())
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn has_imported(&mut self, source_path: &str) -> Result<bool> {
        let count = match self.tx.as_mut() {
            Some(tx) => count_imports(&mut **tx, source_path).await?,
            None => count_imports(&self.pool, source_path).await?,
        };
        Ok(count > 0)
    }

    async fn find_content(&mut self, content_hash: &str) -> Result<Option<ContentRecord>> {
        let content = match self.tx.as_mut() {
            Some(tx) => fetch_content(&mut **tx, content_hash).await?,
            None => fetch_content(&self.pool, content_hash).await?,
        };
        Ok(content)
    }

    async fn imports_of(&mut self, content_id: &str) -> Result<Vec<ImportLocation>> {
        let imports = match self.tx.as_mut() {
            Some(tx) => fetch_imports(&mut **tx, content_id).await?,
            None => fetch_imports(&self.pool, content_id).await?,
        };
        Ok(imports)
    }

    async fn create_content(
        &mut self,
        content_hash: &str,
        perceptual_hash: &str,
        media_type: &str,
        attributes: &Attributes,
    ) -> Result<ContentRecord> {
        if let Some(existing) = self.find_content(content_hash).await? {
            let imports = self.imports_of(&existing.id).await?;
            return Err(Error::DuplicateContent {
                content_hash: content_hash.to_string(),
                existing_id: existing.id,
                imports,
            });
        }

        let record = ContentRecord {
            id: Uuid::new_v4().to_string(),
            content_hash: content_hash.to_string(),
            perceptual_hash: perceptual_hash.to_string(),
            media_type: media_type.to_string(),
            attributes_json: attributes.to_json(),
            created_at: chrono::Utc::now().timestamp(),
        };

        let tx = self.unit_of_work().await?;
        sqlx::query(
            r#"
            INSERT INTO contents (id, content_hash, perceptual_hash, media_type, attributes_json, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.content_hash)
        .bind(&record.perceptual_hash)
        .bind(&record.media_type)
        .bind(&record.attributes_json)
        .bind(record.created_at)
        .execute(&mut **tx)
        .await?;

        Ok(record)
    }

    async fn create_import(
        &mut self,
        content: &ContentRecord,
        dest_path: &str,
        source_path: &str,
    ) -> Result<ImportRecord> {
        let record = ImportRecord {
            id: Uuid::new_v4().to_string(),
            source_path: source_path.to_string(),
            dest_path: dest_path.to_string(),
            content_id: content.id.clone(),
            created_at: chrono::Utc::now().timestamp(),
        };

        let tx = self.unit_of_work().await?;
        sqlx::query(
            "INSERT INTO imports (id, source_path, dest_path, content_id, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.source_path)
        .bind(&record.dest_path)
        .bind(&record.content_id)
        .bind(record.created_at)
        .execute(&mut **tx)
        .await?;

        Ok(record)
    }

    async fn commit(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}
