//! In-memory [`Catalog`] implementation for tests.
//!
//! Committed and staged records live in plain vectors. Reads see both, the
//! same way a transaction sees its own writes. Commit failures can be
//! injected to exercise the all-or-nothing path.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Attributes, ContentRecord, ImportLocation, ImportRecord};

use super::Catalog;

#[derive(Default)]
struct Records {
    contents: Vec<ContentRecord>,
    imports: Vec<ImportRecord>,
}

/// In-memory catalog for tests.
#[derive(Default)]
pub struct MemoryCatalog {
    committed: Records,
    staged: Records,
    fail_commits: bool,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `commit` fail with a persistence error.
    pub fn fail_commits(&mut self, fail: bool) {
        self.fail_commits = fail;
    }

    pub fn contents(&self) -> &[ContentRecord] {
        &self.committed.contents
    }

    pub fn imports(&self) -> &[ImportRecord] {
        &self.committed.imports
    }

    pub fn has_staged(&self) -> bool {
        !self.staged.contents.is_empty() || !self.staged.imports.is_empty()
    }

    fn all_contents(&self) -> impl Iterator<Item = &ContentRecord> {
        self.committed.contents.iter().chain(&self.staged.contents)
    }

    fn all_imports(&self) -> impl Iterator<Item = &ImportRecord> {
        self.committed.imports.iter().chain(&self.staged.imports)
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn has_imported(&mut self, source_path: &str) -> Result<bool> {
        Ok(self.all_imports().any(|i| i.source_path == source_path))
    }

    async fn find_content(&mut self, content_hash: &str) -> Result<Option<ContentRecord>> {
        Ok(self
            .all_contents()
            .find(|c| c.content_hash == content_hash)
            .cloned())
    }

    async fn imports_of(&mut self, content_id: &str) -> Result<Vec<ImportLocation>> {
        Ok(self
            .all_imports()
            .filter(|i| i.content_id == content_id)
            .map(ImportLocation::from)
            .collect())
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
        self.staged.contents.push(record.clone());
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
        self.staged.imports.push(record.clone());
        Ok(record)
    }

    async fn commit(&mut self) -> Result<()> {
        let staged = std::mem::take(&mut self.staged);
        if self.fail_commits {
            return Err(Error::Persistence(sqlx::Error::Protocol(
                "injected commit failure".to_string(),
            )));
        }
        self.committed.contents.extend(staged.contents);
        self.committed.imports.extend(staged.imports);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.staged = Records::default();
        Ok(())
    }
}
