//! Catalog abstraction for the tracker.
//!
//! The [`Catalog`] trait is the only place that decides whether a source path
//! was already handled and whether a piece of content is already stored. The
//! rest of the system keeps no state between runs; restart safety reduces to
//! trusting the catalog.
//!
//! Creations are staged into a unit of work and only become visible to later
//! runs once [`commit`](Catalog::commit) succeeds. Reads made while a unit of
//! work is open see its staged records.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Attributes, ContentRecord, ImportLocation, ImportRecord};

pub use memory::MemoryCatalog;
pub use sqlite::SqliteCatalog;

/// Durable, transactional store of content and import records.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`has_imported`](Catalog::has_imported) | Idempotency check on a source path |
/// | [`find_content`](Catalog::find_content) | Look up content by hash |
/// | [`imports_of`](Catalog::imports_of) | Where a piece of content landed |
/// | [`create_content`](Catalog::create_content) | Stage new content, failing on a known hash |
/// | [`create_import`](Catalog::create_import) | Stage a source to destination placement |
/// | [`commit`](Catalog::commit) | Persist the unit of work atomically |
/// | [`rollback`](Catalog::rollback) | Discard the unit of work |
#[async_trait]
pub trait Catalog: Send {
    /// True iff an import with exactly this source path exists. No side effects.
    async fn has_imported(&mut self, source_path: &str) -> Result<bool>;

    async fn find_content(&mut self, content_hash: &str) -> Result<Option<ContentRecord>>;

    async fn imports_of(&mut self, content_id: &str) -> Result<Vec<ImportLocation>>;

    /// Stage a new content record.
    ///
    /// Fails with [`Error::DuplicateContent`](crate::error::Error::DuplicateContent)
    /// when the hash is already catalogued; the existing record is never
    /// returned in its place.
    async fn create_content(
        &mut self,
        content_hash: &str,
        perceptual_hash: &str,
        media_type: &str,
        attributes: &Attributes,
    ) -> Result<ContentRecord>;

    /// Stage an import linked to `content`. The caller has already checked
    /// [`has_imported`](Catalog::has_imported).
    async fn create_import(
        &mut self,
        content: &ContentRecord,
        dest_path: &str,
        source_path: &str,
    ) -> Result<ImportRecord>;

    /// Persist everything staged since the last commit. On failure none of
    /// it is visible afterwards.
    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;
}
