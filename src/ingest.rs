//! Ingestion pipeline orchestration.
//!
//! Each file walks the states `New → Analyzed → Fingerprinted → Cataloged →
//! Copied → Done`, or goes straight from `New` to `Ignored` when the catalog
//! already knows its source path or its name matches an ignore pattern. Any
//! error moves the file to `Failed` and aborts the whole run; nothing is
//! retried. Catalog records for a file are staged as one unit of work and
//! committed after the bytes are copied, so a failed file leaves nothing
//! visible in the catalog.

use std::path::{Path, PathBuf};

use anyhow::Context;
use globset::GlobSet;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, SqliteCatalog};
use crate::config::{Config, DuplicatePolicy, UnresolvedPolicy};
use crate::db;
use crate::error::{Error, Result};
use crate::event_log::{Action, EventLog};
use crate::fingerprint;
use crate::metadata::{self, MetadataExtractor};
use crate::migrate;
use crate::models::{ContentRecord, ImportLocation, ImportRecord, MediaClass};
use crate::traversal::Traversal;

/// Per-file pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    New,
    Analyzed,
    Fingerprinted,
    Cataloged,
    Copied,
    Done,
    Ignored,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    AlreadyImported,
    IgnorePattern,
}

/// Terminal result of a file that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ignored(IgnoreReason),
    /// Bytes copied, new content and import committed.
    Imported(ImportRecord),
    /// Known content recorded under a new source path without copying.
    Linked(ImportRecord),
}

/// Resolved settings for one run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub source_root: PathBuf,
    pub dest_root: PathBuf,
    pub ignore: GlobSet,
    pub max_nodes: u64,
    pub follow_symlinks: bool,
    pub unresolved: UnresolvedPolicy,
    pub on_duplicate: DuplicatePolicy,
}

impl IngestOptions {
    /// Resolve roots to absolute paths. The source root must exist; the
    /// destination root is created when missing, but only once it is known
    /// to lie outside the source root.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let source_root = std::fs::canonicalize(&config.archive.source_root).with_context(|| {
            format!(
                "Source root does not exist: {}",
                config.archive.source_root.display()
            )
        })?;
        let resolved = resolve_missing(&config.archive.dest_root).with_context(|| {
            format!(
                "Failed to resolve destination root: {}",
                config.archive.dest_root.display()
            )
        })?;
        if resolved.starts_with(&source_root) {
            anyhow::bail!(
                "destination root {} is inside source root {}",
                resolved.display(),
                source_root.display()
            );
        }

        std::fs::create_dir_all(&resolved).with_context(|| {
            format!(
                "Failed to create destination root: {}",
                resolved.display()
            )
        })?;
        let dest_root = std::fs::canonicalize(&resolved)?;

        Ok(Self {
            source_root,
            dest_root,
            ignore: config.traversal.ignore_set()?,
            max_nodes: config.traversal.max_nodes,
            follow_symlinks: config.traversal.follow_symlinks,
            unresolved: config.metadata.unresolved,
            on_duplicate: config.ingest.on_duplicate,
        })
    }
}

/// Counts for one traversal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub visited: u64,
    pub imported: u64,
    pub linked: u64,
    pub ignored: u64,
    pub limit_reached: bool,
}

/// Drives files through the pipeline against an injected catalog.
pub struct Ingestor<'a, C: Catalog> {
    catalog: &'a mut C,
    events: &'a mut EventLog,
    options: IngestOptions,
    extractor: MetadataExtractor,
}

impl<'a, C: Catalog> Ingestor<'a, C> {
    pub fn new(catalog: &'a mut C, events: &'a mut EventLog, options: IngestOptions) -> Self {
        let extractor = MetadataExtractor::new(options.unresolved);
        Self {
            catalog,
            events,
            options,
            extractor,
        }
    }

    /// Walk the source root and ingest every file, stopping at the first
    /// error or when the node ceiling is reached.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let root = text_of(&self.options.source_root)?.to_string();
        self.log(Action::Start, &[&root])?;

        let mut traversal = Traversal::new(
            &self.options.source_root,
            self.options.max_nodes,
            self.options.follow_symlinks,
        );
        let mut summary = RunSummary::default();

        for path in traversal.by_ref() {
            let path = path?;
            match self.ingest_file(&path).await? {
                Outcome::Ignored(_) => summary.ignored += 1,
                Outcome::Imported(_) => summary.imported += 1,
                Outcome::Linked(_) => summary.linked += 1,
            }
        }

        summary.visited = traversal.visited();
        summary.limit_reached = traversal.limit_reached();

        let visited = summary.visited.to_string();
        if summary.limit_reached {
            warn!(
                max_nodes = self.options.max_nodes,
                "node ceiling reached, rest of the tree left for the next run"
            );
            self.log(Action::Limit, &[&visited])?;
        } else {
            self.log(Action::Finish, &[&visited])?;
        }

        Ok(summary)
    }

    /// Take one file from `New` to a terminal state.
    pub async fn ingest_file(&mut self, path: &Path) -> Result<Outcome> {
        let source_path = text_of(path)?.to_string();
        self.transition(&source_path, FileState::New);

        let reason = if self.catalog.has_imported(&source_path).await? {
            Some(IgnoreReason::AlreadyImported)
        } else if self.matches_ignore(path) {
            Some(IgnoreReason::IgnorePattern)
        } else {
            None
        };
        if let Some(reason) = reason {
            self.transition(&source_path, FileState::Ignored);
            self.log(Action::Ignore, &[&source_path])?;
            return Ok(Outcome::Ignored(reason));
        }

        self.log(Action::Analysis, &[&source_path])?;

        match self.process(path, &source_path).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.transition(&source_path, FileState::Failed);
                if let Err(rollback_err) = self.catalog.rollback().await {
                    warn!(error = %rollback_err, "rollback after failure did not complete");
                }
                Err(err)
            }
        }
    }

    async fn process(&mut self, path: &Path, source_path: &str) -> Result<Outcome> {
        let class = metadata::classify(path)?;
        let meta = self.extractor.extract(path, class)?;
        self.transition(source_path, FileState::Analyzed);

        let content_hash = fingerprint::content_hash_file(path)?;
        let perceptual_hash = if class == MediaClass::Image {
            fingerprint::perceptual_hash(path)?
        } else {
            String::new()
        };
        self.transition(source_path, FileState::Fingerprinted);

        let dest = self.dest_path_for(path)?;
        let dest_path = text_of(&dest)?.to_string();

        let staged = self
            .catalog
            .create_content(
                &content_hash,
                &perceptual_hash,
                &meta.media_type,
                &meta.attributes,
            )
            .await;

        let content = match staged {
            Ok(content) => content,
            Err(Error::DuplicateContent {
                content_hash,
                existing_id,
                imports,
            }) if self.options.on_duplicate == DuplicatePolicy::Link => {
                return self
                    .link(path, source_path, &content_hash, &existing_id, imports, &dest)
                    .await;
            }
            Err(err) => return Err(err),
        };

        let import = self
            .catalog
            .create_import(&content, &dest_path, source_path)
            .await?;
        self.transition(source_path, FileState::Cataloged);

        copy_file(path, &dest).await?;
        self.transition(source_path, FileState::Copied);

        self.catalog.commit().await?;
        self.transition(source_path, FileState::Done);

        info!(source = %source_path, dest = %dest_path, hash = %content_hash, "imported");
        self.log(Action::Import, &[source_path, &dest_path, &content_hash])?;
        Ok(Outcome::Imported(import))
    }

    /// Record `source_path` against content already in the catalog. The
    /// import points at where the bytes already live; nothing is copied
    /// unless the content has never been placed anywhere.
    async fn link(
        &mut self,
        path: &Path,
        source_path: &str,
        content_hash: &str,
        existing_id: &str,
        imports: Vec<ImportLocation>,
        dest: &Path,
    ) -> Result<Outcome> {
        let content: ContentRecord = self
            .catalog
            .find_content(content_hash)
            .await?
            .ok_or_else(|| Error::DuplicateContent {
                content_hash: content_hash.to_string(),
                existing_id: existing_id.to_string(),
                imports: imports.clone(),
            })?;

        let dest_path = match imports.first() {
            Some(prior) => prior.dest_path.clone(),
            None => {
                copy_file(path, dest).await?;
                text_of(dest)?.to_string()
            }
        };

        let import = self
            .catalog
            .create_import(&content, &dest_path, source_path)
            .await?;
        self.transition(source_path, FileState::Cataloged);

        self.catalog.commit().await?;
        self.transition(source_path, FileState::Done);

        info!(source = %source_path, dest = %dest_path, hash = %content_hash, "linked to existing content");
        self.log(Action::Link, &[source_path, &dest_path, content_hash])?;
        Ok(Outcome::Linked(import))
    }

    fn matches_ignore(&self, path: &Path) -> bool {
        path.file_name()
            .map(|name| {
                self.options
                    .ignore
                    .is_match(name.to_string_lossy().to_lowercase())
            })
            .unwrap_or(false)
    }

    /// Re-root `path` from the source root under the destination root.
    fn dest_path_for(&self, path: &Path) -> Result<PathBuf> {
        let relative =
            path.strip_prefix(&self.options.source_root)
                .map_err(|_| Error::PathOutsideRoot {
                    path: path.to_path_buf(),
                    root: self.options.source_root.clone(),
                })?;
        Ok(self.options.dest_root.join(relative))
    }

    fn transition(&self, source_path: &str, state: FileState) {
        debug!(path = %source_path, state = ?state, "transition");
    }

    fn log(&mut self, action: Action, fields: &[&str]) -> Result<()> {
        self.events.record(action, fields).map_err(Error::EventLog)
    }
}

/// Canonicalize a path that may not exist yet: the deepest existing
/// ancestor is resolved (symlinks included) and the missing tail appended.
fn resolve_missing(path: &Path) -> std::io::Result<PathBuf> {
    let mut existing = std::path::absolute(path)?;
    let mut tail = Vec::new();
    loop {
        match std::fs::canonicalize(&existing) {
            Ok(mut resolved) => {
                resolved.extend(tail.iter().rev());
                return Ok(resolved);
            }
            Err(err) => {
                let name = existing.file_name().map(|n| n.to_os_string());
                match (name, existing.parent()) {
                    (Some(name), Some(parent)) => {
                        tail.push(name);
                        existing = parent.to_path_buf();
                    }
                    _ => return Err(err),
                }
            }
        }
    }
}

fn text_of(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| Error::NonUtf8Path(path.to_path_buf()))
}

async fn copy_file(src: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::io(parent, e))?;
    }
    tokio::fs::copy(src, dest)
        .await
        .map_err(|e| Error::io(dest, e))?;
    Ok(())
}

/// CLI entry point for `ftrack run`.
pub async fn run_ingest(config: &Config) -> anyhow::Result<()> {
    let options = IngestOptions::from_config(config)?;

    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let mut catalog = SqliteCatalog::new(pool.clone());
    let mut events = EventLog::open(&config.log.path)?;

    let source = options.source_root.display().to_string();
    let dest = options.dest_root.display().to_string();
    let max_nodes = options.max_nodes;

    let result = Ingestor::new(&mut catalog, &mut events, options).run().await;
    drop(catalog);
    pool.close().await;
    let summary = result?;

    println!("run {} -> {}", source, dest);
    println!("  visited nodes: {}", summary.visited);
    println!("  imported: {}", summary.imported);
    println!("  linked: {}", summary.linked);
    println!("  ignored: {}", summary.ignored);
    if summary.limit_reached {
        println!("  node ceiling reached: {} (rerun to continue)", max_nodes);
    }
    println!("ok");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use globset::{Glob, GlobSetBuilder};
    use std::fs;
    use tempfile::TempDir;

    fn options(tmp: &TempDir) -> IngestOptions {
        let source_root = tmp.path().join("src");
        let dest_root = tmp.path().join("dst");
        fs::create_dir_all(&source_root).unwrap();
        fs::create_dir_all(&dest_root).unwrap();
        let mut ignore = GlobSetBuilder::new();
        ignore.add(Glob::new("thumbs.db").unwrap());
        IngestOptions {
            source_root,
            dest_root,
            ignore: ignore.build().unwrap(),
            max_nodes: 1_000,
            follow_symlinks: false,
            unresolved: UnresolvedPolicy::Fail,
            on_duplicate: DuplicatePolicy::Fail,
        }
    }

    fn config(source_root: &Path, dest_root: &Path) -> Config {
        let mut config: Config = toml::from_str(
            "[db]\npath = \"catalog.sqlite\"\n[archive]\nsource_root = \".\"\ndest_root = \".\"\n",
        )
        .unwrap();
        config.archive.source_root = source_root.to_path_buf();
        config.archive.dest_root = dest_root.to_path_buf();
        config
    }

    #[test]
    fn missing_dest_root_is_created() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("photos");
        fs::create_dir_all(&source).unwrap();
        let dest = tmp.path().join("archive").join("photos");

        let opts = IngestOptions::from_config(&config(&source, &dest)).unwrap();
        assert!(dest.is_dir());
        assert_eq!(opts.dest_root, fs::canonicalize(&dest).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn dest_reached_through_symlink_into_source_is_not_created() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("photos");
        fs::create_dir_all(&source).unwrap();
        let link = tmp.path().join("link");
        std::os::unix::fs::symlink(&source, &link).unwrap();

        let dest = link.join("archive").join("2009");
        let err = IngestOptions::from_config(&config(&source, &dest)).unwrap_err();
        assert!(err.to_string().contains("inside source root"), "{err}");
        assert!(!source.join("archive").exists());
    }

    #[tokio::test]
    async fn dest_path_mirrors_source_layout() {
        let tmp = TempDir::new().unwrap();
        let opts = options(&tmp);
        let mut catalog = MemoryCatalog::new();
        let mut events = EventLog::sink();
        let ingestor = Ingestor::new(&mut catalog, &mut events, opts.clone());

        let dest = ingestor
            .dest_path_for(&opts.source_root.join("2009").join("trip").join("a.mov"))
            .unwrap();
        assert_eq!(dest, opts.dest_root.join("2009").join("trip").join("a.mov"));

        let outside = ingestor.dest_path_for(Path::new("/elsewhere/a.mov"));
        assert!(matches!(outside, Err(Error::PathOutsideRoot { .. })));
    }

    #[tokio::test]
    async fn ignore_pattern_matches_any_case() {
        let tmp = TempDir::new().unwrap();
        let opts = options(&tmp);
        let path = opts.source_root.join("Thumbs.DB");
        fs::write(&path, b"cache").unwrap();

        let mut catalog = MemoryCatalog::new();
        let mut events = EventLog::sink();
        let outcome = Ingestor::new(&mut catalog, &mut events, opts)
            .ingest_file(&path)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Ignored(IgnoreReason::IgnorePattern));
        assert!(catalog.contents().is_empty());
    }

    #[tokio::test]
    async fn copy_failure_rolls_back_staged_records() {
        let tmp = TempDir::new().unwrap();
        let opts = options(&tmp);
        let path = opts.source_root.join("clip.vob");
        fs::write(&path, b"\x00\x00\x01\xba").unwrap();
        // A file where the destination directory should be makes the copy fail.
        fs::remove_dir(&opts.dest_root).unwrap();
        fs::write(&opts.dest_root, b"in the way").unwrap();

        let mut catalog = MemoryCatalog::new();
        let mut events = EventLog::sink();
        let err = Ingestor::new(&mut catalog, &mut events, opts)
            .ingest_file(&path)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert!(!catalog.has_staged());
        assert!(catalog.contents().is_empty());
        assert!(catalog.imports().is_empty());
    }
}
