//! Error taxonomy for the ingestion core.
//!
//! Every variant is fatal for the current run: the pipeline never retries
//! or skips on error, it propagates to the driver which stops traversal.
//! Files committed before the failure stay durably recorded.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::ImportLocation;

#[derive(Error, Debug)]
pub enum Error {
    /// Content with this hash is already catalogued.
    #[error("duplicate content {content_hash} (content id {existing_id}){}", PriorImports(.imports))]
    DuplicateContent {
        content_hash: String,
        existing_id: String,
        imports: Vec<ImportLocation>,
    },

    #[error("unsupported file extension '{extension}': {}", .path.display())]
    UnsupportedExtension { path: PathBuf, extension: String },

    #[error("no parser and no fallback media type for '{extension}': {}", .path.display())]
    UnresolvedMetadata { path: PathBuf, extension: String },

    #[error("catalog persistence failed: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("perceptual hash failed for {}: {reason}", .path.display())]
    PerceptualHash { path: PathBuf, reason: String },

    #[error("{} is not under source root {}", .path.display(), .root.display())]
    PathOutsideRoot { path: PathBuf, root: PathBuf },

    #[error("path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    #[error("failed to write event log: {0}")]
    EventLog(#[source] std::io::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Renders the prior landing places of a duplicate, one per line.
struct PriorImports<'a>(&'a [ImportLocation]);

impl fmt::Display for PriorImports<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for import in self.0 {
            write!(
                f,
                "\n  source: {}\n  dest:   {}",
                import.source_path, import.dest_path
            )?;
        }
        Ok(())
    }
}
