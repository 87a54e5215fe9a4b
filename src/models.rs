//! Core data models used throughout the tracker.
//!
//! These types represent the catalogued content, the imports that placed it
//! into the archive, and the metadata that flows from the extractor into the
//! catalog.

use std::collections::BTreeMap;

use serde::Serialize;

/// One distinct piece of content ever ingested, keyed by its content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentRecord {
    pub id: String,
    pub content_hash: String,
    /// Empty for non-image content.
    pub perceptual_hash: String,
    pub media_type: String,
    pub attributes_json: String,
    pub created_at: i64,
}

/// One placement of a source path into the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRecord {
    pub id: String,
    pub source_path: String,
    pub dest_path: String,
    pub content_id: String,
    pub created_at: i64,
}

/// Where a piece of content previously landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportLocation {
    pub source_path: String,
    pub dest_path: String,
}

impl From<&ImportRecord> for ImportLocation {
    fn from(record: &ImportRecord) -> Self {
        Self {
            source_path: record.source_path.clone(),
            dest_path: record.dest_path.clone(),
        }
    }
}

/// Whitelisted category of a file, decided by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaClass {
    Image,
    Video,
    Audio,
    Other,
}

impl MediaClass {
    const IMAGE: &'static [&'static str] = &[".png", ".jpg", ".jpeg", ".gif", ".nef", ".pef"];
    const VIDEO: &'static [&'static str] = &[
        ".mov", ".avi", ".wmv", ".mpg", ".mpeg", ".bup", ".ifo", ".vob", ".mp4",
    ];
    const AUDIO: &'static [&'static str] = &[".mp3", ".wav", ".wma", ".ogg"];
    const OTHER: &'static [&'static str] = &[".pps", ".ppt", ".pptx", ".odt", ".iso", ".txt"];

    /// Classifies a lowercased, dot-prefixed extension. `None` means the
    /// extension is outside the whitelist.
    pub fn from_extension(ext: &str) -> Option<Self> {
        [
            (MediaClass::Image, Self::IMAGE),
            (MediaClass::Video, Self::VIDEO),
            (MediaClass::Audio, Self::AUDIO),
            (MediaClass::Other, Self::OTHER),
        ]
        .into_iter()
        .find(|(_, exts)| exts.contains(&ext))
        .map(|(class, _)| class)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaClass::Image => "image",
            MediaClass::Video => "video",
            MediaClass::Audio => "audio",
            MediaClass::Other => "other",
        }
    }
}

/// Extracted attribute map: field identifier to its text values.
///
/// Keys are kept sorted so serialization is deterministic.
pub type AttributeMap = BTreeMap<String, Vec<String>>;

/// Attributes as handed to the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attributes {
    /// A structural parser ran and produced these fields.
    Parsed(AttributeMap),
    /// The media type came from the fallback table; nothing was parsed.
    Unparsed,
}

impl Attributes {
    /// Serialized form stored in the catalog. `Unparsed` becomes `null`.
    pub fn to_json(&self) -> String {
        match self {
            Attributes::Parsed(map) => {
                serde_json::to_string(map).unwrap_or_else(|_| "null".to_string())
            }
            Attributes::Unparsed => "null".to_string(),
        }
    }
}

/// Output of the metadata extractor for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMetadata {
    pub media_type: String,
    pub attributes: Attributes,
}
