//! Media type and attribute extraction.
//!
//! Extension gate first: anything outside the [`MediaClass`] whitelist is an
//! [`Error::UnsupportedExtension`]. Then a structural parser is chosen by
//! class (`image` for pictures, `lofty` for audio). Files no parser reads are
//! identified by their leading bytes with `infer`, accepting only signatures
//! that agree with the class (an MPEG stream for a video, an OLE2 or ZIP
//! document for an office file, an ISO 9660 volume for a disc image). When
//! nothing matches, a small fixed table of extension guesses supplies the
//! media type with no attributes. When that table has no entry either, the
//! configured [`UnresolvedPolicy`] decides.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use image::ImageReader;
use infer::{Infer, MatcherType};
use lofty::file::{AudioFile, FileType, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::Accessor;
use tracing::{debug, warn};

use crate::config::UnresolvedPolicy;
use crate::error::{Error, Result};
use crate::models::{AttributeMap, Attributes, ExtractedMetadata, MediaClass};

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Extension guesses used when no structural parser reads the file.
const FALLBACK_MEDIA_TYPES: &[(&str, &str)] = &[
    (".mov", "video/quicktime"),
    (".mpg", "video/mpeg"),
    (".jpg", "image/jpeg"),
    (".bup", "video/dvd"),
    (".vob", "video/dvd"),
    (".ifo", "video/dvd"),
];

/// Bytes read for signature sniffing, enough to reach the first ISO 9660
/// volume descriptor at offset 0x8001.
const SNIFF_LEN: u64 = 0x8800;

const ISO9660_MIME: &str = "application/x-iso9660-image";
const ASF_VIDEO_MIME: &str = "video/x-ms-wmv";
const ASF_AUDIO_MIME: &str = "audio/x-ms-wma";
const PLAIN_TEXT_MIME: &str = "text/plain";

/// Extensions whose files may be identified as plain text.
const TEXT_EXTENSIONS: &[&str] = &[".txt"];

/// Lowercased, dot-prefixed extension of `path`, or empty when it has none.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Whitelist check. Returns the class or [`Error::UnsupportedExtension`].
pub fn classify(path: &Path) -> Result<MediaClass> {
    let extension = extension_of(path);
    MediaClass::from_extension(&extension).ok_or_else(|| Error::UnsupportedExtension {
        path: path.to_path_buf(),
        extension,
    })
}

pub fn fallback_media_type(extension: &str) -> Option<&'static str> {
    FALLBACK_MEDIA_TYPES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, media_type)| *media_type)
}

pub struct MetadataExtractor {
    unresolved: UnresolvedPolicy,
}

impl MetadataExtractor {
    pub fn new(unresolved: UnresolvedPolicy) -> Self {
        Self { unresolved }
    }

    pub fn extract(&self, path: &Path, class: MediaClass) -> Result<ExtractedMetadata> {
        let parsed = match class {
            MediaClass::Image => parse_image(path),
            MediaClass::Audio => parse_audio(path),
            MediaClass::Video | MediaClass::Other => None,
        }
        .or_else(|| sniff(path, class));

        if let Some((media_type, attributes)) = parsed {
            return Ok(ExtractedMetadata {
                media_type,
                attributes: Attributes::Parsed(attributes),
            });
        }

        let extension = extension_of(path);
        debug!(
            path = %path.display(),
            class = class.as_str(),
            %extension,
            "content not identified, using fallback table"
        );

        if let Some(media_type) = fallback_media_type(&extension) {
            return Ok(ExtractedMetadata {
                media_type: media_type.to_string(),
                attributes: Attributes::Unparsed,
            });
        }

        match self.unresolved {
            UnresolvedPolicy::Fail => Err(Error::UnresolvedMetadata {
                path: path.to_path_buf(),
                extension,
            }),
            UnresolvedPolicy::OctetStream => {
                warn!(
                    path = %path.display(),
                    %extension,
                    "media type unresolved, recording as {}",
                    OCTET_STREAM
                );
                Ok(ExtractedMetadata {
                    media_type: OCTET_STREAM.to_string(),
                    attributes: Attributes::Unparsed,
                })
            }
        }
    }
}

/// Adds `value` under `key` unless it is empty after trimming.
fn push<V: ToString>(map: &mut AttributeMap, key: &str, value: Option<V>) {
    if let Some(value) = value {
        let text = value.to_string().trim().to_string();
        if !text.is_empty() {
            map.entry(key.to_string()).or_default().push(text);
        }
    }
}

fn parse_image(path: &Path) -> Option<(String, AttributeMap)> {
    let reader = ImageReader::open(path).ok()?.with_guessed_format().ok()?;
    let format = reader.format()?;
    let (width, height) = reader.into_dimensions().ok()?;
    let media_type = format.to_mime_type().to_string();

    let mut attributes = AttributeMap::new();
    push(&mut attributes, "format", Some(format!("{:?}", format)));
    push(&mut attributes, "width", Some(width));
    push(&mut attributes, "height", Some(height));
    push(&mut attributes, "mime_type", Some(&media_type));

    Some((media_type, attributes))
}

fn parse_audio(path: &Path) -> Option<(String, AttributeMap)> {
    let tagged = Probe::open(path)
        .ok()?
        .guess_file_type()
        .ok()?
        .read()
        .ok()?;

    let media_type = audio_mime_type(tagged.file_type())?.to_string();
    let properties = tagged.properties();

    let mut attributes = AttributeMap::new();
    push(&mut attributes, "mime_type", Some(&media_type));
    push(
        &mut attributes,
        "duration_ms",
        Some(properties.duration().as_millis()),
    );
    push(&mut attributes, "bitrate", properties.audio_bitrate());
    push(&mut attributes, "sample_rate", properties.sample_rate());
    push(&mut attributes, "channels", properties.channels());

    if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
        push(&mut attributes, "title", tag.title());
        push(&mut attributes, "artist", tag.artist());
        push(&mut attributes, "album", tag.album());
        push(&mut attributes, "genre", tag.genre());
        push(&mut attributes, "year", tag.year());
        push(&mut attributes, "track", tag.track());
    }

    Some((media_type, attributes))
}

/// Identify a file by its leading bytes. Only signatures consistent with
/// `class` are accepted.
fn sniff(path: &Path, class: MediaClass) -> Option<(String, AttributeMap)> {
    let mut head = Vec::new();
    File::open(path)
        .ok()?
        .take(SNIFF_LEN)
        .read_to_end(&mut head)
        .ok()?;

    let mut infer = Infer::new();
    infer.add(ISO9660_MIME, "iso", is_iso9660);

    let (media_type, container) = match infer.get(&head).and_then(|kind| accept(class, kind)) {
        Some(found) => found,
        None if class == MediaClass::Other
            && TEXT_EXTENSIONS.contains(&extension_of(path).as_str())
            && looks_like_text(&head) =>
        {
            (PLAIN_TEXT_MIME.to_string(), "txt".to_string())
        }
        None => return None,
    };

    let mut attributes = AttributeMap::new();
    push(&mut attributes, "container", Some(container));
    push(&mut attributes, "mime_type", Some(&media_type));
    Some((media_type, attributes))
}

fn accept(class: MediaClass, kind: infer::Type) -> Option<(String, String)> {
    let mime = kind.mime_type();
    let media_type = match (class, kind.matcher_type()) {
        (MediaClass::Image, MatcherType::Image)
        | (MediaClass::Video, MatcherType::Video)
        | (MediaClass::Audio, MatcherType::Audio) => mime,
        // WMA and WMV share the ASF container.
        (MediaClass::Audio, MatcherType::Video) if mime == ASF_VIDEO_MIME => ASF_AUDIO_MIME,
        (
            MediaClass::Other,
            MatcherType::Doc
            | MatcherType::Archive
            | MatcherType::Book
            | MatcherType::Text
            | MatcherType::Custom,
        ) => mime,
        _ => return None,
    };
    Some((media_type.to_string(), kind.extension().to_string()))
}

fn is_iso9660(buf: &[u8]) -> bool {
    buf.get(0x8001..0x8006) == Some(&b"CD001"[..])
}

fn looks_like_text(head: &[u8]) -> bool {
    if head.contains(&0) {
        return false;
    }
    match std::str::from_utf8(head) {
        Ok(_) => true,
        // A multi-byte character cut by the sniff window.
        Err(err) => err.error_len().is_none(),
    }
}

fn audio_mime_type(file_type: FileType) -> Option<&'static str> {
    let mime = match file_type {
        FileType::Mpeg => "audio/mpeg",
        FileType::Wav => "audio/x-wav",
        FileType::Vorbis | FileType::Opus | FileType::Speex => "audio/ogg",
        FileType::Flac => "audio/flac",
        FileType::Aac => "audio/aac",
        FileType::Aiff => "audio/aiff",
        FileType::Mp4 => "audio/mp4",
        _ => return None,
    };
    Some(mime)
}
