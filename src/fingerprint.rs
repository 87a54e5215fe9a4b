//! Content and perceptual fingerprints.
//!
//! The content hash is the dedup key: SHA-1 over the full byte stream, read in
//! bounded chunks so memory stays flat for any file size. The perceptual hash
//! is a 64-bit difference hash, only ever computed for image content.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use image::imageops::FilterType;
use image::ImageReader;
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};

/// Read size for streaming the content hash.
const CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Grid used by the difference hash: one extra column so each row yields 8 bits.
const DHASH_WIDTH: u32 = 9;
const DHASH_HEIGHT: u32 = 8;

/// Lowercase hex SHA-1 of everything `reader` yields.
pub fn content_hash<R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn content_hash_file(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    content_hash(file).map_err(|e| Error::io(path, e))
}

/// 16 hex digit difference hash of the image at `path`.
///
/// The format is sniffed from the bytes, not the extension. A file that does
/// not decode is a hard failure.
pub fn perceptual_hash(path: &Path) -> Result<String> {
    let failed = |reason: String| Error::PerceptualHash {
        path: path.to_path_buf(),
        reason,
    };

    let img = ImageReader::open(path)
        .map_err(|e| Error::io(path, e))?
        .with_guessed_format()
        .map_err(|e| Error::io(path, e))?
        .decode()
        .map_err(|e| failed(e.to_string()))?;

    let small = img
        .resize_exact(DHASH_WIDTH, DHASH_HEIGHT, FilterType::Triangle)
        .to_luma8();

    let mut bits: u64 = 0;
    for y in 0..DHASH_HEIGHT {
        for x in 0..DHASH_WIDTH - 1 {
            let left = small.get_pixel(x, y)[0];
            let right = small.get_pixel(x + 1, y)[0];
            bits = (bits << 1) | u64::from(left < right);
        }
    }

    Ok(format!("{:016x}", bits))
}

/// Number of differing bits between two hex perceptual hashes, or `None`
/// if either does not parse.
pub fn hamming_distance(a: &str, b: &str) -> Option<u32> {
    let a = u64::from_str_radix(a, 16).ok()?;
    let b = u64::from_str_radix(b, 16).ok()?;
    Some((a ^ b).count_ones())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    #[test]
    fn content_hash_matches_known_digest() {
        assert_eq!(
            content_hash(&b""[..]).unwrap(),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
        assert_eq!(
            content_hash(&b"abc"[..]).unwrap(),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn content_hash_ignores_path_and_mtime() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a.txt");
        let b = tmp.path().join("nested").join("b.txt");
        std::fs::create_dir_all(b.parent().unwrap()).unwrap();
        std::fs::write(&a, b"same bytes").unwrap();
        std::fs::write(&b, b"same bytes").unwrap();

        let older = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000_000);
        File::options()
            .write(true)
            .open(&b)
            .unwrap()
            .set_modified(older)
            .unwrap();
        assert_ne!(
            std::fs::metadata(&a).unwrap().modified().unwrap(),
            std::fs::metadata(&b).unwrap().modified().unwrap()
        );

        let first = content_hash_file(&a).unwrap();
        assert_eq!(first, content_hash_file(&a).unwrap());
        assert_eq!(first, content_hash_file(&b).unwrap());
        assert_eq!(first.len(), 40);
    }

    #[test]
    fn perceptual_hash_is_fixed_width_and_stable() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gradient.png");
        let img = GrayImage::from_fn(64, 64, |x, _| Luma([(x * 4) as u8]));
        img.save(&path).unwrap();

        let hash = perceptual_hash(&path).unwrap();
        assert_eq!(hash.len(), 16);
        assert_eq!(hash, perceptual_hash(&path).unwrap());
        // Brightness rises left to right, so every comparison is set.
        assert_eq!(hash, "ffffffffffffffff");
    }

    #[test]
    fn perceptual_hash_rejects_non_image() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fake.jpg");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(matches!(
            perceptual_hash(&path),
            Err(Error::PerceptualHash { .. })
        ));
    }

    #[test]
    fn hamming_distance_counts_bits() {
        assert_eq!(hamming_distance("ff", "ff"), Some(0));
        assert_eq!(hamming_distance("ff", "fe"), Some(1));
        assert_eq!(hamming_distance("0", "ffffffffffffffff"), Some(64));
        assert_eq!(hamming_distance("zz", "ff"), None);
    }
}
