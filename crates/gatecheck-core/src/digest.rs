//! Content digests (SHA-256) for equality checks between served and local bytes.
//!
//! Only equality matters; there is no ordering. Hashing is incremental so a
//! streamed response body and a whole local file digest identically.

use anyhow::{Context, Result};
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Fixed-length SHA-256 of a byte sequence.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex, as printed by `sha256sum`.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.to_hex())
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Incremental hasher; feed chunks in order, then `finalize`.
#[derive(Clone, Default)]
pub struct ContentHasher {
    inner: Sha256,
    len: u64,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
        self.len += chunk.len() as u64;
    }

    /// Total bytes fed so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn finalize(self) -> ContentDigest {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.inner.finalize());
        ContentDigest(out)
    }
}

pub fn digest_bytes(bytes: &[u8]) -> ContentDigest {
    let mut hasher = ContentHasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

/// Digest everything `reader` yields, in bounded chunks.
pub fn digest_reader<R: Read>(mut reader: R) -> std::io::Result<ContentDigest> {
    let mut hasher = ContentHasher::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

/// Compute the digest of a file on disk. Suitable for large files.
pub fn digest_path(path: &Path) -> Result<ContentDigest> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    digest_reader(f).with_context(|| format!("read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn digest_path_empty_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let digest = digest_path(f.path()).unwrap();
        assert_eq!(
            digest.to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn digest_path_known_content() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello\n").unwrap();
        f.flush().unwrap();
        let digest = digest_path(f.path()).unwrap();
        assert_eq!(
            digest.to_hex(),
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        );
    }

    #[test]
    fn large_payload_digests_same_in_one_chunk_or_many() {
        // Larger than 2 MiB, with a chunk size that does not divide it evenly.
        let body: Vec<u8> = (0u32..(2 * 1024 * 1024 + 12_345))
            .map(|i| (i.wrapping_mul(31) >> 3) as u8)
            .collect();
        let whole = digest_bytes(&body);

        let mut hasher = ContentHasher::new();
        for chunk in body.chunks(16_381) {
            hasher.update(chunk);
        }
        assert_eq!(hasher.len(), body.len() as u64);
        assert_eq!(hasher.finalize(), whole);

        assert_eq!(digest_reader(&body[..]).unwrap(), whole);
    }

    #[test]
    fn different_content_differs() {
        assert_ne!(digest_bytes(b"abc"), digest_bytes(b"abd"));
        assert_eq!(digest_bytes(b"abc"), digest_bytes(b"abc"));
    }

    #[test]
    fn serializes_as_hex_string() {
        let json = serde_json::to_string(&digest_bytes(b"")).unwrap();
        assert_eq!(
            json,
            "\"e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855\""
        );
    }
}
