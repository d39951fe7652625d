//! Checksum support for repository metadata.
//!
//! Digests are always computed as the full MD5/SHA1/SHA256 triple, since
//! every consumer (package records and the `Release` checksum tables) needs
//! all three. File contents are streamed through the hashers rather than
//! read into memory.

use crate::Result;
use serde::{Deserialize, Serialize};
use sha2::Digest;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Hash algorithms recorded in repository metadata.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum HashAlgorithm {
    /// MD5 hash algorithm.
    Md5,
    /// SHA-1 hash algorithm.
    Sha1,
    /// SHA-256 hash algorithm.
    Sha256,
}

impl HashAlgorithm {
    /// Get the string representation used in Release files.
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "MD5Sum",
            HashAlgorithm::Sha1 => "SHA1",
            HashAlgorithm::Sha256 => "SHA256",
        }
    }

    /// All recorded hash algorithms, in Release file order.
    pub fn all() -> &'static [HashAlgorithm] {
        &[HashAlgorithm::Md5, HashAlgorithm::Sha1, HashAlgorithm::Sha256]
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The digests of a single file, keyed by algorithm.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashSet {
    hashes: BTreeMap<HashAlgorithm, String>,
}

impl HashSet {
    /// Create a new empty hash set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a hash to the set.
    pub fn insert(&mut self, algorithm: HashAlgorithm, hash: String) {
        self.hashes.insert(algorithm, hash);
    }

    /// Get a hash by algorithm.
    pub fn get(&self, algorithm: HashAlgorithm) -> Option<&str> {
        self.hashes.get(&algorithm).map(|s| s.as_str())
    }

    /// Iterate over the hashes in algorithm order.
    pub fn iter(&self) -> impl Iterator<Item = (HashAlgorithm, &str)> {
        self.hashes.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Check if the hash set is empty.
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Get the number of hashes in the set.
    pub fn len(&self) -> usize {
        self.hashes.len()
    }
}

/// A generated file with its size and digests, as recorded in a `Release`
/// checksum table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashedFile {
    /// Path of the file, relative to the release directory.
    pub path: String,
    /// Size of the file in bytes.
    pub size: u64,
    /// Digests of the file contents.
    pub hashes: HashSet,
}

impl HashedFile {
    /// Create a new hashed file without digests.
    pub fn new<S: Into<String>>(path: S, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
            hashes: HashSet::new(),
        }
    }

    /// Add a digest to the file.
    pub fn add_hash(&mut self, algorithm: HashAlgorithm, hash: String) {
        self.hashes.insert(algorithm, hash);
    }

    /// Get a digest by algorithm.
    pub fn get_hash(&self, algorithm: HashAlgorithm) -> Option<&str> {
        self.hashes.get(algorithm)
    }
}

/// Computes the MD5/SHA1/SHA256 triple and byte count in one pass.
pub struct MultiHasher {
    md5: md5::Context,
    sha1: sha1::Sha1,
    sha256: sha2::Sha256,
    size: u64,
}

impl MultiHasher {
    /// Create a new multi-hasher.
    pub fn new() -> Self {
        Self {
            md5: md5::Context::new(),
            sha1: sha1::Sha1::new(),
            sha256: sha2::Sha256::new(),
            size: 0,
        }
    }

    /// Update all digests with the given data.
    pub fn update(&mut self, data: &[u8]) {
        self.size += data.len() as u64;
        self.md5.consume(data);
        self.sha1.update(data);
        self.sha256.update(data);
    }

    /// Finalize the digests, returning the byte count and hash set.
    pub fn finalize(self) -> (u64, HashSet) {
        let mut hashes = HashSet::new();
        hashes.insert(HashAlgorithm::Md5, hex::encode(self.md5.compute().0));
        hashes.insert(HashAlgorithm::Sha1, hex::encode(self.sha1.finalize()));
        hashes.insert(HashAlgorithm::Sha256, hex::encode(self.sha256.finalize()));
        (self.size, hashes)
    }
}

impl Default for MultiHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for MultiHasher {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Hash everything a reader yields, streaming.
pub fn hash_reader<R: Read>(mut reader: R) -> Result<(u64, HashSet)> {
    let mut hasher = MultiHasher::new();
    std::io::copy(&mut reader, &mut hasher)?;
    Ok(hasher.finalize())
}

/// Hash a file on disk, streaming its contents.
pub fn hash_file(path: &Path) -> Result<(u64, HashSet)> {
    hash_reader(File::open(path)?)
}

/// Hash an in-memory buffer.
pub fn hash_data(data: &[u8]) -> (u64, HashSet) {
    let mut hasher = MultiHasher::new();
    hasher.update(data);
    hasher.finalize()
}
