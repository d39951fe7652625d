//! Compression support for repository index files.

use crate::Result;
use std::io::{Read, Write};

/// Compression formats applied to generated `Packages` files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// No compression.
    None,
    /// Gzip compression.
    Gzip,
    /// Bzip2 compression.
    Bzip2,
}

impl Compression {
    /// Get the file extension for this compression format.
    pub fn extension(&self) -> &'static str {
        match self {
            Compression::None => "",
            Compression::Gzip => ".gz",
            Compression::Bzip2 => ".bz2",
        }
    }

    /// Compress data at the format's standard settings.
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Gzip => {
                let mut compressed = Vec::new();
                let mut encoder =
                    flate2::write::GzEncoder::new(&mut compressed, flate2::Compression::default());
                encoder.write_all(data)?;
                encoder.finish()?;
                Ok(compressed)
            }
            Compression::Bzip2 => {
                let mut compressed = Vec::new();
                let mut encoder =
                    bzip2::write::BzEncoder::new(&mut compressed, bzip2::Compression::default());
                encoder.write_all(data)?;
                encoder.finish()?;
                Ok(compressed)
            }
        }
    }

    /// Decompress data using this compression format.
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Gzip => {
                let mut decompressed = Vec::new();
                let mut decoder = flate2::read::GzDecoder::new(data);
                decoder.read_to_end(&mut decompressed)?;
                Ok(decompressed)
            }
            Compression::Bzip2 => {
                let mut decompressed = Vec::new();
                let mut decoder = bzip2::read::BzDecoder::new(data);
                decoder.read_to_end(&mut decompressed)?;
                Ok(decompressed)
            }
        }
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Gzip => write!(f, "gzip"),
            Compression::Bzip2 => write!(f, "bzip2"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extensions() {
        assert_eq!(Compression::None.extension(), "");
        assert_eq!(Compression::Gzip.extension(), ".gz");
        assert_eq!(Compression::Bzip2.extension(), ".bz2");
    }

    #[test]
    fn test_no_compression() -> Result<()> {
        let data = b"Package: hello\n";
        assert_eq!(Compression::None.compress(data)?, data);
        Ok(())
    }

    #[test]
    fn test_gzip_roundtrip() -> Result<()> {
        let data = b"Package: hello\nVersion: 1.0\n";
        let compressed = Compression::Gzip.compress(data)?;
        assert_ne!(compressed.as_slice(), data.as_slice());
        assert_eq!(Compression::Gzip.decompress(&compressed)?, data);
        Ok(())
    }

    #[test]
    fn test_bzip2_roundtrip() -> Result<()> {
        let data = b"Package: hello\nVersion: 1.0\n";
        let compressed = Compression::Bzip2.compress(data)?;
        assert_ne!(compressed.as_slice(), data.as_slice());
        assert_eq!(Compression::Bzip2.decompress(&compressed)?, data);
        Ok(())
    }
}
