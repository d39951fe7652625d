//! Package records and Packages index generation.

use crate::hash::{hash_data, hash_file, HashAlgorithm, HashedFile};
use crate::relations::{render_relations, Relation};
use crate::{Result, DEFAULT_COMPRESSIONS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Identity of a binary package unit within one repository.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PackageKey {
    /// Package name.
    pub name: String,
    /// Package version.
    pub version: String,
    /// Architecture.
    pub architecture: String,
}

impl PackageKey {
    /// Create a new package key.
    pub fn new<S: Into<String>>(name: S, version: S, architecture: S) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            architecture: architecture.into(),
        }
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.name, self.version, self.architecture)
    }
}

/// A Debian binary package unit as supplied by the host platform.
///
/// Immutable for publishing purposes except for the digest fields, which may
/// be backfilled from the stored artifact when the host did not record them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Package name.
    pub name: String,
    /// Package version.
    pub version: String,
    /// Architecture (`all` marks an architecture-independent package).
    pub architecture: String,
    /// Content checksum recorded at unit creation.
    pub checksum: Option<String>,
    /// Type of `checksum` (e.g. `sha256`).
    pub checksum_type: Option<String>,
    /// Path of the stored artifact on disk.
    pub storage_path: PathBuf,
    /// File name used when placing the artifact in the pool.
    pub filename: String,
    /// Artifact size in bytes.
    pub size: u64,
    /// MD5 digest of the artifact.
    pub md5sum: Option<String>,
    /// SHA-1 digest of the artifact.
    pub sha1: Option<String>,
    /// SHA-256 digest of the artifact.
    pub sha256: Option<String>,
    /// Parsed `Depends` relations, order preserved from the source text.
    pub depends: Vec<Relation>,
    /// Source package name.
    pub source: Option<String>,
    /// Installed size in kilobytes.
    pub installed_size: Option<String>,
    /// Maintainer.
    pub maintainer: Option<String>,
    /// Original maintainer.
    pub original_maintainer: Option<String>,
    /// Replaced packages.
    pub replaces: Option<String>,
    /// Provided virtual packages.
    pub provides: Option<String>,
    /// Pre-dependencies.
    pub pre_depends: Option<String>,
    /// Recommended packages.
    pub recommends: Option<String>,
    /// Suggested packages.
    pub suggests: Option<String>,
    /// Enhanced packages.
    pub enhances: Option<String>,
    /// Conflicting packages.
    pub conflicts: Option<String>,
    /// Broken packages.
    pub breaks: Option<String>,
    /// Package description.
    pub description: Option<String>,
    /// Multi-arch policy.
    pub multi_arch: Option<String>,
    /// Homepage.
    pub homepage: Option<String>,
    /// Section.
    pub section: Option<String>,
    /// Priority.
    pub priority: Option<String>,
    /// Additional control fields passed through verbatim.
    pub extra_fields: BTreeMap<String, String>,
}

impl Package {
    /// Create a new package with required fields. The pool file name is
    /// derived from the unit key.
    pub fn new<S: Into<String>>(
        name: S,
        version: S,
        architecture: S,
        storage_path: impl Into<PathBuf>,
    ) -> Self {
        let name = name.into();
        let version = version.into();
        let architecture = architecture.into();
        let filename = format!("{}_{}_{}.deb", name, version, architecture);
        Self {
            name,
            version,
            architecture,
            checksum: None,
            checksum_type: None,
            storage_path: storage_path.into(),
            filename,
            size: 0,
            md5sum: None,
            sha1: None,
            sha256: None,
            depends: Vec::new(),
            source: None,
            installed_size: None,
            maintainer: None,
            original_maintainer: None,
            replaces: None,
            provides: None,
            pre_depends: None,
            recommends: None,
            suggests: None,
            enhances: None,
            conflicts: None,
            breaks: None,
            description: None,
            multi_arch: None,
            homepage: None,
            section: None,
            priority: None,
            extra_fields: BTreeMap::new(),
        }
    }

    /// The unit key identifying this package.
    pub fn key(&self) -> PackageKey {
        PackageKey::new(
            self.name.clone(),
            self.version.clone(),
            self.architecture.clone(),
        )
    }

    /// Whether the full MD5/SHA1/SHA256 digest triple is present.
    pub fn has_checksums(&self) -> bool {
        self.md5sum.is_some() && self.sha1.is_some() && self.sha256.is_some()
    }

    /// Backfill missing digests (and the byte count) by streaming the stored
    /// artifact. A missing or unreadable artifact aborts the publish.
    pub fn repair_checksums(&mut self) -> Result<()> {
        if self.has_checksums() {
            return Ok(());
        }
        let (size, hashes) = hash_file(&self.storage_path)?;
        self.size = size;
        self.md5sum = hashes.get(HashAlgorithm::Md5).map(str::to_string);
        self.sha1 = hashes.get(HashAlgorithm::Sha1).map(str::to_string);
        self.sha256 = hashes.get(HashAlgorithm::Sha256).map(str::to_string);
        Ok(())
    }

    /// Serialize this package as one `Packages` file stanza. The field order
    /// matches the one observed on official mirrors; `Filename` points into
    /// the pool tree of the given component.
    pub fn to_paragraph(&self, component: &str) -> String {
        let mut paragraph = String::new();
        let mut field = |name: &str, value: &str| {
            paragraph.push_str(name);
            paragraph.push_str(": ");
            paragraph.push_str(value);
            paragraph.push('\n');
        };

        field("Package", &self.name);
        if let Some(ref source) = self.source {
            field("Source", source);
        }
        field("Version", &self.version);
        if let Some(ref installed_size) = self.installed_size {
            field("Installed-Size", installed_size);
        }
        if let Some(ref maintainer) = self.maintainer {
            field("Maintainer", maintainer);
        }
        if let Some(ref original_maintainer) = self.original_maintainer {
            field("Original-Maintainer", original_maintainer);
        }
        field("Architecture", &self.architecture);
        if let Some(ref replaces) = self.replaces {
            field("Replaces", replaces);
        }
        if let Some(ref provides) = self.provides {
            field("Provides", provides);
        }
        if !self.depends.is_empty() {
            field("Depends", &render_relations(&self.depends));
        }
        if let Some(ref pre_depends) = self.pre_depends {
            field("Pre-Depends", pre_depends);
        }
        if let Some(ref recommends) = self.recommends {
            field("Recommends", recommends);
        }
        if let Some(ref suggests) = self.suggests {
            field("Suggests", suggests);
        }
        if let Some(ref enhances) = self.enhances {
            field("Enhances", enhances);
        }
        if let Some(ref conflicts) = self.conflicts {
            field("Conflicts", conflicts);
        }
        if let Some(ref breaks) = self.breaks {
            field("Breaks", breaks);
        }
        if let Some(ref description) = self.description {
            field("Description", description);
        }
        if let Some(ref multi_arch) = self.multi_arch {
            field("Multi-Arch", multi_arch);
        }
        if let Some(ref homepage) = self.homepage {
            field("Homepage", homepage);
        }
        if let Some(ref section) = self.section {
            field("Section", section);
        }
        if let Some(ref priority) = self.priority {
            field("Priority", priority);
        }
        let pool_path = format!("pool/{}/{}", component, self.filename);
        field("Filename", &pool_path);
        field("Size", &self.size.to_string());
        if let Some(ref md5sum) = self.md5sum {
            field("MD5sum", md5sum);
        }
        if let Some(ref sha1) = self.sha1 {
            field("SHA1", sha1);
        }
        if let Some(ref sha256) = self.sha256 {
            field("SHA256", sha256);
        }
        for (name, value) in &self.extra_fields {
            field(name, value);
        }

        paragraph
    }
}

/// Backfill digests on every package lacking them.
pub fn repair_all(units: &mut BTreeMap<PackageKey, Package>) -> Result<()> {
    for package in units.values_mut() {
        package.repair_checksums()?;
    }
    Ok(())
}

/// The packages of one architecture bucket, writable as a `Packages` index
/// with its compressed siblings.
#[derive(Debug)]
pub struct PackagesFile<'a> {
    component: String,
    packages: Vec<&'a Package>,
}

impl<'a> PackagesFile<'a> {
    /// Create an index over the given packages, placed under the component's
    /// pool directory.
    pub fn new<S: Into<String>>(component: S, packages: Vec<&'a Package>) -> Self {
        Self {
            component: component.into(),
            packages,
        }
    }

    /// Number of packages in the index.
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Check whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Serialize the index. Stanzas are sorted by unit key so identical
    /// inputs produce byte-identical output, and separated by one blank line.
    pub fn to_index(&self) -> String {
        let mut ordered = self.packages.clone();
        ordered.sort_by_key(|package| package.key());

        let mut content = String::new();
        for (i, package) in ordered.iter().enumerate() {
            if i > 0 {
                content.push('\n');
            }
            content.push_str(&package.to_paragraph(&self.component));
        }
        content
    }

    /// Write `Packages` and its compressed variants into `dir`, returning
    /// one digest record per written file (paths relative to `dir`).
    pub fn write(&self, dir: &Path) -> Result<Vec<HashedFile>> {
        let content = self.to_index();
        write_compressed_file(dir, "Packages", content.as_bytes())
    }
}

/// Write a file in every default compression format and return the digest
/// records of the written files.
pub fn write_compressed_file(
    dir: &Path,
    basename: &str,
    content: &[u8],
) -> Result<Vec<HashedFile>> {
    let mut files = Vec::new();
    for &compression in DEFAULT_COMPRESSIONS {
        let filename = format!("{}{}", basename, compression.extension());
        let compressed = compression.compress(content)?;
        let (size, hashes) = hash_data(&compressed);
        fs::write(dir.join(&filename), &compressed)?;

        let mut hashed = HashedFile::new(filename, size);
        hashed.hashes = hashes;
        files.push(hashed);
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relations::parse_relations;
    use crate::Compression;
    use tempfile::TempDir;

    fn sample_package() -> Package {
        let mut package = Package::new("hello", "2.10-1", "amd64", "/store/hello.deb");
        package.maintainer = Some("Debian QA Group <packages@qa.debian.org>".to_string());
        package.description = Some("example package based on GNU hello".to_string());
        package.section = Some("devel".to_string());
        package.size = 1024;
        package.md5sum = Some("aaa".to_string());
        package.sha1 = Some("bbb".to_string());
        package.sha256 = Some("ccc".to_string());
        package.depends = parse_relations("libc6 (>= 2.14)").unwrap();
        package
    }

    #[test]
    fn test_filename_from_unit_key() {
        let package = Package::new("hello", "2.10-1", "amd64", "/store/hello.deb");
        assert_eq!(package.filename, "hello_2.10-1_amd64.deb");
        assert_eq!(package.key(), PackageKey::new("hello", "2.10-1", "amd64"));
    }

    #[test]
    fn test_paragraph_field_order() {
        let paragraph = sample_package().to_paragraph("main");
        let lines: Vec<&str> = paragraph.lines().collect();

        assert_eq!(lines[0], "Package: hello");
        assert_eq!(lines[1], "Version: 2.10-1");
        assert_eq!(lines[2], "Maintainer: Debian QA Group <packages@qa.debian.org>");
        assert_eq!(lines[3], "Architecture: amd64");
        assert_eq!(lines[4], "Depends: libc6 (>= 2.14)");
        assert_eq!(lines[5], "Description: example package based on GNU hello");
        assert_eq!(lines[6], "Section: devel");
        assert_eq!(lines[7], "Filename: pool/main/hello_2.10-1_amd64.deb");
        assert_eq!(lines[8], "Size: 1024");
        assert_eq!(lines[9], "MD5sum: aaa");
        assert_eq!(lines[10], "SHA1: bbb");
        assert_eq!(lines[11], "SHA256: ccc");
    }

    #[test]
    fn test_repair_checksums_backfills_digests() {
        let tmp = TempDir::new().unwrap();
        let artifact = tmp.path().join("hello_2.10-1_amd64.deb");
        std::fs::write(&artifact, b"artifact contents").unwrap();

        let mut package = Package::new("hello", "2.10-1", "amd64", &artifact);
        assert!(!package.has_checksums());
        package.repair_checksums().unwrap();

        let (size, hashes) = hash_data(b"artifact contents");
        assert!(package.has_checksums());
        assert_eq!(package.size, size);
        assert_eq!(
            package.md5sum.as_deref(),
            hashes.get(HashAlgorithm::Md5)
        );
        assert_eq!(package.sha1.as_deref(), hashes.get(HashAlgorithm::Sha1));
        assert_eq!(
            package.sha256.as_deref(),
            hashes.get(HashAlgorithm::Sha256)
        );
    }

    #[test]
    fn test_repair_checksums_missing_artifact_is_fatal() {
        let mut package = Package::new("gone", "1.0", "amd64", "/nonexistent/gone.deb");
        assert!(package.repair_checksums().is_err());
    }

    #[test]
    fn test_repair_checksums_keeps_existing_digests() {
        let mut package = sample_package();
        package.repair_checksums().unwrap();
        assert_eq!(package.md5sum.as_deref(), Some("aaa"));
    }

    #[test]
    fn test_index_is_sorted_and_stable() {
        let zeta = Package::new("zeta", "1.0", "amd64", "/store/zeta.deb");
        let alpha = Package::new("alpha", "1.0", "amd64", "/store/alpha.deb");

        let index = PackagesFile::new("main", vec![&zeta, &alpha]);
        let content = index.to_index();
        assert!(content.starts_with("Package: alpha\n"));
        assert!(content.contains("\n\nPackage: zeta\n"));

        let again = PackagesFile::new("main", vec![&alpha, &zeta]);
        assert_eq!(content, again.to_index());
    }

    #[test]
    fn test_write_produces_compressed_variants() {
        let tmp = TempDir::new().unwrap();
        let package = sample_package();
        let index = PackagesFile::new("main", vec![&package]);

        let files = index.write(tmp.path()).unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(names, vec!["Packages", "Packages.gz", "Packages.bz2"]);

        let plain = std::fs::read(tmp.path().join("Packages")).unwrap();
        let gz = std::fs::read(tmp.path().join("Packages.gz")).unwrap();
        let bz2 = std::fs::read(tmp.path().join("Packages.bz2")).unwrap();
        assert_eq!(Compression::Gzip.decompress(&gz).unwrap(), plain);
        assert_eq!(Compression::Bzip2.decompress(&bz2).unwrap(), plain);

        for file in &files {
            assert_eq!(file.hashes.len(), 3);
        }
    }
}
