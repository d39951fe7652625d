//! Release manifest generation.

use crate::hash::{HashAlgorithm, HashedFile};
use crate::{PublishError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// The `Release` manifest of one published release: identifying fields plus
/// a checksum table covering every generated index file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseFile {
    /// Label for the repository.
    pub label: Option<String>,
    /// Suite name.
    pub suite: Option<String>,
    /// Codename.
    pub codename: Option<String>,
    /// Date of generation.
    pub date: DateTime<Utc>,
    /// Architectures listed by this release (`all` is never listed).
    pub architectures: Vec<String>,
    /// Components of this release.
    pub components: Vec<String>,
    /// Description.
    pub description: Option<String>,
    /// Generated index files, in generation order.
    pub files: Vec<HashedFile>,
}

impl ReleaseFile {
    /// Create an empty manifest dated now.
    pub fn new() -> Self {
        Self {
            label: None,
            suite: None,
            codename: None,
            date: Utc::now(),
            architectures: Vec::new(),
            components: Vec::new(),
            description: None,
            files: Vec::new(),
        }
    }

    /// Record a generated index file.
    pub fn add_file(&mut self, file: HashedFile) {
        self.files.push(file);
    }

    /// Serialize the manifest. Field order follows the format observed on
    /// official mirrors; the checksum tables list files in generation order.
    pub fn to_manifest(&self) -> String {
        let mut content = String::new();

        if let Some(ref label) = self.label {
            content.push_str(&format!("Label: {}\n", label));
        }
        if let Some(ref suite) = self.suite {
            content.push_str(&format!("Suite: {}\n", suite));
        }
        if let Some(ref codename) = self.codename {
            content.push_str(&format!("Codename: {}\n", codename));
        }
        content.push_str(&format!(
            "Date: {}\n",
            self.date.format("%a, %d %b %Y %H:%M:%S %z")
        ));
        if !self.architectures.is_empty() {
            content.push_str(&format!(
                "Architectures: {}\n",
                self.architectures.join(" ")
            ));
        }
        if !self.components.is_empty() {
            content.push_str(&format!("Components: {}\n", self.components.join(" ")));
        }
        if let Some(ref description) = self.description {
            content.push_str(&format!("Description: {}\n", description));
        }

        for &algorithm in HashAlgorithm::all() {
            let rows: Vec<(&HashedFile, &str)> = self
                .files
                .iter()
                .filter_map(|file| file.get_hash(algorithm).map(|hash| (file, hash)))
                .collect();
            if rows.is_empty() {
                continue;
            }
            content.push_str(&format!("{}:\n", algorithm.as_str()));
            for (file, hash) in rows {
                content.push_str(&format!(" {} {} {}\n", hash, file.size, file.path));
            }
        }

        content
    }

    /// Write the manifest as `Release` in `dir`. Fails if the release has
    /// neither codename nor suite; synthesis guarantees this cannot happen
    /// for well-formed inputs.
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        if self.codename.is_none() && self.suite.is_none() {
            return Err(PublishError::invalid_config(
                "release manifest has neither codename nor suite",
            ));
        }
        let path = dir.join("Release");
        fs::write(&path, self.to_manifest())?;
        Ok(path)
    }

    /// Parse a manifest back into its fields and checksum table.
    pub fn parse(content: &str) -> Result<Self> {
        let mut release = ReleaseFile::new();
        let mut date = None;
        let mut current_table: Option<HashAlgorithm> = None;

        for line in content.lines() {
            if line.starts_with(' ') || line.starts_with('\t') {
                let algorithm = match current_table {
                    Some(algorithm) => algorithm,
                    None => continue,
                };
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() != 3 {
                    return Err(PublishError::invalid_config(format!(
                        "invalid checksum table row: {}",
                        line
                    )));
                }
                let size = parts[1]
                    .parse::<u64>()
                    .map_err(|_| PublishError::invalid_field("size", parts[1]))?;
                add_table_row(&mut release.files, algorithm, parts[0], size, parts[2]);
                continue;
            }

            let (field, value) = line.split_once(':').ok_or_else(|| {
                PublishError::invalid_config(format!("invalid line format: {}", line))
            })?;
            let value = value.trim();
            current_table = None;
            match field {
                "MD5Sum" => current_table = Some(HashAlgorithm::Md5),
                "SHA1" => current_table = Some(HashAlgorithm::Sha1),
                "SHA256" => current_table = Some(HashAlgorithm::Sha256),
                "Label" => release.label = Some(value.to_string()),
                "Suite" => release.suite = Some(value.to_string()),
                "Codename" => release.codename = Some(value.to_string()),
                "Description" => release.description = Some(value.to_string()),
                "Date" => {
                    date = Some(
                        DateTime::parse_from_rfc2822(value)
                            .map_err(|_| PublishError::invalid_field("Date", value))?
                            .with_timezone(&Utc),
                    );
                }
                "Architectures" => {
                    release.architectures =
                        value.split_whitespace().map(str::to_string).collect();
                }
                "Components" => {
                    release.components =
                        value.split_whitespace().map(str::to_string).collect();
                }
                _ => {}
            }
        }

        release.date = date.ok_or_else(|| PublishError::missing_field("Date"))?;
        Ok(release)
    }
}

fn add_table_row(
    files: &mut Vec<HashedFile>,
    algorithm: HashAlgorithm,
    hash: &str,
    size: u64,
    path: &str,
) {
    if let Some(existing) = files.iter_mut().find(|f| f.path == path) {
        existing.add_hash(algorithm, hash.to_string());
    } else {
        let mut file = HashedFile::new(path, size);
        file.add_hash(algorithm, hash.to_string());
        files.push(file);
    }
}

impl Default for ReleaseFile {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReleaseFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_manifest())
    }
}
