//! Publish configuration supplied by the host platform.

use crate::signer::CommandSigner;
use crate::{PublishError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ROOT_PUBLISH_DIR: &str = "/var/lib/deb-publisher/published";

fn default_http_publish_dir() -> PathBuf {
    Path::new(ROOT_PUBLISH_DIR).join("http").join("repos")
}

fn default_https_publish_dir() -> PathBuf {
    Path::new(ROOT_PUBLISH_DIR).join("https").join("repos")
}

fn default_master_publish_dir() -> PathBuf {
    Path::new(ROOT_PUBLISH_DIR).join("master")
}

/// Configuration of one publish target, as handed over by the host in its
/// JSON configuration map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Serve the repository over HTTP.
    pub publish_http: bool,
    /// Serve the repository over HTTPS.
    pub publish_https: bool,
    /// Also publish every package under a `default`/`all` release alias.
    #[serde(default)]
    pub publish_default_release: bool,
    /// Repository path relative to the served roots.
    pub relative_path: String,
    /// Root of the HTTP-served tree.
    #[serde(default = "default_http_publish_dir")]
    pub http_publish_dir: PathBuf,
    /// Root of the HTTPS-served tree.
    #[serde(default = "default_https_publish_dir")]
    pub https_publish_dir: PathBuf,
    /// Root of the versioned master publish history.
    #[serde(default = "default_master_publish_dir")]
    pub master_publish_dir: PathBuf,
    /// External signing command invoked on the release manifest.
    #[serde(default)]
    pub gpg_cmd: Option<PathBuf>,
    /// Key id exported to the signing command.
    #[serde(default)]
    pub gpg_key_id: Option<String>,
}

impl PublishConfig {
    /// Deserialize the host's configuration map.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| PublishError::InvalidConfiguration(e.to_string()))
    }

    /// Validate the configuration, collecting every problem into one
    /// descriptive message.
    pub fn validate(&self) -> Result<()> {
        let mut error_messages = Vec::new();

        if !self.publish_http && !self.publish_https {
            error_messages.push(
                "Settings serve via http and https are both set to false. \
                 At least one option should be set to true."
                    .to_string(),
            );
        }

        if self.relative_path().is_empty() {
            error_messages.push("Relative publish path must not be empty".to_string());
        }

        if let Some(ref cmd) = self.gpg_cmd {
            if !is_executable(cmd) {
                error_messages.push(format!("Command {} is not executable", cmd.display()));
            }
        }

        if error_messages.is_empty() {
            Ok(())
        } else {
            Err(PublishError::InvalidConfiguration(error_messages.join("\n")))
        }
    }

    /// The relative publish path with any leading separators stripped.
    pub fn relative_path(&self) -> &str {
        self.relative_path.trim_start_matches('/')
    }

    /// The (served root, repository directory) pairs enabled by this
    /// configuration.
    pub fn target_pairs(&self) -> Vec<(PathBuf, PathBuf)> {
        let mut pairs = Vec::new();
        if self.publish_http {
            let target = self.http_publish_dir.join(self.relative_path());
            pairs.push((self.http_publish_dir.clone(), target));
        }
        if self.publish_https {
            let target = self.https_publish_dir.join(self.relative_path());
            pairs.push((self.https_publish_dir.clone(), target));
        }
        pairs
    }

    /// The master publish history directory for this repository.
    pub fn master_dir(&self) -> PathBuf {
        self.master_publish_dir.join(self.relative_path())
    }

    /// The configured signer, if any.
    pub fn signer(&self, repository: &str) -> Option<CommandSigner> {
        self.gpg_cmd.as_ref().map(|cmd| {
            CommandSigner::new(cmd.clone(), self.gpg_key_id.clone(), repository.to_string())
        })
    }
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match path.metadata() {
        Ok(metadata) => metadata.is_file() && metadata.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_config() -> serde_json::Value {
        json!({
            "publish_http": true,
            "publish_https": false,
            "relative_path": "debian/repo-1"
        })
    }

    #[test]
    fn test_from_json_with_defaults() {
        let config = PublishConfig::from_json(base_config()).unwrap();

        assert!(config.publish_http);
        assert!(!config.publish_https);
        assert!(!config.publish_default_release);
        assert_eq!(config.relative_path(), "debian/repo-1");
        assert_eq!(
            config.http_publish_dir,
            Path::new("/var/lib/deb-publisher/published/http/repos")
        );
        assert!(config.gpg_cmd.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_missing_required_key() {
        let result = PublishConfig::from_json(json!({"publish_http": true}));
        assert!(result.is_err());
    }

    #[test]
    fn test_http_and_https_both_false() {
        let mut value = base_config();
        value["publish_http"] = json!(false);
        let config = PublishConfig::from_json(value).unwrap();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("both set to false"));
    }

    #[test]
    fn test_leading_separator_stripped() {
        let mut value = base_config();
        value["relative_path"] = json!("/debian/repo-1");
        let config = PublishConfig::from_json(value).unwrap();
        assert_eq!(config.relative_path(), "debian/repo-1");
    }

    #[test]
    fn test_target_pairs_follow_flags() {
        let mut value = base_config();
        value["publish_https"] = json!(true);
        value["http_publish_dir"] = json!("/srv/http");
        value["https_publish_dir"] = json!("/srv/https");
        let config = PublishConfig::from_json(value).unwrap();

        let pairs = config.target_pairs();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].1, Path::new("/srv/http/debian/repo-1"));
        assert_eq!(pairs[1].1, Path::new("/srv/https/debian/repo-1"));
    }

    #[test]
    fn test_signer_requires_executable_command() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::TempDir::new().unwrap();
        let script = tmp.path().join("signer");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();

        let mut value = base_config();
        value["gpg_cmd"] = json!(script.to_str().unwrap());
        let config = PublishConfig::from_json(value).unwrap();

        // Not executable yet.
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("is not executable"));

        let mut permissions = std::fs::metadata(&script).unwrap().permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(&script, permissions).unwrap();
        config.validate().unwrap();
        assert!(config.signer("repo-1").is_some());
    }
}
