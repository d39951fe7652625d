//! Release manifest signing.

use crate::{PublishError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

/// A signing capability applied to the finished release manifest. Signing
/// failures are fatal to the publish.
pub trait ReleaseSigner {
    /// Sign the manifest at the given path.
    fn sign(&self, release_file: &Path) -> Result<()>;
}

/// Signs by invoking an external command with the manifest path as its only
/// argument. The key id and repository name are exported through the
/// environment, matching the contract of gpg wrapper scripts.
#[derive(Debug, Clone)]
pub struct CommandSigner {
    command: PathBuf,
    key_id: Option<String>,
    repository: String,
}

impl CommandSigner {
    /// Create a signer around an external command.
    pub fn new(command: PathBuf, key_id: Option<String>, repository: String) -> Self {
        Self {
            command,
            key_id,
            repository,
        }
    }
}

impl ReleaseSigner for CommandSigner {
    fn sign(&self, release_file: &Path) -> Result<()> {
        info!(
            "signing {} with {}",
            release_file.display(),
            self.command.display()
        );
        let mut command = Command::new(&self.command);
        command.arg(release_file);
        command.env("GPG_REPOSITORY_NAME", &self.repository);
        if let Some(ref key_id) = self.key_id {
            command.env("GPG_KEY_ID", key_id);
        }

        let output = command.output()?;
        if !output.status.success() {
            return Err(PublishError::Signing(format!(
                "{} exited with {}: {}",
                self.command.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn write_script(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("signer");
        fs::write(&path, contents).unwrap();
        let mut permissions = fs::metadata(&path).unwrap().permissions();
        permissions.set_mode(0o755);
        fs::set_permissions(&path, permissions).unwrap();
        path
    }

    #[test]
    fn test_command_signer_invokes_command() {
        let tmp = TempDir::new().unwrap();
        let release_file = tmp.path().join("Release");
        fs::write(&release_file, "Suite: stable\n").unwrap();
        let script = write_script(tmp.path(), "#!/bin/sh\ntouch \"$1.gpg\"\n");

        let signer = CommandSigner::new(script, Some("ABCD1234".to_string()), "repo-1".to_string());
        signer.sign(&release_file).unwrap();

        assert!(tmp.path().join("Release.gpg").exists());
    }

    #[test]
    fn test_command_signer_failure_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let release_file = tmp.path().join("Release");
        fs::write(&release_file, "Suite: stable\n").unwrap();
        let script = write_script(tmp.path(), "#!/bin/sh\necho broken >&2\nexit 1\n");

        let signer = CommandSigner::new(script, None, "repo-1".to_string());
        let err = signer.sign(&release_file).unwrap_err().to_string();
        assert!(err.contains("broken"));
    }
}
