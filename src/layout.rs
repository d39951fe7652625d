//! Served-directory layout: atomic publish, listing files, and removal.

use crate::{PublishError, Result};
use chrono::Utc;
use std::fs;
use std::io;
use std::os::unix::fs as unix_fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Move the finished working tree into the master publish history and
/// atomically repoint every serve target at it.
///
/// The working tree lands in a timestamped subdirectory of `master_dir`;
/// each target then gets its symlink replaced via create-then-rename, so a
/// reader never observes a partially published tree. Older history entries
/// are pruned once the swap has happened.
pub fn atomic_publish(
    working_dir: &Path,
    master_dir: &Path,
    targets: &[PathBuf],
) -> Result<PathBuf> {
    fs::create_dir_all(master_dir).map_err(|e| {
        PublishError::DirectoryCreation(format!("{}: {}", master_dir.display(), e))
    })?;
    let timestamp = Utc::now().format("%Y%m%dT%H%M%S%.6fZ").to_string();
    let destination = master_dir.join(&timestamp);
    fs::rename(working_dir, &destination)?;
    info!("published working tree as {}", destination.display());

    for target in targets {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                PublishError::DirectoryCreation(format!("{}: {}", parent.display(), e))
            })?;
        }
        swap_symlink(&destination, target)?;
        debug!("target {} now serves {}", target.display(), timestamp);
    }

    prune_master(master_dir, &destination)?;
    Ok(destination)
}

/// Replace `target` with a symlink to `source` in one atomic rename.
fn swap_symlink(source: &Path, target: &Path) -> Result<()> {
    let file_name = target
        .file_name()
        .ok_or_else(|| PublishError::invalid_config("publish target has no file name"))?;
    let staging = target.with_file_name(format!(".{}.swap", file_name.to_string_lossy()));
    if fs::symlink_metadata(&staging).is_ok() {
        fs::remove_file(&staging)?;
    }
    unix_fs::symlink(source, &staging)?;
    fs::rename(&staging, target)?;
    Ok(())
}

/// Remove history entries other than the one just published.
fn prune_master(master_dir: &Path, keep: &Path) -> Result<()> {
    for entry in fs::read_dir(master_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path != keep && entry.file_type()?.is_dir() {
            debug!("pruning old publish {}", path.display());
            fs::remove_dir_all(&path)?;
        }
    }
    Ok(())
}

/// Write `listing` files naming the child directories at every level between
/// the served root and the published repository directory.
pub fn generate_listing_files(root: &Path, target: &Path) -> Result<()> {
    if !target.starts_with(root) {
        return Err(PublishError::invalid_config(format!(
            "publish target {} is outside served root {}",
            target.display(),
            root.display()
        )));
    }

    let mut dir = target.to_path_buf();
    while dir != root {
        dir = match dir.parent() {
            Some(parent) => parent.to_path_buf(),
            None => break,
        };
        write_listing(&dir)?;
        if dir == root {
            break;
        }
    }
    Ok(())
}

fn write_listing(dir: &Path) -> Result<()> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        // Listing files only name directories; follow symlinks so published
        // repository links are included.
        if entry.path().is_dir() {
            names.push(name);
        }
    }
    names.sort();
    fs::write(dir.join("listing"), names.join("\n"))?;
    Ok(())
}

/// Remove everything a prior publish created for one repository: the master
/// history directory and the served symlinks. Already-absent paths are fine.
pub fn remove_published(master_dir: &Path, targets: &[PathBuf]) -> Result<()> {
    match fs::remove_dir_all(master_dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    for target in targets {
        match fs::remove_file(target) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
