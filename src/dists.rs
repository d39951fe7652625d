//! Per-release index tree generation with the architecture fan-out rule.

use crate::hash::HashedFile;
use crate::packages::{Package, PackageKey, PackagesFile};
use crate::units::Component;
use crate::{PublishError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Per-release working state accumulated while the dists tree is generated:
/// the component and architecture sets for the manifest, and every generated
/// index file in generation order.
#[derive(Debug, Default)]
pub struct ReleaseScratch {
    /// Names of the components materialized for this release.
    pub components: BTreeSet<String>,
    /// Architectures materialized for this release, excluding `all`.
    pub architectures: BTreeSet<String>,
    /// Generated index files, paths relative to the release directory.
    pub index_files: Vec<HashedFile>,
}

/// Partition packages by architecture, fanning `all` packages out into every
/// concrete architecture bucket. The `all` bucket itself is kept, so an
/// architecture-independent index is also produced. Buckets only exist for
/// architectures that actually have packages.
pub fn arch_buckets(packages: Vec<&Package>) -> BTreeMap<String, Vec<&Package>> {
    let mut buckets: BTreeMap<String, Vec<&Package>> = BTreeMap::new();
    for package in packages {
        buckets
            .entry(package.architecture.clone())
            .or_default()
            .push(package);
    }

    if let Some(all_units) = buckets.get("all").cloned() {
        for (architecture, members) in buckets.iter_mut() {
            if architecture != "all" {
                members.extend(all_units.iter().copied());
            }
        }
    }

    buckets
}

/// Build `<component>/binary-<arch>/` index trees for one component under
/// the release directory, recording the results into the release scratch.
pub fn build_component_indices(
    release_path: &Path,
    component: &Component,
    units: &BTreeMap<PackageKey, Package>,
    scratch: &mut ReleaseScratch,
) -> Result<()> {
    scratch.components.insert(component.name.clone());
    let component_path = release_path.join(&component.name);
    fs::create_dir_all(&component_path).map_err(|e| {
        PublishError::DirectoryCreation(format!("{}: {}", component_path.display(), e))
    })?;

    let mut resolved = Vec::new();
    for key in &component.packages {
        match units.get(key) {
            Some(package) => resolved.push(package),
            None => warn!("component {} lists unknown package {}", component.name, key),
        }
    }

    for (architecture, members) in arch_buckets(resolved) {
        if architecture != "all" {
            scratch.architectures.insert(architecture.clone());
        }
        let arch_path = component_path.join(format!("binary-{}", architecture));
        fs::create_dir_all(&arch_path).map_err(|e| {
            PublishError::DirectoryCreation(format!("{}: {}", arch_path.display(), e))
        })?;
        debug!(
            "writing {} package(s) for {}/binary-{}",
            members.len(),
            component.name,
            architecture
        );

        let index = PackagesFile::new(component.name.clone(), members);
        for file in index.write(&arch_path)? {
            let relative = format!("{}/binary-{}/{}", component.name, architecture, file.path);
            let mut recorded = HashedFile::new(relative, file.size);
            recorded.hashes = file.hashes;
            scratch.index_files.push(recorded);
        }
    }

    Ok(())
}
