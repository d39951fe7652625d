//! Pool directory layout: linking package artifacts under their components.

use crate::packages::{Package, PackageKey};
use crate::units::Component;
use crate::{PublishError, Result};
use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs as unix_fs;
use std::path::Path;
use tracing::{debug, warn};

/// Create `pool/` and link every component's packages beneath it.
///
/// Component names may contain `/` and map to nested directories. A
/// destination that already exists is left untouched, so the layout is
/// idempotent across retried or partially completed publishes.
pub fn build_pool(
    base_path: &Path,
    components: &[Component],
    units: &BTreeMap<PackageKey, Package>,
) -> Result<()> {
    let pool_path = base_path.join("pool");
    create_dir(&pool_path)?;

    for component in components {
        let component_path = pool_path.join(&component.name);
        create_dir(&component_path)?;

        for key in &component.packages {
            let package = match units.get(key) {
                Some(package) => package,
                None => {
                    warn!("component {} lists unknown package {}", component.name, key);
                    continue;
                }
            };
            let destination = component_path.join(&package.filename);
            if fs::symlink_metadata(&destination).is_ok() {
                if let Ok(existing) = fs::read_link(&destination) {
                    if existing != package.storage_path {
                        warn!(
                            "pool entry {} already points at {}, leaving it untouched",
                            destination.display(),
                            existing.display()
                        );
                        continue;
                    }
                }
                debug!("pool entry {} already exists", destination.display());
                continue;
            }
            unix_fs::symlink(&package.storage_path, &destination)?;
        }
    }

    Ok(())
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| {
        PublishError::DirectoryCreation(format!("{}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn component_with(packages: &[&Package], name: &str) -> Component {
        Component::new(
            name.to_string(),
            "stable".to_string(),
            packages.iter().map(|p| p.key()).collect(),
        )
    }

    fn stored_package(storage: &Path, name: &str) -> Package {
        let artifact = storage.join(format!("{}_1.0_amd64.deb", name));
        fs::write(&artifact, name.as_bytes()).unwrap();
        Package::new(name, "1.0", "amd64", &artifact)
    }

    #[test]
    fn test_pool_links_artifacts() {
        let storage = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let package = stored_package(storage.path(), "hello");
        let component = component_with(&[&package], "main");
        let units = BTreeMap::from([(package.key(), package.clone())]);

        build_pool(work.path(), &[component], &units).unwrap();

        let link = work.path().join("pool/main/hello_1.0_amd64.deb");
        assert_eq!(fs::read_link(&link).unwrap(), package.storage_path);
        assert_eq!(fs::read(&link).unwrap(), b"hello");
    }

    #[test]
    fn test_pool_is_idempotent() {
        let storage = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let package = stored_package(storage.path(), "hello");
        let component = component_with(&[&package], "main");
        let units = BTreeMap::from([(package.key(), package.clone())]);

        build_pool(work.path(), std::slice::from_ref(&component), &units).unwrap();
        build_pool(work.path(), std::slice::from_ref(&component), &units).unwrap();

        let entries: Vec<_> = fs::read_dir(work.path().join("pool/main"))
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_nested_component_names() {
        let storage = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let package = stored_package(storage.path(), "hello");
        let component = component_with(&[&package], "updates/main");
        let units = BTreeMap::from([(package.key(), package.clone())]);

        build_pool(work.path(), &[component], &units).unwrap();

        assert!(work
            .path()
            .join("pool/updates/main/hello_1.0_amd64.deb")
            .exists());
    }

    #[test]
    fn test_existing_destination_left_untouched() {
        let storage = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let package = stored_package(storage.path(), "hello");
        let component = component_with(&[&package], "main");
        let units = BTreeMap::from([(package.key(), package.clone())]);

        let component_dir = work.path().join("pool/main");
        fs::create_dir_all(&component_dir).unwrap();
        let destination = component_dir.join(&package.filename);
        fs::write(&destination, b"pre-existing").unwrap();

        build_pool(work.path(), &[component], &units).unwrap();

        assert_eq!(fs::read(&destination).unwrap(), b"pre-existing");
    }

    #[test]
    fn test_unknown_package_identity_is_skipped() {
        let work = TempDir::new().unwrap();
        let component = Component::new(
            "main".to_string(),
            "stable".to_string(),
            vec![PackageKey::new("ghost", "1.0", "amd64")],
        );

        build_pool(work.path(), &[component], &BTreeMap::new()).unwrap();

        let entries: Vec<_> = fs::read_dir(work.path().join("pool/main"))
            .unwrap()
            .collect();
        assert!(entries.is_empty());
    }
}
