//! Release and component unit records, and default grouping synthesis.

use crate::packages::{Package, PackageKey};
use crate::{PublishError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// A release unit. At least one of codename and suite must be set; the
/// on-disk directory name under `dists/` is the codename when present,
/// otherwise the suite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Release codename.
    pub codename: Option<String>,
    /// Release suite.
    pub suite: Option<String>,
    /// Label stamped into the manifest; falls back to the repository name.
    pub label: Option<String>,
    /// Description stamped into the manifest; falls back to the repository
    /// description.
    pub description: Option<String>,
}

impl Release {
    /// Create a release identified by suite only.
    pub fn with_suite<S: Into<String>>(suite: S) -> Self {
        Self {
            suite: Some(suite.into()),
            ..Default::default()
        }
    }

    /// Create a release identified by codename and suite.
    pub fn with_codename_and_suite<S: Into<String>>(codename: S, suite: S) -> Self {
        Self {
            codename: Some(codename.into()),
            suite: Some(suite.into()),
            ..Default::default()
        }
    }

    /// The release's directory name under `dists/`.
    pub fn dist_name(&self) -> Result<&str> {
        self.codename
            .as_deref()
            .or(self.suite.as_deref())
            .ok_or_else(|| {
                PublishError::invalid_config("neither codename nor suite is set on release")
            })
    }
}

/// A component unit: a named grouping of package identities within one
/// release. Component names may contain `/` and then map to nested
/// directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    /// Component name.
    pub name: String,
    /// Directory name of the release this component belongs to.
    pub release: String,
    /// Identities of the packages grouped by this component.
    pub packages: Vec<PackageKey>,
}

impl Component {
    /// Create a component over the given package identities.
    pub fn new<S: Into<String>>(name: S, release: S, packages: Vec<PackageKey>) -> Self {
        Self {
            name: name.into(),
            release: release.into(),
            packages,
        }
    }
}

/// Synthesize default groupings so every package belongs to at least one
/// (release, component) pair.
///
/// With no release units at all (an old-style repository), everything is
/// published as `stable`/`main`. When `publish_default_release` is set, an
/// additional `default`/`all` alias covering every package is published.
/// User-supplied units are never removed or altered.
pub fn synthesize_default_units(
    releases: &mut Vec<Release>,
    components: &mut Vec<Component>,
    units: &BTreeMap<PackageKey, Package>,
    publish_default_release: bool,
) {
    if releases.is_empty() {
        debug!("no release units; publishing as stable/main");
        releases.push(Release::with_suite("stable"));
        components.push(Component::new(
            "main".to_string(),
            "stable".to_string(),
            units.keys().cloned().collect(),
        ));
    }

    if publish_default_release {
        debug!("also publishing as default/all");
        releases.push(Release::with_codename_and_suite("default", "default"));
        components.push(Component::new(
            "all".to_string(),
            "default".to_string(),
            units.keys().cloned().collect(),
        ));
    }
}
