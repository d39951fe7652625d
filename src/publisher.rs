//! The publish pipeline.
//!
//! One publish run is an ordered sequence of idempotent steps over a working
//! directory the caller owns exclusively. No partial result ever reaches the
//! served locations: the atomic swap is the last filesystem-visible step and
//! only happens once the whole working tree has been built.

use crate::config::PublishConfig;
use crate::dists::{build_component_indices, ReleaseScratch};
use crate::packages::{repair_all, Package, PackageKey};
use crate::pool::build_pool;
use crate::release::ReleaseFile;
use crate::signer::ReleaseSigner;
use crate::units::{synthesize_default_units, Component, Release};
use crate::{layout, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Descriptive information about the repository being published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    /// Repository identifier; becomes the manifest label when a release does
    /// not carry its own.
    pub name: String,
    /// Repository description.
    pub description: Option<String>,
}

impl RepositoryInfo {
    /// Create repository information.
    pub fn new<S: Into<String>>(name: S, description: Option<String>) -> Self {
        Self {
            name: name.into(),
            description,
        }
    }
}

/// Cooperative cancellation signal, checked between publish steps. A step in
/// flight always runs to completion or failure first.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a new, unsignaled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the publish run.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The coarse-grained publish steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStep {
    /// Checksum repair, default synthesis, and the pool layout.
    PublishPool,
    /// Per-release index tree generation.
    PublishDists,
    /// Release manifest generation and signing.
    WriteRelease,
    /// Atomic swap into the served locations.
    AtomicSwap,
    /// Listing file generation for the served parents.
    ListingFiles,
}

impl PublishStep {
    fn all() -> &'static [PublishStep] {
        &[
            PublishStep::PublishPool,
            PublishStep::PublishDists,
            PublishStep::WriteRelease,
            PublishStep::AtomicSwap,
            PublishStep::ListingFiles,
        ]
    }
}

/// Outcome of one publish step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The step has not run.
    Pending,
    /// The step completed.
    Completed,
    /// The step was skipped (empty repository body).
    Skipped,
    /// The step failed; its error aborted the publish.
    Failed,
    /// The publish was canceled before this step ran.
    Canceled,
}

/// Status of a single step in the publish report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    /// The step.
    pub step: PublishStep,
    /// Its outcome.
    pub status: StepStatus,
}

/// Structured report of one publish run, handed back to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishReport {
    /// Whether the whole publish completed.
    pub success: bool,
    /// Whether the publish was canceled.
    pub canceled: bool,
    /// Per-step outcomes, in execution order.
    pub steps: Vec<StepReport>,
    /// The first fatal error, if any.
    pub error: Option<String>,
}

impl PublishReport {
    fn new() -> Self {
        Self {
            success: false,
            canceled: false,
            steps: PublishStep::all()
                .iter()
                .map(|&step| StepReport {
                    step,
                    status: StepStatus::Pending,
                })
                .collect(),
            error: None,
        }
    }

    fn set(&mut self, step: PublishStep, status: StepStatus) {
        if let Some(entry) = self.steps.iter_mut().find(|entry| entry.step == step) {
            entry.status = status;
        }
    }

    /// The recorded status of a step.
    pub fn status(&self, step: PublishStep) -> StepStatus {
        self.steps
            .iter()
            .find(|entry| entry.step == step)
            .map(|entry| entry.status)
            .unwrap_or(StepStatus::Pending)
    }

    fn mark_canceled(&mut self) {
        self.canceled = true;
        for entry in &mut self.steps {
            if entry.status == StepStatus::Pending {
                entry.status = StepStatus::Canceled;
            }
        }
    }
}

/// Drives one publish run: pool layout, dists generation, manifest writing
/// and signing, atomic swap, listing files.
pub struct Publisher {
    repository: RepositoryInfo,
    config: PublishConfig,
    signer: Option<Box<dyn ReleaseSigner>>,
    cancel: CancelToken,
}

impl Publisher {
    /// Create a publisher. A signer is wired up automatically when the
    /// configuration names a signing command.
    pub fn new(repository: RepositoryInfo, config: PublishConfig) -> Self {
        let signer = config
            .signer(&repository.name)
            .map(|s| Box::new(s) as Box<dyn ReleaseSigner>);
        Self {
            repository,
            config,
            signer,
            cancel: CancelToken::new(),
        }
    }

    /// Replace the signer.
    pub fn with_signer(mut self, signer: Box<dyn ReleaseSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// A handle the host can use to request cancellation from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run the full pipeline against the given unit collections and working
    /// directory. The working directory must be exclusively owned by this
    /// run; on success its contents end up under the master publish history.
    pub fn publish(
        &self,
        releases: Vec<Release>,
        components: Vec<Component>,
        packages: Vec<Package>,
        working_dir: &Path,
    ) -> PublishReport {
        info!("publishing deb repository {}", self.repository.name);
        let mut report = PublishReport::new();
        match self.run(&mut report, releases, components, packages, working_dir) {
            Ok(()) => {}
            Err(e) => {
                warn!("publish of {} failed: {}", self.repository.name, e);
                report.error = Some(e.to_string());
            }
        }
        report
    }

    fn run(
        &self,
        report: &mut PublishReport,
        mut releases: Vec<Release>,
        mut components: Vec<Component>,
        packages: Vec<Package>,
        working_dir: &Path,
    ) -> Result<()> {
        self.config.validate()?;

        let mut units: BTreeMap<PackageKey, Package> = packages
            .into_iter()
            .map(|package| (package.key(), package))
            .collect();

        if self.check_canceled(report) {
            return Ok(());
        }

        if units.is_empty() {
            // An empty repository body is intentionally not materialized;
            // the atomic publish below still runs against the empty tree.
            info!("repository {} has no packages", self.repository.name);
            report.set(PublishStep::PublishPool, StepStatus::Skipped);
            report.set(PublishStep::PublishDists, StepStatus::Skipped);
            report.set(PublishStep::WriteRelease, StepStatus::Skipped);
        } else {
            let outcome = repair_all(&mut units).and_then(|()| {
                synthesize_default_units(
                    &mut releases,
                    &mut components,
                    &units,
                    self.config.publish_default_release,
                );
                build_pool(working_dir, &components, &units)
            });
            self.finish_step(report, PublishStep::PublishPool, outcome)?;
            if self.check_canceled(report) {
                return Ok(());
            }

            let outcome = self.build_dists(working_dir, &releases, &components, &units);
            let built = self.finish_step(report, PublishStep::PublishDists, outcome)?;
            if self.check_canceled(report) {
                return Ok(());
            }

            let outcome = self.write_releases(built);
            self.finish_step(report, PublishStep::WriteRelease, outcome)?;
        }

        if self.check_canceled(report) {
            return Ok(());
        }

        let targets: Vec<PathBuf> = self
            .config
            .target_pairs()
            .into_iter()
            .map(|(_, target)| target)
            .collect();
        let outcome =
            layout::atomic_publish(working_dir, &self.config.master_dir(), &targets).map(|_| ());
        self.finish_step(report, PublishStep::AtomicSwap, outcome)?;
        if self.check_canceled(report) {
            return Ok(());
        }

        let outcome = self
            .config
            .target_pairs()
            .iter()
            .try_for_each(|(root, target)| layout::generate_listing_files(root, target));
        self.finish_step(report, PublishStep::ListingFiles, outcome)?;

        report.success = true;
        info!("publish of {} finished", self.repository.name);
        Ok(())
    }

    /// Build the dists tree for every release, returning each release with
    /// its directory and accumulated scratch state.
    fn build_dists(
        &self,
        working_dir: &Path,
        releases: &[Release],
        components: &[Component],
        units: &BTreeMap<PackageKey, Package>,
    ) -> Result<Vec<(Release, PathBuf, ReleaseScratch)>> {
        let dists_path = working_dir.join("dists");
        std::fs::create_dir_all(&dists_path)?;

        let mut built = Vec::new();
        for release in releases {
            let dist_name = release.dist_name()?;
            let release_path = dists_path.join(dist_name);
            std::fs::create_dir_all(&release_path)?;

            let mut scratch = ReleaseScratch::default();
            for component in components {
                if component.release == dist_name {
                    build_component_indices(&release_path, component, units, &mut scratch)?;
                }
            }
            built.push((release.clone(), release_path, scratch));
        }
        Ok(built)
    }

    /// Write and sign the `Release` manifest of every built release.
    fn write_releases(&self, built: Vec<(Release, PathBuf, ReleaseScratch)>) -> Result<()> {
        for (release, release_path, scratch) in built {
            let mut manifest = ReleaseFile::new();
            manifest.codename = release.codename.clone();
            manifest.suite = release.suite.clone();
            manifest.label = release
                .label
                .clone()
                .or_else(|| Some(self.repository.name.clone()));
            manifest.description = release
                .description
                .clone()
                .or_else(|| self.repository.description.clone());
            manifest.components = scratch.components.into_iter().collect();
            manifest.architectures = scratch.architectures.into_iter().collect();
            manifest.files = scratch.index_files;

            let manifest_path = manifest.write(&release_path)?;
            if let Some(ref signer) = self.signer {
                signer.sign(&manifest_path)?;
            }
        }
        Ok(())
    }

    fn finish_step<T>(
        &self,
        report: &mut PublishReport,
        step: PublishStep,
        outcome: Result<T>,
    ) -> Result<T> {
        match outcome {
            Ok(value) => {
                report.set(step, StepStatus::Completed);
                Ok(value)
            }
            Err(e) => {
                report.set(step, StepStatus::Failed);
                Err(e)
            }
        }
    }

    fn check_canceled(&self, report: &mut PublishReport) -> bool {
        if self.cancel.is_canceled() {
            info!("publish of {} canceled", self.repository.name);
            report.mark_canceled();
            true
        } else {
            false
        }
    }
}
