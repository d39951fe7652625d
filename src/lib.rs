//! # deb-publisher
//!
//! A Rust library for publishing Debian APT repositories from content units.
//! Given the unit collections a content-management host selects for one
//! repository (releases, components, and binary packages), it materializes
//! the on-disk APT layout: a `pool/` tree of linked artifacts and a `dists/`
//! tree of `Packages` and `Release` index files. The finished tree is
//! atomically swapped into the served locations and the release manifests
//! are signed.
//!
//! ## Features
//!
//! - `Packages` index generation with gzip and bzip2 variants
//! - `Release` manifest generation with MD5/SHA1/SHA256 checksum tables
//! - Streaming checksum backfill for package records without digests
//! - Architecture fan-out for `all` (architecture-independent) packages
//! - Idempotent pool layout and atomic directory publishing
//! - Structural parsing of `Depends` relationship fields
//!
//! ## Example
//!
//! ```rust
//! use deb_publisher::{Publisher, PublishConfig, RepositoryInfo};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PublishConfig::from_json(serde_json::json!({
//!     "publish_http": true,
//!     "publish_https": false,
//!     "relative_path": "debian/repo-1",
//! }))?;
//! config.validate()?;
//!
//! let publisher = Publisher::new(RepositoryInfo::new("repo-1", None), config);
//!
//! // Run a publish over host-supplied unit collections:
//! // publisher.publish(releases, components, packages, &working_dir);
//! # Ok(())
//! # }
//! ```

pub mod compression;
pub mod config;
pub mod dists;
pub mod error;
pub mod hash;
pub mod layout;
pub mod packages;
pub mod pool;
pub mod publisher;
pub mod relations;
pub mod release;
pub mod signer;
pub mod units;

pub use compression::Compression;
pub use config::PublishConfig;
pub use error::{PublishError, Result};
pub use hash::{HashAlgorithm, HashSet, HashedFile};
pub use packages::{Package, PackageKey, PackagesFile};
pub use publisher::{
    CancelToken, PublishReport, PublishStep, Publisher, RepositoryInfo, StepStatus,
};
pub use relations::{Constraint, Relation, VersionFlag};
pub use release::ReleaseFile;
pub use signer::{CommandSigner, ReleaseSigner};
pub use units::{Component, Release};

/// Compression formats applied to every generated index file.
pub const DEFAULT_COMPRESSIONS: &[Compression] =
    &[Compression::None, Compression::Gzip, Compression::Bzip2];
