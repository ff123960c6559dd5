//! Version-information backends
//!
//! Every backend implements [`VersionSource`]: listing published versions,
//! fetching publish-time info for one version, fetching the unconstrained
//! latest release, and fetching a module's go.mod file.
//!
//! Implementations:
//! - [`goproxy`]: GOPROXY protocol client, the default backend
//! - [`golist`]: `go list -m` shell-out, for environments behind a private proxy
//! - [`depsdev`]: deps.dev metadata index, fallback version listing only
//! - [`vcs`]: private-module routing to a git-backed source

pub mod depsdev;
pub mod golist;
pub mod goproxy;
pub mod vcs;

#[cfg(test)]
use mockall::automock;

use semver::Version;
use thiserror::Error;

use crate::cache::CacheError;
use crate::module::ModuleInfo;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The module path (or major-version line) has no published release.
    /// This is the typed sentinel consumed by the latest-release traversal;
    /// it never relies on message text.
    #[error("module not found: {0}")]
    NotFound(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("command failed: {0}")]
    Command(String),

    #[error("operation not supported by this backend: {0}")]
    Unsupported(&'static str),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// A backend able to answer version queries for module paths.
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait VersionSource: Send + Sync {
    /// Lists all published release versions of `path`, unordered.
    async fn get_versions(&self, path: &str) -> Result<Vec<Version>, RegistryError>;

    /// Fetches publish-time info for one specific version of `path`.
    async fn get_info(&self, path: &str, version: &Version) -> Result<ModuleInfo, RegistryError>;

    /// Fetches the unconstrained latest release of `path`.
    ///
    /// Returns [`RegistryError::NotFound`] when the path has no release at
    /// all, which the major-line traversal uses as its termination signal.
    async fn get_latest_info(&self, path: &str) -> Result<ModuleInfo, RegistryError>;

    /// Fetches the raw go.mod file of `path` at `version`.
    async fn get_mod_file(&self, path: &str, version: &Version) -> Result<Vec<u8>, RegistryError>;
}

/// A narrower source used only when the primary backend lists no versions
/// for a pre-release declared version.
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait FallbackVersionSource: Send + Sync {
    async fn get_versions(&self, path: &str) -> Result<Vec<Version>, RegistryError>;
}
