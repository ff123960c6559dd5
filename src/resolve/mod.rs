//! Resolution pipeline
//!
//! The [`Command`] drives one run: read the manifest, resolve every
//! dependency under bounded concurrency, aggregate totals into the root row
//! and hand the summary to the configured output.
//!
//! The fan-out is fail-fast: the first task error cancels the remaining
//! in-flight and queued tasks and becomes the run's error. Each dependency
//! record is moved into exactly one task and moved back out, so no record is
//! ever shared between tasks.
//!
//! # Modules
//!
//! - [`latest`]: major-version-line traversal for the true latest release
//! - [`released_before`]: date-bounded binary search resolver
//! - [`metrics`]: the three staleness metric calculators

pub mod latest;
pub mod metrics;
pub mod released_before;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use thiserror::Error;
use tracing::warn;

use crate::config::Config;
use crate::manifest::{GoModParser, ManifestError};
use crate::module::{Module, ModuleInfo, is_prerelease};
use crate::output::{Output, OutputError, Summary, Totals};
use crate::registry::depsdev::DepsDevClient;
use crate::registry::golist::GoListExecutor;
use crate::registry::goproxy::{self, GoProxyClient};
use crate::registry::vcs::VcsRegistry;
use crate::registry::{FallbackVersionSource, RegistryError, VersionSource};
use crate::source::{ManifestSource, SourceError};
use crate::cache::VersionStore;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("current version was published at {declared}, after the requested cutoff {cutoff}")]
    CutoffPrecondition {
        declared: DateTime<Utc>,
        cutoff: DateTime<Utc>,
    },

    #[error("no version of '{path}' was released before {cutoff}")]
    NoVersionBeforeCutoff {
        path: String,
        cutoff: DateTime<Utc>,
    },
}

/// One configured pipeline run.
pub struct Command {
    source: ManifestSource,
    output: Box<dyn Output>,
    repo: Arc<dyn VersionSource>,
    fallback: Arc<dyn FallbackVersionSource>,
    vcs: Option<Arc<VcsRegistry>>,
    config: Config,
}

impl Command {
    pub fn builder(source: ManifestSource, output: Box<dyn Output>) -> CommandBuilder {
        CommandBuilder::new(source, output)
    }

    pub async fn run(&self) -> Result<(), ResolveError> {
        let data = self.source.read(self.repo.as_ref(), self.vcs.as_deref()).await?;
        let content = String::from_utf8_lossy(&data);
        let (root_path, mut modules) = GoModParser::new().parse(&content)?;

        if !self.config.include_indirect {
            modules.retain(|module| !module.indirect);
        }

        let mut resolved: Vec<(usize, Module)> = stream::iter(modules.into_iter().enumerate())
            .map(|(index, module)| async move {
                self.resolve_module(module).await.map(|module| (index, module))
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .try_collect()
            .await?;
        // Tasks complete in any order; the report keeps manifest order.
        resolved.sort_by_key(|(index, _)| *index);
        let mut modules: Vec<Module> = resolved.into_iter().map(|(_, module)| module).collect();

        if self.config.skip_fresh {
            modules.retain(|module| module.resolved);
        }

        let mut totals = Totals::default();
        for module in &modules {
            totals.libyear += module.libyear;
            totals.releases += module.releases_diff.unwrap_or(0);
            totals.versions = totals.versions.add(module.versions_diff);
        }

        self.output.send(&Summary {
            root_path,
            // Date-bounded runs report "as of the cutoff", not "as of now".
            root_time: self.config.released_before.unwrap_or_else(Utc::now),
            totals,
            modules,
            releases: self.config.releases,
            versions: self.config.versions,
        })?;
        Ok(())
    }

    /// Resolves one dependency record. The record is skipped (left
    /// unresolved) unless every requested metric could be computed.
    async fn resolve_module(&self, mut module: Module) -> Result<Module, ResolveError> {
        let handler: Arc<dyn VersionSource>;
        let repo: &dyn VersionSource = match &self.vcs {
            Some(vcs) if vcs.is_private(&module.path) => {
                handler = vcs.handler(&module.path).await?;
                handler.as_ref()
            }
            _ => self.repo.as_ref(),
        };

        module.resolved = false;

        let latest_info = match self.config.released_before {
            Some(cutoff) => {
                if module.time.is_none() {
                    module.time = Some(repo.get_info(&module.path, &module.version).await?.time);
                }
                let declared = ModuleInfo {
                    path: module.path.clone(),
                    version: module.version.clone(),
                    time: module.time.unwrap_or(cutoff),
                };
                module.probed_paths = vec![module.path.clone()];
                released_before::resolve_before(repo, &module.path, cutoff, Some(&declared)).await?
            }
            None => {
                let candidate =
                    latest::resolve(repo, &module.path, self.config.find_latest_major).await?;
                module.probed_paths = candidate.probed_paths;
                candidate.info
            }
        };

        if module.version >= latest_info.version {
            // Already current. The publish time of the declared version is
            // exactly what the latest probe returned.
            if module.time.is_none() {
                module.time = Some(latest_info.time);
            }
            return Ok(module);
        }
        module.latest = Some(latest_info.clone());

        if module.time.is_none() {
            module.time = Some(repo.get_info(&module.path, &module.version).await?.time);
        }
        let mut base_time = module.time.unwrap_or(latest_info.time);

        // Crossing an incompatible major-version boundary, a late patch
        // release on the superseded line understates the real staleness;
        // measure from the new line's first release instead.
        if self.config.find_latest_major
            && !self.config.no_libyear_compensation
            && latest_info.path != module.path
        {
            if let Some(first_release) = first_release_time(repo, &latest_info.path).await? {
                if base_time > first_release {
                    base_time = first_release;
                }
            }
        }
        module.libyear = metrics::libyear(base_time, latest_info.time);

        if self.config.releases {
            let Some(versions) = self.combined_versions(repo, &module).await? else {
                warn!("module '{}' does not have any versions", module.path);
                return Ok(module);
            };
            let Some(diff) =
                metrics::releases_diff(&module.version, &latest_info.version, &versions)
            else {
                warn!(
                    "module '{}': declared or latest version missing from version list",
                    module.path
                );
                return Ok(module);
            };
            module.releases_diff = Some(diff);
        }

        if self.config.versions {
            module.versions_diff = metrics::versions_diff(&module.version, &latest_info.version);
        }

        module.resolved = true;
        Ok(module)
    }

    /// The ascending union of version lists over every probed path, falling
    /// back to the secondary source for pre-release declared versions.
    ///
    /// Ordinary version listings omit pre-releases, which is fine unless the
    /// declared version is itself a pre-release.
    async fn combined_versions(
        &self,
        repo: &dyn VersionSource,
        module: &Module,
    ) -> Result<Option<Vec<semver::Version>>, ResolveError> {
        let mut versions = Vec::new();
        for path in &module.probed_paths {
            versions.extend(repo.get_versions(path).await?);
        }
        if versions.is_empty() {
            if !is_prerelease(&module.version) {
                return Ok(None);
            }
            versions = match self.fallback.get_versions(&module.path).await {
                Ok(versions) => versions,
                Err(RegistryError::NotFound(_)) => return Ok(None),
                Err(err) => return Err(err.into()),
            };
            if versions.is_empty() {
                return Ok(None);
            }
        }
        versions.sort();
        versions.dedup();
        Ok(Some(versions))
    }
}

/// Publish time of the first-ever release of `path`, `None` when the path
/// lists no versions.
async fn first_release_time(
    repo: &dyn VersionSource,
    path: &str,
) -> Result<Option<DateTime<Utc>>, RegistryError> {
    let versions = repo.get_versions(path).await?;
    let Some(first) = versions.into_iter().min() else {
        return Ok(None);
    };
    Ok(Some(repo.get_info(path, &first).await?.time))
}

/// Assembles a [`Command`], defaulting the backend to the GOPROXY client and
/// the fallback to deps.dev when not overridden.
pub struct CommandBuilder {
    source: ManifestSource,
    output: Box<dyn Output>,
    repo: Option<Arc<dyn VersionSource>>,
    fallback: Option<Arc<dyn FallbackVersionSource>>,
    vcs: Option<Arc<VcsRegistry>>,
    store: Option<Arc<VersionStore>>,
    use_go_list: bool,
    config: Config,
}

impl CommandBuilder {
    pub fn new(source: ManifestSource, output: Box<dyn Output>) -> Self {
        Self {
            source,
            output,
            repo: None,
            fallback: None,
            vcs: None,
            store: None,
            use_go_list: false,
            config: Config::default(),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_repo(mut self, repo: Arc<dyn VersionSource>) -> Self {
        self.repo = Some(repo);
        self
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackVersionSource>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_vcs_registry(mut self, vcs: Arc<VcsRegistry>) -> Self {
        self.vcs = Some(vcs);
        self
    }

    pub fn with_store(mut self, store: Arc<VersionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_go_list(mut self, use_go_list: bool) -> Self {
        self.use_go_list = use_go_list;
        self
    }

    pub fn build(self) -> Command {
        let repo: Arc<dyn VersionSource> = match self.repo {
            Some(repo) => repo,
            None if self.use_go_list => Arc::new(GoListExecutor::new(self.store)),
            None => {
                let base_url = self
                    .config
                    .goproxy_url
                    .clone()
                    .unwrap_or_else(|| goproxy::DEFAULT_BASE_URL.to_string());
                Arc::new(GoProxyClient::new(&base_url, self.store))
            }
        };
        let fallback = self
            .fallback
            .unwrap_or_else(|| Arc::new(DepsDevClient::default()));
        Command {
            source: self.source,
            output: self.output,
            repo,
            fallback,
            vcs: self.vcs,
            config: self.config,
        }
    }
}
