use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// Default number of dependencies resolved concurrently.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Environment variable overriding the concurrency limit.
pub const CONCURRENCY_ENV: &str = "LIBYEAR_CONCURRENCY";

/// Default whole-run timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Per-request timeout for HTTP backends in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

const PROGRAM_NAME: &str = "libyear";
const CACHE_FILE_NAME: &str = "modules";

/// Run configuration for the resolution pipeline.
///
/// All environment-derived settings (concurrency, proxy URL, private-path
/// patterns) are resolved by the caller and passed in explicitly, so the
/// pipeline itself never reads ambient process state.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of dependencies resolved in parallel.
    pub concurrency: usize,
    /// Keep dependencies marked `// indirect` in the report.
    pub include_indirect: bool,
    /// Drop dependencies for which no staleness could be computed.
    pub skip_fresh: bool,
    /// Compute the releases-diff metric.
    pub releases: bool,
    /// Compute the versions-diff metric.
    pub versions: bool,
    /// Traverse `/vN` major-version lines to find the true latest release.
    pub find_latest_major: bool,
    /// Disable libyear base-time compensation across major-line hops.
    pub no_libyear_compensation: bool,
    /// Resolve "latest" as the newest release published at or before this time.
    pub released_before: Option<DateTime<Utc>>,
    /// GOPROXY base URL override.
    pub goproxy_url: Option<String>,
    /// GOPRIVATE-style comma-separated prefix patterns for private modules.
    pub private_patterns: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            include_indirect: false,
            skip_fresh: false,
            releases: false,
            versions: false,
            find_latest_major: false,
            no_libyear_compensation: false,
            released_before: None,
            goproxy_url: None,
            private_patterns: String::new(),
        }
    }
}

/// Returns the default path of the persisted version cache.
/// Uses $XDG_CACHE_HOME/libyear/modules if XDG_CACHE_HOME is set,
/// otherwise falls back to ~/.cache/libyear/modules,
/// or ./libyear/modules if neither is available.
pub fn default_cache_file() -> PathBuf {
    cache_dir_with_env(std::env::var("XDG_CACHE_HOME").ok(), dirs::home_dir()).join(CACHE_FILE_NAME)
}

/// Returns the default directory for VCS clones of private modules.
pub fn default_vcs_cache_dir() -> PathBuf {
    cache_dir_with_env(std::env::var("XDG_CACHE_HOME").ok(), dirs::home_dir()).join("vcs")
}

fn cache_dir_with_env(xdg_cache_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let cache_dir = xdg_cache_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".cache")))
        .unwrap_or_else(|| PathBuf::from("."));

    cache_dir.join(PROGRAM_NAME)
}
