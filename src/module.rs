//! Dependency record and Go-flavored semver helpers
//!
//! Go module versions carry a leading `v` (`v1.2.3`), may use build metadata
//! for pre-module-era releases (`v2.0.0+incompatible`) and encode untagged
//! commits as pseudo-versions (`v0.0.0-20190101000000-abcdef123456`), which
//! parse as pre-release qualifiers.

use chrono::{DateTime, Utc};
use semver::Version;
use serde::Serialize;

/// A single published release of a module: the unit returned by every
/// version-information backend and stored in the publish-time cache.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleInfo {
    pub path: String,
    pub version: Version,
    pub time: DateTime<Utc>,
}

/// One dependency of the analyzed manifest, carrying the declared version and
/// the staleness metrics computed for it.
///
/// Each record is exclusively owned by the one resolution task it is moved
/// into; there is no shared mutation across tasks.
#[derive(Debug, Clone)]
pub struct Module {
    /// Module path, the resolution key.
    pub path: String,
    /// Version declared in the manifest.
    pub version: Version,
    /// Publish time of the declared version, unknown until fetched.
    pub time: Option<DateTime<Utc>>,
    /// Whether the manifest marked this dependency `// indirect`.
    pub indirect: bool,
    /// True only once every requested metric was computed successfully.
    pub resolved: bool,
    /// The resolved latest release. `None` means the declared version is
    /// already current.
    pub latest: Option<ModuleInfo>,
    pub libyear: f64,
    pub releases_diff: Option<i64>,
    pub versions_diff: VersionsDiff,
    /// Every path probed while traversing major-version lines, in probe
    /// order. Contains at least the module's own path once resolution
    /// completed.
    pub probed_paths: Vec<String>,
}

impl Module {
    pub fn new(path: impl Into<String>, version: Version, indirect: bool) -> Self {
        Self {
            path: path.into(),
            version,
            time: None,
            indirect,
            resolved: false,
            latest: None,
            libyear: 0.0,
            releases_diff: None,
            versions_diff: VersionsDiff::default(),
            probed_paths: Vec::new(),
        }
    }

    /// Version shown in the "latest" report columns: the resolved latest, or
    /// the module's own version when it is already current.
    pub fn latest_version(&self) -> &Version {
        self.latest.as_ref().map_or(&self.version, |l| &l.version)
    }

    /// Publish time shown in the "latest" report columns.
    pub fn latest_time(&self) -> Option<DateTime<Utc>> {
        self.latest.as_ref().map(|l| l.time).or(self.time)
    }
}

/// Per-component semantic version delta: `[major, minor, patch]`.
///
/// At most one component is non-zero, the highest-order one that differs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VersionsDiff(pub [i64; 3]);

impl VersionsDiff {
    pub fn add(self, other: VersionsDiff) -> VersionsDiff {
        VersionsDiff([
            self.0[0] + other.0[0],
            self.0[1] + other.0[1],
            self.0[2] + other.0[2],
        ])
    }
}

impl std::fmt::Display for VersionsDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}, {}]", self.0[0], self.0[1], self.0[2])
    }
}

/// Parse a Go module version string into a [`semver::Version`].
///
/// Strips the mandatory leading `v`. Pseudo-versions and `+incompatible`
/// suffixes parse as pre-release and build metadata respectively.
pub fn parse_go_version(version: &str) -> Option<Version> {
    let stripped = version.strip_prefix('v')?;
    Version::parse(stripped).ok()
}

/// Format a version back into Go notation (`v1.2.3`).
pub fn format_go_version(version: &Version) -> String {
    format!("v{version}")
}

/// Whether the version carries a pre-release (or pseudo-version) qualifier.
pub fn is_prerelease(version: &Version) -> bool {
    !version.pre.is_empty()
}
