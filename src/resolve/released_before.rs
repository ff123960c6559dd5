//! Date-bounded latest-release resolution
//!
//! Finds the newest release of a module published at or before a cutoff.
//! Publish time is only approximately monotonic in version order (backports
//! create local inversions), so the search keeps a running best by publish
//! time instead of stopping at the first qualifying index. The result is a
//! bounded number of per-version fetches: exact whenever publish time is
//! non-decreasing in version order, best-effort under local inversions —
//! an accepted trade-off, not a defect.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::module::ModuleInfo;
use crate::registry::VersionSource;
use crate::resolve::ResolveError;

/// Resolves the latest release of `path` published at or before `cutoff`.
///
/// When `declared` is given, its publish time must not be after `cutoff`
/// (the caller's "current" release cannot postdate the cutoff bounding the
/// search); it also seeds the running best and restricts the search to
/// versions strictly above it.
pub async fn resolve_before(
    repo: &dyn VersionSource,
    path: &str,
    cutoff: DateTime<Utc>,
    declared: Option<&ModuleInfo>,
) -> Result<ModuleInfo, ResolveError> {
    if let Some(declared) = declared {
        if declared.time > cutoff {
            return Err(ResolveError::CutoffPrecondition {
                declared: declared.time,
                cutoff,
            });
        }
    }

    let mut versions = repo.get_versions(path).await?;
    versions.sort();

    let mut best: Option<ModuleInfo> = declared.cloned();
    let mut start = 0_i64;
    let mut end = versions.len() as i64 - 1;
    if let Some(declared) = declared {
        // The declared version's publish time is already known; search only
        // strictly above it.
        if let Some(index) = versions.iter().position(|v| *v == declared.version) {
            start = index as i64 + 1;
        }
    }

    while start <= end {
        let mid = (start + end) / 2;
        let info = repo.get_info(path, &versions[mid as usize]).await?;
        debug!("probed {path}@{} published {}", info.version, info.time);
        if info.time > cutoff {
            // Too new; the qualifying releases are below.
            end = mid - 1;
        } else {
            // Compare by time, not index: a local inversion can make a
            // lower-indexed version the latest qualifying release.
            if best.as_ref().is_none_or(|b| info.time > b.time) {
                best = Some(info);
            }
            // A higher-indexed version may still qualify; keep searching up.
            start = mid + 1;
        }
    }

    best.ok_or_else(|| ResolveError::NoVersionBeforeCutoff {
        path: path.to_string(),
        cutoff,
    })
}
