//! Latest-release resolution across major-version lines
//!
//! Go publishes incompatible major versions under distinct module paths
//! (`example.com/mod`, `example.com/mod/v2`, ...), so the true latest release
//! is found by probing successive `/vN` path variants until the backend
//! reports that no such line exists.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::module::ModuleInfo;
use crate::registry::{RegistryError, VersionSource};

static MAJOR_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/v\d+$").unwrap());

/// The resolved latest release together with every path probed on the way,
/// in probe order.
#[derive(Debug, Clone)]
pub struct LatestCandidate {
    pub info: ModuleInfo,
    pub probed_paths: Vec<String>,
}

/// Resolves the latest release of `path`.
///
/// With `traverse_major_lines` unset, the backend's unconstrained latest for
/// the declared path is final. Otherwise successive major-version paths are
/// probed until one of the termination conditions hits:
/// - the backend signals [`RegistryError::NotFound`] for the next line,
/// - a probe returns the same version as the previous iteration (cycle guard
///   against a misbehaving backend).
///
/// Any other backend error aborts resolution.
pub async fn resolve(
    repo: &dyn VersionSource,
    path: &str,
    traverse_major_lines: bool,
) -> Result<LatestCandidate, RegistryError> {
    let mut info = repo.get_latest_info(path).await?;
    let mut probed_paths = vec![path.to_string()];
    if !traverse_major_lines {
        return Ok(LatestCandidate { info, probed_paths });
    }

    loop {
        let candidate = major_line_path(&info.path, next_major(info.version.major));
        debug!("probing major-version line {candidate}");
        match repo.get_latest_info(&candidate).await {
            Err(RegistryError::NotFound(_)) => break,
            Err(err) => return Err(err),
            Ok(next_info) => {
                if next_info.version == info.version {
                    break;
                }
                probed_paths.push(candidate);
                info = next_info;
            }
        }
    }
    Ok(LatestCandidate { info, probed_paths })
}

/// The next major line to probe. Majors 0 and 1 share an unsuffixed path, so
/// the first candidate line is always v2.
fn next_major(major: u64) -> u64 {
    if major < 2 { 2 } else { major + 1 }
}

/// Derives the module path of a major-version line: replaces an existing
/// `/vN` suffix or appends one.
fn major_line_path(path: &str, major: u64) -> String {
    let suffix = format!("/v{major}");
    if MAJOR_SUFFIX_RE.is_match(path) {
        MAJOR_SUFFIX_RE.replace(path, suffix.as_str()).into_owned()
    } else {
        format!("{path}{suffix}")
    }
}
