//! Private-module routing and git-backed version source
//!
//! Modules matched by GOPRIVATE-style prefix patterns never go through the
//! proxy; the router hands them to a VCS handler instead. The git handler
//! clones the repository into a cache directory and reads releases from its
//! tags.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use semver::Version;
use tokio::process::Command;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::module::{ModuleInfo, parse_go_version};
use crate::registry::{RegistryError, VersionSource};

/// Routes private module paths to the VCS handler able to serve them.
pub struct VcsRegistry {
    git: Arc<GitVcs>,
    private_patterns: Vec<String>,
}

impl VcsRegistry {
    /// `private_patterns` is a comma-separated GOPRIVATE-style pattern list.
    pub fn new(cache_dir: PathBuf, private_patterns: &str) -> Self {
        Self {
            git: Arc::new(GitVcs::new(cache_dir)),
            private_patterns: private_patterns
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Whether the path matches any of the configured private patterns.
    pub fn is_private(&self, path: &str) -> bool {
        self.private_patterns
            .iter()
            .any(|pattern| match_prefix_pattern(pattern, path))
    }

    /// Returns the VCS-backed version source handling `path`.
    pub async fn handler(&self, path: &str) -> Result<Arc<dyn VersionSource>, RegistryError> {
        if self.git.can_handle(path).await? {
            return Ok(self.git.clone() as Arc<dyn VersionSource>);
        }
        Err(RegistryError::Command(format!(
            "private module path '{path}' cannot be handled by any supported VCS [git]"
        )))
    }
}

/// Glob-prefix matching as used by GOPRIVATE: the pattern matches the path
/// when its elements match the path's leading elements, with `*` and `?`
/// wildcards that never cross a `/` boundary.
fn match_prefix_pattern(pattern: &str, path: &str) -> bool {
    let pattern_elems: Vec<&str> = pattern.split('/').collect();
    let path_elems: Vec<&str> = path.split('/').collect();
    if pattern_elems.len() > path_elems.len() {
        return false;
    }
    pattern_elems
        .iter()
        .zip(&path_elems)
        .all(|(pat, elem)| match_element(pat, elem))
}

fn match_element(pattern: &str, element: &str) -> bool {
    let mut regex = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => regex.push_str("[^/]*"),
            '?' => regex.push_str("[^/]"),
            c => regex.push_str(&regex::escape(&c.to_string())),
        }
    }
    regex.push('$');
    Regex::new(&regex).is_ok_and(|re| re.is_match(element))
}

/// Module handler for git repositories hosted on github.com.
pub struct GitVcs {
    cache_dir: PathBuf,
    repos: RwLock<HashMap<String, Arc<GitRepo>>>,
    github_re: Regex,
}

/// One cloned repository. Tag listing is lazy and cached for the run.
struct GitRepo {
    url: String,
    dir: PathBuf,
    tags: Mutex<Option<Vec<GitTag>>>,
}

#[derive(Debug, Clone)]
struct GitTag {
    version: Version,
    time: DateTime<Utc>,
}

impl GitVcs {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            repos: RwLock::new(HashMap::new()),
            github_re: Regex::new(r"^(?P<root>github\.com/[\w.\-]+/[\w.\-]+)(/[\w.\-]+)*$")
                .unwrap(),
        }
    }

    /// Reports whether this handler can serve `path`, cloning (or updating)
    /// the repository on first sight.
    pub async fn can_handle(&self, path: &str) -> Result<bool, RegistryError> {
        if self.repos.read().await.contains_key(path) {
            return Ok(true);
        }
        let Some(caps) = self.github_re.captures(path) else {
            return Ok(false);
        };
        let root = caps.name("root").unwrap().as_str();
        let repo = Arc::new(GitRepo {
            url: format!("https://{root}.git"),
            dir: self.cache_dir.join(path),
            tags: Mutex::new(None),
        });
        repo.initialize().await?;
        self.repos
            .write()
            .await
            .insert(path.to_string(), repo);
        Ok(true)
    }

    async fn repo_for_path(&self, path: &str) -> Result<Arc<GitRepo>, RegistryError> {
        self.repos
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| RegistryError::Command(format!("no git repository cloned for '{path}'")))
    }
}

impl GitRepo {
    async fn initialize(&self) -> Result<(), RegistryError> {
        if self.dir.exists() {
            exec_git(&self.dir, &["pull", "--ff-only"]).await?;
            return Ok(());
        }
        if let Some(parent) = self.dir.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| RegistryError::Command(format!("failed to create clone dir: {e}")))?;
        }
        let dir = self.dir.to_string_lossy();
        debug!("cloning {} into {dir}", self.url);
        exec_git(Path::new("."), &["clone", "--", &self.url, &dir]).await?;
        Ok(())
    }

    /// Lists all semver tags with their creation dates, ascending by version.
    async fn list_tags(&self) -> Result<Vec<GitTag>, RegistryError> {
        let mut cached = self.tags.lock().await;
        if let Some(tags) = cached.as_ref() {
            return Ok(tags.clone());
        }
        let out = exec_git(
            &self.dir,
            &[
                "for-each-ref",
                "--sort=creatordate",
                "--format=%(creatordate:short) %(refname:short)",
                "refs/tags",
            ],
        )
        .await?;
        let mut tags = Vec::new();
        for line in out.lines() {
            let Some((date, tag)) = line.split_once(' ') else {
                return Err(RegistryError::InvalidResponse(format!(
                    "unexpected 'git for-each-ref' output line: {line}, expected '<date> <tag>'"
                )));
            };
            let date = date.parse::<NaiveDate>().map_err(|e| {
                RegistryError::InvalidResponse(format!("failed to parse tag date '{date}': {e}"))
            })?;
            // Tags that are not semver releases are skipped.
            let Some(version) = parse_go_version(tag) else {
                continue;
            };
            tags.push(GitTag {
                version,
                time: date.and_hms_opt(0, 0, 0).unwrap().and_utc(),
            });
        }
        tags.sort_by(|a, b| a.version.cmp(&b.version));
        *cached = Some(tags.clone());
        Ok(tags)
    }
}

#[async_trait::async_trait]
impl VersionSource for GitVcs {
    async fn get_versions(&self, path: &str) -> Result<Vec<Version>, RegistryError> {
        let repo = self.repo_for_path(path).await?;
        Ok(repo
            .list_tags()
            .await?
            .into_iter()
            .map(|tag| tag.version)
            .collect())
    }

    async fn get_info(&self, path: &str, version: &Version) -> Result<ModuleInfo, RegistryError> {
        let repo = self.repo_for_path(path).await?;
        repo.list_tags()
            .await?
            .into_iter()
            .find(|tag| tag.version == *version)
            .map(|tag| ModuleInfo {
                path: path.to_string(),
                version: tag.version,
                time: tag.time,
            })
            .ok_or_else(|| RegistryError::NotFound(format!("{path}@{version}")))
    }

    async fn get_latest_info(&self, path: &str) -> Result<ModuleInfo, RegistryError> {
        let repo = self.repo_for_path(path).await?;
        repo.list_tags()
            .await?
            .last()
            .map(|tag| ModuleInfo {
                path: path.to_string(),
                version: tag.version.clone(),
                time: tag.time,
            })
            .ok_or_else(|| RegistryError::NotFound(path.to_string()))
    }

    async fn get_mod_file(&self, path: &str, _version: &Version) -> Result<Vec<u8>, RegistryError> {
        let repo = self.repo_for_path(path).await?;
        let module_line_re = Regex::new(&format!(r"(?m)^module {}$", regex::escape(path)))
            .map_err(|e| RegistryError::Command(e.to_string()))?;
        find_mod_file(&repo.dir, &module_line_re)
            .map_err(|e| RegistryError::Command(format!("failed to scan clone for go.mod: {e}")))?
            .ok_or_else(|| {
                RegistryError::NotFound(format!("no go.mod file found for {path} module"))
            })
    }
}

/// Walks the clone looking for the go.mod file declaring the wanted module
/// path, skipping vendored trees.
fn find_mod_file(dir: &Path, module_line_re: &Regex) -> std::io::Result<Option<Vec<u8>>> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let name = entry.file_name();
        if file_type.is_dir() {
            if name == "vendor" || name == ".git" {
                continue;
            }
            if let Some(found) = find_mod_file(&entry.path(), module_line_re)? {
                return Ok(Some(found));
            }
        } else if name == "go.mod" {
            let data = std::fs::read(entry.path())?;
            if module_line_re.is_match(&String::from_utf8_lossy(&data)) {
                return Ok(Some(data));
            }
        }
    }
    Ok(None)
}

async fn exec_git(dir: &Path, args: &[&str]) -> Result<String, RegistryError> {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| RegistryError::Command(format!("failed to spawn git: {e}")))?;
    if !output.status.success() {
        return Err(RegistryError::Command(format!(
            "'git {}' failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("github.com/acme", "github.com/acme/private", true)]
    #[case("github.com/acme", "github.com/acme", true)]
    #[case("github.com/acme", "github.com/other/private", false)]
    #[case("*.corp.example.com", "git.corp.example.com/project", true)]
    #[case("*.corp.example.com", "corp.example.com/project", false)]
    #[case("github.com/*/private", "github.com/acme/private/sub", true)]
    #[case("github.com/*/private", "github.com/acme/public", false)]
    fn match_prefix_pattern_follows_goprivate_semantics(
        #[case] pattern: &str,
        #[case] path: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(match_prefix_pattern(pattern, path), expected);
    }

    #[test]
    fn is_private_splits_comma_separated_patterns() {
        let registry = VcsRegistry::new(PathBuf::from("/tmp/vcs"), "example.com, github.com/acme");
        assert!(registry.is_private("github.com/acme/private"));
        assert!(registry.is_private("example.com/anything"));
        assert!(!registry.is_private("github.com/public/module"));
    }

    #[test]
    fn is_private_with_empty_patterns_matches_nothing() {
        let registry = VcsRegistry::new(PathBuf::from("/tmp/vcs"), "");
        assert!(!registry.is_private("github.com/acme/private"));
    }

    #[tokio::test]
    async fn can_handle_rejects_non_github_paths() {
        let vcs = GitVcs::new(PathBuf::from("/tmp/vcs"));
        assert!(!vcs.can_handle("gitlab.com/acme/private").await.unwrap());
    }
}
