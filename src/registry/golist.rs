//! `go list -m` backend
//!
//! Shells out to the local Go toolchain instead of talking to a proxy.
//! Useful when modules are only reachable through a locally configured
//! private proxy or vendor setup. Responses carry the same JSON shape as
//! GOPROXY `.info` endpoints.

use std::process::Stdio;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use semver::Version;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::cache::{CachedRelease, VersionStore};
use crate::module::{ModuleInfo, format_go_version, parse_go_version};
use crate::registry::{RegistryError, VersionSource};

pub struct GoListExecutor {
    store: Option<Arc<VersionStore>>,
}

impl GoListExecutor {
    pub fn new(store: Option<Arc<VersionStore>>) -> Self {
        Self { store }
    }

    async fn exec(&self, args: &[&str]) -> Result<Vec<u8>, RegistryError> {
        debug!("running go list -json -m -mod=readonly {}", args.join(" "));
        let output = Command::new("go")
            .args(["list", "-json", "-m", "-mod=readonly"])
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| RegistryError::Command(format!("failed to spawn 'go list': {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // The toolchain reports a nonexistent module or version line this
            // way; map it to the typed sentinel the resolver terminates on.
            if stderr.contains("no matching versions")
                || stderr.contains("not a known dependency")
                || stderr.contains("unknown revision")
            {
                return Err(RegistryError::NotFound(args.join(" ")));
            }
            return Err(RegistryError::Command(format!(
                "'go list {}' failed: {stderr}",
                args.join(" ")
            )));
        }
        Ok(output.stdout)
    }

    async fn get_info_by_query(
        &self,
        path: &str,
        query: &str,
    ) -> Result<ModuleInfo, RegistryError> {
        let out = self.exec(&[&format!("{path}@{query}")]).await?;
        let decoded: ListInfoResponse = serde_json::from_slice(&out)
            .map_err(|e| RegistryError::InvalidResponse(e.to_string()))?;
        let version = parse_go_version(&decoded.version).ok_or_else(|| {
            RegistryError::InvalidResponse(format!("invalid version: {}", decoded.version))
        })?;
        let time = decoded.time.ok_or_else(|| {
            RegistryError::InvalidResponse(format!("missing publish time for {path}@{query}"))
        })?;
        let info = ModuleInfo {
            path: path.to_string(),
            version,
            time,
        };
        if let Some(store) = &self.store {
            store.insert(CachedRelease {
                path: info.path.clone(),
                version: info.version.clone(),
                time: info.time,
            })?;
        }
        Ok(info)
    }
}

#[derive(Deserialize)]
struct ListVersionsResponse {
    #[serde(rename = "Versions", default)]
    versions: Vec<String>,
}

#[derive(Deserialize)]
struct ListInfoResponse {
    #[serde(rename = "Version")]
    version: String,
    #[serde(rename = "Time")]
    time: Option<DateTime<Utc>>,
}

#[async_trait::async_trait]
impl VersionSource for GoListExecutor {
    async fn get_versions(&self, path: &str) -> Result<Vec<Version>, RegistryError> {
        let out = self.exec(&["-versions", path]).await?;
        let decoded: ListVersionsResponse = serde_json::from_slice(&out)
            .map_err(|e| RegistryError::InvalidResponse(e.to_string()))?;
        decoded
            .versions
            .iter()
            .map(|raw| {
                parse_go_version(raw)
                    .ok_or_else(|| RegistryError::InvalidResponse(format!("invalid version: {raw}")))
            })
            .collect()
    }

    async fn get_info(&self, path: &str, version: &Version) -> Result<ModuleInfo, RegistryError> {
        if let Some(store) = &self.store {
            if let Some(cached) = store.get(path, version) {
                return Ok(ModuleInfo {
                    path: cached.path,
                    version: cached.version,
                    time: cached.time,
                });
            }
        }
        self.get_info_by_query(path, &format_go_version(version))
            .await
    }

    async fn get_latest_info(&self, path: &str) -> Result<ModuleInfo, RegistryError> {
        self.get_info_by_query(path, "latest").await
    }

    async fn get_mod_file(&self, _path: &str, _version: &Version) -> Result<Vec<u8>, RegistryError> {
        Err(RegistryError::Unsupported(
            "retrieving go.mod files via 'go list'",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_versions_response_decodes_go_list_output() {
        let out = br#"{"Path":"golang.org/x/text","Versions":["v0.13.0","v0.14.0"]}"#;
        let decoded: ListVersionsResponse = serde_json::from_slice(out).unwrap();
        assert_eq!(decoded.versions, vec!["v0.13.0", "v0.14.0"]);
    }

    #[test]
    fn list_versions_response_tolerates_missing_versions_field() {
        let out = br#"{"Path":"golang.org/x/text"}"#;
        let decoded: ListVersionsResponse = serde_json::from_slice(out).unwrap();
        assert!(decoded.versions.is_empty());
    }

    #[test]
    fn list_info_response_decodes_version_and_time() {
        let out = br#"{"Path":"golang.org/x/text","Version":"v0.14.0","Time":"2023-11-02T15:04:05Z"}"#;
        let decoded: ListInfoResponse = serde_json::from_slice(out).unwrap();
        assert_eq!(decoded.version, "v0.14.0");
        assert!(decoded.time.is_some());
    }

    #[tokio::test]
    async fn get_mod_file_is_unsupported() {
        let executor = GoListExecutor::new(None);
        let result = executor
            .get_mod_file("golang.org/x/text", &Version::parse("0.14.0").unwrap())
            .await;
        assert!(matches!(result, Err(RegistryError::Unsupported(_))));
    }
}
