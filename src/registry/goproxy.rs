//! GOPROXY protocol client
//!
//! The default backend. Protocol reference: <https://go.dev/ref/mod#goproxy-protocol>.
//! Publish-time lookups are read-through cached in the [`VersionStore`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use semver::Version;
use serde::Deserialize;
use tracing::debug;

use crate::cache::{CachedRelease, VersionStore};
use crate::config::REQUEST_TIMEOUT_SECS;
use crate::module::{ModuleInfo, format_go_version, parse_go_version};
use crate::registry::{RegistryError, VersionSource};

/// Default base URL for the Go module proxy.
pub const DEFAULT_BASE_URL: &str = "https://proxy.golang.org";

pub struct GoProxyClient {
    client: reqwest::Client,
    base_url: String,
    store: Option<Arc<VersionStore>>,
}

impl GoProxyClient {
    pub fn new(base_url: &str, store: Option<Arc<VersionStore>>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("libyear")
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            store,
        }
    }

    async fn query(&self, url_path: &str) -> Result<String, RegistryError> {
        let url = format!("{}/{}", self.base_url, url_path);
        debug!("GET {url}");
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        // The proxy answers 404 or 410 for unknown modules and versions.
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Err(RegistryError::NotFound(url_path.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::InvalidResponse(format!(
                "unexpected status {status} from {url}: {body}"
            )));
        }
        Ok(response.text().await?)
    }

    async fn fetch_info(&self, path: &str, url_path: &str) -> Result<ModuleInfo, RegistryError> {
        let body = self.query(url_path).await?;
        let decoded: InfoResponse = serde_json::from_str(&body)
            .map_err(|e| RegistryError::InvalidResponse(e.to_string()))?;
        let version = parse_go_version(&decoded.version).ok_or_else(|| {
            RegistryError::InvalidResponse(format!("invalid version: {}", decoded.version))
        })?;
        let info = ModuleInfo {
            path: path.to_string(),
            version,
            time: decoded.time,
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

impl Default for GoProxyClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, None)
    }
}

#[derive(Deserialize)]
struct InfoResponse {
    #[serde(rename = "Version")]
    version: String,
    #[serde(rename = "Time")]
    time: DateTime<Utc>,
}

#[async_trait::async_trait]
impl VersionSource for GoProxyClient {
    async fn get_versions(&self, path: &str) -> Result<Vec<Version>, RegistryError> {
        let body = self
            .query(&format!("{}/@v/list", encode_module_path(path)))
            .await?;
        body.lines()
            .filter(|line| !line.is_empty())
            .map(|line| {
                parse_go_version(line)
                    .ok_or_else(|| RegistryError::InvalidResponse(format!("invalid version: {line}")))
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
        let url_path = format!(
            "{}/@v/{}.info",
            encode_module_path(path),
            format_go_version(version)
        );
        self.fetch_info(path, &url_path).await
    }

    async fn get_latest_info(&self, path: &str) -> Result<ModuleInfo, RegistryError> {
        let url_path = format!("{}/@latest", encode_module_path(path));
        self.fetch_info(path, &url_path).await
    }

    async fn get_mod_file(&self, path: &str, version: &Version) -> Result<Vec<u8>, RegistryError> {
        let url_path = format!(
            "{}/@v/{}.mod",
            encode_module_path(path),
            format_go_version(version)
        );
        Ok(self.query(&url_path).await?.into_bytes())
    }
}

/// Encodes a Go module path for use in proxy URLs.
/// Uppercase letters are escaped as !{lowercase}.
fn encode_module_path(path: &str) -> String {
    let mut result = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_ascii_uppercase() {
            result.push('!');
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}
