//! deps.dev fallback version listing
//!
//! GOPROXY's `@v/list` and `go list -versions` omit pre-release versions.
//! When the declared version itself is a pre-release, the releases-diff
//! metric needs a listing that includes it, which the deps.dev metadata
//! index provides.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use semver::Version;
use serde::Deserialize;
use tracing::debug;

use crate::config::REQUEST_TIMEOUT_SECS;
use crate::module::parse_go_version;
use crate::registry::{FallbackVersionSource, RegistryError};

/// Default base URL for the deps.dev API.
pub const DEFAULT_BASE_URL: &str = "https://api.deps.dev";

/// Filters out non-canonical versions like `v1`, which are valid semver
/// shorthand but unknown to GOPROXY.
static CANONICAL_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v\d+\.\d+\.\d+").unwrap());

pub struct DepsDevClient {
    client: reqwest::Client,
    base_url: String,
}

impl DepsDevClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("libyear")
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for DepsDevClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[derive(Deserialize)]
struct PackageResponse {
    #[serde(default)]
    versions: Vec<VersionEntry>,
}

#[derive(Deserialize)]
struct VersionEntry {
    #[serde(rename = "versionKey")]
    version_key: VersionKey,
}

#[derive(Deserialize)]
struct VersionKey {
    version: String,
}

#[async_trait::async_trait]
impl FallbackVersionSource for DepsDevClient {
    async fn get_versions(&self, path: &str) -> Result<Vec<Version>, RegistryError> {
        // The package name is a single path segment in the API URL, so the
        // module path's slashes must be percent-encoded.
        let url = format!(
            "{}/v3alpha/systems/go/packages/{}",
            self.base_url,
            path.replace('/', "%2F")
        );
        debug!("GET {url}");
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::InvalidResponse(format!(
                "unexpected status {status} from {url}: {body}"
            )));
        }

        let decoded: PackageResponse = response
            .json()
            .await
            .map_err(|e| RegistryError::InvalidResponse(e.to_string()))?;

        Ok(decoded
            .versions
            .into_iter()
            .filter(|entry| CANONICAL_VERSION_RE.is_match(&entry.version_key.version))
            .filter_map(|entry| parse_go_version(&entry.version_key.version))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[tokio::test]
    async fn get_versions_decodes_and_filters_canonical_versions() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock(
                "GET",
                "/v3alpha/systems/go/packages/golang.org%2Fx%2Ftext",
            )
            .with_status(200)
            .with_body(
                r#"{"versions":[
                    {"versionKey":{"version":"v0.13.0"}},
                    {"versionKey":{"version":"v1"}},
                    {"versionKey":{"version":"v0.14.0-rc.1"}}
                ]}"#,
            )
            .create_async()
            .await;

        let client = DepsDevClient::new(&server.url());
        let versions = client.get_versions("golang.org/x/text").await.unwrap();

        mock.assert_async().await;
        assert_eq!(
            versions,
            vec![
                Version::parse("0.13.0").unwrap(),
                Version::parse("0.14.0-rc.1").unwrap(),
            ]
        );
    }

    #[tokio::test]
    async fn get_versions_maps_404_to_not_found() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v3alpha/systems/go/packages/unknown%2Fmodule")
            .with_status(404)
            .with_body("not found")
            .create_async()
            .await;

        let client = DepsDevClient::new(&server.url());
        let result = client.get_versions("unknown/module").await;

        mock.assert_async().await;
        assert!(matches!(result, Err(RegistryError::NotFound(_))));
    }

    #[tokio::test]
    async fn get_versions_returns_empty_for_package_without_versions() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v3alpha/systems/go/packages/empty%2Fmodule")
            .with_status(200)
            .with_body(r#"{"versions":[]}"#)
            .create_async()
            .await;

        let client = DepsDevClient::new(&server.url());
        let versions = client.get_versions("empty/module").await.unwrap();

        mock.assert_async().await;
        assert!(versions.is_empty());
    }
}
