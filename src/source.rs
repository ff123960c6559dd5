//! Manifest acquisition
//!
//! A go.mod file can come from disk, stdin, an HTTP URL, or straight from a
//! registry by package path (`path[@version]`). Private package paths route
//! through the VCS registry instead of the proxy.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncReadExt;

use crate::config::REQUEST_TIMEOUT_SECS;
use crate::module::parse_go_version;
use crate::registry::vcs::VcsRegistry;
use crate::registry::{RegistryError, VersionSource};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to fetch manifest: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response status {status} from {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("invalid pkg name '{0}', expected 'path' or 'path@version'")]
    InvalidPkg(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Where the analyzed go.mod comes from.
pub enum ManifestSource {
    File(PathBuf),
    Stdin,
    Url(String),
    /// A module path with an optional `@version` suffix; the manifest is
    /// fetched from the registry's mod-file endpoint.
    Pkg(String),
    /// In-memory manifest, for library callers and tests.
    Content(String),
}

impl ManifestSource {
    pub async fn read(
        &self,
        repo: &dyn VersionSource,
        vcs: Option<&VcsRegistry>,
    ) -> Result<Vec<u8>, SourceError> {
        match self {
            ManifestSource::File(path) => Ok(tokio::fs::read(path).await?),
            ManifestSource::Stdin => {
                let mut data = Vec::new();
                tokio::io::stdin().read_to_end(&mut data).await?;
                Ok(data)
            }
            ManifestSource::Url(url) => read_url(url).await,
            ManifestSource::Pkg(pkg) => read_pkg(pkg, repo, vcs).await,
            ManifestSource::Content(content) => Ok(content.clone().into_bytes()),
        }
    }
}

async fn read_url(url: &str) -> Result<Vec<u8>, SourceError> {
    let client = reqwest::Client::builder()
        .user_agent("libyear")
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()?;
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SourceError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.bytes().await?.to_vec())
}

async fn read_pkg(
    pkg: &str,
    repo: &dyn VersionSource,
    vcs: Option<&VcsRegistry>,
) -> Result<Vec<u8>, SourceError> {
    let handler;
    let mut repo = repo;
    if let Some(vcs) = vcs {
        if vcs.is_private(pkg_path(pkg)) {
            handler = vcs.handler(pkg_path(pkg)).await?;
            repo = handler.as_ref();
        }
    }

    let (path, version) = match pkg.split_once('@') {
        Some((path, raw_version)) => {
            let version =
                parse_go_version(raw_version).ok_or_else(|| SourceError::InvalidPkg(pkg.to_string()))?;
            (path, version)
        }
        // The mod-file endpoint needs an exact version, not a 'latest' literal.
        None => (pkg, repo.get_latest_info(pkg).await?.version),
    };
    if path.is_empty() {
        return Err(SourceError::InvalidPkg(pkg.to_string()));
    }
    Ok(repo.get_mod_file(path, &version).await?)
}

fn pkg_path(pkg: &str) -> &str {
    pkg.split_once('@').map_or(pkg, |(path, _)| path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleInfo;
    use crate::registry::MockVersionSource;
    use mockall::predicate::eq;
    use semver::Version;

    #[tokio::test]
    async fn content_source_returns_bytes_as_is() {
        let source = ManifestSource::Content("module example.com/root\n".to_string());
        let repo = MockVersionSource::new();

        let data = source.read(&repo, None).await.unwrap();

        assert_eq!(data, b"module example.com/root\n");
    }

    #[tokio::test]
    async fn pkg_source_with_version_fetches_mod_file_directly() {
        let mut repo = MockVersionSource::new();
        repo.expect_get_mod_file()
            .with(eq("github.com/acme/mod"), eq(Version::parse("1.2.0").unwrap()))
            .times(1)
            .returning(|_, _| Ok(b"module github.com/acme/mod\n".to_vec()));

        let source = ManifestSource::Pkg("github.com/acme/mod@v1.2.0".to_string());
        let data = source.read(&repo, None).await.unwrap();

        assert_eq!(data, b"module github.com/acme/mod\n");
    }

    #[tokio::test]
    async fn pkg_source_without_version_resolves_latest_first() {
        let mut repo = MockVersionSource::new();
        repo.expect_get_latest_info()
            .with(eq("github.com/acme/mod"))
            .times(1)
            .returning(|path| {
                Ok(ModuleInfo {
                    path: path.to_string(),
                    version: Version::parse("1.4.0").unwrap(),
                    time: "2023-01-01T00:00:00Z".parse().unwrap(),
                })
            });
        repo.expect_get_mod_file()
            .with(eq("github.com/acme/mod"), eq(Version::parse("1.4.0").unwrap()))
            .times(1)
            .returning(|_, _| Ok(b"module github.com/acme/mod\n".to_vec()));

        let source = ManifestSource::Pkg("github.com/acme/mod".to_string());
        let data = source.read(&repo, None).await.unwrap();

        assert_eq!(data, b"module github.com/acme/mod\n");
    }

    #[tokio::test]
    async fn pkg_source_rejects_malformed_version() {
        let repo = MockVersionSource::new();
        let source = ManifestSource::Pkg("github.com/acme/mod@1.2.0".to_string());

        let result = source.read(&repo, None).await;

        assert!(matches!(result, Err(SourceError::InvalidPkg(_))));
    }

    #[tokio::test]
    async fn url_source_reads_body_on_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/raw/go.mod")
            .with_status(200)
            .with_body("module example.com/root\n")
            .create_async()
            .await;

        let source = ManifestSource::Url(format!("{}/raw/go.mod", server.url()));
        let repo = MockVersionSource::new();
        let data = source.read(&repo, None).await.unwrap();

        mock.assert_async().await;
        assert_eq!(data, b"module example.com/root\n");
    }

    #[tokio::test]
    async fn url_source_fails_on_error_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/raw/go.mod")
            .with_status(404)
            .with_body("not here")
            .create_async()
            .await;

        let source = ManifestSource::Url(format!("{}/raw/go.mod", server.url()));
        let repo = MockVersionSource::new();
        let result = source.read(&repo, None).await;

        mock.assert_async().await;
        assert!(matches!(result, Err(SourceError::Status { status: 404, .. })));
    }
}
