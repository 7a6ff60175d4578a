//! Remote package catalog.
//!
//! The cache only talks to the catalog through the [`Catalog`] trait.
//! [`HttpCatalog`] is the production implementation:
//!
//! | Request | Response |
//! |---|---|
//! | `GET {base}/index.json` | `["name", ...]` |
//! | `GET {base}/packages/{name}.json` | `[{"version", "os", "arch"}, ...]` |
//! | `GET {base}/artifacts/{file name}` | package archive bytes |

use async_trait::async_trait;
use gopkg_schema::{ArtifactIdentity, encode};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// User agent sent with every catalog request.
pub const USER_AGENT: &str = concat!("gopkg/", env!("CARGO_PKG_VERSION"));

/// Errors returned by a [`Catalog`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The catalog has no artifact for the requested target.
    #[error("no package {name} for {os}/{arch} in catalog")]
    NotFound {
        /// Requested package.
        name: String,
        /// Requested OS.
        os: String,
        /// Requested architecture.
        arch: String,
    },

    /// The catalog could not be reached or answered garbage.
    #[error("catalog request to {url} failed: {reason}")]
    Transport {
        /// URL being requested.
        url: String,
        /// What went wrong.
        reason: String,
    },
}

/// Archive bytes fetched from the catalog and the identity they were published as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArtifact {
    /// Identity of the fetched package.
    pub identity: ArtifactIdentity,
    /// Raw archive bytes.
    pub bytes: Vec<u8>,
}

/// A source of published packages.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Fetch the newest binary package of `name` built for `os`/`arch`.
    async fn fetch_artifact(
        &self,
        name: &str,
        os: &str,
        arch: &str,
    ) -> Result<FetchedArtifact, CatalogError>;

    /// Names of every package the catalog knows.
    async fn list(&self) -> Result<Vec<String>, CatalogError>;
}

/// One published binary as listed by `packages/{name}.json`.
#[derive(Debug, Clone, Deserialize)]
struct PublishedRelease {
    version: String,
    os: String,
    arch: String,
}

/// Catalog served over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCatalog {
    /// Create a catalog client rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Transport`] if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, CatalogError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CatalogError::Transport {
                url: base_url.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self { client, base_url })
    }

    /// Base URL every request is made against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `url`, returning `None` on 404.
    async fn get(&self, url: &str) -> Result<Option<reqwest::Response>, CatalogError> {
        let transport = |e: reqwest::Error| CatalogError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let resp = self.client.get(url).send().await.map_err(transport)?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        resp.error_for_status().map(Some).map_err(transport)
    }
}

/// Newest first by semantic version; versions that are not semver sort last.
fn newest(releases: impl Iterator<Item = PublishedRelease>) -> Option<PublishedRelease> {
    let key = |r: &PublishedRelease| {
        (
            semver::Version::parse(r.version.trim_start_matches('v')).ok(),
            r.version.clone(),
        )
    };
    releases.max_by(|a, b| key(a).cmp(&key(b)))
}

#[async_trait]
impl Catalog for HttpCatalog {
    async fn fetch_artifact(
        &self,
        name: &str,
        os: &str,
        arch: &str,
    ) -> Result<FetchedArtifact, CatalogError> {
        let not_found = || CatalogError::NotFound {
            name: name.to_string(),
            os: os.to_string(),
            arch: arch.to_string(),
        };

        let releases_url = format!("{}/packages/{name}.json", self.base_url);
        let Some(resp) = self.get(&releases_url).await? else {
            return Err(not_found());
        };
        let releases: Vec<PublishedRelease> =
            resp.json().await.map_err(|e| CatalogError::Transport {
                url: releases_url.clone(),
                reason: e.to_string(),
            })?;

        let release = newest(
            releases
                .into_iter()
                .filter(|r| r.os == os && r.arch == arch),
        )
        .ok_or_else(not_found)?;
        debug!(%name, version = %release.version, "Selected catalog release");

        let identity = ArtifactIdentity::binary(name, release.version, release.os, release.arch);
        let file_name = encode(&identity).map_err(|e| CatalogError::Transport {
            url: releases_url.clone(),
            reason: e.to_string(),
        })?;

        let artifact_url = format!("{}/artifacts/{file_name}", self.base_url);
        let Some(resp) = self.get(&artifact_url).await? else {
            return Err(not_found());
        };
        let bytes = resp.bytes().await.map_err(|e| CatalogError::Transport {
            url: artifact_url.clone(),
            reason: e.to_string(),
        })?;

        Ok(FetchedArtifact {
            identity,
            bytes: bytes.to_vec(),
        })
    }

    async fn list(&self) -> Result<Vec<String>, CatalogError> {
        let url = format!("{}/index.json", self.base_url);
        let Some(resp) = self.get(&url).await? else {
            return Ok(Vec::new());
        };
        resp.json().await.map_err(|e| CatalogError::Transport {
            url,
            reason: e.to_string(),
        })
    }
}
