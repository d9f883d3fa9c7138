//! HTTP client for the mod portal

use crate::config::PortalConfig;
use crate::core::{FileOperation, ModVersion};
use crate::domain::{ModRepository, RepositoryError};
use crate::portal::{PortalMod, Release};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_retry::RetryIf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// [`ModRepository`] backed by the Factorio mod portal
#[derive(Clone)]
pub struct PortalClient {
    client: Client,
    config: PortalConfig,
    // Release listings per mod, kept for the lifetime of the client
    releases: Arc<Mutex<HashMap<String, Arc<Vec<Release>>>>>,
}

impl PortalClient {
    pub fn new(config: PortalConfig) -> Result<Self, RepositoryError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|source| RepositoryError::Http {
                url: config.base_url.clone(),
                source,
            })?;

        Ok(Self {
            client,
            config,
            releases: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Client for the public portal with credentials from the environment
    pub fn from_env() -> Result<Self, RepositoryError> {
        Self::new(PortalConfig::from_env())
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    /// All releases of `name`, oldest first as the portal lists them
    pub async fn releases(&self, name: &str) -> Result<Arc<Vec<Release>>, RepositoryError> {
        if let Some(cached) = self.cache().get(name) {
            debug!("Returning cached releases for {}", name);
            return Ok(cached.clone());
        }

        let url = self.endpoint(&["api", "mods", name, "full"])?;
        let response = self.send(&url).await.map_err(|e| match e {
            RepositoryError::Http { source, .. } if source.status() == Some(StatusCode::NOT_FOUND) => {
                RepositoryError::NotFound {
                    name: name.to_string(),
                }
            }
            other => other,
        })?;

        let listing: PortalMod = response.json().await.map_err(|e| RepositoryError::InvalidResponse {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        debug!("Portal lists {} releases of {}", listing.releases.len(), listing.name);

        let releases = Arc::new(listing.releases);
        self.cache().insert(name.to_string(), releases.clone());
        Ok(releases)
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Vec<Release>>>> {
        self.releases.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn base(&self) -> Result<Url, RepositoryError> {
        Url::parse(&self.config.base_url).map_err(|e| RepositoryError::InvalidResponse {
            url: self.config.base_url.clone(),
            reason: format!("invalid portal URL: {e}"),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RepositoryError> {
        let mut url = self.base()?;
        url.path_segments_mut()
            .map_err(|_| RepositoryError::InvalidResponse {
                url: self.config.base_url.clone(),
                reason: "portal URL cannot have a path".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn download_url(
        &self,
        release: &Release,
        username: &str,
        token: &str,
    ) -> Result<Url, RepositoryError> {
        let mut url = self
            .base()?
            .join(&release.download_url)
            .map_err(|e| RepositoryError::InvalidResponse {
                url: release.download_url.clone(),
                reason: e.to_string(),
            })?;
        url.query_pairs_mut()
            .append_pair("username", username)
            .append_pair("token", token);
        Ok(url)
    }

    /// GET with exponential backoff on transient failures
    async fn send(&self, url: &Url) -> Result<reqwest::Response, RepositoryError> {
        let strategy = (0..self.config.max_retries).map(|attempt| self.config.retry_delay_for(attempt));
        RetryIf::start(
            strategy,
            || self.send_once(url),
            |e: &RepositoryError| {
                let retry = e.is_recoverable();
                if retry {
                    warn!("Request to {} failed, retrying: {}", redacted(url), e);
                }
                retry
            },
        )
        .await
    }

    async fn send_once(&self, url: &Url) -> Result<reqwest::Response, RepositoryError> {
        let http_error = |source: reqwest::Error| RepositoryError::Http {
            url: redacted(url),
            source,
        };
        let response = self.client.get(url.clone()).send().await.map_err(http_error)?;
        response.error_for_status().map_err(http_error)
    }

    async fn write_body(
        &self,
        response: reqwest::Response,
        temp_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64, RepositoryError> {
        let url = redacted(response.url());
        let file_error = |operation: FileOperation| {
            let path = temp_path.to_path_buf();
            move |source: std::io::Error| RepositoryError::FileSystem {
                path,
                operation,
                source,
            }
        };

        let mut file = fs::File::create(temp_path)
            .await
            .map_err(file_error(FileOperation::Create))?;
        let mut stream = response.bytes_stream();
        let mut downloaded = 0u64;

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RepositoryError::Cancelled),
                chunk = stream.next() => chunk,
            };
            let Some(chunk) = chunk else {
                break;
            };
            let chunk = chunk.map_err(|source| RepositoryError::Http {
                url: url.clone(),
                source,
            })?;
            file.write_all(&chunk).await.map_err(file_error(FileOperation::Write))?;
            downloaded += chunk.len() as u64;
        }

        file.flush().await.map_err(file_error(FileOperation::Write))?;
        Ok(downloaded)
    }
}

/// `.part` file that is removed unless the download finishes
///
/// Also covers the download future being dropped halfway through the body.
struct PartialDownload {
    path: PathBuf,
    finished: bool,
}

impl PartialDownload {
    fn new(path: PathBuf) -> Self {
        Self { path, finished: false }
    }

    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for PartialDownload {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed partial download {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove partial download {}: {}", self.path.display(), e),
        }
    }
}

/// URL without its query, so tokens stay out of logs and errors
fn redacted(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}

#[async_trait]
impl ModRepository for PortalClient {
    async fn latest_version(&self, name: &str) -> Result<ModVersion, RepositoryError> {
        self.releases(name)
            .await?
            .iter()
            .map(|release| release.version)
            .max()
            .ok_or_else(|| RepositoryError::NotFound {
                name: name.to_string(),
            })
    }

    async fn latest_compatible_version(
        &self,
        name: &str,
        host: &ModVersion,
    ) -> Result<ModVersion, RepositoryError> {
        self.releases(name)
            .await?
            .iter()
            .filter(|release| release.info_json.factorio_version.is_compatible_with(host))
            .map(|release| release.version)
            .max()
            .ok_or_else(|| RepositoryError::NoCompatibleRelease {
                name: name.to_string(),
                host: *host,
            })
    }

    async fn download(
        &self,
        name: &str,
        version: &ModVersion,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, RepositoryError> {
        if cancel.is_cancelled() {
            return Err(RepositoryError::Cancelled);
        }
        let (username, token) = self.config.credentials().ok_or(RepositoryError::MissingCredentials)?;

        let releases = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RepositoryError::Cancelled),
            releases = self.releases(name) => releases?,
        };
        let release = releases
            .iter()
            .find(|release| release.version == *version)
            .ok_or_else(|| RepositoryError::ReleaseNotFound {
                name: name.to_string(),
                version: *version,
            })?;

        let file_name = Path::new(&release.file_name)
            .file_name()
            .ok_or_else(|| RepositoryError::InvalidResponse {
                url: release.download_url.clone(),
                reason: format!("unusable file name '{}'", release.file_name),
            })?;
        let dest_path = destination.join(file_name);
        let temp_path = dest_path.with_extension("part");

        let url = self.download_url(release, username, token)?;
        debug!("Downloading {} {} from {}", name, version, redacted(&url));
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RepositoryError::Cancelled),
            response = self.send(&url) => response?,
        };

        let partial = PartialDownload::new(temp_path);
        let size = self.write_body(response, &partial.path, cancel).await?;
        fs::rename(&partial.path, &dest_path)
            .await
            .map_err(|source| RepositoryError::FileSystem {
                path: dest_path.clone(),
                operation: FileOperation::Move,
                source,
            })?;
        partial.finish();
        info!("Downloaded {} {} ({} bytes)", name, version, size);
        Ok(dest_path)
    }
}
