//! Remote mod repository interface

use crate::core::{FileOperation, ModVersion};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors from looking up or downloading mods
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("HTTP request to '{url}' failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Mod '{name}' does not exist on the mod portal")]
    NotFound { name: String },

    #[error("Mod '{name}' has no release {version}")]
    ReleaseNotFound { name: String, version: ModVersion },

    #[error("Mod '{name}' has no release compatible with game version {host}")]
    NoCompatibleRelease { name: String, host: ModVersion },

    #[error("Mod portal credentials are not configured (set FACTORIO_USERNAME and FACTORIO_TOKEN)")]
    MissingCredentials,

    #[error("Unexpected response from '{url}': {reason}")]
    InvalidResponse { url: String, reason: String },

    #[error("Download cancelled")]
    Cancelled,

    #[error("Mod repository is not available")]
    Offline,

    #[error("File operation failed on '{path}' while {operation}")]
    FileSystem {
        path: PathBuf,
        operation: FileOperation,
        #[source]
        source: std::io::Error,
    },
}

impl RepositoryError {
    /// Check if error is recoverable (should retry)
    pub fn is_recoverable(&self) -> bool {
        match self {
            RepositoryError::Http { source, .. } => source
                .status()
                .is_none_or(|status| status.is_server_error() || status.as_u16() == 429),
            RepositoryError::FileSystem { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::Interrupted | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            RepositoryError::Http { .. } => "http",
            RepositoryError::NotFound { .. } => "not_found",
            RepositoryError::ReleaseNotFound { .. } => "release_not_found",
            RepositoryError::NoCompatibleRelease { .. } => "no_compatible_release",
            RepositoryError::MissingCredentials => "missing_credentials",
            RepositoryError::InvalidResponse { .. } => "invalid_response",
            RepositoryError::Cancelled => "cancelled",
            RepositoryError::Offline => "offline",
            RepositoryError::FileSystem { .. } => "file_system",
        }
    }
}

/// Where missing mods come from
#[async_trait]
pub trait ModRepository: Send + Sync {
    async fn latest_version(&self, name: &str) -> Result<ModVersion, RepositoryError>;

    /// Newest release whose target game version is compatible with `host`
    async fn latest_compatible_version(
        &self,
        name: &str,
        host: &ModVersion,
    ) -> Result<ModVersion, RepositoryError>;

    /// Download a release into `destination` and return the file path
    ///
    /// Once `cancel` fires the call must return `RepositoryError::Cancelled`
    /// promptly, without leaving partial files in `destination`.
    async fn download(
        &self,
        name: &str,
        version: &ModVersion,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, RepositoryError>;
}

/// A repository that is never reachable
///
/// Imports against it only use local and embedded mod files.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineRepository;

#[async_trait]
impl ModRepository for OfflineRepository {
    async fn latest_version(&self, _name: &str) -> Result<ModVersion, RepositoryError> {
        Err(RepositoryError::Offline)
    }

    async fn latest_compatible_version(
        &self,
        _name: &str,
        _host: &ModVersion,
    ) -> Result<ModVersion, RepositoryError> {
        Err(RepositoryError::Offline)
    }

    async fn download(
        &self,
        _name: &str,
        _version: &ModVersion,
        _destination: &Path,
        _cancel: &CancellationToken,
    ) -> Result<PathBuf, RepositoryError> {
        Err(RepositoryError::Offline)
    }
}
