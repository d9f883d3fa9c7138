//! Factorio mod portal client
//!
//! Release listings come from `GET /api/mods/{name}/full`, which is public.
//! Downloads need a user name and token passed as query parameters.

pub mod client;

pub use client::PortalClient;

use crate::core::ModVersion;
use serde::Deserialize;

/// The subset of the `/full` response the client needs
#[derive(Debug, Clone, Deserialize)]
pub struct PortalMod {
    pub name: String,
    #[serde(default)]
    pub releases: Vec<Release>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    /// Path relative to the portal, e.g. `/download/bob/5a5f1ae6`
    pub download_url: String,
    pub file_name: String,
    pub version: ModVersion,
    pub info_json: ReleaseInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseInfo {
    pub factorio_version: ModVersion,
}
