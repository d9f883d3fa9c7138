//! Mod file validation
//!
//! A Factorio mod is a zip archive with a single top-level directory holding
//! an `info.json` that declares the mod's name, version and target game
//! version.

use crate::core::ModVersion;
use crate::core::files::{MAX_INFO_SIZE, read_bounded};
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

const INFO_FILE: &str = "info.json";

/// Game version assumed by the game when `info.json` omits it
const DEFAULT_FACTORIO_VERSION: ModVersion = ModVersion::new(0, 12, 0, 0);

/// A file that was recognised as a mod
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModFile {
    pub name: String,
    pub version: ModVersion,
    pub factorio_version: ModVersion,
    pub path: PathBuf,
}

/// Checks whether a file is a well-formed mod and reads its identity
pub trait ModFileLoader: Send + Sync {
    fn try_load(&self, path: &Path) -> Option<ModFile>;
}

#[derive(Debug, Deserialize)]
struct InfoJson {
    name: String,
    version: ModVersion,
    #[serde(default)]
    factorio_version: Option<ModVersion>,
}

/// Loads mods packaged as zip archives
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipModFileLoader;

impl ZipModFileLoader {
    fn read_info(path: &Path) -> Result<InfoJson, String> {
        let file = File::open(path).map_err(|e| format!("cannot open: {e}"))?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| format!("not a zip archive: {e}"))?;

        let info_name = archive
            .file_names()
            .find(|name| is_top_level_info(name))
            .map(str::to_string)
            .ok_or_else(|| format!("no {INFO_FILE} in top-level directory"))?;

        let mut entry = archive
            .by_name(&info_name)
            .map_err(|e| format!("cannot read {INFO_FILE}: {e}"))?;
        let bytes = read_bounded(&mut entry, MAX_INFO_SIZE)
            .map_err(|e| format!("cannot read {INFO_FILE}: {e}"))?
            .ok_or_else(|| format!("{INFO_FILE} exceeds {MAX_INFO_SIZE} bytes"))?;

        serde_json::from_slice(&bytes).map_err(|e| format!("malformed {INFO_FILE}: {e}"))
    }
}

// `<dir>/info.json`, exactly one directory deep
fn is_top_level_info(entry_name: &str) -> bool {
    let mut parts = entry_name.split('/');
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(dir), Some(INFO_FILE), None) if !dir.is_empty()
    )
}

impl ModFileLoader for ZipModFileLoader {
    fn try_load(&self, path: &Path) -> Option<ModFile> {
        match Self::read_info(path) {
            Ok(info) => Some(ModFile {
                name: info.name,
                version: info.version,
                factorio_version: info.factorio_version.unwrap_or(DEFAULT_FACTORIO_VERSION),
                path: path.to_path_buf(),
            }),
            Err(reason) => {
                debug!("{} is not a mod: {}", path.display(), reason);
                None
            }
        }
    }
}
