//! Package data model
//!
//! The serializable document shared by export and import, plus the file-level
//! constants of the two container formats.

pub mod definition;
pub mod document;
pub(crate) mod legacy;
pub mod mode;

pub use definition::{DefinitionKey, ModDefinition, ModpackDefinition};
pub use document::{CURRENT_FORMAT_VERSION, LEGACY_FORMAT_VERSION, Package};
pub use mode::{ExportMode, StrategyKind, VersionStrategy};

use std::path::Path;

/// Name of the document entry inside a `.fmpa` archive
pub const PACK_DOCUMENT_ENTRY: &str = "pack.json";

/// Separator between the definition uid and the file name of embedded entries
pub const EMBEDDED_NAME_SEPARATOR: char = '+';

/// The two on-disk container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// `.fmp`: the bare JSON document
    Document,
    /// `.fmpa`: a zip archive with the document and embedded mod files
    Archive,
}

impl ContainerKind {
    pub fn extension(self) -> &'static str {
        match self {
            ContainerKind::Document => "fmp",
            ContainerKind::Archive => "fmpa",
        }
    }

    /// Detect the container from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "fmp" => Some(ContainerKind::Document),
            "fmpa" => Some(ContainerKind::Archive),
            _ => None,
        }
    }
}

/// Archive entry name for an embedded mod file
pub fn embedded_entry_name(uid: u32, file_name: &str) -> String {
    format!("{}{}{}", uid, EMBEDDED_NAME_SEPARATOR, file_name)
}

/// Split an embedded entry name into the definition uid and original file name
pub fn parse_embedded_entry_name(entry: &str) -> Option<(u32, &str)> {
    let (uid, file_name) = entry.split_once(EMBEDDED_NAME_SEPARATOR)?;
    if file_name.is_empty() || uid.is_empty() || !uid.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((uid.parse().ok()?, file_name))
}
