//! The package document
//!
//! A package is self-contained: every id a modpack definition mentions is
//! defined in the same document, and modpacks only reference modpacks that
//! appear before them. [`Package::validate`] checks both, and every way of
//! obtaining a `Package` (building or parsing) runs it.

use crate::core::{DefinitionKind, PackageError, Result};
use crate::package::definition::{ModDefinition, ModpackDefinition};
use crate::package::legacy::LegacyPackage;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Format version written by this crate
pub const CURRENT_FORMAT_VERSION: u32 = 2;

/// Format version of the original, non-deduplicated documents
pub const LEGACY_FORMAT_VERSION: u32 = 1;

/// The flattened, serializable set of modpacks and the mods they reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    #[serde(rename = "version")]
    format_version: u32,
    mods: Vec<ModDefinition>,
    modpacks: Vec<ModpackDefinition>,
}

impl Package {
    /// Assemble and validate a current-format package
    pub fn new(mods: Vec<ModDefinition>, modpacks: Vec<ModpackDefinition>) -> Result<Self> {
        let package = Self {
            format_version: CURRENT_FORMAT_VERSION,
            mods,
            modpacks,
        };
        package.validate()?;
        Ok(package)
    }

    pub fn format_version(&self) -> u32 {
        self.format_version
    }

    pub fn mods(&self) -> &[ModDefinition] {
        &self.mods
    }

    /// Modpack definitions, dependencies before dependents
    pub fn modpacks(&self) -> &[ModpackDefinition] {
        &self.modpacks
    }

    pub fn mod_definition(&self, uid: u32) -> Option<&ModDefinition> {
        self.mods.iter().find(|definition| definition.uid() == uid)
    }

    pub fn modpack_definition(&self, uid: u32) -> Option<&ModpackDefinition> {
        self.modpacks.iter().find(|definition| definition.uid == uid)
    }

    /// Check uid uniqueness, closed-world references and modpack ordering
    pub fn validate(&self) -> Result<()> {
        let mut mod_uids = HashSet::with_capacity(self.mods.len());
        for definition in &self.mods {
            if !mod_uids.insert(definition.uid()) {
                return Err(PackageError::DuplicateDefinitionUid {
                    kind: DefinitionKind::Mod,
                    uid: definition.uid(),
                });
            }
        }

        let all_modpack_uids: HashSet<u32> = self.modpacks.iter().map(|m| m.uid).collect();
        let mut defined_modpacks = HashSet::with_capacity(self.modpacks.len());

        for modpack in &self.modpacks {
            if let Some(&uid) = modpack.mod_ids.iter().find(|uid| !mod_uids.contains(*uid)) {
                return Err(PackageError::DanglingReference {
                    modpack_uid: modpack.uid,
                    kind: DefinitionKind::Mod,
                    uid,
                });
            }

            for &uid in &modpack.modpack_ids {
                if defined_modpacks.contains(&uid) {
                    continue;
                }
                return Err(if all_modpack_uids.contains(&uid) {
                    PackageError::ForwardReference {
                        modpack_uid: modpack.uid,
                        uid,
                    }
                } else {
                    PackageError::DanglingReference {
                        modpack_uid: modpack.uid,
                        kind: DefinitionKind::Modpack,
                        uid,
                    }
                });
            }

            if !defined_modpacks.insert(modpack.uid) {
                return Err(PackageError::DuplicateDefinitionUid {
                    kind: DefinitionKind::Modpack,
                    uid: modpack.uid,
                });
            }
        }

        Ok(())
    }

    /// Parse a package document of any supported format version
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Self::from_slice(text.as_bytes())
    }

    fn from_value(value: serde_json::Value) -> Result<Self> {
        let Some(object) = value.as_object() else {
            return Err(PackageError::InvalidPackage {
                reason: "document is not a JSON object".to_string(),
            });
        };

        let format_version = match object.get("version") {
            None => LEGACY_FORMAT_VERSION,
            Some(raw) => raw
                .as_u64()
                .and_then(|version| u32::try_from(version).ok())
                .ok_or_else(|| PackageError::InvalidPackage {
                    reason: format!("format version {} is not a number", raw),
                })?,
        };
        debug!(format_version, "parsing package document");

        let package = match format_version {
            LEGACY_FORMAT_VERSION => {
                let legacy: LegacyPackage = serde_json::from_value(value)?;
                legacy.into_package()?
            }
            CURRENT_FORMAT_VERSION => serde_json::from_value::<Package>(value)?,
            version => {
                return Err(PackageError::UnsupportedFormatVersion {
                    version,
                    supported: CURRENT_FORMAT_VERSION,
                });
            }
        };

        package.validate()?;
        Ok(package)
    }

    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ModVersion;
    use crate::package::mode::ExportMode;
    use serde_json::json;

    fn sample() -> Package {
        let mods = vec![
            ModDefinition::new(0, "bob", ExportMode::latest().with_included(true)),
            ModDefinition::new(1, "angel", ExportMode::specific(ModVersion::new(0, 9, 3, 0))),
        ];
        let modpacks = vec![
            ModpackDefinition::new(0, "Base").with_mods(vec![1]),
            ModpackDefinition::new(1, "MyPack").with_mods(vec![0]).with_modpacks(vec![0]),
        ];
        Package::new(mods, modpacks).unwrap()
    }

    #[test]
    fn test_document_shape() {
        let value: serde_json::Value = serde_json::from_str(&sample().to_json(false).unwrap()).unwrap();
        assert_eq!(value["version"], 2);
        assert_eq!(value["mods"][0]["exportMode"], 0x101);
        assert_eq!(value["modpacks"][1]["modpackIds"], json!([0]));
    }

    #[test]
    fn test_parse_current_format() {
        let package = sample();
        let parsed = Package::from_json(&package.to_json(true).unwrap()).unwrap();
        assert_eq!(parsed, package);
    }

    #[test]
    fn test_forward_reference_rejected() {
        let modpacks = vec![
            ModpackDefinition::new(1, "MyPack").with_modpacks(vec![0]),
            ModpackDefinition::new(0, "Base"),
        ];
        let err = Package::new(Vec::new(), modpacks).unwrap_err();
        assert!(matches!(err, PackageError::ForwardReference { modpack_uid: 1, uid: 0 }));
    }

    #[test]
    fn test_self_reference_rejected() {
        let modpacks = vec![ModpackDefinition::new(0, "Loop").with_modpacks(vec![0])];
        let err = Package::new(Vec::new(), modpacks).unwrap_err();
        assert!(matches!(err, PackageError::ForwardReference { .. }));
    }

    #[test]
    fn test_dangling_mod_reference_rejected() {
        let modpacks = vec![ModpackDefinition::new(0, "P").with_mods(vec![7])];
        let err = Package::new(Vec::new(), modpacks).unwrap_err();
        assert!(matches!(
            err,
            PackageError::DanglingReference { kind: DefinitionKind::Mod, uid: 7, .. }
        ));
    }

    #[test]
    fn test_duplicate_mod_uid_rejected() {
        let mods = vec![
            ModDefinition::new(0, "bob", ExportMode::latest()),
            ModDefinition::new(0, "angel", ExportMode::latest()),
        ];
        let err = Package::new(mods, Vec::new()).unwrap_err();
        assert!(matches!(err, PackageError::DuplicateDefinitionUid { kind: DefinitionKind::Mod, uid: 0 }));
    }

    #[test]
    fn test_structureless_documents_are_invalid() {
        for text in ["null", "[]", "42"] {
            let err = Package::from_json(text).unwrap_err();
            assert!(err.is_invalid_package(), "{text}: {err}");
        }
        assert!(Package::from_json("{not json").unwrap_err().is_invalid_package());
    }

    #[test]
    fn test_newer_format_rejected() {
        let err = Package::from_json(r#"{"version": 3, "mods": [], "modpacks": []}"#).unwrap_err();
        assert!(matches!(err, PackageError::UnsupportedFormatVersion { version: 3, .. }));
    }
}
