//! Flattened mod and modpack definitions as stored in a package

use crate::core::{ModVersion, PackageError};
use crate::export::linearize::GraphNode;
use crate::package::mode::{ExportMode, StrategyKind, VersionStrategy};
use serde::{Deserialize, Serialize};

/// A deduplicated reference to a mod and the way it is resolved on import
///
/// Definitions are immutable once built. The strategy is part of the type, so
/// a definition with an invalid export mode cannot exist; decoding one from a
/// document fails instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawModDefinition", into = "RawModDefinition")]
pub struct ModDefinition {
    uid: u32,
    name: String,
    mode: ExportMode,
}

impl ModDefinition {
    pub fn new<S: Into<String>>(uid: u32, name: S, mode: ExportMode) -> Self {
        Self {
            uid,
            name: name.into(),
            mode,
        }
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> &ExportMode {
        &self.mode
    }

    /// The exact version to install, for definitions pinned to one
    pub fn version(&self) -> Option<ModVersion> {
        match self.mode.strategy {
            VersionStrategy::Specific(version) => Some(version),
            _ => None,
        }
    }

    /// The game version target, for compatibility-resolved definitions
    pub fn factorio_version(&self) -> Option<ModVersion> {
        match self.mode.strategy {
            VersionStrategy::FactorioCompatible(host) => Some(host),
            _ => None,
        }
    }

    pub fn key(&self) -> DefinitionKey {
        DefinitionKey::new(&self.name, &self.mode)
    }
}

/// Identity of a mod definition for deduplication
///
/// The embedding flags are not part of the identity: two references that only
/// differ in whether the file is bundled share one definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DefinitionKey {
    pub name: String,
    pub strategy: StrategyKind,
    pub version: Option<ModVersion>,
}

impl DefinitionKey {
    pub fn new(name: &str, mode: &ExportMode) -> Self {
        Self {
            name: name.to_string(),
            strategy: mode.strategy.kind(),
            version: mode.strategy.comparison_version(),
        }
    }
}

/// Wire shape of a mod definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawModDefinition {
    uid: u32,
    name: String,
    export_mode: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<ModVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    factorio_version: Option<ModVersion>,
}

impl TryFrom<RawModDefinition> for ModDefinition {
    type Error = PackageError;

    fn try_from(raw: RawModDefinition) -> Result<Self, Self::Error> {
        let mode = ExportMode::from_bits(raw.export_mode, raw.version, raw.factorio_version)
            .map_err(|err| match err {
                PackageError::MissingVersion { field, .. } => PackageError::MissingVersion {
                    uid: raw.uid,
                    name: raw.name.clone(),
                    field,
                },
                other => other,
            })?;

        Ok(ModDefinition::new(raw.uid, raw.name, mode))
    }
}

impl From<ModDefinition> for RawModDefinition {
    fn from(definition: ModDefinition) -> Self {
        RawModDefinition {
            uid: definition.uid,
            export_mode: definition.mode.bits(),
            version: definition.version(),
            factorio_version: definition.factorio_version(),
            name: definition.name,
        }
    }
}

/// A modpack with its members replaced by definition uids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModpackDefinition {
    pub uid: u32,
    pub name: String,
    #[serde(default)]
    pub mod_ids: Vec<u32>,
    #[serde(default)]
    pub modpack_ids: Vec<u32>,
}

impl ModpackDefinition {
    pub fn new<S: Into<String>>(uid: u32, name: S) -> Self {
        Self {
            uid,
            name: name.into(),
            mod_ids: Vec::new(),
            modpack_ids: Vec::new(),
        }
    }

    pub fn with_mods(mut self, mod_ids: Vec<u32>) -> Self {
        self.mod_ids = mod_ids;
        self
    }

    pub fn with_modpacks(mut self, modpack_ids: Vec<u32>) -> Self {
        self.modpack_ids = modpack_ids;
        self
    }
}

impl GraphNode for ModpackDefinition {
    fn uid(&self) -> u32 {
        self.uid
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn children(&self) -> &[u32] {
        &self.modpack_ids
    }
}
