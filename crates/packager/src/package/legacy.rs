//! Reader for format 1 package documents
//!
//! Format 1 stored every modpack with its directly nested members referenced
//! by name and no deduplicated definitions. Documents are upgraded to the
//! current model on read; nothing writes this format any more.

use crate::core::{ModVersion, PackageError, Result};
use crate::export::linearize::linearize;
use crate::package::definition::{ModDefinition, ModpackDefinition};
use crate::package::document::Package;
use crate::package::mode::ExportMode;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LegacyPackage {
    #[serde(default)]
    mods: Vec<LegacyMod>,
    #[serde(default)]
    modpacks: Vec<LegacyModpack>,
    #[serde(default)]
    includes_version_info: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct LegacyMod {
    name: String,
    #[serde(default)]
    version: Option<ModVersion>,
}

#[derive(Debug, Clone, Deserialize)]
struct LegacyModpack {
    name: String,
    #[serde(default)]
    mods: Vec<String>,
    #[serde(default)]
    modpacks: Vec<String>,
}

impl LegacyPackage {
    /// Convert to a current-format package
    ///
    /// Mods and modpacks get uids in document order. Name references resolve
    /// to the first entry with that name, and modpacks are re-ordered so that
    /// sub-modpacks come first.
    pub(crate) fn into_package(self) -> Result<Package> {
        debug!(
            mods = self.mods.len(),
            modpacks = self.modpacks.len(),
            "upgrading format 1 package"
        );

        let mut mods = Vec::with_capacity(self.mods.len());
        let mut mod_uids: HashMap<&str, u32> = HashMap::new();
        for (uid, legacy) in (0u32..).zip(&self.mods) {
            let mode = match legacy.version {
                Some(version) if self.includes_version_info => ExportMode::specific(version),
                _ => ExportMode::latest(),
            };
            mods.push(ModDefinition::new(uid, legacy.name.clone(), mode));
            mod_uids.entry(legacy.name.as_str()).or_insert(uid);
        }

        let mut modpack_uids: HashMap<&str, u32> = HashMap::new();
        for (uid, modpack) in (0u32..).zip(&self.modpacks) {
            modpack_uids.entry(modpack.name.as_str()).or_insert(uid);
        }

        let mut modpacks = Vec::with_capacity(self.modpacks.len());
        for (uid, legacy) in (0u32..).zip(&self.modpacks) {
            let mod_ids = resolve_names(&legacy.mods, &mod_uids, &legacy.name, "mod")?;
            let modpack_ids = resolve_names(&legacy.modpacks, &modpack_uids, &legacy.name, "modpack")?;
            modpacks.push(
                ModpackDefinition::new(uid, legacy.name.clone())
                    .with_mods(mod_ids)
                    .with_modpacks(modpack_ids),
            );
        }

        let order = linearize(&modpacks)?;
        let mut slots: Vec<Option<ModpackDefinition>> = modpacks.into_iter().map(Some).collect();
        let ordered = order
            .into_iter()
            .filter_map(|index| slots[index].take())
            .collect();

        Package::new(mods, ordered)
    }
}

fn resolve_names(
    names: &[String],
    uids: &HashMap<&str, u32>,
    owner: &str,
    kind: &str,
) -> Result<Vec<u32>> {
    let mut resolved = Vec::with_capacity(names.len());
    for name in names {
        let uid = uids
            .get(name.as_str())
            .copied()
            .ok_or_else(|| PackageError::InvalidPackage {
                reason: format!("modpack '{}' references unknown {} '{}'", owner, kind, name),
            })?;
        if !resolved.contains(&uid) {
            resolved.push(uid);
        }
    }
    Ok(resolved)
}
