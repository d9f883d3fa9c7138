//! Turns domain modpacks into a package document

use crate::core::{PackageError, Result};
use crate::domain::Modpack;
use crate::export::linearize::{index_by_uid, linearize};
use crate::export::registry::{EmbeddedFile, ModDefinitionRegistry};
use crate::export::settings::ExportSettings;
use crate::package::{ModpackDefinition, Package};
use std::collections::HashSet;
use tracing::{debug, info};

/// Referrer name used when an unknown uid comes from the caller's selection
const SELECTION: &str = "<selection>";

/// A package ready to be written, with the files it wants embedded
#[derive(Debug, Clone)]
pub struct PreparedExport {
    pub package: Package,
    /// Files to bundle, in definition order
    pub files: Vec<EmbeddedFile>,
}

impl PreparedExport {
    pub fn has_embedded_files(&self) -> bool {
        !self.files.is_empty()
    }
}

/// Build the package for `selected` modpacks and everything they contain
///
/// `modpacks` is the user's full collection. An empty selection exports all
/// of it. Modpack definitions keep the uids of their domain modpacks; mod
/// definitions are numbered from zero.
pub fn prepare_export(
    modpacks: &[Modpack],
    selected: &[u32],
    settings: &ExportSettings,
) -> Result<PreparedExport> {
    let subset = closure(modpacks, selected)?;
    let order = linearize(&subset)?;

    let mut registry = ModDefinitionRegistry::new();
    let mut definitions = Vec::with_capacity(order.len());

    for position in order {
        let modpack = subset[position];

        let mut mod_ids = Vec::with_capacity(modpack.mods.len());
        for module in &modpack.mods {
            let mode = settings.mode_for(modpack.uid, module);
            let (uid, _) = registry.get_or_create(&module.name, mode, || module.path.clone());
            if !mod_ids.contains(&uid) {
                mod_ids.push(uid);
            }
        }

        let mut modpack_ids = Vec::with_capacity(modpack.modpacks.len());
        for &uid in &modpack.modpacks {
            if !modpack_ids.contains(&uid) {
                modpack_ids.push(uid);
            }
        }

        debug!(uid = modpack.uid, name = %modpack.name, mods = mod_ids.len(), "prepared modpack");
        definitions.push(
            ModpackDefinition::new(modpack.uid, modpack.name.clone())
                .with_mods(mod_ids)
                .with_modpacks(modpack_ids),
        );
    }

    let (mods, files) = registry.into_parts();
    info!(
        "Prepared export of {} modpacks, {} mod definitions, {} embedded files",
        definitions.len(),
        mods.len(),
        files.len()
    );

    Ok(PreparedExport {
        package: Package::new(mods, definitions)?,
        files,
    })
}

/// The selected modpacks plus everything reachable from them, in input order
fn closure<'a>(modpacks: &'a [Modpack], selected: &[u32]) -> Result<Vec<&'a Modpack>> {
    let index = index_by_uid(modpacks)?;
    if selected.is_empty() {
        return Ok(modpacks.iter().collect());
    }

    let mut reachable = HashSet::new();
    let mut stack = Vec::with_capacity(selected.len());
    for &uid in selected {
        if !index.contains_key(&uid) {
            return Err(PackageError::UnknownModpack {
                uid,
                referenced_by: SELECTION.to_string(),
            });
        }
        stack.push(uid);
    }

    while let Some(uid) = stack.pop() {
        if !reachable.insert(uid) {
            continue;
        }
        let modpack = &modpacks[index[&uid]];
        for &child in &modpack.modpacks {
            if !index.contains_key(&child) {
                return Err(PackageError::UnknownModpack {
                    uid: child,
                    referenced_by: modpack.name.clone(),
                });
            }
            stack.push(child);
        }
    }

    Ok(modpacks
        .iter()
        .filter(|modpack| reachable.contains(&modpack.uid))
        .collect())
}
