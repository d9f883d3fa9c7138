//! `modpacks.json`: the modpack layout kept next to the mods
//!
//! ```json
//! {
//!   "modpacks": [
//!     {"name": "Core", "mods": ["bob@1.2.0", "angel"], "modpacks": []},
//!     {"name": "MyPack", "mods": [], "modpacks": ["Core"]}
//!   ]
//! }
//! ```
//!
//! A mod without `@version` means the newest installed version. Names are
//! unique within the file since modpacks refer to each other by name.

use anyhow::{Context, Result, bail};
use packager::{LocalModStore, ModStore, ModVersion};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

pub const LAYOUT_FILE: &str = "modpacks.json";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Layout {
    #[serde(default)]
    pub modpacks: Vec<LayoutModpack>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LayoutModpack {
    pub name: String,
    #[serde(default)]
    pub mods: Vec<String>,
    #[serde(default)]
    pub modpacks: Vec<String>,
}

pub fn layout_path(mods_dir: &Path) -> PathBuf {
    mods_dir.join(LAYOUT_FILE)
}

impl Layout {
    /// Read the layout of `mods_dir`; a missing file is an empty layout
    pub fn load(mods_dir: &Path) -> Result<Self> {
        let path = layout_path(mods_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn save(&self, mods_dir: &Path) -> Result<()> {
        let path = layout_path(mods_dir);
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))
    }

    /// Add the layout's modpacks to `store`
    ///
    /// Modpack uids follow the order of the file, so sub-modpacks may be
    /// listed after the modpacks that contain them.
    pub fn apply(&self, store: &mut LocalModStore) -> Result<()> {
        let first_uid = store.modpacks().len() as u32;
        let mut uids: HashMap<&str, u32> = HashMap::with_capacity(self.modpacks.len());
        for (i, modpack) in self.modpacks.iter().enumerate() {
            if uids.insert(modpack.name.as_str(), first_uid + i as u32).is_some() {
                bail!("modpack name '{}' is used more than once", modpack.name);
            }
        }

        for modpack in &self.modpacks {
            let mut mods = Vec::with_capacity(modpack.mods.len());
            for reference in &modpack.mods {
                let (name, version) = parse_reference(reference)?;
                let module = match version {
                    Some(version) => store.find_mod(name, &version),
                    None => store.newest_mod(name, None),
                };
                match module {
                    Some(module) => mods.push(module),
                    None => bail!("modpack '{}' uses '{}', which is not installed", modpack.name, reference),
                }
            }

            let mut children = Vec::with_capacity(modpack.modpacks.len());
            for child in &modpack.modpacks {
                match uids.get(child.as_str()) {
                    Some(&uid) => children.push(uid),
                    None => bail!("modpack '{}' contains unknown modpack '{}'", modpack.name, child),
                }
            }

            store.add_modpack(modpack.name.clone(), mods, children);
        }
        Ok(())
    }

    /// Snapshot the modpacks of `store`
    ///
    /// Modpacks sharing a name are saved as "Name (2)", "Name (3)" and so on,
    /// in store order.
    pub fn from_store(store: &LocalModStore) -> Self {
        let mut taken: HashSet<String> = HashSet::with_capacity(store.modpacks().len());
        let mut names: HashMap<u32, String> = HashMap::with_capacity(store.modpacks().len());
        for modpack in store.modpacks() {
            let mut name = modpack.name.clone();
            let mut n = 2;
            while taken.contains(&name) {
                name = format!("{} ({})", modpack.name, n);
                n += 1;
            }
            taken.insert(name.clone());
            names.insert(modpack.uid, name);
        }

        let modpacks = store
            .modpacks()
            .iter()
            .map(|modpack| LayoutModpack {
                name: names[&modpack.uid].clone(),
                mods: modpack
                    .mods
                    .iter()
                    .map(|module| format!("{}@{}", module.name, module.version))
                    .collect(),
                modpacks: modpack
                    .modpacks
                    .iter()
                    .filter_map(|uid| names.get(uid).cloned())
                    .collect(),
            })
            .collect();
        Self { modpacks }
    }
}

fn parse_reference(reference: &str) -> Result<(&str, Option<ModVersion>)> {
    match reference.rsplit_once('@') {
        Some((name, version)) => {
            let version = version
                .parse()
                .with_context(|| format!("bad version in mod reference '{reference}'"))?;
            Ok((name, Some(version)))
        }
        None => Ok((reference, None)),
    }
}
