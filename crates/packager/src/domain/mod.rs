//! Mods, modpacks and the collaborators the packager talks to
//!
//! The packager does not own the user's mod installation. It reads and
//! extends it through [`ModStore`], validates mod files through
//! [`ModFileLoader`], and reaches the remote mod portal through
//! [`ModRepository`]. [`LocalModStore`] is a plain in-memory store used by the
//! command line tool and the tests.

pub mod loader;
pub mod repository;

pub use loader::{ModFile, ModFileLoader, ZipModFileLoader};
pub use repository::{ModRepository, OfflineRepository, RepositoryError};

use crate::core::{FileOperation, ModVersion, Result, error::file_error};
use crate::export::linearize::GraphNode;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// An installed mod
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mod {
    pub name: String,
    pub version: ModVersion,
    /// Game version the mod was built for
    pub factorio_version: ModVersion,
    /// The mod archive on disk
    pub path: PathBuf,
}

impl Mod {
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name()?.to_str()
    }
}

impl From<ModFile> for Mod {
    fn from(file: ModFile) -> Self {
        Self {
            name: file.name,
            version: file.version,
            factorio_version: file.factorio_version,
            path: file.path,
        }
    }
}

/// A user-defined group of mods and other modpacks
#[derive(Debug, Clone)]
pub struct Modpack {
    pub uid: u32,
    pub name: String,
    pub mods: Vec<Arc<Mod>>,
    /// Uids of directly contained modpacks
    pub modpacks: Vec<u32>,
}

impl Modpack {
    pub fn new<S: Into<String>>(uid: u32, name: S) -> Self {
        Self {
            uid,
            name: name.into(),
            mods: Vec::new(),
            modpacks: Vec::new(),
        }
    }

    pub fn with_mod(mut self, module: Arc<Mod>) -> Self {
        self.mods.push(module);
        self
    }

    pub fn with_modpack(mut self, uid: u32) -> Self {
        self.modpacks.push(uid);
        self
    }
}

impl GraphNode for Modpack {
    fn uid(&self) -> u32 {
        self.uid
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn children(&self) -> &[u32] {
        &self.modpacks
    }
}

/// The local mod installation as seen by the reconciler
pub trait ModStore: Send {
    /// Directory new mod files are moved or downloaded into
    fn mods_dir(&self) -> &Path;

    fn find_mod(&self, name: &str, version: &ModVersion) -> Option<Arc<Mod>>;

    /// Newest installed version of `name`, optionally restricted to mods
    /// compatible with a game version
    fn newest_mod(&self, name: &str, host: Option<&ModVersion>) -> Option<Arc<Mod>>;

    fn add_mod(&mut self, module: Mod) -> Arc<Mod>;

    /// Create a modpack and return its uid
    fn add_modpack(&mut self, name: String, mods: Vec<Arc<Mod>>, modpacks: Vec<u32>) -> u32;
}

/// In-memory mod store over a mods directory
#[derive(Debug, Clone)]
pub struct LocalModStore {
    mods_dir: PathBuf,
    mods: Vec<Arc<Mod>>,
    modpacks: Vec<Modpack>,
    next_modpack_uid: u32,
}

impl LocalModStore {
    pub fn new<P: Into<PathBuf>>(mods_dir: P) -> Self {
        Self {
            mods_dir: mods_dir.into(),
            mods: Vec::new(),
            modpacks: Vec::new(),
            next_modpack_uid: 0,
        }
    }

    /// Load every mod archive found directly in `mods_dir`
    ///
    /// Files the loader rejects are skipped.
    pub fn scan<P: Into<PathBuf>>(mods_dir: P, loader: &dyn ModFileLoader) -> Result<Self> {
        let mut store = Self::new(mods_dir);
        let dir = store.mods_dir.clone();

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(file_error(&dir, FileOperation::Read))? {
            let entry = entry.map_err(file_error(&dir, FileOperation::Read))?;
            let path = entry.path();
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            match loader.try_load(&path) {
                Some(file) => {
                    store.add_mod(file.into());
                }
                None => debug!("skipping non-mod file {}", path.display()),
            }
        }
        Ok(store)
    }

    pub fn mods(&self) -> &[Arc<Mod>] {
        &self.mods
    }

    pub fn modpacks(&self) -> &[Modpack] {
        &self.modpacks
    }

    pub fn modpack(&self, uid: u32) -> Option<&Modpack> {
        self.modpacks.iter().find(|modpack| modpack.uid == uid)
    }

    pub fn modpack_by_name(&self, name: &str) -> Option<&Modpack> {
        self.modpacks.iter().find(|modpack| modpack.name == name)
    }
}

impl ModStore for LocalModStore {
    fn mods_dir(&self) -> &Path {
        &self.mods_dir
    }

    fn find_mod(&self, name: &str, version: &ModVersion) -> Option<Arc<Mod>> {
        self.mods
            .iter()
            .find(|module| module.name == name && module.version == *version)
            .cloned()
    }

    fn newest_mod(&self, name: &str, host: Option<&ModVersion>) -> Option<Arc<Mod>> {
        self.mods
            .iter()
            .filter(|module| module.name == name)
            .filter(|module| host.is_none_or(|host| module.factorio_version.is_compatible_with(host)))
            .max_by_key(|module| module.version)
            .cloned()
    }

    fn add_mod(&mut self, module: Mod) -> Arc<Mod> {
        if let Some(existing) = self.find_mod(&module.name, &module.version) {
            return existing;
        }
        let module = Arc::new(module);
        self.mods.push(module.clone());
        module
    }

    fn add_modpack(&mut self, name: String, mods: Vec<Arc<Mod>>, modpacks: Vec<u32>) -> u32 {
        let uid = self.next_modpack_uid;
        self.next_modpack_uid += 1;
        self.modpacks.push(Modpack {
            uid,
            name,
            mods,
            modpacks,
        });
        uid
    }
}
