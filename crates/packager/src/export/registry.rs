//! Deduplicating registry of mod definitions

use crate::package::{DefinitionKey, ExportMode, ModDefinition, embedded_entry_name};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// A mod file to bundle into the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedFile {
    /// Uid of the definition the file satisfies
    pub uid: u32,
    /// File on disk
    pub path: PathBuf,
    /// Original file name, restored on import
    pub file_name: String,
}

impl EmbeddedFile {
    pub fn new(uid: u32, path: PathBuf) -> Self {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("mod-{uid}.zip"));
        Self {
            uid,
            path,
            file_name,
        }
    }

    /// Name of the archive entry, `{uid}+{file_name}`
    pub fn entry_name(&self) -> String {
        embedded_entry_name(self.uid, &self.file_name)
    }
}

/// Assigns one definition per distinct (mod, resolution strategy) pair
///
/// Uids are handed out sequentially from zero in first-seen order, and the
/// mapping lives only as long as one export.
#[derive(Debug, Default)]
pub struct ModDefinitionRegistry {
    lookup: HashMap<DefinitionKey, u32>,
    definitions: Vec<ModDefinition>,
    files: Vec<EmbeddedFile>,
    next_uid: u32,
}

impl ModDefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the definition for `name` under `mode`, creating it if needed
    ///
    /// On creation of an included definition `mod_file` is asked for the file
    /// to bundle. Returns the uid and whether the definition is new.
    pub fn get_or_create<F>(&mut self, name: &str, mode: ExportMode, mod_file: F) -> (u32, bool)
    where
        F: FnOnce() -> PathBuf,
    {
        let key = DefinitionKey::new(name, &mode);
        if let Some(&uid) = self.lookup.get(&key) {
            return (uid, false);
        }

        let uid = self.next_uid;
        self.next_uid += 1;

        if mode.included {
            let file = EmbeddedFile::new(uid, mod_file());
            debug!(uid, name, file = %file.path.display(), "bundling mod file");
            self.files.push(file);
        }

        debug!(uid, name, mode = mode.bits(), "new mod definition");
        self.lookup.insert(key, uid);
        self.definitions.push(ModDefinition::new(uid, name, mode));
        (uid, true)
    }

    pub fn definitions(&self) -> &[ModDefinition] {
        &self.definitions
    }

    pub fn files(&self) -> &[EmbeddedFile] {
        &self.files
    }

    pub fn into_parts(self) -> (Vec<ModDefinition>, Vec<EmbeddedFile>) {
        (self.definitions, self.files)
    }
}
