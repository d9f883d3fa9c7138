//! Installing an imported package into the local mod store
//!
//! Every mod definition is resolved on its own, in document order:
//!
//! 1. the target version is fixed (exact, newest, or newest compatible with a
//!    game version; the latter two ask the repository);
//! 2. an installed mod with that version is reused;
//! 3. otherwise the file embedded for the definition is installed if it is a
//!    valid copy of the mod;
//! 4. otherwise the target version is downloaded.
//!
//! A bundled file without `download_newer` is wanted whatever the newest
//! release is, so for `Latest` and `FactorioCompatible` definitions it is tried
//! before the repository is asked anything; an installed copy of the same
//! version still wins over the file.
//!
//! A definition that cannot be resolved is reported and left out of the
//! modpacks. Modpacks are only rebuilt once every definition has been dealt
//! with.

use crate::core::progress::emit;
use crate::core::{
    FileOperation, ModVersion, PackageError, ProgressCallback, ProgressEvent, error::file_error,
};
use crate::domain::{Mod, ModFileLoader, ModRepository, ModStore, RepositoryError};
use crate::import::reader::{ExtractedFile, ExtractedFiles, ImportResult};
use crate::package::{ModDefinition, Package, VersionStrategy};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A mod definition that could not be installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedMod {
    pub uid: u32,
    pub name: String,
    pub reason: String,
}

/// What reconciliation added to the store
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    /// Mods backing the resolved definitions, without duplicates
    pub mods: Vec<Arc<Mod>>,
    /// Store uids of the created modpacks, in document order
    pub modpacks: Vec<u32>,
    pub unresolved: Vec<UnresolvedMod>,
}

impl ReconcileOutcome {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Local,
    Embedded,
    Downloaded,
}

/// Resolves imported packages against a store, a repository and the files
/// that came with the package
#[derive(Clone)]
pub struct Reconciler {
    repository: Arc<dyn ModRepository>,
    loader: Arc<dyn ModFileLoader>,
    cancel: CancellationToken,
    progress: Option<ProgressCallback>,
}

impl Reconciler {
    pub fn new(repository: Arc<dyn ModRepository>, loader: Arc<dyn ModFileLoader>) -> Self {
        Self {
            repository,
            loader,
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    /// Use `cancel` to stop pending lookups and downloads
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Install the mods of `import` and recreate its modpacks in `store`
    ///
    /// Cancellation only affects network operations: mods that are still
    /// waiting for the repository become unresolved, everything else is
    /// imported as usual.
    pub async fn reconcile<S>(&self, import: ImportResult, store: &mut S) -> ReconcileOutcome
    where
        S: ModStore + ?Sized,
    {
        let ImportResult {
            package,
            mut files,
            temp_dir: _temp_dir,
            ..
        } = import;

        let mut outcome = ReconcileOutcome::default();
        let mut resolved: HashMap<u32, Arc<Mod>> = HashMap::with_capacity(package.mods().len());
        let total = package.mods().len();

        for (index, definition) in package.mods().iter().enumerate() {
            emit(
                self.progress.as_ref(),
                ProgressEvent::ModStarted {
                    name: definition.name().to_string(),
                    index,
                    total,
                },
            );

            match self.resolve(definition, &mut files, store).await {
                Ok((module, source)) => {
                    let name = module.name.clone();
                    let version = module.version.to_string();
                    let event = match source {
                        Source::Local => ProgressEvent::ModReused { name, version },
                        Source::Embedded => ProgressEvent::ModExtracted { name, version },
                        Source::Downloaded => ProgressEvent::ModDownloaded { name, version },
                    };
                    emit(self.progress.as_ref(), event);

                    if !outcome.mods.iter().any(|known| Arc::ptr_eq(known, &module)) {
                        outcome.mods.push(module.clone());
                    }
                    resolved.insert(definition.uid(), module);
                }
                Err(reason) => {
                    warn!("Could not resolve mod '{}': {}", definition.name(), reason);
                    emit(
                        self.progress.as_ref(),
                        ProgressEvent::ModUnresolved {
                            name: definition.name().to_string(),
                            reason: reason.clone(),
                        },
                    );
                    outcome.unresolved.push(UnresolvedMod {
                        uid: definition.uid(),
                        name: definition.name().to_string(),
                        reason,
                    });
                }
            }
        }

        outcome.modpacks = self.rebuild_modpacks(&package, &resolved, store);
        info!(
            "Imported {} mods and {} modpacks ({} unresolved)",
            outcome.mods.len(),
            outcome.modpacks.len(),
            outcome.unresolved.len()
        );
        outcome
    }

    async fn resolve<S>(
        &self,
        definition: &ModDefinition,
        files: &mut ExtractedFiles,
        store: &mut S,
    ) -> Result<(Arc<Mod>, Source), String>
    where
        S: ModStore + ?Sized,
    {
        let name = definition.name();
        let mode = definition.mode();

        if !mode.download_newer && !matches!(mode.strategy, VersionStrategy::Specific(_)) {
            if let Some(file) = files.take_for_uid(definition.uid()) {
                match self.install_embedded(file, definition, None, store).await {
                    Ok(Some(resolved)) => return Ok(resolved),
                    Ok(None) => {}
                    Err(reason) => warn!("Embedded file for '{}' not used: {}", name, reason),
                }
            }
        }

        let target = match mode.strategy {
            VersionStrategy::Specific(version) => Ok(version),
            VersionStrategy::Latest => self.remote(self.repository.latest_version(name)).await,
            VersionStrategy::FactorioCompatible(host) => {
                self.remote(self.repository.latest_compatible_version(name, &host)).await
            }
        };

        match &target {
            Ok(version) => {
                debug!(name, %version, "target version");
                if let Some(module) = store.find_mod(name, version) {
                    return Ok((module, Source::Local));
                }
            }
            Err(e) => {
                debug!(name, "no target version: {}", e);
                let host = match mode.strategy {
                    VersionStrategy::FactorioCompatible(host) => Some(host),
                    _ => None,
                };
                if let Some(module) = store.newest_mod(name, host.as_ref()) {
                    return Ok((module, Source::Local));
                }
            }
        }

        if let Some(file) = files.take_for_uid(definition.uid()) {
            match self
                .install_embedded(file, definition, target.as_ref().ok(), store)
                .await
            {
                Ok(Some(resolved)) => return Ok(resolved),
                Ok(None) => {}
                Err(reason) => warn!("Embedded file for '{}' not used: {}", name, reason),
            }
        }

        let version = target.map_err(|e| describe(&e))?;
        let module = self.download(name, &version, store).await?;
        Ok((module, Source::Downloaded))
    }

    /// Install the embedded file if it is usable
    ///
    /// `Ok(None)` means the file is valid but a newer release is wanted. An
    /// installed mod with the same version is reused instead of the file.
    async fn install_embedded<S>(
        &self,
        file: ExtractedFile,
        definition: &ModDefinition,
        target: Option<&ModVersion>,
        store: &mut S,
    ) -> Result<Option<(Arc<Mod>, Source)>, String>
    where
        S: ModStore + ?Sized,
    {
        let loaded = self
            .loader
            .try_load(&file.path)
            .filter(|loaded| loaded.name == definition.name())
            .ok_or_else(|| format!("'{}' is not a valid copy of the mod", file.original_name))?;

        let wanted = match target {
            Some(target) => loaded.version == *target || !definition.mode().download_newer,
            None => true,
        };
        if !wanted {
            debug!(
                "Embedded {} {} is older than wanted release, downloading instead",
                loaded.name, loaded.version
            );
            return Ok(None);
        }

        if let Some(existing) = store.find_mod(&loaded.name, &loaded.version) {
            return Ok(Some((existing, Source::Local)));
        }

        let destination = store.mods_dir().join(&file.original_name);
        move_file(&file.path, &destination)
            .await
            .map_err(|e| e.to_string())?;
        file.keep();

        let module = Mod {
            path: destination,
            ..Mod::from(loaded)
        };
        Ok(Some((store.add_mod(module), Source::Embedded)))
    }

    async fn download<S>(
        &self,
        name: &str,
        version: &ModVersion,
        store: &mut S,
    ) -> Result<Arc<Mod>, String>
    where
        S: ModStore + ?Sized,
    {
        if self.cancel.is_cancelled() {
            return Err(describe(&RepositoryError::Cancelled));
        }
        // Not raced against the token: the repository watches it and removes
        // its partial file before returning.
        let mods_dir = store.mods_dir().to_path_buf();
        let path = self
            .repository
            .download(name, version, &mods_dir, &self.cancel)
            .await
            .map_err(|e| describe(&e))?;

        let loaded = match self.loader.try_load(&path) {
            Some(loaded) if loaded.name == name => loaded,
            _ => {
                discard(&path).await;
                return Err(format!("downloaded file {} is not a valid copy of the mod", path.display()));
            }
        };

        if loaded.version != *version {
            warn!("Downloaded {} reports version {} instead of {}", name, loaded.version, version);
        }
        Ok(store.add_mod(Mod::from(loaded)))
    }

    /// Run a repository call unless cancellation wins
    async fn remote<T, F>(&self, call: F) -> Result<T, RepositoryError>
    where
        F: Future<Output = Result<T, RepositoryError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(RepositoryError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(RepositoryError::Cancelled),
            result = call => result,
        }
    }

    fn rebuild_modpacks<S>(
        &self,
        package: &Package,
        resolved: &HashMap<u32, Arc<Mod>>,
        store: &mut S,
    ) -> Vec<u32>
    where
        S: ModStore + ?Sized,
    {
        let mut store_uids: HashMap<u32, u32> = HashMap::with_capacity(package.modpacks().len());
        let mut created = Vec::with_capacity(package.modpacks().len());

        for definition in package.modpacks() {
            let mods = definition
                .mod_ids
                .iter()
                .filter_map(|uid| resolved.get(uid).cloned())
                .collect();
            let modpacks = definition
                .modpack_ids
                .iter()
                .filter_map(|uid| store_uids.get(uid).copied())
                .collect();

            let uid = store.add_modpack(definition.name.clone(), mods, modpacks);
            store_uids.insert(definition.uid, uid);
            created.push(uid);

            emit(
                self.progress.as_ref(),
                ProgressEvent::ModpackCreated {
                    name: definition.name.clone(),
                },
            );
        }
        created
    }
}

fn describe(error: &RepositoryError) -> String {
    match error {
        RepositoryError::Cancelled => "cancelled".to_string(),
        other => other.to_string(),
    }
}

/// Move a file, falling back to copy and delete across file systems
async fn move_file(from: &Path, to: &Path) -> crate::core::Result<()> {
    if fs::try_exists(to).await.unwrap_or(false) {
        return Err(PackageError::FileSystem {
            path: to.to_path_buf(),
            operation: FileOperation::Move,
            source: std::io::Error::new(std::io::ErrorKind::AlreadyExists, "destination exists"),
        });
    }

    if fs::rename(from, to).await.is_ok() {
        debug!("Moved {} to {}", from.display(), to.display());
        return Ok(());
    }

    fs::copy(from, to).await.map_err(file_error(to, FileOperation::Write))?;
    fs::remove_file(from).await.map_err(file_error(from, FileOperation::Delete))?;
    debug!("Copied {} to {}", from.display(), to.display());
    Ok(())
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        warn!("Failed to remove {}: {}", path.display(), e);
    }
}
