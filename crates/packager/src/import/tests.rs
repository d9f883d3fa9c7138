//! End-to-end tests: export, import and reconcile

use super::*;
use crate::core::{ModVersion, ProgressCallback, ProgressEvent};
use crate::domain::{
    LocalModStore, Mod, ModFileLoader, ModRepository, ModStore, Modpack, OfflineRepository,
    RepositoryError, ZipModFileLoader,
};
use crate::export::{EmbeddedFile, ExportPolicy, ExportSettings, Exporter, prepare_export};
use crate::package::{ExportMode, ModDefinition, ModpackDefinition, Package};
use crate::test_support::write_mod_zip;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

/// In-memory mod portal that writes real mod archives on download
#[derive(Debug, Default)]
struct MockRepository {
    /// name -> (version, factorio version)
    releases: HashMap<String, Vec<(ModVersion, ModVersion)>>,
    downloads: AtomicUsize,
    lookups: AtomicUsize,
    /// Downloads leave a partial file and wait for cancellation
    stall: bool,
}

impl MockRepository {
    fn with_release(mut self, name: &str, version: &str, factorio_version: &str) -> Self {
        self.releases
            .entry(name.to_string())
            .or_default()
            .push((version.parse().unwrap(), factorio_version.parse().unwrap()));
        self
    }

    fn stalled(mut self) -> Self {
        self.stall = true;
        self
    }

    fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModRepository for MockRepository {
    async fn latest_version(&self, name: &str) -> Result<ModVersion, RepositoryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.releases
            .get(name)
            .and_then(|releases| releases.iter().map(|(version, _)| *version).max())
            .ok_or_else(|| RepositoryError::NotFound {
                name: name.to_string(),
            })
    }

    async fn latest_compatible_version(
        &self,
        name: &str,
        host: &ModVersion,
    ) -> Result<ModVersion, RepositoryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.releases
            .get(name)
            .and_then(|releases| {
                releases
                    .iter()
                    .filter(|(_, factorio)| factorio.is_compatible_with(host))
                    .map(|(version, _)| *version)
                    .max()
            })
            .ok_or_else(|| RepositoryError::NoCompatibleRelease {
                name: name.to_string(),
                host: *host,
            })
    }

    async fn download(
        &self,
        name: &str,
        version: &ModVersion,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, RepositoryError> {
        if self.stall {
            let partial = destination.join(format!("{name}.part"));
            std::fs::write(&partial, b"PK").unwrap();
            cancel.cancelled().await;
            std::fs::remove_file(&partial).unwrap();
            return Err(RepositoryError::Cancelled);
        }
        let factorio = self
            .releases
            .get(name)
            .and_then(|releases| releases.iter().find(|(v, _)| v == version))
            .map(|(_, factorio)| *factorio)
            .ok_or_else(|| RepositoryError::ReleaseNotFound {
                name: name.to_string(),
                version: *version,
            })?;
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(write_mod_zip(destination, name, &version.to_string(), &factorio.to_string()))
    }
}

fn installed(dir: &Path, name: &str, version: &str, factorio_version: &str) -> Arc<Mod> {
    let path = write_mod_zip(dir, name, version, factorio_version);
    Arc::new(ZipModFileLoader.try_load(&path).unwrap().into())
}

fn reconciler(repository: Arc<dyn ModRepository>) -> Reconciler {
    Reconciler::new(repository, Arc::new(ZipModFileLoader))
}

fn member_names(store: &LocalModStore, modpack: &str) -> Vec<String> {
    store
        .modpack_by_name(modpack)
        .unwrap()
        .mods
        .iter()
        .map(|module| module.name.clone())
        .collect()
}

/// Export `modpacks` to `destination` and import the result into a temp dir
fn export_and_import(
    modpacks: &[Modpack],
    settings: &ExportSettings,
    destination: &Path,
) -> ImportResult {
    let prepared = prepare_export(modpacks, &[], settings).unwrap();
    let exported = Exporter::default()
        .export(&prepared.package, prepared.has_embedded_files(), &prepared.files, destination)
        .unwrap();
    Importer::new().import_to_temp(&exported.path).unwrap()
}

#[tokio::test]
async fn test_embedded_mod_installed_without_download() {
    let source = tempdir().unwrap();
    let target = tempdir().unwrap();
    let bob = installed(source.path(), "bob", "1.0.0", "1.1");
    let modpacks = vec![Modpack::new(0, "MyPack").with_mod(bob)];
    let settings = ExportSettings::new(ExportPolicy::latest().included(true));

    let import = export_and_import(&modpacks, &settings, &source.path().join("pack.fmpa"));
    assert_eq!(import.kind, crate::package::ContainerKind::Archive);
    assert_eq!(import.package.mods()[0].mode().bits(), 0x101);

    let repository = Arc::new(MockRepository::default().with_release("bob", "1.0.0", "1.1"));
    let mut store = LocalModStore::new(target.path());
    let outcome = reconciler(repository.clone()).reconcile(import, &mut store).await;

    assert!(outcome.is_complete());
    assert_eq!(repository.download_count(), 0);
    assert_eq!(outcome.modpacks.len(), 1);
    assert_eq!(member_names(&store, "MyPack"), vec!["bob"]);
    assert!(target.path().join("bob_1.0.0.zip").exists());
    assert_eq!(store.mods()[0].path, target.path().join("bob_1.0.0.zip"));
}

#[tokio::test]
async fn test_embedded_mod_used_when_offline() {
    let source = tempdir().unwrap();
    let target = tempdir().unwrap();
    let bob = installed(source.path(), "bob", "1.0.0", "1.1");
    let modpacks = vec![Modpack::new(0, "MyPack").with_mod(bob)];
    let settings = ExportSettings::new(ExportPolicy::latest().included(true).download_newer(true));

    let import = export_and_import(&modpacks, &settings, &source.path().join("pack.fmpa"));
    let mut store = LocalModStore::new(target.path());
    let outcome = reconciler(Arc::new(OfflineRepository)).reconcile(import, &mut store).await;

    assert!(outcome.is_complete());
    assert_eq!(member_names(&store, "MyPack"), vec!["bob"]);
}

#[tokio::test]
async fn test_document_forces_download() {
    let source = tempdir().unwrap();
    let target = tempdir().unwrap();
    let bob = installed(source.path(), "bob", "1.0.0", "1.1");
    let modpacks = vec![Modpack::new(0, "MyPack").with_mod(bob)];

    let import = export_and_import(&modpacks, &ExportSettings::default(), &source.path().join("pack.fmp"));
    assert_eq!(import.kind, crate::package::ContainerKind::Document);
    assert!(import.files.is_empty());
    let text = std::fs::read_to_string(source.path().join("pack.fmp")).unwrap();
    assert!(text.trim_start().starts_with('{'));

    let repository = Arc::new(MockRepository::default().with_release("bob", "1.0.0", "1.1"));
    let mut store = LocalModStore::new(target.path());
    let outcome = reconciler(repository.clone()).reconcile(import, &mut store).await;

    assert!(outcome.is_complete());
    assert_eq!(repository.download_count(), 1);
    assert_eq!(member_names(&store, "MyPack"), vec!["bob"]);
}

#[tokio::test]
async fn test_round_trip_preserves_membership() {
    let source = tempdir().unwrap();
    let target = tempdir().unwrap();
    let a = installed(source.path(), "a", "1.0.0", "1.1");
    let b = installed(source.path(), "b", "2.0.0", "1.1");
    let c = installed(source.path(), "c", "0.3.0", "1.1");
    let modpacks = vec![
        Modpack::new(7, "Top").with_modpack(5).with_mod(a.clone()),
        Modpack::new(5, "Extras").with_mod(c.clone()).with_modpack(3),
        Modpack::new(3, "Core").with_mod(a.clone()).with_mod(b.clone()),
    ];
    let settings = ExportSettings::new(ExportPolicy::specific());

    let import = export_and_import(&modpacks, &settings, &source.path().join("pack.fmp"));
    let mut store = LocalModStore::new(target.path());
    for module in [&a, &b, &c] {
        store.add_mod(Mod::clone(module));
    }
    let outcome = reconciler(Arc::new(OfflineRepository)).reconcile(import, &mut store).await;
    assert!(outcome.is_complete());

    let shape = |modpacks: &[Modpack]| -> Vec<(String, BTreeSet<String>, BTreeSet<String>)> {
        let name_of = |uid: u32| modpacks.iter().find(|m| m.uid == uid).unwrap().name.clone();
        let mut shape: Vec<_> = modpacks
            .iter()
            .map(|modpack| {
                (
                    modpack.name.clone(),
                    modpack.mods.iter().map(|m| format!("{} {}", m.name, m.version)).collect(),
                    modpack.modpacks.iter().map(|&uid| name_of(uid)).collect(),
                )
            })
            .collect();
        shape.sort();
        shape
    };
    assert_eq!(shape(store.modpacks()), shape(&modpacks));
}

#[tokio::test]
async fn test_local_copy_preferred_over_embedded() {
    let source = tempdir().unwrap();
    let target = tempdir().unwrap();
    let bob = installed(source.path(), "bob", "1.0.0", "1.1");
    let modpacks = vec![Modpack::new(0, "MyPack").with_mod(bob.clone())];
    let settings = ExportSettings::new(ExportPolicy::specific().included(true));

    let import = export_and_import(&modpacks, &settings, &source.path().join("pack.fmpa"));
    let mut store = LocalModStore::new(target.path());
    let local = store.add_mod(Mod::clone(&bob));
    let outcome = reconciler(Arc::new(OfflineRepository)).reconcile(import, &mut store).await;

    assert!(Arc::ptr_eq(&outcome.mods[0], &local));
    assert!(!target.path().join("bob_1.0.0.zip").exists());
    assert_eq!(store.mods().len(), 1);
}

#[tokio::test]
async fn test_invalid_embedded_file_falls_back_to_download() {
    let scratch = tempdir().unwrap();
    let target = tempdir().unwrap();
    let garbage = scratch.path().join("bob_1.0.0.zip");
    std::fs::write(&garbage, b"not a zip").unwrap();

    let package = Package::new(
        vec![ModDefinition::new(0, "bob", ExportMode::latest().with_included(true))],
        vec![ModpackDefinition::new(0, "MyPack").with_mods(vec![0])],
    )
    .unwrap();
    let exported = Exporter::default()
        .export(&package, true, &[EmbeddedFile::new(0, garbage)], &scratch.path().join("pack.fmpa"))
        .unwrap();
    let import = Importer::new().import_to_temp(&exported.path).unwrap();

    let repository = Arc::new(MockRepository::default().with_release("bob", "1.0.0", "1.1"));
    let mut store = LocalModStore::new(target.path());
    let outcome = reconciler(repository.clone()).reconcile(import, &mut store).await;

    assert!(outcome.is_complete());
    assert_eq!(repository.download_count(), 1);
    assert_eq!(member_names(&store, "MyPack"), vec!["bob"]);
}

#[tokio::test]
async fn test_download_newer_replaces_embedded_release() {
    let source = tempdir().unwrap();
    let bob = installed(source.path(), "bob", "1.0.0", "1.1");
    let modpacks = vec![Modpack::new(0, "MyPack").with_mod(bob)];
    let repository = Arc::new(
        MockRepository::default()
            .with_release("bob", "1.0.0", "1.1")
            .with_release("bob", "1.1.0", "1.1"),
    );

    // Without the flag the older embedded copy is good enough.
    let target = tempdir().unwrap();
    let settings = ExportSettings::new(ExportPolicy::latest().included(true));
    let import = export_and_import(&modpacks, &settings, &source.path().join("keep.fmpa"));
    let mut store = LocalModStore::new(target.path());
    reconciler(repository.clone()).reconcile(import, &mut store).await;
    assert_eq!(store.mods()[0].version, "1.0.0".parse().unwrap());
    assert_eq!(repository.download_count(), 0);

    let target = tempdir().unwrap();
    let settings = ExportSettings::new(ExportPolicy::latest().included(true).download_newer(true));
    let import = export_and_import(&modpacks, &settings, &source.path().join("newer.fmpa"));
    let mut store = LocalModStore::new(target.path());
    reconciler(repository.clone()).reconcile(import, &mut store).await;
    assert_eq!(store.mods()[0].version, "1.1.0".parse().unwrap());
    assert_eq!(repository.download_count(), 1);
}

#[tokio::test]
async fn test_embedded_latest_skips_version_lookup() {
    let source = tempdir().unwrap();
    let bob = installed(source.path(), "bob", "1.0.0", "1.1");
    let modpacks = vec![Modpack::new(0, "MyPack").with_mod(bob.clone())];
    let repository = Arc::new(
        MockRepository::default()
            .with_release("bob", "1.0.0", "1.1")
            .with_release("bob", "2.0.0", "1.1"),
    );

    let target = tempdir().unwrap();
    let settings = ExportSettings::new(ExportPolicy::latest().included(true));
    let import = export_and_import(&modpacks, &settings, &source.path().join("latest.fmpa"));
    let mut store = LocalModStore::new(target.path());
    let outcome = reconciler(repository.clone()).reconcile(import, &mut store).await;

    assert!(outcome.is_complete());
    assert_eq!(repository.lookup_count(), 0);
    assert_eq!(repository.download_count(), 0);
    assert_eq!(store.mods()[0].version, "1.0.0".parse().unwrap());

    // An installed copy of the bundled version is reused rather than extracted again.
    let target = tempdir().unwrap();
    let settings = ExportSettings::new(ExportPolicy::factorio_compatible().included(true));
    let import = export_and_import(&modpacks, &settings, &source.path().join("compatible.fmpa"));
    let mut store = LocalModStore::new(target.path());
    let local = store.add_mod(Mod::clone(&installed(target.path(), "bob", "1.0.0", "1.1")));
    let outcome = reconciler(repository.clone()).reconcile(import, &mut store).await;

    assert!(outcome.is_complete());
    assert!(Arc::ptr_eq(&outcome.mods[0], &local));
    assert_eq!(store.mods().len(), 1);
    assert_eq!(repository.lookup_count(), 0);
    assert_eq!(repository.download_count(), 0);
}

#[tokio::test]
async fn test_unresolved_mods_are_left_out() {
    let target = tempdir().unwrap();
    let package = Package::new(
        vec![
            ModDefinition::new(0, "bob", ExportMode::latest()),
            ModDefinition::new(1, "angel", ExportMode::specific("0.9.0".parse().unwrap())),
        ],
        vec![ModpackDefinition::new(0, "MyPack").with_mods(vec![0, 1])],
    )
    .unwrap();
    let path = target.path().join("pack.fmp");
    std::fs::write(&path, package.to_json(true).unwrap()).unwrap();

    let mut store = LocalModStore::new(target.path());
    let angel = store.add_mod(Mod::clone(&installed(target.path(), "angel", "0.9.0", "1.1")));
    let import = Importer::new().import_to_temp(&path).unwrap();
    let outcome = reconciler(Arc::new(OfflineRepository)).reconcile(import, &mut store).await;

    assert_eq!(outcome.unresolved.len(), 1);
    assert_eq!(outcome.unresolved[0].uid, 0);
    assert_eq!(outcome.unresolved[0].name, "bob");
    let members = &store.modpack_by_name("MyPack").unwrap().mods;
    assert_eq!(members.len(), 1);
    assert!(Arc::ptr_eq(&members[0], &angel));
}

#[tokio::test]
async fn test_factorio_compatible_falls_back_to_compatible_local_mod() {
    let target = tempdir().unwrap();
    let mut store = LocalModStore::new(target.path());
    let old_game = store.add_mod(Mod::clone(&installed(target.path(), "bob", "1.5.0", "1.0")));
    store.add_mod(Mod::clone(&installed(target.path(), "bob", "2.0.0", "1.1")));

    let package = Package::new(
        vec![ModDefinition::new(0, "bob", ExportMode::factorio_compatible("1.0".parse().unwrap()))],
        vec![ModpackDefinition::new(0, "Legacy").with_mods(vec![0])],
    )
    .unwrap();
    let path = target.path().join("pack.fmp");
    std::fs::write(&path, package.to_json(false).unwrap()).unwrap();

    let import = Importer::new().import_to_temp(&path).unwrap();
    let outcome = reconciler(Arc::new(OfflineRepository)).reconcile(import, &mut store).await;

    assert!(outcome.is_complete());
    assert!(Arc::ptr_eq(&outcome.mods[0], &old_game));
}

#[tokio::test]
async fn test_cancellation_only_affects_pending_downloads() {
    let target = tempdir().unwrap();
    let package = Package::new(
        vec![
            ModDefinition::new(0, "bob", ExportMode::specific("1.0.0".parse().unwrap())),
            ModDefinition::new(1, "angel", ExportMode::specific("0.9.0".parse().unwrap())),
        ],
        vec![ModpackDefinition::new(0, "MyPack").with_mods(vec![0, 1])],
    )
    .unwrap();
    let path = target.path().join("pack.fmp");
    std::fs::write(&path, package.to_json(false).unwrap()).unwrap();

    let mut store = LocalModStore::new(target.path());
    store.add_mod(Mod::clone(&installed(target.path(), "angel", "0.9.0", "1.1")));

    let repository = Arc::new(MockRepository::default().with_release("bob", "1.0.0", "1.1").stalled());
    let cancel = CancellationToken::new();
    let reconciler = reconciler(repository).with_cancellation(cancel.clone());
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let import = Importer::new().import_to_temp(&path).unwrap();
    let outcome = tokio::time::timeout(Duration::from_secs(5), reconciler.reconcile(import, &mut store))
        .await
        .expect("reconcile should return once cancelled");

    assert_eq!(outcome.unresolved.len(), 1);
    assert_eq!(outcome.unresolved[0].name, "bob");
    assert_eq!(outcome.unresolved[0].reason, "cancelled");
    assert_eq!(member_names(&store, "MyPack"), vec!["angel"]);
    assert!(!target.path().join("bob.part").exists());
}

#[tokio::test]
async fn test_legacy_document_imports() {
    let target = tempdir().unwrap();
    let path = target.path().join("old.fmp");
    std::fs::write(
        &path,
        r#"{
            "mods": [{"name": "bob", "version": "1.0.0"}],
            "modpacks": [
                {"name": "Outer", "mods": [], "modpacks": ["Inner"]},
                {"name": "Inner", "mods": ["bob"], "modpacks": []}
            ],
            "includesVersionInfo": true
        }"#,
    )
    .unwrap();

    let mut store = LocalModStore::new(target.path());
    store.add_mod(Mod::clone(&installed(target.path(), "bob", "1.0.0", "1.1")));
    let import = Importer::new().import_to_temp(&path).unwrap();
    let outcome = reconciler(Arc::new(OfflineRepository)).reconcile(import, &mut store).await;

    assert!(outcome.is_complete());
    let inner = store.modpack_by_name("Inner").unwrap().uid;
    assert_eq!(store.modpack_by_name("Outer").unwrap().modpacks, vec![inner]);
    assert_eq!(member_names(&store, "Inner"), vec!["bob"]);
}

#[tokio::test]
async fn test_progress_events_reported() {
    let source = tempdir().unwrap();
    let target = tempdir().unwrap();
    let bob = installed(source.path(), "bob", "1.0.0", "1.1");
    let modpacks = vec![Modpack::new(0, "MyPack").with_mod(bob)];
    let settings = ExportSettings::new(ExportPolicy::specific().included(true));
    let import = export_and_import(&modpacks, &settings, &source.path().join("pack.fmpa"));

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let callback: ProgressCallback = Arc::new(move |event| sink.lock().unwrap().push(event));

    let mut store = LocalModStore::new(target.path());
    reconciler(Arc::new(OfflineRepository))
        .with_progress(callback)
        .reconcile(import, &mut store)
        .await;

    let events = events.lock().unwrap();
    assert!(matches!(&events[0], ProgressEvent::ModStarted { name, index: 0, total: 1 } if name == "bob"));
    assert!(matches!(&events[1], ProgressEvent::ModExtracted { name, .. } if name == "bob"));
    assert!(matches!(&events[2], ProgressEvent::ModpackCreated { name } if name == "MyPack"));
}
