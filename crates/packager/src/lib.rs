//! Modpack package export and import
//!
//! Exports a set of modpacks, which may contain other modpacks, into a single
//! portable file and rebuilds them from that file on another machine.
//!
//! Two containers exist. A `.fmp` file is a bare JSON document listing the
//! mods and modpacks. A `.fmpa` file is a zip archive holding the same
//! document as `pack.json` plus the mod files that were chosen to travel with
//! it.
//!
//! ```no_run
//! use packager::{
//!     ExportSettings, Exporter, Importer, LocalModStore, OfflineRepository, Reconciler,
//!     ZipModFileLoader, prepare_export,
//! };
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn run(source: &LocalModStore) -> Result<(), packager::PackageError> {
//! let prepared = prepare_export(source.modpacks(), &[], &ExportSettings::default())?;
//! let exported = Exporter::default().export(
//!     &prepared.package,
//!     prepared.has_embedded_files(),
//!     &prepared.files,
//!     Path::new("my-modpacks.fmp"),
//! )?;
//!
//! let import = Importer::new().import_to_temp(&exported.path)?;
//! let mut target = LocalModStore::new("/home/me/factorio/mods");
//! let outcome = Reconciler::new(Arc::new(OfflineRepository), Arc::new(ZipModFileLoader))
//!     .reconcile(import, &mut target)
//!     .await;
//! println!("{} mods could not be installed", outcome.unresolved.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod domain;
pub mod export;
pub mod import;
pub mod package;
pub mod portal;

#[cfg(test)]
mod test_support;

pub use config::{ExportConfig, ExportConfigBuilder, PortalConfig, PortalConfigBuilder};
pub use crate::core::{
    ConsoleProgressReporter, ErrorKind, FileOperation, IntoProgressCallback, ModVersion,
    NullProgressReporter, PackageError, ProgressCallback, ProgressEvent, ProgressReporter, Result,
};
pub use domain::{
    LocalModStore, Mod, ModFile, ModFileLoader, ModRepository, ModStore, Modpack,
    OfflineRepository, RepositoryError, ZipModFileLoader,
};
pub use export::{
    EmbeddedFile, ExportPolicy, ExportSettings, ExportedPackage, Exporter, PreparedExport,
    prepare_export,
};
pub use import::{ImportResult, Importer, ReconcileOutcome, Reconciler, UnresolvedMod};
pub use package::{ContainerKind, ExportMode, ModDefinition, ModpackDefinition, Package, VersionStrategy};
pub use portal::PortalClient;
