//! Import: from a package file back to mods and modpacks
//!
//! [`Importer`] parses the container and extracts embedded files;
//! [`Reconciler`] decides per mod where it comes from and rebuilds the
//! modpacks in a [`crate::domain::ModStore`].

pub mod reader;
pub mod reconcile;

pub use reader::{ExtractedFile, ExtractedFiles, ImportResult, Importer};
pub use reconcile::{ReconcileOutcome, Reconciler, UnresolvedMod};

#[cfg(test)]
mod tests;
