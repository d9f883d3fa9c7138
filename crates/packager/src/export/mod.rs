//! Export: from domain modpacks to a package file
//!
//! [`prepare_export`] collects the modpacks to export, orders them with the
//! [`linearize`] module and deduplicates mod references through the
//! [`ModDefinitionRegistry`]. [`Exporter`] then writes the result.

pub mod builder;
pub mod linearize;
pub mod registry;
pub mod settings;
pub mod writer;

pub use builder::{PreparedExport, prepare_export};
pub use linearize::GraphNode;
pub use registry::{EmbeddedFile, ModDefinitionRegistry};
pub use settings::{ExportPolicy, ExportSettings};
pub use writer::{ExportedPackage, Exporter};
