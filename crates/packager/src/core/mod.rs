//! Core types used throughout the packager
//!
//! Errors, versions and progress reporting. Everything else depends on these.

pub mod error;
pub mod files;
pub mod progress;
pub mod version;

pub use files::{MAX_DOCUMENT_SIZE, MAX_INFO_SIZE};
pub use error::{DefinitionKind, ErrorKind, FileOperation, PackageError, Result};
pub use progress::{
    ConsoleProgressReporter, IntoProgressCallback, NullProgressReporter, ProgressCallback,
    ProgressEvent, ProgressReporter,
};
pub use version::ModVersion;
