//! Error types for package export and import
//!
//! Errors fall into three groups (see [`ErrorKind`]): structural problems found
//! while building or validating a package, format problems found while reading
//! a container, and file-system failures. Per-mod resolution failures during
//! reconciliation are not errors of this type; they are reported as
//! [`crate::import::UnresolvedMod`] entries instead.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors produced while building, writing, reading or validating a package
#[derive(Error, Debug)]
pub enum PackageError {
    /// Two modpacks handed to the linearizer share a uid
    #[error("Modpack uid {uid} is used by both '{first}' and '{second}'")]
    DuplicateModpackUid {
        uid: u32,
        first: String,
        second: String,
    },

    /// A package document defines the same uid twice within one kind
    #[error("Package defines {kind} uid {uid} more than once")]
    DuplicateDefinitionUid { kind: DefinitionKind, uid: u32 },

    /// A modpack transitively contains itself
    #[error("Modpack '{name}' (uid {uid}) contains itself through its sub-modpacks")]
    ModpackCycle { uid: u32, name: String },

    /// A modpack references a sub-modpack that is not part of the export
    #[error("Modpack '{referenced_by}' references unknown modpack uid {uid}")]
    UnknownModpack { uid: u32, referenced_by: String },

    /// A modpack definition references an id the package does not define
    #[error("Modpack definition {modpack_uid} references undefined {kind} uid {uid}")]
    DanglingReference {
        modpack_uid: u32,
        kind: DefinitionKind,
        uid: u32,
    },

    /// A modpack definition references a modpack that is only defined after it
    #[error("Modpack definition {modpack_uid} references modpack uid {uid} before it is defined")]
    ForwardReference { modpack_uid: u32, uid: u32 },

    /// Export mode bits without a valid version strategy
    #[error("Invalid export mode 0x{bits:x}")]
    InvalidExportMode { bits: u32 },

    /// The version field required by the export mode is absent
    #[error("Mod definition '{name}' (uid {uid}) has no '{field}' field")]
    MissingVersion {
        uid: u32,
        name: String,
        field: &'static str,
    },

    #[error("Invalid version string '{input}'")]
    InvalidVersion { input: String },

    /// The document parsed but does not describe a package
    #[error("Not a valid package: {reason}")]
    InvalidPackage { reason: String },

    /// An archive was scanned completely without finding the package document
    #[error("Not a valid package: archive has no '{entry}' entry")]
    MissingPackDocument { entry: String },

    #[error("Unsupported package format version {version} (newest supported: {supported})")]
    UnsupportedFormatVersion { version: u32, supported: u32 },

    #[error("Cannot tell the container type of '{path}' (expected .fmp or .fmpa)")]
    UnknownContainer { path: PathBuf },

    #[error("Not a valid package: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not a valid package archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// File system errors with the path and operation involved
    #[error("File operation failed on '{path}' while {operation}")]
    FileSystem {
        path: PathBuf,
        operation: FileOperation,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, PackageError>;

/// Which half of the package a uid belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    Mod,
    Modpack,
}

impl std::fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DefinitionKind::Mod => write!(f, "mod"),
            DefinitionKind::Modpack => write!(f, "modpack"),
        }
    }
}

/// Types of file operations for error context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    Read,
    Write,
    Create,
    Delete,
    Move,
    CreateDir,
    Extract,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Read => write!(f, "reading"),
            FileOperation::Write => write!(f, "writing"),
            FileOperation::Create => write!(f, "creating"),
            FileOperation::Delete => write!(f, "deleting"),
            FileOperation::Move => write!(f, "moving"),
            FileOperation::CreateDir => write!(f, "creating directory"),
            FileOperation::Extract => write!(f, "extracting"),
        }
    }
}

/// Coarse error grouping used for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected while building or validating, before any I/O
    Structural,
    /// The container itself is broken
    Format,
    /// Disk or permission trouble
    Io,
}

impl PackageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PackageError::DuplicateModpackUid { .. }
            | PackageError::DuplicateDefinitionUid { .. }
            | PackageError::ModpackCycle { .. }
            | PackageError::UnknownModpack { .. }
            | PackageError::DanglingReference { .. }
            | PackageError::ForwardReference { .. }
            | PackageError::InvalidExportMode { .. }
            | PackageError::MissingVersion { .. }
            | PackageError::InvalidVersion { .. } => ErrorKind::Structural,
            PackageError::InvalidPackage { .. }
            | PackageError::MissingPackDocument { .. }
            | PackageError::UnsupportedFormatVersion { .. }
            | PackageError::UnknownContainer { .. }
            | PackageError::Json(_)
            | PackageError::Archive(_) => ErrorKind::Format,
            PackageError::FileSystem { .. } => ErrorKind::Io,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            PackageError::DuplicateModpackUid { .. } => "duplicate_modpack_uid",
            PackageError::DuplicateDefinitionUid { .. } => "duplicate_definition_uid",
            PackageError::ModpackCycle { .. } => "modpack_cycle",
            PackageError::UnknownModpack { .. } => "unknown_modpack",
            PackageError::DanglingReference { .. } => "dangling_reference",
            PackageError::ForwardReference { .. } => "forward_reference",
            PackageError::InvalidExportMode { .. } => "invalid_export_mode",
            PackageError::MissingVersion { .. } => "missing_version",
            PackageError::InvalidVersion { .. } => "invalid_version",
            PackageError::InvalidPackage { .. } => "invalid_package",
            PackageError::MissingPackDocument { .. } => "missing_pack_document",
            PackageError::UnsupportedFormatVersion { .. } => "unsupported_format_version",
            PackageError::UnknownContainer { .. } => "unknown_container",
            PackageError::Json(_) => "json",
            PackageError::Archive(_) => "archive",
            PackageError::FileSystem { .. } => "file_system",
        }
    }

    /// True when the file being imported is itself broken, as opposed to a
    /// package that is well-formed but internally inconsistent
    pub fn is_invalid_package(&self) -> bool {
        self.kind() == ErrorKind::Format
    }
}

/// Build a `map_err` adapter that attaches path and operation to an I/O error
pub(crate) fn file_error(
    path: &Path,
    operation: FileOperation,
) -> impl FnOnce(std::io::Error) -> PackageError {
    let path = path.to_path_buf();
    move |source| PackageError::FileSystem {
        path,
        operation,
        source,
    }
}

impl From<std::io::Error> for PackageError {
    fn from(error: std::io::Error) -> Self {
        PackageError::FileSystem {
            path: PathBuf::from("<unknown>"),
            operation: FileOperation::Read,
            source: error,
        }
    }
}
