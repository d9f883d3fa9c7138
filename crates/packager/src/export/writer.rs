//! Writing `.fmp` documents and `.fmpa` archives

use crate::config::ExportConfig;
use crate::core::{FileOperation, ProgressCallback, ProgressEvent, Result, error::file_error};
use crate::core::progress::emit;
use crate::export::registry::EmbeddedFile;
use crate::package::{ContainerKind, PACK_DOCUMENT_ENTRY, Package};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Where and how a package was written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedPackage {
    pub path: PathBuf,
    pub kind: ContainerKind,
}

/// Writes packages to disk
///
/// Output goes to a `.part` file next to the destination which is renamed
/// into place once complete, so a failed export never leaves a readable but
/// truncated package behind.
#[derive(Clone, Default)]
pub struct Exporter {
    config: ExportConfig,
    progress: Option<ProgressCallback>,
}

impl Exporter {
    pub fn new(config: ExportConfig) -> Self {
        Self {
            config,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Write `package` and, for archives, `files`
    ///
    /// Without embedding and without files the result is a bare `.fmp`
    /// document, otherwise a `.fmpa` archive. The destination's extension is
    /// replaced when it does not match the container that was chosen.
    pub fn export(
        &self,
        package: &Package,
        embed_files: bool,
        files: &[EmbeddedFile],
        destination: &Path,
    ) -> Result<ExportedPackage> {
        let kind = if !embed_files && files.is_empty() {
            ContainerKind::Document
        } else {
            ContainerKind::Archive
        };

        let path = if ContainerKind::from_path(destination) == Some(kind) {
            destination.to_path_buf()
        } else {
            destination.with_extension(kind.extension())
        };

        let temp_path = path.with_extension("part");
        let written = match kind {
            ContainerKind::Document => self.write_document(package, &temp_path),
            ContainerKind::Archive => self.write_archive(package, files, &temp_path),
        };

        if let Err(e) = written {
            if let Err(cleanup) = std::fs::remove_file(&temp_path) {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove partial package {}: {}", temp_path.display(), cleanup);
                }
            }
            return Err(e);
        }

        std::fs::rename(&temp_path, &path).map_err(file_error(&path, FileOperation::Move))?;
        debug!("Atomically renamed {} to {}", temp_path.display(), path.display());
        info!("Exported {} package to {}", kind.extension(), path.display());

        emit(
            self.progress.as_ref(),
            ProgressEvent::DocumentWritten {
                destination: path.display().to_string(),
            },
        );

        Ok(ExportedPackage { path, kind })
    }

    /// Write the bare JSON document
    pub fn write_document(&self, package: &Package, path: &Path) -> Result<()> {
        let json = package.to_json(self.config.pretty_json)?;
        std::fs::write(path, json).map_err(file_error(path, FileOperation::Write))
    }

    /// Write a zip archive holding the document followed by `files`
    pub fn write_archive(&self, package: &Package, files: &[EmbeddedFile], path: &Path) -> Result<()> {
        let file = File::create(path).map_err(file_error(path, FileOperation::Create))?;
        let mut zip = ZipWriter::new(BufWriter::new(file));
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(self.config.compression_level));

        zip.start_file(PACK_DOCUMENT_ENTRY, options)?;
        zip.write_all(package.to_json(self.config.pretty_json)?.as_bytes())
            .map_err(file_error(path, FileOperation::Write))?;

        let total = files.len();
        for (index, embedded) in files.iter().enumerate() {
            let entry = embedded.entry_name();
            debug!("Embedding {} as {}", embedded.path.display(), entry);

            let mut source =
                File::open(&embedded.path).map_err(file_error(&embedded.path, FileOperation::Read))?;
            zip.start_file(entry.as_str(), options)?;
            std::io::copy(&mut source, &mut zip).map_err(file_error(&embedded.path, FileOperation::Read))?;

            emit(
                self.progress.as_ref(),
                ProgressEvent::FileEmbedded { entry, index, total },
            );
        }

        let mut writer = zip.finish()?;
        writer.flush().map_err(file_error(path, FileOperation::Write))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PackageError;
    use crate::package::{ExportMode, ModDefinition, ModpackDefinition};
    use std::io::Read;
    use tempfile::tempdir;

    fn package() -> Package {
        Package::new(
            vec![ModDefinition::new(0, "bob", ExportMode::latest().with_included(true))],
            vec![ModpackDefinition::new(0, "MyPack").with_mods(vec![0])],
        )
        .unwrap()
    }

    #[test]
    fn test_plain_document_without_files() {
        let dir = tempdir().unwrap();
        let exported = Exporter::default()
            .export(&package(), false, &[], &dir.path().join("pack.fmp"))
            .unwrap();

        assert_eq!(exported.kind, ContainerKind::Document);
        let text = std::fs::read_to_string(&exported.path).unwrap();
        assert_eq!(Package::from_json(&text).unwrap(), package());
        assert!(!dir.path().join("pack.part").exists());
    }

    #[test]
    fn test_archive_entry_order() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("bob_1.0.0.zip");
        let second = dir.path().join("angel_0.9.0.zip");
        std::fs::write(&first, b"bob").unwrap();
        std::fs::write(&second, b"angel").unwrap();
        let files = vec![EmbeddedFile::new(3, first), EmbeddedFile::new(1, second)];

        let exported = Exporter::default()
            .export(&package(), true, &files, &dir.path().join("out.fmp"))
            .unwrap();
        assert_eq!(exported.kind, ContainerKind::Archive);
        assert_eq!(exported.path, dir.path().join("out.fmpa"));

        let mut archive = zip::ZipArchive::new(File::open(&exported.path).unwrap()).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["pack.json", "3+bob_1.0.0.zip", "1+angel_0.9.0.zip"]);

        let mut content = String::new();
        archive.by_name("1+angel_0.9.0.zip").unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "angel");
    }

    #[test]
    fn test_embed_flag_alone_makes_archive() {
        let dir = tempdir().unwrap();
        let exported = Exporter::default()
            .export(&package(), true, &[], &dir.path().join("pack.fmpa"))
            .unwrap();
        assert_eq!(exported.kind, ContainerKind::Archive);
        assert!(exported.path.exists());
    }

    #[test]
    fn test_failed_export_leaves_nothing_behind() {
        let dir = tempdir().unwrap();
        let files = vec![EmbeddedFile::new(0, dir.path().join("missing.zip"))];
        let destination = dir.path().join("pack.fmpa");

        let err = Exporter::default()
            .export(&package(), true, &files, &destination)
            .unwrap_err();
        assert!(matches!(err, PackageError::FileSystem { operation: FileOperation::Read, .. }));
        assert!(!destination.exists());
        assert!(!dir.path().join("pack.part").exists());
    }
}
