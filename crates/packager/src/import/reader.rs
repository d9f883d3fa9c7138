//! Reading package files

use crate::core::{
    FileOperation, PackageError, ProgressCallback, ProgressEvent, Result, error::file_error,
};
use crate::core::files::{MAX_DOCUMENT_SIZE, read_bounded};
use crate::core::progress::emit;
use crate::package::{ContainerKind, PACK_DOCUMENT_ENTRY, Package, parse_embedded_entry_name};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// A file extracted from a `.fmpa` archive
///
/// The file on disk belongs to this value: it is deleted on drop unless
/// [`ExtractedFile::keep`] was called.
#[derive(Debug)]
pub struct ExtractedFile {
    /// Entry name as stored in the archive, `{uid}+{file_name}` for mod files
    pub stored_name: String,
    /// Definition uid parsed from the stored name
    pub uid: Option<u32>,
    /// File name with the uid prefix removed
    pub original_name: String,
    pub path: PathBuf,
    kept: bool,
}

impl ExtractedFile {
    fn new(stored_name: String, path: PathBuf) -> Self {
        let (uid, original_name) = match parse_embedded_entry_name(&stored_name) {
            Some((uid, original)) => (Some(uid), original.to_string()),
            None => (None, stored_name.clone()),
        };
        Self {
            stored_name,
            uid,
            original_name,
            path,
            kept: false,
        }
    }

    /// Take ownership of the file away from this value and return its path
    pub fn keep(mut self) -> PathBuf {
        self.kept = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for ExtractedFile {
    fn drop(&mut self) {
        if self.kept {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed unclaimed file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", self.path.display(), e),
        }
    }
}

/// The extracted files of one import
#[derive(Debug, Default)]
pub struct ExtractedFiles {
    files: Vec<ExtractedFile>,
}

impl ExtractedFiles {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExtractedFile> {
        self.files.iter()
    }

    pub fn for_uid(&self, uid: u32) -> Option<&ExtractedFile> {
        self.files.iter().find(|file| file.uid == Some(uid))
    }

    /// Remove and return the file embedded for definition `uid`
    pub fn take_for_uid(&mut self, uid: u32) -> Option<ExtractedFile> {
        let position = self.files.iter().position(|file| file.uid == Some(uid))?;
        Some(self.files.remove(position))
    }

    fn push(&mut self, file: ExtractedFile) {
        self.files.push(file);
    }
}

/// A parsed package and the files that came with it
///
/// Dropping the result deletes every extracted file nobody kept, and the
/// temporary extraction directory if the import created one.
#[derive(Debug)]
pub struct ImportResult {
    pub kind: ContainerKind,
    pub package: Package,
    pub files: ExtractedFiles,
    pub temp_dir: Option<TempDir>,
}

/// Reads `.fmp` and `.fmpa` files
#[derive(Clone, Default)]
pub struct Importer {
    progress: Option<ProgressCallback>,
}

impl Importer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Import `source`, choosing the container by file extension
    pub fn import(&self, source: &Path, extract_dir: &Path) -> Result<ImportResult> {
        let kind = detect(source)?;
        self.import_as(source, kind, extract_dir)
    }

    /// Import `source` as an explicitly given container type
    pub fn import_as(&self, source: &Path, kind: ContainerKind, extract_dir: &Path) -> Result<ImportResult> {
        info!("Importing {} as .{}", source.display(), kind.extension());
        match kind {
            ContainerKind::Document => Ok(ImportResult {
                kind,
                package: self.read_document(source)?,
                files: ExtractedFiles::default(),
                temp_dir: None,
            }),
            ContainerKind::Archive => {
                let file = File::open(source).map_err(file_error(source, FileOperation::Read))?;
                let (package, files) = self.read_archive(BufReader::new(file), extract_dir)?;
                Ok(ImportResult {
                    kind,
                    package,
                    files,
                    temp_dir: None,
                })
            }
        }
    }

    /// Import into a fresh temporary directory owned by the result
    pub fn import_to_temp(&self, source: &Path) -> Result<ImportResult> {
        let kind = detect(source)?;
        if kind == ContainerKind::Document {
            return self.import_as(source, kind, Path::new(""));
        }

        let temp_dir = tempfile::Builder::new()
            .prefix("packager-import-")
            .tempdir()
            .map_err(file_error(&std::env::temp_dir(), FileOperation::CreateDir))?;
        let mut result = self.import_as(source, kind, temp_dir.path())?;
        result.temp_dir = Some(temp_dir);
        Ok(result)
    }

    /// Parse a bare `.fmp` document
    pub fn read_document(&self, source: &Path) -> Result<Package> {
        let bytes = std::fs::read(source).map_err(file_error(source, FileOperation::Read))?;
        Package::from_slice(&bytes)
    }

    /// Scan a `.fmpa` archive, extracting every entry except the document
    ///
    /// Entries are flattened to their file name inside `extract_dir`. Entries
    /// whose names would escape the directory are skipped.
    pub fn read_archive<R: Read + Seek>(
        &self,
        reader: R,
        extract_dir: &Path,
    ) -> Result<(Package, ExtractedFiles)> {
        std::fs::create_dir_all(extract_dir).map_err(file_error(extract_dir, FileOperation::CreateDir))?;

        let mut archive = zip::ZipArchive::new(reader)?;
        let mut document: Option<Vec<u8>> = None;
        let mut files = ExtractedFiles::default();
        let mut seen = HashSet::new();

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }

            if entry.name() == PACK_DOCUMENT_ENTRY {
                if document.is_some() {
                    return Err(PackageError::InvalidPackage {
                        reason: format!("archive has more than one '{PACK_DOCUMENT_ENTRY}' entry"),
                    });
                }
                let bytes = read_bounded(&mut entry, MAX_DOCUMENT_SIZE)
                    .map_err(file_error(Path::new(PACK_DOCUMENT_ENTRY), FileOperation::Extract))?
                    .ok_or_else(|| PackageError::InvalidPackage {
                        reason: format!("'{PACK_DOCUMENT_ENTRY}' exceeds {MAX_DOCUMENT_SIZE} bytes"),
                    })?;
                document = Some(bytes);
                continue;
            }

            let Some(stored_name) = entry
                .enclosed_name()
                .and_then(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
            else {
                warn!("Skipping archive entry with unsafe name: {}", entry.name());
                continue;
            };
            if !seen.insert(stored_name.clone()) {
                warn!("Skipping duplicate archive entry: {}", entry.name());
                continue;
            }

            let output_path = extract_dir.join(&stored_name);
            let mut output =
                File::create(&output_path).map_err(file_error(&output_path, FileOperation::Create))?;
            // Registered before the copy so a failed copy still cleans up.
            files.push(ExtractedFile::new(stored_name.clone(), output_path.clone()));
            std::io::copy(&mut entry, &mut output)
                .map_err(file_error(&output_path, FileOperation::Extract))?;

            debug!("Extracted {} to {}", stored_name, output_path.display());
            emit(
                self.progress.as_ref(),
                ProgressEvent::FileExtracted { entry: stored_name },
            );
        }

        let Some(document) = document else {
            return Err(PackageError::MissingPackDocument {
                entry: PACK_DOCUMENT_ENTRY.to_string(),
            });
        };

        let package = Package::from_slice(&document)?;
        info!(
            "Read package with {} mods, {} modpacks and {} extracted files",
            package.mods().len(),
            package.modpacks().len(),
            files.len()
        );
        Ok((package, files))
    }
}

fn detect(source: &Path) -> Result<ContainerKind> {
    ContainerKind::from_path(source).ok_or_else(|| PackageError::UnknownContainer {
        path: source.to_path_buf(),
    })
}
