//! Helpers shared by the unit tests

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;

/// Bytes of a minimal mod archive: `{name}_{version}/info.json`
pub(crate) fn mod_zip_bytes(name: &str, version: &str, factorio_version: &str) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let info = serde_json::json!({
        "name": name,
        "version": version,
        "factorio_version": factorio_version,
        "title": name,
    });
    zip.start_file(format!("{name}_{version}/info.json"), SimpleFileOptions::default())
        .unwrap();
    zip.write_all(info.to_string().as_bytes()).unwrap();
    zip.start_file(format!("{name}_{version}/data.lua"), SimpleFileOptions::default())
        .unwrap();
    zip.write_all(b"-- nothing").unwrap();
    zip.finish().unwrap().into_inner()
}

/// Write `{name}_{version}.zip` into `dir` and return its path
pub(crate) fn write_mod_zip(dir: &Path, name: &str, version: &str, factorio_version: &str) -> PathBuf {
    let path = dir.join(format!("{name}_{version}.zip"));
    let mut file = File::create(&path).unwrap();
    file.write_all(&mod_zip_bytes(name, version, factorio_version))
        .unwrap();
    path
}
