//! Plugin bundle extraction
//!
//! Bundles are zip archives with a `plugin.json` manifest at the root and
//! the module files alongside it. Entry paths become storage keys, so they
//! are sanitized before anything is read out.

use std::io::{Cursor, Read};

use anyhow::anyhow;
use zip::result::ZipError;
use zip::ZipArchive;

use drydock_abi::PluginManifest;

use crate::error::{PluginError, PluginResult};
use crate::manifest::parse_manifest;

/// Manifest entry every bundle must carry at its root.
pub const MANIFEST_ENTRY: &str = "plugin.json";

/// Read and validate the manifest out of a bundle.
pub fn extract_manifest(bundle: &[u8]) -> PluginResult<PluginManifest> {
    let mut archive = ZipArchive::new(Cursor::new(bundle))?;
    let mut entry = match archive.by_name(MANIFEST_ENTRY) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Err(PluginError::ManifestMissing),
        Err(e) => return Err(e.into()),
    };

    let mut bytes = Vec::with_capacity(entry.size() as usize);
    entry
        .read_to_end(&mut bytes)
        .map_err(|e| PluginError::ArchiveEntry {
            entry: MANIFEST_ENTRY.to_string(),
            cause: e.into(),
        })?;

    parse_manifest(&bytes)
}

/// Extract every file entry except the manifest, keyed by its bundle path.
///
/// Directory entries are skipped. Entries whose path escapes the bundle
/// root are rejected.
pub fn extract_files(bundle: &[u8]) -> PluginResult<Vec<(String, Vec<u8>)>> {
    let mut archive = ZipArchive::new(Cursor::new(bundle))?;
    let mut files = Vec::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let path = sanitize_entry_path(entry.name())?;
        if path == MANIFEST_ENTRY {
            continue;
        }

        let mut contents = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut contents)
            .map_err(|e| PluginError::ArchiveEntry {
                entry: path.clone(),
                cause: e.into(),
            })?;
        files.push((path, contents));
    }

    Ok(files)
}

/// Reject entry paths that would escape the bundle root when used as keys.
fn sanitize_entry_path(name: &str) -> PluginResult<String> {
    let bad = |reason: &str| PluginError::ArchiveEntry {
        entry: name.to_string(),
        cause: anyhow!("unsafe entry path: {reason}"),
    };

    if name.is_empty() {
        return Err(bad("empty path"));
    }
    if name.starts_with('/') || name.contains('\\') || name.contains(':') {
        return Err(bad("absolute or non-portable path"));
    }
    if name.split('/').any(|part| part == "..") {
        return Err(bad("parent directory traversal"));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::bundle;
    use serde_json::json;

    fn manifest_json() -> serde_json::Value {
        json!({
            "id": "demo",
            "version": "1.0.0",
            "type": "ui",
            "entryPoint": "index.bin",
            "permissions": [],
            "slots": ["sidebar"]
        })
    }

    #[test]
    fn extracts_manifest_from_bundle_root() {
        let bytes = bundle(&manifest_json(), &[("index.bin", b"module")]);
        let manifest = extract_manifest(&bytes).expect("extract manifest");
        assert_eq!(manifest.id, "demo");
        assert_eq!(manifest.entry_point, "index.bin");
    }

    #[test]
    fn missing_manifest_is_a_distinct_error() {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            let options = zip::write::SimpleFileOptions::default();
            writer.start_file("readme.txt", options).expect("start file");
            std::io::Write::write_all(&mut writer, b"no manifest").expect("write");
            writer.finish().expect("finish");
        }
        let err = extract_manifest(&buffer.into_inner()).expect_err("manifest found");
        assert!(matches!(err, PluginError::ManifestMissing));
    }

    #[test]
    fn files_exclude_manifest_and_directories() {
        let bytes = bundle(
            &manifest_json(),
            &[("index.bin", b"module"), ("assets/icon.svg", b"<svg/>")],
        );
        let files = extract_files(&bytes).expect("extract files");
        let paths: Vec<&str> = files.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, ["index.bin", "assets/icon.svg"]);
        assert!(!paths.contains(&MANIFEST_ENTRY));
    }

    #[test]
    fn traversal_paths_are_rejected() {
        assert!(sanitize_entry_path("../outside.bin").is_err());
        assert!(sanitize_entry_path("nested/../../outside.bin").is_err());
        assert!(sanitize_entry_path("/etc/passwd").is_err());
        assert!(sanitize_entry_path("C:\\windows").is_err());
        assert!(sanitize_entry_path("nested/inner.bin").is_ok());
    }
}
