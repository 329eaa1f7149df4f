//! `package.json` reading.

use super::error::PkgError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Manifest file name.
pub const MANIFEST_FILE: &str = "package.json";

/// The subset of `package.json` the installer needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PackageManifest {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

/// Read and parse `<dir>/package.json`.
///
/// # Errors
/// `PKG_MANIFEST_MISSING` if the file does not exist, `PKG_MANIFEST_INVALID`
/// if it cannot be read or parsed, or has an empty name.
pub fn read_manifest(dir: &Path) -> Result<PackageManifest, PkgError> {
    let path = dir.join(MANIFEST_FILE);
    if !path.is_file() {
        return Err(PkgError::manifest_missing(&dir.display().to_string()));
    }

    let content = fs::read_to_string(&path).map_err(|e| {
        PkgError::manifest_invalid(format!("Failed to read {}: {e}", path.display()))
    })?;
    let manifest: PackageManifest = serde_json::from_str(&content).map_err(|e| {
        PkgError::manifest_invalid(format!("Failed to parse {}: {e}", path.display()))
    })?;

    if manifest.name.trim().is_empty() {
        return Err(PkgError::manifest_invalid(format!(
            "{} has an empty name",
            path.display()
        )));
    }

    Ok(manifest)
}

/// Find the directory holding the manifest: `root` itself, or exactly one
/// of its immediate subdirectories.
///
/// # Errors
/// `PKG_MANIFEST_MISSING` if neither level has one.
pub fn find_manifest_dir(root: &Path) -> Result<PathBuf, PkgError> {
    if root.join(MANIFEST_FILE).is_file() {
        return Ok(root.to_path_buf());
    }

    let entries = fs::read_dir(root).map_err(|e| {
        PkgError::manifest_missing(&format!("{} ({e})", root.display()))
    })?;

    let mut found: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_dir() && p.join(MANIFEST_FILE).is_file())
        .collect();

    match found.len() {
        1 => Ok(found.remove(0)),
        0 => Err(PkgError::manifest_missing(&root.display().to_string())),
        n => Err(PkgError::manifest_invalid(format!(
            "{} has {n} subdirectories with a package.json, expected 1",
            root.display()
        ))),
    }
}
