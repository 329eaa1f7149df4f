//! Ancestor lookup for already-installed packages.
//!
//! A dependency of the package at `dir` is visible if any `node_modules`
//! between `dir` and the install root holds it. The root's own
//! `node_modules` is not consulted: the walk stops at the root.

use super::error::PkgError;
use super::manifest::{read_manifest, MANIFEST_FILE};
use std::fmt::Debug;
use std::path::Path;
use tracing::debug;

/// Modules directory name.
pub const NODE_MODULES: &str = "node_modules";

/// Reads the installed version of a package directory.
pub trait ManifestProvider: Send + Sync + Debug {
    /// Version declared by the manifest in `pkg_dir`, or `None` if no
    /// package is installed there.
    ///
    /// # Errors
    /// Returns an error if a manifest exists but cannot be read.
    fn read_version(&self, pkg_dir: &Path) -> Result<Option<String>, PkgError>;
}

/// [`ManifestProvider`] reading `package.json` from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsManifestProvider;

impl ManifestProvider for FsManifestProvider {
    fn read_version(&self, pkg_dir: &Path) -> Result<Option<String>, PkgError> {
        if !pkg_dir.join(MANIFEST_FILE).is_file() {
            return Ok(None);
        }
        Ok(read_manifest(pkg_dir)?.version)
    }
}

/// Find the version of `name` installed in `dir/node_modules` or the
/// nearest ancestor's, stopping before `root`.
///
/// # Errors
/// Propagates errors from `provider`.
pub fn find_installed_version(
    root: &Path,
    dir: &Path,
    name: &str,
    provider: &dyn ManifestProvider,
) -> Result<Option<String>, PkgError> {
    let mut current = dir;

    loop {
        if current == root {
            return Ok(None);
        }

        let candidate = current.join(NODE_MODULES).join(name);
        if let Some(version) = provider.read_version(&candidate)? {
            debug!(name, version = %version, at = %candidate.display(), "Found installed ancestor copy");
            return Ok(Some(version));
        }

        match current.parent() {
            Some(parent) if parent.starts_with(root) => current = parent,
            _ => return Ok(None),
        }
    }
}
