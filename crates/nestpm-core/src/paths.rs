use crate::version::SCHEMA_VERSION;
use std::path::{Path, PathBuf};

/// Get the cache directory for nestpm.
///
/// Uses platform-appropriate locations with versioning:
/// - Linux: `$XDG_CACHE_HOME/nestpm/v{N}` or `~/.cache/nestpm/v{N}`
/// - macOS: `~/Library/Caches/nestpm/v{N}`
/// - Windows: `%LOCALAPPDATA%\nestpm\v{N}`
#[must_use]
pub fn cache_dir() -> PathBuf {
    let base = dirs_next::cache_dir().map_or_else(
        || {
            dirs_next::home_dir().map_or_else(
                || PathBuf::from(".nestpm-cache"),
                |p| p.join(".cache").join("nestpm"),
            )
        },
        |p| p.join("nestpm"),
    );

    base.join(format!("v{SCHEMA_VERSION}"))
}

/// Default root of the blob store (registry documents and tarballs).
#[must_use]
pub fn blob_dir() -> PathBuf {
    cache_dir().join("blobs")
}

/// Default root of the npm-style local tarball cache (`~/.npm`).
#[must_use]
pub fn default_local_tarball_root() -> Option<PathBuf> {
    dirs_next::home_dir().map(|home| home.join(".npm"))
}

/// Path of a locally cached tarball for `name@version` under `root`.
///
/// Layout: `<root>/<name>/<version>/package.tgz`.
#[must_use]
pub fn local_tarball(root: &Path, name: &str, version: &str) -> PathBuf {
    root.join(name).join(version).join("package.tgz")
}
