//! Git sources.

use super::error::PkgError;
use nestpm_util::fs::remove_dir_if_exists;
use std::fmt::Debug;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::info;

/// Clones one branch of a repository into a directory.
pub trait GitCloner: Send + Sync + Debug {
    /// Clone `branch` of `uri` into `dest`, which must not exist yet.
    ///
    /// # Errors
    /// Returns `PKG_CLONE_FAILED` if the clone does not succeed.
    fn clone_branch(&self, uri: &str, branch: &str, dest: &Path) -> Result<(), PkgError>;
}

/// [`GitCloner`] that shells out to the `git` binary.
#[derive(Debug, Clone, Default)]
pub struct GitCli;

impl GitCloner for GitCli {
    fn clone_branch(&self, uri: &str, branch: &str, dest: &Path) -> Result<(), PkgError> {
        info!(uri, branch, "Cloning");

        let output = Command::new("git")
            .args(["clone", "--quiet", "--depth", "1", "--branch", branch, uri])
            .arg(dest)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    PkgError::clone_failed("git was not found, confirm it is installed and on PATH")
                } else {
                    PkgError::clone_failed(format!("Failed to run git: {e}"))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PkgError::clone_failed(format!(
                "git clone of {uri}#{branch} failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        // The checkout is the payload; repository metadata is not.
        remove_dir_if_exists(&dest.join(".git"))?;
        Ok(())
    }
}
