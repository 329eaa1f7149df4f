//! Package resolution and install error types.

use std::fmt;
use std::io;

/// Package error codes.
pub mod codes {
    pub const PKG_SPEC_INVALID: &str = "PKG_SPEC_INVALID";
    pub const PKG_VERSION_INVALID: &str = "PKG_VERSION_INVALID";
    pub const PKG_RANGE_INVALID: &str = "PKG_RANGE_INVALID";
    pub const PKG_NOT_FOUND: &str = "PKG_NOT_FOUND";
    pub const PKG_VERSION_NOT_FOUND: &str = "PKG_VERSION_NOT_FOUND";
    pub const PKG_NO_MATCHING_VERSION: &str = "PKG_NO_MATCHING_VERSION";
    pub const PKG_REGISTRY_ERROR: &str = "PKG_REGISTRY_ERROR";
    pub const PKG_DOWNLOAD_FAILED: &str = "PKG_DOWNLOAD_FAILED";
    pub const PKG_CLONE_FAILED: &str = "PKG_CLONE_FAILED";
    pub const PKG_EXTRACT_FAILED: &str = "PKG_EXTRACT_FAILED";
    pub const PKG_MANIFEST_MISSING: &str = "PKG_MANIFEST_MISSING";
    pub const PKG_MANIFEST_INVALID: &str = "PKG_MANIFEST_INVALID";
    pub const PKG_CACHE_ERROR: &str = "PKG_CACHE_ERROR";
    pub const PKG_INSTALL_FAILED: &str = "PKG_INSTALL_FAILED";
    pub const PKG_DEPTH_EXCEEDED: &str = "PKG_DEPTH_EXCEEDED";
}

/// Coarse failure class of a [`PkgError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed spec, version or range string.
    Parse,
    /// Package, version or satisfying version absent from the registry.
    NotFound,
    /// HTTP or clone failure.
    Transport,
    /// Corrupt or unsupported archive stream.
    Archive,
    /// Missing or unreadable manifest.
    Manifest,
    /// Local filesystem failure (cache, install directory).
    Io,
}

/// Package error.
#[derive(Debug)]
pub struct PkgError {
    code: &'static str,
    message: String,
}

impl PkgError {
    /// Create a new error with the given code and message.
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Get the error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Get the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Classify the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self.code {
            codes::PKG_SPEC_INVALID | codes::PKG_VERSION_INVALID | codes::PKG_RANGE_INVALID => {
                ErrorKind::Parse
            }
            codes::PKG_NOT_FOUND | codes::PKG_VERSION_NOT_FOUND | codes::PKG_NO_MATCHING_VERSION => {
                ErrorKind::NotFound
            }
            codes::PKG_REGISTRY_ERROR | codes::PKG_DOWNLOAD_FAILED | codes::PKG_CLONE_FAILED => {
                ErrorKind::Transport
            }
            codes::PKG_EXTRACT_FAILED => ErrorKind::Archive,
            codes::PKG_MANIFEST_MISSING | codes::PKG_MANIFEST_INVALID => ErrorKind::Manifest,
            _ => ErrorKind::Io,
        }
    }

    /// Prefix the message with context, keeping the code.
    #[must_use]
    pub fn context(self, ctx: impl fmt::Display) -> Self {
        Self {
            code: self.code,
            message: format!("{ctx}: {}", self.message),
        }
    }

    /// Create a spec invalid error.
    pub fn spec_invalid(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_SPEC_INVALID, msg)
    }

    /// Create a version parse error.
    #[must_use]
    pub fn version_invalid(input: &str) -> Self {
        Self::new(
            codes::PKG_VERSION_INVALID,
            format!("Unparseable version: '{input}'"),
        )
    }

    /// Create a range parse error.
    pub fn range_invalid(range: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            codes::PKG_RANGE_INVALID,
            format!("Invalid version range '{range}': {reason}"),
        )
    }

    /// Create a package not found error.
    #[must_use]
    pub fn not_found(name: &str) -> Self {
        Self::new(codes::PKG_NOT_FOUND, format!("Package not found: {name}"))
    }

    /// Create a version not found error (exact version absent).
    #[must_use]
    pub fn version_not_found(name: &str, version: &str) -> Self {
        Self::new(
            codes::PKG_VERSION_NOT_FOUND,
            format!("Version {version} of {name} not found"),
        )
    }

    /// Create a no matching version error (range unsatisfiable).
    #[must_use]
    pub fn no_matching_version(name: &str, range: &str) -> Self {
        Self::new(
            codes::PKG_NO_MATCHING_VERSION,
            format!("No version of {name} satisfies range: {range}"),
        )
    }

    /// Create a registry error.
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_REGISTRY_ERROR, msg)
    }

    /// Create a download failed error.
    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_DOWNLOAD_FAILED, msg)
    }

    /// Create a clone failed error.
    pub fn clone_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_CLONE_FAILED, msg)
    }

    /// Create an extraction failed error.
    pub fn extract_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_EXTRACT_FAILED, msg)
    }

    /// Create a manifest missing error.
    #[must_use]
    pub fn manifest_missing(source: &str) -> Self {
        Self::new(
            codes::PKG_MANIFEST_MISSING,
            format!("Source has no package.json: {source}"),
        )
    }

    /// Create a manifest invalid error.
    pub fn manifest_invalid(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_MANIFEST_INVALID, msg)
    }

    /// Create a cache error.
    pub fn cache_error(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_CACHE_ERROR, msg)
    }

    /// Create an install failed error.
    pub fn install_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_INSTALL_FAILED, msg)
    }

    /// Create a depth exceeded error.
    #[must_use]
    pub fn depth_exceeded(name: &str, max_depth: usize) -> Self {
        Self::new(
            codes::PKG_DEPTH_EXCEEDED,
            format!("Dependency tree deeper than {max_depth} levels at '{name}'"),
        )
    }
}

impl fmt::Display for PkgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PkgError {}

impl From<io::Error> for PkgError {
    fn from(e: io::Error) -> Self {
        Self::new(codes::PKG_INSTALL_FAILED, e.to_string())
    }
}
