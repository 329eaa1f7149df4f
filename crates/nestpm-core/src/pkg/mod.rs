//! Package installation.
//!
//! Provides:
//! - Version parsing with numeric-only ordering
//! - Range parsing (comparators, tilde, caret, x-ranges) and best-match selection
//! - A URL-keyed blob store for registry documents and tarballs
//! - Tarball extraction
//! - Spec classification (registry name, git, tarball URL)
//! - Nested `node_modules` installs with ancestor deduplication

pub mod blobstore;
pub mod error;
pub mod extract;
pub mod git;
pub mod installer;
pub mod lookup;
pub mod manifest;
pub mod range;
pub mod registry;
pub mod semver;
pub mod spec;
pub mod transport;

pub use blobstore::Blobstore;
pub use error::{codes, ErrorKind, PkgError};
pub use extract::extract_archive;
pub use git::{GitCli, GitCloner};
pub use installer::{
    version_satisfies, DependencyTarget, InstallOptions, InstallReport, Installer,
    DEFAULT_MAX_DEPTH,
};
pub use lookup::{find_installed_version, FsManifestProvider, ManifestProvider, NODE_MODULES};
pub use manifest::{find_manifest_dir, read_manifest, PackageManifest, MANIFEST_FILE};
pub use range::{best_match, get_best_match, Op, VersionRange};
pub use registry::{
    RegistryClient, RegistryDescriptor, VersionEntry, DEFAULT_REGISTRY, LATEST_TAG, REGISTRY_ENV,
};
pub use semver::ParsedVersion;
pub use spec::{PackageSpec, RegistrySpec, DEFAULT_BRANCH};
pub use transport::{HttpTransport, Transport, MAX_PAYLOAD_SIZE};
