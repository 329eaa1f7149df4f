//! Nested dependency installer.
//!
//! Installs a package into `<install_dir>/<name>/`, then recursively
//! installs each of its dependencies into `<pkg_dir>/node_modules/`,
//! unless an ancestor's `node_modules` already holds a satisfying version.

use super::blobstore::Blobstore;
use super::error::{codes, ErrorKind, PkgError};
use super::extract::extract_archive;
use super::git::{GitCli, GitCloner};
use super::lookup::{find_installed_version, FsManifestProvider, ManifestProvider, NODE_MODULES};
use super::manifest::{find_manifest_dir, read_manifest};
use super::range::VersionRange;
use super::registry::{RegistryClient, RegistryDescriptor};
use super::semver::ParsedVersion;
use super::spec::{PackageSpec, RegistrySpec};
use super::transport::{HttpTransport, Transport};
use crate::config::Config;
use crate::paths;
use nestpm_util::fs::{copy_dir_all, remove_dir_if_exists};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info};

/// Default limit on nested dependency levels.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Directories removed from every installed package with `delete_test_folders`.
const TEST_FOLDERS: [&str; 2] = ["test", "tests"];

/// Per-run install options.
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Remove `test/` and `tests/` from each installed package.
    pub delete_test_folders: bool,
    /// Bypass the blob store on the first fetch of every document and tarball.
    pub force_update: bool,
    /// Parent directory for scratch directories (system temp dir if `None`).
    pub scratch_dir: Option<PathBuf>,
    /// Maximum nesting depth below the root package.
    pub max_depth: usize,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            delete_test_folders: false,
            force_update: false,
            scratch_dir: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Outcome of installing one root package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub name: String,
    pub version: Option<String>,
    pub path: PathBuf,
    /// Packages written to disk, the root package included.
    pub installed: usize,
    /// Dependencies satisfied by an ancestor's copy.
    pub reused: usize,
}

#[derive(Debug, Default)]
struct Stats {
    installed: usize,
    reused: usize,
}

/// Where the package contents come from once the manifest is known.
enum Payload {
    /// Already materialized in a scratch directory (git, URL, local tarball).
    /// The directory is deleted when this value is dropped.
    Scratch { _dir: TempDir, root: PathBuf },
    /// Registry tarball, downloaded at install time.
    Tarball { url: String },
}

struct Resolved {
    name: String,
    version: Option<String>,
    dependencies: BTreeMap<String, String>,
    payload: Payload,
}

/// How a dependency entry (`name` → `required`) is to be obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyTarget {
    /// `required` is a version, range or dist-tag of `name`.
    Registry(RegistrySpec),
    /// `required` is itself a git or URL spec.
    Literal(PackageSpec),
}

impl DependencyTarget {
    /// Decide how to fetch dependency `name` given its `required` string.
    ///
    /// A parseable range wins; otherwise the string is classified as a full
    /// spec and must be a git or URL source. Anything else is treated as a
    /// dist-tag name.
    #[must_use]
    pub fn classify(name: &str, required: &str) -> Self {
        if VersionRange::parse(required).is_ok() {
            return Self::Registry(RegistrySpec::new(name, Some(required.to_string())));
        }

        match PackageSpec::classify(required) {
            Ok(spec) if spec.is_literal_source() => Self::Literal(spec),
            _ => Self::Registry(RegistrySpec::new(name, Some(required.to_string()))),
        }
    }

    /// The spec to install.
    #[must_use]
    pub fn into_spec(self) -> PackageSpec {
        match self {
            Self::Registry(spec) => PackageSpec::Registry(spec),
            Self::Literal(spec) => spec,
        }
    }
}

/// Does an installed `version` satisfy `required`? Unparseable inputs never do.
#[must_use]
pub fn version_satisfies(version: &str, required: &str) -> bool {
    match (ParsedVersion::parse(version), VersionRange::parse(required)) {
        (Ok(version), Ok(range)) => range.satisfies(&version),
        _ => false,
    }
}

/// Resolves and installs packages.
///
/// Registry documents are memoized per instance, so one instance fetches
/// each package name at most once.
#[derive(Debug)]
pub struct Installer {
    registry: RegistryClient,
    blobs: Blobstore,
    transport: Arc<dyn Transport>,
    git: Arc<dyn GitCloner>,
    manifests: Arc<dyn ManifestProvider>,
    local_tarball_root: Option<PathBuf>,
    options: InstallOptions,
    descriptors: HashMap<String, Arc<RegistryDescriptor>>,
}

impl Installer {
    /// Create an installer with the `git` binary, the filesystem manifest
    /// reader, no local tarball override and default options.
    #[must_use]
    pub fn new(registry: RegistryClient, blobs: Blobstore, transport: Arc<dyn Transport>) -> Self {
        Self {
            registry,
            blobs,
            transport,
            git: Arc::new(GitCli),
            manifests: Arc::new(FsManifestProvider),
            local_tarball_root: None,
            options: InstallOptions::default(),
            descriptors: HashMap::new(),
        }
    }

    /// Create an installer over HTTP from runtime configuration.
    ///
    /// # Errors
    /// Returns `PKG_REGISTRY_ERROR` if the registry URL is invalid or the
    /// HTTP client cannot be created.
    pub fn from_config(config: &Config, options: InstallOptions) -> Result<Self, PkgError> {
        let registry_url = config
            .registry_url()
            .map_err(|e| PkgError::registry(e.to_string()))?;
        let transport = Arc::new(HttpTransport::new()?);

        Ok(Self::new(
            RegistryClient::from_url(registry_url),
            Blobstore::new(&config.cache_dir),
            transport,
        )
        .with_local_tarball_root(config.local_tarball_root.clone())
        .with_options(options))
    }

    #[must_use]
    pub fn with_git(mut self, git: Arc<dyn GitCloner>) -> Self {
        self.git = git;
        self
    }

    #[must_use]
    pub fn with_manifest_provider(
        mut self,
        manifests: Arc<dyn ManifestProvider>,
    ) -> Self {
        self.manifests = manifests;
        self
    }

    /// Set (or disable with `None`) the local tarball override root.
    #[must_use]
    pub fn with_local_tarball_root(mut self, root: Option<PathBuf>) -> Self {
        self.local_tarball_root = root;
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: InstallOptions) -> Self {
        self.options = options;
        self
    }

    /// Install `spec` and its dependency tree under `install_root`.
    ///
    /// # Errors
    /// Returns the first failure anywhere in the tree. Packages installed
    /// before the failure are left in place.
    pub fn install(&mut self, spec: &str, install_root: &Path) -> Result<InstallReport, PkgError> {
        let spec = PackageSpec::classify(spec)?;
        fs::create_dir_all(install_root).map_err(|e| {
            PkgError::install_failed(format!(
                "Failed to create install root {}: {e}",
                install_root.display()
            ))
        })?;

        let mut stats = Stats::default();
        let (name, version, path) =
            self.install_spec(&spec, install_root, install_root, 0, &mut stats)?;

        info!(
            package = %name,
            installed = stats.installed,
            reused = stats.reused,
            "Install complete"
        );

        Ok(InstallReport {
            name,
            version,
            path,
            installed: stats.installed,
            reused: stats.reused,
        })
    }

    fn install_spec(
        &mut self,
        spec: &PackageSpec,
        install_root: &Path,
        install_dir: &Path,
        depth: usize,
        stats: &mut Stats,
    ) -> Result<(String, Option<String>, PathBuf), PkgError> {
        if depth > self.options.max_depth {
            return Err(PkgError::depth_exceeded(&spec.to_string(), self.options.max_depth));
        }

        let Resolved {
            name,
            version,
            dependencies,
            payload,
        } = self.resolve(spec)?;
        let pkg_dir = install_dir.join(&name);
        let label = match &version {
            Some(v) => format!("{name}@{v}"),
            None => name.clone(),
        };

        remove_dir_if_exists(&pkg_dir).map_err(|e| install_error(&pkg_dir, &e))?;

        match &payload {
            Payload::Scratch { root, .. } => {
                copy_dir_all(root, &pkg_dir).map_err(|e| install_error(&pkg_dir, &e))?;
            }
            Payload::Tarball { url } => self.fetch_and_extract_with_retry(url, &pkg_dir)?,
        }
        drop(payload);

        if self.options.delete_test_folders {
            for folder in TEST_FOLDERS {
                let dir = pkg_dir.join(folder);
                if remove_dir_if_exists(&dir).map_err(|e| install_error(&dir, &e))? {
                    debug!(path = %dir.display(), "Deleted test folder");
                }
            }
        }

        stats.installed += 1;
        info!(package = %label, path = %pkg_dir.display(), depth, "Installed");

        let modules_dir = pkg_dir.join(NODE_MODULES);
        for (dep_name, required) in &dependencies {
            let existing =
                find_installed_version(install_root, &pkg_dir, dep_name, self.manifests.as_ref())?;
            if let Some(existing) = existing {
                if version_satisfies(&existing, required) {
                    debug!(
                        dependency = %dep_name,
                        required = %required,
                        found = %existing,
                        "Reusing ancestor copy"
                    );
                    stats.reused += 1;
                    continue;
                }
            }

            let target = DependencyTarget::classify(dep_name, required).into_spec();
            self.install_spec(&target, install_root, &modules_dir, depth + 1, stats)
                .map_err(|e| e.context(format!("{label} -> {dep_name}@{required}")))?;
        }

        Ok((name, version, pkg_dir))
    }

    fn resolve(&mut self, spec: &PackageSpec) -> Result<Resolved, PkgError> {
        match spec {
            PackageSpec::Registry(spec) => self.resolve_registry(spec),
            PackageSpec::Git { uri, branch } => {
                let scratch = self.scratch_dir()?;
                let checkout = scratch.path().join("checkout");
                self.git.clone_branch(uri, branch, &checkout)?;
                let manifest = read_manifest(&checkout)
                    .map_err(|e| e.context(format!("{uri}#{branch}")))?;

                Ok(Resolved {
                    name: manifest.name,
                    version: manifest.version,
                    dependencies: manifest.dependencies,
                    payload: Payload::Scratch {
                        _dir: scratch,
                        root: checkout,
                    },
                })
            }
            PackageSpec::Url(url) => {
                let scratch = self.scratch_dir()?;
                let extracted = scratch.path().join("extract");
                self.fetch_and_extract_with_retry(url.as_str(), &extracted)?;
                let root = find_manifest_dir(&extracted).map_err(|e| e.context(url))?;
                let manifest = read_manifest(&root)?;

                Ok(Resolved {
                    name: manifest.name,
                    version: manifest.version,
                    dependencies: manifest.dependencies,
                    payload: Payload::Scratch { _dir: scratch, root },
                })
            }
        }
    }

    fn resolve_registry(&mut self, spec: &RegistrySpec) -> Result<Resolved, PkgError> {
        // An exact version found locally needs no registry document at all.
        if let Some(version) = spec.range.as_deref() {
            if ParsedVersion::parse(version).is_ok() {
                if let Some(resolved) = self.resolve_local_tarball(&spec.name, version)? {
                    return Ok(resolved);
                }
            }
        }

        let descriptor = self.descriptor(&spec.name)?;
        let version = descriptor.select_version(spec.range.as_deref())?.to_string();
        debug!(package = %spec, selected = %version, "Selected version");

        if let Some(resolved) = self.resolve_local_tarball(&spec.name, &version)? {
            return Ok(resolved);
        }

        let entry = descriptor.entry(&version)?;
        Ok(Resolved {
            name: spec.name.clone(),
            version: Some(version),
            dependencies: entry.dependencies.clone(),
            payload: Payload::Tarball {
                url: entry.dist.tarball.clone(),
            },
        })
    }

    /// Use `<root>/<name>/<version>/package.tgz` if it exists.
    fn resolve_local_tarball(
        &self,
        name: &str,
        version: &str,
    ) -> Result<Option<Resolved>, PkgError> {
        let Some(root) = &self.local_tarball_root else {
            return Ok(None);
        };

        let tarball = paths::local_tarball(root, name, version);
        if !tarball.is_file() {
            return Ok(None);
        }

        info!(package = name, version, path = %tarball.display(), "Using local tarball");
        let file = File::open(&tarball).map_err(|e| {
            PkgError::cache_error(format!("Failed to open {}: {e}", tarball.display()))
        })?;
        let scratch = self.scratch_dir()?;
        let extracted = scratch.path().join("extract");
        extract_archive(BufReader::new(file), &extracted)
            .map_err(|e| e.context(tarball.display()))?;
        let root = find_manifest_dir(&extracted)?;
        let manifest = read_manifest(&root)?;

        Ok(Some(Resolved {
            name: name.to_string(),
            version: Some(version.to_string()),
            dependencies: manifest.dependencies,
            payload: Payload::Scratch { _dir: scratch, root },
        }))
    }

    /// Registry document for `name`, fetched at most once per installer.
    fn descriptor(&mut self, name: &str) -> Result<Arc<RegistryDescriptor>, PkgError> {
        if let Some(descriptor) = self.descriptors.get(name) {
            return Ok(Arc::clone(descriptor));
        }

        let url = self.registry.descriptor_url(name)?.to_string();
        let mut descriptor = match self.load_descriptor(name, &url, self.options.force_update) {
            Err(e) if e.code() == codes::PKG_REGISTRY_ERROR && !self.options.force_update => {
                info!(package = name, error = %e, "Cached registry document unreadable, refetching");
                self.load_descriptor(name, &url, true)?
            }
            other => other?,
        };
        if descriptor.name.is_empty() {
            descriptor.name = name.to_string();
        }

        let descriptor = Arc::new(descriptor);
        self.descriptors
            .insert(name.to_string(), Arc::clone(&descriptor));
        Ok(descriptor)
    }

    fn load_descriptor(
        &self,
        name: &str,
        url: &str,
        force: bool,
    ) -> Result<RegistryDescriptor, PkgError> {
        let mut file = self
            .blobs
            .fetch_or_populate(url, force, || {
                info!(package = name, url, "Fetching registry document");
                self.transport.get(url)
            })
            .map_err(|e| {
                if e.code() == codes::PKG_NOT_FOUND {
                    PkgError::not_found(name)
                } else {
                    e
                }
            })?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(|e| {
            PkgError::cache_error(format!("Failed to read cached document for '{name}': {e}"))
        })?;
        RegistryDescriptor::from_slice(name, &bytes)
    }

    /// Download (through the blob store) and extract; on a download or
    /// extraction failure, retry exactly once with a forced fresh download.
    fn fetch_and_extract_with_retry(&self, url: &str, dest: &Path) -> Result<(), PkgError> {
        match self.fetch_and_extract(url, dest, self.options.force_update) {
            Err(e) if matches!(e.kind(), ErrorKind::Transport | ErrorKind::Archive) => {
                info!(url, error = %e, "Retrying with fresh download");
                remove_dir_if_exists(dest).map_err(|io| install_error(dest, &io))?;
                self.fetch_and_extract(url, dest, true)
            }
            other => other,
        }
    }

    fn fetch_and_extract(&self, url: &str, dest: &Path, force: bool) -> Result<(), PkgError> {
        let file = self.blobs.fetch_or_populate(url, force, || {
            info!(url, "Downloading");
            self.transport.get(url).map_err(|e| {
                if e.code() == codes::PKG_NOT_FOUND {
                    PkgError::download_failed(format!("Tarball not found: {url}"))
                } else {
                    e
                }
            })
        })?;

        let entries = extract_archive(BufReader::new(file), dest).map_err(|e| e.context(url))?;
        debug!(url, entries, dest = %dest.display(), "Extracted");
        Ok(())
    }

    fn scratch_dir(&self) -> Result<TempDir, PkgError> {
        let builder = {
            let mut b = tempfile::Builder::new();
            b.prefix("nestpm-");
            b
        };

        let dir = match &self.options.scratch_dir {
            Some(parent) => {
                fs::create_dir_all(parent).map_err(|e| install_error(parent, &e))?;
                builder.tempdir_in(parent)
            }
            None => builder.tempdir(),
        };
        dir.map_err(|e| PkgError::install_failed(format!("Failed to create scratch directory: {e}")))
    }
}

fn install_error(path: &Path, e: &std::io::Error) -> PkgError {
    PkgError::install_failed(format!("Failed to write {}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_target_range() {
        let target = DependencyTarget::classify("qs", ">= 2.1.2 < 3.0.0");
        assert_eq!(
            target,
            DependencyTarget::Registry(RegistrySpec::new("qs", Some(">= 2.1.2 < 3.0.0".into())))
        );
    }

    #[test]
    fn test_dependency_target_falls_back_to_git() {
        let target = DependencyTarget::classify("widget", "git+https://h/acme/widget.git#v2");
        assert_eq!(
            target,
            DependencyTarget::Literal(PackageSpec::Git {
                uri: "https://h/acme/widget.git".into(),
                branch: "v2".into(),
            })
        );
    }

    #[test]
    fn test_dependency_target_falls_back_to_url() {
        let target = DependencyTarget::classify("widget", "https://h/widget.tgz");
        assert!(matches!(
            target,
            DependencyTarget::Literal(PackageSpec::Url(_))
        ));
    }

    #[test]
    fn test_dependency_target_tag_stays_registry() {
        let target = DependencyTarget::classify("react", "next");
        assert_eq!(
            target.into_spec(),
            PackageSpec::Registry(RegistrySpec::new("react", Some("next".into())))
        );
    }

    #[test]
    fn test_version_satisfies() {
        assert!(version_satisfies("1.0.5", "~1.0.0"));
        assert!(!version_satisfies("1.1.0", "~1.0.0"));
        assert!(!version_satisfies("1.0.0", "git://h/r.git"));
        assert!(!version_satisfies("not-a-version", "*"));
    }

    #[test]
    fn test_default_options() {
        let options = InstallOptions::default();
        assert_eq!(options.max_depth, DEFAULT_MAX_DEPTH);
        assert!(!options.delete_test_folders);
        assert!(!options.force_update);
    }
}
