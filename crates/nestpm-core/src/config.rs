use crate::error::Error;
use crate::paths;
use crate::pkg::registry::{DEFAULT_REGISTRY, REGISTRY_ENV};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Name of the optional per-project config file.
pub const CONFIG_FILE_NAME: &str = "nestpm.json";

/// Runtime configuration for nestpm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory.
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,

    /// Registry base URL.
    pub registry: String,

    /// Root directory of the blob store.
    pub cache_dir: PathBuf,

    /// Root of the npm-style local tarball cache, if enabled.
    pub local_tarball_root: Option<PathBuf>,
}

/// On-disk shape of `nestpm.json`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    registry: Option<String>,
    cache_dir: Option<PathBuf>,
    local_tarball_root: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
            registry: std::env::var(REGISTRY_ENV).unwrap_or_else(|_| DEFAULT_REGISTRY.to_string()),
            cache_dir: paths::blob_dir(),
            local_tarball_root: paths::default_local_tarball_root(),
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Create a config for `cwd`, overlaying `nestpm.json` if present.
    ///
    /// Relative paths in the file are resolved against `cwd`.
    pub fn load(cwd: PathBuf) -> Result<Self, Error> {
        let mut config = Self::new(cwd);
        let path = config.cwd.join(CONFIG_FILE_NAME);
        if !path.is_file() {
            return Ok(config);
        }

        let content = std::fs::read_to_string(&path).map_err(|source| Error::ConfigRead {
            path: path.clone(),
            source,
        })?;
        let file: ConfigFile =
            serde_json::from_str(&content).map_err(|source| Error::ConfigParse { path, source })?;

        if let Some(registry) = file.registry {
            config.registry = registry;
        }
        if let Some(dir) = file.cache_dir {
            config.cache_dir = resolve_against(&config.cwd, dir);
        }
        if let Some(dir) = file.local_tarball_root {
            config.local_tarball_root = Some(resolve_against(&config.cwd, dir));
        }

        Ok(config)
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }

    /// Set the registry base URL.
    #[must_use]
    pub fn with_registry(mut self, registry: impl Into<String>) -> Self {
        self.registry = registry.into();
        self
    }

    /// Set the blob store root.
    #[must_use]
    pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
        self.cache_dir = dir;
        self
    }

    /// Set (or disable with `None`) the local tarball cache root.
    #[must_use]
    pub fn with_local_tarball_root(mut self, root: Option<PathBuf>) -> Self {
        self.local_tarball_root = root;
        self
    }

    /// Parse the registry base URL, ensuring it ends with `/` so that
    /// joining a package name appends rather than replaces the last segment.
    pub fn registry_url(&self) -> Result<Url, Error> {
        let mut raw = self.registry.clone();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).map_err(|source| Error::RegistryUrl {
            url: self.registry.clone(),
            source,
        })
    }
}

fn resolve_against(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
