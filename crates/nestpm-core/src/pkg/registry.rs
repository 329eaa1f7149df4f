//! npm registry descriptor model and version selection.

use super::error::PkgError;
use super::range::{best_match, VersionRange};
use super::semver::ParsedVersion;
use super::spec::url_encoded_name;
use serde::Deserialize;
use std::collections::BTreeMap;
use url::Url;

/// Default npm registry URL.
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org/";

/// Environment variable to override registry URL.
pub const REGISTRY_ENV: &str = "NESTPM_REGISTRY";

/// Dist-tag selected when no version is requested.
pub const LATEST_TAG: &str = "latest";

/// Registry document for one package name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "dist-tags", default)]
    pub dist_tags: BTreeMap<String, String>,
    #[serde(default)]
    pub versions: BTreeMap<String, VersionEntry>,
}

/// One published version.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VersionEntry {
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    pub dist: Dist,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Dist {
    pub tarball: String,
}

impl RegistryDescriptor {
    /// Parse a descriptor from raw JSON bytes.
    ///
    /// # Errors
    /// Returns `PKG_REGISTRY_ERROR` if the bytes are not a descriptor.
    pub fn from_slice(name: &str, bytes: &[u8]) -> Result<Self, PkgError> {
        serde_json::from_slice(bytes)
            .map_err(|e| PkgError::registry(format!("Invalid registry document for '{name}': {e}")))
    }

    /// Version the `latest` dist-tag points at.
    #[must_use]
    pub fn latest(&self) -> Option<&str> {
        self.dist_tags.get(LATEST_TAG).map(String::as_str)
    }

    /// Choose a version for `requested` (exact version, dist-tag, range or none).
    ///
    /// # Errors
    /// - `PKG_VERSION_NOT_FOUND` if an exact version or a tagged version is absent
    /// - `PKG_NO_MATCHING_VERSION` if no listed version satisfies the range
    /// - `PKG_RANGE_INVALID` if `requested` is neither a version, tag nor range
    pub fn select_version(&self, requested: Option<&str>) -> Result<&str, PkgError> {
        let requested = requested.map(str::trim).unwrap_or(LATEST_TAG);

        if let Some((key, _)) = self.versions.get_key_value(requested) {
            return Ok(key);
        }

        if let Some(tagged) = self.dist_tags.get(requested) {
            return self
                .versions
                .get_key_value(tagged)
                .map(|(key, _)| key.as_str())
                .ok_or_else(|| PkgError::version_not_found(&self.name, tagged));
        }
        if requested == LATEST_TAG {
            return Err(PkgError::version_not_found(&self.name, LATEST_TAG));
        }

        let range = VersionRange::parse(requested)?;
        if let Some(found) = best_match(self.versions.keys().map(String::as_str), &range) {
            return Ok(found);
        }

        if ParsedVersion::parse(requested).is_ok() {
            Err(PkgError::version_not_found(&self.name, requested))
        } else {
            Err(PkgError::no_matching_version(&self.name, requested))
        }
    }

    /// Entry for a listed version.
    ///
    /// # Errors
    /// Returns `PKG_VERSION_NOT_FOUND` if the version is not listed.
    pub fn entry(&self, version: &str) -> Result<&VersionEntry, PkgError> {
        self.versions
            .get(version)
            .ok_or_else(|| PkgError::version_not_found(&self.name, version))
    }
}

/// Builds registry URLs.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: Url,
}

impl RegistryClient {
    /// Create a client for the given base URL.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid.
    pub fn new(base_url: &str) -> Result<Self, PkgError> {
        let mut raw = base_url.to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url = Url::parse(&raw)
            .map_err(|e| PkgError::registry(format!("Invalid registry URL '{base_url}': {e}")))?;
        Ok(Self { base_url })
    }

    /// Create a client from an already parsed base URL.
    #[must_use]
    pub fn from_url(base_url: Url) -> Self {
        Self { base_url }
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL of the descriptor for `name`.
    ///
    /// # Errors
    /// Returns an error if the joined URL is invalid.
    pub fn descriptor_url(&self, name: &str) -> Result<Url, PkgError> {
        self.base_url
            .join(&url_encoded_name(name))
            .map_err(|e| PkgError::registry(format!("Failed to build URL for '{name}': {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::error::codes;

    fn descriptor() -> RegistryDescriptor {
        let json = serde_json::json!({
            "name": "file",
            "dist-tags": { "latest": "0.2.1", "legacy": "0.1.0" },
            "versions": {
                "0.1.0": { "dist": { "tarball": "https://r/file/-/file-0.1.0.tgz" } },
                "0.2.0": { "dist": { "tarball": "https://r/file/-/file-0.2.0.tgz" } },
                "0.2.1": {
                    "dependencies": { "dep": "~1.0.0" },
                    "dist": { "tarball": "https://r/file/-/file-0.2.1.tgz" }
                },
                "not-a-version": { "dist": { "tarball": "https://r/x.tgz" } }
            }
        });
        RegistryDescriptor::from_slice("file", json.to_string().as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_descriptor() {
        let desc = descriptor();
        assert_eq!(desc.name, "file");
        assert_eq!(desc.latest(), Some("0.2.1"));
        let entry = desc.entry("0.2.1").unwrap();
        assert_eq!(entry.dist.tarball, "https://r/file/-/file-0.2.1.tgz");
        assert_eq!(entry.dependencies.get("dep").map(String::as_str), Some("~1.0.0"));
    }

    #[test]
    fn test_select_latest() {
        let desc = descriptor();
        assert_eq!(desc.select_version(None).unwrap(), "0.2.1");
        assert_eq!(desc.select_version(Some("latest")).unwrap(), "0.2.1");
    }

    #[test]
    fn test_select_other_dist_tag() {
        assert_eq!(descriptor().select_version(Some("legacy")).unwrap(), "0.1.0");
    }

    #[test]
    fn test_select_exact() {
        assert_eq!(descriptor().select_version(Some("0.1.0")).unwrap(), "0.1.0");
    }

    #[test]
    fn test_select_range_highest() {
        let desc = descriptor();
        assert_eq!(desc.select_version(Some("0.2.x")).unwrap(), "0.2.1");
        assert_eq!(desc.select_version(Some("<0.2.1")).unwrap(), "0.2.0");
    }

    #[test]
    fn test_select_missing_exact_version() {
        let err = descriptor().select_version(Some("9.9.9")).unwrap_err();
        assert_eq!(err.code(), codes::PKG_VERSION_NOT_FOUND);
    }

    #[test]
    fn test_select_unsatisfiable_range() {
        let err = descriptor().select_version(Some("^3.0.0")).unwrap_err();
        assert_eq!(err.code(), codes::PKG_NO_MATCHING_VERSION);
    }

    #[test]
    fn test_select_unparseable_range() {
        let err = descriptor()
            .select_version(Some("git://github.com/a/b.git"))
            .unwrap_err();
        assert_eq!(err.code(), codes::PKG_RANGE_INVALID);
    }

    #[test]
    fn test_select_latest_missing() {
        let desc = RegistryDescriptor {
            name: "ghost".into(),
            ..Default::default()
        };
        let err = desc.select_version(None).unwrap_err();
        assert_eq!(err.code(), codes::PKG_VERSION_NOT_FOUND);
    }

    #[test]
    fn test_invalid_document() {
        let err = RegistryDescriptor::from_slice("x", b"<html>").unwrap_err();
        assert_eq!(err.code(), codes::PKG_REGISTRY_ERROR);
    }

    #[test]
    fn test_descriptor_url() {
        let client = RegistryClient::new("http://localhost:4873/npm").unwrap();
        assert_eq!(
            client.descriptor_url("file").unwrap().as_str(),
            "http://localhost:4873/npm/file"
        );
        assert_eq!(
            client.descriptor_url("@types/node").unwrap().as_str(),
            "http://localhost:4873/npm/@types%2Fnode"
        );
    }

    #[test]
    fn test_client_invalid_url() {
        let err = RegistryClient::new("not a url").unwrap_err();
        assert_eq!(err.code(), codes::PKG_REGISTRY_ERROR);
    }
}
