//! Package spec parsing.
//!
//! Classifies a package spec string into one of three sources:
//! - `git+https://host/repo.git#branch`, `git://host/repo.git` → [`PackageSpec::Git`]
//! - `https://host/pkg.tgz` → [`PackageSpec::Url`]
//! - `react`, `react@18.2.0`, `react@^18`, `@types/node@^20` → [`PackageSpec::Registry`]

use super::error::PkgError;
use std::fmt;
use url::Url;

/// Branch cloned when a git spec has no `#fragment`.
pub const DEFAULT_BRANCH: &str = "master";

/// How to obtain one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageSpec {
    /// Name with an optional exact version, range or dist-tag.
    Registry(RegistrySpec),
    /// Git repository and branch.
    Git { uri: String, branch: String },
    /// Direct tarball URL.
    Url(Url),
}

impl PackageSpec {
    /// Classify a package spec string.
    ///
    /// Git prefixes are checked first, then absolute URLs, then registry names.
    ///
    /// # Errors
    /// Returns `PKG_SPEC_INVALID` if the string fits none of the forms.
    pub fn classify(input: &str) -> Result<Self, PkgError> {
        let input = input.trim();

        if input.is_empty() {
            return Err(PkgError::spec_invalid("Empty package spec"));
        }

        if let Some(rest) = input.strip_prefix("git+") {
            return Self::parse_git(input, rest);
        }
        if input.starts_with("git:") {
            return Self::parse_git(input, input);
        }

        if input.contains("://") {
            return match Url::parse(input) {
                Ok(url) if !url.cannot_be_a_base() => Ok(Self::Url(url)),
                _ => Err(PkgError::spec_invalid(format!(
                    "Invalid tarball URL: '{input}'"
                ))),
            };
        }

        RegistrySpec::parse(input).map(Self::Registry)
    }

    fn parse_git(input: &str, uri_and_branch: &str) -> Result<Self, PkgError> {
        let (uri, branch) = match uri_and_branch.split_once('#') {
            Some((uri, branch)) if !branch.is_empty() => (uri, branch),
            Some((uri, _)) => (uri, DEFAULT_BRANCH),
            None => (uri_and_branch, DEFAULT_BRANCH),
        };

        if uri.is_empty() || uri == "git:" {
            return Err(PkgError::spec_invalid(format!(
                "Invalid git spec: missing repository in '{input}'"
            )));
        }

        Ok(Self::Git {
            uri: uri.to_string(),
            branch: branch.to_string(),
        })
    }

    /// True for git and URL sources.
    #[must_use]
    pub fn is_literal_source(&self) -> bool {
        !matches!(self, Self::Registry(_))
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry(spec) => spec.fmt(f),
            Self::Git { uri, branch } => write!(f, "git+{uri}#{branch}"),
            Self::Url(url) => f.write_str(url.as_str()),
        }
    }
}

/// A registry name with an optional version selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySpec {
    /// Full package name (e.g., "@scope/name" or "name").
    pub name: String,
    /// Scope without the @ prefix, if scoped.
    pub scope: Option<String>,
    /// Version, range or tag (None means latest).
    pub range: Option<String>,
}

impl RegistrySpec {
    /// Build a spec from a dependency entry (`name` → `range`).
    #[must_use]
    pub fn new(name: impl Into<String>, range: Option<String>) -> Self {
        let name = name.into();
        let scope = name
            .strip_prefix('@')
            .and_then(|rest| rest.split_once('/'))
            .map(|(scope, _)| scope.to_string());
        Self { name, scope, range }
    }

    /// Parse `name[@range]` or `@scope/name[@range]`.
    ///
    /// # Errors
    /// Returns `PKG_SPEC_INVALID` for empty names, empty ranges or
    /// characters not allowed in package names.
    pub fn parse(input: &str) -> Result<Self, PkgError> {
        let input = input.trim();

        if input.is_empty() {
            return Err(PkgError::spec_invalid("Empty package spec"));
        }

        if input.starts_with('@') {
            Self::parse_scoped(input)
        } else {
            Self::parse_unscoped(input)
        }
    }

    fn parse_scoped(input: &str) -> Result<Self, PkgError> {
        let Some(slash_pos) = input.find('/') else {
            return Err(PkgError::spec_invalid(format!(
                "Invalid scoped package: missing '/' in '{input}'"
            )));
        };

        if slash_pos == 1 {
            return Err(PkgError::spec_invalid(format!(
                "Invalid scoped package: empty scope in '{input}'"
            )));
        }

        let scope = &input[1..slash_pos];
        let after_slash = &input[slash_pos + 1..];
        let (pkg_name, range) = split_range(input, after_slash)?;

        if pkg_name.is_empty() {
            return Err(PkgError::spec_invalid(format!(
                "Invalid scoped package: empty name in '{input}'"
            )));
        }

        validate_name(scope)?;
        validate_name(pkg_name)?;

        Ok(Self {
            name: format!("@{scope}/{pkg_name}"),
            scope: Some(scope.to_string()),
            range,
        })
    }

    fn parse_unscoped(input: &str) -> Result<Self, PkgError> {
        let (name, range) = split_range(input, input)?;

        if name.is_empty() {
            return Err(PkgError::spec_invalid(format!(
                "Invalid package spec: empty name in '{input}'"
            )));
        }

        validate_name(name)?;

        Ok(Self {
            name: name.to_string(),
            scope: None,
            range,
        })
    }

    /// Check if this is a scoped package.
    #[must_use]
    pub fn is_scoped(&self) -> bool {
        self.scope.is_some()
    }

    /// URL-encode the package name for registry requests.
    ///
    /// For scoped packages, encodes the `/` as `%2F`.
    #[must_use]
    pub fn url_encoded_name(&self) -> String {
        url_encoded_name(&self.name)
    }
}

impl fmt::Display for RegistrySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.range {
            Some(range) => write!(f, "{}@{range}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Encode a package name as a single registry path segment.
#[must_use]
pub fn url_encoded_name(name: &str) -> String {
    if name.starts_with('@') {
        name.replace('/', "%2F")
    } else {
        name.to_string()
    }
}

/// Split `name@range` at the first `@`; the range must be non-empty.
fn split_range<'a>(input: &str, rest: &'a str) -> Result<(&'a str, Option<String>), PkgError> {
    match rest.split_once('@') {
        Some((_, "")) => Err(PkgError::spec_invalid(format!(
            "Invalid package spec: empty version range in '{input}'"
        ))),
        Some((name, range)) => Ok((name, Some(range.to_string()))),
        None => Ok((rest, None)),
    }
}

fn validate_name(name: &str) -> Result<(), PkgError> {
    if name.is_empty() {
        return Err(PkgError::spec_invalid("Empty package name"));
    }

    for c in name.chars() {
        if !c.is_alphanumeric() && c != '-' && c != '_' && c != '.' {
            return Err(PkgError::spec_invalid(format!(
                "Invalid character '{c}' in package name '{name}'"
            )));
        }
    }

    if name == "." || name == ".." {
        return Err(PkgError::spec_invalid(format!(
            "Invalid package name '{name}'"
        )));
    }

    Ok(())
}
