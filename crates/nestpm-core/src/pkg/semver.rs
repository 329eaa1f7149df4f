//! Version parsing and ordering.
//!
//! Accepts `[v]MAJOR[.MINOR[.PATCH]][-PRERELEASE][+BUILD]` where numeric
//! components are `0` or have no leading zero. Missing minor/patch default
//! to 0.
//!
//! Ordering and equality look at `(major, minor, patch)` only. Pre-release
//! and build identifiers are kept for display but never break ties, so
//! `1.0.0-beta == 1.0.0`.

use super::error::PkgError;
use semver::{BuildMetadata, Prerelease};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A parsed package version.
#[derive(Debug, Clone)]
pub struct ParsedVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pre: Prerelease,
    build: BuildMetadata,
}

impl ParsedVersion {
    /// Create a version without pre-release or build identifiers.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: Prerelease::EMPTY,
            build: BuildMetadata::EMPTY,
        }
    }

    /// Parse a version string.
    ///
    /// # Errors
    /// Returns `PKG_VERSION_INVALID` if the input does not match the grammar.
    pub fn parse(input: &str) -> Result<Self, PkgError> {
        let invalid = || PkgError::version_invalid(input);

        let rest = input.strip_prefix('v').unwrap_or(input);
        let (rest, build) = match rest.split_once('+') {
            Some((head, build)) => (head, Some(build)),
            None => (rest, None),
        };
        let (core, pre) = match rest.split_once('-') {
            Some((head, pre)) => (head, Some(pre)),
            None => (rest, None),
        };

        let mut parts = core.split('.');
        let major = parse_component(parts.next()).ok_or_else(invalid)?;
        let minor = match parts.next() {
            Some(part) => parse_component(Some(part)).ok_or_else(invalid)?,
            None => 0,
        };
        let patch = match parts.next() {
            Some(part) => parse_component(Some(part)).ok_or_else(invalid)?,
            None => 0,
        };
        if parts.next().is_some() {
            return Err(invalid());
        }

        let pre = match pre {
            Some("") => return Err(invalid()),
            Some(pre) => Prerelease::new(pre).map_err(|_| invalid())?,
            None => Prerelease::EMPTY,
        };
        let build = match build {
            Some("") => return Err(invalid()),
            Some(build) => BuildMetadata::new(build).map_err(|_| invalid())?,
            None => BuildMetadata::EMPTY,
        };

        Ok(Self {
            major,
            minor,
            patch,
            pre,
            build,
        })
    }

    /// Pre-release identifiers, if any.
    #[must_use]
    pub fn pre(&self) -> Option<&str> {
        (!self.pre.is_empty()).then(|| self.pre.as_str())
    }

    /// Build metadata, if any.
    #[must_use]
    pub fn build(&self) -> Option<&str> {
        (!self.build.is_empty()).then(|| self.build.as_str())
    }

    fn triple(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }
}

/// `0` or a decimal without a leading zero.
fn parse_component(part: Option<&str>) -> Option<u64> {
    let part = part?;
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if part.len() > 1 && part.starts_with('0') {
        return None;
    }
    part.parse().ok()
}

impl PartialEq for ParsedVersion {
    fn eq(&self, other: &Self) -> bool {
        self.triple() == other.triple()
    }
}

impl Eq for ParsedVersion {}

impl PartialOrd for ParsedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ParsedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.triple().cmp(&other.triple())
    }
}

impl Hash for ParsedVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.triple().hash(state);
    }
}

impl FromStr for ParsedVersion {
    type Err = PkgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ParsedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = self.pre() {
            write!(f, "-{pre}")?;
        }
        if let Some(build) = self.build() {
            write!(f, "+{build}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::error::codes;

    #[test]
    fn test_parse_full() {
        let v = ParsedVersion::parse("1.2.3").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (1, 2, 3));
        assert_eq!(v.pre(), None);
        assert_eq!(v.build(), None);
    }

    #[test]
    fn test_parse_missing_components_default_to_zero() {
        assert_eq!(ParsedVersion::parse("2").unwrap(), ParsedVersion::new(2, 0, 0));
        assert_eq!(ParsedVersion::parse("2.5").unwrap(), ParsedVersion::new(2, 5, 0));
    }

    #[test]
    fn test_parse_v_prefix() {
        let plain = ParsedVersion::parse("1.2.3").unwrap();
        let prefixed = ParsedVersion::parse("v1.2.3").unwrap();
        assert_eq!(plain, prefixed);
        assert_eq!(prefixed.to_string(), "1.2.3");
    }

    #[test]
    fn test_parse_prerelease_and_build() {
        let v = ParsedVersion::parse("1.0.0-rc.1+build.5").unwrap();
        assert_eq!(v.pre(), Some("rc.1"));
        assert_eq!(v.build(), Some("build.5"));
        assert_eq!(v.to_string(), "1.0.0-rc.1+build.5");
    }

    #[test]
    fn test_parse_hyphenated_prerelease() {
        let v = ParsedVersion::parse("2.0.0-alpha-2").unwrap();
        assert_eq!(v.pre(), Some("alpha-2"));
    }

    #[test]
    fn test_parse_build_only() {
        let v = ParsedVersion::parse("1.0.0+20130313144700").unwrap();
        assert_eq!(v.pre(), None);
        assert_eq!(v.build(), Some("20130313144700"));
    }

    #[test]
    fn test_rejects_leading_zero() {
        for input in ["01.2.3", "1.02.3", "1.2.03", "00"] {
            let err = ParsedVersion::parse(input).unwrap_err();
            assert_eq!(err.code(), codes::PKG_VERSION_INVALID, "{input}");
        }
    }

    #[test]
    fn test_rejects_malformed() {
        for input in [
            "", "v", "a.b.c", "1..2", "1.2.3.4", "1.2.3-", "1.2.3+", "1.2.3-01", "1.2.3-a..b",
            " 1.2.3", "latest", "^1.2.3", "1.x",
        ] {
            assert!(ParsedVersion::parse(input).is_err(), "{input:?} should fail");
        }
    }

    #[test]
    fn test_ordering_is_numeric() {
        let a = ParsedVersion::parse("1.2.10").unwrap();
        let b = ParsedVersion::parse("1.2.9").unwrap();
        let c = ParsedVersion::parse("1.10.0").unwrap();
        let d = ParsedVersion::parse("2.0.0").unwrap();
        assert!(a > b);
        assert!(c > a);
        assert!(d > c);
    }

    #[test]
    fn test_prerelease_does_not_affect_ordering() {
        let release = ParsedVersion::parse("1.0.0").unwrap();
        let beta = ParsedVersion::parse("1.0.0-beta").unwrap();
        let built = ParsedVersion::parse("1.0.0+abc").unwrap();
        assert_eq!(release.cmp(&beta), Ordering::Equal);
        assert_eq!(release, built);
    }

    #[test]
    fn test_display_round_trips_triples() {
        for (major, minor, patch) in [(0, 0, 0), (1, 2, 3), (10, 0, 7), (4294967296, 1, 0)] {
            let v = ParsedVersion::new(major, minor, patch);
            let reparsed = ParsedVersion::parse(&v.to_string()).unwrap();
            assert_eq!(reparsed.cmp(&v), Ordering::Equal);
        }
    }

    #[test]
    fn test_from_str() {
        let v: ParsedVersion = "3.1".parse().unwrap();
        assert_eq!(v.to_string(), "3.1.0");
    }
}
