//! Version range parsing and matching.
//!
//! A range is a conjunction of `(operator, version)` clauses. Text is split
//! on whitespace; each token is a comparator (`<`, `<=`, `=`, `>=`, `>`, or
//! bare for `=`) or a shorthand that expands to a `>=lower <upper` pair:
//!
//! | input    | expansion          |
//! |----------|--------------------|
//! | `~1.2.3` | `>=1.2.3 <1.3.0`   |
//! | `~1.2`   | `>=1.2.0 <1.3.0`   |
//! | `~2`     | `>=2.0.0 <3.0.0`   |
//! | `2.x`    | `>=2.0.0 <3.0.0`   |
//! | `2.0.x`  | `>=2.0.0 <2.1.0`   |
//! | `^0.2.3` | `>=0.2.3 <0.3.0`   |
//!
//! `*`, `x` and the empty string match every version, as do `>=*`,
//! `<=*` and `=*`; `<*` and `>*` match nothing.
//!
//! Clauses are keyed by version, so two clauses on the same version keep
//! only the last operator.

use super::error::PkgError;
use super::semver::ParsedVersion;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Comparison operator of a single clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
}

impl Op {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "=",
            Self::Ge => ">=",
            Self::Gt => ">",
        }
    }

    /// Does `candidate OP bound` hold?
    #[must_use]
    pub fn holds(self, candidate: &ParsedVersion, bound: &ParsedVersion) -> bool {
        match self {
            Self::Lt => candidate < bound,
            Self::Le => candidate <= bound,
            Self::Eq => candidate == bound,
            Self::Ge => candidate >= bound,
            Self::Gt => candidate > bound,
        }
    }
}

static OPERATOR_WHITESPACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(<=|>=|<|>|=|~|\^)\s+").expect("operator whitespace pattern is valid")
});

/// Operator prefix of a token, before classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prefix {
    Cmp(Op),
    Tilde,
    Caret,
}

// Longest operators first so `<=` is not read as `<` followed by `=`.
const PREFIXES: [(&str, Prefix); 7] = [
    ("<=", Prefix::Cmp(Op::Le)),
    (">=", Prefix::Cmp(Op::Ge)),
    ("<", Prefix::Cmp(Op::Lt)),
    (">", Prefix::Cmp(Op::Gt)),
    ("=", Prefix::Cmp(Op::Eq)),
    ("~", Prefix::Tilde),
    ("^", Prefix::Caret),
];

/// One dot-separated component of a shorthand version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    Num(u64),
    Wild,
}

/// A parsed version range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionRange {
    clauses: BTreeMap<ParsedVersion, Op>,
}

impl VersionRange {
    /// A range that every version satisfies.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Parse a range expression.
    ///
    /// # Errors
    /// Returns `PKG_RANGE_INVALID` if a token is neither a comparator nor a
    /// recognised shorthand.
    pub fn parse(text: &str) -> Result<Self, PkgError> {
        let collapsed = collapse_operator_whitespace(text.trim());
        let mut range = Self::default();

        for token in collapsed.split_whitespace() {
            range.push_token(text, token)?;
        }

        Ok(range)
    }

    fn push_token(&mut self, text: &str, token: &str) -> Result<(), PkgError> {
        let (prefix, rest) = split_prefix(token);
        if rest.is_empty() {
            return Err(PkgError::range_invalid(text, format!("'{token}' has no version")));
        }

        if is_match_all(rest) {
            self.push_full_wildcard(prefix);
            return Ok(());
        }

        let Some(parts) = shorthand_parts(rest) else {
            // Not a shorthand: must be a full literal version.
            let op = match prefix {
                None => Op::Eq,
                Some(Prefix::Cmp(op)) => op,
                Some(Prefix::Tilde | Prefix::Caret) => {
                    return Err(PkgError::range_invalid(text, format!("bad version in '{token}'")))
                }
            };
            let version = ParsedVersion::parse(rest)
                .map_err(|_| PkgError::range_invalid(text, format!("bad version in '{token}'")))?;
            self.insert(version, op);
            return Ok(());
        };

        let wildcard = parts.iter().position(|p| *p == Part::Wild);
        let overflow = || PkgError::range_invalid(text, format!("'{token}' is out of range"));
        let (lower, upper) = match (prefix, wildcard) {
            (_, Some(0)) => {
                self.push_full_wildcard(prefix);
                return Ok(());
            }
            (Some(Prefix::Cmp(op)), Some(w)) => {
                let (lower, upper) = x_bounds(&parts, w).ok_or_else(overflow)?;
                match op {
                    Op::Ge => self.insert(lower, Op::Ge),
                    Op::Lt => self.insert(lower, Op::Lt),
                    Op::Gt => self.insert(upper, Op::Ge),
                    Op::Le => self.insert(upper, Op::Lt),
                    Op::Eq => {
                        self.insert(lower, Op::Ge);
                        self.insert(upper, Op::Lt);
                    }
                }
                return Ok(());
            }
            (_, Some(w)) => x_bounds(&parts, w).ok_or_else(overflow)?,
            (Some(Prefix::Tilde), None) => tilde_bounds(&parts).ok_or_else(overflow)?,
            (Some(Prefix::Caret), None) => caret_bounds(&parts).ok_or_else(overflow)?,
            (Some(Prefix::Cmp(op)), None) => {
                // Plain numeric comparator; components beyond the given ones are 0.
                let version = ParsedVersion::parse(rest)
                    .map_err(|_| PkgError::range_invalid(text, format!("bad version in '{token}'")))?;
                self.insert(version, op);
                return Ok(());
            }
            (None, None) => {
                let version = ParsedVersion::parse(rest)
                    .map_err(|_| PkgError::range_invalid(text, format!("bad version in '{token}'")))?;
                self.insert(version, Op::Eq);
                return Ok(());
            }
        };

        self.insert(lower, Op::Ge);
        self.insert(upper, Op::Lt);
        Ok(())
    }

    /// A comparator against `*`: `<*` and `>*` exclude every version, any
    /// other prefix adds no clause.
    fn push_full_wildcard(&mut self, prefix: Option<Prefix>) {
        if let Some(Prefix::Cmp(Op::Lt | Op::Gt)) = prefix {
            self.insert(ParsedVersion::new(0, 0, 0), Op::Lt);
        }
    }

    fn insert(&mut self, version: ParsedVersion, op: Op) {
        if let Some(previous) = self.clauses.insert(version.clone(), op) {
            if previous != op {
                debug!(
                    version = %version,
                    dropped = previous.as_str(),
                    kept = op.as_str(),
                    "Range clauses collide on one version, keeping the last"
                );
            }
        }
    }

    /// Check whether `version` satisfies every clause.
    #[must_use]
    pub fn satisfies(&self, version: &ParsedVersion) -> bool {
        self.clauses.iter().all(|(bound, op)| op.holds(version, bound))
    }

    /// True if the range has no clauses.
    #[must_use]
    pub fn is_any(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Iterate clauses in ascending version order.
    pub fn clauses(&self) -> impl Iterator<Item = (&ParsedVersion, Op)> {
        self.clauses.iter().map(|(v, op)| (v, *op))
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (version, op)) in self.clauses().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}{version}", op.as_str())?;
        }
        Ok(())
    }
}

/// Pick the highest of `versions` satisfying `range`.
///
/// Returns the original string of the winning entry. Entries that do not
/// parse as versions are skipped. Among versions equal by number a release
/// is preferred over a pre-release.
pub fn best_match<'a, I>(versions: I, range: &VersionRange) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut candidates: Vec<(ParsedVersion, &'a str)> = versions
        .into_iter()
        .filter_map(|raw| match ParsedVersion::parse(raw) {
            Ok(v) => Some((v, raw)),
            Err(_) => {
                debug!(version = raw, "Skipping unparseable version");
                None
            }
        })
        .collect();

    candidates.sort_by(|(a, _), (b, _)| {
        b.cmp(a)
            .then_with(|| a.pre().is_some().cmp(&b.pre().is_some()))
    });

    candidates
        .into_iter()
        .find(|(v, _)| range.satisfies(v))
        .map(|(_, raw)| raw)
}

/// Parse `range_text` and pick the highest satisfying entry of `versions`.
///
/// # Errors
/// Returns `PKG_RANGE_INVALID` if the range does not parse.
pub fn get_best_match<'a, I>(versions: I, range_text: &str) -> Result<Option<&'a str>, PkgError>
where
    I: IntoIterator<Item = &'a str>,
{
    let range = VersionRange::parse(range_text)?;
    Ok(best_match(versions, &range))
}

/// Remove whitespace between an operator and its version (`>= 1.2` -> `>=1.2`).
fn collapse_operator_whitespace(text: &str) -> String {
    OPERATOR_WHITESPACE.replace_all(text, "$1").into_owned()
}

fn split_prefix(token: &str) -> (Option<Prefix>, &str) {
    for (text, prefix) in PREFIXES {
        if let Some(rest) = token.strip_prefix(text) {
            return (Some(prefix), rest);
        }
    }
    (None, token)
}

fn is_match_all(version: &str) -> bool {
    matches!(version, "*" | "x" | "X")
}

/// Split a shorthand version into numeric/wildcard components.
///
/// Returns `None` for anything that is not 1-3 dot-separated components,
/// and for plain versions carrying pre-release or build suffixes (those
/// are literal versions, not shorthands).
fn shorthand_parts(version: &str) -> Option<Vec<Part>> {
    let version = version.strip_prefix('v').unwrap_or(version);
    let core_end = version.find(['-', '+']).unwrap_or(version.len());
    let (core, suffix) = version.split_at(core_end);

    let parts = core
        .split('.')
        .map(|c| match c {
            "x" | "X" | "*" => Some(Part::Wild),
            _ if !c.is_empty() && c.bytes().all(|b| b.is_ascii_digit()) => {
                c.parse().ok().map(Part::Num)
            }
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;

    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    let has_wild = parts.contains(&Part::Wild);
    if !suffix.is_empty() && has_wild {
        return None;
    }
    Some(parts)
}

fn numbers(parts: &[Part]) -> [u64; 3] {
    let mut n = [0; 3];
    for (slot, part) in n.iter_mut().zip(parts) {
        if let Part::Num(value) = part {
            *slot = *value;
        }
    }
    n
}

/// Increment component `idx` and zero everything after it.
///
/// `None` if the component is already `u64::MAX`.
fn bump(mut n: [u64; 3], idx: usize) -> Option<ParsedVersion> {
    n[idx] = n[idx].checked_add(1)?;
    for slot in n.iter_mut().skip(idx + 1) {
        *slot = 0;
    }
    Some(ParsedVersion::new(n[0], n[1], n[2]))
}

/// `2.x` / `2.0.x`: lower is the version with wildcards as 0, upper bumps
/// the component just before the first wildcard.
fn x_bounds(parts: &[Part], first_wild: usize) -> Option<(ParsedVersion, ParsedVersion)> {
    let mut n = numbers(parts);
    for slot in n.iter_mut().skip(first_wild) {
        *slot = 0;
    }
    Some((
        ParsedVersion::new(n[0], n[1], n[2]),
        bump(n, first_wild - 1)?,
    ))
}

/// `~1.2.3` / `~1.2` bump the minor, `~1` bumps the major.
fn tilde_bounds(parts: &[Part]) -> Option<(ParsedVersion, ParsedVersion)> {
    let n = numbers(parts);
    let idx = usize::from(parts.len() >= 2);
    Some((ParsedVersion::new(n[0], n[1], n[2]), bump(n, idx)?))
}

/// `^` bumps the first non-zero given component (or the last given one).
fn caret_bounds(parts: &[Part]) -> Option<(ParsedVersion, ParsedVersion)> {
    let n = numbers(parts);
    let idx = n[..parts.len()]
        .iter()
        .position(|&c| c != 0)
        .unwrap_or(parts.len() - 1);
    Some((ParsedVersion::new(n[0], n[1], n[2]), bump(n, idx)?))
}
