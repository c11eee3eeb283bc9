//! Semantic version coercion and range matching
//!
//! Feature services expose their versions as plain strings and consumers
//! request them with range expressions. Matching is first-match in the
//! provider's declaration order, never best-match: when two exposed versions
//! both satisfy a range, the one declared earlier wins. Provider authors rely
//! on declaration order to express preference.

use std::cmp::Ordering;
use std::fmt;

use crate::hub::types::HubError;

/// Parsed semantic version (major.minor.patch, optional pre-release)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre_release: Option<String>,
}

impl SemanticVersion {
    /// Parse a full version string, e.g. "1.2.3" or "1.2.3-beta.1".
    ///
    /// Requires at least major.minor; a missing patch component defaults to 0.
    pub fn parse(version: &str) -> Option<Self> {
        Self::from_parts(version, 2)
    }

    /// Tolerantly coerce a partial version string, e.g. "1" -> 1.0.0.
    ///
    /// Accepts a leading `v` or `=`, missing minor/patch components, and
    /// strips any pre-release or build-metadata suffix.
    pub fn coerce(version: &str) -> Option<Self> {
        let coerced = Self::from_parts(version, 1)?;
        Some(Self {
            pre_release: None,
            ..coerced
        })
    }

    fn from_parts(version: &str, min_parts: usize) -> Option<Self> {
        let version = version
            .trim()
            .trim_start_matches('v')
            .trim_start_matches('=');

        // Build metadata never participates in precedence
        let version = version.split('+').next()?;

        let (version, pre_release) = match version.split_once('-') {
            Some((core, pre)) if !pre.is_empty() => (core, Some(pre.to_string())),
            Some((core, _)) => (core, None),
            None => (version, None),
        };

        let parts: Vec<&str> = version.split('.').collect();
        if parts.len() < min_parts || parts.len() > 3 || parts[0].is_empty() {
            return None;
        }

        let mut numbers = [0u64; 3];
        for (i, part) in parts.iter().enumerate() {
            numbers[i] = part.parse().ok()?;
        }

        Some(Self {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
            pre_release,
        })
    }
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch)) {
            Ordering::Equal => match (&self.pre_release, &other.pre_release) {
                // Pre-release versions sort before the release they precede
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => a.cmp(b),
            },
            other => other,
        }
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre_release {
            write!(f, "-{}", pre)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Exact,
    Greater,
    GreaterEq,
    Less,
    LessEq,
}

#[derive(Debug, Clone)]
struct Comparator {
    op: Op,
    version: SemanticVersion,
}

impl Comparator {
    fn matches(&self, version: &SemanticVersion) -> bool {
        let ordering = version.cmp(&self.version);
        match self.op {
            Op::Exact => ordering == Ordering::Equal,
            Op::Greater => ordering == Ordering::Greater,
            Op::GreaterEq => ordering != Ordering::Less,
            Op::Less => ordering == Ordering::Less,
            Op::LessEq => ordering != Ordering::Greater,
        }
    }
}

/// Version range expression
///
/// Supported grammar: `*` and `x`-ranges (`1.x`, `1.2.x`), bare versions
/// (`1.2.3` exact, partials as `x`-ranges), caret (`^1.2`), tilde (`~1.2.3`),
/// comparators (`=`, `>`, `>=`, `<`, `<=` with partials zero-filled),
/// whitespace-separated comparators AND together, `||` separates alternatives.
#[derive(Debug, Clone)]
pub struct VersionReq {
    // OR-alternatives, each a set of AND-ed comparators.
    // An empty comparator set matches every version.
    alternatives: Vec<Vec<Comparator>>,
}

impl VersionReq {
    /// Parse a range expression.
    pub fn parse(range: &str) -> Result<Self, HubError> {
        let invalid = |reason: &str| HubError::InvalidVersionRange {
            range: range.to_string(),
            reason: reason.to_string(),
        };

        let mut alternatives = Vec::new();
        for alternative in range.split("||") {
            let alternative = alternative.trim();
            let mut comparators = Vec::new();
            if !alternative.is_empty() && alternative != "*" {
                for token in alternative.split_whitespace() {
                    comparators.extend(parse_token(token).map_err(|reason| invalid(&reason))?);
                }
            }
            alternatives.push(comparators);
        }

        if alternatives.is_empty() {
            return Err(invalid("empty range expression"));
        }

        Ok(Self { alternatives })
    }

    /// Whether the given version satisfies this range.
    pub fn matches(&self, version: &SemanticVersion) -> bool {
        self.alternatives
            .iter()
            .any(|comparators| comparators.iter().all(|c| c.matches(version)))
    }
}

/// Version string with unspecified trailing components ("1.2", "1.x", "2")
#[derive(Debug, Clone)]
struct PartialVersion {
    major: Option<u64>,
    minor: Option<u64>,
    patch: Option<u64>,
    pre_release: Option<String>,
}

impl PartialVersion {
    fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim_start_matches('v');
        if s.is_empty() {
            return Err("missing version after operator".to_string());
        }

        let (core, pre_release) = match s.split_once('-') {
            Some((core, pre)) => (core, Some(pre.to_string())),
            None => (s, None),
        };

        let mut components = [None, None, None];
        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() > 3 {
            return Err(format!("too many version components in {}", s));
        }
        for (i, part) in parts.iter().enumerate() {
            if matches!(*part, "x" | "X" | "*") {
                break;
            }
            components[i] = Some(
                part.parse()
                    .map_err(|_| format!("invalid version component {}", part))?,
            );
        }

        // A wildcard component makes everything after it unspecified
        if components[0].is_none() {
            return Ok(Self {
                major: None,
                minor: None,
                patch: None,
                pre_release: None,
            });
        }

        Ok(Self {
            major: components[0],
            minor: components[1],
            patch: components[2],
            pre_release,
        })
    }

    fn floor(&self) -> SemanticVersion {
        SemanticVersion {
            major: self.major.unwrap_or(0),
            minor: self.minor.unwrap_or(0),
            patch: self.patch.unwrap_or(0),
            pre_release: self.pre_release.clone(),
        }
    }
}

fn bare(major: u64, minor: u64, patch: u64) -> SemanticVersion {
    SemanticVersion {
        major,
        minor,
        patch,
        pre_release: None,
    }
}

fn bounded(lower: SemanticVersion, upper: SemanticVersion) -> Vec<Comparator> {
    vec![
        Comparator {
            op: Op::GreaterEq,
            version: lower,
        },
        Comparator {
            op: Op::Less,
            version: upper,
        },
    ]
}

fn parse_token(token: &str) -> Result<Vec<Comparator>, String> {
    if let Some(rest) = token.strip_prefix('^') {
        let partial = PartialVersion::parse(rest)?;
        let Some(major) = partial.major else {
            return Ok(Vec::new());
        };
        let upper = if major > 0 {
            bare(major + 1, 0, 0)
        } else {
            match (partial.minor, partial.patch) {
                (Some(minor), _) if minor > 0 => bare(0, minor + 1, 0),
                (Some(_), Some(patch)) => bare(0, 0, patch + 1),
                (Some(_), None) => bare(0, 1, 0),
                (None, _) => bare(1, 0, 0),
            }
        };
        return Ok(bounded(partial.floor(), upper));
    }

    if let Some(rest) = token.strip_prefix('~') {
        let partial = PartialVersion::parse(rest)?;
        let Some(major) = partial.major else {
            return Ok(Vec::new());
        };
        let upper = match partial.minor {
            Some(minor) => bare(major, minor + 1, 0),
            None => bare(major + 1, 0, 0),
        };
        return Ok(bounded(partial.floor(), upper));
    }

    for (prefix, op) in [
        (">=", Op::GreaterEq),
        ("<=", Op::LessEq),
        (">", Op::Greater),
        ("<", Op::Less),
        ("=", Op::Exact),
    ] {
        if let Some(rest) = token.strip_prefix(prefix) {
            let partial = PartialVersion::parse(rest)?;
            return Ok(vec![Comparator {
                op,
                version: partial.floor(),
            }]);
        }
    }

    // Bare version: exact when fully specified, x-range otherwise
    let partial = PartialVersion::parse(token)?;
    match (partial.major, partial.minor, partial.patch) {
        (Some(_), Some(_), Some(_)) => Ok(vec![Comparator {
            op: Op::Exact,
            version: partial.floor(),
        }]),
        (Some(major), Some(minor), None) => Ok(bounded(bare(major, minor, 0), bare(major, minor + 1, 0))),
        (Some(major), None, _) => Ok(bounded(bare(major, 0, 0), bare(major + 1, 0, 0))),
        (None, _, _) => Ok(Vec::new()),
    }
}

/// Return the first candidate, in the given order, whose coerced version
/// satisfies the range. Uncoercible candidates are skipped. `None` is not an
/// error; applicability is the caller's decision.
pub fn first_satisfying<'a, S: AsRef<str>>(
    range: &str,
    candidates: &'a [S],
) -> Result<Option<&'a str>, HubError> {
    let req = VersionReq::parse(range)?;
    for candidate in candidates {
        if let Some(version) = SemanticVersion::coerce(candidate.as_ref()) {
            if req.matches(&version) {
                return Ok(Some(candidate.as_ref()));
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(s: &str) -> SemanticVersion {
        SemanticVersion::coerce(s).unwrap()
    }

    #[test]
    fn test_coerce_partial_versions() {
        assert_eq!(version("1"), bare(1, 0, 0));
        assert_eq!(version("1.2"), bare(1, 2, 0));
        assert_eq!(version("1.2.3"), bare(1, 2, 3));
        assert_eq!(version("v2.0"), bare(2, 0, 0));
        assert_eq!(version("=1.4.0"), bare(1, 4, 0));
        assert_eq!(version("1.0.0-beta.1"), bare(1, 0, 0));
        assert_eq!(version("1.2.3+build.5"), bare(1, 2, 3));
        assert!(SemanticVersion::coerce("banana").is_none());
        assert!(SemanticVersion::coerce("").is_none());
        assert!(SemanticVersion::coerce("1.2.3.4").is_none());
    }

    #[test]
    fn test_parse_requires_minor() {
        assert!(SemanticVersion::parse("1").is_none());
        assert_eq!(SemanticVersion::parse("1.2").unwrap(), bare(1, 2, 0));
        assert_eq!(
            SemanticVersion::parse("1.2.3-rc.1").unwrap().pre_release,
            Some("rc.1".to_string())
        );
    }

    #[test]
    fn test_ordering_with_pre_release() {
        assert!(SemanticVersion::parse("1.0.0-beta").unwrap() < SemanticVersion::parse("1.0.0").unwrap());
        assert!(bare(1, 0, 0) < bare(1, 0, 1));
        assert!(bare(1, 9, 0) < bare(1, 10, 0));
    }

    #[test]
    fn test_caret_ranges() {
        let req = VersionReq::parse("^1.2").unwrap();
        assert!(req.matches(&version("1.2.0")));
        assert!(req.matches(&version("1.9.9")));
        assert!(!req.matches(&version("2.0.0")));
        assert!(!req.matches(&version("1.1.9")));

        let zero = VersionReq::parse("^0.2.1").unwrap();
        assert!(zero.matches(&version("0.2.5")));
        assert!(!zero.matches(&version("0.3.0")));

        let patch_only = VersionReq::parse("^0.0.3").unwrap();
        assert!(patch_only.matches(&version("0.0.3")));
        assert!(!patch_only.matches(&version("0.0.4")));
    }

    #[test]
    fn test_tilde_ranges() {
        let req = VersionReq::parse("~1.2.3").unwrap();
        assert!(req.matches(&version("1.2.3")));
        assert!(req.matches(&version("1.2.9")));
        assert!(!req.matches(&version("1.3.0")));

        let major_only = VersionReq::parse("~1").unwrap();
        assert!(major_only.matches(&version("1.9.0")));
        assert!(!major_only.matches(&version("2.0.0")));
    }

    #[test]
    fn test_x_ranges_and_wildcard() {
        let req = VersionReq::parse("1.x").unwrap();
        assert!(req.matches(&version("1.0.0")));
        assert!(req.matches(&version("1.7.2")));
        assert!(!req.matches(&version("2.0.0")));

        let any = VersionReq::parse("*").unwrap();
        assert!(any.matches(&version("0.0.1")));
        assert!(any.matches(&version("42.0.0")));
    }

    #[test]
    fn test_comparators_and_conjunction() {
        let req = VersionReq::parse(">=1.2 <2").unwrap();
        assert!(req.matches(&version("1.2.0")));
        assert!(req.matches(&version("1.9.0")));
        assert!(!req.matches(&version("2.0.0")));
        assert!(!req.matches(&version("1.1.0")));

        let exact = VersionReq::parse("1.2.3").unwrap();
        assert!(exact.matches(&version("1.2.3")));
        assert!(!exact.matches(&version("1.2.4")));
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(VersionReq::parse("^banana").is_err());
        assert!(VersionReq::parse(">=").is_err());
        assert!(VersionReq::parse("1.2.3.4.5").is_err());
    }

    #[test]
    fn test_first_match_not_best_match() {
        let candidates = ["1.0.0", "2.0.0"];
        let found = first_satisfying("^1.0 || ^2.0", &candidates).unwrap();
        assert_eq!(found, Some("1.0.0"));
    }

    #[test]
    fn test_first_match_honors_declaration_order() {
        let candidates = ["2.0.0", "1.0.0"];
        let found = first_satisfying("^1.0 || ^2.0", &candidates).unwrap();
        assert_eq!(found, Some("2.0.0"));

        let only_one = first_satisfying("^1.0", &candidates).unwrap();
        assert_eq!(only_one, Some("1.0.0"));
    }

    #[test]
    fn test_no_match_is_none_not_error() {
        let candidates = ["1.0.0", "1.1.0"];
        assert_eq!(first_satisfying("^3.0", &candidates).unwrap(), None);
    }

    #[test]
    fn test_uncoercible_candidates_are_skipped() {
        let candidates = ["not-a-version", "1.0.0"];
        assert_eq!(first_satisfying("^1.0", &candidates).unwrap(), Some("1.0.0"));
    }
}
