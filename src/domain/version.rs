use crate::domain::prerelease::{self, Identifier};
use crate::error::{SemverStoreError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Semantic version value (`major.minor.patch[-pre][+build]`)
///
/// Immutable: bumping produces a new value. Ordering follows semver
/// precedence; versions that only differ in build metadata are ordered by
/// their build identifiers so that `Ord` agrees with `Eq`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SemanticVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Vec<Identifier>,
    pub build: Vec<String>,
}

impl SemanticVersion {
    /// Create a final version with no pre-release or build metadata
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        SemanticVersion {
            major,
            minor,
            patch,
            pre: Vec::new(),
            build: Vec::new(),
        }
    }

    /// Parse a version string (e.g., "1.2.3-rc.1+build.5")
    ///
    /// Leading and trailing whitespace is ignored since stored version files
    /// usually end with a newline. The grammar itself is strict SemVer 2.0:
    /// no `v` prefix and no partial versions.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let parsed = semver::Version::parse(trimmed)
            .map_err(|e| SemverStoreError::version(format!("'{}': {}", trimmed, e)))?;

        let pre = prerelease::parse_identifiers(parsed.pre.as_str())?;
        let build = if parsed.build.is_empty() {
            Vec::new()
        } else {
            parsed.build.as_str().split('.').map(str::to_string).collect()
        };

        Ok(SemanticVersion {
            major: parsed.major,
            minor: parsed.minor,
            patch: parsed.patch,
            pre,
            build,
        })
    }

    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }

    /// Same major.minor.patch with pre-release and build cleared
    pub fn finalized(&self) -> Self {
        SemanticVersion::new(self.major, self.minor, self.patch)
    }

    /// Copy of this version carrying the given pre-release identifiers
    pub fn with_pre(&self, pre: Vec<Identifier>) -> Self {
        SemanticVersion {
            pre,
            ..self.finalized()
        }
    }

    /// Compare by semver precedence only, ignoring build metadata
    pub fn precedence(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (self.pre.is_empty(), other.pre.is_empty()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => self.pre.cmp(&other.pre),
            })
    }
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.precedence(other)
            .then_with(|| self.build.cmp(&other.build))
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
        if !self.pre.is_empty() {
            write!(f, "-{}", prerelease::join(&self.pre))?;
        }
        if !self.build.is_empty() {
            write!(f, "+{}", prerelease::join(&self.build))?;
        }
        Ok(())
    }
}

impl FromStr for SemanticVersion {
    type Err = SemverStoreError;

    fn from_str(s: &str) -> Result<Self> {
        SemanticVersion::parse(s)
    }
}

impl Default for SemanticVersion {
    fn default() -> Self {
        SemanticVersion::new(0, 0, 0)
    }
}

impl Serialize for SemanticVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SemanticVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        SemanticVersion::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> SemanticVersion {
        SemanticVersion::parse(s).unwrap()
    }

    #[test]
    fn test_version_parse() {
        let version = v("1.2.3");
        assert_eq!(version, SemanticVersion::new(1, 2, 3));
    }

    #[test]
    fn test_version_parse_prerelease_and_build() {
        let version = v("1.2.3-rc.1+build.5");
        assert_eq!(
            version.pre,
            vec![
                Identifier::AlphaNumeric("rc".to_string()),
                Identifier::Numeric(1)
            ]
        );
        assert_eq!(version.build, vec!["build".to_string(), "5".to_string()]);
    }

    #[test]
    fn test_version_parse_trims_whitespace() {
        assert_eq!(v("  2.0.0\n"), SemanticVersion::new(2, 0, 0));
    }

    #[test]
    fn test_version_parse_invalid() {
        for text in ["", "1.2", "v1.2.3", "1.2.3.4", "01.2.3", "1.2.3-", "1.2.3-01", "a.b.c"] {
            let err = SemanticVersion::parse(text).unwrap_err();
            assert!(
                matches!(err, SemverStoreError::InvalidVersion(_)),
                "expected InvalidVersion for {:?}, got {:?}",
                text,
                err
            );
        }
    }

    #[test]
    fn test_version_display_round_trip() {
        for text in [
            "0.0.0",
            "1.2.3",
            "1.0.0-alpha",
            "1.0.0-alpha.1",
            "1.0.0-0.3.7",
            "1.0.0-x.7.z.92",
            "1.0.0+20130313144700",
            "1.0.0-beta+exp.sha.5114f85",
            "1.0.0+21AF26D3--117B344092BD",
        ] {
            let parsed = v(text);
            assert_eq!(parsed.to_string(), text);
            assert_eq!(v(&parsed.to_string()), parsed);
        }
    }

    #[test]
    fn test_version_precedence_chain() {
        let chain = [
            "1.0.0-alpha",
            "1.0.0-alpha.1",
            "1.0.0-alpha.beta",
            "1.0.0-beta",
            "1.0.0-beta.2",
            "1.0.0-beta.11",
            "1.0.0-rc.1",
            "1.0.0",
            "1.0.1",
            "1.1.0",
            "2.0.0",
        ];
        for pair in chain.windows(2) {
            assert!(v(pair[0]) < v(pair[1]), "{} < {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_version_numeric_components_compare_numerically() {
        assert!(v("1.9.0") < v("1.10.0"));
        assert!(v("1.0.9") < v("1.0.10"));
    }

    #[test]
    fn test_version_build_ignored_by_precedence() {
        let a = v("1.0.0+a");
        let b = v("1.0.0+b");
        assert_eq!(a.precedence(&b), Ordering::Equal);
        assert_ne!(a, b);
        assert_eq!(a.cmp(&b), Ordering::Less);
    }

    #[test]
    fn test_version_order_is_total() {
        let sample: Vec<SemanticVersion> = [
            "0.0.0",
            "1.0.0-rc.1",
            "1.0.0-rc.1+x",
            "1.0.0-rc",
            "1.0.0",
            "1.0.0+b",
            "1.0.0-1",
            "1.0.0-alpha.1",
            "0.9.12",
        ]
        .iter()
        .map(|s| v(s))
        .collect();

        for a in &sample {
            for b in &sample {
                assert_eq!(a.cmp(b), b.cmp(a).reverse(), "antisymmetry {} {}", a, b);
                assert_eq!(a.cmp(b) == Ordering::Equal, a == b);
                for c in &sample {
                    if a <= b && b <= c {
                        assert!(a <= c, "transitivity {} {} {}", a, b, c);
                    }
                }
            }
        }
    }

    #[test]
    fn test_version_serde_as_string() {
        let version = v("1.2.3-rc.2");
        let json = serde_json::to_string(&version).unwrap();
        assert_eq!(json, "\"1.2.3-rc.2\"");
        let back: SemanticVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, version);
        assert!(serde_json::from_str::<SemanticVersion>("\"nope\"").is_err());
    }

    #[test]
    fn test_version_default_is_zero() {
        assert_eq!(SemanticVersion::default().to_string(), "0.0.0");
    }
}
