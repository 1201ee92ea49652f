//! Pre-release and build identifiers for semantic versioning
//!
//! According to semver.org: https://semver.org/#spec-item-9 and
//! https://semver.org/#spec-item-11

use crate::error::{SemverStoreError, Result};
use std::fmt;

/// A single dot-separated pre-release identifier
///
/// Variant order matters: the derived `Ord` puts every numeric identifier
/// before every alphanumeric one, numerics compare by value and
/// alphanumerics compare by ASCII.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Identifier {
    /// Identifier made of digits only, e.g. the `1` in `rc.1`
    Numeric(u64),
    /// Identifier with at least one non-digit, e.g. `rc` or `beta-2`
    AlphaNumeric(String),
}

impl Identifier {
    /// Classify an already-validated identifier
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(SemverStoreError::version("Empty pre-release identifier"));
        }

        if s.bytes().all(|b| b.is_ascii_digit()) {
            let n = s.parse::<u64>().map_err(|_| {
                SemverStoreError::version(format!("Pre-release identifier out of range: '{}'", s))
            })?;
            return Ok(Identifier::Numeric(n));
        }

        if s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            Ok(Identifier::AlphaNumeric(s.to_string()))
        } else {
            Err(SemverStoreError::version(format!(
                "Invalid pre-release identifier: '{}'",
                s
            )))
        }
    }

    /// Validate a label used to start a pre-release line (`rc`, `alpha`, ...)
    ///
    /// Labels must be alphanumeric identifiers; a purely numeric label would
    /// be indistinguishable from the iteration counter.
    pub fn label(s: &str) -> Result<Self> {
        match Identifier::parse(s)? {
            Identifier::AlphaNumeric(label) => Ok(Identifier::AlphaNumeric(label)),
            Identifier::Numeric(_) => Err(SemverStoreError::version(format!(
                "Pre-release label must not be numeric: '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Numeric(n) => write!(f, "{}", n),
            Identifier::AlphaNumeric(s) => write!(f, "{}", s),
        }
    }
}

/// Split a dotted identifier list (`rc.1`) into identifiers
pub fn parse_identifiers(s: &str) -> Result<Vec<Identifier>> {
    if s.is_empty() {
        return Ok(Vec::new());
    }
    s.split('.').map(Identifier::parse).collect()
}

/// Join identifiers back into their dotted form
pub fn join<T: fmt::Display>(parts: &[T]) -> String {
    parts
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(".")
}
