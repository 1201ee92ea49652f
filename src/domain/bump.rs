use crate::domain::prerelease::Identifier;
use crate::domain::version::SemanticVersion;
use crate::error::{SemverStoreError, Result};
use std::fmt;

/// Label used for `Pre` bumps that do not name one
pub const DEFAULT_PRE_LABEL: &str = "rc";

/// Version bump rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bump {
    Major,
    Minor,
    Patch,
    /// Drop the pre-release, keeping major.minor.patch
    Final,
    /// Start or continue a pre-release line; `None` means `rc`
    Pre(Option<String>),
    /// Apply `base` (major, minor or patch), then open a `label.1` line on
    /// the result: `1.2.3` with minor and `rc` gives `1.3.0-rc.1`
    Staged { base: Box<Bump>, label: String },
}

impl Bump {
    /// Build a rule from textual parameters (`major`, `minor`, `patch`,
    /// `final`, `pre`) and an optional pre-release label
    ///
    /// A label without a kind means a `pre` bump; a label with `major`,
    /// `minor` or `patch` means [Bump::Staged].
    pub fn from_params(kind: Option<&str>, pre: Option<&str>) -> Result<Self> {
        let label = pre.filter(|p| !p.is_empty()).map(str::to_string);
        let kind = kind.filter(|k| !k.is_empty());

        let bump = match kind.map(str::to_lowercase).as_deref() {
            None | Some("pre") => {
                if kind.is_none() && label.is_none() {
                    return Err(SemverStoreError::config(
                        "bump rule is required (major, minor, patch, final or pre)",
                    ));
                }
                return Ok(Bump::Pre(label));
            }
            Some("major") => Bump::Major,
            Some("minor") => Bump::Minor,
            Some("patch") => Bump::Patch,
            Some("final") => Bump::Final,
            Some(other) => {
                return Err(SemverStoreError::config(format!(
                    "unknown bump rule: '{}'",
                    other
                )))
            }
        };

        match label {
            None => Ok(bump),
            Some(_) if bump == Bump::Final => Err(SemverStoreError::config(
                "a pre-release label cannot be combined with a 'final' bump",
            )),
            Some(label) => Ok(Bump::Staged {
                base: Box::new(bump),
                label,
            }),
        }
    }

    /// Apply this rule to `current`, producing the next version
    ///
    /// - **Major**: major += 1, minor = 0, patch = 0
    /// - **Minor**: minor += 1, patch = 0
    /// - **Patch**: patch += 1, or drop the pre-release if there is one
    /// - **Final**: drop the pre-release; fails on a final version
    /// - **Pre**: `1.0.0` -> `1.0.1-rc.1`, `1.0.1-rc.1` -> `1.0.1-rc.2`,
    ///   `1.0.1-alpha.3` -> `1.0.1-rc.1`
    /// - **Staged**: the base rule, then `-label.1`
    ///
    /// Build metadata never survives a bump. A component that would pass
    /// `u64::MAX` is an `InvalidVersion` error.
    pub fn apply(&self, current: &SemanticVersion) -> Result<SemanticVersion> {
        match self {
            Bump::Major => Ok(SemanticVersion::new(
                increment(current.major, "major", current)?,
                0,
                0,
            )),
            Bump::Minor => Ok(SemanticVersion::new(
                current.major,
                increment(current.minor, "minor", current)?,
                0,
            )),
            Bump::Patch => {
                if current.is_prerelease() {
                    Ok(current.finalized())
                } else {
                    Ok(SemanticVersion::new(
                        current.major,
                        current.minor,
                        increment(current.patch, "patch", current)?,
                    ))
                }
            }
            Bump::Final => {
                if current.is_prerelease() {
                    Ok(current.finalized())
                } else {
                    Err(SemverStoreError::NoPrereleaseToFinalize(current.to_string()))
                }
            }
            Bump::Pre(label) => {
                let label = Identifier::label(label.as_deref().unwrap_or(DEFAULT_PRE_LABEL))?;
                bump_pre(current, label)
            }
            Bump::Staged { base, label } => {
                let label = Identifier::label(label)?;
                let next = base.apply(current)?;
                Ok(next.with_pre(vec![label, Identifier::Numeric(1)]))
            }
        }
    }
}

fn increment(value: u64, component: &str, current: &SemanticVersion) -> Result<u64> {
    value.checked_add(1).ok_or_else(|| {
        SemverStoreError::version(format!("{} component of {} overflows", component, current))
    })
}

fn bump_pre(current: &SemanticVersion, label: Identifier) -> Result<SemanticVersion> {
    if !current.is_prerelease() {
        let patch = increment(current.patch, "patch", current)?;
        let next_patch = SemanticVersion::new(current.major, current.minor, patch);
        return Ok(next_patch.with_pre(vec![label, Identifier::Numeric(1)]));
    }

    if current.pre.first() != Some(&label) {
        return Ok(current.with_pre(vec![label, Identifier::Numeric(1)]));
    }

    let mut pre = current.pre.clone();
    let counted = pre.len() > 1;
    match pre.last_mut() {
        Some(Identifier::Numeric(n)) if counted => *n = increment(*n, "pre-release", current)?,
        _ => pre.push(Identifier::Numeric(1)),
    }
    Ok(current.with_pre(pre))
}

impl fmt::Display for Bump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bump::Major => write!(f, "major"),
            Bump::Minor => write!(f, "minor"),
            Bump::Patch => write!(f, "patch"),
            Bump::Final => write!(f, "final"),
            Bump::Pre(None) => write!(f, "pre"),
            Bump::Pre(Some(label)) => write!(f, "pre ({})", label),
            Bump::Staged { base, label } => write!(f, "{} ({})", base, label),
        }
    }
}
