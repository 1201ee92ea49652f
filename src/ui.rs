//! Output formatting for the command line.
//!
//! Machine-readable results go to stdout as JSON; status and error messages go
//! to stderr so they never mix with the JSON stream.

use crate::domain::SemanticVersion;
use console::style;
use serde::Serialize;

/// A version as it appears in JSON output: `{"number": "1.2.3"}`
#[derive(Debug, Serialize, PartialEq)]
pub struct VersionRef {
    pub number: String,
}

impl From<&SemanticVersion> for VersionRef {
    fn from(version: &SemanticVersion) -> Self {
        VersionRef {
            number: version.to_string(),
        }
    }
}

#[derive(Serialize)]
struct VersionResponse {
    version: VersionRef,
}

/// JSON list of versions, as printed by `check`
pub fn format_versions(versions: &[SemanticVersion]) -> serde_json::Result<String> {
    let refs: Vec<VersionRef> = versions.iter().map(VersionRef::from).collect();
    serde_json::to_string(&refs)
}

/// JSON object for a single written version, as printed by `bump` and `set`
pub fn format_version(version: &SemanticVersion) -> serde_json::Result<String> {
    serde_json::to_string(&VersionResponse {
        version: VersionRef::from(version),
    })
}

pub fn display_versions(versions: &[SemanticVersion]) -> serde_json::Result<()> {
    println!("{}", format_versions(versions)?);
    Ok(())
}

pub fn display_version(version: &SemanticVersion) -> serde_json::Result<()> {
    println!("{}", format_version(version)?);
    Ok(())
}

/// Format and print an error message in red.
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red().bold(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_versions() {
        let versions = vec![SemanticVersion::parse("1.2.3-rc.1").unwrap()];
        assert_eq!(
            format_versions(&versions).unwrap(),
            r#"[{"number":"1.2.3-rc.1"}]"#
        );
        assert_eq!(format_versions(&[]).unwrap(), "[]");
    }

    #[test]
    fn test_format_version() {
        assert_eq!(
            format_version(&SemanticVersion::new(2, 0, 0)).unwrap(),
            r#"{"version":{"number":"2.0.0"}}"#
        );
    }
}
