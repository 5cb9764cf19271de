//! Hand-maintained list of artifacts to crawl outside Google's repository
//!
//! ```json
//! {
//!   "version": 1,
//!   "groups": [
//!     { "groupId": "com.squareup.okio", "artifactIds": ["okio"] },
//!     { "groupId": "androidx.room", "artifactIds": ["room-runtime"], "artifactory": "GOOGLE" }
//!   ]
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::FinderError;
use crate::fetch::ArtifactSource;
use crate::types::Artifactory;

/// Version of the document format this build understands
pub const LATEST_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalSourceSpec {
    #[serde(default = "latest_version")]
    pub version: u32,
    #[serde(default)]
    pub groups: Vec<ExternalGroupSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalGroupSpec {
    pub group_id: String,
    #[serde(default)]
    pub artifact_ids: Vec<String>,
    #[serde(default = "default_artifactory")]
    pub artifactory: Artifactory,
}

fn latest_version() -> u32 {
    LATEST_VERSION
}

fn default_artifactory() -> Artifactory {
    Artifactory::Maven
}

impl ExternalSourceSpec {
    /// Parse a spec document; every group must list at least one artifact
    pub fn parse(input: &str) -> Result<Self> {
        let spec: ExternalSourceSpec =
            serde_json::from_str(input).context("Failed to parse external source spec")?;
        if let Some(group) = spec.groups.iter().find(|g| g.artifact_ids.is_empty()) {
            return Err(FinderError::EmptyGroup(group.group_id.clone()).into());
        }
        Ok(spec)
    }

    pub fn is_supported(&self) -> bool {
        self.version == LATEST_VERSION
    }

    pub fn ensure_supported(&self) -> Result<(), FinderError> {
        if self.is_supported() {
            Ok(())
        } else {
            Err(FinderError::UnsupportedSpecVersion {
                found: self.version,
                latest: LATEST_VERSION,
            })
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// One source per listed artifact
    pub fn as_artifact_sources(&self) -> Vec<ArtifactSource> {
        self.groups
            .iter()
            .flat_map(|group| {
                group.artifact_ids.iter().map(move |artifact_id| ArtifactSource {
                    group_id: group.group_id.clone(),
                    artifact_id: artifact_id.clone(),
                    artifactory: group.artifactory,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_defaults() {
        let spec = ExternalSourceSpec::parse(
            r#"{"groups": [{"groupId": "com.squareup.okio", "artifactIds": ["okio", "okio-js"]}]}"#,
        )
        .unwrap();
        assert_eq!(spec.version, LATEST_VERSION);
        assert!(spec.is_supported());
        assert_eq!(spec.groups[0].artifactory, Artifactory::Maven);

        let sources = spec.as_artifact_sources();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1].artifact_id, "okio-js");
        assert_eq!(sources[1].group_id, "com.squareup.okio");
    }

    #[test]
    fn test_parse_explicit_artifactory() {
        let spec = ExternalSourceSpec::parse(
            r#"{"version": 1, "groups": [{"groupId": "androidx.room", "artifactIds": ["room-runtime"], "artifactory": "GOOGLE"}]}"#,
        )
        .unwrap();
        assert_eq!(spec.as_artifact_sources()[0].artifactory, Artifactory::Google);
    }

    #[test]
    fn test_empty_group_rejected() {
        let err = ExternalSourceSpec::parse(r#"{"groups": [{"groupId": "g"}]}"#).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FinderError>(),
            Some(FinderError::EmptyGroup(g)) if g == "g"
        ));
    }

    #[test]
    fn test_future_version_not_supported() {
        let spec = ExternalSourceSpec::parse(r#"{"version": 2}"#).unwrap();
        assert!(!spec.is_supported());
        assert!(matches!(
            spec.ensure_supported(),
            Err(FinderError::UnsupportedSpecVersion { found: 2, latest: 1 })
        ));
        assert!(spec.as_artifact_sources().is_empty());
    }

    #[test]
    fn test_json_roundtrip() {
        let spec = ExternalSourceSpec {
            version: 1,
            groups: vec![ExternalGroupSpec {
                group_id: "g".to_string(),
                artifact_ids: vec!["a".to_string()],
                artifactory: Artifactory::Google,
            }],
        };
        let json = spec.to_json().unwrap();
        assert!(json.contains("\"groupId\": \"g\""));
        assert!(json.contains("\"GOOGLE\""));
        assert_eq!(ExternalSourceSpec::parse(&json).unwrap(), spec);
    }
}
