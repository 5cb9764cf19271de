//! Collaborators that talk to Maven repositories and read artifact binaries
//!
//! The crawler only depends on the [`MavenFetcher`] and [`CodeSourceParser`]
//! traits; HTTP access and bytecode parsing live behind them.

pub mod filters;

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{Artifactory, ParsedArtifactInfo};

/// Artifact ids published under one group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupIndex {
    pub group_id: String,
    pub artifact_ids: Vec<String>,
}

/// `maven-metadata.xml` content the crawler needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadata {
    pub group_id: String,
    pub artifact_id: String,
    pub versioning: Versioning,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioning {
    #[serde(default)]
    pub latest: Option<String>,
    #[serde(default)]
    pub release: Option<String>,
    pub versions: Vec<String>,
}

/// Container format of an artifact binary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactType {
    Jar,
    Aar,
}

impl ArtifactType {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactType::Jar => "jar",
            ArtifactType::Aar => "aar",
        }
    }
}

/// A downloaded artifact binary
#[derive(Clone, PartialEq, Eq)]
pub struct ArtifactBinary {
    pub kind: ArtifactType,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for ArtifactBinary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactBinary")
            .field("kind", &self.kind)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A group to crawl in a given repository
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupSource {
    pub group_id: String,
    pub artifactory: Artifactory,
}

/// An artifact to crawl in a given repository
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactSource {
    pub group_id: String,
    pub artifact_id: String,
    pub artifactory: Artifactory,
}

impl fmt::Display for ArtifactSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} ({})",
            self.group_id,
            self.artifact_id,
            self.artifactory.as_str()
        )
    }
}

/// Read access to one Maven repository.
///
/// Implementations own their timeouts; the crawler retries failed artifacts
/// on later fetch runs.
#[async_trait]
pub trait MavenFetcher: Send + Sync {
    /// Every group id the repository publishes
    async fn fetch_packages(&self) -> Result<Vec<String>>;

    async fn fetch_group_index(&self, group_id: &str) -> Result<GroupIndex>;

    async fn fetch_artifact_metadata(
        &self,
        group_id: &str,
        artifact_id: &str,
    ) -> Result<ArtifactMetadata>;

    /// Download the artifact binary, whichever container format it ships in
    async fn fetch_artifact(
        &self,
        group_id: &str,
        artifact_id: &str,
        version: &str,
    ) -> Result<ArtifactBinary>;
}

/// Extracts public classes and functions from an artifact binary.
///
/// Parsing is CPU bound and runs on the blocking thread pool.
pub trait CodeSourceParser: Send + Sync {
    fn parse(&self, binary: &ArtifactBinary) -> Result<ParsedArtifactInfo>;
}

/// One fetcher per repository
#[derive(Clone)]
pub struct Fetchers {
    pub google: Arc<dyn MavenFetcher>,
    pub maven: Arc<dyn MavenFetcher>,
}

impl Fetchers {
    pub fn get(&self, artifactory: Artifactory) -> &Arc<dyn MavenFetcher> {
        match artifactory {
            Artifactory::Google => &self.google,
            Artifactory::Maven => &self.maven,
        }
    }
}

/// Maven repository layout path of a group id
pub fn group_path(group_id: &str) -> String {
    group_id.replace('.', "/")
}

/// Repository URL of an artifact binary
pub fn artifact_url(
    artifactory: Artifactory,
    group_id: &str,
    artifact_id: &str,
    version: &str,
    kind: ArtifactType,
) -> String {
    format!(
        "{}{}/{}/{}/{}-{}.{}",
        artifactory.base_url(),
        group_path(group_id),
        artifact_id,
        version,
        artifact_id,
        version,
        kind.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_url() {
        assert_eq!(
            artifact_url(
                Artifactory::Google,
                "androidx.core",
                "core-ktx",
                "1.3.0",
                ArtifactType::Aar
            ),
            "https://dl.google.com/dl/android/maven2/androidx/core/core-ktx/1.3.0/core-ktx-1.3.0.aar"
        );
        assert_eq!(
            artifact_url(
                Artifactory::Maven,
                "com.squareup.okio",
                "okio",
                "2.4.0",
                ArtifactType::Jar
            ),
            "https://repo1.maven.org/maven2/com/squareup/okio/okio/2.4.0/okio-2.4.0.jar"
        );
    }

    #[test]
    fn test_metadata_deserializes() {
        let json = r#"{
            "groupId": "androidx.core",
            "artifactId": "core",
            "versioning": {"versions": ["1.0.0", "1.1.0-alpha01"]}
        }"#;
        let metadata: ArtifactMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.artifact_id, "core");
        assert_eq!(metadata.versioning.versions.len(), 2);
        assert_eq!(metadata.versioning.latest, None);
    }

    #[test]
    fn test_binary_debug_hides_bytes() {
        let binary = ArtifactBinary {
            kind: ArtifactType::Jar,
            bytes: vec![0; 1024],
        };
        assert_eq!(
            format!("{:?}", binary),
            "ArtifactBinary { kind: Jar, len: 1024 }"
        );
    }
}
