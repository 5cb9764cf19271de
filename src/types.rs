//! Core type definitions for artifactfinder
//!
//! Defines the records stored in the index and the values exchanged with the
//! fetch and parse collaborators:
//! - Artifacts: indexed and pending Maven coordinates
//! - Records: classes and top-level/extension methods found in an artifact
//! - Lookups: lowercased name suffixes pointing back at records
//! - Search records: query-time join of a record with its artifact

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::FinderError;
use crate::version::Version;

/// After this many dispatches a pending artifact is parked for good
pub const MAX_RETRIES: u32 = 20;

/// Maven repository an artifact is published to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Artifactory {
    Google,
    Maven,
}

impl Artifactory {
    /// Persisted id, stable across releases
    pub fn id(&self) -> i64 {
        match self {
            Artifactory::Google => 0,
            Artifactory::Maven => 1,
        }
    }

    pub fn from_id(id: i64) -> Result<Self, FinderError> {
        match id {
            0 => Ok(Artifactory::Google),
            1 => Ok(Artifactory::Maven),
            other => Err(FinderError::UnknownArtifactory(other)),
        }
    }

    /// Remote repository layout root
    pub fn base_url(&self) -> &'static str {
        match self {
            Artifactory::Google => "https://dl.google.com/dl/android/maven2/",
            Artifactory::Maven => "https://repo1.maven.org/maven2/",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Artifactory::Google => "google",
            Artifactory::Maven => "maven",
        }
    }
}

impl ToSql for Artifactory {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.id()))
    }
}

impl FromSql for Artifactory {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let id = value.as_i64()?;
        Artifactory::from_id(id).map_err(|_| FromSqlError::OutOfRange(id))
    }
}

/// An indexed artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub id: i64,
    pub group_id: String,
    pub artifact_id: String,
    pub version: Version,
    pub artifactory: Artifactory,
}

/// An artifact queued for fetch-and-parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingArtifact {
    pub id: i64,
    pub group_id: String,
    pub artifact_id: String,
    pub version: Version,
    pub retries: u32,
    pub fetched: bool,
    pub artifactory: Artifactory,
}

impl PendingArtifact {
    /// The artifact row this pending entry becomes once parsed; it keeps the pending id
    pub fn to_artifact(&self) -> Artifact {
        Artifact {
            id: self.id,
            group_id: self.group_id.clone(),
            artifact_id: self.artifact_id.clone(),
            version: self.version.clone(),
            artifactory: self.artifactory,
        }
    }
}

impl fmt::Display for PendingArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{} (#{}, retries {})",
            self.group_id, self.artifact_id, self.version, self.id, self.retries
        )
    }
}

/// `groupId:artifactId:version` as typed by a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coordinates {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Version,
}

impl FromStr for Coordinates {
    type Err = FinderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FinderError::InvalidCoordinates(s.to_string());
        let mut parts = s.trim().split(':');
        let (Some(group_id), Some(artifact_id), Some(version), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        if group_id.is_empty() || artifact_id.is_empty() {
            return Err(invalid());
        }
        let version = Version::parse(version).ok_or_else(invalid)?;
        Ok(Self {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version,
        })
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassRecord {
    pub id: i64,
    /// Dot separated
    pub pkg: String,
    /// `$` separated for nested classes
    pub name: String,
    pub artifact_id: i64,
}

/// Maps a lowercased name suffix to a class.
///
/// `Foo$Bar` is reachable through both `bar` and `foo$bar`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassLookup {
    pub identifier: String,
    pub class_id: i64,
}

/// A top-level function, or an extension function when it has a receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRecord {
    pub id: i64,
    pub pkg: String,
    pub name: String,
    pub receiver_pkg: Option<String>,
    pub receiver_name: Option<String>,
    pub artifact_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodLookup {
    pub identifier: String,
    pub method_id: i64,
}

/// Which methods a method search returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodSearchType {
    All,
    OnlyExtensions,
    OnlyGlobal,
}

impl MethodSearchType {
    /// `None` when neither kind of method is wanted
    pub fn from_flags(include_global: bool, include_extensions: bool) -> Option<Self> {
        match (include_global, include_extensions) {
            (true, true) => Some(MethodSearchType::All),
            (true, false) => Some(MethodSearchType::OnlyGlobal),
            (false, true) => Some(MethodSearchType::OnlyExtensions),
            (false, false) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchKind {
    Class,
    GlobalMethod,
    ExtensionMethod,
}

impl SearchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchKind::Class => "class",
            SearchKind::GlobalMethod => "global_method",
            SearchKind::ExtensionMethod => "extension_method",
        }
    }
}

/// A search hit joined with the artifact that provides it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchRecord {
    pub pkg: String,
    pub name: String,
    pub receiver_name: Option<String>,
    pub group_id: String,
    pub artifact_id: String,
    pub version: Version,
    pub kind: SearchKind,
}

impl SearchRecord {
    /// Name as a user would write it; extension methods are receiver-qualified
    pub fn display_name(&self) -> String {
        match self.receiver_name {
            Some(ref receiver) => format!("{}.{}", receiver, self.name),
            None => self.name.clone(),
        }
    }

    /// `groupId:artifactId`
    pub fn coordinates(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }
}

/// A search record with the rank it was given for one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoredRecord {
    #[serde(flatten)]
    pub record: SearchRecord,
    pub score: i32,
}

/// Class found by the parser
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedClassInfo {
    pub pkg: String,
    pub name: String,
}

/// Function found by the parser; no receiver means a top-level function
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedMethodInfo {
    pub pkg: String,
    pub name: String,
    pub receiver: Option<ParsedClassInfo>,
}

/// Public symbols extracted from one artifact binary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedArtifactInfo {
    pub classes: Vec<ParsedClassInfo>,
    pub methods: Vec<ParsedMethodInfo>,
}

/// Index statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexStats {
    pub artifacts: u64,
    pub pending_total: u64,
    pub pending_fetched: u64,
    /// Unfetched rows that hit the retry cap
    pub pending_parked: u64,
    pub classes: u64,
    pub methods: u64,
    pub db_size_bytes: u64,
}
