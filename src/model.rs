//! Model facade over the artifact index
//!
//! Everything the crawler and the query endpoints need goes through here:
//! - Queueing and dispatching pending artifacts
//! - Saving parsed artifacts with their symbol lookups in one transaction
//! - Ranked symbol search

use std::path::Path;

use anyhow::Result;
use tracing::{debug, info};

use crate::db::{ArtifactFinderDb, WritableArtifactDao};
use crate::ranking;
use crate::types::{
    Artifactory, ClassLookup, ClassRecord, IndexStats, MethodLookup, MethodRecord,
    MethodSearchType, ParsedArtifactInfo, PendingArtifact, ScoredRecord,
};
use crate::version::Version;

/// What to search for and which kinds of symbols to include
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    pub query: String,
    pub include_classes: bool,
    pub include_extension_methods: bool,
    pub include_global_methods: bool,
}

impl SearchParams {
    /// Class-only search for `query`
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            include_classes: true,
            include_extension_methods: false,
            include_global_methods: false,
        }
    }

    pub fn classes(mut self, include: bool) -> Self {
        self.include_classes = include;
        self
    }

    pub fn extension_methods(mut self, include: bool) -> Self {
        self.include_extension_methods = include;
        self
    }

    pub fn global_methods(mut self, include: bool) -> Self {
        self.include_global_methods = include;
        self
    }
}

#[derive(Clone)]
pub struct ArtifactFinderModel {
    db: ArtifactFinderDb,
}

impl ArtifactFinderModel {
    pub fn new(db: ArtifactFinderDb) -> Self {
        Self { db }
    }

    pub async fn open<P: AsRef<Path>>(path: P, pool_limit: usize) -> Result<Self> {
        Ok(Self::new(ArtifactFinderDb::open(path, pool_limit).await?))
    }

    pub async fn in_memory() -> Result<Self> {
        Ok(Self::new(ArtifactFinderDb::in_memory().await?))
    }

    pub fn db(&self) -> &ArtifactFinderDb {
        &self.db
    }

    // =========================================================================
    // Crawl Operations
    // =========================================================================

    /// Queue an artifact for fetching; false if it is already queued
    pub async fn add_pending_artifact(
        &self,
        group_id: &str,
        artifact_id: &str,
        version: &Version,
        artifactory: Artifactory,
    ) -> Result<bool> {
        self.db
            .write(|dao| dao.insert_pending_artifact(group_id, artifact_id, version, artifactory))
            .await
    }

    pub async fn find_pending_artifact(
        &self,
        group_id: &str,
        artifact_id: &str,
        version: &Version,
    ) -> Result<Option<PendingArtifact>> {
        self.db
            .read(|dao| dao.find_pending_artifact(group_id, artifact_id, version))
            .await
    }

    pub async fn find_next_pending_artifact(
        &self,
        exclude_ids: &[i64],
    ) -> Result<Option<PendingArtifact>> {
        self.db
            .read(|dao| dao.find_next_pending_artifact(exclude_ids))
            .await
    }

    pub async fn increment_pending_artifact_retry(&self, id: i64) -> Result<()> {
        self.db
            .write(|dao| dao.increment_pending_artifact_retry(id))
            .await
    }

    /// Select the next pending artifact and count the dispatch against its retries.
    ///
    /// Both steps happen under the writer permit, so no other scope can pick
    /// the same row in between. The returned row shows the retry count from
    /// before the increment.
    pub async fn dispatch_next_pending_artifact(
        &self,
        exclude_ids: &[i64],
    ) -> Result<Option<PendingArtifact>> {
        let mut scope = self.db.scope().await?;
        scope
            .write(|dao| {
                let next = dao.find_next_pending_artifact(exclude_ids)?;
                if let Some(ref pending) = next {
                    dao.increment_pending_artifact_retry(pending.id)?;
                }
                Ok(next)
            })
            .await
    }

    /// Store the symbols of a parsed artifact and mark its pending row fetched.
    ///
    /// Returns false when the artifact was already indexed; nothing is
    /// inserted in that case, but the pending row is still marked fetched.
    pub async fn save_parsed_artifact(
        &self,
        pending: &PendingArtifact,
        info: &ParsedArtifactInfo,
    ) -> Result<bool> {
        let indexed = self
            .db
            .write(|dao| dao.with_transaction(|dao| save_parsed(dao, pending, info)))
            .await?;
        if indexed {
            debug!(
                "Indexed {} with {} classes and {} methods",
                pending,
                info.classes.len(),
                info.methods.len()
            );
        } else {
            debug!("{} was already indexed", pending);
        }
        Ok(indexed)
    }

    /// Delete an indexed artifact and everything found in it
    pub async fn delete_artifact(&self, id: i64) -> Result<bool> {
        self.db.write(|dao| dao.delete_artifact(id)).await
    }

    // =========================================================================
    // Query Operations
    // =========================================================================

    /// Search for classes and methods whose name starts with the query.
    ///
    /// `.` in the query is read as a nested class separator, so `Outer.Inner`
    /// finds `Outer$Inner`. Results come back ranked best first.
    pub async fn search(&self, params: &SearchParams) -> Result<Vec<ScoredRecord>> {
        let query = params.query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let normalized = query.replace('.', "$");
        let lookup = normalized.to_lowercase();
        let method_search = MethodSearchType::from_flags(
            params.include_global_methods,
            params.include_extension_methods,
        );

        let records = self
            .db
            .read(|dao| {
                let mut records = Vec::new();
                if params.include_classes {
                    records.extend(dao.search_classes(&lookup)?);
                }
                if let Some(search_type) = method_search {
                    records.extend(dao.search_methods(&lookup, search_type)?);
                }
                Ok(records)
            })
            .await?;

        Ok(ranking::sort(&normalized, records))
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        self.db.read(|dao| dao.stats()).await
    }

    /// Checkpoint the write-ahead log into the main store file
    pub async fn sync(&self) -> Result<()> {
        self.db
            .write(|dao| {
                dao.connection()
                    .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
                Ok(())
            })
            .await?;
        info!("Checkpointed artifact index");
        Ok(())
    }
}

fn save_parsed(
    dao: &WritableArtifactDao<'_>,
    pending: &PendingArtifact,
    info: &ParsedArtifactInfo,
) -> Result<bool> {
    let existing = dao.find_artifact(&pending.group_id, &pending.artifact_id, &pending.version)?;
    let indexed = existing.is_none();

    if indexed {
        let artifact_id = dao.insert_artifact(&pending.to_artifact())?;

        for class in &info.classes {
            let class_id = dao.insert_class_record(&ClassRecord {
                id: 0,
                pkg: class.pkg.clone(),
                name: class.name.clone(),
                artifact_id,
            })?;
            for identifier in class_lookup_identifiers(&class.name) {
                dao.insert_class_lookup(&ClassLookup {
                    identifier,
                    class_id,
                })?;
            }
        }

        for method in &info.methods {
            let method_id = dao.insert_method_record(&MethodRecord {
                id: 0,
                pkg: method.pkg.clone(),
                name: method.name.clone(),
                receiver_pkg: method.receiver.as_ref().map(|r| r.pkg.clone()),
                receiver_name: method.receiver.as_ref().map(|r| r.name.clone()),
                artifact_id,
            })?;
            dao.insert_method_lookup(&MethodLookup {
                identifier: method.name.to_lowercase(),
                method_id,
            })?;
        }
    }

    dao.mark_pending_artifact_fetched(pending.id)?;
    Ok(indexed)
}

/// Lowercased `$`-suffixes of a class name, innermost first.
///
/// `Outer$Mid$Inner` yields `inner`, `mid$inner` and `outer$mid$inner`.
pub fn class_lookup_identifiers(name: &str) -> Vec<String> {
    let pieces: Vec<&str> = name.split('$').collect();
    (0..pieces.len())
        .map(|i| pieces[pieces.len() - 1 - i..].join("$").to_lowercase())
        .collect()
}
