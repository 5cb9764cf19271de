//! Typed access to the artifact index tables
//!
//! [`ArtifactDao`] only reads. [`WritableArtifactDao`] adds the mutating
//! operations and is only handed out by a scope holding the writer permit.

use std::ops::Deref;

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::FinderError;
use crate::types::{
    Artifact, Artifactory, ClassLookup, ClassRecord, IndexStats, MethodLookup, MethodRecord,
    MethodSearchType, PendingArtifact, SearchKind, SearchRecord, MAX_RETRIES,
};
use crate::version::Version;

/// Read-only view of the index through one connection
pub struct ArtifactDao<'c> {
    conn: &'c Connection,
}

impl<'c> ArtifactDao<'c> {
    pub(crate) fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &'c Connection {
        self.conn
    }

    // =========================================================================
    // Artifact Operations
    // =========================================================================

    pub fn find_artifact(
        &self,
        group_id: &str,
        artifact_id: &str,
        version: &Version,
    ) -> Result<Option<Artifact>> {
        let result = self
            .conn
            .query_row(
                r#"
                SELECT id, groupId, artifactId, version, artifactoryId FROM Artifact
                WHERE groupId = ?1 AND artifactId = ?2 AND version = ?3
                "#,
                params![group_id, artifact_id, version],
                Self::row_to_artifact,
            )
            .optional()?;
        Ok(result)
    }

    pub fn get_artifact(&self, id: i64) -> Result<Option<Artifact>> {
        let result = self
            .conn
            .query_row(
                "SELECT id, groupId, artifactId, version, artifactoryId FROM Artifact WHERE id = ?1",
                params![id],
                Self::row_to_artifact,
            )
            .optional()?;
        Ok(result)
    }

    fn row_to_artifact(row: &rusqlite::Row) -> rusqlite::Result<Artifact> {
        Ok(Artifact {
            id: row.get(0)?,
            group_id: row.get(1)?,
            artifact_id: row.get(2)?,
            version: row.get(3)?,
            artifactory: row.get(4)?,
        })
    }

    // =========================================================================
    // Pending Artifact Operations
    // =========================================================================

    pub fn find_pending_artifact(
        &self,
        group_id: &str,
        artifact_id: &str,
        version: &Version,
    ) -> Result<Option<PendingArtifact>> {
        let result = self
            .conn
            .query_row(
                r#"
                SELECT id, groupId, artifactId, version, retries, fetched, artifactoryId
                FROM PendingArtifact
                WHERE groupId = ?1 AND artifactId = ?2 AND version = ?3
                "#,
                params![group_id, artifact_id, version],
                Self::row_to_pending,
            )
            .optional()?;
        Ok(result)
    }

    /// The most retried unfetched artifact that is not parked and not excluded
    pub fn find_next_pending_artifact(&self, exclude_ids: &[i64]) -> Result<Option<PendingArtifact>> {
        // ids are integers, safe to inline; -1 keeps the list non-empty
        let excluded = if exclude_ids.is_empty() {
            "-1".to_string()
        } else {
            exclude_ids
                .iter()
                .map(i64::to_string)
                .collect::<Vec<_>>()
                .join(",")
        };
        let sql = format!(
            r#"
            SELECT id, groupId, artifactId, version, retries, fetched, artifactoryId
            FROM PendingArtifact
            WHERE fetched = 0 AND retries < ?1 AND id NOT IN ({})
            ORDER BY retries DESC
            LIMIT 1
            "#,
            excluded
        );
        let result = self
            .conn
            .query_row(&sql, params![MAX_RETRIES], Self::row_to_pending)
            .optional()?;
        Ok(result)
    }

    fn row_to_pending(row: &rusqlite::Row) -> rusqlite::Result<PendingArtifact> {
        Ok(PendingArtifact {
            id: row.get(0)?,
            group_id: row.get(1)?,
            artifact_id: row.get(2)?,
            version: row.get(3)?,
            retries: row.get(4)?,
            fetched: row.get(5)?,
            artifactory: row.get(6)?,
        })
    }

    // =========================================================================
    // Search Operations
    // =========================================================================

    /// Classes with a lookup identifier starting with `prefix`.
    ///
    /// Identifiers are stored lowercased; `prefix` must be lowercased by the caller.
    pub fn search_classes(&self, prefix: &str) -> Result<Vec<SearchRecord>> {
        let mut stmt = self.conn.prepare(SEARCH_CLASSES_SQL)?;
        let rows = stmt.query_map(params![prefix_pattern(prefix)], |row| {
            Ok(SearchRecord {
                pkg: row.get(1)?,
                name: row.get(2)?,
                receiver_name: None,
                group_id: row.get(3)?,
                artifact_id: row.get(4)?,
                version: row.get(5)?,
                kind: SearchKind::Class,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Methods with a lookup identifier starting with `prefix`, filtered by receiver
    pub fn search_methods(
        &self,
        prefix: &str,
        search_type: MethodSearchType,
    ) -> Result<Vec<SearchRecord>> {
        let mut stmt = self.conn.prepare(&search_methods_sql(search_type))?;
        let rows = stmt.query_map(params![prefix_pattern(prefix)], |row| {
            let receiver_name: Option<String> = row.get(3)?;
            let kind = if receiver_name.is_some() {
                SearchKind::ExtensionMethod
            } else {
                SearchKind::GlobalMethod
            };
            Ok(SearchRecord {
                pkg: row.get(1)?,
                name: row.get(2)?,
                receiver_name,
                group_id: row.get(4)?,
                artifact_id: row.get(5)?,
                version: row.get(6)?,
                kind,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    pub fn class_lookups(&self, class_id: i64) -> Result<Vec<ClassLookup>> {
        let mut stmt = self.conn.prepare(
            "SELECT identifier, classId FROM ClassLookup WHERE classId = ?1 ORDER BY identifier",
        )?;
        let rows = stmt.query_map(params![class_id], |row| {
            Ok(ClassLookup {
                identifier: row.get(0)?,
                class_id: row.get(1)?,
            })
        })?;

        let mut lookups = Vec::new();
        for row in rows {
            lookups.push(row?);
        }
        Ok(lookups)
    }

    pub fn class_records(&self, artifact_id: i64) -> Result<Vec<ClassRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, pkg, name, artifactId FROM ClassRecord WHERE artifactId = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![artifact_id], |row| {
            Ok(ClassRecord {
                id: row.get(0)?,
                pkg: row.get(1)?,
                name: row.get(2)?,
                artifact_id: row.get(3)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    pub fn stats(&self) -> Result<IndexStats> {
        let count = |sql: &str| -> Result<u64> {
            let n: u64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n)
        };

        let artifacts = count("SELECT COUNT(*) FROM Artifact")?;
        let pending_total = count("SELECT COUNT(*) FROM PendingArtifact")?;
        let pending_fetched = count("SELECT COUNT(*) FROM PendingArtifact WHERE fetched = 1")?;
        let pending_parked: u64 = self.conn.query_row(
            "SELECT COUNT(*) FROM PendingArtifact WHERE fetched = 0 AND retries >= ?1",
            params![MAX_RETRIES],
            |row| row.get(0),
        )?;
        let classes = count("SELECT COUNT(*) FROM ClassRecord")?;
        let methods = count("SELECT COUNT(*) FROM MethodRecord")?;

        let db_size_bytes = count(
            "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
        )?;

        Ok(IndexStats {
            artifacts,
            pending_total,
            pending_fetched,
            pending_parked,
            classes,
            methods,
            db_size_bytes,
        })
    }
}

/// The dao handed to a scope that holds the writer permit
pub struct WritableArtifactDao<'c> {
    dao: ArtifactDao<'c>,
}

impl<'c> Deref for WritableArtifactDao<'c> {
    type Target = ArtifactDao<'c>;

    fn deref(&self) -> &Self::Target {
        &self.dao
    }
}

impl<'c> WritableArtifactDao<'c> {
    pub(crate) fn new(conn: &'c Connection) -> Self {
        Self {
            dao: ArtifactDao::new(conn),
        }
    }

    /// Run `f` in a transaction, or inside the caller's if one is open
    pub fn with_transaction<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Self) -> Result<R>,
    {
        let conn = self.connection();
        if !conn.is_autocommit() {
            return f(self);
        }
        let tx = conn.unchecked_transaction()?;
        let result = f(self)?;
        tx.commit()?;
        Ok(result)
    }

    // =========================================================================
    // Artifact Operations
    // =========================================================================

    /// Insert an artifact, keeping its id unless it is 0; returns the row id
    pub fn insert_artifact(&self, artifact: &Artifact) -> Result<i64> {
        let conn = self.connection();
        conn.execute(
            r#"
            INSERT INTO Artifact (id, groupId, artifactId, version, artifactoryId)
            VALUES (nullif(?1, 0), ?2, ?3, ?4, ?5)
            "#,
            params![
                artifact.id,
                artifact.group_id,
                artifact.artifact_id,
                artifact.version,
                artifact.artifactory,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Delete an artifact with all its records and lookups; returns whether it existed
    pub fn delete_artifact(&self, id: i64) -> Result<bool> {
        if id < 0 {
            return Err(FinderError::InvalidId(id).into());
        }
        let deleted = self
            .connection()
            .execute("DELETE FROM Artifact WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    // =========================================================================
    // Pending Artifact Operations
    // =========================================================================

    /// Queue an artifact; false if it was already queued
    pub fn insert_pending_artifact(
        &self,
        group_id: &str,
        artifact_id: &str,
        version: &Version,
        artifactory: Artifactory,
    ) -> Result<bool> {
        let inserted = self.connection().execute(
            r#"
            INSERT OR IGNORE INTO PendingArtifact (groupId, artifactId, version, artifactoryId)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![group_id, artifact_id, version, artifactory],
        )?;
        Ok(inserted > 0)
    }

    pub fn increment_pending_artifact_retry(&self, id: i64) -> Result<()> {
        self.connection().execute(
            "UPDATE PendingArtifact SET retries = retries + 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    pub fn mark_pending_artifact_fetched(&self, id: i64) -> Result<()> {
        self.connection().execute(
            "UPDATE PendingArtifact SET fetched = 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    // =========================================================================
    // Record Operations
    // =========================================================================

    pub fn insert_class_record(&self, record: &ClassRecord) -> Result<i64> {
        let conn = self.connection();
        conn.execute(
            "INSERT INTO ClassRecord (id, pkg, name, artifactId) VALUES (nullif(?1, 0), ?2, ?3, ?4)",
            params![record.id, record.pkg, record.name, record.artifact_id],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_class_lookup(&self, lookup: &ClassLookup) -> Result<()> {
        self.connection().execute(
            "INSERT OR REPLACE INTO ClassLookup (identifier, classId) VALUES (?1, ?2)",
            params![lookup.identifier, lookup.class_id],
        )?;
        Ok(())
    }

    /// Delete a class record and its lookups; returns whether it existed
    pub fn delete_class_record(&self, id: i64) -> Result<bool> {
        if id < 0 {
            return Err(FinderError::InvalidId(id).into());
        }
        let deleted = self
            .connection()
            .execute("DELETE FROM ClassRecord WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    pub fn insert_method_record(&self, record: &MethodRecord) -> Result<i64> {
        let conn = self.connection();
        conn.execute(
            r#"
            INSERT INTO MethodRecord (id, name, pkg, receiverPkg, receiverName, artifactId)
            VALUES (nullif(?1, 0), ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.id,
                record.name,
                record.pkg,
                record.receiver_pkg,
                record.receiver_name,
                record.artifact_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_method_lookup(&self, lookup: &MethodLookup) -> Result<()> {
        self.connection().execute(
            "INSERT OR REPLACE INTO MethodLookup (identifier, methodId) VALUES (?1, ?2)",
            params![lookup.identifier, lookup.method_id],
        )?;
        Ok(())
    }
}

// The LIKE pattern must stay a bare bound parameter: SQLite only turns a
// prefix LIKE into a range scan of the lookup primary key when the pattern
// is a literal or parameter, never an expression.
const SEARCH_CLASSES_SQL: &str = r#"
    SELECT DISTINCT ClassRecord.id, ClassRecord.pkg, ClassRecord.name,
           Artifact.groupId, Artifact.artifactId, Artifact.version
    FROM ClassLookup
    JOIN ClassRecord ON ClassRecord.id = ClassLookup.classId
    JOIN Artifact ON Artifact.id = ClassRecord.artifactId
    WHERE ClassLookup.identifier LIKE ?1 ESCAPE '\'
"#;

fn search_methods_sql(search_type: MethodSearchType) -> String {
    let receiver_filter = match search_type {
        MethodSearchType::All => "1",
        MethodSearchType::OnlyExtensions => "MethodRecord.receiverName IS NOT NULL",
        MethodSearchType::OnlyGlobal => "MethodRecord.receiverName IS NULL",
    };
    format!(
        r#"
        SELECT DISTINCT MethodRecord.id, MethodRecord.pkg, MethodRecord.name,
               MethodRecord.receiverName,
               Artifact.groupId, Artifact.artifactId, Artifact.version
        FROM MethodLookup
        JOIN MethodRecord ON MethodRecord.id = MethodLookup.methodId
        JOIN Artifact ON Artifact.id = MethodRecord.artifactId
        WHERE MethodLookup.identifier LIKE ?1 ESCAPE '\' AND {}
        "#,
        receiver_filter
    )
}

/// LIKE pattern matching identifiers that start with `prefix`
fn prefix_pattern(prefix: &str) -> String {
    format!("{}%", escape_like(prefix))
}

/// Escape LIKE wildcards so `prefix` matches literally
fn escape_like(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
