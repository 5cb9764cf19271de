//! Database schema definition and migrations
//!
//! The schema version lives in `PRAGMA user_version`. Each migration names
//! the version it leaves the store at; only migrations past the stored
//! version run, all inside one transaction.

use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// A versioned schema step
pub struct Migration {
    pub end_version: u32,
    pub description: &'static str,
    pub apply: fn(&Connection) -> rusqlite::Result<()>,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        end_version: 1,
        description: "artifact, pending artifact and symbol tables",
        apply: create_initial_tables,
    },
    Migration {
        end_version: 2,
        description: "track the artifactory an artifact was published to",
        apply: add_artifactory_id,
    },
];

const INITIAL_SCHEMA: &str = r#"
-- Artifact table: coordinates that were fetched and parsed
CREATE TABLE IF NOT EXISTS Artifact (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    groupId TEXT NOT NULL,
    artifactId TEXT NOT NULL,
    version TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_artifact_coordinates
    ON Artifact(groupId, artifactId, version);

-- Class records: one row per public class, nested names joined by '$'
CREATE TABLE IF NOT EXISTS ClassRecord (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pkg TEXT NOT NULL,
    name TEXT NOT NULL,
    artifactId INTEGER NOT NULL,
    FOREIGN KEY (artifactId) REFERENCES Artifact(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_class_record_artifact ON ClassRecord(artifactId);

-- Class lookup: lowercased name suffixes
CREATE TABLE IF NOT EXISTS ClassLookup (
    identifier TEXT NOT NULL,
    classId INTEGER NOT NULL,
    PRIMARY KEY (identifier, classId),
    FOREIGN KEY (classId) REFERENCES ClassRecord(id) ON DELETE CASCADE
) WITHOUT ROWID;
CREATE INDEX IF NOT EXISTS idx_class_lookup_class ON ClassLookup(classId);

-- Method records: receiver columns are NULL for top-level functions
CREATE TABLE IF NOT EXISTS MethodRecord (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    pkg TEXT NOT NULL,
    receiverPkg TEXT,
    receiverName TEXT,
    artifactId INTEGER NOT NULL,
    FOREIGN KEY (artifactId) REFERENCES Artifact(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_method_record_artifact ON MethodRecord(artifactId);

-- Method lookup: lowercased method names
CREATE TABLE IF NOT EXISTS MethodLookup (
    identifier TEXT NOT NULL,
    methodId INTEGER NOT NULL,
    PRIMARY KEY (identifier, methodId),
    FOREIGN KEY (methodId) REFERENCES MethodRecord(id) ON DELETE CASCADE
) WITHOUT ROWID;
CREATE INDEX IF NOT EXISTS idx_method_lookup_method ON MethodLookup(methodId);

-- Pending artifacts: coordinates queued for fetch and parse
CREATE TABLE IF NOT EXISTS PendingArtifact (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    groupId TEXT NOT NULL,
    artifactId TEXT NOT NULL,
    version TEXT NOT NULL,
    retries INTEGER NOT NULL DEFAULT 0,
    fetched INTEGER NOT NULL DEFAULT 0
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_pending_coordinates
    ON PendingArtifact(groupId, artifactId, version);
CREATE INDEX IF NOT EXISTS idx_pending_retries ON PendingArtifact(retries);
"#;

fn create_initial_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(INITIAL_SCHEMA)
}

fn add_artifactory_id(conn: &Connection) -> rusqlite::Result<()> {
    // existing rows all came from Google's repository (id 0)
    conn.execute_batch(
        r#"
        ALTER TABLE Artifact ADD COLUMN artifactoryId INTEGER NOT NULL DEFAULT 0;
        ALTER TABLE PendingArtifact ADD COLUMN artifactoryId INTEGER NOT NULL DEFAULT 0;
        UPDATE Artifact SET artifactoryId = 0;
        UPDATE PendingArtifact SET artifactoryId = 0;
        "#,
    )
}

/// Read the persisted schema version, 0 for a fresh store
pub fn schema_version(conn: &Connection) -> Result<u32> {
    let version: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(version)
}

/// Latest version known to this build
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.end_version).unwrap_or(0)
}

/// Bring the store up to the latest schema version.
///
/// Returns the number of migrations applied. Running it on an up-to-date
/// store applies nothing.
pub fn create_all_tables(conn: &Connection) -> Result<usize> {
    run_migrations(conn, MIGRATIONS)
}

pub(crate) fn run_migrations(conn: &Connection, migrations: &[Migration]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let current = schema_version(&tx)?;

    let pending: Vec<&Migration> = migrations
        .iter()
        .filter(|m| m.end_version > current)
        .collect();
    let Some(last) = pending.last().map(|m| m.end_version) else {
        return Ok(0);
    };

    for migration in &pending {
        info!(
            "Migrating schema to version {}: {}",
            migration.end_version, migration.description
        );
        (migration.apply)(&tx)?;
    }
    // PRAGMA does not take bound parameters
    tx.execute_batch(&format!("PRAGMA user_version = {}", last))?;
    tx.commit()?;

    Ok(pending.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("SELECT name FROM pragma_table_info('{}')", table))
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<String>>>()
            .unwrap()
    }

    #[test]
    fn test_fresh_store_migrates_to_latest() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 0);

        let applied = create_all_tables(&conn).unwrap();
        assert_eq!(applied, MIGRATIONS.len());
        assert_eq!(schema_version(&conn).unwrap(), latest_version());
        assert!(table_columns(&conn, "Artifact").contains(&"artifactoryId".to_string()));
        assert!(table_columns(&conn, "PendingArtifact").contains(&"artifactoryId".to_string()));
    }

    #[test]
    fn test_rerun_is_noop() {
        let conn = Connection::open_in_memory().unwrap();
        create_all_tables(&conn).unwrap();
        assert_eq!(create_all_tables(&conn).unwrap(), 0);
        assert_eq!(schema_version(&conn).unwrap(), latest_version());
    }

    #[test]
    fn test_partial_store_backfills_artifactory() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn, &MIGRATIONS[..1]).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 1);
        conn.execute(
            "INSERT INTO PendingArtifact (groupId, artifactId, version) VALUES ('g', 'a', '1.0.0')",
            [],
        )
        .unwrap();

        assert_eq!(create_all_tables(&conn).unwrap(), 1);
        let artifactory: i64 = conn
            .query_row("SELECT artifactoryId FROM PendingArtifact", [], |row| row.get(0))
            .unwrap();
        assert_eq!(artifactory, 0);
    }

    #[test]
    fn test_failed_migration_rolls_back() {
        fn broken(conn: &Connection) -> rusqlite::Result<()> {
            conn.execute_batch("CREATE TABLE Oops (id INTEGER); SELECT * FROM missing_table;")
        }
        let migrations = [
            Migration {
                end_version: 1,
                description: "initial",
                apply: create_initial_tables,
            },
            Migration {
                end_version: 2,
                description: "broken",
                apply: broken,
            },
        ];

        let conn = Connection::open_in_memory().unwrap();
        assert!(run_migrations(&conn, &migrations).is_err());
        assert_eq!(schema_version(&conn).unwrap(), 0);
        assert!(table_columns(&conn, "Artifact").is_empty());
    }
}
