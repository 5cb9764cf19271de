//! Store path utilities

use std::path::{Path, PathBuf};

use crate::FinderConfig;

const DB_DIR: &str = ".artifactfinder";
const DB_FILE: &str = "index.db";

/// Get the store path for a working directory
pub fn database_path(root: &Path) -> PathBuf {
    root.join(DB_DIR).join(DB_FILE)
}

/// Whether `config` points at a store that has already been created
pub fn database_exists(config: &FinderConfig) -> bool {
    config.in_memory || config.db_path.exists()
}

/// Apply a `--db <path>` override to the environment configuration
pub fn with_db_override(mut config: FinderConfig, db: Option<&str>) -> FinderConfig {
    if let Some(path) = db {
        config.db_path = PathBuf::from(path);
        config.in_memory = false;
    }
    config
}
