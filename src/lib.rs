//! artifactfinder: find the Maven artifact that provides a class or function
//!
//! Crawls Maven repositories into a SQLite index of the public classes and
//! Kotlin functions each artifact version declares, and answers ranked
//! "which dependency do I need for `Foo`?" queries.
//!
//! ## Features
//!
//! - Bounded connection pool with a single-writer coordinator over SQLite
//! - Versioned schema with in-place migrations
//! - Version selection that keeps the newest release and pre-releases of each line
//! - Prefix search over classes, nested classes and extension functions
//! - Concurrent crawl with per-artifact retry accounting
//!
//! ## Surfaces
//!
//! - `GET /search` - JSON query endpoint
//! - `artifactfinder_search` / `artifactfinder_artifact` / `artifactfinder_status` - MCP tools

pub mod cli;
pub mod db;
pub mod error;
pub mod external;
pub mod fetch;
pub mod finder;
pub mod mcp;
pub mod model;
pub mod ranking;
pub mod selector;
pub mod types;
pub mod version;
pub mod web;
pub mod worker;

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

pub use error::FinderError;
pub use finder::ArtifactFinder;
pub use model::{ArtifactFinderModel, SearchParams};

/// Where the index lives and how hard it may be driven
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinderConfig {
    /// Store file; ignored when `in_memory` is set
    pub db_path: PathBuf,
    pub in_memory: bool,
    /// Pooled connections for a file store
    pub pool_limit: usize,
    /// Concurrent crawl jobs
    pub workers: usize,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            db_path: cli::database_path(Path::new("")),
            in_memory: false,
            pool_limit: db::DEFAULT_POOL_LIMIT,
            workers: finder::DEFAULT_FETCH_WORKERS,
        }
    }
}

impl FinderConfig {
    /// Defaults overridden by `ARTIFACTFINDER_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = lookup("ARTIFACTFINDER_DB") {
            config.db_path = PathBuf::from(path);
        }
        config.in_memory = lookup("ARTIFACTFINDER_IN_MEMORY").map_or(false, |v| v == "1");
        if let Some(limit) = lookup("ARTIFACTFINDER_POOL_LIMIT") {
            config.pool_limit = limit
                .parse()
                .with_context(|| format!("Invalid ARTIFACTFINDER_POOL_LIMIT '{}'", limit))?;
        }
        if let Some(workers) = lookup("ARTIFACTFINDER_WORKERS") {
            config.workers = workers
                .parse()
                .with_context(|| format!("Invalid ARTIFACTFINDER_WORKERS '{}'", workers))?;
        }

        Ok(config)
    }

    /// Open the configured store, creating and migrating it as needed
    pub async fn open_model(&self) -> Result<ArtifactFinderModel> {
        if self.in_memory {
            info!("Using in-memory index (no filesystem writes)");
            return ArtifactFinderModel::in_memory().await;
        }
        info!("Opening index at {}", self.db_path.display());
        ArtifactFinderModel::open(&self.db_path, self.pool_limit).await
    }

    /// Crawler over `model` running the configured number of workers
    pub fn finder(
        &self,
        model: ArtifactFinderModel,
        fetchers: fetch::Fetchers,
        parser: Arc<dyn fetch::CodeSourceParser>,
    ) -> ArtifactFinder {
        ArtifactFinder::new(model, fetchers, parser).with_workers(self.workers)
    }
}
