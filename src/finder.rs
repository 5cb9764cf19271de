//! Crawler driving the index
//!
//! Crawling runs in two passes. The index pass walks repository groups and
//! artifact metadata and queues the versions worth indexing as pending
//! artifacts. The fetch pass drains pending artifacts, downloads and parses
//! each one, and saves the symbols it finds.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::stream;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::external::ExternalSourceSpec;
use crate::fetch::filters;
use crate::fetch::{
    artifact_url, ArtifactSource, CodeSourceParser, Fetchers, GroupSource, MavenFetcher,
};
use crate::model::ArtifactFinderModel;
use crate::selector::select_versions;
use crate::types::{Artifactory, ParsedArtifactInfo, PendingArtifact};
use crate::version::Version;
use crate::worker::{distribute_jobs_until, distribute_list};

/// Default number of concurrent artifact downloads
pub const DEFAULT_FETCH_WORKERS: usize = 5;

/// Outcome of one fetch pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FetchSummary {
    /// Pending artifacts handed to a worker
    pub dispatched: usize,
    /// Artifacts fetched, parsed and saved
    pub saved: usize,
    /// Saved artifacts that were not indexed before
    pub indexed: usize,
}

pub struct ArtifactFinder {
    model: ArtifactFinderModel,
    fetchers: Fetchers,
    parser: Arc<dyn CodeSourceParser>,
    workers: usize,
}

impl ArtifactFinder {
    pub fn new(
        model: ArtifactFinderModel,
        fetchers: Fetchers,
        parser: Arc<dyn CodeSourceParser>,
    ) -> Self {
        Self {
            model,
            fetchers,
            parser,
            workers: DEFAULT_FETCH_WORKERS,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn model(&self) -> &ArtifactFinderModel {
        &self.model
    }

    // =========================================================================
    // Index Pass
    // =========================================================================

    /// Queue the selected versions of everything in Google's Maven repository.
    ///
    /// Returns the number of newly queued pending artifacts.
    pub async fn index_gmaven(&self) -> Result<usize> {
        let packages = self.fetchers.google.fetch_packages().await?;
        let groups: Vec<GroupSource> = packages
            .into_iter()
            .filter(|pkg| filters::should_parse_package(pkg))
            .map(|group_id| GroupSource {
                group_id,
                artifactory: Artifactory::Google,
            })
            .collect();
        info!("Indexing {} Google Maven groups", groups.len());
        self.index_group_sources(groups).await
    }

    /// Queue the artifacts listed in an external source spec
    pub async fn index_external(&self, spec: &ExternalSourceSpec) -> Result<usize> {
        if let Err(e) = spec.ensure_supported() {
            warn!("Skipping external sources: {}", e);
            return Ok(0);
        }
        self.index_artifact_sources(spec.as_artifact_sources()).await
    }

    pub async fn index_group_sources(&self, groups: Vec<GroupSource>) -> Result<usize> {
        let fetchers = self.fetchers.clone();
        let indices = distribute_list(groups, None, move |group: GroupSource| {
            let fetcher = Arc::clone(fetchers.get(group.artifactory));
            async move {
                debug!("Fetching group index for {}", group.group_id);
                let index = fetcher.fetch_group_index(&group.group_id).await?;
                Ok::<_, anyhow::Error>((group.artifactory, index))
            }
        })
        .await;

        let sources: Vec<ArtifactSource> = indices
            .into_iter()
            .flat_map(|(artifactory, index)| {
                let group_id = index.group_id;
                index
                    .artifact_ids
                    .into_iter()
                    .filter(|artifact_id| filters::should_parse_artifact(&group_id, artifact_id))
                    .map(|artifact_id| ArtifactSource {
                        group_id: group_id.clone(),
                        artifact_id,
                        artifactory,
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        info!("Found {} artifacts to index", sources.len());
        self.index_artifact_sources(sources).await
    }

    /// Fetch metadata for each source and queue its selected versions
    pub async fn index_artifact_sources(&self, sources: Vec<ArtifactSource>) -> Result<usize> {
        let fetchers = self.fetchers.clone();
        let model = self.model.clone();
        let queued = distribute_list(sources, None, move |source: ArtifactSource| {
            let fetcher = Arc::clone(fetchers.get(source.artifactory));
            let model = model.clone();
            async move {
                let metadata = fetcher
                    .fetch_artifact_metadata(&source.group_id, &source.artifact_id)
                    .await?;
                let versions: Vec<Version> = metadata
                    .versioning
                    .versions
                    .iter()
                    .filter_map(|v| Version::parse(v))
                    .collect();
                let selected = select_versions(&versions);
                debug!("Selected {} versions of {}", selected.len(), source);

                let mut added: usize = 0;
                for version in &selected {
                    let is_new = model
                        .add_pending_artifact(
                            &metadata.group_id,
                            &metadata.artifact_id,
                            version,
                            source.artifactory,
                        )
                        .await?;
                    if is_new {
                        added += 1;
                    }
                }
                Ok::<_, anyhow::Error>(added)
            }
        })
        .await;

        let total: usize = queued.iter().sum();
        info!("Queued {} pending artifacts", total);
        self.model.sync().await?;
        Ok(total)
    }

    // =========================================================================
    // Fetch Pass
    // =========================================================================

    /// Drain the pending artifacts until none is left to dispatch
    pub async fn fetch_artifacts(&self) -> Result<FetchSummary> {
        self.fetch_artifacts_until(CancellationToken::new()).await
    }

    /// Like [`ArtifactFinder::fetch_artifacts`], stopping dispatch once `cancel` fires
    pub async fn fetch_artifacts_until(&self, cancel: CancellationToken) -> Result<FetchSummary> {
        let dispatched = Arc::new(AtomicUsize::new(0));
        let source = pending_source(self.model.clone(), Arc::clone(&dispatched));

        let fetchers = self.fetchers.clone();
        let parser = Arc::clone(&self.parser);
        let model = self.model.clone();
        let results = distribute_jobs_until(
            source,
            self.workers,
            move |pending: PendingArtifact| {
                let fetcher = Arc::clone(fetchers.get(pending.artifactory));
                let parser = Arc::clone(&parser);
                let model = model.clone();
                async move {
                    let parsed = fetch_parsed(fetcher, parser, &pending).await?;
                    model.save_parsed_artifact(&pending, &parsed).await
                }
            },
            cancel,
        )
        .await;

        let summary = FetchSummary {
            dispatched: dispatched.load(Ordering::SeqCst),
            saved: results.len(),
            indexed: results.iter().filter(|indexed| **indexed).count(),
        };
        info!(
            "Fetch pass done: {} dispatched, {} saved, {} newly indexed",
            summary.dispatched, summary.saved, summary.indexed
        );
        self.model.sync().await?;
        Ok(summary)
    }
}

/// Download one pending artifact and parse its binary
async fn fetch_parsed(
    fetcher: Arc<dyn MavenFetcher>,
    parser: Arc<dyn CodeSourceParser>,
    pending: &PendingArtifact,
) -> Result<ParsedArtifactInfo> {
    debug!("Fetching {}", pending);
    let version = pending.version.to_string();
    let binary = fetcher
        .fetch_artifact(&pending.group_id, &pending.artifact_id, &version)
        .await?;

    let url = artifact_url(
        pending.artifactory,
        &pending.group_id,
        &pending.artifact_id,
        &version,
        binary.kind,
    );
    debug!("Parsing {} ({} bytes)", url, binary.bytes.len());
    let parsed = tokio::task::spawn_blocking(move || parser.parse(&binary))
        .await?
        .with_context(|| format!("Failed to parse {}", url))?;
    Ok(filters::filter_parsed(parsed))
}

/// Poll the store for the next pending artifact.
///
/// Ids dispatched during this run are excluded, and each dispatch counts
/// against the artifact's retries before a worker sees it. The stream yields
/// `None` once nothing is left, which ends the run.
fn pending_source(
    model: ArtifactFinderModel,
    dispatched: Arc<AtomicUsize>,
) -> impl futures::Stream<Item = Option<PendingArtifact>> + Send + 'static {
    stream::unfold(
        (model, Vec::<i64>::new(), dispatched),
        |(model, mut exclude, dispatched)| async move {
            let next = match model.dispatch_next_pending_artifact(&exclude).await {
                Ok(next) => next,
                Err(e) => {
                    warn!("Failed to read next pending artifact: {:#}", e);
                    None
                }
            };
            if let Some(ref pending) = next {
                exclude.push(pending.id);
                dispatched.fetch_add(1, Ordering::SeqCst);
            }
            Some((next, (model, exclude, dispatched)))
        },
    )
}
