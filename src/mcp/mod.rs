//! MCP (Model Context Protocol) server implementation
//!
//! Exposes the artifact index as MCP tools:
//! - artifactfinder_search: Find the artifacts that provide a class or function
//! - artifactfinder_artifact: Show the crawl state of one artifact
//! - artifactfinder_status: Get index statistics

pub mod constants;
pub mod format;
pub mod types;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ServerHandler,
};

use crate::model::ArtifactFinderModel;
use crate::types::Coordinates;
use constants::{DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT};
use format::{format_pending, format_record_list_item, format_stats};
use types::{CoordinatesRequest, SearchRequest};

/// MCP server handler for artifactfinder
#[derive(Clone)]
pub struct ArtifactFinderHandler {
    tool_router: ToolRouter<Self>,
    model: ArtifactFinderModel,
}

#[tool_router]
impl ArtifactFinderHandler {
    /// The model is cheap to clone, so every HTTP session gets its own handler
    pub fn new(model: ArtifactFinderModel) -> Self {
        Self {
            tool_router: Self::tool_router(),
            model,
        }
    }

    #[tool(description = "Find the Maven artifacts that provide a class or Kotlin function. Returns ranked matches with their groupId:artifactId:version coordinates.")]
    async fn artifactfinder_search(&self, Parameters(req): Parameters<SearchRequest>) -> String {
        let limit = req
            .limit
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
            .min(MAX_SEARCH_LIMIT);

        let results = match self.model.search(&req.params()).await {
            Ok(r) => r,
            Err(e) => return format!("Error: {}", e),
        };

        if results.is_empty() {
            return format!("No artifacts found providing '{}'", req.query);
        }

        let mut output = format!(
            "Found {} matches for '{}'",
            results.len(),
            req.query
        );
        if results.len() > limit {
            output.push_str(&format!(", showing the best {}", limit));
        }
        output.push_str(":\n\n");

        for scored in results.iter().take(limit) {
            output.push_str(&format_record_list_item(scored));
        }

        output
    }

    #[tool(description = "Show whether an artifact is queued, fetched, or parked after too many failed fetches.")]
    async fn artifactfinder_artifact(
        &self,
        Parameters(req): Parameters<CoordinatesRequest>,
    ) -> String {
        let coordinates: Coordinates = match req.coordinates.parse() {
            Ok(c) => c,
            Err(e) => return format!("Error: {}", e),
        };

        match self
            .model
            .find_pending_artifact(
                &coordinates.group_id,
                &coordinates.artifact_id,
                &coordinates.version,
            )
            .await
        {
            Ok(Some(pending)) => format_pending(&pending),
            Ok(None) => format!("Artifact '{}' is not known to the index", coordinates),
            Err(e) => format!("Error: {}", e),
        }
    }

    #[tool(description = "Get the status of the artifactfinder index. Shows how many artifacts, classes and functions are indexed and how many artifacts wait to be fetched.")]
    async fn artifactfinder_status(&self) -> String {
        match self.model.stats().await {
            Ok(stats) => format_stats(&stats),
            Err(e) => format!("Error: {}", e),
        }
    }
}

#[tool_handler]
impl ServerHandler for ArtifactFinderHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "artifactfinder answers which Maven artifact provides a class or function. \
                Use artifactfinder_search with a class or function name, then add the returned \
                coordinates as a dependency. Use artifactfinder_status to check index coverage."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
