//! Request types for MCP tools

use rmcp::schemars;
use serde::Deserialize;

use crate::model::SearchParams;

/// Request for search tool
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchRequest {
    #[schemars(description = "Class or function name, or a prefix of one. Nested classes may be written Outer.Inner")]
    pub query: String,
    #[schemars(description = "Include classes (default: true)")]
    pub include_classes: Option<bool>,
    #[schemars(description = "Include extension functions (default: false)")]
    pub include_extension_methods: Option<bool>,
    #[schemars(description = "Include top-level functions (default: false)")]
    pub include_global_methods: Option<bool>,
    #[schemars(description = "Maximum number of results (default: 10, max: 50)")]
    pub limit: Option<usize>,
}

impl SearchRequest {
    pub fn params(&self) -> SearchParams {
        SearchParams::new(self.query.clone())
            .classes(self.include_classes.unwrap_or(true))
            .extension_methods(self.include_extension_methods.unwrap_or(false))
            .global_methods(self.include_global_methods.unwrap_or(false))
    }
}

/// Request for the pending artifact tool
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CoordinatesRequest {
    #[schemars(description = "Maven coordinates as groupId:artifactId:version")]
    pub coordinates: String,
}
