//! HTTP query endpoint
//!
//! `GET /search?query=...` answers with ranked artifacts for a symbol name.
//! Optional parameters: `limit` (default 20, at most 50), `includeClasses`
//! (default true), `includeExtensionMethods` and `includeGlobalMethods`
//! (default false).

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing::{debug, warn};

use crate::model::{ArtifactFinderModel, SearchParams};
use crate::types::ScoredRecord;

/// Response format version clients can check for
pub const LATEST_RESPONSE_VERSION: u32 = 1;

pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 50;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub latest_version: u32,
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub pkg: String,
    pub name: String,
    pub receiver_name: Option<String>,
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub score: i32,
}

impl From<ScoredRecord> for SearchResult {
    fn from(scored: ScoredRecord) -> Self {
        let record = scored.record;
        Self {
            pkg: record.pkg,
            name: record.name,
            receiver_name: record.receiver_name,
            group_id: record.group_id,
            artifact_id: record.artifact_id,
            version: record.version.to_string(),
            score: scored.score,
        }
    }
}

impl SearchResponse {
    fn new(results: Vec<ScoredRecord>, limit: usize) -> Self {
        Self {
            latest_version: LATEST_RESPONSE_VERSION,
            results: results.into_iter().take(limit).map(SearchResult::from).collect(),
        }
    }
}

pub fn router(model: ArtifactFinderModel) -> Router {
    Router::new()
        .route("/search", get(search))
        .with_state(model)
}

pub async fn search(
    State(model): State<ArtifactFinderModel>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(query) = params.get("query") else {
        return (StatusCode::BAD_REQUEST, "need a 'query' parameter").into_response();
    };
    let param = |name: &str| params.get(name).map(String::as_str);

    let limit = parse_limit(param("limit"));
    let search = SearchParams {
        query: query.clone(),
        include_classes: parse_boolean(param("includeClasses"), true),
        include_extension_methods: parse_boolean(param("includeExtensionMethods"), false),
        include_global_methods: parse_boolean(param("includeGlobalMethods"), false),
    };
    debug!("Search request: {:?} (limit {})", search, limit);

    match model.search(&search).await {
        Ok(results) => Json(SearchResponse::new(results, limit)).into_response(),
        Err(e) => {
            warn!("Search for '{}' failed: {:#}", search.query, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "search failed").into_response()
        }
    }
}

/// `true` in any case or a positive integer is true, other integers are
/// false, anything else falls back to `default`
pub fn parse_boolean(value: Option<&str>, default: bool) -> bool {
    let Some(value) = value else {
        return default;
    };
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        return true;
    }
    trimmed.parse::<i64>().map(|n| n > 0).unwrap_or(default)
}

pub fn parse_limit(value: Option<&str>) -> usize {
    value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map(|n| n.clamp(0, MAX_LIMIT as i64) as usize)
        .unwrap_or(DEFAULT_LIMIT)
}
