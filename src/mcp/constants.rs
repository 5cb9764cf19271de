//! Configuration constants for MCP tools

/// Default maximum number of search results
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Upper bound a caller can raise the search limit to
pub const MAX_SEARCH_LIMIT: usize = 50;
