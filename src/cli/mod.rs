//! CLI command implementations
//!
//! Handles the offline command-line operations:
//! - search: Find the artifacts providing a symbol
//! - status: Show index statistics
//! - add: Queue one artifact version for the next fetch pass
//! - check-spec: Validate an external source document

mod commands;
mod db_utils;

pub use commands::*;
pub use db_utils::*;
