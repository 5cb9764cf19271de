//! Exclusion filters for crawling and indexing
//!
//! Packages and artifacts that never hold library API (build tooling, the
//! legacy support library) are not crawled. Generated or internal classes
//! and methods are dropped from parsed artifacts before they are indexed.

use crate::types::{ParsedArtifactInfo, ParsedClassInfo, ParsedMethodInfo};

const EXCLUDED_PACKAGE_PREFIXES: &[&str] = &[
    "com.android.support",
    "com.android.databinding",
    "android.arch",
    "com.android.tools",
    "tools.base",
    "com.android.java.tools",
];

const EXCLUDED_PACKAGES: &[&str] = &["zipflinger"];

const EXCLUDED_ARTIFACT_FRAGMENTS: &[&str] = &["compiler", "zipflinger", "signflinger"];

/// Whether a Maven group should be crawled
pub fn should_parse_package(group_id: &str) -> bool {
    !EXCLUDED_PACKAGE_PREFIXES
        .iter()
        .any(|prefix| group_id.starts_with(prefix))
        && !EXCLUDED_PACKAGES.contains(&group_id)
}

/// Whether an artifact of a crawled group should be crawled
pub fn should_parse_artifact(_group_id: &str, artifact_id: &str) -> bool {
    !EXCLUDED_ARTIFACT_FRAGMENTS
        .iter()
        .any(|fragment| artifact_id.contains(fragment))
}

/// Whether a parsed class is worth indexing
pub fn should_index_class(class: &ParsedClassInfo) -> bool {
    let name = class.name.as_str();
    let generated = name == "BuildConfig" || name == "R";
    let lowercase = name.chars().next().map_or(true, char::is_lowercase);
    let companion = name.ends_with("Companion");
    let dagger = name.starts_with("Dagger") && name.ends_with("Component");
    let default_impls = name.ends_with("DefaultImpls");
    let internal = class.pkg.contains("internal");

    !(generated || lowercase || companion || dagger || default_impls || internal)
}

pub fn should_index_method(method: &ParsedMethodInfo) -> bool {
    !method.pkg.contains("internal")
}

/// Drop the classes and methods that should not be indexed
pub fn filter_parsed(info: ParsedArtifactInfo) -> ParsedArtifactInfo {
    ParsedArtifactInfo {
        classes: info.classes.into_iter().filter(should_index_class).collect(),
        methods: info.methods.into_iter().filter(should_index_method).collect(),
    }
}
