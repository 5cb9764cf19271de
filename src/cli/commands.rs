//! Command implementations for CLI operations

use std::path::Path;

use anyhow::{Context, Result};

use crate::external::ExternalSourceSpec;
use crate::model::SearchParams;
use crate::types::{Artifactory, Coordinates, ScoredRecord};
use crate::FinderConfig;

use super::db_utils::database_exists;

const SEARCH_LIMIT: usize = 20;

/// Search for the artifacts providing a class, or a function with `methods`
#[tokio::main]
pub async fn search_command(config: &FinderConfig, query: &str, methods: bool) -> Result<()> {
    if !database_exists(config) {
        println!("No index found at {}", config.db_path.display());
        return Ok(());
    }

    let model = config.open_model().await?;
    let params = SearchParams::new(query)
        .extension_methods(methods)
        .global_methods(methods);
    let results = model.search(&params).await?;

    if results.is_empty() {
        println!("No artifacts found providing '{}'", query);
        return Ok(());
    }

    println!("Found {} matches for '{}':\n", results.len(), query);
    for scored in results.iter().take(SEARCH_LIMIT) {
        println!("{}", format_result_line(scored));
    }
    if results.len() > SEARCH_LIMIT {
        println!("  ... {} more", results.len() - SEARCH_LIMIT);
    }

    Ok(())
}

fn format_result_line(scored: &ScoredRecord) -> String {
    let record = &scored.record;
    format!(
        "  {:>3} {} {}.{} - {}:{}",
        scored.score,
        record.kind.as_str(),
        record.pkg,
        record.display_name(),
        record.coordinates(),
        record.version
    )
}

/// Show index statistics
#[tokio::main]
pub async fn status_command(config: &FinderConfig) -> Result<()> {
    if !database_exists(config) {
        println!("No index found at {}", config.db_path.display());
        println!("Run 'artifactfinder add <group:artifact:version>' or a crawl first.");
        return Ok(());
    }

    let model = config.open_model().await?;
    let stats = model.stats().await?;

    println!("artifactfinder Index Status");
    println!("===========================");
    if config.in_memory {
        println!("Database: in memory");
    } else {
        println!("Database: {}", config.db_path.display());
    }
    println!("Artifacts: {}", stats.artifacts);
    println!("Classes: {}", stats.classes);
    println!("Functions: {}", stats.methods);
    println!(
        "Pending: {} ({} fetched, {} parked)",
        stats.pending_total, stats.pending_fetched, stats.pending_parked
    );
    println!("Size: {:.2} KB", stats.db_size_bytes as f64 / 1024.0);

    Ok(())
}

/// Queue one artifact version for the next fetch pass
#[tokio::main]
pub async fn add_command(config: &FinderConfig, coordinates: &str, google: bool) -> Result<()> {
    let coordinates: Coordinates = coordinates.parse()?;
    let artifactory = if google {
        Artifactory::Google
    } else {
        Artifactory::Maven
    };

    let model = config.open_model().await?;
    let added = model
        .add_pending_artifact(
            &coordinates.group_id,
            &coordinates.artifact_id,
            &coordinates.version,
            artifactory,
        )
        .await?;

    if added {
        println!("Queued {} from {}", coordinates, artifactory.as_str());
    } else {
        println!("{} is already queued", coordinates);
    }

    Ok(())
}

/// Validate an external source document and list what it would crawl
pub fn check_spec_command(path: &Path) -> Result<()> {
    let input = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let spec = ExternalSourceSpec::parse(&input)?;
    spec.ensure_supported()?;

    let sources = spec.as_artifact_sources();
    println!(
        "{}: {} groups, {} artifacts",
        path.display(),
        spec.groups.len(),
        sources.len()
    );
    for source in sources {
        println!("  {}", source);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SearchKind, SearchRecord};
    use crate::version::Version;
    use crate::FinderError;

    fn file_config(dir: &tempfile::TempDir) -> FinderConfig {
        FinderConfig {
            db_path: dir.path().join("index.db"),
            ..Default::default()
        }
    }

    #[test]
    fn test_add_command_queues_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(&dir);

        add_command(&config, "com.squareup.okio:okio:2.4.0", false).unwrap();
        add_command(&config, "com.squareup.okio:okio:2.4.0", false).unwrap();

        let stats = tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(async { config.open_model().await.unwrap().stats().await.unwrap() });
        assert_eq!(stats.pending_total, 1);
    }

    #[test]
    fn test_add_command_rejects_bad_coordinates() {
        let dir = tempfile::tempdir().unwrap();
        let err = add_command(&file_config(&dir), "okio", false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FinderError>(),
            Some(FinderError::InvalidCoordinates(_))
        ));
        // nothing was opened for a rejected request
        assert!(!dir.path().join("index.db").exists());
    }

    #[test]
    fn test_commands_without_index() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(&dir);
        status_command(&config).unwrap();
        search_command(&config, "Foo", false).unwrap();
        assert!(!config.db_path.exists());
    }

    #[test]
    fn test_check_spec_command() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("external.json");

        std::fs::write(
            &path,
            r#"{"groups": [{"groupId": "com.squareup.okio", "artifactIds": ["okio"]}]}"#,
        )
        .unwrap();
        check_spec_command(&path).unwrap();

        std::fs::write(&path, r#"{"version": 3, "groups": []}"#).unwrap();
        let err = check_spec_command(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FinderError>(),
            Some(FinderError::UnsupportedSpecVersion { found: 3, .. })
        ));
    }

    #[test]
    fn test_format_result_line() {
        let scored = ScoredRecord {
            record: SearchRecord {
                pkg: "okio".to_string(),
                name: "Buffer".to_string(),
                receiver_name: None,
                group_id: "com.squareup.okio".to_string(),
                artifact_id: "okio".to_string(),
                version: Version::new(2, 4, 0, None),
                kind: SearchKind::Class,
            },
            score: 100,
        };
        assert_eq!(
            format_result_line(&scored),
            "  100 class okio.Buffer - com.squareup.okio:okio:2.4.0"
        );
    }
}
