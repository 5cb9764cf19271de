//! Shared formatting utilities for MCP tool outputs

use crate::types::{IndexStats, PendingArtifact, ScoredRecord};

/// Format a search hit as a list item with the artifact providing it
pub fn format_record_list_item(scored: &ScoredRecord) -> String {
    let record = &scored.record;
    format!(
        "- **{}** `{}` in `{}` - {}:{} (score {})\n",
        record.kind.as_str(),
        record.display_name(),
        record.pkg,
        record.coordinates(),
        record.version,
        scored.score
    )
}

pub fn format_pending(pending: &PendingArtifact) -> String {
    let state = if pending.fetched {
        "fetched"
    } else if pending.retries >= crate::types::MAX_RETRIES {
        "parked"
    } else {
        "pending"
    };
    format!(
        "**{}:{}:{}** from {}\n- State: {}\n- Retries: {}\n",
        pending.group_id,
        pending.artifact_id,
        pending.version,
        pending.artifactory.as_str(),
        state,
        pending.retries
    )
}

pub fn format_stats(stats: &IndexStats) -> String {
    let mut output = String::from("## artifactfinder Index Status\n\n");
    output.push_str(&format!("**Indexed Artifacts:** {}\n", stats.artifacts));
    output.push_str(&format!("**Classes:** {}\n", stats.classes));
    output.push_str(&format!("**Functions:** {}\n", stats.methods));
    output.push_str(&format!(
        "**Pending Artifacts:** {} ({} fetched, {} parked)\n",
        stats.pending_total, stats.pending_fetched, stats.pending_parked
    ));
    output.push_str(&format!(
        "**Database Size:** {:.2} KB\n",
        stats.db_size_bytes as f64 / 1024.0
    ));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Artifactory, SearchKind, SearchRecord};
    use crate::version::Version;

    #[test]
    fn test_format_record_list_item() {
        let scored = ScoredRecord {
            record: SearchRecord {
                pkg: "androidx.core.view".to_string(),
                name: "isVisible".to_string(),
                receiver_name: Some("View".to_string()),
                group_id: "androidx.core".to_string(),
                artifact_id: "core-ktx".to_string(),
                version: Version::new(1, 3, 0, None),
                kind: SearchKind::ExtensionMethod,
            },
            score: 90,
        };
        assert_eq!(
            format_record_list_item(&scored),
            "- **extension_method** `View.isVisible` in `androidx.core.view` - androidx.core:core-ktx:1.3.0 (score 90)\n"
        );
    }

    #[test]
    fn test_format_pending_state() {
        let mut pending = PendingArtifact {
            id: 1,
            group_id: "g".to_string(),
            artifact_id: "a".to_string(),
            version: Version::new(1, 0, 0, None),
            retries: crate::types::MAX_RETRIES,
            fetched: false,
            artifactory: Artifactory::Maven,
        };
        assert!(format_pending(&pending).contains("State: parked"));
        pending.fetched = true;
        assert!(format_pending(&pending).contains("State: fetched"));
    }
}
