use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::state::Checkpoint;
use crate::extract::ExtractionRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub ecs_processed: usize,
    pub ecs_failed: usize,
    pub total_certifier_relationships: usize,
    pub total_course_relationships: usize,
    pub unique_certifiers: usize,
}

/// Final consolidated view of an extraction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedExport {
    pub extraction_date: DateTime<Utc>,
    pub summary: ExportSummary,
    pub failed_ecs: Vec<String>,
    pub ec_details: BTreeMap<String, ExtractionRecord>,
}

impl ConsolidatedExport {
    pub fn from_checkpoint(checkpoint: &Checkpoint) -> Self {
        let unique_certifiers = unique_certifier_names(checkpoint);

        ConsolidatedExport {
            extraction_date: Utc::now(),
            summary: ExportSummary {
                ecs_processed: checkpoint.data.len(),
                ecs_failed: checkpoint.failed.len(),
                total_certifier_relationships: checkpoint.total_certifier_relationships(),
                total_course_relationships: checkpoint.total_course_relationships(),
                unique_certifiers: unique_certifiers.len(),
            },
            failed_ecs: checkpoint.failed.iter().cloned().collect(),
            ec_details: checkpoint.data.clone(),
        }
    }
}

/// Distinct certifier names exactly as scraped, sorted. No normalization: the
/// registry builder does the real dedup.
pub fn unique_certifier_names(checkpoint: &Checkpoint) -> Vec<String> {
    checkpoint
        .records()
        .flat_map(|r| r.payload.certifiers.iter().map(String::as_str))
        .collect::<BTreeSet<&str>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{RawPayload, Source};

    #[test]
    fn test_summary_counts() {
        let mut checkpoint = Checkpoint::default();
        for (code, certifiers) in [
            ("EC0001", vec!["Instituto ABC", "Centro XYZ"]),
            ("EC0002", vec!["Instituto ABC"]),
        ] {
            checkpoint.record_success(ExtractionRecord {
                work_item: code.to_string(),
                payload: RawPayload {
                    title: code.to_string(),
                    certifiers: certifiers.into_iter().map(String::from).collect(),
                    courses: vec!["Curso básico".to_string()],
                    ..RawPayload::default()
                },
                extracted_at: Utc::now(),
                source: Source::Api,
            });
        }
        checkpoint.record_failure("EC0003");

        let export = ConsolidatedExport::from_checkpoint(&checkpoint);
        assert_eq!(export.summary.ecs_processed, 2);
        assert_eq!(export.summary.ecs_failed, 1);
        assert_eq!(export.summary.total_certifier_relationships, 3);
        assert_eq!(export.summary.total_course_relationships, 2);
        assert_eq!(export.summary.unique_certifiers, 2);
        assert_eq!(export.failed_ecs, vec!["EC0003"]);
        assert_eq!(
            unique_certifier_names(&checkpoint),
            vec!["Centro XYZ", "Instituto ABC"]
        );
    }
}
