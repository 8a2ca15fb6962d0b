//! Human-readable extraction progress.

use chrono::{DateTime, Local, Utc};
use prettytable::{Cell, Row, Table};

use crate::checkpoint::Checkpoint;

#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub universe_size: usize,
    pub processed: usize,
    pub failed: usize,
    pub remaining: usize,
    pub completion_pct: f64,
    pub last_updated: Option<DateTime<Utc>>,
    pub items_with_certifiers: usize,
    pub certifier_relationships: usize,
    pub complete: bool,
}

impl StatusReport {
    pub fn from_parts(universe_size: usize, checkpoint: &Checkpoint) -> Self {
        let processed = checkpoint.processed.len();
        let failed = checkpoint.failed.len();
        let remaining = universe_size.saturating_sub(processed + failed);
        let completion_pct = if universe_size == 0 {
            0.0
        } else {
            (processed + failed) as f64 / universe_size as f64 * 100.0
        };

        Self {
            universe_size,
            processed,
            failed,
            remaining,
            completion_pct,
            last_updated: checkpoint.last_updated,
            items_with_certifiers: checkpoint.items_with_certifiers(),
            certifier_relationships: checkpoint.total_certifier_relationships(),
            complete: remaining == 0,
        }
    }

    pub fn to_table(&self) -> Table {
        let last_updated = self
            .last_updated
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());

        let mut table = Table::new();
        let rows = [
            ("Total ECs", self.universe_size.to_string()),
            ("Processed", self.processed.to_string()),
            ("Failed", self.failed.to_string()),
            ("Remaining", self.remaining.to_string()),
            ("Progress", format!("{:.1}%", self.completion_pct)),
            ("ECs with certifiers", self.items_with_certifiers.to_string()),
            ("Certifier relationships", self.certifier_relationships.to_string()),
            ("Last update", last_updated),
            ("Status", if self.complete { "complete" } else { "in progress" }.to_string()),
        ];
        for (label, value) in rows {
            table.add_row(Row::new(vec![Cell::new(label), Cell::new(&value)]));
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ExtractionRecord, RawPayload, Source};

    fn checkpoint() -> Checkpoint {
        let mut checkpoint = Checkpoint::default();
        for (code, certifiers) in [("EC0001", 2), ("EC0002", 0), ("EC0003", 1)] {
            checkpoint.record_success(ExtractionRecord {
                work_item: code.to_string(),
                payload: RawPayload {
                    title: code.to_string(),
                    certifiers: (0..certifiers).map(|i| format!("Centro {}", i)).collect(),
                    ..RawPayload::default()
                },
                extracted_at: Utc::now(),
                source: Source::Api,
            });
        }
        checkpoint.record_failure("EC0004");
        checkpoint
    }

    #[test]
    fn test_partial_progress() {
        let report = StatusReport::from_parts(8, &checkpoint());
        assert_eq!(report.processed, 3);
        assert_eq!(report.failed, 1);
        assert_eq!(report.remaining, 4);
        assert_eq!(report.completion_pct, 50.0);
        assert_eq!(report.items_with_certifiers, 2);
        assert_eq!(report.certifier_relationships, 3);
        assert!(!report.complete);
        assert_eq!(report.to_table().len(), 9);
    }

    #[test]
    fn test_complete_when_nothing_remains() {
        let report = StatusReport::from_parts(4, &checkpoint());
        assert_eq!(report.remaining, 0);
        assert!(report.complete);
    }

    #[test]
    fn test_empty_universe() {
        let report = StatusReport::from_parts(0, &Checkpoint::default());
        assert_eq!(report.completion_pct, 0.0);
        assert!(report.complete);
    }
}
