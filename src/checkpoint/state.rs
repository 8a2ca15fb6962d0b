use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::extract::ExtractionRecord;

/// Durable extraction progress: the single source of truth for resumption.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default)]
    pub processed: BTreeSet<String>,
    #[serde(default)]
    pub failed: BTreeSet<String>,
    #[serde(default)]
    pub data: BTreeMap<String, ExtractionRecord>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl Checkpoint {
    /// Record a successful extraction. Last write wins, and success supersedes
    /// any earlier failure of the same item.
    pub fn record_success(&mut self, record: ExtractionRecord) {
        let work_item = record.work_item.clone();
        self.failed.remove(&work_item);
        self.processed.insert(work_item.clone());
        self.data.insert(work_item, record);
    }

    /// Record a failed extraction unless the item already succeeded.
    pub fn record_failure(&mut self, work_item: &str) {
        if !self.processed.contains(work_item) {
            self.failed.insert(work_item.to_string());
        }
    }

    /// Drop stale failures for items that have since succeeded.
    /// Returns how many entries were removed from `failed`.
    pub fn reconcile(&mut self) -> usize {
        let before = self.failed.len();
        let processed = &self.processed;
        self.failed.retain(|id| !processed.contains(id));
        before - self.failed.len()
    }

    /// Forget recorded failures so the next run attempts them again.
    pub fn reset_failed(&mut self) -> usize {
        let count = self.failed.len();
        self.failed.clear();
        count
    }

    pub fn records(&self) -> impl Iterator<Item = &ExtractionRecord> {
        self.data.values()
    }

    pub fn total_certifier_relationships(&self) -> usize {
        self.records().map(|r| r.payload.certifiers.len()).sum()
    }

    pub fn total_course_relationships(&self) -> usize {
        self.records().map(|r| r.payload.courses.len()).sum()
    }

    pub fn items_with_certifiers(&self) -> usize {
        self.records()
            .filter(|r| !r.payload.certifiers.is_empty())
            .count()
    }
}
