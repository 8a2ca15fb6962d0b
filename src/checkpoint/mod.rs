//! Checkpoint state, its durable store and the other JSON artifacts.

mod export;
mod layout;
mod state;
mod store;

pub use self::export::{unique_certifier_names, ConsolidatedExport, ExportSummary};
pub use self::layout::DataLayout;
pub use self::state::Checkpoint;
pub use self::store::{read_json, write_json_atomic, CheckpointStore};

use std::collections::BTreeMap;
use tracing::info;

use crate::error::HarvestError;
use crate::extract::ExtractionRecord;
use crate::TARGET_CHECKPOINT;

/// Extraction records for the registry builder: the consolidated export when
/// it is at least as recent as the checkpoint, otherwise the checkpoint data.
pub fn load_records(
    layout: &DataLayout,
) -> Result<BTreeMap<String, ExtractionRecord>, HarvestError> {
    let checkpoint = CheckpointStore::new(layout.checkpoint()).load()?;

    if let Some(export) = read_json::<ConsolidatedExport>(&layout.export())? {
        let current = match checkpoint.last_updated {
            Some(updated) => export.extraction_date >= updated,
            None => true,
        };
        if current {
            info!(target: TARGET_CHECKPOINT, "Using consolidated export {}", layout.export().display());
            return Ok(export.ec_details);
        }
        info!(target: TARGET_CHECKPOINT, "Consolidated export is older than the checkpoint, ignoring it");
    }

    info!(target: TARGET_CHECKPOINT, "Using checkpoint {}", layout.checkpoint().display());
    Ok(checkpoint.data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{RawPayload, Source};
    use chrono::{Duration, Utc};

    fn record(code: &str) -> ExtractionRecord {
        ExtractionRecord {
            work_item: code.to_string(),
            payload: RawPayload {
                title: code.to_string(),
                ..RawPayload::default()
            },
            extracted_at: Utc::now(),
            source: Source::Api,
        }
    }

    #[test]
    fn test_load_records_prefers_current_export() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        let store = CheckpointStore::new(layout.checkpoint());

        let mut checkpoint = Checkpoint::default();
        checkpoint.record_success(record("EC0001"));
        store.save(&mut checkpoint).unwrap();
        write_json_atomic(&layout.export(), &ConsolidatedExport::from_checkpoint(&checkpoint))
            .unwrap();

        // A later partial run adds data without finalizing.
        checkpoint.record_success(record("EC0002"));
        store.save(&mut checkpoint).unwrap();
        assert_eq!(load_records(&layout).unwrap().len(), 2);

        let mut export = ConsolidatedExport::from_checkpoint(&checkpoint);
        export.extraction_date = Utc::now() + Duration::seconds(5);
        export.ec_details.remove("EC0002");
        write_json_atomic(&layout.export(), &export).unwrap();
        assert_eq!(load_records(&layout).unwrap().len(), 1);
    }
}
