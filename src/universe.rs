//! The finite, pre-known set of work-item codes a harvest visits.

use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::checkpoint::Checkpoint;
use crate::error::HarvestError;
use crate::TARGET_COORDINATOR;

const CODE_KEYS: &[&str] = &["codigo", "clave"];

/// Immutable, sorted set of work-item codes loaded once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkUniverse {
    codes: BTreeSet<String>,
}

impl WorkUniverse {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let codes = codes
            .into_iter()
            .map(|code| code.as_ref().trim().to_string())
            .filter(|code| !code.is_empty())
            .collect();
        Self { codes }
    }

    /// Load the standards catalogue: a JSON array of objects carrying `codigo`
    /// or `clave`, a JSON array of strings, or plain text with one code per line.
    pub fn load(path: &Path) -> Result<Self, HarvestError> {
        let load_error = |reason: String| HarvestError::UniverseLoad {
            path: path.to_path_buf(),
            reason,
        };

        let text = fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        let universe = if text.trim_start().starts_with('[') {
            let entries: Vec<Value> =
                serde_json::from_str(&text).map_err(|e| load_error(e.to_string()))?;
            Self::new(entries.iter().filter_map(code_of))
        } else {
            Self::new(text.lines())
        };

        if universe.is_empty() {
            return Err(load_error("no work-item codes found".to_string()));
        }

        info!(target: TARGET_COORDINATOR, "Loaded {} work items from {}", universe.len(), path.display());
        Ok(universe)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.codes.iter()
    }

    /// Codes neither processed nor recorded as failed, in sorted order.
    pub fn remaining(&self, checkpoint: &Checkpoint) -> Vec<String> {
        self.codes
            .iter()
            .filter(|code| {
                !checkpoint.processed.contains(*code) && !checkpoint.failed.contains(*code)
            })
            .cloned()
            .collect()
    }
}

fn code_of(entry: &Value) -> Option<&str> {
    match entry {
        Value::String(code) => Some(code.as_str()),
        Value::Object(object) => CODE_KEYS
            .iter()
            .filter_map(|key| object.get(*key))
            .filter_map(Value::as_str)
            .find(|code| !code.trim().is_empty()),
        _ => None,
    }
}
