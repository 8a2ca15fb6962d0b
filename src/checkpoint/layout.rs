use std::path::{Path, PathBuf};

pub const CHECKPOINT_FILE: &str = "certifiers_checkpoint.json";
pub const EXPORT_FILE: &str = "ec_certifiers_all.json";
pub const UNIQUE_CERTIFIERS_FILE: &str = "unique_certifiers.json";
pub const CERTIFIER_REGISTRY_FILE: &str = "master_ece_registry.json";
pub const OFFERING_REGISTRY_FILE: &str = "master_ccap_registry.json";
pub const MATRIX_FILE: &str = "ec_ece_matrix.json";
pub const STATS_FILE: &str = "registry_stats.json";

/// Locations of every artifact under the data directory.
#[derive(Debug, Clone)]
pub struct DataLayout {
    dir: PathBuf,
}

impl DataLayout {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn checkpoint(&self) -> PathBuf {
        self.dir.join(CHECKPOINT_FILE)
    }

    pub fn export(&self) -> PathBuf {
        self.dir.join(EXPORT_FILE)
    }

    /// Sorted raw certifier names seen across the export.
    pub fn unique_certifiers(&self) -> PathBuf {
        self.dir.join(UNIQUE_CERTIFIERS_FILE)
    }

    pub fn certifier_registry(&self) -> PathBuf {
        self.dir.join(CERTIFIER_REGISTRY_FILE)
    }

    pub fn offering_registry(&self) -> PathBuf {
        self.dir.join(OFFERING_REGISTRY_FILE)
    }

    pub fn matrix(&self) -> PathBuf {
        self.dir.join(MATRIX_FILE)
    }

    pub fn stats(&self) -> PathBuf {
        self.dir.join(STATS_FILE)
    }
}
