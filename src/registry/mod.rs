//! Deduplicated certifier and offering registries plus the work-item matrix.

mod builder;

pub use self::builder::{
    build, build_certifier_registry, build_matrix, build_offering_registry, build_registry,
    Matrix, MatrixEntry, Registries,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::checkpoint::{write_json_atomic, DataLayout};
use crate::entity::{CanonicalEntity, EntityKind};
use crate::error::HarvestError;
use crate::stats::RegistryStats;
use crate::TARGET_REGISTRY;

pub const MATRIX_DESCRIPTION: &str = "EC to ECE relationship matrix for quick lookups";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryDocument {
    pub generated_at: DateTime<Utc>,
    pub description: String,
    pub total_count: usize,
    pub registry: Vec<CanonicalEntity>,
}

impl RegistryDocument {
    pub fn new(kind: EntityKind, registry: Vec<CanonicalEntity>, generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            description: kind.description().to_string(),
            total_count: registry.len(),
            registry,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixDocument {
    pub generated_at: DateTime<Utc>,
    pub description: String,
    pub total_ecs: usize,
    pub matrix: Matrix,
}

impl MatrixDocument {
    pub fn new(matrix: Matrix, generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            description: MATRIX_DESCRIPTION.to_string(),
            total_ecs: matrix.len(),
            matrix,
        }
    }
}

/// Write the two registries, the matrix and the statistics under `layout`,
/// all stamped with the same generation time.
pub fn write_artifacts(
    layout: &DataLayout,
    registries: &Registries,
    stats: &RegistryStats,
) -> Result<(), HarvestError> {
    let generated_at = stats.generated_at;

    let certifiers = RegistryDocument::new(
        EntityKind::Certifier,
        registries.certifiers.clone(),
        generated_at,
    );
    write_json_atomic(&layout.certifier_registry(), &certifiers)?;

    let offerings = RegistryDocument::new(
        EntityKind::Offering,
        registries.offerings.clone(),
        generated_at,
    );
    write_json_atomic(&layout.offering_registry(), &offerings)?;

    let matrix = MatrixDocument::new(registries.matrix.clone(), generated_at);
    write_json_atomic(&layout.matrix(), &matrix)?;

    write_json_atomic(&layout.stats(), stats)?;

    info!(
        target: TARGET_REGISTRY,
        "Wrote {} certifiers, {} offerings and {} matrix rows to {}",
        certifiers.total_count,
        offerings.total_count,
        matrix.total_ecs,
        layout.dir().display()
    );
    Ok(())
}
