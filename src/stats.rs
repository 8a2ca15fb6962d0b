//! Aggregate metrics over a completed registry build.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::Registries;

pub const TOP_CERTIFIERS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionSummary {
    pub total_ecs_processed: usize,
    pub ecs_with_certifiers: usize,
    pub ecs_without_certifiers: usize,
    pub total_certifier_relationships: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertifierStats {
    pub unique_certifiers: usize,
    pub avg_ecs_per_certifier: f64,
    pub max_ecs_per_certifier: usize,
    pub certifiers_with_1_ec: usize,
    pub certifiers_with_5plus_ecs: usize,
    pub certifiers_with_10plus_ecs: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferingStats {
    pub unique_courses_or_centers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCertifier {
    pub name: String,
    pub ec_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub generated_at: DateTime<Utc>,
    pub extraction_summary: ExtractionSummary,
    pub ece_registry_stats: CertifierStats,
    pub ccap_registry_stats: OfferingStats,
    pub top_20_certifiers: Vec<RankedCertifier>,
}

impl RegistryStats {
    /// Pure reduction over the registries and the matrix. Registries are
    /// already ranked, so the top list is a prefix.
    pub fn compute(registries: &Registries) -> Self {
        let matrix = &registries.matrix;
        let ecs_with_certifiers = matrix.values().filter(|e| e.ece_count > 0).count();

        let counts: Vec<usize> = registries
            .certifiers
            .iter()
            .map(|e| e.relation_count)
            .collect();
        let avg = if counts.is_empty() {
            0.0
        } else {
            round2(counts.iter().sum::<usize>() as f64 / counts.len() as f64)
        };

        Self {
            generated_at: Utc::now(),
            extraction_summary: ExtractionSummary {
                total_ecs_processed: matrix.len(),
                ecs_with_certifiers,
                ecs_without_certifiers: matrix.len() - ecs_with_certifiers,
                total_certifier_relationships: matrix.values().map(|e| e.ece_count).sum(),
            },
            ece_registry_stats: CertifierStats {
                unique_certifiers: counts.len(),
                avg_ecs_per_certifier: avg,
                max_ecs_per_certifier: counts.iter().copied().max().unwrap_or(0),
                certifiers_with_1_ec: counts.iter().filter(|&&c| c == 1).count(),
                certifiers_with_5plus_ecs: counts.iter().filter(|&&c| c >= 5).count(),
                certifiers_with_10plus_ecs: counts.iter().filter(|&&c| c >= 10).count(),
            },
            ccap_registry_stats: OfferingStats {
                unique_courses_or_centers: registries.offerings.len(),
            },
            top_20_certifiers: registries
                .certifiers
                .iter()
                .take(TOP_CERTIFIERS)
                .map(|e| RankedCertifier {
                    name: e.canonical_name.clone(),
                    ec_count: e.relation_count,
                })
                .collect(),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
