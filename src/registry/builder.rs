use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

use crate::entity::{classify, normalize, CanonicalEntity, EntityKind, LegalForm};
use crate::extract::ExtractionRecord;
use crate::TARGET_REGISTRY;

/// One work item's row in the relationship matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixEntry {
    pub ece_ids: Vec<String>,
    pub ece_count: usize,
    pub title: String,
}

pub type Matrix = BTreeMap<String, MatrixEntry>;

/// Everything one build produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Registries {
    pub certifiers: Vec<CanonicalEntity>,
    pub offerings: Vec<CanonicalEntity>,
    pub matrix: Matrix,
}

/// Accumulator for all raw variants sharing one normalized key.
#[derive(Debug, Default)]
struct Group {
    /// Raw variants in first-seen order, without duplicates.
    variants: Vec<String>,
    work_items: BTreeSet<String>,
    legal_form: Option<LegalForm>,
}

impl Group {
    fn add(&mut self, raw_name: &str, work_item: &str, kind: EntityKind) {
        if !self.variants.iter().any(|v| v == raw_name) {
            self.variants.push(raw_name.to_string());
        }
        self.work_items.insert(work_item.to_string());

        if kind == EntityKind::Certifier && self.legal_form.is_none() {
            let form = classify(raw_name);
            if form != LegalForm::Unknown {
                self.legal_form = Some(form);
            }
        }
    }

    fn into_entity(self, normalized_key: String, kind: EntityKind) -> CanonicalEntity {
        // Longest by characters; `max_by_key` keeps the last maximum, so walk
        // backwards to let the first-encountered variant win ties.
        let canonical_name = self
            .variants
            .iter()
            .rev()
            .max_by_key(|v| v.chars().count())
            .cloned()
            .unwrap_or_default();

        let mut alternate_names: Vec<String> = self
            .variants
            .into_iter()
            .filter(|v| *v != canonical_name)
            .collect();
        alternate_names.sort();

        let entity_type = match kind {
            EntityKind::Certifier => Some(self.legal_form.unwrap_or(LegalForm::Unknown)),
            EntityKind::Offering => None,
        };

        CanonicalEntity {
            id: String::new(),
            canonical_name,
            alternate_names,
            normalized_key,
            entity_type,
            relation_count: self.work_items.len(),
            related_work_items: self.work_items.into_iter().collect(),
        }
    }
}

fn raw_names<'a>(record: &'a ExtractionRecord, kind: EntityKind) -> &'a [String] {
    match kind {
        EntityKind::Certifier => &record.payload.certifiers,
        EntityKind::Offering => &record.payload.courses,
    }
}

/// Normalized key for `raw_name`, or `None` when it is below the floor or
/// normalizes to nothing.
fn entity_key(raw_name: &str, kind: EntityKind) -> Option<String> {
    if !kind.accepts(raw_name) {
        return None;
    }
    let key = normalize(raw_name);
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

/// Group, rank and number the entities of one kind.
pub fn build_registry(
    records: &BTreeMap<String, ExtractionRecord>,
    kind: EntityKind,
) -> Vec<CanonicalEntity> {
    let mut groups: BTreeMap<String, Group> = BTreeMap::new();
    let mut skipped = 0;

    for (work_item, record) in records {
        for raw_name in raw_names(record, kind) {
            match entity_key(raw_name, kind) {
                Some(key) => groups.entry(key).or_default().add(raw_name, work_item, kind),
                None => skipped += 1,
            }
        }
    }

    let mut registry: Vec<CanonicalEntity> = groups
        .into_iter()
        .map(|(key, group)| group.into_entity(key, kind))
        .collect();

    rank(&mut registry, kind);

    debug!(target: TARGET_REGISTRY, "Skipped {} {} name(s) below the floor or empty", skipped, kind);
    info!(target: TARGET_REGISTRY, "{} unique {} entities", registry.len(), kind);
    registry
}

/// Sort by (relation_count desc, canonical_name asc) and assign sequential ids
/// in that order.
fn rank(registry: &mut [CanonicalEntity], kind: EntityKind) {
    registry.sort_by(|a, b| {
        b.relation_count
            .cmp(&a.relation_count)
            .then_with(|| a.canonical_name.cmp(&b.canonical_name))
    });
    for (index, entity) in registry.iter_mut().enumerate() {
        entity.id = kind.format_id(index + 1);
    }
}

pub fn build_certifier_registry(
    records: &BTreeMap<String, ExtractionRecord>,
) -> Vec<CanonicalEntity> {
    build_registry(records, EntityKind::Certifier)
}

pub fn build_offering_registry(
    records: &BTreeMap<String, ExtractionRecord>,
) -> Vec<CanonicalEntity> {
    build_registry(records, EntityKind::Offering)
}

/// Map every work item to the ids of its certifiers through the registry's
/// normalized-key index. Names absent from the index are dropped.
pub fn build_matrix(
    records: &BTreeMap<String, ExtractionRecord>,
    certifiers: &[CanonicalEntity],
) -> Matrix {
    let index: HashMap<&str, &str> = certifiers
        .iter()
        .map(|e| (e.normalized_key.as_str(), e.id.as_str()))
        .collect();

    records
        .iter()
        .map(|(work_item, record)| {
            let ids: BTreeSet<String> = record
                .payload
                .certifiers
                .iter()
                .filter_map(|raw| entity_key(raw, EntityKind::Certifier))
                .filter_map(|key| index.get(key.as_str()).map(|id| id.to_string()))
                .collect();

            let entry = MatrixEntry {
                ece_count: ids.len(),
                ece_ids: ids.into_iter().collect(),
                title: record.payload.title.clone(),
            };
            (work_item.clone(), entry)
        })
        .collect()
}

/// Build both registries and the matrix from the same records.
pub fn build(records: &BTreeMap<String, ExtractionRecord>) -> Registries {
    info!(target: TARGET_REGISTRY, "Building registries from {} extraction records", records.len());

    let certifiers = build_certifier_registry(records);
    let offerings = build_offering_registry(records);
    let matrix = build_matrix(records, &certifiers);

    Registries {
        certifiers,
        offerings,
        matrix,
    }
}
