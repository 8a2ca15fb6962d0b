use serde::{Deserialize, Serialize};
use std::fmt;

/// Legal form inferred from a certifier name's trailing suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LegalForm {
    #[serde(rename = "SA de CV")]
    SaDeCv,
    #[serde(rename = "SC")]
    Sc,
    #[serde(rename = "AC")]
    Ac,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl fmt::Display for LegalForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegalForm::SaDeCv => write!(f, "SA de CV"),
            LegalForm::Sc => write!(f, "SC"),
            LegalForm::Ac => write!(f, "AC"),
            LegalForm::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Which registry an entity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Certifying and evaluating bodies (ECE).
    Certifier,
    /// Training centres and courses (CCAP).
    Offering,
}

impl EntityKind {
    /// Raw names shorter than this are treated as noise.
    pub fn min_name_len(&self) -> usize {
        match self {
            EntityKind::Certifier => 3,
            EntityKind::Offering => 5,
        }
    }

    pub fn id_prefix(&self) -> &'static str {
        match self {
            EntityKind::Certifier => "ECE",
            EntityKind::Offering => "CCAP",
        }
    }

    pub fn format_id(&self, rank: usize) -> String {
        format!("{}-{:05}", self.id_prefix(), rank)
    }

    pub fn description(&self) -> &'static str {
        match self {
            EntityKind::Certifier => {
                "Master registry of ECEs (Entidades Certificadoras y Evaluadoras)"
            }
            EntityKind::Offering => "Master registry of CCAPs and training courses",
        }
    }

    /// Whether `raw_name` clears this kind's minimum-length floor.
    pub fn accepts(&self, raw_name: &str) -> bool {
        raw_name.chars().count() >= self.min_name_len()
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Certifier => write!(f, "certifier"),
            EntityKind::Offering => write!(f, "offering"),
        }
    }
}

/// A deduplicated entity grouped from every raw variant sharing one normalized key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEntity {
    /// Run-scoped rank identifier; `normalized_key` is the only cross-run stable key.
    pub id: String,
    pub canonical_name: String,
    pub alternate_names: Vec<String>,
    pub normalized_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<LegalForm>,
    #[serde(rename = "ec_codes")]
    pub related_work_items: Vec<String>,
    #[serde(rename = "ec_count")]
    pub relation_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_format() {
        assert_eq!(EntityKind::Certifier.format_id(1), "ECE-00001");
        assert_eq!(EntityKind::Offering.format_id(123), "CCAP-00123");
    }

    #[test]
    fn test_length_floor_counts_characters() {
        assert!(!EntityKind::Certifier.accepts("AB"));
        assert!(EntityKind::Certifier.accepts("ABC"));
        // Four characters, five bytes.
        assert!(!EntityKind::Offering.accepts("Café"));
        assert!(EntityKind::Offering.accepts("Cafés"));
    }

    #[test]
    fn test_legal_form_serialization() {
        let json = serde_json::to_string(&LegalForm::SaDeCv).unwrap();
        assert_eq!(json, "\"SA de CV\"");
    }
}
