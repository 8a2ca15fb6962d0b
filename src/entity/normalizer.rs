use lazy_static::lazy_static;
use regex::Regex;
use tracing::trace;

use super::types::LegalForm;
use super::TARGET_ENTITY;

// Legal-form abbreviations, tolerant of optional dots and spacing inside the abbreviation.
const SA_DE_CV: &str = r"s\.?\s*a\.?\s*de\s*c\.?\s*v\.?";
const SC: &str = r"s\.?\s*c\.?";
const AC: &str = r"a\.?\s*c\.?";

lazy_static! {
    static ref TRAILING_SUFFIX: Regex =
        Regex::new(&format!(r"(?i)\s*\b(?:{SA_DE_CV}|{SC}|{AC})\s*$")).expect("valid regex");
    static ref SA_DE_CV_SUFFIX: Regex =
        Regex::new(&format!(r"(?i)\b{SA_DE_CV}\s*$")).expect("valid regex");
    static ref SC_SUFFIX: Regex = Regex::new(&format!(r"(?i)\b{SC}\s*$")).expect("valid regex");
    static ref AC_SUFFIX: Regex = Regex::new(&format!(r"(?i)\b{AC}\s*$")).expect("valid regex");
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").expect("valid regex");
    static ref SEPARATORS: Regex = Regex::new(r"[.,;:]+").expect("valid regex");
}

/// Map a raw display name to its dedup key.
///
/// Lower-cases and trims, strips one trailing legal-form suffix, collapses
/// whitespace runs and removes separator punctuation. Blank input maps to the
/// empty string, which is never a valid entity key.
pub fn normalize(raw_name: &str) -> String {
    let lowered = raw_name.to_lowercase();
    let trimmed = lowered.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let without_suffix = TRAILING_SUFFIX.replace(trimmed, "");
    let collapsed = WHITESPACE_RUN.replace_all(&without_suffix, " ");
    let key = SEPARATORS.replace_all(&collapsed, "").trim().to_string();

    trace!(target: TARGET_ENTITY, "Normalized '{}' to '{}'", raw_name, key);
    key
}

/// Tag the legal form carried by a raw name's trailing suffix.
///
/// Patterns overlap, so they are checked in a fixed priority order.
pub fn classify(raw_name: &str) -> LegalForm {
    let trimmed = raw_name.trim();
    if SA_DE_CV_SUFFIX.is_match(trimmed) {
        LegalForm::SaDeCv
    } else if SC_SUFFIX.is_match(trimmed) {
        LegalForm::Sc
    } else if AC_SUFFIX.is_match(trimmed) {
        LegalForm::Ac
    } else {
        LegalForm::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_normalization() {
        assert_eq!(normalize("Instituto ABC"), "instituto abc");
        assert_eq!(normalize("  INSTITUTO   ABC  "), "instituto abc");
        assert_eq!(normalize("Colegio, Nacional; de: Oficios."), "colegio nacional de oficios");
    }

    #[test]
    fn test_blank_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \t "), "");
    }

    #[test]
    fn test_strips_legal_suffixes() {
        assert_eq!(normalize("Instituto ABC S.A. de C.V."), "instituto abc");
        assert_eq!(normalize("Instituto ABC SA DE CV"), "instituto abc");
        assert_eq!(normalize("Instituto ABC S. A. de C. V."), "instituto abc");
        assert_eq!(normalize("Consultores del Norte, S.C."), "consultores del norte");
        assert_eq!(normalize("Fundación Educa A.C."), "fundación educa");
    }

    #[test]
    fn test_suffix_must_be_a_separate_word() {
        // "mac" and "disc" end in the letters of a suffix but are not one.
        assert_eq!(normalize("Grupo Mac"), "grupo mac");
        assert_eq!(normalize("Centro Disc"), "centro disc");
    }

    #[test]
    fn test_fixed_point_on_normalized_input() {
        for raw in [
            "Instituto ABC S.A. de C.V.",
            "Consultores del Norte, S.C.",
            "CENTRO   de  evaluación",
        ] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_classify_priority() {
        assert_eq!(classify("Instituto ABC S.A. de C.V."), LegalForm::SaDeCv);
        assert_eq!(classify("Instituto ABC sa de cv"), LegalForm::SaDeCv);
        assert_eq!(classify("Consultores S.C."), LegalForm::Sc);
        assert_eq!(classify("Fundación Educa, A.C."), LegalForm::Ac);
        assert_eq!(classify("INSTITUTO ABC"), LegalForm::Unknown);
        assert_eq!(classify("Escuela de Oficios"), LegalForm::Unknown);
    }
}
