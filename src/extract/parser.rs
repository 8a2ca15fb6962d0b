//! Turning raw detail views and portal API bodies into explicit payloads.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use super::types::{LabeledTable, RawDetail, RawPayload, TableKind, HEADER_KEYWORDS};
use crate::error::FetchError;
use crate::TARGET_WEB_REQUEST;

lazy_static! {
    static ref CONTROL_CHARS: Regex =
        Regex::new(r"[\x00-\x08\x0b\x0c\x0e-\x1f\x7f-\x9f]").expect("valid regex");
    // Raw breaks inside names separate words; JSON strings cannot carry them unescaped.
    static ref BREAKS: Regex = Regex::new(r"[\t\r\n]").expect("valid regex");
}

const TITLE_KEYS: &[&str] = &["titulo", "nombre", "descripcion", "title"];
const ROW_NAME_KEYS: &[&str] = &["nombre", "razonSocial", "descripcion", "name"];
const WRAPPER_KEYS: &[&str] = &["results", "data"];
const CODE_KEYS: &[&str] = &["codigo", "clave"];

/// Strip control characters that break JSON parsing of portal responses.
/// Tabs and line breaks become spaces rather than vanishing.
pub fn sanitize_control_chars(text: &str) -> String {
    let stripped = CONTROL_CHARS.replace_all(text, "");
    BREAKS.replace_all(&stripped, " ").into_owned()
}

/// Lower-case and drop combining marks, so "Ocupación" in NFC or NFD form
/// compares equal to "ocupacion".
fn fold_header(header: &str) -> String {
    header
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Match a table header against the keyword set, case- and accent-insensitively.
pub fn classify_header(header: &str) -> Option<TableKind> {
    let folded = fold_header(header);
    HEADER_KEYWORDS
        .iter()
        .find(|(keyword, _)| folded.contains(keyword))
        .map(|(_, kind)| *kind)
}

impl RawDetail {
    /// Sort the scraped tables into payload fields; unrecognised tables are dropped.
    pub fn into_payload(self) -> RawPayload {
        let mut payload = RawPayload {
            title: self.title.trim().to_string(),
            ..RawPayload::default()
        };

        for table in self.tables {
            let Some(kind) = classify_header(&table.header) else {
                debug!(target: TARGET_WEB_REQUEST, "Ignoring table with header '{}'", table.header);
                continue;
            };
            let header = table.header.trim();
            let rows = table
                .rows
                .into_iter()
                .map(|row| row.trim().to_string())
                .filter(|row| !row.is_empty() && row != header);

            let target = match kind {
                TableKind::Certifiers => &mut payload.certifiers,
                TableKind::Courses => &mut payload.courses,
                TableKind::Occupations => &mut payload.occupations,
                TableKind::CommitteeMembers => &mut payload.committee_members,
            };
            target.extend(rows);
        }

        payload
    }
}

fn first_string(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn row_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Object(object) => first_string(object, ROW_NAME_KEYS).or_else(|| {
            object
                .values()
                .filter_map(Value::as_str)
                .map(str::trim)
                .find(|s| !s.is_empty())
                .map(str::to_string)
        }),
        _ => None,
    };
    text.filter(|s| !s.is_empty())
}

/// Parse a portal API detail body into a [`RawDetail`].
///
/// Every array-valued key becomes a table whose header is the key name, so the
/// same header classification applies to API and rendered sources.
pub fn parse_api_detail(body: &str) -> Result<RawDetail, FetchError> {
    detail_from_value(parse_sanitized(body)?)
}

/// Parse a search endpoint body, keeping only the hit whose code matches.
///
/// The search answers with a list of standards (bare or under an envelope key).
/// When no hit carries a code field the whole body is read as a detail.
pub fn parse_search_result(body: &str, work_item: &str) -> Result<RawDetail, FetchError> {
    let value = parse_sanitized(body)?;
    let hits = match &value {
        Value::Array(items) => Some(items),
        Value::Object(object) => WRAPPER_KEYS
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_array)),
        _ => None,
    };
    let Some(hits) = hits else {
        return detail_from_value(value);
    };

    let coded: Vec<&Map<String, Value>> = hits
        .iter()
        .filter_map(Value::as_object)
        .filter(|hit| first_string(hit, CODE_KEYS).is_some())
        .collect();
    if coded.is_empty() {
        return detail_from_value(value);
    }

    coded
        .into_iter()
        .find(|hit| {
            first_string(hit, CODE_KEYS).is_some_and(|code| code.eq_ignore_ascii_case(work_item))
        })
        .map(|hit| detail_from_value(Value::Object(hit.clone())))
        .unwrap_or_else(|| {
            Err(FetchError::Malformed(format!(
                "search returned no entry for {}",
                work_item
            )))
        })
}

fn parse_sanitized(body: &str) -> Result<Value, FetchError> {
    let cleaned = sanitize_control_chars(body);
    serde_json::from_str(&cleaned)
        .map_err(|e| FetchError::Malformed(format!("invalid JSON after sanitizing: {}", e)))
}

fn detail_from_value(value: Value) -> Result<RawDetail, FetchError> {
    let mut object = match value {
        Value::Object(object) if !object.is_empty() => object,
        Value::Array(items) if !items.is_empty() => {
            let mut object = Map::new();
            object.insert("items".to_string(), Value::Array(items));
            object
        }
        _ => return Err(FetchError::Malformed("empty or non-object response".into())),
    };

    // The portal sometimes wraps the record in an envelope.
    let envelope = WRAPPER_KEYS.iter().find_map(|key| match object.get(*key) {
        Some(Value::Object(inner)) if !inner.is_empty() => Some(inner.clone()),
        _ => None,
    });
    if let Some(inner) = envelope {
        object = inner;
    }

    let title = first_string(&object, TITLE_KEYS).unwrap_or_default();
    let tables = object
        .iter()
        .filter_map(|(key, value)| match value {
            Value::Array(items) => Some(LabeledTable {
                header: key.clone(),
                rows: items.iter().filter_map(row_text).collect(),
            }),
            _ => None,
        })
        .collect();

    Ok(RawDetail { title, tables })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_header() {
        assert_eq!(classify_header("Entidades Certificadoras"), Some(TableKind::Certifiers));
        assert_eq!(classify_header("CURSOS DE CAPACITACIÓN"), Some(TableKind::Courses));
        assert_eq!(classify_header("Ocupación"), Some(TableKind::Occupations));
        assert_eq!(classify_header("Integrantes del comité"), Some(TableKind::CommitteeMembers));
        assert_eq!(classify_header("Documentos"), None);
    }

    #[test]
    fn test_classify_decomposed_header() {
        // "Ocupación" with a combining acute accent (NFD).
        assert_eq!(classify_header("Ocupacio\u{301}n"), Some(TableKind::Occupations));
        assert_eq!(
            classify_header("CERTIFICACIO\u{301}N Y CERTIFICADORES"),
            Some(TableKind::Certifiers)
        );
    }

    #[test]
    fn test_into_payload_skips_unknown_tables_and_header_rows() {
        let detail = RawDetail {
            title: "  EC0217 Impartición de cursos  ".to_string(),
            tables: vec![
                LabeledTable {
                    header: "Certificador".to_string(),
                    rows: vec![
                        "Certificador".to_string(),
                        " Instituto ABC S.A. de C.V. ".to_string(),
                        "".to_string(),
                    ],
                },
                LabeledTable {
                    header: "Anexos".to_string(),
                    rows: vec!["anexo.pdf".to_string()],
                },
                LabeledTable {
                    header: "Cursos".to_string(),
                    rows: vec!["Curso de formación".to_string()],
                },
            ],
        };

        let payload = detail.into_payload();
        assert_eq!(payload.title, "EC0217 Impartición de cursos");
        assert_eq!(payload.certifiers, vec!["Instituto ABC S.A. de C.V."]);
        assert_eq!(payload.courses, vec!["Curso de formación"]);
        assert!(payload.occupations.is_empty());
    }

    #[test]
    fn test_sanitize_control_chars() {
        assert_eq!(sanitize_control_chars("{\"a\":\u{1}\"b\u{85}\"}"), "{\"a\":\"b\"}");
        assert_eq!(sanitize_control_chars("a\tb\r\nc\u{b}"), "a b  c");
    }

    #[test]
    fn test_line_break_inside_name_keeps_words_apart() {
        let body = "{\"titulo\": \"X\", \"certificadores\": [\"Centro de\nEvaluacion\"]}";
        let payload = parse_api_detail(body).unwrap().into_payload();
        assert_eq!(payload.certifiers, vec!["Centro de Evaluacion"]);
    }

    #[test]
    fn test_parse_api_detail() {
        let body = "{\"results\": {\"titulo\": \"Impartición de cursos\u{0007}\", \
                    \"certificadores\": [{\"razonSocial\": \"Instituto ABC S.C.\"}, \"Otro Centro\"], \
                    \"cursos\": []}}";
        let detail = parse_api_detail(body).unwrap();
        assert_eq!(detail.title, "Impartición de cursos");

        let payload = detail.into_payload();
        assert_eq!(payload.certifiers, vec!["Instituto ABC S.C.", "Otro Centro"]);
        assert!(payload.courses.is_empty());
    }

    #[test]
    fn test_parse_api_detail_rejects_empty_and_garbage() {
        assert!(matches!(parse_api_detail("{}"), Err(FetchError::Malformed(_))));
        assert!(matches!(parse_api_detail("[]"), Err(FetchError::Malformed(_))));
        assert!(matches!(parse_api_detail("<html>"), Err(FetchError::Malformed(_))));
    }

    #[test]
    fn test_parse_search_result_picks_matching_code() {
        let body = r#"{"results": [
            {"codigo": "EC0217", "titulo": "Impartición de cursos", "certificadores": ["Otro Centro"]},
            {"codigo": "EC0217.01", "titulo": "Impartición presencial", "certificadores": ["Centro Uno"]}
        ]}"#;
        let payload = parse_search_result(body, "ec0217.01").unwrap().into_payload();
        assert_eq!(payload.title, "Impartición presencial");
        assert_eq!(payload.certifiers, vec!["Centro Uno"]);
    }

    #[test]
    fn test_parse_search_result_without_match() {
        let body = r#"[{"clave": "EC0001", "titulo": "Otro"}]"#;
        assert!(matches!(
            parse_search_result(body, "EC0002"),
            Err(FetchError::Malformed(_))
        ));

        // No code fields at all: read as a plain detail body.
        let body = r#"{"titulo": "Directo", "certificadores": ["Centro"]}"#;
        let payload = parse_search_result(body, "EC0002").unwrap().into_payload();
        assert_eq!(payload.certifiers, vec!["Centro"]);
    }
}
