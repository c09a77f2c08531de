//! Turning provider reply text into annotations
//!
//! Models wrap JSON in markdown fences, prose and wrapper objects. The parser
//! scans the reply once for top-level JSON spans and takes the first one that
//! yields an annotation list. Individual malformed items are skipped; a reply
//! with nothing salvageable becomes a single diagnostic placeholder.

use crate::annotation::{Annotation, Category, Severity};
use crate::util::sanitize_provider_message;
use serde_json::Value;

const MAX_JSON_SPANS: usize = 4;
const WRAPPER_KEYS: &[&str] = &["annotations", "results", "items", "data"];
/// How deep a nested wrapper object (`{"analysis": {"annotations": [...]}}`) is searched
const MAX_WRAPPER_DEPTH: usize = 2;

/// Annotations recovered from one reply
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAnnotations {
    pub annotations: Vec<Annotation>,
    /// Set when the reply could not be salvaged and `annotations` holds the placeholder.
    pub failure: Option<String>,
    /// Items dropped because they could not be read as annotations
    pub skipped: usize,
}

/// Remove a comma left dangling before a closing bracket.
fn drop_trailing_comma(span: &mut String) {
    let end = span.trim_end().len();
    if span[..end].ends_with(',') {
        span.truncate(end - 1);
    }
}

/// Top-level `{...}` and `[...]` spans of a reply, in order. Prose and fence
/// markers between them are skipped and trailing commas are dropped on the
/// way. A span with mismatched brackets is abandoned.
fn json_spans(content: &str) -> Vec<String> {
    let mut spans = Vec::new();
    let mut span = String::new();
    let mut closers: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for ch in content.chars() {
        if closers.is_empty() {
            match ch {
                '{' => closers.push('}'),
                '[' => closers.push(']'),
                _ => continue,
            }
            span.push(ch);
            continue;
        }

        if in_string {
            span.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => closers.push('}'),
            '[' => closers.push(']'),
            '}' | ']' => {
                if closers.pop() != Some(ch) {
                    closers.clear();
                    span.clear();
                    continue;
                }
                drop_trailing_comma(&mut span);
            }
            _ => {}
        }
        span.push(ch);

        if closers.is_empty() {
            spans.push(std::mem::take(&mut span));
            if spans.len() >= MAX_JSON_SPANS {
                break;
            }
        }
    }
    spans
}

/// Typographic quotes, tried only when a span does not parse as-is.
fn straighten_quotes(span: &str) -> String {
    span.replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
}

fn parse_span(span: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(span).or_else(|_| serde_json::from_str(&straighten_quotes(span)))
}

/// The annotation array inside a parsed value, if there is one.
fn annotation_items(value: Value, depth: usize) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => {
            for key in WRAPPER_KEYS {
                if let Some(Value::Array(items)) = map.remove(*key) {
                    return Some(items);
                }
            }
            // A lone annotation object
            if map.contains_key("x") && map.contains_key("y") {
                return Some(vec![Value::Object(map)]);
            }
            if depth == 0 {
                return None;
            }
            map.into_iter()
                .map(|(_, nested)| nested)
                .filter(Value::is_object)
                .find_map(|nested| annotation_items(nested, depth - 1))
        }
        _ => None,
    }
}

fn coerce_number(value: &mut Value) {
    if let Value::String(raw) = value {
        if let Ok(parsed) = raw.trim().trim_end_matches('%').parse::<f64>() {
            if let Some(number) = serde_json::Number::from_f64(parsed) {
                *value = Value::Number(number);
            }
        }
    }
}

fn annotation_from_value(value: Value) -> Result<Annotation, String> {
    let Value::Object(mut map) = value else {
        return Err("item is not an object".to_string());
    };

    match map.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => {}
        Some(Value::Number(n)) => {
            let id = n.to_string();
            map.insert("id".into(), Value::String(id));
        }
        _ => {
            map.insert(
                "id".into(),
                Value::String(uuid::Uuid::new_v4().to_string()),
            );
        }
    }
    for axis in ["x", "y"] {
        if let Some(v) = map.get_mut(axis) {
            coerce_number(v);
        }
    }

    let mut annotation: Annotation =
        serde_json::from_value(Value::Object(map)).map_err(|e| e.to_string())?;
    // Verdicts come from the validator, never from the model.
    annotation.validation_score = None;
    annotation.validation_passed = None;
    annotation.evidence_level = None;
    annotation.validation_method = None;
    annotation.validation_reasoning = None;
    Ok(annotation)
}

/// Diagnostic annotation standing in for a reply that could not be parsed.
pub fn placeholder_annotation(reason: &str) -> Annotation {
    let mut annotation = Annotation::new(
        format!("parse-failure-{}", uuid::Uuid::new_v4()),
        50.0,
        50.0,
    )
    .with_title("Analysis response could not be read")
    .with_description(sanitize_provider_message(reason))
    .with_category(Category::Ux);
    annotation.severity = Severity::Enhancement;
    annotation
}

/// Parse a provider reply into annotations.
pub fn parse_annotations(content: &str) -> ParsedAnnotations {
    let mut last_err = String::from("no JSON found in response");
    for span in json_spans(content) {
        let value = match parse_span(&span) {
            Ok(value) => value,
            Err(err) => {
                last_err = err.to_string();
                continue;
            }
        };
        let Some(items) = annotation_items(value, MAX_WRAPPER_DEPTH) else {
            last_err = "JSON did not contain an annotation list".to_string();
            continue;
        };

        let total = items.len();
        let mut annotations = Vec::with_capacity(total);
        for (position, item) in items.into_iter().enumerate() {
            match annotation_from_value(item) {
                Ok(annotation) => annotations.push(annotation),
                Err(err) => {
                    tracing::warn!(position, error = %err, "Skipping unreadable annotation");
                    last_err = err;
                }
            }
        }
        // An empty list is a legitimate answer; a list of only broken items is not.
        if annotations.is_empty() && total > 0 {
            continue;
        }
        return ParsedAnnotations {
            skipped: total - annotations.len(),
            annotations,
            failure: None,
        };
    }

    let reason = format!("Failed to parse provider response: {}", last_err);
    tracing::warn!(
        error = %last_err,
        content = %sanitize_provider_message(content),
        "Provider response could not be parsed"
    );
    ParsedAnnotations {
        annotations: vec![placeholder_annotation(&reason)],
        failure: Some(reason),
        skipped: 0,
    }
}
