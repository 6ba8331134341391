//! Response sanitizer: turns raw model text into a JSON object.
//!
//! Models frequently wrap JSON in Markdown fences or surround it with prose. The sanitizer
//! handles exactly these cases:
//!
//! - A leading fence (```` ``` ```` or ```` ```json ````) is removed; a trailing fence is removed
//!   when present. An unterminated fence therefore only loses its opener.
//! - Text outside the outermost `{ ... }` pair is discarded, so nested braces survive intact.
//! - Anything that still fails strict JSON parsing, or parses to a non-object, is replaced by
//!   [`degraded_payload`]. The sanitizer never fails.

use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

use super::types::MetricResult;

const FENCE: &str = "```";

/// Parse a raw model reply into a JSON object, degrading instead of failing.
pub fn sanitize_model_response(raw: &str) -> Map<String, Value> {
    let unfenced = strip_code_fence(raw.trim());
    let candidate = outer_object(unfenced).unwrap_or(unfenced);

    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            tracing::debug!(kind = json_kind(&other), "Model response was not a JSON object");
            degraded_payload()
        }
        Err(error) => {
            tracing::debug!(error = %error, "Model response was not valid JSON");
            degraded_payload()
        }
    }
}

/// Canned payload substituted for unparseable replies.
pub fn degraded_payload() -> Map<String, Value> {
    let value = json!({
        "analysis": {
            "default": {
                "summary": "The model response could not be parsed.",
                "key_points": [],
                "metrics": {},
                "recommendations": ["Retry the analysis."]
            }
        },
        "overall_summary": "Analysis unavailable.",
        "confidence_score": 0
    });
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Pull `analysis.<metric>` out of a sanitized payload and normalize it.
///
/// Returns `None` only when the payload has no entry for `metric`. An entry that is present
/// is repaired rather than rejected: a missing summary becomes empty, and a bare scalar entry
/// is taken as the summary.
pub fn extract_metric(payload: &Map<String, Value>, metric: &str) -> Option<MetricResult> {
    let entry = payload.get("analysis")?.as_object()?.get(metric)?;

    let Value::Object(fields) = entry else {
        return Some(MetricResult {
            summary: scalar_text(entry).unwrap_or_default(),
            key_points: Vec::new(),
            metrics: BTreeMap::new(),
            recommendations: Vec::new(),
            fallback: false,
        });
    };

    Some(MetricResult {
        summary: fields
            .get("summary")
            .and_then(scalar_text)
            .unwrap_or_default(),
        key_points: text_list(fields.get("key_points")),
        metrics: text_map(fields.get("metrics")),
        recommendations: text_list(fields.get("recommendations")),
        fallback: false,
    })
}

fn strip_code_fence(text: &str) -> &str {
    let Some(after_open) = text.strip_prefix(FENCE) else {
        return text;
    };
    // drop the language tag on the opening line
    let body = match after_open.find('\n') {
        Some(newline) => &after_open[newline + 1..],
        None => after_open.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
    body.trim_end()
        .strip_suffix(FENCE)
        .unwrap_or(body)
        .trim()
}

fn outer_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.trim().to_string()),
        Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

fn text_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(scalar_text)
            .filter(|item| !item.is_empty())
            .collect(),
        Some(other) => scalar_text(other)
            .filter(|item| !item.is_empty())
            .into_iter()
            .collect(),
        None => Vec::new(),
    }
}

fn text_map(value: Option<&Value>) -> BTreeMap<String, String> {
    match value {
        Some(Value::Object(entries)) => entries
            .iter()
            .filter_map(|(key, value)| scalar_text(value).map(|text| (key.clone(), text)))
            .collect(),
        _ => BTreeMap::new(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
