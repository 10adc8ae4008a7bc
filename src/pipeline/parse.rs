//! Response parsing: turn untrusted model text into an [`AnalysisResult`].
//!
//! ## Why so lenient?
//!
//! The prompt asks for bare JSON, but models still wrap answers in
//! ` ```json ` fences, vary key casing (`actionItems`, `ActionItems`,
//! `action_items`), emit `null` where a list belongs, or return prose. None
//! of that may fail the meeting save that triggered the analysis, so every
//! stage either produces a typed value or a tagged [`ParseFallback`].
//!
//! ## Stages
//!
//! 1. Strip code fences: the opening fence line (with optional language
//!    tag), a trailing closing fence, then any stray fence markers left
//!    anywhere in the text.
//! 2. Structural validation: the cleaned text must be a JSON document, or
//!    we fall back with "invalid structure". No partial recovery.
//! 3. Typed deserialization with case-insensitive keys, or fall back with
//!    "deserialization failed".
//! 4. Normalisation: absent/null `actionItems` become an empty list; item
//!    fields get their defaults.

use crate::error::ParseFallback;
use crate::output::{ActionItem, AnalysisResult, Priority};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

const FENCE: &str = "```";

/// Longest slice of a rejected response included in log output.
const LOG_PREVIEW_CHARS: usize = 200;

/// Parse a model response, degrading to a fallback result on any failure.
///
/// Never fails: the returned value always has a usable summary and a
/// present (possibly empty) action-item list.
pub fn parse_response(raw: &str) -> AnalysisResult {
    match try_parse(raw) {
        Ok(result) => result,
        Err(fallback) => {
            warn!("Failed to parse AI response ({})", fallback);
            debug!("Rejected response: {:?}", preview(raw));
            fallback.into_result()
        }
    }
}

/// Parse a model response, reporting why it could not be used.
pub fn try_parse(raw: &str) -> Result<AnalysisResult, ParseFallback> {
    let cleaned = strip_code_fences(raw);

    let document: Value =
        serde_json::from_str(&cleaned).map_err(|e| ParseFallback::InvalidStructure {
            detail: e.to_string(),
        })?;

    let document = match fold_keys(document) {
        object @ Value::Object(_) => object,
        Value::Null => {
            return Err(ParseFallback::DeserializationFailed {
                detail: "document is null".to_string(),
            })
        }
        other => {
            return Err(ParseFallback::DeserializationFailed {
                detail: format!("expected a JSON object, found {}", json_kind(&other)),
            })
        }
    };

    let parsed: RawAnalysis =
        serde_json::from_value(document).map_err(|e| ParseFallback::DeserializationFailed {
            detail: e.to_string(),
        })?;

    Ok(normalise(parsed))
}

// ── Stage 1: Strip code fences ───────────────────────────────────────────────

static RE_STRAY_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)```(?:json)?").unwrap());

/// Remove Markdown code fences around (and inside) a model response.
pub fn strip_code_fences(input: &str) -> String {
    let trimmed = input.trim();

    let unwrapped = match trimmed.split_once('\n') {
        Some((_opening, body)) if trimmed.starts_with(FENCE) => {
            let body = body.trim_end();
            body.strip_suffix(FENCE).unwrap_or(body)
        }
        _ => trimmed,
    };

    RE_STRAY_FENCE.replace_all(unwrapped, "").trim().to_string()
}

// ── Stage 3: Case-insensitive typed view ─────────────────────────────────────

/// Shape of the document after key folding. Everything is optional here;
/// defaults are applied in [`normalise`].
#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default, rename = "actionitems")]
    action_items: Option<Vec<Option<RawActionItem>>>,
}

#[derive(Debug, Deserialize)]
struct RawActionItem {
    #[serde(default)]
    assignee: Option<String>,
    #[serde(default)]
    task: Option<String>,
    #[serde(default, rename = "duedate")]
    due_date: Option<Value>,
    #[serde(default)]
    priority: Option<Value>,
}

/// Lowercase every object key and drop `_`/`-`, so `ActionItems`,
/// `actionItems` and `action_items` all become `actionitems`.
fn fold_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (fold_key(&k), fold_keys(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(fold_keys).collect()),
        other => other,
    }
}

fn fold_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

// ── Stage 4: Normalise ───────────────────────────────────────────────────────

fn normalise(raw: RawAnalysis) -> AnalysisResult {
    let action_items = raw
        .action_items
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .filter_map(normalise_item)
        .collect();

    AnalysisResult {
        summary: raw.summary.unwrap_or_default().trim().to_string(),
        action_items,
    }
}

fn normalise_item(raw: RawActionItem) -> Option<ActionItem> {
    let task = raw.task.unwrap_or_default().trim().to_string();
    if task.is_empty() {
        debug!("Dropping action item without a task");
        return None;
    }

    let priority = raw
        .priority
        .as_ref()
        .and_then(Value::as_str)
        .and_then(Priority::from_label)
        .unwrap_or_default();

    let due_date = raw
        .due_date
        .as_ref()
        .and_then(Value::as_str)
        .and_then(parse_due_date);

    Some(ActionItem {
        assignee: raw.assignee.unwrap_or_default().trim().to_string(),
        task,
        due_date,
        priority,
    })
}

/// Accept `YYYY-MM-DD`, RFC 3339, or a bare `YYYY-MM-DDTHH:MM:SS` timestamp.
fn parse_due_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("null") {
        return None;
    }
    let parsed = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        });
    if parsed.is_none() {
        debug!("Ignoring unparseable due date {:?}", s);
    }
    parsed
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn preview(raw: &str) -> String {
    raw.chars().take(LOG_PREVIEW_CHARS).collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────
