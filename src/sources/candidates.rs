//! Parsing of generative model output.
//!
//! Model text is untrusted: it may be fenced in Markdown, wrapped in prose, or
//! shaped differently than asked. Parsing never fails; anything that does not
//! validate against the expected item schema is dropped.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::LazyLock;

static ARRAY_SPAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\[.*\]").expect("valid regex"));

const MAX_NAME_LEN: usize = 200;

/// One organization named by the model
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub address: Option<String>,
    pub website: Option<String>,
}

/// Details returned by an enrichment prompt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    pub description: Option<String>,
    pub capacity: Option<u32>,
    pub price_range: Option<String>,
    pub amenities: Vec<String>,
    pub website: Option<String>,
}

/// Removes a surrounding Markdown code fence (with or without a language tag).
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the language tag on the opening line
    let body = match after_open.find('\n') {
        Some(newline) => &after_open[newline + 1..],
        None => after_open.trim_start_matches("json"),
    };
    body.trim_end().trim_end_matches("```").trim()
}

fn parse_value(text: &str) -> Option<Value> {
    let text = strip_code_fence(text);
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }
    let span = ARRAY_SPAN.find(text)?;
    serde_json::from_str(span.as_str()).ok()
}

/// The top-level array, also accepting an object that wraps exactly one array.
fn array_items(text: &str) -> Vec<Value> {
    match parse_value(text) {
        Some(Value::Array(items)) => items,
        Some(Value::Object(map)) => {
            let mut arrays = map.into_iter().filter_map(|(_, v)| match v {
                Value::Array(items) => Some(items),
                _ => None,
            });
            match (arrays.next(), arrays.next()) {
                (Some(items), None) => items,
                _ => Vec::new(),
            }
        }
        _ => Vec::new(),
    }
}

fn clean_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Checks one item against the [`Candidate`] schema. A bare string is read as a name.
fn validate_candidate(item: Value) -> Option<Candidate> {
    let candidate = match item {
        Value::String(name) => Candidate {
            name,
            address: None,
            website: None,
        },
        Value::Object(_) => serde_json::from_value::<Candidate>(item).ok()?,
        _ => return None,
    };

    let name = trimmed(Some(candidate.name)).filter(|n| n.chars().count() <= MAX_NAME_LEN)?;
    Some(Candidate {
        name,
        address: trimmed(candidate.address),
        website: trimmed(candidate.website),
    })
}

/// Organizations listed in a model response. Empty when nothing validates.
pub fn parse_candidates(text: &str) -> Vec<Candidate> {
    array_items(text).into_iter().filter_map(validate_candidate).collect()
}

/// A list of plain names, e.g. the known-type vocabulary.
pub fn parse_string_list(text: &str) -> Vec<String> {
    array_items(text)
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Object(fields) => clean_string(fields.get("name")),
            _ => None,
        })
        .filter(|s| !s.is_empty() && s.chars().count() <= MAX_NAME_LEN)
        .collect()
}

/// Enrichment details from a JSON object response.
pub fn parse_enrichment(text: &str) -> Option<Enrichment> {
    let text = strip_code_fence(text);
    let value: Value = serde_json::from_str(text).ok().or_else(|| {
        let start = text.find('{')?;
        let end = text.rfind('}')?;
        serde_json::from_str(text.get(start..=end)?).ok()
    })?;
    let fields = value.as_object()?;

    let capacity = match fields.get("capacity") {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().split(|c: char| !c.is_ascii_digit()).next()?.parse().ok(),
        _ => None,
    };
    let amenities = fields
        .get("amenities")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| clean_string(Some(v)))
                .collect()
        })
        .unwrap_or_default();

    Some(Enrichment {
        description: clean_string(fields.get("description")),
        capacity,
        price_range: clean_string(fields.get("priceRange")),
        amenities,
        website: clean_string(fields.get("website")),
    })
}

/// First `max_chars` characters, for progress display.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
