//! Validation and repair of tool-call arguments
//!
//! Models answer with loosely-typed JSON: lists as comma-separated strings,
//! phone numbers as integers, `"N/A"` for unknowns, snake_case keys. Everything
//! here is normalized into a complete [`VolunteerOpportunity`]; only a missing
//! title or organization is a hard failure.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

use super::VolunteerOpportunity;

/// Why a tool answer could not become a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoerceError {
    /// The arguments were not a JSON object
    NotAnObject,
    /// Required fields were empty after normalization
    MissingRequired(Vec<String>),
}

const PLACEHOLDERS: &[&str] = &[
    "n/a",
    "na",
    "none",
    "null",
    "nil",
    "unknown",
    "not specified",
    "not available",
    "-",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%B %d, %Y", "%b %d, %Y", "%d %B %Y"];

/// Turn tool arguments into a normalized record for `source_url`
pub fn coerce_record(args: &Value, source_url: &str) -> Result<VolunteerOpportunity, CoerceError> {
    let obj = args.as_object().ok_or(CoerceError::NotAnObject)?;

    let record = VolunteerOpportunity {
        title: text(obj, &["title", "name"]),
        organization: text(obj, &["organization", "organization_name", "organizationName"]),
        tags: tags(obj),
        location: text(obj, &["location"]),
        description: text(obj, &["description", "extra"]),
        activity_type: text(obj, &["activityType", "activity_type"]),
        time_slot: text(obj, &["timeSlot", "time_slot"]),
        slot_availability: list(obj, &["slotAvailability", "slot_availability"]),
        date_start: date(obj, &["dateStart", "date_start"]),
        date_end: date(obj, &["dateEnd", "date_end"]),
        url: source_url.to_string(),
        contact_email: email(obj),
        contact_phone: text(
            obj,
            &["contactPhone", "contact_phone", "contactNumber", "contact_number"],
        ),
    };

    let mut missing = Vec::new();
    if record.title.is_empty() {
        missing.push("title".to_string());
    }
    if record.organization.is_empty() {
        missing.push("organization".to_string());
    }
    if !missing.is_empty() {
        return Err(CoerceError::MissingRequired(missing));
    }

    Ok(record)
}

/// First alias with a usable value, else the first non-null one
fn lookup<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    let present = || keys.iter().filter_map(|key| obj.get(*key));
    present()
        .find(|value| !is_blank(value))
        .or_else(|| present().find(|value| !value.is_null()))
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty() || is_placeholder(s),
        Value::Array(items) => items.iter().all(is_blank),
        _ => false,
    }
}

fn scalar_to_string(value: &Value) -> String {
    let raw = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => match n.as_i64() {
            Some(0) => String::new(),
            Some(i) => i.to_string(),
            None => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .map(scalar_to_string)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Null | Value::Object(_) => String::new(),
    };
    if is_placeholder(&raw) { String::new() } else { raw }
}

fn is_placeholder(value: &str) -> bool {
    PLACEHOLDERS.contains(&value.trim().to_ascii_lowercase().as_str())
}

fn text(obj: &Map<String, Value>, keys: &[&str]) -> String {
    lookup(obj, keys).map(scalar_to_string).unwrap_or_default()
}

fn list(obj: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    let items: Vec<String> = match lookup(obj, keys) {
        Some(Value::Array(values)) => values.iter().map(scalar_to_string).collect(),
        Some(Value::String(s)) => s.split(',').map(|part| part.trim().to_string()).collect(),
        Some(other) => vec![scalar_to_string(other)],
        None => Vec::new(),
    };

    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !item.is_empty() && !is_placeholder(&item) && !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

fn tags(obj: &Map<String, Value>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in list(obj, &["tags"]) {
        let tag = tag.to_lowercase();
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

fn date(obj: &Map<String, Value>, keys: &[&str]) -> String {
    let raw = text(obj, keys);
    if raw.is_empty() {
        return raw;
    }
    normalize_date(&raw).unwrap_or_default()
}

fn normalize_date(raw: &str) -> Option<String> {
    let parsed = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })?;
    Some(parsed.format("%Y-%m-%d").to_string())
}

fn email(obj: &Map<String, Value>) -> String {
    let raw = text(obj, &["contactEmail", "contact_email", "email"]);
    let raw = raw.strip_prefix("mailto:").unwrap_or(&raw).trim();
    if raw.contains('@') && !raw.contains(char::is_whitespace) {
        raw.to_string()
    } else {
        String::new()
    }
}
