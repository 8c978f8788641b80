//! Tolerant field access for raw API payloads
//!
//! The remote API is inconsistent about key casing (`ID`, `Id`, `id`) and
//! about whether numbers arrive as numbers or strings. Everything here is only
//! used by the response mappers in `api_client`.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

/// First non-null value among `names`, compared case-insensitively
pub fn field<'a>(obj: &'a Value, names: &[&str]) -> Option<&'a Value> {
    let map = obj.as_object()?;
    for name in names {
        if let Some(v) = map.get(*name) {
            if !v.is_null() {
                return Some(v);
            }
        }
    }
    for name in names {
        let found = map
            .iter()
            .find(|(k, v)| k.eq_ignore_ascii_case(name) && !v.is_null())
            .map(|(_, v)| v);
        if found.is_some() {
            return found;
        }
    }
    None
}

pub fn u64_field(obj: &Value, names: &[&str]) -> Option<u64> {
    field(obj, names).and_then(as_u64)
}

pub fn i64_field(obj: &Value, names: &[&str]) -> Option<i64> {
    field(obj, names).and_then(|v| match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

pub fn str_field(obj: &Value, names: &[&str]) -> Option<String> {
    field(obj, names).and_then(|v| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

pub fn bool_field(obj: &Value, names: &[&str]) -> Option<bool> {
    field(obj, names).and_then(|v| match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

pub fn time_field(obj: &Value, names: &[&str]) -> Option<DateTime<Utc>> {
    field(obj, names)
        .and_then(|v| v.as_str())
        .and_then(parse_timestamp)
}

fn as_u64(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Accepts `YYYY-MM-DD HH:MM:SS` (UTC) and RFC 3339
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Turn whatever the API returned for an image into an absolute URL.
///
/// Bare numeric values are badge ids and map to `<base>/Badge/<id>.png`.
pub fn media_url(base: &str, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.starts_with("http://") || raw.starts_with("https://") {
        return Some(raw.to_string());
    }
    let base = base.trim_end_matches('/');
    if raw.chars().all(|c| c.is_ascii_digit()) {
        return Some(format!("{}/Badge/{}.png", base, raw));
    }
    if raw.starts_with('/') {
        Some(format!("{}{}", base, raw))
    } else {
        Some(format!("{}/{}", base, raw))
    }
}
