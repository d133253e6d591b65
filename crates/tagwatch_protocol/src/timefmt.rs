//! Timestamp normalization.
//!
//! Registries report creation times with nanosecond precision that varies
//! between fetches of the same manifest. Everything is normalized to
//! whole-second ISO-8601 UTC so records compare stably across cycles.

use chrono::{DateTime, TimeZone, Utc};

const WHOLE_SECOND_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Format an epoch timestamp as whole-second ISO-8601 UTC.
///
/// Example: 1556035927 -> "2019-04-23T16:12:07Z"
pub fn format_epoch(ts: i64) -> String {
    match Utc.timestamp_opt(ts, 0) {
        chrono::LocalResult::Single(dt) => dt.format(WHOLE_SECOND_FORMAT).to_string(),
        _ => DateTime::<Utc>::UNIX_EPOCH.format(WHOLE_SECOND_FORMAT).to_string(),
    }
}

/// Normalize a registry-reported timestamp string.
///
/// Example: "2019-04-23T16:12:07.762980555Z" -> "2019-04-23T16:12:07Z"
///
/// RFC 3339 inputs are parsed and reformatted in UTC. Anything else keeps
/// its shape with the fractional-second run stripped.
pub fn normalize_created(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).format(WHOLE_SECOND_FORMAT).to_string());
    }
    Some(strip_fractional(raw))
}

/// Drop a trailing ".NNN..." run, keeping any suffix (e.g. "Z") after it.
fn strip_fractional(raw: &str) -> String {
    if let Some(dot) = raw.rfind('.') {
        let tail = &raw[dot + 1..];
        let digits = tail.chars().take_while(|c| c.is_ascii_digit()).count();
        let suffix = &tail[digits..];
        if digits > 0 && suffix.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return format!("{}{}", &raw[..dot], suffix);
        }
    }
    raw.to_string()
}
