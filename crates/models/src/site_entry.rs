use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;

/// Markers rejected by the content screen.
///
/// This is a naive substring filter kept as a placeholder. It is not a trust
/// boundary: consumers must still escape catalog text before rendering it.
pub const SCRIPT_MARKERS: &[&str] = &["<script", "javascript:"];

/// One stored catalog record.
///
/// `added_ts` is assigned by the server when the entry is first stored and is
/// never taken from the client. Older records written as `submitted_at` decode
/// into the same field.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SiteEntry {
    pub name: String,
    pub site_id: String,
    pub description: String,
    #[serde(alias = "submitted_at", with = "rfc3339")]
    pub added_ts: DateTime<Utc>,
}

/// Raw submission body. Every field is optional here so that an absent field
/// surfaces as `MissingFields` instead of a decode error.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SiteSubmission {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Validated, client-supplied part of an entry.
///
/// Field order is fixed, so `canonical_json` yields the same bytes for the same
/// content; the set-backed store relies on that for deduplication.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SiteContent {
    pub name: String,
    pub site_id: String,
    pub description: String,
}

/// Caps applied during validation.
#[derive(Clone, Debug)]
pub struct FieldLimits {
    pub max_name_len: usize,
    pub max_site_id_len: usize,
    pub max_description_len: usize,
    /// Require the 64-hex-character form of a content-derived site id.
    pub require_hex_site_id: bool,
}

impl Default for FieldLimits {
    fn default() -> Self {
        Self { max_name_len: 200, max_site_id_len: 128, max_description_len: 2000, require_hex_site_id: false }
    }
}

impl SiteSubmission {
    /// Check presence, length and (optionally) id format; trims surrounding whitespace.
    pub fn validate(self, limits: &FieldLimits) -> Result<SiteContent, ModelError> {
        let name = required(self.name)?;
        let site_id = required(self.site_id)?;
        let description = required(self.description)?;

        if site_id.chars().count() > limits.max_site_id_len {
            return Err(ModelError::FieldTooLong("site_id"));
        }
        if name.chars().count() > limits.max_name_len {
            return Err(ModelError::FieldTooLong("name"));
        }
        if description.chars().count() > limits.max_description_len {
            return Err(ModelError::FieldTooLong("description"));
        }
        if limits.require_hex_site_id && !is_hex_site_id(&site_id) {
            return Err(ModelError::InvalidSiteId);
        }
        Ok(SiteContent { name, site_id, description })
    }
}

fn required(field: Option<String>) -> Result<String, ModelError> {
    match field.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ModelError::MissingFields),
    }
}

impl SiteContent {
    /// Reject text carrying an obvious script-injection marker.
    pub fn screen(&self) -> Result<(), ModelError> {
        if contains_script_marker(&self.name) || contains_script_marker(&self.description) {
            return Err(ModelError::MaliciousContent);
        }
        Ok(())
    }

    pub fn canonical_json(&self) -> Result<String, ModelError> {
        serde_json::to_string(self).map_err(|e| ModelError::Encoding(e.to_string()))
    }

    pub fn from_canonical_json(raw: &str) -> Result<Self, ModelError> {
        serde_json::from_str(raw).map_err(|e| ModelError::Encoding(e.to_string()))
    }

    /// Attach the insertion timestamp, producing the stored record.
    pub fn stamp(self, added_ts: DateTime<Utc>) -> SiteEntry {
        SiteEntry { name: self.name, site_id: self.site_id, description: self.description, added_ts }
    }
}

impl SiteEntry {
    pub fn content(&self) -> SiteContent {
        SiteContent { name: self.name.clone(), site_id: self.site_id.clone(), description: self.description.clone() }
    }
}

pub fn contains_script_marker(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    SCRIPT_MARKERS.iter().any(|m| lower.contains(m))
}

/// 64 hexadecimal characters, the shape of a SHA-256 derived site id.
pub fn is_hex_site_id(site_id: &str) -> bool {
    site_id.len() == 64 && site_id.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Timestamps are written with second precision and a `Z` suffix.
pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Accepts RFC 3339, or an ISO-8601 date-time without offset which is read as UTC.
pub fn parse_ts(raw: &str) -> Result<DateTime<Utc>, ModelError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| ModelError::Encoding(format!("bad timestamp `{raw}`: {e}")))
}

mod rfc3339 {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_ts(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_ts(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn submission(name: &str, site_id: &str, description: &str) -> SiteSubmission {
        SiteSubmission {
            name: Some(name.into()),
            site_id: Some(site_id.into()),
            description: Some(description.into()),
        }
    }

    #[test]
    fn valid_submission_is_trimmed() {
        let content = submission("  Alice's Blog ", "abc123", "A personal blog\n")
            .validate(&FieldLimits::default())
            .unwrap();
        assert_eq!(content.name, "Alice's Blog");
        assert_eq!(content.description, "A personal blog");
    }

    #[test]
    fn empty_absent_or_blank_fields_are_missing() {
        let limits = FieldLimits::default();
        assert_eq!(submission("", "abc123", "x").validate(&limits), Err(ModelError::MissingFields));
        assert_eq!(submission("n", "   ", "x").validate(&limits), Err(ModelError::MissingFields));
        let absent = SiteSubmission { name: Some("n".into()), site_id: Some("id".into()), description: None };
        assert_eq!(absent.validate(&limits), Err(ModelError::MissingFields));
    }

    #[test]
    fn overlong_fields_are_named() {
        let limits = FieldLimits { max_name_len: 3, ..FieldLimits::default() };
        assert_eq!(submission("abcd", "id", "d").validate(&limits), Err(ModelError::FieldTooLong("name")));
    }

    #[test]
    fn hex_site_id_only_enforced_when_enabled() {
        let strict = FieldLimits { require_hex_site_id: true, ..FieldLimits::default() };
        assert_eq!(submission("n", "abc123", "d").validate(&strict), Err(ModelError::InvalidSiteId));
        let hex = "a".repeat(64);
        assert!(submission("n", &hex, "d").validate(&strict).is_ok());
        assert!(submission("n", "abc123", "d").validate(&FieldLimits::default()).is_ok());
    }

    #[test]
    fn screen_flags_script_markers_case_insensitively() {
        let bad = SiteContent { name: "<SCRIPT>alert(1)</SCRIPT>".into(), site_id: "x".into(), description: "d".into() };
        assert_eq!(bad.screen(), Err(ModelError::MaliciousContent));
        let bad_link = SiteContent { name: "n".into(), site_id: "x".into(), description: "JavaScript:void(0)".into() };
        assert_eq!(bad_link.screen(), Err(ModelError::MaliciousContent));
        let fine = SiteContent { name: "Scripting tips".into(), site_id: "x".into(), description: "about java".into() };
        assert!(fine.screen().is_ok());
    }

    #[test]
    fn canonical_json_has_fixed_field_order() {
        let c = SiteContent { name: "n".into(), site_id: "s".into(), description: "d".into() };
        assert_eq!(c.canonical_json().unwrap(), r#"{"name":"n","site_id":"s","description":"d"}"#);
        assert_eq!(SiteContent::from_canonical_json(&c.canonical_json().unwrap()).unwrap(), c);
    }

    #[test]
    fn entry_serializes_added_ts_and_accepts_submitted_at() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let entry = SiteContent { name: "n".into(), site_id: "s".into(), description: "d".into() }.stamp(ts);
        let v = serde_json::to_value(&entry).unwrap();
        assert_eq!(v["added_ts"], "2024-05-01T12:00:00Z");

        let legacy: SiteEntry = serde_json::from_str(
            r#"{"name":"n","site_id":"s","description":"d","submitted_at":"2024-05-01T12:00:00+00:00"}"#,
        )
        .unwrap();
        assert_eq!(legacy.added_ts, ts);
    }

    #[test]
    fn naive_timestamps_are_read_as_utc() {
        let ts = parse_ts("2024-05-01T12:00:00.250000").unwrap();
        assert_eq!(format_ts(&ts), "2024-05-01T12:00:00Z");
        assert!(parse_ts("yesterday").is_err());
    }
}
