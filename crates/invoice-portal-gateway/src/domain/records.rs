//! Wire records exchanged with the invoice authority.
//!
//! These mirror the authority's JSON exactly (snake_case, every field
//! optional). Turning them into domain types is the job of the access
//! components, not of the HTTP adapters.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Body of `GET /validate?token=<t>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationRecord {
    pub is_valid: bool,
    pub error: Option<String>,
    /// Kept as a string so that a malformed id fails closed instead of
    /// failing the whole decode.
    pub invoice_id: Option<String>,
    pub pdf_storage_key: Option<String>,
    pub invoice_number: Option<String>,
    #[serde(with = "flexible_datetime")]
    pub invoice_date: Option<NaiveDateTime>,
    #[serde(with = "flexible_datetime")]
    pub invoice_due_date: Option<NaiveDateTime>,
    pub signature_path: Option<String>,
    #[serde(deserialize_with = "null_as_false::deserialize")]
    pub viewed: bool,
}

/// Body of `GET /ensure-pdf?token=<t>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsurePdfRecord {
    pub storage_key: Option<String>,
    #[serde(deserialize_with = "null_as_false::deserialize")]
    pub was_regenerated: bool,
}

/// Body of `POST /signature?token=<t>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub signature_path: String,
}

/// Dates from the authority arrive as RFC 3339, as naive ISO date-times, or
/// as bare dates. All are reduced to a naive date-time on the authority's
/// own calendar (offsets are dropped, not applied).
pub(crate) mod flexible_datetime {
    use chrono::{DateTime, NaiveDate, NaiveDateTime};
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;
    use tracing::warn;

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => serializer.serialize_str(&v.format("%Y-%m-%dT%H:%M:%S").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Dates are display-only: a value we cannot read renders as absent
        // instead of failing the whole record.
        let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
        match raw {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => match parse(s.trim()) {
                Ok(date) => Ok(Some(date)),
                Err(e) => {
                    warn!(value = %s, error = %e, "Ignoring unreadable invoice date");
                    Ok(None)
                }
            },
            Some(other) => {
                warn!(value = %other, "Ignoring non-string invoice date");
                Ok(None)
            }
        }
    }

    pub fn parse(s: &str) -> Result<NaiveDateTime, String> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.naive_local());
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
            return Ok(dt);
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(|| format!("unrecognized date: {s}"))
    }
}

/// Flags sent as `null` read as `false`.
pub(crate) mod null_as_false {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<bool>::deserialize(deserializer).map(Option::unwrap_or_default)
    }
}
