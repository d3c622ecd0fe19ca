//! Serde helpers for `requestedAt`, which the service emits either as an
//! ISO 8601 string or as an epoch number (seconds or milliseconds).
//! Strings without a zone are read as UTC.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer, de};

// Anything at or above this is read as milliseconds (year 33658 in seconds).
const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Number(i64),
    Text(String),
}

pub fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value.unsigned_abs() >= MILLIS_THRESHOLD as u64 {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    }
}

pub fn parse(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(value) = text.parse::<i64>() {
        return from_epoch(value);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_rfc3339())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Number(value) => from_epoch(value)
            .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {value}"))),
        RawTimestamp::Text(text) => {
            parse(&text).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {text}")))
        }
    }
}
