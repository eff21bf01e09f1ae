use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Numbers above this are milliseconds since the epoch.
const EPOCH_MILLIS_FLOOR: f64 = 1e12;
/// Numbers above this (and not above the millisecond floor) are seconds since the epoch.
const EPOCH_SECONDS_FLOOR: f64 = 1e9;

static NUMERIC_TIMESTAMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{10,13}(\.\d+)?$").unwrap());

/// Offset-carrying layouts tried after RFC 3339 and RFC 2822.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
];

/// Layouts without an offset; read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// A recognized timestamp value, before it is turned into an instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimestampEncoding {
    Iso8601(DateTime<Utc>),
    EpochSeconds(f64),
    EpochMillis(f64),
}

impl TimestampEncoding {
    pub fn classify(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Self::classify_str(s),
            Value::Number(n) => n.as_f64().and_then(Self::classify_number),
            Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Date strings win over numeric strings; a bare number only counts
    /// when it has 10 to 13 integer digits.
    pub fn classify_str(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Some(dt) = parse_datetime_str(raw) {
            return Some(Self::Iso8601(dt));
        }
        if NUMERIC_TIMESTAMP.is_match(raw) {
            return raw.parse::<f64>().ok().and_then(Self::classify_number);
        }
        None
    }

    pub fn classify_number(num: f64) -> Option<Self> {
        if !num.is_finite() {
            return None;
        }
        if num > EPOCH_MILLIS_FLOOR {
            Some(Self::EpochMillis(num))
        } else if num > EPOCH_SECONDS_FLOOR {
            Some(Self::EpochSeconds(num))
        } else {
            None
        }
    }

    /// `None` when the value falls outside the representable range.
    pub fn to_instant(self) -> Option<DateTime<Utc>> {
        let millis = match self {
            Self::Iso8601(dt) => return Some(canonical(dt)),
            Self::EpochSeconds(secs) => secs * 1000.0,
            Self::EpochMillis(millis) => millis,
        };
        DateTime::from_timestamp_millis(millis.trunc() as i64)
    }
}

pub fn to_instant(value: &Value) -> Option<DateTime<Utc>> {
    TimestampEncoding::classify(value).and_then(TimestampEncoding::to_instant)
}

/// Instants are compared and deduplicated at millisecond precision.
pub fn canonical(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.trunc_subsecs(3)
}

/// `2024-01-01T00:00:00.000Z`
pub fn canonical_string(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_datetime_str(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn new_year() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn iso_and_epoch_encodings_agree() {
        assert_eq!(to_instant(&json!("2024-01-01T00:00:00Z")), Some(new_year()));
        assert_eq!(to_instant(&json!("2024-01-01T01:00:00+01:00")), Some(new_year()));
        assert_eq!(to_instant(&json!(1704067200)), Some(new_year()));
        assert_eq!(to_instant(&json!(1704067200000u64)), Some(new_year()));
        assert_eq!(to_instant(&json!("1704067200")), Some(new_year()));
        assert_eq!(to_instant(&json!("1704067200000")), Some(new_year()));
    }

    #[test]
    fn classifies_by_magnitude() {
        assert!(matches!(
            TimestampEncoding::classify(&json!(1704067200)),
            Some(TimestampEncoding::EpochSeconds(_))
        ));
        assert!(matches!(
            TimestampEncoding::classify(&json!(1704067200123u64)),
            Some(TimestampEncoding::EpochMillis(_))
        ));
        assert!(matches!(
            TimestampEncoding::classify(&json!("2024-01-01")),
            Some(TimestampEncoding::Iso8601(_))
        ));
    }

    #[test]
    fn rejects_small_and_non_numeric_values() {
        assert_eq!(to_instant(&json!(500000000)), None);
        assert_eq!(to_instant(&json!(1_000_000_000)), None);
        assert_eq!(to_instant(&json!(-1704067200)), None);
        assert_eq!(to_instant(&json!("500000000")), None);
        assert_eq!(to_instant(&json!("yesterday")), None);
        assert_eq!(to_instant(&json!("")), None);
        assert_eq!(to_instant(&json!(true)), None);
        assert_eq!(to_instant(&json!(null)), None);
        assert_eq!(to_instant(&json!({ "seconds": 1704067200 })), None);
        assert_eq!(to_instant(&json!([1704067200])), None);
    }

    #[test]
    fn fractional_seconds_keep_millisecond_precision() {
        let expected = new_year() + chrono::TimeDelta::milliseconds(500);
        assert_eq!(to_instant(&json!(1704067200.5)), Some(expected));
        assert_eq!(to_instant(&json!("1704067200.5")), Some(expected));
    }

    #[test]
    fn sub_millisecond_precision_is_dropped() {
        let a = to_instant(&json!("2024-01-01T00:00:00.123456Z")).unwrap();
        let b = to_instant(&json!("2024-01-01T00:00:00.123Z")).unwrap();
        assert_eq!(a, b);
        assert_eq!(canonical_string(&a), "2024-01-01T00:00:00.123Z");
    }

    #[test]
    fn accepts_loose_date_layouts() {
        assert_eq!(parse_datetime_str("2024-01-01 00:00:00"), Some(new_year()));
        assert_eq!(parse_datetime_str("2024-01-01T00:00"), Some(new_year()));
        assert_eq!(parse_datetime_str("2024-01-01"), Some(new_year()));
        assert_eq!(
            parse_datetime_str("Mon, 01 Jan 2024 00:00:00 +0000"),
            Some(new_year())
        );
        assert_eq!(parse_datetime_str("2024-01-01 02:00:00+0200"), Some(new_year()));
    }

    #[test]
    fn out_of_range_epoch_is_discarded() {
        assert_eq!(to_instant(&json!(1e300)), None);
    }
}
