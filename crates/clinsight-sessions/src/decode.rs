//! Lenient decoding of raw upstream records into typed [`Session`]s.
//!
//! The upstream dataset is loosely typed: numbers arrive as strings or JSON
//! numbers, two field names contain spaces, and individual records can be
//! arbitrarily malformed. Decoding a record therefore never fails; the worst
//! case is a session with more absent fields than the input warranted.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::error::SessionsError;
use crate::types::{Gender, Session, UserType};

/// Timestamp layout used by the upstream dataset.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Decode one raw record into a [`Session`].
///
/// Unknown keys are ignored. Recognized keys whose values fail to parse
/// become absent fields, never defaults.
pub fn decode_record(raw: &Value) -> Session {
    let Some(record) = raw.as_object() else {
        tracing::warn!("skipping non-object session record");
        return Session::default();
    };

    Session {
        duration_minutes: record.get("sessionduration").and_then(lenient_int),
        start_time: record.get("start_time").and_then(timestamp),
        stop_time: record.get("stop_time").and_then(timestamp),
        clinic_id: record.get("clinic_id").and_then(lenient_int),
        clinic_name: string_field(record.get("clinic_name")),
        // The space in "clinic latitude" and "birth year" is real: the
        // upstream schema is inconsistent about separators.
        clinic_latitude: string_field(record.get("clinic latitude")),
        clinic_longitude: string_field(record.get("clinic_longitude")),
        provider_id: record.get("provider_id").and_then(lenient_int),
        user_type: record
            .get("usertype")
            .and_then(Value::as_str)
            .and_then(UserType::from_raw),
        birth_year: record.get("birth year").and_then(lenient_int),
        gender: record
            .get("gender")
            .and_then(lenient_int)
            .and_then(Gender::from_code),
        distance: record.get("distance").and_then(lenient_float),
    }
}

/// Parse a query date: `YYYY-MM-DD` or `YYYY/MM/DD`, with an optional
/// trailing time component which is ignored.
///
/// The day is built by explicit year/month/day construction on [`NaiveDate`],
/// so no timezone conversion can ever shift it.
pub fn parse_day(text: &str) -> Result<NaiveDate, SessionsError> {
    let date_part = text
        .split_whitespace()
        .next()
        .ok_or_else(|| invalid_date(text))?;

    let mut fields = date_part.splitn(3, &['-', '/'][..]);
    let year = fields.next().and_then(|f| f.parse::<i32>().ok());
    let month = fields.next().and_then(|f| f.parse::<u32>().ok());
    let day = fields.next().and_then(|f| f.parse::<u32>().ok());

    match (year, month, day) {
        (Some(y), Some(m), Some(d)) => {
            NaiveDate::from_ymd_opt(y, m, d).ok_or_else(|| invalid_date(text))
        }
        _ => Err(invalid_date(text)),
    }
}

fn invalid_date(text: &str) -> SessionsError {
    SessionsError::InvalidInput(format!("unrecognized date: {text:?}"))
}

fn timestamp(value: &Value) -> Option<NaiveDateTime> {
    value
        .as_str()
        .and_then(|s| NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT).ok())
}

fn string_field(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_owned)
}

/// parseInt-style integer parsing: as many leading digits as are present,
/// the rest ignored. No leading digits means the field is absent, not zero.
fn lenient_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => leading_int(s),
        _ => None,
    }
}

fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// parseFloat-style decimal parsing over the longest valid leading prefix.
fn lenient_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => leading_float(s),
        _ => None,
    }
}

fn leading_float(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();

    let mut end = 0;
    if matches!(bytes.first(), Some(b'-') | Some(b'+')) {
        end += 1;
    }

    let mut seen_digit = false;
    let mut seen_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => {
                seen_digit = true;
                end += 1;
            }
            b'.' if !seen_dot => {
                seen_dot = true;
                end += 1;
            }
            _ => break,
        }
    }

    if !seen_digit {
        return None;
    }
    s[..end].parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_complete_record() {
        let raw = json!({
            "birth year": "1991",
            "clinic_id": 143,
            "clinic latitude": "42.366426",
            "clinic_longitude": "-71.105495",
            "clinic_name": "Apple Clinic",
            "distance": 904.6142985828,
            "gender": 1,
            "provider_id": 768,
            "sessionduration": 86,
            "start_time": "2015-02-01 13:59:49",
            "stop_time": "2015-02-01 15:25:49",
            "usertype": "Patient",
        });

        let session = decode_record(&raw);

        assert_eq!(session.duration_minutes, Some(86));
        assert_eq!(session.clinic_id, Some(143));
        assert_eq!(session.clinic_name.as_deref(), Some("Apple Clinic"));
        assert_eq!(session.clinic_latitude.as_deref(), Some("42.366426"));
        assert_eq!(session.clinic_longitude.as_deref(), Some("-71.105495"));
        assert_eq!(session.provider_id, Some(768));
        assert_eq!(session.user_type, Some(UserType::Patient));
        assert_eq!(session.birth_year, Some(1991));
        assert_eq!(session.gender, Some(Gender::Male));
        assert_eq!(session.distance, Some(904.6142985828));

        let start = session.start_time.unwrap();
        assert_eq!(start.to_string(), "2015-02-01 13:59:49");
        let stop = session.stop_time.unwrap();
        assert_eq!(stop.to_string(), "2015-02-01 15:25:49");
    }

    #[test]
    fn test_decode_duration_as_string() {
        let raw = json!({"sessionduration": "86"});
        assert_eq!(decode_record(&raw).duration_minutes, Some(86));
    }

    #[test]
    fn test_decode_int_with_trailing_garbage() {
        let raw = json!({"sessionduration": "86abc"});
        assert_eq!(decode_record(&raw).duration_minutes, Some(86));
    }

    #[test]
    fn test_decode_unparsable_int_is_absent_not_zero() {
        let raw = json!({"sessionduration": "abc", "birth year": ""});
        let session = decode_record(&raw);
        assert_eq!(session.duration_minutes, None);
        assert_eq!(session.birth_year, None);
    }

    #[test]
    fn test_decode_float_leading_prefix() {
        let raw = json!({"distance": "12.5km"});
        assert_eq!(decode_record(&raw).distance, Some(12.5));
    }

    #[test]
    fn test_decode_bad_timestamp_is_absent() {
        let raw = json!({"start_time": "02/01/2015 1pm", "stop_time": 42});
        let session = decode_record(&raw);
        assert_eq!(session.start_time, None);
        assert_eq!(session.stop_time, None);
    }

    #[test]
    fn test_decode_unknown_usertype_and_gender() {
        let raw = json!({"usertype": "Admin", "gender": 7});
        let session = decode_record(&raw);
        assert_eq!(session.user_type, None);
        assert_eq!(session.gender, None);
    }

    #[test]
    fn test_decode_unknown_keys_ignored() {
        let raw = json!({"sessionduration": 5, "flavor": "grape", "nested": {"x": 1}});
        let session = decode_record(&raw);
        assert_eq!(session.duration_minutes, Some(5));
    }

    #[test]
    fn test_decode_non_object_record() {
        assert_eq!(decode_record(&json!("not a record")), Session::default());
        assert_eq!(decode_record(&json!(null)), Session::default());
    }

    #[test]
    fn test_parse_day_dash_and_slash_agree() {
        let dashed = parse_day("2015-02-01").unwrap();
        let slashed = parse_day("2015/02/01").unwrap();
        assert_eq!(dashed, slashed);
        assert_eq!(dashed, NaiveDate::from_ymd_opt(2015, 2, 1).unwrap());
    }

    #[test]
    fn test_parse_day_ignores_trailing_time() {
        let day = parse_day("2015-02-01 00:10:58").unwrap();
        assert_eq!(day, NaiveDate::from_ymd_opt(2015, 2, 1).unwrap());
    }

    #[test]
    fn test_parse_day_rejects_garbage() {
        assert!(parse_day("yesterday").is_err());
        assert!(parse_day("2015-13-01").is_err());
        assert!(parse_day("").is_err());
    }
}
