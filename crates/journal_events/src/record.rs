use serde::Deserialize;
use serde_json::Value;

use crate::{Cursor, RecordParseError};

/// A single journal entry as emitted by `journalctl -o json`.
///
/// Every field except `message` is optional: journald omits fields freely and the bridge must
/// never reject an entry just because it is sparse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JournalRecord {
    pub cursor: Option<Cursor>,
    pub realtime_micros: Option<i64>,
    pub priority: Option<String>,
    pub syslog_identifier: Option<String>,
    pub message: String,
    pub unit: Option<String>,
    pub hostname: Option<String>,
    pub pid: Option<i64>,
    pub uid: Option<i64>,
    pub gid: Option<i64>,
}

/// journald field encodings: plain strings, byte arrays for non-UTF-8 payloads, and arrays for
/// fields that appear more than once in an entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum FieldValue {
    Text(String),
    Integer(i64),
    Bytes(Vec<u8>),
    Other(Value),
}

impl FieldValue {
    fn into_text(self) -> Option<String> {
        match self {
            FieldValue::Text(text) => Some(text),
            FieldValue::Integer(n) => Some(n.to_string()),
            FieldValue::Bytes(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            FieldValue::Other(Value::Array(values)) => values
                .into_iter()
                .find_map(|value| serde_json::from_value::<FieldValue>(value).ok())
                .and_then(FieldValue::into_text),
            FieldValue::Other(Value::Null) => None,
            FieldValue::Other(other) => Some(other.to_string()),
        }
    }

    fn into_integer(self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(n),
            other => other.into_text()?.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawEntry {
    #[serde(rename = "__CURSOR", default)]
    cursor: Option<FieldValue>,
    #[serde(rename = "__REALTIME_TIMESTAMP", default)]
    realtime: Option<FieldValue>,
    #[serde(rename = "PRIORITY", default)]
    priority: Option<FieldValue>,
    #[serde(rename = "SYSLOG_IDENTIFIER", default)]
    syslog_identifier: Option<FieldValue>,
    #[serde(rename = "MESSAGE", default)]
    message: Option<FieldValue>,
    #[serde(rename = "_SYSTEMD_UNIT", default)]
    unit: Option<FieldValue>,
    #[serde(rename = "_HOSTNAME", default)]
    hostname: Option<FieldValue>,
    #[serde(rename = "_PID", default)]
    pid: Option<FieldValue>,
    #[serde(rename = "_UID", default)]
    uid: Option<FieldValue>,
    #[serde(rename = "_GID", default)]
    gid: Option<FieldValue>,
}

impl From<RawEntry> for JournalRecord {
    fn from(raw: RawEntry) -> Self {
        let text = |field: Option<FieldValue>| field.and_then(FieldValue::into_text);
        let integer = |field: Option<FieldValue>| field.and_then(FieldValue::into_integer);

        JournalRecord {
            cursor: text(raw.cursor).and_then(Cursor::new),
            realtime_micros: integer(raw.realtime),
            priority: text(raw.priority),
            syslog_identifier: text(raw.syslog_identifier),
            message: text(raw.message).unwrap_or_default(),
            unit: text(raw.unit),
            hostname: text(raw.hostname),
            pid: integer(raw.pid),
            uid: integer(raw.uid),
            gid: integer(raw.gid),
        }
    }
}

/// Parses a single line of `journalctl -o json` output.
///
/// - Returns `Ok(None)` for empty / whitespace-only lines.
/// - Returns `Err` when the line is not a JSON object; callers surface those as diagnostics.
pub fn parse_entry_line(line: &str) -> Result<Option<JournalRecord>, RecordParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(line).map_err(RecordParseError::InvalidJson)?;
    let found = match &value {
        Value::Object(_) => None,
        Value::Null => Some("null"),
        Value::Bool(_) => Some("boolean"),
        Value::Number(_) => Some("number"),
        Value::String(_) => Some("string"),
        Value::Array(_) => Some("array"),
    };
    if let Some(found) = found {
        return Err(RecordParseError::NotAnObject { found });
    }

    let raw: RawEntry = serde_json::from_value(value).map_err(RecordParseError::Shape)?;
    Ok(Some(raw.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_typical_entry() {
        let line = r#"{"__CURSOR":"s=1;i=2","__REALTIME_TIMESTAMP":"1700000000123456","PRIORITY":"6","SYSLOG_IDENTIFIER":"wsprrypi","MESSAGE":"Transmitting","_SYSTEMD_UNIT":"wsprrypi.service","_HOSTNAME":"pi","_PID":"812","_UID":"0","_GID":"0","_BOOT_ID":"abc"}"#;
        let record = parse_entry_line(line).unwrap().unwrap();

        assert_eq!(record.cursor.as_ref().map(Cursor::as_str), Some("s=1;i=2"));
        assert_eq!(record.realtime_micros, Some(1_700_000_000_123_456));
        assert_eq!(record.priority.as_deref(), Some("6"));
        assert_eq!(record.syslog_identifier.as_deref(), Some("wsprrypi"));
        assert_eq!(record.message, "Transmitting");
        assert_eq!(record.unit.as_deref(), Some("wsprrypi.service"));
        assert_eq!(record.hostname.as_deref(), Some("pi"));
        assert_eq!(record.pid, Some(812));
        assert_eq!(record.uid, Some(0));
        assert_eq!(record.gid, Some(0));
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert!(parse_entry_line("").unwrap().is_none());
        assert!(parse_entry_line("   \r").unwrap().is_none());
    }

    #[test]
    fn non_object_lines_are_rejected() {
        assert!(matches!(
            parse_entry_line("not json at all"),
            Err(RecordParseError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_entry_line("[1,2,3]"),
            Err(RecordParseError::NotAnObject { found: "array" })
        ));
        assert!(matches!(
            parse_entry_line("\"MESSAGE\""),
            Err(RecordParseError::NotAnObject { found: "string" })
        ));
    }

    #[test]
    fn sparse_entry_defaults_message_and_drops_empty_cursor() {
        let record = parse_entry_line(r#"{"__CURSOR":""}"#).unwrap().unwrap();
        assert!(record.cursor.is_none());
        assert_eq!(record.message, "");
        assert!(record.realtime_micros.is_none());
    }

    #[test]
    fn byte_array_message_is_decoded() {
        let record = parse_entry_line(r#"{"MESSAGE":[104,105,255]}"#).unwrap().unwrap();
        assert_eq!(record.message, "hi\u{fffd}");
    }

    #[test]
    fn multi_valued_field_uses_first_value() {
        let record = parse_entry_line(r#"{"MESSAGE":"m","SYSLOG_IDENTIFIER":["first","second"]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(record.syslog_identifier.as_deref(), Some("first"));
    }

    #[test]
    fn non_numeric_ids_become_none() {
        let record = parse_entry_line(r#"{"MESSAGE":"m","_PID":"abc","_UID":null,"_GID":42}"#)
            .unwrap()
            .unwrap();
        assert_eq!(record.pid, None);
        assert_eq!(record.uid, None);
        assert_eq!(record.gid, Some(42));
    }
}
