use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::{Cursor, JournalRecord, Priority};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Journal,
    Internal,
}

/// Identity stamped onto every bridge-generated (internal) event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalOrigin {
    pub source_tag: String,
    pub hostname: Option<String>,
    pub pid: Option<i64>,
    pub uid: Option<i64>,
    pub gid: Option<i64>,
}

impl InternalOrigin {
    pub fn new(source_tag: impl Into<String>) -> Self {
        Self {
            source_tag: source_tag.into(),
            hostname: None,
            pid: None,
            uid: None,
            gid: None,
        }
    }
}

/// The one payload shape carried in every `data:` line.
///
/// Field names on the wire keep journald's spelling so consumers can treat journal entries and
/// bridge notices uniformly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnifiedEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub playback: bool,
    #[serde(rename = "__CURSOR")]
    pub cursor: Option<Cursor>,
    #[serde(rename = "__REALTIME_TIMESTAMP")]
    pub timestamp_micros: i64,
    #[serde(rename = "PRIORITY")]
    pub priority: Option<String>,
    #[serde(rename = "SYSLOG_IDENTIFIER")]
    pub syslog_identifier: Option<String>,
    #[serde(rename = "MESSAGE")]
    pub message: String,
    #[serde(rename = "_SYSTEMD_UNIT")]
    pub unit: Option<String>,
    #[serde(rename = "HOSTNAME")]
    pub hostname: Option<String>,
    #[serde(rename = "PID")]
    pub pid: Option<i64>,
    #[serde(rename = "UID")]
    pub uid: Option<i64>,
    #[serde(rename = "GID")]
    pub gid: Option<i64>,
}

impl UnifiedEvent {
    /// Wraps a parsed journal entry. A missing source timestamp falls back to `now_micros`.
    pub fn journal(record: JournalRecord, playback: bool, now_micros: i64) -> Self {
        Self {
            kind: EventKind::Journal,
            playback,
            cursor: record.cursor,
            timestamp_micros: record.realtime_micros.unwrap_or(now_micros),
            priority: record.priority,
            syslog_identifier: record.syslog_identifier,
            message: record.message,
            unit: record.unit,
            hostname: record.hostname,
            pid: record.pid,
            uid: record.uid,
            gid: record.gid,
        }
    }

    /// Builds a bridge notice. Internal events never carry a cursor.
    pub fn internal(
        origin: &InternalOrigin,
        message: impl Into<String>,
        priority: Priority,
        unit: Option<&str>,
        playback: bool,
        now_micros: i64,
    ) -> Self {
        Self {
            kind: EventKind::Internal,
            playback,
            cursor: None,
            timestamp_micros: now_micros,
            priority: Some(priority.as_str().to_string()),
            syslog_identifier: Some(origin.source_tag.clone()),
            message: message.into(),
            unit: unit.map(str::to_string),
            hostname: origin.hostname.clone(),
            pid: origin.pid,
            uid: origin.uid,
            gid: origin.gid,
        }
    }

    /// The cursor a consumer may persist: only journal events ever qualify.
    pub fn resume_cursor(&self) -> Option<&Cursor> {
        match self.kind {
            EventKind::Journal => self.cursor.as_ref(),
            EventKind::Internal => None,
        }
    }
}

/// Wall-clock time in microseconds since the Unix epoch, journald's timestamp unit.
pub fn now_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_micros()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    fn origin() -> InternalOrigin {
        InternalOrigin {
            source_tag: "journal-sse".to_string(),
            hostname: Some("pi".to_string()),
            pid: Some(4242),
            uid: Some(33),
            gid: Some(33),
        }
    }

    #[test]
    fn internal_event_serializes_unified_schema() {
        let event = UnifiedEvent::internal(
            &origin(),
            "[HEARTBEAT]",
            Priority::Debug,
            Some("wsprrypi.service"),
            false,
            1_000,
        );
        let value: Value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], "internal");
        assert_eq!(value["playback"], false);
        assert_eq!(value["__CURSOR"], Value::Null);
        assert_eq!(value["__REALTIME_TIMESTAMP"], 1_000);
        assert_eq!(value["PRIORITY"], "7");
        assert_eq!(value["SYSLOG_IDENTIFIER"], "journal-sse");
        assert_eq!(value["MESSAGE"], "[HEARTBEAT]");
        assert_eq!(value["_SYSTEMD_UNIT"], "wsprrypi.service");
        assert_eq!(value["HOSTNAME"], "pi");
        assert_eq!(value["PID"], 4242);
        assert_eq!(value.as_object().unwrap().len(), 12);
    }

    #[test]
    fn journal_event_keeps_record_fields_and_falls_back_to_now() {
        let record = JournalRecord {
            cursor: Cursor::new("c1"),
            message: "hello".to_string(),
            priority: Some("3".to_string()),
            ..JournalRecord::default()
        };
        let event = UnifiedEvent::journal(record, true, 77);

        assert_eq!(event.kind, EventKind::Journal);
        assert!(event.playback);
        assert_eq!(event.timestamp_micros, 77);
        assert_eq!(event.resume_cursor().map(Cursor::as_str), Some("c1"));
    }

    #[test]
    fn internal_event_has_no_resume_cursor() {
        let event = UnifiedEvent::internal(&origin(), "x", Priority::Info, None, true, 1);
        assert!(event.resume_cursor().is_none());
        assert!(event.cursor.is_none());
    }

    #[test]
    fn now_is_after_2020() {
        assert!(now_micros() > 1_577_836_800_000_000);
    }
}
