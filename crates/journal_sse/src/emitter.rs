use journal_events::{
    encode_frame, now_micros, Cursor, EventName, InternalOrigin, JournalRecord, Priority,
    UnifiedEvent,
};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::BridgeError;

/// Identity of this bridge process, stamped onto every internal event.
pub fn local_origin(source_tag: &str) -> InternalOrigin {
    let mut origin = InternalOrigin::new(source_tag);
    origin.hostname = hostname::get()
        .ok()
        .map(|name| name.to_string_lossy().into_owned());
    origin.pid = Some(i64::from(std::process::id()));
    #[cfg(unix)]
    {
        use nix::unistd::{getgid, getuid};

        origin.uid = Some(i64::from(getuid().as_raw()));
        origin.gid = Some(i64::from(getgid().as_raw()));
    }
    origin
}

/// Writes unified events to the consumer as Server-Sent Events frames.
///
/// Every frame is flushed as soon as it is written; a failed write or flush is reported as
/// [`BridgeError::Transport`] and ends the connection.
#[derive(Debug)]
pub struct EventEmitter<W> {
    writer: W,
    origin: InternalOrigin,
    unit: Option<String>,
}

impl<W> EventEmitter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W, origin: InternalOrigin, unit: Option<String>) -> Self {
        Self {
            writer,
            origin,
            unit,
        }
    }

    pub async fn emit(&mut self, event: &UnifiedEvent, name: EventName) -> Result<(), BridgeError> {
        let frame = encode_frame(event, name)?;
        self.writer
            .write_all(frame.as_bytes())
            .await
            .map_err(BridgeError::Transport)?;
        self.writer.flush().await.map_err(BridgeError::Transport)
    }

    /// Emits a journal entry and returns its cursor, if it had one.
    pub async fn journal(
        &mut self,
        record: JournalRecord,
        playback: bool,
    ) -> Result<Option<Cursor>, BridgeError> {
        let event = UnifiedEvent::journal(record, playback, now_micros());
        self.emit(&event, EventName::Journal).await?;
        Ok(event.cursor)
    }

    pub async fn internal(
        &mut self,
        message: impl Into<String>,
        priority: Priority,
        playback: bool,
    ) -> Result<(), BridgeError> {
        let event = UnifiedEvent::internal(
            &self.origin,
            message,
            priority,
            self.unit.as_deref(),
            playback,
            now_micros(),
        );
        self.emit(&event, EventName::Internal).await
    }

    /// `playback_start` is part of the replay; `playback_end` already belongs to live data.
    pub async fn boundary(&mut self, name: EventName) -> Result<(), BridgeError> {
        let playback = matches!(name, EventName::PlaybackStart);
        let event = UnifiedEvent::internal(
            &self.origin,
            name.as_str(),
            Priority::Debug,
            self.unit.as_deref(),
            playback,
            now_micros(),
        );
        self.emit(&event, name).await
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use journal_events::{decode_frames, EventKind, SseFrame};

    use super::*;

    fn emitter() -> EventEmitter<Vec<u8>> {
        EventEmitter::new(
            Vec::new(),
            InternalOrigin::new("journal-sse"),
            Some("wsprrypi.service".to_string()),
        )
    }

    fn frames(emitter: EventEmitter<Vec<u8>>) -> Vec<SseFrame> {
        let text = String::from_utf8(emitter.into_inner()).expect("utf8 stream");
        decode_frames(&text)
    }

    #[tokio::test]
    async fn journal_event_carries_encoded_cursor_id() {
        let mut emitter = emitter();
        let record = JournalRecord {
            cursor: Cursor::new("s=ab;i=1"),
            message: "tx 14.097 MHz".to_string(),
            realtime_micros: Some(1_700_000_000_000_000),
            ..JournalRecord::default()
        };
        let cursor = emitter.journal(record, true).await.expect("emit");
        assert_eq!(cursor.as_ref().map(Cursor::as_str), Some("s=ab;i=1"));

        let frames = frames(emitter);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].id.as_deref(), Some("s%3Dab%3Bi%3D1"));
        assert_eq!(frames[0].event_name(), Some(EventName::Journal));
        let event = frames[0].payload().expect("payload");
        assert!(event.playback);
        assert_eq!(event.timestamp_micros, 1_700_000_000_000_000);
    }

    #[tokio::test]
    async fn internal_events_have_no_id_and_use_configured_unit() {
        let mut emitter = emitter();
        emitter
            .internal("[journalctl stderr] oops", Priority::Warning, false)
            .await
            .expect("emit");

        let frames = frames(emitter);
        assert!(frames[0].id.is_none());
        let event = frames[0].payload().expect("payload");
        assert_eq!(event.kind, EventKind::Internal);
        assert!(event.cursor.is_none());
        assert_eq!(event.priority.as_deref(), Some("4"));
        assert_eq!(event.syslog_identifier.as_deref(), Some("journal-sse"));
        assert_eq!(event.unit.as_deref(), Some("wsprrypi.service"));
    }

    #[tokio::test]
    async fn boundaries_name_themselves() {
        let mut emitter = emitter();
        emitter.boundary(EventName::PlaybackStart).await.expect("start");
        emitter.boundary(EventName::PlaybackEnd).await.expect("end");

        let frames = frames(emitter);
        let start = frames[0].payload().expect("start payload");
        let end = frames[1].payload().expect("end payload");
        assert_eq!(frames[0].event.as_deref(), Some("playback_start"));
        assert_eq!(start.message, "playback_start");
        assert!(start.playback);
        assert_eq!(frames[1].event.as_deref(), Some("playback_end"));
        assert_eq!(end.message, "playback_end");
        assert!(!end.playback);
        assert_eq!(end.priority.as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn closed_transport_is_reported() {
        let (writer, reader) = tokio::io::duplex(64);
        drop(reader);
        let mut emitter = EventEmitter::new(writer, InternalOrigin::new("journal-sse"), None);
        let err = emitter
            .internal("[HEARTBEAT]", Priority::Debug, false)
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn local_origin_identifies_this_process() {
        let origin = local_origin("edge");
        assert_eq!(origin.source_tag, "edge");
        assert_eq!(origin.pid, Some(i64::from(std::process::id())));
    }

    #[cfg(unix)]
    #[test]
    fn local_origin_reports_real_credentials() {
        let origin = local_origin("edge");
        assert_eq!(origin.uid, Some(i64::from(nix::unistd::getuid().as_raw())));
        assert_eq!(origin.gid, Some(i64::from(nix::unistd::getgid().as_raw())));
    }
}
