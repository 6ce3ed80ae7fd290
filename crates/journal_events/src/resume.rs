use crate::{Cursor, EventName, SseFrame, UnifiedEvent};

/// Consumer-side bookkeeping for reconnects.
///
/// Remembers the most recent cursor from journal events only; internal notices, boundary markers
/// and cursor-less entries leave the stored position untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeTracker {
    last: Option<Cursor>,
}

impl ResumeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe_event(&mut self, event: &UnifiedEvent) {
        if let Some(cursor) = event.resume_cursor() {
            self.last = Some(cursor.clone());
        }
    }

    pub fn observe_frame(&mut self, frame: &SseFrame) {
        if frame.event_name() != Some(EventName::Journal) {
            return;
        }
        match frame.payload() {
            Ok(event) => self.observe_event(&event),
            Err(_) => {
                if let Some(cursor) = frame.id.as_deref().and_then(Cursor::from_event_id) {
                    self.last = Some(cursor);
                }
            }
        }
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.last.as_ref()
    }

    /// Value to send back as `Last-Event-ID` on reconnect.
    pub fn last_event_id(&self) -> Option<String> {
        self.last.as_ref().map(Cursor::to_event_id)
    }
}
