use std::fmt::Write as _;

use crate::{FrameError, UnifiedEvent};

/// Value of the `event:` line.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum EventName {
    Journal,
    Internal,
    PlaybackStart,
    PlaybackEnd,
}

impl EventName {
    pub fn as_str(self) -> &'static str {
        match self {
            EventName::Journal => "journal",
            EventName::Internal => "internal",
            EventName::PlaybackStart => "playback_start",
            EventName::PlaybackEnd => "playback_end",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "journal" => Some(EventName::Journal),
            "internal" => Some(EventName::Internal),
            "playback_start" => Some(EventName::PlaybackStart),
            "playback_end" => Some(EventName::PlaybackEnd),
            _ => None,
        }
    }
}

/// One blank-line-terminated Server-Sent Events frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    pub id: Option<String>,
    pub event: Option<String>,
    pub data: String,
}

impl SseFrame {
    pub fn event_name(&self) -> Option<EventName> {
        self.event.as_deref().and_then(EventName::parse)
    }

    pub fn payload(&self) -> Result<UnifiedEvent, serde_json::Error> {
        serde_json::from_str(&self.data)
    }
}

/// Renders `event` as a complete frame, including the terminating blank line.
///
/// The `id:` line is written only for journal events that carry a cursor.
pub fn encode_frame(event: &UnifiedEvent, name: EventName) -> Result<String, FrameError> {
    let data = serde_json::to_string(event)?;
    let mut out = String::with_capacity(data.len() + 64);

    if let Some(cursor) = event.resume_cursor() {
        let _ = writeln!(out, "id: {}", cursor.to_event_id());
    }
    let _ = writeln!(out, "event: {}", name.as_str());
    let _ = writeln!(out, "data: {data}");
    out.push('\n');
    Ok(out)
}

/// Parses a Server-Sent Events text stream into frames.
///
/// Comment lines and unknown fields are ignored; multiple `data:` lines are joined with `\n`.
/// A trailing frame without its blank-line terminator is not returned.
pub fn decode_frames(text: &str) -> Vec<SseFrame> {
    let mut frames = Vec::new();
    let mut current = SseFrame::default();
    let mut data_lines: Vec<&str> = Vec::new();
    let mut has_fields = false;

    let mut rest = text;
    while let Some(newline) = rest.find('\n') {
        let line = rest[..newline].strip_suffix('\r').unwrap_or(&rest[..newline]);
        rest = &rest[newline + 1..];

        if line.is_empty() {
            if has_fields {
                current.data = data_lines.join("\n");
                frames.push(std::mem::take(&mut current));
                data_lines.clear();
                has_fields = false;
            }
            continue;
        }
        if line.starts_with(':') {
            continue;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "id" => current.id = Some(value.to_string()),
            "event" => current.event = Some(value.to_string()),
            "data" => data_lines.push(value),
            _ => continue,
        }
        has_fields = true;
    }

    frames
}
