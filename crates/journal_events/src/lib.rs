#![forbid(unsafe_code)]
//! Shared primitives for turning `journalctl -o json` output into a resumable event stream.
//!
//! This crate is intentionally runtime-free. It provides:
//! - The unified event schema every emitted event follows (journal entries and bridge notices).
//! - A tolerant, typed parse step for journal JSON records.
//! - A bounded-memory line reassembler for chunked pipe reads.
//! - The Server-Sent Events frame codec plus the consumer-side cursor bookkeeping.

mod cursor;
mod error;
mod event;
mod frame;
mod line_buffer;
mod priority;
mod record;
mod resume;

pub use cursor::Cursor;
pub use error::{FrameError, RecordParseError};
pub use event::{now_micros, EventKind, InternalOrigin, UnifiedEvent};
pub use frame::{decode_frames, encode_frame, EventName, SseFrame};
pub use line_buffer::{BufferedLine, LineBuffer};
pub use priority::Priority;
pub use record::{parse_entry_line, JournalRecord};
pub use resume::ResumeTracker;
