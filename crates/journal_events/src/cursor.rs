use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

/// RFC 3986 unreserved characters stay literal; everything else is escaped.
const EVENT_ID: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Opaque journal position token (`__CURSOR`).
///
/// The bridge never interprets the token; it only hands it back to `journalctl --after-cursor`.
/// An empty token is not a cursor, so construction is fallible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cursor(String);

impl Cursor {
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// Decodes a `Last-Event-ID` value echoed back by a consumer.
    pub fn from_event_id(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        let decoded = percent_decode_str(raw).decode_utf8_lossy();
        Self::new(decoded.into_owned())
    }

    /// Encodes the cursor so it is safe on a single `id:` line.
    pub fn to_event_id(&self) -> String {
        utf8_percent_encode(&self.0, EVENT_ID).to_string()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Cursor {
    type Error = &'static str;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Cursor::new(value).ok_or("cursor must not be empty")
    }
}

impl From<Cursor> for String {
    fn from(value: Cursor) -> Self {
        value.0
    }
}
