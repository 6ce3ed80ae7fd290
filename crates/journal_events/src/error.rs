use thiserror::Error;

/// Why a line from the journal reader could not become a [`crate::JournalRecord`].
#[derive(Debug, Error)]
pub enum RecordParseError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("expected a JSON object, found {found}")]
    NotAnObject { found: &'static str },
    #[error("unexpected record shape: {0}")]
    Shape(#[source] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("failed to serialize event payload: {0}")]
    Serialize(#[from] serde_json::Error),
}
