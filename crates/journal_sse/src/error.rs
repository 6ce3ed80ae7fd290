use std::path::PathBuf;

use journal_events::FrameError;
use thiserror::Error;

/// Failure to obtain a live `journalctl` process.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to spawn journalctl process (binary={binary:?}): {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("journalctl exited immediately (exit code {code:?}): {diagnostic}")]
    ExitedImmediately {
        code: Option<i32>,
        diagnostic: String,
    },
    #[error("internal error: missing stdout pipe")]
    MissingStdout,
    #[error("internal error: missing stderr pipe")]
    MissingStderr,
}

impl SpawnError {
    /// Text forwarded to the consumer: the reader's own stderr when it has one.
    pub fn diagnostic(&self) -> String {
        match self {
            SpawnError::ExitedImmediately { diagnostic, .. } => diagnostic.clone(),
            SpawnError::Spawn { source, .. } => source.to_string(),
            other => other.to_string(),
        }
    }
}

/// Everything that can end a connection.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("journalctl not found (looked for {binary:?})")]
    SourceToolMissing { binary: Option<PathBuf> },
    #[error("event stream transport failed: {0}")]
    Transport(#[source] std::io::Error),
    #[error("failed to encode event: {0}")]
    Frame(#[from] FrameError),
    #[error("failed to check journalctl process status: {0}")]
    Wait(#[source] std::io::Error),
}

impl BridgeError {
    /// The consumer went away; nothing more can be delivered.
    pub fn is_transport(&self) -> bool {
        matches!(self, BridgeError::Transport(_))
    }

    /// Unexpected failures that deserve a final internal error event.
    pub fn is_fault(&self) -> bool {
        !matches!(
            self,
            BridgeError::Transport(_) | BridgeError::SourceToolMissing { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings from `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
