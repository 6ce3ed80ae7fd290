#![forbid(unsafe_code)]
//! Streams the systemd journal to a consumer as resumable Server-Sent Events.
//!
//! A connection parses the consumer's controls into a [`StreamConfig`], optionally replays a
//! bounded backlog, and then follows the journal for as long as the consumer stays connected.
//! All reading goes through a supervised `journalctl` child process.
//!
//! ```rust,no_run
//! use journal_sse::{serve_connection, BridgeSettings, RawControls};
//!
//! # async fn example() {
//! let controls = RawControls::from_query("backlog=50&unit=*").with_last_event_id(None::<String>);
//! let result = serve_connection(&BridgeSettings::default(), &controls, tokio::io::stdout()).await;
//! # let _ = result;
//! # }
//! ```

use std::{convert::Infallible, path::Path};

use journal_events::Priority;
use tokio::io::AsyncWrite;
use tracing::error;

mod controls;
mod defaults;
mod emitter;
mod error;
mod filter;
mod multiplexer;
mod playback;
mod process;
mod settings;
#[cfg(test)]
mod test_support;

pub use controls::{PriorityRange, RawControls, StreamConfig, UnitFilter};
pub use emitter::{local_origin, EventEmitter};
pub use error::{BridgeError, SettingsError, SpawnError};
pub use filter::{display_command, filter_args, ReaderRequest};
pub use multiplexer::{DrainMode, DrainSummary, StreamMultiplexer};
pub use playback::{Phase, PlaybackController, StreamContext};
pub use process::{
    ChildProcess, JournalctlSupervisor, Pipe, PipeReader, ProcessExit, ProcessHandle, Supervisor,
};
pub use settings::BridgeSettings;

#[doc(hidden)]
pub fn default_rust_log_value() -> Option<&'static str> {
    defaults::default_rust_log_value()
}

/// Serves one consumer connection on `writer`.
///
/// Returns only when the stream ends: the consumer went away ([`BridgeError::Transport`]),
/// `journalctl` could not be found ([`BridgeError::SourceToolMissing`], after telling the
/// consumer), or a fault occurred (already reported to the consumer as a final event).
pub async fn serve_connection<W>(
    settings: &BridgeSettings,
    controls: &RawControls,
    writer: W,
) -> Result<Infallible, BridgeError>
where
    W: AsyncWrite + Unpin + Send,
{
    let config = StreamConfig::from_controls(controls, settings.unit());
    let origin = local_origin(settings.tag());
    let mut emitter = EventEmitter::new(writer, origin, config.internal_unit().map(str::to_string));

    let Some(binary) = settings.resolve_journalctl() else {
        error!(configured = ?settings.configured_journalctl(), "journalctl not found");
        emitter
            .internal("journalctl not found in PATH", Priority::Error, false)
            .await?;
        return Err(BridgeError::SourceToolMissing {
            binary: settings.configured_journalctl().map(Path::to_path_buf),
        });
    };

    let supervisor = JournalctlSupervisor::new(binary, settings.grace());
    let context = StreamContext::new(config, settings.clone());
    PlaybackController::new(supervisor, emitter, context)
        .run()
        .await
}
