use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

pub(crate) const JOURNALCTL_BINARY: &str = "journalctl";
pub(crate) const JOURNALCTL_ENV: &str = "JOURNAL_SSE_JOURNALCTL";
pub(crate) const RUST_LOG_ENV: &str = "RUST_LOG";
pub(crate) const DEFAULT_RUST_LOG: &str = "warn";

pub(crate) const DEFAULT_UNIT: &str = "wsprrypi.service";
pub(crate) const DEFAULT_SOURCE_TAG: &str = "journal-sse";

pub(crate) const DEFAULT_BACKLOG: u32 = 200;
pub(crate) const MAX_BACKLOG: u32 = 2000;
pub(crate) const DEFAULT_HEARTBEAT_SECS: u64 = 15;
pub(crate) const MIN_HEARTBEAT_SECS: u64 = 5;
pub(crate) const MAX_HEARTBEAT_SECS: u64 = 60;

pub(crate) const DEFAULT_SPAWN_GRACE: Duration = Duration::from_millis(150);
pub(crate) const DEFAULT_RESTART_DELAY: Duration = Duration::from_secs(1);
pub(crate) const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub(crate) const DEFAULT_IDLE_SLEEP: Duration = Duration::from_secs(1);
pub(crate) const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

pub(crate) fn default_rust_log_value() -> Option<&'static str> {
    env::var_os(RUST_LOG_ENV)
        .is_none()
        .then_some(DEFAULT_RUST_LOG)
}

/// Explicit setting first, then `JOURNAL_SSE_JOURNALCTL`, then a `PATH` lookup.
pub(crate) fn resolve_journalctl(explicit: Option<&Path>) -> Option<PathBuf> {
    let candidate = explicit
        .map(Path::to_path_buf)
        .or_else(|| env::var_os(JOURNALCTL_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(JOURNALCTL_BINARY));
    which::which(candidate).ok()
}
