use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::{defaults, SettingsError};

/// Operator-level configuration shared by every connection a bridge process serves.
///
/// Loaded from TOML (all keys optional) and then adjusted with builder-style setters, so CLI
/// flags can override the file.
///
/// ```toml
/// journalctl = "/usr/bin/journalctl"
/// default_unit = "wsprrypi.service"
/// spawn_grace_ms = 150
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeSettings {
    journalctl: Option<PathBuf>,
    default_unit: String,
    source_tag: String,
    spawn_grace_ms: u64,
    restart_delay_ms: u64,
    poll_interval_ms: u64,
    idle_sleep_ms: u64,
    max_line_bytes: usize,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            journalctl: None,
            default_unit: defaults::DEFAULT_UNIT.to_string(),
            source_tag: defaults::DEFAULT_SOURCE_TAG.to_string(),
            spawn_grace_ms: duration_ms(defaults::DEFAULT_SPAWN_GRACE),
            restart_delay_ms: duration_ms(defaults::DEFAULT_RESTART_DELAY),
            poll_interval_ms: duration_ms(defaults::DEFAULT_POLL_INTERVAL),
            idle_sleep_ms: duration_ms(defaults::DEFAULT_IDLE_SLEEP),
            max_line_bytes: defaults::DEFAULT_MAX_LINE_BYTES,
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl BridgeSettings {
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, SettingsError> {
        toml::from_str(text).map_err(|source| SettingsError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    pub fn journalctl(mut self, binary: impl Into<PathBuf>) -> Self {
        self.journalctl = Some(binary.into());
        self
    }

    pub fn default_unit(mut self, unit: impl Into<String>) -> Self {
        self.default_unit = unit.into();
        self
    }

    pub fn source_tag(mut self, tag: impl Into<String>) -> Self {
        self.source_tag = tag.into();
        self
    }

    pub fn spawn_grace(mut self, grace: Duration) -> Self {
        self.spawn_grace_ms = duration_ms(grace);
        self
    }

    pub fn restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay_ms = duration_ms(delay);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = duration_ms(interval);
        self
    }

    pub fn idle_sleep(mut self, sleep: Duration) -> Self {
        self.idle_sleep_ms = duration_ms(sleep);
        self
    }

    pub fn max_line_bytes(mut self, limit: usize) -> Self {
        self.max_line_bytes = limit;
        self
    }

    pub fn resolve_journalctl(&self) -> Option<PathBuf> {
        defaults::resolve_journalctl(self.journalctl.as_deref())
    }

    pub fn configured_journalctl(&self) -> Option<&Path> {
        self.journalctl.as_deref()
    }

    pub fn unit(&self) -> &str {
        &self.default_unit
    }

    pub fn tag(&self) -> &str {
        &self.source_tag
    }

    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.spawn_grace_ms)
    }

    pub fn restart(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub fn poll(&self) -> Duration {
        // A zero poll interval would turn the readiness wait into a spin.
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn idle(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms.max(1))
    }

    pub fn line_limit(&self) -> usize {
        self.max_line_bytes.max(1)
    }
}
