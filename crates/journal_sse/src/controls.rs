use std::time::Duration;

use journal_events::{Cursor, Priority};

use crate::defaults;

/// Inbound controls exactly as the consumer supplied them, before any validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawControls {
    pub playback: Option<String>,
    pub backlog: Option<String>,
    pub heartbeat: Option<String>,
    pub priority_min: Option<String>,
    pub priority_max: Option<String>,
    pub unit: Option<String>,
    pub last_event_id: Option<String>,
}

impl RawControls {
    /// Reads the recognised keys from an `application/x-www-form-urlencoded` query string.
    ///
    /// Unknown keys are ignored; a repeated key keeps its last value.
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut controls = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match key.as_ref() {
                "playback" => &mut controls.playback,
                "backlog" => &mut controls.backlog,
                "heartbeat" => &mut controls.heartbeat,
                "priority_min" => &mut controls.priority_min,
                "priority_max" => &mut controls.priority_max,
                "unit" => &mut controls.unit,
                _ => continue,
            };
            *slot = Some(value.into_owned());
        }
        controls
    }

    pub fn with_last_event_id(mut self, id: Option<impl Into<String>>) -> Self {
        self.last_event_id = id.map(Into::into);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitFilter {
    Wildcard,
    Units(Vec<String>),
}

impl UnitFilter {
    fn parse(raw: Option<&str>, default_unit: &str) -> Self {
        let raw = raw.map(str::trim).unwrap_or_default();
        if raw == "*" {
            return UnitFilter::Wildcard;
        }
        let mut units: Vec<String> = Vec::new();
        for unit in raw.split(',').map(str::trim).filter(|unit| !unit.is_empty()) {
            if !units.iter().any(|seen| seen == unit) {
                units.push(unit.to_string());
            }
        }
        if units.is_empty() {
            units.push(default_unit.to_string());
        }
        UnitFilter::Units(units)
    }

    pub fn units(&self) -> &[String] {
        match self {
            UnitFilter::Wildcard => &[],
            UnitFilter::Units(units) => units,
        }
    }
}

/// Optional priority bounds; `min <= max` whenever both are present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriorityRange {
    pub min: Option<Priority>,
    pub max: Option<Priority>,
}

impl PriorityRange {
    fn new(min: Option<Priority>, max: Option<Priority>) -> Self {
        match (min, max) {
            (Some(lo), Some(hi)) if lo > hi => Self {
                min: Some(hi),
                max: Some(lo),
            },
            _ => Self { min, max },
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// Both bounds with the omitted side widened to the full scale.
    pub fn bounds(&self) -> Option<(Priority, Priority)> {
        if self.is_unbounded() {
            return None;
        }
        Some((
            self.min.unwrap_or(Priority::Emergency),
            self.max.unwrap_or(Priority::Debug),
        ))
    }
}

/// Per-connection configuration, fixed once derived from the consumer's controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    playback: bool,
    backlog: u32,
    heartbeat_secs: u64,
    priority: PriorityRange,
    units: UnitFilter,
    resume_cursor: Option<Cursor>,
}

impl StreamConfig {
    /// Normalizes raw controls. Never fails: anything unusable falls back to a default.
    pub fn from_controls(raw: &RawControls, default_unit: &str) -> Self {
        let backlog = parse_int(raw.backlog.as_deref())
            .map(|value| value.clamp(0, i64::from(defaults::MAX_BACKLOG)))
            .and_then(|value| u32::try_from(value).ok())
            .unwrap_or(defaults::DEFAULT_BACKLOG);
        let heartbeat_secs = parse_int(raw.heartbeat.as_deref())
            .map(|value| {
                value.clamp(
                    defaults::MIN_HEARTBEAT_SECS as i64,
                    defaults::MAX_HEARTBEAT_SECS as i64,
                )
            })
            .and_then(|value| u64::try_from(value).ok())
            .unwrap_or(defaults::DEFAULT_HEARTBEAT_SECS);
        let priority = PriorityRange::new(
            parse_int(raw.priority_min.as_deref()).map(Priority::clamped),
            parse_int(raw.priority_max.as_deref()).map(Priority::clamped),
        );

        Self {
            playback: parse_playback(raw.playback.as_deref()),
            backlog,
            heartbeat_secs,
            priority,
            units: UnitFilter::parse(raw.unit.as_deref(), default_unit),
            resume_cursor: raw
                .last_event_id
                .as_deref()
                .map(str::trim)
                .and_then(Cursor::from_event_id),
        }
    }

    pub fn playback_enabled(&self) -> bool {
        self.playback
    }

    pub fn backlog(&self) -> u32 {
        self.backlog
    }

    /// Replay runs only when playback is on and there is something to replay.
    pub fn replay_enabled(&self) -> bool {
        self.playback && self.backlog > 0
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn priority(&self) -> PriorityRange {
        self.priority
    }

    pub fn units(&self) -> &UnitFilter {
        &self.units
    }

    pub fn resume_cursor(&self) -> Option<&Cursor> {
        self.resume_cursor.as_ref()
    }

    /// Unit stamped onto internal events: the first configured unit, none when wildcarded.
    pub fn internal_unit(&self) -> Option<&str> {
        self.units.units().first().map(String::as_str)
    }

    /// One-line description used in the connection banner.
    pub fn summary(&self) -> String {
        let priority = match self.priority.bounds() {
            None => "any".to_string(),
            Some((lo, hi)) => format!("{}..{}", lo.level(), hi.level()),
        };
        let unit = match &self.units {
            UnitFilter::Wildcard => "*".to_string(),
            UnitFilter::Units(units) => units.join(","),
        };
        format!(
            "playback={} backlog={} priority={} unit={} heartbeat={}s",
            u8::from(self.playback),
            self.backlog,
            priority,
            unit,
            self.heartbeat_secs
        )
    }
}

fn parse_playback(raw: Option<&str>) -> bool {
    !matches!(raw, Some("0" | "false" | "off"))
}

fn parse_int(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
}
