use std::fmt;

/// Syslog severity as used by journald's `PRIORITY` field (0 = most severe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Emergency = 0,
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    Info = 6,
    Debug = 7,
}

impl Priority {
    pub const ALL: [Priority; 8] = [
        Priority::Emergency,
        Priority::Alert,
        Priority::Critical,
        Priority::Error,
        Priority::Warning,
        Priority::Notice,
        Priority::Info,
        Priority::Debug,
    ];

    pub fn from_level(level: u8) -> Option<Self> {
        Self::ALL.get(usize::from(level)).copied()
    }

    /// Maps any integer onto the 0..=7 scale, saturating at both ends.
    pub fn clamped(level: i64) -> Self {
        let level = level.clamp(0, 7) as u8;
        Self::ALL[usize::from(level)]
    }

    pub fn level(self) -> u8 {
        self as u8
    }

    /// Wire representation: journald reports priorities as decimal strings.
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Emergency => "0",
            Priority::Alert => "1",
            Priority::Critical => "2",
            Priority::Error => "3",
            Priority::Warning => "4",
            Priority::Notice => "5",
            Priority::Info => "6",
            Priority::Debug => "7",
        }
    }

    /// Short bucket name viewers use to partition events by severity.
    pub fn label(self) -> &'static str {
        match self {
            Priority::Emergency => "emerg",
            Priority::Alert => "alert",
            Priority::Critical => "crit",
            Priority::Error => "error",
            Priority::Warning => "warn",
            Priority::Notice => "notice",
            Priority::Info => "info",
            Priority::Debug => "debug",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse::<u8>().ok().and_then(Self::from_level)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamped_saturates() {
        assert_eq!(Priority::clamped(-4), Priority::Emergency);
        assert_eq!(Priority::clamped(3), Priority::Error);
        assert_eq!(Priority::clamped(42), Priority::Debug);
    }

    #[test]
    fn labels_follow_severity_order() {
        let labels: Vec<_> = Priority::ALL.iter().map(|p| p.label()).collect();
        assert_eq!(
            labels,
            ["emerg", "alert", "crit", "error", "warn", "notice", "info", "debug"]
        );
    }

    #[test]
    fn parse_accepts_only_journald_levels() {
        assert_eq!(Priority::parse("6"), Some(Priority::Info));
        assert_eq!(Priority::parse(" 0 "), Some(Priority::Emergency));
        assert_eq!(Priority::parse("8"), None);
        assert_eq!(Priority::parse("warn"), None);
    }

    #[test]
    fn wire_string_matches_level() {
        for priority in Priority::ALL {
            assert_eq!(priority.as_str(), priority.level().to_string());
        }
    }
}
