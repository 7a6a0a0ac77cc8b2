// infrakit - logging/level.rs
//
// Severity levels and the dispatcher that routes a formatted message to the
// matching `tracing` primitive. Pure routing, no I/O of its own: whichever
// dispatcher is current when `dispatch` runs receives the event.

use serde::{Deserialize, Serialize};

/// Name of the event field that marks an ERROR event as fatal.
///
/// `tracing` has no level above ERROR, so fatal entries are ERROR events
/// carrying `fatal = true`; the layout renders them as `FATAL`.
pub const FATAL_FIELD: &str = "fatal";

/// Severity of a log entry, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    /// Returns all variants, least severe first.
    pub fn all() -> &'static [Level] {
        &[
            Level::Debug,
            Level::Info,
            Level::Warn,
            Level::Error,
            Level::Fatal,
        ]
    }

    /// Parse a level name case-insensitively.
    ///
    /// Unrecognised names fall back to [`Level::Info`]; use
    /// [`Level::try_from_name`] when the caller needs to know.
    pub fn from_name(name: &str) -> Level {
        Self::try_from_name(name).unwrap_or_default()
    }

    /// Parse a level name case-insensitively, `None` if unrecognised.
    pub fn try_from_name(name: &str) -> Option<Level> {
        match name.trim().to_ascii_lowercase().as_str() {
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "fatal" => Some(Level::Fatal),
            _ => None,
        }
    }

    /// Upper-case label as written by `%p`.
    pub fn label(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Emit `message` at `level` on the current `tracing` dispatcher.
pub fn dispatch(level: Level, message: &str) {
    match level {
        Level::Debug => tracing::debug!(target: "infrakit::session", "{message}"),
        Level::Info => tracing::info!(target: "infrakit::session", "{message}"),
        Level::Warn => tracing::warn!(target: "infrakit::session", "{message}"),
        Level::Error => tracing::error!(target: "infrakit::session", "{message}"),
        Level::Fatal => {
            tracing::error!(target: "infrakit::session", fatal = true, "{message}")
        }
    }
}

/// Recover a [`Level`] from a `tracing` level plus the fatal marker.
pub fn from_tracing(level: &tracing::Level, fatal: bool) -> Level {
    if fatal {
        return Level::Fatal;
    }
    match *level {
        tracing::Level::TRACE | tracing::Level::DEBUG => Level::Debug,
        tracing::Level::INFO => Level::Info,
        tracing::Level::WARN => Level::Warn,
        tracing::Level::ERROR => Level::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_level_name_defaults_to_info() {
        assert_eq!(Level::from_name("verbose"), Level::Info);
        assert_eq!(Level::from_name(""), Level::Info);
        assert_eq!(Level::try_from_name("verbose"), None);
    }

    #[test]
    fn test_level_names_parse_case_insensitively() {
        assert_eq!(Level::from_name("DEBUG"), Level::Debug);
        assert_eq!(Level::from_name(" Warn "), Level::Warn);
        assert_eq!(Level::from_name("warning"), Level::Warn);
        assert_eq!(Level::from_name("Fatal"), Level::Fatal);
    }

    #[test]
    fn test_levels_are_ordered_by_severity() {
        let all = Level::all();
        assert!(all.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(Level::default(), Level::Info);
    }

    #[test]
    fn test_tracing_levels_map_back() {
        assert_eq!(from_tracing(&tracing::Level::ERROR, true), Level::Fatal);
        assert_eq!(from_tracing(&tracing::Level::ERROR, false), Level::Error);
        assert_eq!(from_tracing(&tracing::Level::TRACE, false), Level::Debug);
        assert_eq!(from_tracing(&tracing::Level::INFO, false), Level::Info);
    }
}
