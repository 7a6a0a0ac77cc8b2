// infrakit - logging/settings.rs
//
// Loading and validation of a session configuration file
// (`<dir>/<name>.config`, TOML).
//
// Unparseable TOML and a file appender without a path are hard errors: the
// session cannot know where to write. Every other bad value produces an
// actionable warning and falls back to its default so a typo in an optional
// setting never stops an application from logging.
//
// Example:
//
//   [root]
//   level = "all"
//
//   [layout]
//   pattern = "%d %-5p %t | %m%n"
//
//   [[appender]]
//   kind = "file"
//   path = "Log/output.log"
//   append = true
//   max_file_size = "100KB"
//   max_backups = 2

use crate::logging::layout::{self, Token};
use crate::logging::level::Level;
use crate::util::constants;
use crate::util::error::SessionError;
use regex::Regex;
use std::path::{Path, PathBuf};

// =============================================================================
// Raw on-disk shape
// =============================================================================

/// Raw deserialisable shape of a session config.
///
/// Unknown keys are ignored so a newer config file keeps working with an
/// older build.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawSessionConfig {
    /// `[root]` section.
    pub root: RootSection,
    /// `[layout]` section.
    pub layout: LayoutSection,
    /// `[[appender]]` entries.
    #[serde(rename = "appender")]
    pub appenders: Vec<RawAppender>,
}

/// `[root]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RootSection {
    /// Threshold: "all", "debug", "info", "warn", "error", "fatal", "off".
    pub level: Option<toml::Value>,
}

/// `[layout]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LayoutSection {
    /// Conversion pattern, e.g. `%d %-5p %t | %m%n`.
    pub pattern: Option<toml::Value>,
}

/// One `[[appender]]` entry.
///
/// Fields other than `path` are kept as raw TOML values so a value of the
/// wrong type is reported as a warning instead of failing the whole file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawAppender {
    /// "file" (default) or "console".
    pub kind: Option<toml::Value>,
    /// Log file path; relative paths resolve against the config directory.
    pub path: Option<String>,
    /// Keep existing content on open (default true).
    pub append: Option<toml::Value>,
    /// Roll-over size: a byte count or a string such as "100KB".
    pub max_file_size: Option<toml::Value>,
    /// Number of rolled files kept.
    pub max_backups: Option<toml::Value>,
}

// =============================================================================
// Validated configuration
// =============================================================================

/// Validated file appender settings.
#[derive(Debug, Clone, PartialEq)]
pub struct FileSpec {
    /// Absolute (or config-dir-relative resolved) log file path.
    pub path: PathBuf,
    pub append: bool,
    pub max_file_size: u64,
    pub max_backups: usize,
}

/// Validated output target.
#[derive(Debug, Clone, PartialEq)]
pub enum AppenderSpec {
    File(FileSpec),
    Console,
}

/// Validated session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Lowest level written; `None` disables output entirely ("off").
    pub threshold: Option<Level>,
    /// Parsed conversion pattern.
    pub layout: Vec<Token>,
    /// Output targets in declaration order.
    pub appenders: Vec<AppenderSpec>,
    /// Non-fatal problems found while validating.
    pub warnings: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let (layout, _) = layout::parse_pattern(constants::DEFAULT_PATTERN);
        Self {
            threshold: Some(Level::Debug),
            layout,
            appenders: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl SessionConfig {
    /// Read and validate the session config at `path`.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidConfig`] if the file cannot be read, is not
    /// valid TOML, or declares a file appender without a path.
    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let content = std::fs::read_to_string(path).map_err(|e| SessionError::InvalidConfig {
            path: path.to_path_buf(),
            reason: format!("cannot read file: {e}"),
        })?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let config = Self::parse(&content, base_dir).map_err(|reason| {
            SessionError::InvalidConfig {
                path: path.to_path_buf(),
                reason,
            }
        })?;

        for warning in &config.warnings {
            tracing::warn!(path = %path.display(), "{}", warning);
        }
        tracing::debug!(
            path = %path.display(),
            appenders = config.appenders.len(),
            "Session config loaded"
        );
        Ok(config)
    }

    /// Parse and validate config text, resolving relative paths against
    /// `base_dir`. Returns the reason string on a hard failure.
    pub fn parse(content: &str, base_dir: &Path) -> Result<Self, String> {
        let raw: RawSessionConfig =
            toml::from_str(content).map_err(|e| format!("TOML parse error: {e}"))?;

        let mut config = SessionConfig::default();
        let mut warnings: Vec<String> = Vec::new();

        // -- Root: level --
        if let Some(ref value) = raw.root.level {
            let level = value
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string());
            match level.trim().to_ascii_lowercase().as_str() {
                "all" => config.threshold = Some(Level::Debug),
                "off" => config.threshold = None,
                other => match Level::try_from_name(other) {
                    Some(l) => config.threshold = Some(l),
                    None => warnings.push(format!(
                        "[root] level = \"{level}\" is not recognised. \
                         Valid values: all, debug, info, warn, error, fatal, off. Using default (all).",
                    )),
                },
            }
        }

        // -- Layout: pattern --
        match raw.layout.pattern {
            Some(toml::Value::String(ref pattern)) => {
                let (tokens, pattern_warnings) = layout::parse_pattern(pattern);
                config.layout = tokens;
                warnings.extend(
                    pattern_warnings
                        .into_iter()
                        .map(|w| format!("[layout] pattern: {w}")),
                );
            }
            Some(ref other) => warnings.push(format!(
                "[layout] pattern = {other} is not a string. Using default ({}).",
                constants::DEFAULT_PATTERN,
            )),
            None => {}
        }

        // -- Appenders --
        for (index, raw_appender) in raw.appenders.into_iter().enumerate() {
            if let Some(spec) = validate_appender(index, raw_appender, base_dir, &mut warnings)? {
                config.appenders.push(spec);
            }
        }

        config.warnings = warnings;
        Ok(config)
    }

    /// The file path of every file appender, in declaration order.
    pub fn log_files(&self) -> Vec<&Path> {
        self.appenders
            .iter()
            .filter_map(|a| match a {
                AppenderSpec::File(f) => Some(f.path.as_path()),
                AppenderSpec::Console => None,
            })
            .collect()
    }
}

fn validate_appender(
    index: usize,
    raw: RawAppender,
    base_dir: &Path,
    warnings: &mut Vec<String>,
) -> Result<Option<AppenderSpec>, String> {
    let kind = match raw.kind {
        None => "file".to_string(),
        Some(toml::Value::String(ref k)) => k.to_ascii_lowercase(),
        Some(ref other) => other.to_string(),
    };
    match kind.as_str() {
        "console" | "stderr" => return Ok(Some(AppenderSpec::Console)),
        "file" => {}
        other => {
            warnings.push(format!(
                "[[appender]] #{index}: kind = \"{other}\" is not recognised. \
                 Expected \"file\" or \"console\". Appender ignored.",
            ));
            return Ok(None);
        }
    }

    let path = match raw.path.as_deref().map(str::trim) {
        Some(p) if !p.is_empty() => p,
        _ => return Err(format!("[[appender]] #{index}: file appender has no path")),
    };
    let path = PathBuf::from(path);
    let path = if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    };

    let mut spec = FileSpec {
        path,
        append: true,
        max_file_size: constants::DEFAULT_MAX_FILE_SIZE,
        max_backups: constants::DEFAULT_MAX_BACKUPS,
    };

    match raw.append {
        Some(toml::Value::Boolean(append)) => spec.append = append,
        Some(other) => warnings.push(format!(
            "[[appender]] #{index}: append = {other} is not a boolean. Using default (true).",
        )),
        None => {}
    }

    if let Some(size) = raw.max_file_size {
        let parsed = match &size {
            toml::Value::Integer(b) => u64::try_from(*b).ok(),
            toml::Value::String(t) => parse_size(t),
            _ => None,
        };
        match parsed {
            Some(bytes) if bytes >= constants::MIN_MAX_FILE_SIZE => spec.max_file_size = bytes,
            _ => warnings.push(format!(
                "[[appender]] #{index}: max_file_size = {size} is invalid (minimum {} bytes). \
                 Using default ({}).",
                constants::MIN_MAX_FILE_SIZE,
                constants::DEFAULT_MAX_FILE_SIZE,
            )),
        }
    }

    if let Some(backups) = raw.max_backups {
        let parsed = match backups {
            toml::Value::Integer(n) => usize::try_from(n).ok(),
            _ => None,
        };
        if let Some(n) = parsed.filter(|n| *n <= constants::ABSOLUTE_MAX_BACKUPS) {
            spec.max_backups = n;
        } else {
            warnings.push(format!(
                "[[appender]] #{index}: max_backups = {backups} is out of range (0-{}). \
                 Using default ({}).",
                constants::ABSOLUTE_MAX_BACKUPS,
                constants::DEFAULT_MAX_BACKUPS,
            ));
        }
    }

    Ok(Some(AppenderSpec::File(spec)))
}

/// Parse a size such as `"100KB"`, `"10 MB"` or `"4096"` into bytes.
///
/// Units are binary (KB = 1024 bytes) and case-insensitive.
pub fn parse_size(text: &str) -> Option<u64> {
    let re = Regex::new(r"(?i)^\s*(\d+)\s*(b|kb|mb|gb)?\s*$").ok()?;
    let caps = re.captures(text)?;
    let value: u64 = caps.get(1)?.as_str().parse().ok()?;
    let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        None => 1,
        Some(unit) => match unit.as_str() {
            "b" => 1,
            "kb" => 1024,
            "mb" => 1024 * 1024,
            _ => 1024 * 1024 * 1024,
        },
    };
    value.checked_mul(multiplier)
}

// =============================================================================
// Unit tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> PathBuf {
        PathBuf::from("/srv/app")
    }

    #[test]
    fn test_parse_full_config() {
        let text = r#"
[root]
level = "warn"

[layout]
pattern = "%-5p | %m%n"

[[appender]]
kind = "file"
path = "Log/output.log"
append = false
max_file_size = "100KB"
max_backups = 3
"#;
        let cfg = SessionConfig::parse(text, &base()).unwrap();

        assert_eq!(cfg.threshold, Some(Level::Warn));
        assert!(cfg.warnings.is_empty(), "unexpected warnings: {:?}", cfg.warnings);
        assert_eq!(
            cfg.appenders,
            vec![AppenderSpec::File(FileSpec {
                path: base().join("Log/output.log"),
                append: false,
                max_file_size: 100 * 1024,
                max_backups: 3,
            })]
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let cfg = SessionConfig::parse("", &base()).unwrap();
        assert_eq!(cfg.threshold, Some(Level::Debug));
        assert!(cfg.appenders.is_empty());
        assert!(!cfg.layout.is_empty());
    }

    #[test]
    fn test_level_off_disables_output() {
        let cfg = SessionConfig::parse("[root]\nlevel = \"OFF\"\n", &base()).unwrap();
        assert_eq!(cfg.threshold, None);
    }

    #[test]
    fn test_unknown_level_warns_and_keeps_default() {
        let cfg = SessionConfig::parse("[root]\nlevel = \"chatty\"\n", &base()).unwrap();
        assert_eq!(cfg.threshold, Some(Level::Debug));
        assert_eq!(cfg.warnings.len(), 1);
        assert!(cfg.warnings[0].contains("chatty"));
    }

    #[test]
    fn test_file_appender_without_path_is_an_error() {
        let err = SessionConfig::parse("[[appender]]\nkind = \"file\"\n", &base()).unwrap_err();
        assert!(err.contains("no path"), "got: {err}");
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        assert!(SessionConfig::parse("[[[ nope", &base()).is_err());
    }

    #[test]
    fn test_absolute_path_is_kept() {
        let text = "[[appender]]\npath = \"/var/log/app.log\"\n";
        let cfg = SessionConfig::parse(text, &base()).unwrap();
        assert_eq!(cfg.log_files(), vec![Path::new("/var/log/app.log")]);
    }

    #[test]
    fn test_console_and_unknown_kinds() {
        let text = r#"
[[appender]]
kind = "console"

[[appender]]
kind = "syslog"
"#;
        let cfg = SessionConfig::parse(text, &base()).unwrap();
        assert_eq!(cfg.appenders, vec![AppenderSpec::Console]);
        assert_eq!(cfg.warnings.len(), 1);
        assert!(cfg.log_files().is_empty());
    }

    #[test]
    fn test_out_of_range_rolling_values_fall_back() {
        let text = r#"
[[appender]]
path = "a.log"
max_file_size = 10
max_backups = 1000
"#;
        let cfg = SessionConfig::parse(text, &base()).unwrap();
        match &cfg.appenders[0] {
            AppenderSpec::File(f) => {
                assert_eq!(f.max_file_size, constants::DEFAULT_MAX_FILE_SIZE);
                assert_eq!(f.max_backups, constants::DEFAULT_MAX_BACKUPS);
            }
            other => panic!("expected file appender, got {other:?}"),
        }
        assert_eq!(cfg.warnings.len(), 2);
    }

    #[test]
    fn test_wrongly_typed_values_fall_back_with_warnings() {
        let text = r#"
[root]
level = 3

[layout]
pattern = false

[[appender]]
path = "a.log"
append = "yes"
max_file_size = -5
max_backups = -1
"#;
        let cfg = SessionConfig::parse(text, &base()).unwrap();

        assert_eq!(cfg.threshold, Some(Level::Debug));
        assert_eq!(
            cfg.appenders,
            vec![AppenderSpec::File(FileSpec {
                path: base().join("a.log"),
                append: true,
                max_file_size: constants::DEFAULT_MAX_FILE_SIZE,
                max_backups: constants::DEFAULT_MAX_BACKUPS,
            })]
        );
        assert_eq!(cfg.warnings.len(), 5, "warnings: {:?}", cfg.warnings);
    }

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("4096"), Some(4096));
        assert_eq!(parse_size("100KB"), Some(102_400));
        assert_eq!(parse_size("2 mb"), Some(2 * 1024 * 1024));
        assert_eq!(parse_size("1GB"), Some(1024 * 1024 * 1024));
        assert_eq!(parse_size("ten KB"), None);
        assert_eq!(parse_size("5TB"), None);
    }
}
