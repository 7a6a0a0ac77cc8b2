// infrakit - logging/layout.rs
//
// Conversion-pattern layout for session output.
//
// Supported tokens (any of them may carry a width, `%-5p` pads on the right,
// `%5p` on the left):
//   %d           local timestamp, `%d{<chrono format>}` to override
//   %p           level (DEBUG, INFO, WARN, ERROR, FATAL)
//   %t           thread name, or its id for unnamed threads
//   %c           session name
//   %m           message
//   %n           newline
//   %%           literal percent sign

use crate::logging::level::{self, Level, FATAL_FIELD};
use crate::util::constants;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use regex::Regex;
use std::fmt::{self, Write as _};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// What a conversion token expands to.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Timestamp with a chrono strftime format.
    Date(String),
    Level,
    Thread,
    Logger,
    Message,
}

/// One parsed element of a conversion pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Literal(String),
    Field {
        kind: FieldKind,
        /// Minimum width; 0 means no padding.
        width: usize,
        /// Pad on the right instead of the left.
        left_align: bool,
    },
}

/// Everything a pattern can refer to for a single entry.
#[derive(Debug, Clone)]
pub struct EntryContext<'a> {
    pub timestamp: DateTime<Local>,
    pub level: Level,
    pub thread: &'a str,
    pub logger: &'a str,
    pub message: &'a str,
}

/// Parse `pattern` into tokens.
///
/// Never fails: unknown conversions are kept literally, invalid date formats
/// fall back to the default and `{..}` options on anything but `%d` are
/// dropped. Each case is described in the returned warnings.
pub fn parse_pattern(pattern: &str) -> (Vec<Token>, Vec<String>) {
    let mut tokens: Vec<Token> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    let re = match Regex::new(r"%(-?)(\d*)([A-Za-z%])(?:\{([^}]*)\})?") {
        Ok(re) => re,
        Err(_) => return (vec![Token::Literal(pattern.to_string())], warnings),
    };

    let mut last = 0;
    for caps in re.captures_iter(pattern) {
        let Some(whole) = caps.get(0) else { continue };
        push_literal(&mut tokens, &pattern[last..whole.start()]);
        last = whole.end();

        let left_align = !caps[1].is_empty();
        let width = caps[2].parse::<usize>().unwrap_or(0);
        let option = caps.get(4).map(|m| m.as_str());

        let conversion = &caps[3];
        if let Some(opt) = option.filter(|_| conversion != "d") {
            warnings.push(format!("option '{{{opt}}}' ignored for '%{conversion}'"));
        }

        let kind = match conversion {
            "%" => {
                push_literal(&mut tokens, "%");
                continue;
            }
            "n" => {
                push_literal(&mut tokens, "\n");
                continue;
            }
            "d" => FieldKind::Date(date_format(option, &mut warnings)),
            "p" => FieldKind::Level,
            "t" => FieldKind::Thread,
            "c" => FieldKind::Logger,
            "m" => FieldKind::Message,
            other => {
                warnings.push(format!(
                    "unknown conversion '%{other}' kept as literal text"
                ));
                push_literal(&mut tokens, whole.as_str());
                continue;
            }
        };
        tokens.push(Token::Field {
            kind,
            width,
            left_align,
        });
    }
    push_literal(&mut tokens, &pattern[last..]);

    (tokens, warnings)
}

fn push_literal(tokens: &mut Vec<Token>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Token::Literal(prev)) = tokens.last_mut() {
        prev.push_str(text);
    } else {
        tokens.push(Token::Literal(text.to_string()));
    }
}

fn date_format(option: Option<&str>, warnings: &mut Vec<String>) -> String {
    match option {
        None | Some("") => constants::DEFAULT_DATE_FORMAT.to_string(),
        Some(fmt) => {
            if StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error)) {
                warnings.push(format!(
                    "invalid date format '{fmt}', using default ({})",
                    constants::DEFAULT_DATE_FORMAT
                ));
                constants::DEFAULT_DATE_FORMAT.to_string()
            } else {
                fmt.to_string()
            }
        }
    }
}

/// Render one entry with `tokens`.
pub fn render(tokens: &[Token], entry: &EntryContext<'_>) -> String {
    let mut out = String::with_capacity(entry.message.len() + 64);
    for token in tokens {
        match token {
            Token::Literal(text) => out.push_str(text),
            Token::Field {
                kind,
                width,
                left_align,
            } => {
                let value = match kind {
                    FieldKind::Date(fmt) => entry.timestamp.format(fmt).to_string(),
                    FieldKind::Level => entry.level.label().to_string(),
                    FieldKind::Thread => entry.thread.to_string(),
                    FieldKind::Logger => entry.logger.to_string(),
                    FieldKind::Message => entry.message.to_string(),
                };
                // Writing to a String cannot fail.
                let _ = if *left_align {
                    write!(out, "{value:<width$}", width = *width)
                } else {
                    write!(out, "{value:>width$}", width = *width)
                };
            }
        }
    }
    out
}

// =============================================================================
// tracing-subscriber integration
// =============================================================================

/// A `FormatEvent` that renders events with a parsed conversion pattern.
#[derive(Debug, Clone)]
pub struct PatternLayout {
    tokens: Vec<Token>,
    logger: String,
}

impl PatternLayout {
    pub fn new(tokens: Vec<Token>, logger: impl Into<String>) -> Self {
        Self {
            tokens,
            logger: logger.into(),
        }
    }
}

/// Collects the message and fatal marker of an event.
#[derive(Default)]
struct EntryVisitor {
    message: String,
    fatal: bool,
}

impl Visit for EntryVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == FATAL_FIELD {
            self.fatal = value;
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }
}

impl<S, N> FormatEvent<S, N> for PatternLayout
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut visitor = EntryVisitor::default();
        event.record(&mut visitor);

        let current = std::thread::current();
        let thread = match current.name() {
            Some(name) => name.to_string(),
            None => format!("{:?}", current.id()),
        };

        let entry = EntryContext {
            timestamp: Local::now(),
            level: level::from_tracing(event.metadata().level(), visitor.fatal),
            thread: &thread,
            logger: &self.logger,
            message: &visitor.message,
        };
        writer.write_str(&render(&self.tokens, &entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry<'a>(level: Level, message: &'a str) -> EntryContext<'a> {
        EntryContext {
            timestamp: Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap(),
            level,
            thread: "main",
            logger: "service",
            message,
        }
    }

    #[test]
    fn test_default_pattern_renders_all_parts() {
        let (tokens, warnings) = parse_pattern(constants::DEFAULT_PATTERN);
        assert!(warnings.is_empty());

        let line = render(&tokens, &entry(Level::Warn, "disk low"));

        assert_eq!(line, "2024-03-09 14:05:07,000 WARN  main | disk low\n");
    }

    #[test]
    fn test_width_and_alignment() {
        let (tokens, _) = parse_pattern("[%-6p][%6p]");
        let line = render(&tokens, &entry(Level::Info, ""));
        assert_eq!(line, "[INFO  ][  INFO]");
    }

    #[test]
    fn test_custom_date_format_and_logger() {
        let (tokens, warnings) = parse_pattern("%d{%H:%M} %c: %m");
        assert!(warnings.is_empty());
        let line = render(&tokens, &entry(Level::Fatal, "boom"));
        assert_eq!(line, "14:05 service: boom");
    }

    #[test]
    fn test_percent_escape_and_literals_merge() {
        let (tokens, _) = parse_pattern("100%% %m");
        assert_eq!(tokens[0], Token::Literal("100% ".to_string()));
        assert_eq!(render(&tokens, &entry(Level::Info, "done")), "100% done");
    }

    #[test]
    fn test_unknown_conversion_is_kept_and_reported() {
        let (tokens, warnings) = parse_pattern("%x %m");
        assert_eq!(warnings.len(), 1);
        assert_eq!(render(&tokens, &entry(Level::Info, "hi")), "%x hi");
    }

    #[test]
    fn test_option_on_non_date_conversion_is_reported() {
        let (tokens, warnings) = parse_pattern("%m{x}|%-5p");
        assert_eq!(warnings, vec!["option '{x}' ignored for '%m'".to_string()]);
        assert_eq!(render(&tokens, &entry(Level::Info, "hi")), "hi|INFO ");
    }

    #[test]
    fn test_invalid_date_format_falls_back() {
        let (tokens, warnings) = parse_pattern("%d{%Q}");
        assert_eq!(warnings.len(), 1);
        assert_eq!(
            tokens,
            vec![Token::Field {
                kind: FieldKind::Date(constants::DEFAULT_DATE_FORMAT.to_string()),
                width: 0,
                left_align: false,
            }]
        );
    }
}
