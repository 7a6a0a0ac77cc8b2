// infrakit - logging/session.rs
//
// A log session: one named configuration, its output targets, and a
// dedicated `tracing` dispatcher that only this session writes through.
//
// Lifecycle:
//   open()   validate directory + `<name>.config`, parse, open appenders
//   clear()  close the single file target, delete it, re-apply the
//            configuration, write a start marker
//   close()  release every target (also done best-effort on drop)
//
// The session never installs a global subscriber. Every entry is emitted
// inside `dispatcher::with_default`, so several sessions can coexist with
// each other and with whatever subscriber the host application uses.

use crate::logging::appender::{Appender, Appenders, FileAppender};
use crate::logging::layout::PatternLayout;
use crate::logging::level::{self, Level};
use crate::logging::settings::SessionConfig;
use crate::util::constants;
use crate::util::error::SessionError;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::panic::Location;
use std::path::{Path, PathBuf};
use tracing::Dispatch;

/// The applied configuration: threshold, open targets, and the dispatcher
/// that renders into them.
struct Backend {
    config: SessionConfig,
    threshold: Option<Level>,
    appenders: Appenders,
    dispatch: Dispatch,
}

impl Backend {
    fn apply(config_path: &Path, name: &str) -> Result<Self, SessionError> {
        Self::build(SessionConfig::load(config_path)?, name)
    }

    fn build(config: SessionConfig, name: &str) -> Result<Self, SessionError> {
        let appenders = Appenders::open(&config.appenders)?;

        let subscriber = tracing_subscriber::fmt()
            .with_writer(appenders.clone())
            .with_max_level(tracing::Level::TRACE)
            .event_format(PatternLayout::new(config.layout.clone(), name))
            .finish();

        Ok(Self {
            threshold: config.threshold,
            config,
            appenders,
            dispatch: Dispatch::new(subscriber),
        })
    }
}

/// Handle to a single configured log destination.
pub struct LogSession {
    name: String,
    config_path: PathBuf,
    backend: Backend,
}

impl fmt::Debug for LogSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSession")
            .field("name", &self.name)
            .field("config_path", &self.config_path)
            .field("threshold", &self.backend.threshold)
            .field("appenders", &self.backend.appenders.len())
            .finish()
    }
}

impl LogSession {
    /// Open the session described by `<dir>/<name>.config`.
    ///
    /// # Errors
    ///
    /// - [`SessionError::InvalidName`] for an empty name or one containing a
    ///   path separator.
    /// - [`SessionError::DirectoryNotFound`] if `dir` is not a directory.
    /// - [`SessionError::ConfigNotFound`] if the config file is missing.
    /// - [`SessionError::InvalidConfig`] / [`SessionError::Io`] if the config
    ///   cannot be applied.
    pub fn open(dir: impl AsRef<Path>, name: &str) -> Result<Self, SessionError> {
        let dir = dir.as_ref();

        if name.trim().is_empty() || name.contains(['/', '\\']) {
            return Err(SessionError::InvalidName {
                name: name.to_string(),
            });
        }

        if !dir.is_dir() {
            return Err(SessionError::DirectoryNotFound {
                path: dir.to_path_buf(),
            });
        }

        let config_path = dir.join(format!(
            "{name}.{}",
            constants::SESSION_CONFIG_EXTENSION
        ));
        if !config_path.is_file() {
            return Err(SessionError::ConfigNotFound { path: config_path });
        }

        let backend = Backend::apply(&config_path, name)?;

        tracing::info!(
            session = name,
            config = %config_path.display(),
            appenders = backend.appenders.len(),
            "Log session initialised"
        );

        Ok(Self {
            name: name.to_string(),
            config_path,
            backend,
        })
    }

    /// Open `<name>.config` from the process working directory.
    pub fn open_in_current_dir(name: &str) -> Result<Self, SessionError> {
        let dir = std::env::current_dir().map_err(|source| SessionError::Io {
            path: PathBuf::from("."),
            source,
        })?;
        Self::open(dir, name)
    }

    /// Session name (the config file stem).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full path of the `<name>.config` file.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Path of the first file target, if any.
    pub fn log_file(&self) -> Option<&Path> {
        self.backend.appenders.iter().find_map(|a| match a {
            Appender::File(file) => Some(file.path()),
            Appender::Console => None,
        })
    }

    /// Whether entries at `level` pass the configured threshold.
    pub fn is_enabled(&self, level: Level) -> bool {
        self.backend.threshold.is_some_and(|t| level >= t)
    }

    // -------------------------------------------------------------------------
    // Appending
    // -------------------------------------------------------------------------

    /// Write `message` at `level`.
    pub fn append(&self, level: Level, message: impl fmt::Display) {
        if !self.is_enabled(level) {
            return;
        }
        let message = message.to_string();
        tracing::dispatcher::with_default(&self.backend.dispatch, || {
            level::dispatch(level, &message);
        });
    }

    pub fn debug(&self, message: impl fmt::Display) {
        self.append(Level::Debug, message);
    }

    pub fn info(&self, message: impl fmt::Display) {
        self.append(Level::Info, message);
    }

    pub fn warn(&self, message: impl fmt::Display) {
        self.append(Level::Warn, message);
    }

    pub fn error(&self, message: impl fmt::Display) {
        self.append(Level::Error, message);
    }

    pub fn fatal(&self, message: impl fmt::Display) {
        self.append(Level::Fatal, message);
    }

    /// Write a diagnostic dump of `err` as five ERROR entries: `message`,
    /// the root cause, the error's own message, the reporting location and
    /// the trace.
    #[track_caller]
    pub fn error_with(&self, message: impl fmt::Display, err: &(dyn std::error::Error + 'static)) {
        let report = ErrorReport::capture(err, Some(Location::caller()));
        self.error(message);
        self.error(&report.root_cause);
        self.error(&report.message);
        self.error(&report.origin);
        self.error(&report.trace);
    }

    // -------------------------------------------------------------------------
    // Markers
    // -------------------------------------------------------------------------

    /// INFO entry with the default dash rule.
    pub fn log_start_marker(&self) {
        self.log_start_marker_with(constants::DEFAULT_START_MARKER);
    }

    /// INFO entry with `marker`.
    pub fn log_start_marker_with(&self, marker: &str) {
        self.info(marker);
    }

    /// A blank INFO entry, `Stopping: <name>`, then the default equals rule.
    pub fn log_end_marker(&self) {
        self.info("");
        self.info(format_args!("{}{}", constants::STOPPING_PREFIX, self.name));
        self.log_end_marker_with(constants::DEFAULT_END_MARKER);
    }

    /// INFO entry with `marker`.
    pub fn log_end_marker_with(&self, marker: &str) {
        self.info(marker);
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Empty the log: close the output file, delete it, re-apply the
    /// configuration and write a start marker.
    ///
    /// Requires exactly one output target, and it must be a file.
    ///
    /// # Errors
    ///
    /// [`SessionError::Clear`] wrapping the cause, e.g.
    /// [`SessionError::NoOutputTarget`] or
    /// [`SessionError::AmbiguousOutputTarget`].
    pub fn clear(&mut self) -> Result<(), SessionError> {
        self.clear_inner().map_err(|e| SessionError::Clear {
            source: Box::new(e),
        })
    }

    fn clear_inner(&mut self) -> Result<(), SessionError> {
        let target = self.sole_file_target()?;
        let path = target.path().to_path_buf();

        // Validate the new configuration before anything is destroyed.
        let config = SessionConfig::load(&self.config_path)?;

        target.close()?;
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                self.restore_backend()?;
                return Err(SessionError::Io { path, source });
            }
        }

        match Backend::build(config, &self.name) {
            Ok(backend) => self.backend = backend,
            Err(e) => {
                self.restore_backend()?;
                return Err(e);
            }
        }
        tracing::debug!(session = %self.name, path = %path.display(), "Log cleared");

        self.log_start_marker();
        Ok(())
    }

    /// Reopen the previously applied configuration after a failed clear so
    /// the session keeps a working target.
    fn restore_backend(&mut self) -> Result<(), SessionError> {
        let backend = Backend::build(self.backend.config.clone(), &self.name)?;
        self.backend = backend;
        tracing::warn!(session = %self.name, "Clear failed; previous log target restored");
        Ok(())
    }

    fn sole_file_target(&self) -> Result<&FileAppender, SessionError> {
        let appenders = &self.backend.appenders;
        match appenders.len() {
            0 => Err(SessionError::NoOutputTarget),
            1 => match appenders.iter().next() {
                Some(Appender::File(file)) => Ok(file),
                _ => Err(SessionError::NoOutputTarget),
            },
            count => Err(SessionError::AmbiguousOutputTarget { count }),
        }
    }

    /// Release every output target.
    pub fn close(self) -> Result<(), SessionError> {
        let result = self.backend.appenders.close_all();
        tracing::debug!(session = %self.name, "Log session closed");
        result
    }
}

impl Drop for LogSession {
    fn drop(&mut self) {
        if let Err(e) = self.backend.appenders.close_all() {
            tracing::warn!(session = %self.name, error = %e, "Failed to close log output");
        }
    }
}

// =============================================================================
// Error report
// =============================================================================

/// The pieces of an error written by [`LogSession::error_with`].
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorReport {
    /// Message of the last error in the `source()` chain.
    pub root_cause: String,
    /// The error's own message.
    pub message: String,
    /// `file:line` where the error was reported, empty if unknown.
    pub origin: String,
    /// A captured backtrace when enabled, otherwise the rendered cause
    /// chain; empty when there is neither.
    pub trace: String,
}

impl ErrorReport {
    pub fn capture(
        err: &(dyn std::error::Error + 'static),
        origin: Option<&Location<'_>>,
    ) -> Self {
        let mut causes: Vec<String> = Vec::new();
        let mut current = err.source();
        while let Some(cause) = current {
            causes.push(cause.to_string());
            current = cause.source();
        }

        let message = err.to_string();
        let root_cause = causes.last().cloned().unwrap_or_else(|| message.clone());

        let backtrace = Backtrace::capture();
        let trace = if backtrace.status() == BacktraceStatus::Captured {
            backtrace.to_string()
        } else {
            causes
                .iter()
                .enumerate()
                .map(|(i, c)| format!("{i}: {c}"))
                .collect::<Vec<_>>()
                .join("\n")
        };

        Self {
            root_cause,
            message,
            origin: origin
                .map(|l| format!("{}:{}", l.file(), l.line()))
                .unwrap_or_default(),
            trace,
        }
    }
}
