// infrakit - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// No string-based error propagation: every variant carries the path it
// concerns and, where one exists, the underlying cause as `source()`.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all infrakit operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum InfraError {
    /// Configuration document load/save failed.
    Config(ConfigError),

    /// Log session construction, clearing or teardown failed.
    Session(SessionError),
}

impl fmt::Display for InfraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Session(e) => write!(f, "Log session error: {e}"),
        }
    }
}

impl std::error::Error for InfraError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Session(e) => Some(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// The underlying failure behind a [`ConfigError::Serialization`].
#[derive(Debug)]
pub enum SerializationCause {
    /// The file could not be opened, read, created or deleted.
    Io(io::Error),

    /// The file content is not a valid document of the requested type.
    Decode(toml::de::Error),

    /// The document could not be rendered as TOML.
    Encode(toml::ser::Error),
}

impl fmt::Display for SerializationCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "{e}"),
            Self::Decode(e) => write!(f, "{e}"),
            Self::Encode(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SerializationCause {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Decode(e) => Some(e),
            Self::Encode(e) => Some(e),
        }
    }
}

/// Errors related to configuration document persistence.
#[derive(Debug)]
pub enum ConfigError {
    /// Loading or saving failed to (de)serialise the document.
    Serialization {
        path: PathBuf,
        cause: SerializationCause,
    },

    /// A save without overwrite permission found an existing file.
    Conflict { path: PathBuf },
}

impl ConfigError {
    /// The file that was being read or written when the error occurred.
    pub fn offending_file(&self) -> &std::path::Path {
        match self {
            Self::Serialization { path, .. } | Self::Conflict { path } => path,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialization { path, cause } => write!(
                f,
                "Serialization of '{}' failed: {cause}",
                path.display()
            ),
            Self::Conflict { path } => write!(
                f,
                "Refusing to overwrite existing file '{}' (overwrite not permitted)",
                path.display()
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Serialization { cause, .. } => Some(cause),
            Self::Conflict { .. } => None,
        }
    }
}

impl From<ConfigError> for InfraError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Session errors
// ---------------------------------------------------------------------------

/// Errors related to log session lifecycle.
#[derive(Debug)]
pub enum SessionError {
    /// The session name is empty or contains a path separator.
    InvalidName { name: String },

    /// The directory expected to hold the session config does not exist.
    DirectoryNotFound { path: PathBuf },

    /// `<directory>/<name>.config` does not exist.
    ConfigNotFound { path: PathBuf },

    /// The session config exists but could not be read or parsed.
    InvalidConfig { path: PathBuf, reason: String },

    /// `clear()` found no output target to close.
    NoOutputTarget,

    /// `clear()` found more than one output target and will not guess.
    AmbiguousOutputTarget { count: usize },

    /// I/O error on an output target.
    Io { path: PathBuf, source: io::Error },

    /// Clearing the log failed; the original cause is attached.
    Clear { source: Box<SessionError> },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName { name } => {
                write!(f, "Invalid log session name '{name}'")
            }
            Self::DirectoryNotFound { path } => write!(
                f,
                "Directory for the log configuration could not be found: '{}'",
                path.display()
            ),
            Self::ConfigNotFound { path } => write!(
                f,
                "Log configuration file could not be found: '{}'",
                path.display()
            ),
            Self::InvalidConfig { path, reason } => write!(
                f,
                "Log configuration '{}' is invalid: {reason}",
                path.display()
            ),
            Self::NoOutputTarget => write!(f, "No output target is configured"),
            Self::AmbiguousOutputTarget { count } => write!(
                f,
                "Expected exactly one output target, found {count}"
            ),
            Self::Io { path, source } => {
                write!(f, "Output target I/O error '{}': {source}", path.display())
            }
            Self::Clear { source } => {
                write!(f, "Error while clearing the log output: {source}")
            }
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Clear { source } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<SessionError> for InfraError {
    fn from(e: SessionError) -> Self {
        Self::Session(e)
    }
}

/// Convenience type alias for infrakit results.
pub type Result<T> = std::result::Result<T, InfraError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_serialization_error_exposes_path_and_cause() {
        let err = ConfigError::Serialization {
            path: PathBuf::from("/tmp/cfg.toml"),
            cause: SerializationCause::Io(io::Error::new(io::ErrorKind::Other, "disk gone")),
        };
        assert_eq!(err.offending_file(), std::path::Path::new("/tmp/cfg.toml"));
        assert!(err.to_string().contains("/tmp/cfg.toml"));
        assert!(err.to_string().contains("disk gone"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_clear_error_chains_to_inner_cause() {
        let err = SessionError::Clear {
            source: Box::new(SessionError::NoOutputTarget),
        };
        let inner = err.source().expect("clear must expose its cause");
        assert_eq!(inner.to_string(), "No output target is configured");
    }

    #[test]
    fn test_infra_error_wraps_subsystem_errors() {
        let err: InfraError = SessionError::DirectoryNotFound {
            path: PathBuf::from("nowhere"),
        }
        .into();
        assert!(matches!(
            err,
            InfraError::Session(SessionError::DirectoryNotFound { .. })
        ));
        assert!(err.to_string().starts_with("Log session error:"));
    }
}
