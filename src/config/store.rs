// infrakit - config/store.rs
//
// Generic load/save of typed configuration documents as TOML.
//
// Design principles:
// - A missing file is not an error: load returns the type's default so a
//   first run needs no setup.
// - A file that exists but does not decode is always an error, carrying
//   the offending path. Corrupt configs are never silently replaced.
// - Save never truncates an existing file in place. With overwrite
//   permission the old file is deleted first and a new one is created with
//   `create_new`; without it, an existing file is a conflict.

use crate::util::error::{ConfigError, SerializationCause};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// A typed document that can be persisted with [`load`] and [`save`].
///
/// Implemented for every `Default + Serialize + DeserializeOwned` type, so
/// deriving the serde traits and `Default` is all a document needs.
pub trait ConfigDocument: Serialize + DeserializeOwned + Default {
    /// Load a document of this type from `path`. See [`load`].
    fn load(path: &Path) -> Result<Self, ConfigError> {
        load(path)
    }

    /// Save this document to `path`, replacing any existing file.
    fn save(&self, path: &Path) -> Result<(), ConfigError> {
        save(path, self)
    }

    /// Save this document to `path`. See [`save_with`].
    fn save_with(&self, path: &Path, force_overwrite: bool) -> Result<(), ConfigError> {
        save_with(path, self, force_overwrite)
    }
}

impl<T> ConfigDocument for T where T: Serialize + DeserializeOwned + Default {}

/// Load a `T` from the TOML file at `path`.
///
/// Returns `T::default()` when the file does not exist. Never creates or
/// modifies the file.
///
/// # Errors
///
/// [`ConfigError::Serialization`] if the file exists but cannot be read or
/// does not decode into `T`.
pub fn load<T: ConfigDocument>(path: &Path) -> Result<T, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No document found; using defaults");
            return Ok(T::default());
        }
        Err(e) => return Err(serialization(path, SerializationCause::Io(e))),
    };

    let doc: T = toml::from_str(&content)
        .map_err(|e| serialization(path, SerializationCause::Decode(e)))?;

    tracing::debug!(path = %path.display(), "Document loaded");
    Ok(doc)
}

/// Save `doc` to `path`, deleting any existing file first.
///
/// Equivalent to `save_with(path, doc, true)`.
pub fn save<T: Serialize>(path: &Path, doc: &T) -> Result<(), ConfigError> {
    save_with(path, doc, true)
}

/// Save `doc` to a newly created file at `path`.
///
/// When `force_overwrite` is true an existing file is deleted first.
///
/// # Errors
///
/// - [`ConfigError::Conflict`] if `force_overwrite` is false and the file
///   exists. The existing file is left untouched.
/// - [`ConfigError::Serialization`] for encoding or I/O failures.
pub fn save_with<T: Serialize>(
    path: &Path,
    doc: &T,
    force_overwrite: bool,
) -> Result<(), ConfigError> {
    // Encode before touching the filesystem so a document that cannot be
    // rendered never costs the caller their previous file.
    let content = toml::to_string_pretty(doc)
        .map_err(|e| serialization(path, SerializationCause::Encode(e)))?;

    // `symlink_metadata` so a dangling link still counts as an existing entry.
    if fs::symlink_metadata(path).is_ok() {
        if !force_overwrite {
            return Err(ConfigError::Conflict {
                path: path.to_path_buf(),
            });
        }
        fs::remove_file(path).map_err(|e| serialization(path, SerializationCause::Io(e)))?;
        tracing::debug!(path = %path.display(), "Removed existing document before save");
    }

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| {
            // Someone recreated the file between the check and the open.
            if e.kind() == io::ErrorKind::AlreadyExists {
                ConfigError::Conflict {
                    path: path.to_path_buf(),
                }
            } else {
                serialization(path, SerializationCause::Io(e))
            }
        })?;

    file.write_all(content.as_bytes())
        .and_then(|()| file.sync_all())
        .map_err(|e| serialization(path, SerializationCause::Io(e)))?;

    tracing::debug!(path = %path.display(), bytes = content.len(), "Document saved");
    Ok(())
}

fn serialization(path: &Path, cause: SerializationCause) -> ConfigError {
    ConfigError::Serialization {
        path: path.to_path_buf(),
        cause,
    }
}

// =============================================================================
// Unit tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        count: u32,
    }

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Nested {
        name: String,
        enabled: bool,
        #[serde(default)]
        tags: Vec<String>,
        limits: Limits,
    }

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Limits {
        max_depth: usize,
        ratio: f64,
    }

    fn sample_nested() -> Nested {
        Nested {
            name: "primary".to_string(),
            enabled: true,
            tags: vec!["a".to_string(), "b".to_string()],
            limits: Limits {
                max_depth: 12,
                ratio: 0.5,
            },
        }
    }

    /// Save and load must round-trip all fields, including nested tables.
    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested.toml");
        let original = sample_nested();

        save(&path, &original).expect("save should succeed");
        let loaded: Nested = load(&path).expect("load should succeed");

        assert_eq!(loaded, original);
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");

        let loaded: Counter = load(&path).expect("missing file is not an error");

        assert_eq!(loaded, Counter::default());
        assert!(!path.exists(), "load must never create the file");
    }

    #[test]
    fn test_load_malformed_file_reports_offending_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, b"count = [[[ not toml").unwrap();

        let err = load::<Counter>(&path).unwrap_err();

        match &err {
            ConfigError::Serialization {
                path: offending,
                cause: SerializationCause::Decode(_),
            } => assert_eq!(offending, &path),
            other => panic!("expected a decode failure, got {other:?}"),
        }
    }

    #[test]
    fn test_load_wrong_shape_is_a_serialization_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shape.toml");
        fs::write(&path, b"count = \"five\"\n").unwrap();

        let err = load::<Counter>(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Serialization { .. }));
    }

    #[test]
    fn test_forced_save_replaces_existing_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("counter.toml");

        save(&path, &Counter { count: 1 }).unwrap();
        save_with(&path, &Counter { count: 2 }, true).unwrap();

        assert_eq!(load::<Counter>(&path).unwrap(), Counter { count: 2 });
    }

    #[test]
    fn test_unforced_save_onto_existing_file_is_a_conflict() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("counter.toml");
        save(&path, &Counter { count: 1 }).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        let err = save_with(&path, &Counter { count: 9 }, false).unwrap_err();

        assert!(matches!(err, ConfigError::Conflict { .. }));
        assert_eq!(err.offending_file(), path.as_path());
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[cfg(unix)]
    #[test]
    fn test_save_over_dangling_symlink() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("linked.toml");
        std::os::unix::fs::symlink(dir.path().join("missing-target.toml"), &path).unwrap();

        let err = save_with(&path, &Counter { count: 4 }, false).unwrap_err();
        assert!(matches!(err, ConfigError::Conflict { .. }));

        save_with(&path, &Counter { count: 5 }, true).unwrap();
        assert_eq!(load::<Counter>(&path).unwrap(), Counter { count: 5 });
    }

    #[test]
    fn test_unforced_save_to_new_path_succeeds() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fresh.toml");

        save_with(&path, &Counter { count: 3 }, false).unwrap();

        assert_eq!(load::<Counter>(&path).unwrap(), Counter { count: 3 });
    }

    #[test]
    fn test_save_into_missing_directory_is_a_serialization_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("no").join("such").join("dir.toml");

        let err = save(&path, &Counter { count: 1 }).unwrap_err();

        assert!(matches!(
            err,
            ConfigError::Serialization {
                cause: SerializationCause::Io(_),
                ..
            }
        ));
    }

    #[test]
    fn test_unencodable_document_keeps_previous_file() {
        // TOML cannot represent a bare top-level integer.
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("counter.toml");
        save(&path, &Counter { count: 4 }).unwrap();

        let err = save(&path, &42u32).unwrap_err();

        assert!(matches!(
            err,
            ConfigError::Serialization {
                cause: SerializationCause::Encode(_),
                ..
            }
        ));
        assert_eq!(load::<Counter>(&path).unwrap(), Counter { count: 4 });
    }

    #[test]
    fn test_trait_methods_delegate_to_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trait.toml");
        let doc = sample_nested();

        doc.save(&path).unwrap();
        assert!(matches!(
            doc.save_with(&path, false),
            Err(ConfigError::Conflict { .. })
        ));
        assert_eq!(Nested::load(&path).unwrap(), doc);
    }
}
