// infrakit - logging/appender.rs
//
// Output targets for a log session and the `MakeWriter` that fans each
// formatted entry out to all of them.
//
// File appenders write every entry with a single unbuffered `write_all`, so
// an entry is on disk as soon as the logging call returns and there is
// nothing to lose on an abrupt exit. Handles sit behind a `Mutex` only
// because `MakeWriter` must be `Send + Sync`; sessions are single-threaded.

use crate::logging::settings::{AppenderSpec, FileSpec};
use crate::util::error::SessionError;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing_subscriber::fmt::MakeWriter;

// =============================================================================
// File appender
// =============================================================================

#[derive(Debug)]
struct FileState {
    /// `None` once closed; writes are then dropped.
    file: Option<File>,
    /// Bytes in the active file, tracked for rolling.
    size: u64,
}

/// A log file with size-based rolling.
#[derive(Debug)]
pub struct FileAppender {
    spec: FileSpec,
    state: Mutex<FileState>,
}

impl FileAppender {
    /// Open (creating parent directories and the file as needed).
    ///
    /// With `append = false` any existing content is discarded.
    pub fn open(spec: FileSpec) -> Result<Self, SessionError> {
        if let Some(parent) = spec.path.parent() {
            fs::create_dir_all(parent).map_err(|source| SessionError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let file = open_file(&spec.path, spec.append).map_err(|source| SessionError::Io {
            path: spec.path.clone(),
            source,
        })?;
        let size = file.metadata().map(|m| m.len()).unwrap_or(0);

        tracing::debug!(path = %spec.path.display(), size, "File appender opened");
        Ok(Self {
            spec,
            state: Mutex::new(FileState {
                file: Some(file),
                size,
            }),
        })
    }

    /// Settings the appender was opened with.
    pub fn spec(&self) -> &FileSpec {
        &self.spec
    }

    /// Path of the active log file.
    pub fn path(&self) -> &Path {
        &self.spec.path
    }

    /// Whether the handle has been released.
    pub fn is_closed(&self) -> bool {
        self.lock().file.is_none()
    }

    /// Flush and release the file handle. Idempotent.
    pub fn close(&self) -> Result<(), SessionError> {
        let mut state = self.lock();
        if let Some(file) = state.file.take() {
            file.sync_all().map_err(|source| SessionError::Io {
                path: self.spec.path.clone(),
                source,
            })?;
            tracing::debug!(path = %self.spec.path.display(), "File appender closed");
        }
        Ok(())
    }

    fn write_entry(&self, buf: &[u8]) -> io::Result<()> {
        let mut state = self.lock();
        if state.file.is_none() {
            return Ok(());
        }

        let incoming = buf.len() as u64;
        let mut roll_err = None;
        if state.size > 0 && state.size + incoming > self.spec.max_file_size {
            roll_err = self.roll(&mut state).err();
        }

        // A failed roll still leaves an open file; the entry is written
        // there and the roll error is reported afterwards.
        if let Some(file) = state.file.as_mut() {
            file.write_all(buf)?;
            state.size += incoming;
        }
        roll_err.map_or(Ok(()), Err)
    }

    /// Move `path` to `path.1` (shifting older backups up) and start a fresh
    /// file. Backups beyond `max_backups` are deleted.
    ///
    /// On failure the active file is reopened in append mode so later
    /// entries still have somewhere to go.
    fn roll(&self, state: &mut FileState) -> io::Result<()> {
        // Release the handle before renaming; Windows refuses otherwise.
        state.file = None;
        state.size = 0;

        let path = &self.spec.path;
        match self.rotate_backups().and_then(|()| open_file(path, false)) {
            Ok(file) => {
                state.file = Some(file);
                Ok(())
            }
            Err(e) => {
                let file = open_file(path, true)?;
                state.size = file.metadata().map(|m| m.len()).unwrap_or(0);
                state.file = Some(file);
                Err(e)
            }
        }
    }

    fn rotate_backups(&self) -> io::Result<()> {
        let path = &self.spec.path;
        let max = self.spec.max_backups;
        if max == 0 {
            return Ok(());
        }

        let oldest = backup_path(path, max);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for i in (1..max).rev() {
            let from = backup_path(path, i);
            if from.exists() {
                fs::rename(&from, backup_path(path, i + 1))?;
            }
        }
        match fs::rename(path, backup_path(path, 1)) {
            // The active file was removed behind our back; nothing to keep.
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn lock(&self) -> MutexGuard<'_, FileState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn open_file(path: &Path, append: bool) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true);
    if append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    options.open(path)
}

/// `<path>.<index>`, e.g. `output.log.2`.
pub fn backup_path(path: &Path, index: usize) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

// =============================================================================
// Appender set
// =============================================================================

/// One configured output target.
#[derive(Debug)]
pub enum Appender {
    File(FileAppender),
    Console,
}

impl Appender {
    fn open(spec: &AppenderSpec) -> Result<Self, SessionError> {
        match spec {
            AppenderSpec::File(file) => Ok(Appender::File(FileAppender::open(file.clone())?)),
            AppenderSpec::Console => Ok(Appender::Console),
        }
    }

    fn write_entry(&self, buf: &[u8]) -> io::Result<()> {
        match self {
            Appender::File(file) => file.write_entry(buf),
            Appender::Console => io::stderr().write_all(buf),
        }
    }

    /// Release any held resources. Console targets have none.
    pub fn close(&self) -> Result<(), SessionError> {
        match self {
            Appender::File(file) => file.close(),
            Appender::Console => Ok(()),
        }
    }
}

/// All output targets of a session, shared with its subscriber.
#[derive(Debug, Clone)]
pub struct Appenders(Arc<Vec<Appender>>);

impl Appenders {
    /// Open every target in `specs`, failing on the first one that cannot
    /// be opened. Targets opened before the failure are closed again.
    pub fn open(specs: &[AppenderSpec]) -> Result<Self, SessionError> {
        let mut opened: Vec<Appender> = Vec::with_capacity(specs.len());
        for spec in specs {
            match Appender::open(spec) {
                Ok(appender) => opened.push(appender),
                Err(e) => {
                    for appender in &opened {
                        let _ = appender.close();
                    }
                    return Err(e);
                }
            }
        }
        Ok(Self(Arc::new(opened)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Appender> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Close every target, returning the first error after trying all.
    pub fn close_all(&self) -> Result<(), SessionError> {
        let mut first_err = None;
        for appender in self.iter() {
            if let Err(e) = appender.close() {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

/// Writer handed to the formatter for a single event.
pub struct AppendersWriter<'a> {
    targets: &'a [Appender],
}

impl Write for AppendersWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut first_err = None;
        for target in self.targets {
            if let Err(e) = target.write_entry(buf) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.targets.iter().any(|t| matches!(t, Appender::Console)) {
            io::stderr().flush()?;
        }
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Appenders {
    type Writer = AppendersWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        AppendersWriter { targets: &self.0 }
    }
}
