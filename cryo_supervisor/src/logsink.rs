//! Operator-facing logging sink (C11).
//!
//! Every operator log line is timestamped, appended to a monthly rolling
//! file, echoed to stdout, and (for `log`, not `log_to_file`) handed back
//! to the caller to broadcast to observers. This is independent of the
//! `tracing` diagnostic stream set up in `main.rs` — that one is for the
//! process's own health; this one is the record an operator reads.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Local};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum LogSinkError {
    #[error("failed to open log file {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write log file: {0}")]
    WriteFailed(#[source] std::io::Error),
}

pub struct LogSink {
    dir: PathBuf,
    open_year_month: Option<(i32, u32)>,
    file: Option<File>,
}

impl LogSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            open_year_month: None,
            file: None,
        }
    }

    fn file_path(dir: &Path, year: i32, month: u32) -> PathBuf {
        dir.join(format!("cute_server_{year:04}{month:02}.log"))
    }

    fn ensure_current_file(&mut self) -> Result<(), LogSinkError> {
        let now = Local::now();
        let ym = (now.year(), now.month());
        if self.open_year_month == Some(ym) && self.file.is_some() {
            return Ok(());
        }

        std::fs::create_dir_all(&self.dir).map_err(|e| LogSinkError::OpenFailed {
            path: self.dir.clone(),
            source: e,
        })?;
        let path = Self::file_path(&self.dir, ym.0, ym.1);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| LogSinkError::OpenFailed { path: path.clone(), source: e })?;
        self.file = Some(file);
        self.open_year_month = Some(ym);
        Ok(())
    }

    fn append_line(&mut self, line: &str) -> Result<(), LogSinkError> {
        self.ensure_current_file()?;
        if let Some(file) = &mut self.file {
            writeln!(file, "{line}").map_err(LogSinkError::WriteFailed)?;
        }
        Ok(())
    }

    /// Broadcast-worthy operator log line: timestamped, appended to the
    /// monthly file, echoed to stdout, and returned for the caller to fan
    /// out to observers.
    pub fn log(&mut self, text: &str) -> Result<String, LogSinkError> {
        let stamped = format!("{} {}", Local::now().format("%Y-%m-%d %H:%M:%S"), text);
        self.append_line(&stamped)?;
        println!("{stamped}");
        Ok(stamped)
    }

    /// Non-broadcast variant used for periodic sampled values: same file
    /// and stdout echo, no observer fan-out.
    pub fn log_to_file(&mut self, text: &str) -> Result<(), LogSinkError> {
        let stamped = format!("{} {}", Local::now().format("%Y-%m-%d %H:%M:%S"), text);
        self.append_line(&stamped)?;
        info!(target: "operator_log", "{stamped}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn log_creates_file_named_for_current_year_month() {
        let dir = tempdir().unwrap();
        let mut sink = LogSink::new(dir.path());
        sink.log("activated").unwrap();

        let now = Local::now();
        let expected = dir
            .path()
            .join(format!("cute_server_{:04}{:02}.log", now.year(), now.month()));
        assert!(expected.exists());
        let contents = std::fs::read_to_string(expected).unwrap();
        assert!(contents.contains("activated"));
    }

    #[test]
    fn log_returns_the_stamped_line_for_broadcast() {
        let dir = tempdir().unwrap();
        let mut sink = LogSink::new(dir.path());
        let line = sink.log("hello").unwrap();
        assert!(line.ends_with("hello"));
    }

    #[test]
    fn repeated_calls_append_to_the_same_file() {
        let dir = tempdir().unwrap();
        let mut sink = LogSink::new(dir.path());
        sink.log("one").unwrap();
        sink.log("two").unwrap();

        let now = Local::now();
        let path = dir
            .path()
            .join(format!("cute_server_{:04}{:02}.log", now.year(), now.month()));
        let contents = std::fs::read_to_string(path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn log_to_file_does_not_echo_to_broadcast_return_value() {
        let dir = tempdir().unwrap();
        let mut sink = LogSink::new(dir.path());
        sink.log_to_file("sampled value").unwrap();

        let now = Local::now();
        let path = dir
            .path()
            .join(format!("cute_server_{:04}{:02}.log", now.year(), now.month()));
        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.contains("sampled value"));
    }
}
