//! # Audit Log
//!
//! Append-only run journal. Every record is one line of the form
//! `<timestamp>: <message>`, and a fixed separator line marks the start of
//! each run. The file is opened once in append mode and never truncated
//! between runs, so the log accumulates the full maintenance history.
//!
//! The log is a best-effort sink: the orchestrator keeps appending outcomes
//! on both the success and the failure path, and flushes the log
//! unconditionally at the end of every run.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;

/// Separator line written at the very start of each run.
pub const RUN_SEPARATOR: &str =
    "***************************************************************************************************";

/// Local wall-clock timestamp in asctime form, e.g. `Mon Jan 11 03:00:01 2016`.
fn timestamp() -> String {
    Local::now().format("%a %b %e %H:%M:%S %Y").to_string()
}

/// Append a record, ignoring sink errors. Maintenance never aborts because
/// a log line could not be written.
pub fn note(sink: &dyn AuditSink, message: &str) {
    let _ = sink.append(message);
}

/// Append-only audit sink.
pub trait AuditSink: Send + Sync {
    /// Append one record, prefixed with the current timestamp.
    fn append(&self, message: &str) -> io::Result<()>;

    /// Append the run separator line, with no timestamp prefix.
    fn separator(&self) -> io::Result<()>;

    /// Flush buffered records to durable storage.
    fn flush(&self) -> io::Result<()>;
}

/// File-backed audit sink.
pub struct FileAuditSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileAuditSink {
    /// Open or create the audit log file in append mode.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// The audit log path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for FileAuditSink {
    fn append(&self, message: &str) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap();
        writeln!(writer, "{}: {}", timestamp(), message)?;
        writer.flush()
    }

    fn separator(&self) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap();
        writeln!(writer, "{}", RUN_SEPARATOR)?;
        writer.flush()
    }

    fn flush(&self) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap();
        writer.flush()?;
        writer.get_ref().sync_all()
    }
}

/// In-memory audit sink for testing. Lines are rendered exactly as the file
/// sink would write them.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    lines: Mutex<Vec<String>>,
}

impl MemoryAuditSink {
    /// Create an empty in-memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded lines.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    /// Number of recorded lines.
    pub fn len(&self) -> usize {
        self.lines.lock().unwrap().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.lines.lock().unwrap().is_empty()
    }

    /// Whether any recorded line ends with the given message.
    pub fn contains_message(&self, message: &str) -> bool {
        let suffix = format!(": {}", message);
        self.lines
            .lock()
            .unwrap()
            .iter()
            .any(|line| line.ends_with(&suffix))
    }
}

impl AuditSink for MemoryAuditSink {
    fn append(&self, message: &str) -> io::Result<()> {
        self.lines
            .lock()
            .unwrap()
            .push(format!("{}: {}", timestamp(), message));
        Ok(())
    }

    fn separator(&self) -> io::Result<()> {
        self.lines.lock().unwrap().push(RUN_SEPARATOR.to_string());
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_file_sink_appends_timestamped_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("maintenance.log");
        let sink = FileAuditSink::open(&path).unwrap();
        sink.separator().unwrap();
        sink.append("Database connections blocked.").unwrap();
        sink.flush().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(RUN_SEPARATOR));
        let record = lines.next().unwrap();
        assert!(record.ends_with(": Database connections blocked."));
        // timestamp prefix is non-empty
        assert!(record.len() > ": Database connections blocked.".len());
    }

    #[test]
    fn test_file_sink_never_truncates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("maintenance.log");
        {
            let sink = FileAuditSink::open(&path).unwrap();
            sink.append("first run").unwrap();
            sink.flush().unwrap();
        }
        {
            let sink = FileAuditSink::open(&path).unwrap();
            sink.append("second run").unwrap();
            sink.flush().unwrap();
        }
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("first run"));
        assert!(text.contains("second run"));
    }

    #[test]
    fn test_memory_sink_records() {
        let sink = MemoryAuditSink::new();
        assert!(sink.is_empty());
        sink.separator().unwrap();
        sink.append("Geodatabase compressed.").unwrap();
        assert_eq!(sink.len(), 2);
        assert!(sink.contains_message("Geodatabase compressed."));
        assert!(!sink.contains_message("Indexes rebuilt."));
    }
}
