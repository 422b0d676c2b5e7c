//! Audit log for relayed and injected traffic
//!
//! Every message the relay forwards or injects is recorded here, alongside
//! general lifecycle events. The relay core only depends on the [`AuditSink`]
//! trait; [`AuditLog`] is the file-backed implementation matching the
//! original tool's log formats, and [`MemoryAudit`] collects structured
//! events for tests and embedders.

use chrono::{TimeDelta, Utc};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::Result;

/// Append-only event recorder consumed by the relay.
///
/// Implementations must absorb persistence failures internally; the relay
/// loop never sees them.
pub trait AuditSink: Send + Sync {
  /// Record one event.
  fn log(&self, category: &str, subject: &str, message: &str);
}

/// One recorded audit event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
  /// Wall-clock `HH:MM:SS` at a fixed UTC+1 offset
  pub timestamp: String,
  /// Scenario identifier, e.g. `Test_Drop`
  pub category: String,
  /// Direction label or `General`
  pub subject: String,
  /// The forwarded text or lifecycle message
  pub message: String,
}

impl fmt::Display for LogEvent {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "[{}] [{}] [{}]: {}",
      self.timestamp, self.category, self.subject, self.message
    )
  }
}

/// Wall-clock `HH:MM:SS` at the fixed UTC+1 offset used by the log formats.
fn timestamp() -> String {
  (Utc::now() + TimeDelta::hours(1)).format("%H:%M:%S").to_string()
}

/// File-backed audit log.
///
/// Writes either the plain format `[HH:MM:SS] [category] [subject]: message`
/// or, in CSV mode, `timestamp;category;subject;message` rows under a header
/// line. Optionally mirrors every entry to stdout.
pub struct AuditLog {
  path: PathBuf,
  file: Mutex<File>,
  print_log: bool,
  csv: bool,
}

impl AuditLog {
  /// Create `<stem>-N.log` in the current directory, picking the first free
  /// index N starting at 1, and write the CSV header if CSV mode is on.
  pub fn create(stem: &str, print_log: bool, csv: bool) -> Result<Self> {
    Self::create_in(Path::new("."), stem, print_log, csv)
  }

  /// Like [`AuditLog::create`], rooted at `dir`.
  pub fn create_in(dir: &Path, stem: &str, print_log: bool, csv: bool) -> Result<Self> {
    let mut index = 1u32;
    let (mut file, path) = loop {
      let path = dir.join(format!("{}-{}.log", stem, index));
      match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(file) => break (file, path),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => index += 1,
        Err(e) => return Err(e.into()),
      }
    };
    if csv {
      writeln!(file, "timestamp;category;subject;message")?;
    }
    tracing::info!("audit log created at {}", path.display());
    Ok(Self {
      path,
      file: Mutex::new(file),
      print_log,
      csv,
    })
  }

  /// Path of the created log file.
  pub fn path(&self) -> &Path {
    &self.path
  }

  fn format(&self, event: &LogEvent) -> String {
    if self.csv {
      format!(
        "{};{};{};{}",
        event.timestamp, event.category, event.subject, event.message
      )
    } else {
      event.to_string()
    }
  }
}

impl AuditSink for AuditLog {
  fn log(&self, category: &str, subject: &str, message: &str) {
    let event = LogEvent {
      timestamp: timestamp(),
      category: category.to_string(),
      subject: subject.to_string(),
      message: message.to_string(),
    };
    let text = self.format(&event);
    match self.file.lock() {
      Ok(mut file) => {
        if let Err(e) = writeln!(file, "{}", text) {
          tracing::warn!("audit write failed: {}", e);
        }
      }
      Err(e) => tracing::warn!("audit log poisoned: {}", e),
    }
    if self.print_log {
      println!("{}", text);
    }
  }
}

/// In-memory audit sink collecting structured [`LogEvent`]s.
#[derive(Default)]
pub struct MemoryAudit {
  events: Mutex<Vec<LogEvent>>,
}

impl MemoryAudit {
  /// Create an empty sink.
  pub fn new() -> Self {
    Self::default()
  }

  /// Snapshot of all recorded events, in append order.
  pub fn events(&self) -> Vec<LogEvent> {
    self.events.lock().map(|e| e.clone()).unwrap_or_default()
  }

  /// Events whose subject matches `subject`, in append order.
  pub fn with_subject(&self, subject: &str) -> Vec<LogEvent> {
    self
      .events()
      .into_iter()
      .filter(|e| e.subject == subject)
      .collect()
  }
}

impl AuditSink for MemoryAudit {
  fn log(&self, category: &str, subject: &str, message: &str) {
    if let Ok(mut events) = self.events.lock() {
      events.push(LogEvent {
        timestamp: timestamp(),
        category: category.to_string(),
        subject: subject.to_string(),
        message: message.to_string(),
      });
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("faultline-audit-{}", tag));
    std::fs::remove_dir_all(&dir).ok();
    std::fs::create_dir_all(&dir).unwrap();
    dir
  }

  #[test]
  fn plain_format_matches_original() {
    let event = LogEvent {
      timestamp: "12:30:01".into(),
      category: "Test_Drop".into(),
      subject: "-> Server".into(),
      message: "MOVE|3|4".into(),
    };
    assert_eq!(event.to_string(), "[12:30:01] [Test_Drop] [-> Server]: MOVE|3|4");
  }

  #[test]
  fn creates_indexed_log_files() {
    let dir = temp_dir("index");
    let first = AuditLog::create_in(&dir, "game", false, false).unwrap();
    let second = AuditLog::create_in(&dir, "game", false, false).unwrap();
    assert!(first.path().ends_with("game-1.log"));
    assert!(second.path().ends_with("game-2.log"));
    std::fs::remove_dir_all(&dir).ok();
  }

  #[test]
  fn csv_mode_writes_header_and_rows() {
    let dir = temp_dir("csv");
    let log = AuditLog::create_in(&dir, "game", false, true).unwrap();
    log.log("Test_Relay", "General", "Started.");
    let contents = std::fs::read_to_string(log.path()).unwrap();
    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some("timestamp;category;subject;message"));
    let row = lines.next().unwrap();
    let fields: Vec<&str> = row.split(';').collect();
    assert_eq!(fields[1], "Test_Relay");
    assert_eq!(fields[2], "General");
    assert_eq!(fields[3], "Started.");
    std::fs::remove_dir_all(&dir).ok();
  }

  #[test]
  fn plain_mode_writes_bracketed_lines() {
    let dir = temp_dir("plain");
    let log = AuditLog::create_in(&dir, "game", false, false).unwrap();
    log.log("Test_Relay", "Client ->", "PING");
    let contents = std::fs::read_to_string(log.path()).unwrap();
    let line = contents.lines().next().unwrap();
    assert!(line.contains("[Test_Relay] [Client ->]: PING"), "line: {}", line);
    std::fs::remove_dir_all(&dir).ok();
  }

  #[test]
  fn memory_sink_collects_in_order() {
    let sink = MemoryAudit::new();
    sink.log("Test_Relay", "Client ->", "one");
    sink.log("Test_Relay", "-> Server", "two");
    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].message, "one");
    assert_eq!(events[1].subject, "-> Server");
    assert_eq!(sink.with_subject("-> Server").len(), 1);
  }

  #[test]
  fn timestamp_is_clock_shaped() {
    let ts = timestamp();
    assert_eq!(ts.len(), 8);
    assert_eq!(ts.as_bytes()[2], b':');
    assert_eq!(ts.as_bytes()[5], b':');
  }
}
