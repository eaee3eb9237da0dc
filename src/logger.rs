//! Release audit logger.
//!
//! Every decision the pipeline makes lands here: entries are level-filtered,
//! tagged with the current release stage, kept in memory for export, and
//! appended to a rotating (optionally gzip-compressed) backing file.

use crate::config::LoggingConfig;
use crate::error::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Instant, SystemTime};

/// Log severity, filtered per entry before any formatting or I/O
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    /// Parse a level name from configuration; unknown names default to info
    pub fn parse(level: &str) -> Self {
        match level.to_lowercase().as_str() {
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            "fatal" => LogLevel::Fatal,
            _ => LogLevel::Info,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        };
        f.write_str(s)
    }
}

/// Named phase of the release state machine, tagged on every entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Analysis,
    VersionDecision,
    Build,
    Test,
    Deploy,
    Rollback,
    Complete,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Analysis => "ANALYSIS",
            Stage::VersionDecision => "VERSION_DECISION",
            Stage::Build => "BUILD",
            Stage::Test => "TEST",
            Stage::Deploy => "DEPLOY",
            Stage::Rollback => "ROLLBACK",
            Stage::Complete => "COMPLETE",
        };
        f.write_str(s)
    }
}

/// One audit record; the sequence of these is append-only
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub stage: Stage,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub release_id: String,
    pub elapsed_ms: u64,
}

/// Exported audit document covering the whole run
#[derive(Debug, Serialize)]
pub struct LogExport {
    pub release_id: String,
    pub start_time: DateTime<Utc>,
    pub total_duration_ms: u64,
    pub entries: Vec<LogEntry>,
}

struct LoggerInner {
    file: Option<File>,
    stage: Stage,
    entries: Vec<LogEntry>,
}

/// Level-filtered, stage-tagged, rotating audit log.
///
/// The logger exclusively owns its backing file handle for the run; all
/// writers serialize through one mutex covering both the in-memory append
/// and the file write/rotate sequence, so concurrent build/test tasks can
/// share it by reference.
pub struct ReleaseLogger {
    config: LoggingConfig,
    min_level: LogLevel,
    release_id: String,
    start_time: DateTime<Utc>,
    started: Instant,
    inner: Mutex<LoggerInner>,
}

impl ReleaseLogger {
    /// Create a logger; opens the backing file when an output path is set
    pub fn new(config: LoggingConfig, release_id: impl Into<String>) -> Result<Self> {
        let file = if config.output_path.is_empty() {
            None
        } else {
            Some(open_log_file(Path::new(&config.output_path))?)
        };

        Ok(ReleaseLogger {
            min_level: LogLevel::parse(&config.level),
            config,
            release_id: release_id.into(),
            start_time: Utc::now(),
            started: Instant::now(),
            inner: Mutex::new(LoggerInner {
                file,
                stage: Stage::Analysis,
                entries: Vec::new(),
            }),
        })
    }

    pub fn release_id(&self) -> &str {
        &self.release_id
    }

    /// Tag subsequent entries with the given stage
    pub fn set_stage(&self, stage: Stage) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.stage = stage;
    }

    pub fn debug(&self, message: &str, details: Option<Value>) {
        self.log(LogLevel::Debug, message, details, None);
    }

    pub fn info(&self, message: &str, details: Option<Value>) {
        self.log(LogLevel::Info, message, details, None);
    }

    pub fn warn(&self, message: &str, details: Option<Value>) {
        self.log(LogLevel::Warn, message, details, None);
    }

    pub fn error(&self, message: &str, error: Option<&str>, details: Option<Value>) {
        self.log(LogLevel::Error, message, details, error);
    }

    pub fn fatal(&self, message: &str, error: Option<&str>, details: Option<Value>) {
        self.log(LogLevel::Fatal, message, details, error);
    }

    fn log(&self, level: LogLevel, message: &str, details: Option<Value>, error: Option<&str>) {
        // Sub-threshold entries are dropped before formatting or I/O
        if level < self.min_level {
            return;
        }

        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            stage: inner.stage,
            message: message.to_string(),
            details,
            error: error.map(|e| e.to_string()),
            release_id: self.release_id.clone(),
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        };

        let line = format_entry(&entry);
        inner.entries.push(entry);
        self.write_line(&mut inner, &line);
    }

    fn write_line(&self, inner: &mut LoggerInner, line: &str) {
        // A rotation error loses that rotation, not the entry: the handle is
        // reopened inside rotate_if_needed and the write still lands
        let _ = self.rotate_if_needed(inner, line.len() + 1);
        if let Some(file) = inner.file.as_mut() {
            let _ = writeln!(file, "{}", line);
        }
    }

    /// Rotate the backing file when the next write would exceed the size cap
    fn rotate_if_needed(&self, inner: &mut LoggerInner, next_write: usize) -> io::Result<()> {
        let max_bytes = self.config.max_size_mb.saturating_mul(1024 * 1024);
        if max_bytes == 0 {
            return Ok(());
        }
        let current = match inner.file.as_ref() {
            Some(file) => file.metadata()?.len(),
            None => return Ok(()),
        };
        if current + next_write as u64 <= max_bytes {
            return Ok(());
        }

        // Close before renaming so the handle never points at an archive
        inner.file = None;

        let path = Path::new(&self.config.output_path);
        let outcome = self.rotate(path);

        // Reopen whatever happened above; file logging continues either way
        match open_log_file(path) {
            Ok(file) => {
                inner.file = Some(file);
                outcome
            }
            Err(e) => outcome.and(Err(e)),
        }
    }

    fn rotate(&self, path: &Path) -> io::Result<()> {
        let rotated = PathBuf::from(format!(
            "{}.{}",
            self.config.output_path,
            Utc::now().format("%Y%m%d-%H%M%S%3f")
        ));
        fs::rename(path, &rotated)?;
        if self.config.compress {
            compress_file(&rotated)?;
        }
        self.cleanup_archives()
    }

    /// Drop archives past the age cap, then trim beyond the backup cap
    fn cleanup_archives(&self) -> io::Result<()> {
        let path = Path::new(&self.config.output_path);
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let base = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => format!("{}.", name),
            None => return Ok(()),
        };

        let mut archives: Vec<(PathBuf, SystemTime)> = Vec::new();
        let cutoff = SystemTime::from(
            Utc::now() - ChronoDuration::days(i64::from(self.config.max_age_days)),
        );

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with(&base) {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            if self.config.max_age_days > 0 && modified < cutoff {
                let _ = fs::remove_file(entry.path());
                continue;
            }
            archives.push((entry.path(), modified));
        }

        archives.sort_by(|a, b| b.1.cmp(&a.1));
        if self.config.max_backups > 0 && archives.len() > self.config.max_backups as usize {
            for (old, _) in archives.split_off(self.config.max_backups as usize) {
                let _ = fs::remove_file(old);
            }
        }
        Ok(())
    }

    /// Snapshot of every retained entry, in append order
    pub fn entries(&self) -> Vec<LogEntry> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.clone()
    }

    /// Export the full run as one JSON document
    pub fn export_json(&self) -> Result<String> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let export = LogExport {
            release_id: self.release_id.clone(),
            start_time: self.start_time,
            total_duration_ms: self.started.elapsed().as_millis() as u64,
            entries: inner.entries.clone(),
        };
        Ok(serde_json::to_string_pretty(&export)?)
    }
}

fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    OpenOptions::new().append(true).create(true).open(path)
}

fn format_entry(entry: &LogEntry) -> String {
    let mut line = format!(
        "[{}] [{}] [{}] [Release:{}] {}",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
        entry.level,
        entry.stage,
        entry.release_id,
        entry.message,
    );
    if let Some(error) = &entry.error {
        line.push_str(&format!(" | Error: {}", error));
    }
    line.push_str(&format!(" | Duration: {}ms", entry.elapsed_ms));
    if let Some(details) = &entry.details {
        line.push_str(&format!(" | Details: {}", details));
    }
    line
}

fn compress_file(path: &Path) -> io::Result<()> {
    let mut input = File::open(path)?;
    let output = File::create(path.with_extension(
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}.gz", ext),
            None => "gz".to_string(),
        },
    ))?;
    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?;
    fs::remove_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memory_config(level: &str) -> LoggingConfig {
        LoggingConfig {
            level: level.to_string(),
            output_path: String::new(),
            max_size_mb: 0,
            max_backups: 0,
            max_age_days: 0,
            compress: false,
        }
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(LogLevel::parse("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::parse("WARN"), LogLevel::Warn);
        assert_eq!(LogLevel::parse("warning"), LogLevel::Warn);
        assert_eq!(LogLevel::parse("nonsense"), LogLevel::Info);
    }

    #[test]
    fn test_level_filter_drops_sub_threshold() {
        let logger = ReleaseLogger::new(memory_config("warn"), "release-1").unwrap();
        logger.debug("dropped", None);
        logger.info("dropped", None);
        logger.warn("kept", None);
        logger.error("kept", Some("boom"), None);

        let entries = logger.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.level >= LogLevel::Warn));
    }

    #[test]
    fn test_entries_carry_stage_and_release_id() {
        let logger = ReleaseLogger::new(memory_config("info"), "release-7").unwrap();
        logger.set_stage(Stage::Build);
        logger.info("building", Some(json!({ "platforms": 2 })));

        let entries = logger.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].stage, Stage::Build);
        assert_eq!(entries[0].release_id, "release-7");
        assert_eq!(entries[0].details, Some(json!({ "platforms": 2 })));
    }

    #[test]
    fn test_format_entry_line_shape() {
        let entry = LogEntry {
            timestamp: Utc::now(),
            level: LogLevel::Error,
            stage: Stage::Deploy,
            message: "deploy failed".to_string(),
            details: Some(json!({ "environment": "staging" })),
            error: Some("health check failed".to_string()),
            release_id: "release-9".to_string(),
            elapsed_ms: 1234,
        };
        let line = format_entry(&entry);
        assert!(line.contains("[ERROR]"));
        assert!(line.contains("[DEPLOY]"));
        assert!(line.contains("[Release:release-9]"));
        assert!(line.contains("| Error: health check failed"));
        assert!(line.contains("| Duration: 1234ms"));
        assert!(line.contains(r#"| Details: {"environment":"staging"}"#));
    }

    #[test]
    fn test_export_document_shape() {
        let logger = ReleaseLogger::new(memory_config("info"), "release-3").unwrap();
        logger.info("one", None);
        logger.warn("two", None);

        let doc: Value = serde_json::from_str(&logger.export_json().unwrap()).unwrap();
        assert_eq!(doc["release_id"], "release-3");
        assert!(doc["start_time"].is_string());
        assert!(doc["total_duration_ms"].is_u64());
        assert_eq!(doc["entries"].as_array().unwrap().len(), 2);
    }
}
