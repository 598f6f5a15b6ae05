// sink.rs — Append-only JSONL audit sink.
//
// The audit log is a JSONL (JSON Lines) file: one JSON object per line,
// appended and never rewritten. Rotation is done externally by the hosting
// process.
//
// Writes are serialized behind a single Mutex so concurrent decisions never
// interleave partial lines. The file is opened lazily and re-opened after a
// failure, so a sink can recover once the directory becomes writable again.
//
// `record()` is the request-path entry point: it never fails. Failures are
// counted in AuditStats instead, which the health checker reports on.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AuditError;
use crate::record::AuditRecord;

/// File name of the audit log inside the audit directory.
pub const AUDIT_FILE_NAME: &str = "nha-audit.jsonl";

/// Write-health counters for the sink.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct AuditStats {
    pub written: u64,
    pub failed: u64,
    pub last_write_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl AuditStats {
    /// True when at least one write was lost since the sink was created.
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

struct SinkState {
    writer: Option<BufWriter<File>>,
    stats: AuditStats,
}

/// An append-only audit sink backed by a JSONL file.
pub struct AuditSink {
    path: PathBuf,
    state: Mutex<SinkState>,
}

impl AuditSink {
    /// Create a sink writing to `<dir>/nha-audit.jsonl`.
    ///
    /// Nothing is opened yet; the first append creates the directory and file.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::at_path(dir.as_ref().join(AUDIT_FILE_NAME))
    }

    /// Create a sink writing to an explicit file path.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(SinkState {
                writer: None,
                stats: AuditStats::default(),
            }),
        }
    }

    /// Return the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record, returning any I/O or serialization error.
    pub fn append(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let json = serde_json::to_string(record)?;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let result = Self::write_line(&self.path, &mut state.writer, &json);
        match &result {
            Ok(()) => {
                state.stats.written += 1;
                state.stats.last_write_at = Some(Utc::now());
            }
            Err(e) => {
                // Drop the handle so the next append re-opens the file.
                state.writer = None;
                state.stats.failed += 1;
                state.stats.last_failure_at = Some(Utc::now());
                state.stats.last_error = Some(e.to_string());
            }
        }
        result
    }

    /// Best-effort append for the request path. Never fails; returns whether
    /// the record was written.
    pub fn record(&self, record: &AuditRecord) -> bool {
        match self.append(record) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    trace_id = %record.trace_id,
                    error = %e,
                    "audit write failed; decision still returned"
                );
                false
            }
        }
    }

    /// Snapshot of the write-health counters.
    pub fn stats(&self) -> AuditStats {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stats
            .clone()
    }

    fn write_line(
        path: &Path,
        writer: &mut Option<BufWriter<File>>,
        json: &str,
    ) -> Result<(), AuditError> {
        if writer.is_none() {
            *writer = Some(BufWriter::new(Self::open(path)?));
        }
        if let Some(w) = writer.as_mut() {
            writeln!(w, "{}", json)?;
            // Flush so the line reaches the OS before the decision returns.
            w.flush()?;
        }
        Ok(())
    }

    fn open(path: &Path) -> Result<File, AuditError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| AuditError::OpenFailed {
                path: path.to_path_buf(),
                source,
            })?;
        }
        // Append mode: existing lines are never overwritten.
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| AuditError::OpenFailed {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Read all records from a log file, oldest first. Skips blank lines.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<AuditRecord>, AuditError> {
        let file = File::open(path.as_ref()).map_err(|source| AuditError::OpenFailed {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }

        Ok(records)
    }
}

impl std::fmt::Debug for AuditSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditSink")
            .field("path", &self.path)
            .field("stats", &self.stats())
            .finish()
    }
}
