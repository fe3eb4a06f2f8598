// ============================================================================
// src/util/audit.rs – Append-only audit trail of scoring decisions
// ============================================================================

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::warn;

use crate::util::deadline::lock_within;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Block,
}

/// One scoring decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub decision: Decision,
    pub score: u8,
    pub subject_template: String,
}

impl AuditRecord {
    pub fn new(decision: Decision, score: u8, subject_template: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            decision,
            score,
            subject_template: subject_template.into(),
        }
    }
}

/// Destination for audit records. Implementations must only ever append.
pub trait AuditSink: Send + Sync {
    fn append(&self, record: &AuditRecord) -> Result<()>;
}

#[derive(Debug)]
struct AuditFile {
    path: PathBuf,
    write_lock: Mutex<()>,
    timeout: Duration,
}

impl AuditFile {
    fn write(&self, record: &AuditRecord) -> Result<()> {
        // JSON escaping keeps attacker-supplied newlines from forging entries.
        let mut line = serde_json::to_string(record).context("serialize audit record")?;
        line.push('\n');

        let _guard = lock_within(&self.write_lock, self.timeout).context("audit writer busy")?;
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("create audit dir {}", dir.display()))?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .mode(0o600)
            .open(&self.path)
            .with_context(|| format!("open audit log {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("append audit log {}", self.path.display()))?;
        Ok(())
    }
}

/// Appends one JSON object per line to a 0600 file.
///
/// Block records are written before `append` returns. Allow records are
/// queued to a writer thread so a slow disk never delays a decision; the
/// queue is drained when the sink is dropped.
#[derive(Debug)]
pub struct FileAuditSink {
    file: Arc<AuditFile>,
    queue: Mutex<Option<Sender<AuditRecord>>>,
    writer: Option<JoinHandle<()>>,
}

impl FileAuditSink {
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Result<Self> {
        let file = Arc::new(AuditFile {
            path: path.into(),
            write_lock: Mutex::new(()),
            timeout,
        });
        let (tx, rx) = mpsc::channel::<AuditRecord>();
        let background = Arc::clone(&file);
        let writer = thread::Builder::new()
            .name("sqlock-audit".into())
            .spawn(move || {
                for record in rx {
                    if let Err(e) = background.write(&record) {
                        warn!(error = %format!("{e:#}"), "queued audit record dropped");
                    }
                }
            })
            .context("spawn audit writer")?;

        Ok(Self {
            file,
            queue: Mutex::new(Some(tx)),
            writer: Some(writer),
        })
    }
}

impl AuditSink for FileAuditSink {
    fn append(&self, record: &AuditRecord) -> Result<()> {
        if record.decision == Decision::Block {
            return self.file.write(record);
        }
        let queue = lock_within(&self.queue, self.file.timeout).context("audit queue busy")?;
        match queue.as_ref() {
            Some(tx) => tx
                .send(record.clone())
                .map_err(|_| anyhow!("audit writer has stopped")),
            None => Err(anyhow!("audit sink is shutting down")),
        }
    }
}

impl Drop for FileAuditSink {
    fn drop(&mut self) {
        if let Ok(queue) = self.queue.get_mut() {
            queue.take();
        }
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                warn!("audit writer panicked; queued records lost");
            }
        }
    }
}

/// Keeps records in memory; used by tests and embedders that ship records
/// elsewhere themselves.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn append(&self, record: &AuditRecord) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| anyhow::anyhow!("audit buffer lock poisoned"))?
            .push(record.clone());
        Ok(())
    }
}

/// Discards everything. Selected when auditing is disabled in config.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn append(&self, _record: &AuditRecord) -> Result<()> {
        Ok(())
    }
}
