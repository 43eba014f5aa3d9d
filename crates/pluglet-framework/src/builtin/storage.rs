//! Built-in log storages.

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use pluglet_macros::ControlSchema;
use serde::Deserialize;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use pluglet_core::{BoxError, Lifecycle};

use crate::domain::log::LogRecord;
use crate::domain::storage::Storage;

// ============================================================================
// File storage
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollingPolicy {
    /// One file per hour of record time.
    Hourly,
    /// One file per day of record time.
    Daily,
    /// One live file, archived when it would exceed the size limit.
    Size,
}

/// Appends records as JSON lines to rolling files under a directory.
#[derive(Debug, Deserialize, ControlSchema)]
pub struct FileStorage {
    #[control(kind = "text", label = "Directory", required)]
    path: PathBuf,

    #[control(
        kind = "text",
        label = "File prefix",
        default = "pluglet",
        pattern = "[A-Za-z0-9_.-]+"
    )]
    prefix: String,

    #[control(
        kind = "select",
        label = "Rolling policy",
        default = "daily",
        values("hourly", "daily", "size")
    )]
    rolling: RollingPolicy,

    #[control(
        kind = "number",
        label = "Max file size",
        comment = "In MiB, for the size policy",
        default = "10",
        min = 1,
        max = 1024
    )]
    max_size: u64,

    #[serde(skip)]
    write_lock: tokio::sync::Mutex<()>,
}

impl FileStorage {
    fn target(&self, at: DateTime<Utc>) -> PathBuf {
        let name = match self.rolling {
            RollingPolicy::Hourly => format!("{}.{}.log", self.prefix, at.format("%Y-%m-%d-%H")),
            RollingPolicy::Daily => format!("{}.{}.log", self.prefix, at.format("%Y-%m-%d")),
            RollingPolicy::Size => format!("{}.log", self.prefix),
        };
        self.path.join(name)
    }

    fn limit(&self) -> u64 {
        self.max_size.saturating_mul(1024 * 1024)
    }

    async fn roll_if_needed(&self, target: &Path, incoming: u64) -> Result<(), BoxError> {
        let current = match fs::metadata(target).await {
            Ok(meta) => meta.len(),
            Err(_) => return Ok(()),
        };
        if current == 0 || current + incoming <= self.limit() {
            return Ok(());
        }
        let archive = self.path.join(format!(
            "{}.{}.log",
            self.prefix,
            Utc::now().format("%Y%m%d%H%M%S%3f")
        ));
        fs::rename(target, &archive).await?;
        info!(archive = %archive.display(), size = current, "Rolled log file");
        Ok(())
    }
}

impl Lifecycle for FileStorage {}

#[async_trait]
impl Storage for FileStorage {
    async fn store(&self, records: &[LogRecord]) -> Result<(), BoxError> {
        if records.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;
        fs::create_dir_all(&self.path).await?;

        let mut batches: BTreeMap<PathBuf, String> = BTreeMap::new();
        for record in records {
            let buf = batches.entry(self.target(record.timestamp)).or_default();
            buf.push_str(&serde_json::to_string(record)?);
            buf.push('\n');
        }

        for (target, buf) in batches {
            if self.rolling == RollingPolicy::Size {
                self.roll_if_needed(&target, buf.len() as u64).await?;
            }
            let mut file = OpenOptions::new().create(true).append(true).open(&target).await?;
            file.write_all(buf.as_bytes()).await?;
            file.flush().await?;
            debug!(file = %target.display(), bytes = buf.len(), "Appended log records");
        }
        Ok(())
    }
}

// ============================================================================
// Memory storage
// ============================================================================

/// Keeps the most recent records in memory.
#[derive(Debug, Deserialize, ControlSchema)]
pub struct MemoryStorage {
    #[control(kind = "number", label = "Capacity", default = "1000", min = 1, max = 100000)]
    capacity: usize,

    #[serde(skip)]
    records: Mutex<VecDeque<LogRecord>>,
}

impl MemoryStorage {
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().iter().cloned().collect()
    }
}

impl Lifecycle for MemoryStorage {
    fn destroy(&self) {
        self.records.lock().clear();
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn store(&self, records: &[LogRecord]) -> Result<(), BoxError> {
        let mut buffer = self.records.lock();
        for record in records {
            if buffer.len() == self.capacity {
                buffer.pop_front();
            }
            buffer.push_back(record.clone());
        }
        Ok(())
    }
}
