//! Telemetry Module
//!
//! Collects anonymous transfer statistics for performance monitoring:
//! operation counts, bytes moved, error totals, split per protocol.
//! No paths or credentials are recorded.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Instant;

use lazy_static::lazy_static;

use crate::models::errors::FsResult;

lazy_static! {
    /// Global collector the backends feed
    pub static ref STATS: StatsCollector = StatsCollector::new();
}

/// Live counters; cheap enough to update from every read/write
pub struct StatsCollector {
    started: Instant,
    opens: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    errors: AtomicU64,
    by_protocol: RwLock<HashMap<String, u64>>,
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsCollector {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            opens: AtomicU64::new(0),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            by_protocol: RwLock::new(HashMap::new()),
        }
    }

    /// Record a handle being opened on the given protocol
    pub fn record_open(&self, protocol: &str) {
        self.opens.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut map) = self.by_protocol.write() {
            *map.entry(protocol.to_string()).or_insert(0) += 1;
        }
    }

    pub fn record_read(&self, bytes: u64) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_write(&self, bytes: u64) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Current totals as a serializable snapshot
    pub fn snapshot(&self) -> TransferStats {
        let by_protocol = self
            .by_protocol
            .read()
            .map(|m| m.clone())
            .unwrap_or_default();
        TransferStats {
            uptime_secs: self.started.elapsed().as_secs(),
            opens: self.opens.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            opens_by_protocol: by_protocol,
        }
    }

    /// Human-readable one-block summary
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "📊 Transfer stats: {} opens, {} reads ({}), {} writes ({}), {} errors, uptime {}s",
            stats.opens,
            stats.reads,
            human_bytes(stats.bytes_read),
            stats.writes,
            human_bytes(stats.bytes_written),
            stats.errors,
            stats.uptime_secs,
        )
    }

    /// Export the snapshot as JSON to `dir/anyfs_stats.json`
    pub fn export_json(&self, dir: &Path) -> FsResult<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join("anyfs_stats.json");
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        file.write_all(json.as_bytes())?;
        Ok(path)
    }
}

/// Aggregated transfer statistics
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TransferStats {
    pub uptime_secs: u64,
    pub opens: u64,
    pub reads: u64,
    pub writes: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub errors: u64,
    pub opens_by_protocol: HashMap<String, u64>,
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = StatsCollector::new();
        stats.record_open("memory");
        stats.record_open("memory");
        stats.record_read(1024);
        stats.record_write(10);
        let snap = stats.snapshot();
        assert_eq!(snap.opens, 2);
        assert_eq!(snap.bytes_read, 1024);
        assert_eq!(snap.bytes_written, 10);
        assert_eq!(snap.opens_by_protocol.get("memory"), Some(&2));
    }

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(2048), "2.0 KiB");
        assert_eq!(human_bytes(5 * 1024 * 1024), "5.0 MiB");
    }

    #[test]
    fn test_export_json() {
        let stats = StatsCollector::new();
        stats.record_open("file");
        let dir = std::env::temp_dir().join(format!("anyfs-telemetry-{}", uuid::Uuid::new_v4()));
        let path = stats.export_json(&dir).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"opens\": 1"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
