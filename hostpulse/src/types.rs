//! Data types produced by the sampler and published to subscribers.
//! Raw readings come from a `SampleSource`; derived values come from the rate tracker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cumulative CPU time since boot, in platform units (jiffies on Linux).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuCounters {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
}

impl CpuCounters {
    pub fn new(user: u64, nice: u64, system: u64, idle: u64) -> Self {
        Self {
            user,
            nice,
            system,
            idle,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub total_physical: u64,
    pub available_physical: u64,
    pub used_physical: u64,
    // swap on Linux, page file elsewhere
    pub total_virtual: u64,
    pub available_virtual: u64,
    pub usage_percent: f64,
}

impl MemorySnapshot {
    /// Builds a snapshot from totals; `used` and the percentage are derived.
    pub fn new(
        total_physical: u64,
        available_physical: u64,
        total_virtual: u64,
        available_virtual: u64,
    ) -> Self {
        let used_physical = total_physical.saturating_sub(available_physical);
        Self {
            total_physical,
            available_physical,
            used_physical,
            total_virtual,
            available_virtual,
            usage_percent: percent_of(used_physical, total_physical),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskVolume {
    pub name: String,
    pub mount_point: String,
    pub file_system: String,
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub usage_percent: f64,
}

impl DiskVolume {
    pub fn new(
        name: impl Into<String>,
        mount_point: impl Into<String>,
        file_system: impl Into<String>,
        total: u64,
        available: u64,
    ) -> Self {
        let used = total.saturating_sub(available);
        Self {
            name: name.into(),
            mount_point: mount_point.into(),
            file_system: file_system.into(),
            total,
            used,
            available,
            usage_percent: percent_of(used, total),
        }
    }
}

/// Byte totals summed over operational, non-loopback interfaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCounters {
    // first interface seen with nonzero rx; display metadata only
    pub interface: Option<String>,
    pub received: u64,
    pub transmitted: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkRate {
    pub download_kbps: f64,
    pub upload_kbps: f64,
}

/// What the engine publishes for the network: raw counters, derived rate and
/// the bytes moved since monitoring started.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub interface: Option<String>,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub download_kbps: f64,
    pub upload_kbps: f64,
    pub session_received: u64,
    pub session_sent: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    pub mem_bytes: u64,
    // None where the source cannot attribute CPU time per process
    pub cpu_percent: Option<f32>,
    pub status: String,
}

impl ProcessRecord {
    pub fn new(pid: u32, name: impl Into<String>, mem_bytes: u64) -> Self {
        Self {
            pid,
            name: name.into(),
            mem_bytes,
            cpu_percent: None,
            status: String::from("Running"),
        }
    }
}

/// Everything one sampling cycle produced. Never mutated after publication.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub hostname: String,
    pub cpu_usage: f64,
    pub memory: MemorySnapshot,
    pub disks: Vec<DiskVolume>,
    pub network: NetworkStats,
    pub process_count: usize,
    pub top_processes: Vec<ProcessRecord>,
}

fn percent_of(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}
