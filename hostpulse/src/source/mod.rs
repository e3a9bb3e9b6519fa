//! Raw host readings. One implementation per platform, selected at build time,
//! plus a scripted source for tests and demos.

mod disks;
mod generic;
#[cfg(target_os = "linux")]
mod linux;
mod scripted;

pub use generic::SysinfoSource;
#[cfg(target_os = "linux")]
pub use linux::LinuxSource;
pub use scripted::{Reading, ScriptedSource};

use crate::error::Result;
use crate::types::{CpuCounters, DiskVolume, MemorySnapshot, NetworkCounters, ProcessRecord};

/// One instantaneous reading of host state per call.
///
/// Implementations may keep counter caches the platform API needs between
/// calls, but must never mutate host state. Every method may fail on its own;
/// the engine degrades the affected field and keeps going.
pub trait SampleSource: Send + 'static {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    /// Cumulative user/nice/system/idle ticks since boot.
    ///
    /// Fails instead of returning a zero sentinel when the counters can't be
    /// read; the engine then reports the last computed usage for that cycle.
    fn read_cpu_counters(&mut self) -> Result<CpuCounters>;

    fn read_memory(&mut self) -> Result<MemorySnapshot>;

    /// Mounted, writable, non-virtual volumes with nonzero capacity.
    fn read_disk_volumes(&mut self) -> Result<Vec<DiskVolume>>;

    /// Byte totals over operational, non-loopback interfaces.
    fn read_network_counters(&mut self) -> Result<NetworkCounters>;

    /// Full process inventory in discovery order.
    fn read_processes(&mut self) -> Result<Vec<ProcessRecord>>;

    /// Whether `read_processes` fills in `cpu_percent`.
    fn supports_process_cpu(&self) -> bool {
        false
    }
}

/// The source for the platform this crate was built for.
pub fn platform_source() -> Box<dyn SampleSource> {
    #[cfg(target_os = "linux")]
    {
        Box::new(LinuxSource::new())
    }
    #[cfg(not(target_os = "linux"))]
    {
        Box::new(SysinfoSource::new())
    }
}

impl SampleSource for Box<dyn SampleSource> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn read_cpu_counters(&mut self) -> Result<CpuCounters> {
        (**self).read_cpu_counters()
    }

    fn read_memory(&mut self) -> Result<MemorySnapshot> {
        (**self).read_memory()
    }

    fn read_disk_volumes(&mut self) -> Result<Vec<DiskVolume>> {
        (**self).read_disk_volumes()
    }

    fn read_network_counters(&mut self) -> Result<NetworkCounters> {
        (**self).read_network_counters()
    }

    fn read_processes(&mut self) -> Result<Vec<ProcessRecord>> {
        (**self).read_processes()
    }

    fn supports_process_cpu(&self) -> bool {
        (**self).supports_process_cpu()
    }
}
