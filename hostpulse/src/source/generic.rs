//! Portable source built on sysinfo.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use sysinfo::{Networks, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::warn;

use super::{disks, SampleSource};
use crate::error::{Result, SampleError};
use crate::types::{CpuCounters, DiskVolume, MemorySnapshot, NetworkCounters, ProcessRecord};

/// sysinfo reports CPU usage as a percentage rather than tick counters, so this
/// source integrates that percentage over wall time into synthetic cumulative
/// busy/idle milliseconds. Differencing two readings gives back the usage over
/// the interval between them.
pub struct SysinfoSource {
    sys: System,
    networks: Networks,
    cpu_clock: Option<Instant>,
    busy_ms: f64,
    idle_ms: f64,
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoSource {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        Self {
            sys,
            networks: Networks::new_with_refreshed_list(),
            cpu_clock: None,
            busy_ms: 0.0,
            idle_ms: 0.0,
        }
    }
}

// sysinfo has been known to panic on odd platform data; keep it contained.
fn guarded<T>(what: &'static str, f: impl FnOnce() -> T) -> Result<T> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|e| {
        warn!("sysinfo {what} refresh panicked: {e:?}");
        SampleError::Panicked { what }
    })
}

// sysinfo has no link-state API. An interface without a hardware address
// (tunnels, bridges without ports, down virtual links) is the closest
// stand-in for "not operational", so this is best-effort only.
fn has_hardware_address(data: &sysinfo::NetworkData) -> bool {
    !data.mac_address().is_unspecified()
}

fn is_loopback(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower == "lo" || lower.starts_with("lo0") || lower.contains("loopback")
}

impl SampleSource for SysinfoSource {
    fn name(&self) -> &'static str {
        "sysinfo"
    }

    fn read_cpu_counters(&mut self) -> Result<CpuCounters> {
        let sys = &mut self.sys;
        let usage = guarded("cpu", || {
            sys.refresh_cpu_usage();
            sys.global_cpu_usage()
        })?;
        let usage = f64::from(usage).clamp(0.0, 100.0);
        let now = Instant::now();
        if let Some(prev) = self.cpu_clock {
            let dt_ms = now.duration_since(prev).as_secs_f64() * 1000.0;
            self.busy_ms += dt_ms * usage / 100.0;
            self.idle_ms += dt_ms * (100.0 - usage) / 100.0;
        }
        self.cpu_clock = Some(now);
        Ok(CpuCounters::new(
            self.busy_ms as u64,
            0,
            0,
            self.idle_ms as u64,
        ))
    }

    fn read_memory(&mut self) -> Result<MemorySnapshot> {
        let sys = &mut self.sys;
        guarded("memory", || sys.refresh_memory())?;
        Ok(MemorySnapshot::new(
            self.sys.total_memory(),
            self.sys.available_memory(),
            self.sys.total_swap(),
            self.sys.free_swap(),
        ))
    }

    fn read_disk_volumes(&mut self) -> Result<Vec<DiskVolume>> {
        guarded("disks", disks::read_volumes)
    }

    fn read_network_counters(&mut self) -> Result<NetworkCounters> {
        let nets = &mut self.networks;
        guarded("network", || nets.refresh(true))?;

        // Interface map order is arbitrary; sort so the representative name is stable.
        let mut ifaces: Vec<_> = self
            .networks
            .iter()
            .filter(|(name, data)| !is_loopback(name) && has_hardware_address(data))
            .map(|(name, data)| (name.clone(), data.total_received(), data.total_transmitted()))
            .collect();
        ifaces.sort_by(|a, b| a.0.cmp(&b.0));

        let mut out = NetworkCounters::default();
        for (name, rx, tx) in ifaces {
            out.received = out.received.saturating_add(rx);
            out.transmitted = out.transmitted.saturating_add(tx);
            if out.interface.is_none() && rx > 0 {
                out.interface = Some(name);
            }
        }
        Ok(out)
    }

    /// Processes ordered by pid. CPU% is normalized by logical core count so a
    /// process saturating every core reads 100.
    fn read_processes(&mut self) -> Result<Vec<ProcessRecord>> {
        let sys = &mut self.sys;
        guarded("processes", || {
            sys.refresh_processes_specifics(
                ProcessesToUpdate::All,
                true,
                ProcessRefreshKind::nothing().with_cpu().with_memory(),
            )
        })?;
        let cores = self.sys.cpus().len().max(1) as f32;
        let mut procs: Vec<ProcessRecord> = self
            .sys
            .processes()
            .values()
            .map(|p| ProcessRecord {
                pid: p.pid().as_u32(),
                name: p.name().to_string_lossy().into_owned(),
                mem_bytes: p.memory(),
                cpu_percent: Some((p.cpu_usage() / cores).clamp(0.0, 100.0)),
                status: p.status().to_string(),
            })
            .collect();
        procs.sort_by_key(|p| p.pid);
        Ok(procs)
    }

    fn supports_process_cpu(&self) -> bool {
        true
    }
}
