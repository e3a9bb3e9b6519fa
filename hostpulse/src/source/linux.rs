//! Linux source reading procfs directly.
//!
//! CPU, memory, network and processes come from `/proc` (and
//! `/sys/class/net` for link state); volumes come from sysinfo. The filesystem
//! root is injectable so the parsers can be exercised against a fake tree.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::trace;

use super::{disks, SampleSource};
use crate::error::{Result, SampleError};
use crate::types::{CpuCounters, DiskVolume, MemorySnapshot, NetworkCounters, ProcessRecord};

// Per-pid jiffies from the previous process read, for per-process CPU%.
#[derive(Debug, Default)]
struct ProcCpu {
    last_total: u64,
    last_per_pid: HashMap<u32, u64>,
}

#[derive(Debug)]
pub struct LinuxSource {
    root: PathBuf,
    proc_cpu: ProcCpu,
}

impl Default for LinuxSource {
    fn default() -> Self {
        Self::new()
    }
}

impl LinuxSource {
    pub fn new() -> Self {
        Self::with_root("/")
    }

    /// Reads `<root>/proc/...` and `<root>/sys/...` instead of the real ones.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            proc_cpu: ProcCpu::default(),
        }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    fn read(&self, rel: &str, what: &'static str) -> Result<String> {
        fs::read_to_string(self.path(rel)).map_err(|e| SampleError::unavailable(what, e))
    }

    // Sum of the first eight /proc/stat cpu fields.
    fn read_total_jiffies(&self) -> io::Result<u64> {
        let s = fs::read_to_string(self.path("proc/stat"))?;
        if let Some(line) = s.lines().next() {
            let sum = line
                .split_whitespace()
                .skip(1)
                .take(8)
                .filter_map(|tok| tok.parse::<u64>().ok())
                .fold(0u64, |acc, v| acc.saturating_add(v));
            return Ok(sum);
        }
        Err(io::Error::other("no cpu line"))
    }

    fn read_proc_jiffies(&self, pid: u32) -> Option<u64> {
        let s = fs::read_to_string(self.path(&format!("proc/{pid}/stat"))).ok()?;
        parse_proc_jiffies(&s)
    }

    fn is_link_down(&self, iface: &str) -> bool {
        // Missing operstate (or "unknown", common for tun devices) counts as up.
        fs::read_to_string(self.path(&format!("sys/class/net/{iface}/operstate")))
            .map(|s| s.trim() == "down")
            .unwrap_or(false)
    }
}

impl SampleSource for LinuxSource {
    fn name(&self) -> &'static str {
        "procfs"
    }

    fn read_cpu_counters(&mut self) -> Result<CpuCounters> {
        let stat = self.read("proc/stat", "cpu counters")?;
        parse_cpu_line(&stat)
    }

    fn read_memory(&mut self) -> Result<MemorySnapshot> {
        let meminfo = self.read("proc/meminfo", "memory")?;
        parse_meminfo(&meminfo)
    }

    fn read_disk_volumes(&mut self) -> Result<Vec<DiskVolume>> {
        Ok(disks::read_volumes())
    }

    fn read_network_counters(&mut self) -> Result<NetworkCounters> {
        let dev = self.read("proc/net/dev", "network counters")?;
        let mut out = NetworkCounters::default();
        for (iface, rx, tx) in parse_net_dev(&dev)? {
            if iface == "lo" || self.is_link_down(&iface) {
                continue;
            }
            out.received = out.received.saturating_add(rx);
            out.transmitted = out.transmitted.saturating_add(tx);
            if out.interface.is_none() && rx > 0 {
                out.interface = Some(iface);
            }
        }
        Ok(out)
    }

    /// Processes in `/proc` directory order. CPU% is the share of all jiffies
    /// each pid consumed since the previous call; zero on the first call.
    fn read_processes(&mut self) -> Result<Vec<ProcessRecord>> {
        let entries = fs::read_dir(self.path("proc"))
            .map_err(|e| SampleError::unavailable("process list", e))?;

        let mut procs = Vec::new();
        let mut current: HashMap<u32, u64> = HashMap::new();
        for entry in entries.flatten() {
            let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            // Processes can exit between readdir and open; just skip them.
            let Ok(status) = fs::read_to_string(entry.path().join("status")) else {
                trace!(pid, "process vanished during scan");
                continue;
            };
            let Some(rec) = parse_status(pid, &status) else {
                continue;
            };
            if let Some(j) = self.read_proc_jiffies(pid) {
                current.insert(pid, j);
            }
            procs.push(rec);
        }

        let total_now = self.read_total_jiffies().unwrap_or(0);
        let last_total = std::mem::replace(&mut self.proc_cpu.last_total, total_now);
        let mut last_map = std::mem::replace(&mut self.proc_cpu.last_per_pid, current);

        // First run, or total went backwards: report zeros
        if last_total == 0 || total_now <= last_total {
            for p in &mut procs {
                p.cpu_percent = Some(0.0);
            }
            return Ok(procs);
        }

        let dt = total_now.saturating_sub(last_total).max(1) as f32;
        for p in &mut procs {
            let now = self
                .proc_cpu
                .last_per_pid
                .get(&p.pid)
                .copied()
                .unwrap_or(0);
            let prev = last_map.remove(&p.pid).unwrap_or(now);
            let du = now.saturating_sub(prev) as f32;
            p.cpu_percent = Some(((du / dt) * 100.0).clamp(0.0, 100.0));
        }
        Ok(procs)
    }

    fn supports_process_cpu(&self) -> bool {
        true
    }
}

/// First line of /proc/stat: "cpu  user nice system idle iowait irq softirq steal ..."
pub(crate) fn parse_cpu_line(stat: &str) -> Result<CpuCounters> {
    let line = stat
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| SampleError::invalid("cpu counters", "no aggregate cpu line"))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(4)
        .map(|tok| tok.parse::<u64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| SampleError::invalid("cpu counters", e.to_string()))?;
    if fields.len() < 4 {
        return Err(SampleError::invalid(
            "cpu counters",
            format!("expected 4 fields, got {}", fields.len()),
        ));
    }
    Ok(CpuCounters::new(fields[0], fields[1], fields[2], fields[3]))
}

pub(crate) fn parse_meminfo(meminfo: &str) -> Result<MemorySnapshot> {
    let mut kb: HashMap<&str, u64> = HashMap::new();
    for line in meminfo.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        if let Some(v) = rest.split_whitespace().next().and_then(|v| v.parse().ok()) {
            kb.insert(key.trim(), v);
        }
    }
    let bytes = |k: &str| kb.get(k).map(|v| v.saturating_mul(1024));
    let total = bytes("MemTotal")
        .ok_or_else(|| SampleError::invalid("memory", "MemTotal missing"))?;
    // MemAvailable needs kernel 3.14+
    let available = bytes("MemAvailable")
        .or_else(|| bytes("MemFree"))
        .unwrap_or(0);
    Ok(MemorySnapshot::new(
        total,
        available,
        bytes("SwapTotal").unwrap_or(0),
        bytes("SwapFree").unwrap_or(0),
    ))
}

/// (iface, rx_bytes, tx_bytes) for every row of /proc/net/dev.
pub(crate) fn parse_net_dev(dev: &str) -> Result<Vec<(String, u64, u64)>> {
    let mut rows = Vec::new();
    // two header lines
    for line in dev.lines().skip(2) {
        // large counters can butt up against the colon: "eth0:123456 ..."
        let Some((iface, rest)) = line.split_once(':') else {
            continue;
        };
        let cols: Vec<&str> = rest.split_whitespace().collect();
        if cols.len() < 9 {
            return Err(SampleError::invalid(
                "network counters",
                format!("short row for {}", iface.trim()),
            ));
        }
        let parse = |s: &str| {
            s.parse::<u64>()
                .map_err(|e| SampleError::invalid("network counters", e.to_string()))
        };
        rows.push((iface.trim().to_string(), parse(cols[0])?, parse(cols[8])?));
    }
    Ok(rows)
}

/// Name, state and resident set from /proc/<pid>/status. Kernel threads have
/// no VmRSS and report zero memory.
pub(crate) fn parse_status(pid: u32, status: &str) -> Option<ProcessRecord> {
    let mut name = None;
    let mut state = "Unknown";
    let mut rss_kb = 0u64;
    for line in status.lines() {
        if let Some(v) = line.strip_prefix("Name:") {
            name = Some(v.trim().to_string());
        } else if let Some(v) = line.strip_prefix("State:") {
            state = state_label(v.trim().chars().next().unwrap_or('?'));
        } else if let Some(v) = line.strip_prefix("VmRSS:") {
            rss_kb = v
                .split_whitespace()
                .next()
                .and_then(|n| n.parse().ok())
                .unwrap_or(0);
        }
    }
    let name = name.filter(|n| !n.is_empty())?;
    Some(ProcessRecord {
        status: state.to_string(),
        ..ProcessRecord::new(pid, name, rss_kb.saturating_mul(1024))
    })
}

fn state_label(code: char) -> &'static str {
    match code {
        'R' => "Running",
        'S' => "Sleeping",
        'D' => "Disk Sleep",
        'Z' => "Zombie",
        'T' => "Stopped",
        't' => "Tracing Stop",
        'I' => "Idle",
        'X' | 'x' => "Dead",
        'W' => "Paging",
        'P' => "Parked",
        _ => "Unknown",
    }
}

/// utime + stime from /proc/<pid>/stat.
pub(crate) fn parse_proc_jiffies(stat: &str) -> Option<u64> {
    // comm may contain spaces and parens; fields resume after the last ')'
    let rpar = stat.rfind(')')?;
    let after = stat.get(rpar + 2..)?;
    let mut it = after.split_whitespace();
    // utime (14th field) is offset 11 from "state", stime (15th) is next
    let utime = it.nth(11)?.parse::<u64>().ok()?;
    let stime = it.next()?.parse::<u64>().ok()?;
    Some(utime.saturating_add(stime))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_line_takes_first_four_fields() {
        let stat = "cpu  100 0 50 850 7 0 3 0 0 0\ncpu0 50 0 25 425 3 0 1 0 0 0\n";
        assert_eq!(parse_cpu_line(stat).unwrap(), CpuCounters::new(100, 0, 50, 850));
    }

    #[test]
    fn cpu_line_rejects_garbage() {
        assert!(matches!(
            parse_cpu_line("cpu  1 2 x 4\n"),
            Err(SampleError::InvalidSample { .. })
        ));
        assert!(parse_cpu_line("intr 1 2 3\n").is_err());
        assert!(parse_cpu_line("cpu  1 2\n").is_err());
    }

    #[test]
    fn meminfo_prefers_mem_available() {
        let m = parse_meminfo(
            "MemTotal:       16000 kB\nMemFree:         1000 kB\nMemAvailable:    4000 kB\nSwapTotal:       2048 kB\nSwapFree:        1024 kB\n",
        )
        .unwrap();
        assert_eq!(m.total_physical, 16000 * 1024);
        assert_eq!(m.available_physical, 4000 * 1024);
        assert_eq!(m.used_physical, 12000 * 1024);
        assert_eq!(m.usage_percent, 75.0);
        assert_eq!(m.total_virtual, 2048 * 1024);
        assert_eq!(m.available_virtual, 1024 * 1024);
    }

    #[test]
    fn meminfo_without_total_is_invalid() {
        assert!(parse_meminfo("MemFree: 10 kB\n").is_err());
    }

    #[test]
    fn net_dev_rows() {
        let dev = concat!(
            "Inter-|   Receive                            |  Transmit\n",
            " face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets\n",
            "    lo:    2000      20    0    0    0     0          0         0     2000      20    0    0    0     0       0          0\n",
            "  eth0:1048576     900    0    0    0     0          0         0   524288     400    0    0    0     0       0          0\n",
        );
        let rows = parse_net_dev(dev).unwrap();
        assert_eq!(
            rows,
            vec![
                ("lo".to_string(), 2000, 2000),
                ("eth0".to_string(), 1_048_576, 524_288),
            ]
        );
    }

    #[test]
    fn status_parsing() {
        let rec = parse_status(
            42,
            "Name:\tsshd\nUmask:\t0022\nState:\tS (sleeping)\nVmRSS:\t    5120 kB\n",
        )
        .unwrap();
        assert_eq!(rec.pid, 42);
        assert_eq!(rec.name, "sshd");
        assert_eq!(rec.status, "Sleeping");
        assert_eq!(rec.mem_bytes, 5120 * 1024);

        let kthread = parse_status(2, "Name:\tkthreadd\nState:\tS (sleeping)\n").unwrap();
        assert_eq!(kthread.mem_bytes, 0);

        assert!(parse_status(3, "State:\tR (running)\n").is_none());
    }

    #[test]
    fn proc_jiffies_handles_spaces_in_comm() {
        let stat = "1234 (my (odd) proc) S 1 1234 1234 0 -1 4194560 100 0 0 0 250 50 0 0 20 0 1 0 100 0 0";
        assert_eq!(parse_proc_jiffies(stat), Some(300));
        assert_eq!(parse_proc_jiffies("garbage"), None);
    }
}
