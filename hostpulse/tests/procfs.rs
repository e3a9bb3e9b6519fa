//! LinuxSource against a fake procfs tree.
#![cfg(target_os = "linux")]

use std::fs;
use std::path::Path;

use hostpulse::source::LinuxSource;
use hostpulse::{CpuCounters, SampleError, SampleSource};

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, contents).expect("write");
}

fn proc_stat_line(pid: u32, comm: &str, utime: u64, stime: u64) -> String {
    format!("{pid} ({comm}) S 1 {pid} {pid} 0 -1 4194560 100 0 0 0 {utime} {stime} 0 0 20 0 1 0 100 0 0")
}

fn fake_root() -> tempfile::TempDir {
    let td = tempfile::tempdir().expect("tempdir");
    let root = td.path();
    write(root, "proc/stat", "cpu  100 0 50 850 0 0 0 0 0 0\ncpu0 100 0 50 850 0 0 0 0 0 0\n");
    write(
        root,
        "proc/meminfo",
        "MemTotal:       15625000 kB\nMemFree:         1000000 kB\nMemAvailable:    3906250 kB\nSwapTotal:       2000000 kB\nSwapFree:        1500000 kB\n",
    );
    write(
        root,
        "proc/net/dev",
        concat!(
            "Inter-|   Receive                            |  Transmit\n",
            " face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets\n",
            "    lo:  999999      10    0    0    0     0          0         0   999999      10    0    0    0     0       0          0\n",
            "  eth0:       0       0    0    0    0     0          0         0      100       1    0    0    0     0       0          0\n",
            "  eth1:    5000      50    0    0    0     0          0         0     6000      60    0    0    0     0       0          0\n",
            " wlan0:    3000      30    0    0    0     0          0         0     1000      10    0    0    0     0       0          0\n",
        ),
    );
    write(root, "sys/class/net/eth0/operstate", "up\n");
    write(root, "sys/class/net/eth1/operstate", "down\n");
    write(root, "sys/class/net/wlan0/operstate", "up\n");

    write(root, "proc/1/status", "Name:\tinit\nState:\tS (sleeping)\nVmRSS:\t    1024 kB\n");
    write(root, "proc/1/stat", &proc_stat_line(1, "init", 100, 0));
    write(root, "proc/22/status", "Name:\tdb server\nState:\tR (running)\nVmRSS:\t  204800 kB\n");
    write(root, "proc/22/stat", &proc_stat_line(22, "db server", 0, 0));
    // not a pid
    write(root, "proc/self/status", "Name:\tbogus\n");
    td
}

#[test]
fn reads_cpu_and_memory() {
    let td = fake_root();
    let mut src = LinuxSource::with_root(td.path());
    assert_eq!(src.read_cpu_counters().unwrap(), CpuCounters::new(100, 0, 50, 850));

    let mem = src.read_memory().unwrap();
    assert_eq!(mem.total_physical, 16_000_000_000);
    assert_eq!(mem.available_physical, 4_000_000_000);
    assert_eq!(mem.used_physical, 12_000_000_000);
    assert_eq!(mem.usage_percent, 75.0);
    assert_eq!(mem.total_virtual, 2_048_000_000);
}

#[test]
fn network_skips_loopback_and_down_links() {
    let td = fake_root();
    let mut src = LinuxSource::with_root(td.path());
    let net = src.read_network_counters().unwrap();
    // eth0 + wlan0 only
    assert_eq!(net.received, 3000);
    assert_eq!(net.transmitted, 1100);
    // eth0 has no rx traffic, so wlan0 is the representative
    assert_eq!(net.interface.as_deref(), Some("wlan0"));
}

#[test]
fn processes_with_cpu_share_on_second_read() {
    let td = fake_root();
    let mut src = LinuxSource::with_root(td.path());
    assert!(src.supports_process_cpu());

    let mut first = src.read_processes().unwrap();
    first.sort_by_key(|p| p.pid);
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].name, "init");
    assert_eq!(first[0].mem_bytes, 1024 * 1024);
    assert_eq!(first[1].name, "db server");
    assert_eq!(first[1].status, "Running");
    assert!(first.iter().all(|p| p.cpu_percent == Some(0.0)));

    // 1000 more jiffies overall, 250 of them spent by pid 22
    write(td.path(), "proc/stat", "cpu  200 0 100 1700 0 0 0 0 0 0\n");
    write(td.path(), "proc/22/stat", &proc_stat_line(22, "db server", 200, 50));

    let mut second = src.read_processes().unwrap();
    second.sort_by_key(|p| p.pid);
    assert_eq!(second[0].cpu_percent, Some(0.0));
    assert_eq!(second[1].cpu_percent, Some(25.0));
}

#[test]
fn missing_proc_files_are_unavailable() {
    let td = tempfile::tempdir().unwrap();
    let mut src = LinuxSource::with_root(td.path());
    assert!(matches!(
        src.read_cpu_counters(),
        Err(SampleError::SourceUnavailable { .. })
    ));
    assert!(src.read_memory().is_err());
    assert!(src.read_network_counters().is_err());
    assert!(src.read_processes().is_err());
}

#[test]
fn malformed_stat_is_invalid() {
    let td = tempfile::tempdir().unwrap();
    write(td.path(), "proc/stat", "cpu  lots of ticks\n");
    let mut src = LinuxSource::with_root(td.path());
    assert!(matches!(
        src.read_cpu_counters(),
        Err(SampleError::InvalidSample { .. })
    ));
}
