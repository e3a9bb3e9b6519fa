//! Background sampler: one task per running engine, ticking at the configured
//! period. Each tick runs a full cycle under the cycle lock, so a slow cycle
//! delays the next tick instead of overlapping it.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::state::{CycleState, EngineState};
use crate::types::{NetworkStats, Snapshot};

pub(crate) fn spawn_sampler(state: Arc<EngineState>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if !run_cycle(&state).await {
                debug!("sampler exiting: engine stopped");
                break;
            }
        }
    })
}

/// Samples and publishes once. Returns false if the engine has been stopped.
pub(crate) async fn run_cycle(state: &EngineState) -> bool {
    let mut cycle = state.cycle.lock().await;
    if !cycle.active {
        return false;
    }
    let snapshot = collect(&mut cycle, &state.hostname);
    state.publish(&mut cycle, snapshot);
    true
}

/// Primes platform counter caches (sysinfo CPU usage, per-process jiffies)
/// without touching rate baselines or publishing anything.
pub(crate) fn warm_up(cycle: &mut CycleState) {
    let src = &mut cycle.source;
    if let Err(e) = src.read_cpu_counters() {
        debug!("warm-up cpu read failed: {e}");
    }
    if let Err(e) = src.read_network_counters() {
        debug!("warm-up network read failed: {e}");
    }
    if let Err(e) = src.read_processes() {
        debug!("warm-up process read failed: {e}");
    }
}

/// Reads every source once and assembles a snapshot. A failed read keeps the
/// previous cycle's value for that field (held rate for CPU and network).
pub(crate) fn collect(cycle: &mut CycleState, hostname: &str) -> Snapshot {
    let prev = Arc::clone(&cycle.previous);

    let cpu_usage = match cycle.source.read_cpu_counters() {
        Ok(counters) => {
            let now = cycle.now_ms();
            cycle.tracker.observe_cpu(counters, now)
        }
        Err(e) => {
            warn!("cpu sample degraded: {e}");
            cycle.tracker.cpu_usage()
        }
    };

    let memory = cycle.source.read_memory().unwrap_or_else(|e| {
        warn!("memory sample degraded: {e}");
        prev.memory
    });

    let disks = cycle.source.read_disk_volumes().unwrap_or_else(|e| {
        warn!("disk sample degraded: {e}");
        prev.disks.clone()
    });

    let network = match cycle.source.read_network_counters() {
        Ok(counters) => {
            let now = cycle.now_ms();
            let rate = cycle.tracker.observe_network(&counters, now);
            let (session_received, session_sent) = cycle.tracker.session_totals();
            NetworkStats {
                interface: counters.interface,
                bytes_received: counters.received,
                bytes_sent: counters.transmitted,
                download_kbps: rate.download_kbps,
                upload_kbps: rate.upload_kbps,
                session_received,
                session_sent,
            }
        }
        Err(e) => {
            warn!("network sample degraded: {e}");
            let rate = cycle.tracker.network_rate();
            NetworkStats {
                download_kbps: rate.download_kbps,
                upload_kbps: rate.upload_kbps,
                ..prev.network.clone()
            }
        }
    };

    let (process_count, top_processes) = match cycle.source.read_processes() {
        Ok(procs) => (procs.len(), cycle.ranker.rank(procs)),
        Err(e) => {
            warn!("process sample degraded: {e}");
            (prev.process_count, prev.top_processes.clone())
        }
    };

    Snapshot {
        timestamp: Utc::now(),
        hostname: hostname.to_string(),
        cpu_usage,
        memory,
        disks,
        network,
        process_count,
        top_processes,
    }
}
