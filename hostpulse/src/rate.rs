//! Rate derivation from cumulative counters.
//!
//! The tracker keeps the last accepted reading of each counter family together
//! with the monotonic time it was taken. The first reading after construction
//! (or `reset`) only records a baseline and reports zero. A reading whose
//! elapsed time is not positive is ignored and the previous rate is held; a
//! counter that went backwards contributes a zero delta for that cycle.

use tracing::debug;

use crate::types::{CpuCounters, NetworkCounters, NetworkRate};

#[derive(Debug, Clone, Copy)]
struct Baseline<T> {
    counters: T,
    at_ms: i64,
}

#[derive(Debug, Default)]
pub struct RateTracker {
    cpu_base: Option<Baseline<CpuCounters>>,
    net_base: Option<Baseline<(u64, u64)>>,
    cpu_usage: f64,
    net_rate: NetworkRate,
    session_rx: u64,
    session_tx: u64,
}

impl RateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all baselines; the next observations bootstrap again.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn cpu_usage(&self) -> f64 {
        self.cpu_usage
    }

    pub fn network_rate(&self) -> NetworkRate {
        self.net_rate
    }

    /// Bytes (rx, tx) accumulated since the last reset.
    pub fn session_totals(&self) -> (u64, u64) {
        (self.session_rx, self.session_tx)
    }

    pub fn observe_cpu(&mut self, current: CpuCounters, now_ms: i64) -> f64 {
        let Some(base) = self.cpu_base else {
            self.cpu_base = Some(Baseline {
                counters: current,
                at_ms: now_ms,
            });
            self.cpu_usage = 0.0;
            return 0.0;
        };
        let elapsed_ms = now_ms - base.at_ms;
        if elapsed_ms <= 0 {
            debug!(elapsed_ms, "cpu: non-positive elapsed time, holding previous usage");
            return self.cpu_usage;
        }
        self.cpu_usage = cpu_percent(&base.counters, &current);
        self.cpu_base = Some(Baseline {
            counters: current,
            at_ms: now_ms,
        });
        self.cpu_usage
    }

    pub fn observe_network(&mut self, current: &NetworkCounters, now_ms: i64) -> NetworkRate {
        let totals = (current.received, current.transmitted);
        let Some(base) = self.net_base else {
            self.net_base = Some(Baseline {
                counters: totals,
                at_ms: now_ms,
            });
            self.net_rate = NetworkRate::default();
            return self.net_rate;
        };
        let elapsed_ms = now_ms - base.at_ms;
        if elapsed_ms <= 0 {
            debug!(elapsed_ms, "network: non-positive elapsed time, holding previous rate");
            return self.net_rate;
        }
        let rx = counter_delta(base.counters.0, totals.0);
        let tx = counter_delta(base.counters.1, totals.1);
        self.session_rx = self.session_rx.saturating_add(rx);
        self.session_tx = self.session_tx.saturating_add(tx);
        self.net_rate = NetworkRate {
            download_kbps: kbps(rx, elapsed_ms),
            upload_kbps: kbps(tx, elapsed_ms),
        };
        self.net_base = Some(Baseline {
            counters: totals,
            at_ms: now_ms,
        });
        self.net_rate
    }
}

/// `curr - prev`, or 0 when the counter was reset or wrapped.
pub fn counter_delta(prev: u64, curr: u64) -> u64 {
    if curr < prev {
        debug!(prev, curr, "counter went backwards, clamping delta to zero");
        return 0;
    }
    curr - prev
}

/// KB/s for `delta_bytes` moved over `elapsed_ms`. Caller guarantees `elapsed_ms > 0`.
pub fn kbps(delta_bytes: u64, elapsed_ms: i64) -> f64 {
    (delta_bytes as f64 / 1024.0) / (elapsed_ms as f64 / 1000.0)
}

/// Busy share of all ticks between two readings, 0..=100.
pub fn cpu_percent(prev: &CpuCounters, curr: &CpuCounters) -> f64 {
    let busy = counter_delta(prev.user, curr.user)
        .saturating_add(counter_delta(prev.nice, curr.nice))
        .saturating_add(counter_delta(prev.system, curr.system));
    let total = busy.saturating_add(counter_delta(prev.idle, curr.idle));
    if total == 0 {
        return 0.0;
    }
    (busy as f64 * 100.0 / total as f64).clamp(0.0, 100.0)
}
