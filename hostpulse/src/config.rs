//! Engine settings with environment overrides.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ranker::RankBy;

pub const DEFAULT_INTERVAL_MS: u64 = 1_000;
/// Shorter intervals are raised to this to bound polling overhead.
pub const MIN_INTERVAL_MS: u64 = 100;
pub const DEFAULT_TOP_N: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub interval_ms: u64,
    pub top_n: usize,
    pub rank_by: RankBy,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            top_n: DEFAULT_TOP_N,
            rank_by: RankBy::Memory,
        }
    }
}

impl MonitorConfig {
    /// Defaults with `HOSTPULSE_*` environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Applies `HOSTPULSE_INTERVAL_MS`, `HOSTPULSE_TOP_N` and `HOSTPULSE_RANK_BY`.
    /// Unparseable values are logged and ignored.
    pub fn with_env(self) -> Self {
        self.with_vars(|k| std::env::var(k).ok())
    }

    /// Same as [`with_env`](Self::with_env) with variables looked up through `get`.
    pub fn with_vars(mut self, get: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = get("HOSTPULSE_INTERVAL_MS") {
            match v.trim().parse() {
                Ok(ms) => self.interval_ms = ms,
                Err(_) => warn!("ignoring HOSTPULSE_INTERVAL_MS={v:?}"),
            }
        }
        if let Some(v) = get("HOSTPULSE_TOP_N") {
            match v.trim().parse() {
                Ok(n) => self.top_n = n,
                Err(_) => warn!("ignoring HOSTPULSE_TOP_N={v:?}"),
            }
        }
        if let Some(v) = get("HOSTPULSE_RANK_BY") {
            match v.parse() {
                Ok(r) => self.rank_by = r,
                Err(e) => warn!("ignoring HOSTPULSE_RANK_BY: {e}"),
            }
        }
        self
    }
}

pub fn clamp_interval(interval_ms: u64) -> u64 {
    interval_ms.max(MIN_INTERVAL_MS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn env_overrides_defaults() {
        let c = MonitorConfig::default().with_vars(vars(&[
            ("HOSTPULSE_INTERVAL_MS", "250"),
            ("HOSTPULSE_TOP_N", "5"),
            ("HOSTPULSE_RANK_BY", "cpu"),
        ]));
        assert_eq!(c.interval_ms, 250);
        assert_eq!(c.top_n, 5);
        assert_eq!(c.rank_by, RankBy::Cpu);
    }

    #[test]
    fn bad_env_values_are_ignored() {
        let c = MonitorConfig::default().with_vars(vars(&[
            ("HOSTPULSE_INTERVAL_MS", "soon"),
            ("HOSTPULSE_RANK_BY", "disk"),
        ]));
        assert_eq!(c, MonitorConfig::default());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let c: MonitorConfig = serde_json::from_str(r#"{"top_n": 3}"#).unwrap();
        assert_eq!(c.top_n, 3);
        assert_eq!(c.interval_ms, DEFAULT_INTERVAL_MS);
        assert_eq!(c.rank_by, RankBy::Memory);
    }

    #[test]
    fn short_intervals_clamp_to_minimum() {
        assert_eq!(clamp_interval(50), 100);
        assert_eq!(clamp_interval(0), 100);
        assert_eq!(clamp_interval(1500), 1500);
    }
}
