//! Top-N process selection.
//!
//! Memory is the default ordering because every source can report resident
//! memory; CPU ordering is only offered where the source attributes CPU time to
//! processes (see `SampleSource::supports_process_cpu`). Both orderings are
//! descending and stable, so processes with equal keys keep the order in which
//! the source discovered them.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::ProcessRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankBy {
    #[default]
    Memory,
    Cpu,
}

impl FromStr for RankBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(RankBy::Memory),
            "cpu" => Ok(RankBy::Cpu),
            other => Err(format!("unknown ranking '{other}' (expected memory or cpu)")),
        }
    }
}

impl fmt::Display for RankBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankBy::Memory => f.write_str("memory"),
            RankBy::Cpu => f.write_str("cpu"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProcessRanker {
    rank_by: RankBy,
    limit: usize,
}

impl ProcessRanker {
    /// `limit` of 0 keeps every process.
    pub fn new(rank_by: RankBy, limit: usize) -> Self {
        Self { rank_by, limit }
    }

    /// Like `new`, but falls back to memory ordering when CPU ordering was
    /// requested and the source cannot provide per-process CPU.
    pub fn for_source(rank_by: RankBy, limit: usize, cpu_supported: bool) -> Self {
        if rank_by == RankBy::Cpu && !cpu_supported {
            warn!("per-process CPU unsupported by this source, ranking by memory");
            return Self::new(RankBy::Memory, limit);
        }
        Self::new(rank_by, limit)
    }

    pub fn rank_by(&self) -> RankBy {
        self.rank_by
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn rank(&self, mut procs: Vec<ProcessRecord>) -> Vec<ProcessRecord> {
        // sort_by is stable: ties keep discovery order
        match self.rank_by {
            RankBy::Memory => procs.sort_by(|a, b| b.mem_bytes.cmp(&a.mem_bytes)),
            RankBy::Cpu => procs.sort_by(|a, b| {
                cpu_key(b)
                    .partial_cmp(&cpu_key(a))
                    .unwrap_or(Ordering::Equal)
            }),
        }
        take_top(procs, self.limit)
    }
}

fn cpu_key(p: &ProcessRecord) -> f32 {
    p.cpu_percent.unwrap_or(0.0)
}

/// First `n` entries of an already ranked list; `n == 0` or `n >= len` keeps all.
pub fn take_top(mut ranked: Vec<ProcessRecord>, n: usize) -> Vec<ProcessRecord> {
    if n > 0 && n < ranked.len() {
        ranked.truncate(n);
    }
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(pid: u32, mem: u64, cpu: Option<f32>) -> ProcessRecord {
        ProcessRecord {
            cpu_percent: cpu,
            ..ProcessRecord::new(pid, format!("p{pid}"), mem)
        }
    }

    fn pids(v: &[ProcessRecord]) -> Vec<u32> {
        v.iter().map(|p| p.pid).collect()
    }

    #[test]
    fn memory_ties_keep_discovery_order() {
        let procs = vec![p(1, 500, None), p(2, 1500, None), p(3, 1500, None)];
        let ranked = ProcessRanker::new(RankBy::Memory, 2).rank(procs);
        assert_eq!(pids(&ranked), vec![2, 3]);
    }

    #[test]
    fn zero_or_oversized_limit_keeps_everything() {
        let procs = vec![p(1, 10, None), p(2, 30, None), p(3, 20, None)];
        assert_eq!(pids(&ProcessRanker::new(RankBy::Memory, 0).rank(procs.clone())), vec![2, 3, 1]);
        assert_eq!(pids(&ProcessRanker::new(RankBy::Memory, 3).rank(procs.clone())), vec![2, 3, 1]);
        assert_eq!(pids(&ProcessRanker::new(RankBy::Memory, 50).rank(procs)), vec![2, 3, 1]);
    }

    #[test]
    fn cpu_ordering_treats_missing_as_zero() {
        let procs = vec![p(1, 0, None), p(2, 0, Some(12.5)), p(3, 0, Some(40.0)), p(4, 0, Some(0.0))];
        let ranked = ProcessRanker::new(RankBy::Cpu, 0).rank(procs);
        assert_eq!(pids(&ranked), vec![3, 2, 1, 4]);
    }

    #[test]
    fn cpu_request_falls_back_without_support() {
        let r = ProcessRanker::for_source(RankBy::Cpu, 5, false);
        assert_eq!(r.rank_by(), RankBy::Memory);
        let r = ProcessRanker::for_source(RankBy::Cpu, 5, true);
        assert_eq!(r.rank_by(), RankBy::Cpu);
    }

    #[test]
    fn parse_rank_by() {
        assert_eq!("CPU".parse::<RankBy>(), Ok(RankBy::Cpu));
        assert_eq!(" memory ".parse::<RankBy>(), Ok(RankBy::Memory));
        assert!("disk".parse::<RankBy>().is_err());
    }
}
