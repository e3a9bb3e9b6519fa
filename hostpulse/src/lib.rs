//! hostpulse: in-process host resource sampling.
//!
//! A [`MonitorEngine`] polls a platform [`SampleSource`] on a timer, turns
//! cumulative CPU and network counters into usage and throughput with a
//! [`RateTracker`], ranks processes with a [`ProcessRanker`], and publishes an
//! immutable [`Snapshot`] to subscribers every cycle.

pub mod config;
pub mod engine;
pub mod error;
pub mod ranker;
pub mod rate;
mod sampler;
pub mod source;
mod state;
pub mod types;

pub use config::MonitorConfig;
pub use engine::MonitorEngine;
pub use error::{Result, SampleError};
pub use ranker::{ProcessRanker, RankBy};
pub use rate::RateTracker;
pub use source::{platform_source, Reading, SampleSource, ScriptedSource};
pub use state::{SnapshotCallback, SubscriptionId};
pub use types::{
    CpuCounters, DiskVolume, MemorySnapshot, NetworkCounters, NetworkRate, NetworkStats,
    ProcessRecord, Snapshot,
};
