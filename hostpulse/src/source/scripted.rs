//! Deterministic in-memory source for tests and demos.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use super::SampleSource;
use crate::error::{Result, SampleError};
use crate::types::{CpuCounters, DiskVolume, MemorySnapshot, NetworkCounters, ProcessRecord};

/// One scripted answer per reading kind. `None` makes that read fail with
/// `SourceUnavailable`.
#[derive(Debug, Clone, Default)]
pub struct Reading {
    pub cpu: Option<CpuCounters>,
    pub memory: Option<MemorySnapshot>,
    pub disks: Option<Vec<DiskVolume>>,
    pub network: Option<NetworkCounters>,
    pub processes: Option<Vec<ProcessRecord>>,
}

impl Reading {
    /// A reading where every field succeeds with its default.
    pub fn ok() -> Self {
        Self {
            cpu: Some(CpuCounters::default()),
            memory: Some(MemorySnapshot::default()),
            disks: Some(Vec::new()),
            network: Some(NetworkCounters::default()),
            processes: Some(Vec::new()),
        }
    }

    pub fn cpu(mut self, c: CpuCounters) -> Self {
        self.cpu = Some(c);
        self
    }

    pub fn memory(mut self, m: MemorySnapshot) -> Self {
        self.memory = Some(m);
        self
    }

    pub fn disks(mut self, d: Vec<DiskVolume>) -> Self {
        self.disks = Some(d);
        self
    }

    pub fn network(mut self, rx: u64, tx: u64) -> Self {
        self.network = Some(NetworkCounters {
            interface: None,
            received: rx,
            transmitted: tx,
        });
        self
    }

    pub fn processes(mut self, p: Vec<ProcessRecord>) -> Self {
        self.processes = Some(p);
        self
    }
}

#[derive(Debug, Default)]
struct Script {
    queue: VecDeque<Reading>,
    current: Reading,
    cycles: usize,
}

/// Replays queued readings. Each `read_cpu_counters` call advances to the next
/// queued reading (the engine reads CPU first every cycle); once the queue is
/// drained the last reading repeats. Clones share the same script, so a test
/// can keep a handle after giving the source to an engine.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    script: Arc<Mutex<Script>>,
    process_cpu: bool,
}

impl ScriptedSource {
    pub fn new(readings: impl IntoIterator<Item = Reading>) -> Self {
        let src = Self::default();
        for r in readings {
            src.push(r);
        }
        src
    }

    /// Marks the scripted processes as carrying per-process CPU.
    pub fn with_process_cpu(mut self) -> Self {
        self.process_cpu = true;
        self
    }

    pub fn push(&self, reading: Reading) {
        self.lock().queue.push_back(reading);
    }

    /// How many cycles have started (CPU reads taken).
    pub fn cycles(&self) -> usize {
        self.lock().cycles
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn field<T: Clone>(
        &self,
        what: &'static str,
        pick: impl Fn(&Reading) -> &Option<T>,
    ) -> Result<T> {
        let script = self.lock();
        pick(&script.current).clone().ok_or_else(|| {
            let e = io::Error::new(io::ErrorKind::NotFound, "scripted failure");
            SampleError::unavailable(what, e)
        })
    }
}

impl SampleSource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn read_cpu_counters(&mut self) -> Result<CpuCounters> {
        {
            let mut script = self.lock();
            if let Some(next) = script.queue.pop_front() {
                script.current = next;
            }
            script.cycles += 1;
        }
        self.field("cpu counters", |r| &r.cpu)
    }

    fn read_memory(&mut self) -> Result<MemorySnapshot> {
        self.field("memory", |r| &r.memory)
    }

    fn read_disk_volumes(&mut self) -> Result<Vec<DiskVolume>> {
        self.field("disk volumes", |r| &r.disks)
    }

    fn read_network_counters(&mut self) -> Result<NetworkCounters> {
        self.field("network counters", |r| &r.network)
    }

    fn read_processes(&mut self) -> Result<Vec<ProcessRecord>> {
        self.field("process list", |r| &r.processes)
    }

    fn supports_process_cpu(&self) -> bool {
        self.process_cpu
    }
}
