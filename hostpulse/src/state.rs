//! Engine state shared between the public handle and the sampler task.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tracing::warn;

use crate::rate::RateTracker;
use crate::ranker::ProcessRanker;
use crate::source::SampleSource;
use crate::types::Snapshot;

pub type SnapshotCallback = Arc<dyn Fn(Arc<Snapshot>) + Send + Sync>;

/// Handle returned by `MonitorEngine::register`, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Everything a cycle reads or mutates. Only touched with the cycle lock held,
/// which is also what keeps cycles from overlapping.
pub(crate) struct CycleState {
    pub source: Box<dyn SampleSource>,
    pub tracker: RateTracker,
    pub ranker: ProcessRanker,
    // Fallback values for fields whose read fails this cycle.
    pub previous: Arc<Snapshot>,
    pub epoch: Instant,
    // Cleared by stop(); a cycle that sees it false publishes nothing.
    pub active: bool,
}

impl CycleState {
    pub fn new(source: Box<dyn SampleSource>, ranker: ProcessRanker) -> Self {
        Self {
            source,
            tracker: RateTracker::new(),
            ranker,
            previous: Arc::new(Snapshot::default()),
            epoch: Instant::now(),
            active: false,
        }
    }

    /// Monotonic milliseconds since the engine was built.
    pub fn now_ms(&self) -> i64 {
        i64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(i64::MAX)
    }
}

pub(crate) struct EngineState {
    pub cycle: AsyncMutex<CycleState>,
    pub hostname: String,
    pub running: AtomicBool,
    pub interval_ms: AtomicU64,

    latest: RwLock<Arc<Snapshot>>,
    subscribers: Mutex<Vec<(SubscriptionId, SnapshotCallback)>>,
    next_id: AtomicU64,
}

impl EngineState {
    pub fn new(cycle: CycleState, hostname: String) -> Self {
        Self {
            cycle: AsyncMutex::new(cycle),
            hostname,
            running: AtomicBool::new(false),
            interval_ms: AtomicU64::new(0),
            latest: RwLock::new(Arc::new(Snapshot::default())),
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn latest(&self) -> Arc<Snapshot> {
        match self.latest.read() {
            Ok(g) => Arc::clone(&*g),
            Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
        }
    }

    pub fn register(&self, cb: SnapshotCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers().push((id, cb));
        id
    }

    pub fn unregister(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscribers();
        let before = subs.len();
        subs.retain(|(sid, _)| *sid != id);
        subs.len() != before
    }

    fn subscribers(&self) -> MutexGuard<'_, Vec<(SubscriptionId, SnapshotCallback)>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Caches the snapshot for pull accessors and hands it to every subscriber.
    /// Must be called with the cycle lock held (`cycle` is that guard's target).
    pub fn publish(&self, cycle: &mut CycleState, snapshot: Snapshot) {
        let snapshot = Arc::new(snapshot);
        cycle.previous = Arc::clone(&snapshot);
        match self.latest.write() {
            Ok(mut g) => *g = Arc::clone(&snapshot),
            Err(poisoned) => *poisoned.into_inner() = Arc::clone(&snapshot),
        }

        // Copy the list out so a callback may (un)register without deadlocking.
        let callbacks: Vec<SnapshotCallback> =
            self.subscribers().iter().map(|(_, cb)| Arc::clone(cb)).collect();
        for cb in callbacks {
            let snap = Arc::clone(&snapshot);
            if catch_unwind(AssertUnwindSafe(|| cb(snap))).is_err() {
                warn!("snapshot subscriber panicked");
            }
        }
    }
}
