//! The monitoring engine: lifecycle, subscriptions and pull accessors.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{clamp_interval, MonitorConfig, MIN_INTERVAL_MS};
use crate::ranker::{take_top, ProcessRanker};
use crate::sampler::{collect, spawn_sampler, warm_up};
use crate::source::{platform_source, SampleSource};
use crate::state::{CycleState, EngineState, SnapshotCallback, SubscriptionId};
use crate::types::{DiskVolume, MemorySnapshot, NetworkStats, ProcessRecord, Snapshot};

/// Periodically samples a [`SampleSource`] and publishes a [`Snapshot`] per cycle.
///
/// The engine starts `Stopped`. [`start`](Self::start) takes an unpublished
/// warm-up reading, publishes one cycle immediately, then keeps publishing
/// every interval until [`stop`](Self::stop). The first published cycle after
/// each start always reports zero CPU usage and zero network rates, since no
/// rate baseline exists yet.
///
/// Must be used inside a tokio runtime.
pub struct MonitorEngine {
    state: Arc<EngineState>,
    config: MonitorConfig,
    driver: AsyncMutex<Option<JoinHandle<()>>>,
}

impl MonitorEngine {
    /// Engine over the platform's native source.
    pub fn new(config: MonitorConfig) -> Self {
        Self::from_boxed(platform_source(), config)
    }

    pub fn with_source<S: SampleSource>(source: S, config: MonitorConfig) -> Self {
        Self::from_boxed(Box::new(source), config)
    }

    fn from_boxed(source: Box<dyn SampleSource>, config: MonitorConfig) -> Self {
        let ranker =
            ProcessRanker::for_source(config.rank_by, config.top_n, source.supports_process_cpu());
        let hostname = hostname::get()
            .ok()
            .and_then(|s| s.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());
        debug!(source = source.name(), rank_by = %ranker.rank_by(), "engine created");
        Self {
            state: Arc::new(EngineState::new(CycleState::new(source, ranker), hostname)),
            config,
            driver: AsyncMutex::new(None),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Starts with the interval from the config.
    pub async fn start_default(&self) {
        self.start(self.config.interval_ms).await
    }

    /// Starts periodic sampling. Intervals under 100 ms are raised to 100 ms.
    /// Does nothing if already running.
    pub async fn start(&self, interval_ms: u64) {
        let mut driver = self.driver.lock().await;
        if driver.is_some() {
            debug!("start ignored: already running");
            return;
        }
        if interval_ms < MIN_INTERVAL_MS {
            warn!("interval {interval_ms}ms too short, using minimum of {MIN_INTERVAL_MS}ms");
        }
        let interval_ms = clamp_interval(interval_ms);

        {
            let mut cycle = self.state.cycle.lock().await;
            cycle.tracker.reset();
            cycle.previous = Arc::new(Snapshot::default());
            cycle.active = true;
            warm_up(&mut cycle);
            let snapshot = collect(&mut cycle, &self.state.hostname);
            self.state.publish(&mut cycle, snapshot);
        }

        self.state.interval_ms.store(interval_ms, Ordering::Relaxed);
        self.state.running.store(true, Ordering::Release);
        *driver = Some(spawn_sampler(
            Arc::clone(&self.state),
            Duration::from_millis(interval_ms),
        ));
        info!("monitoring started with interval: {interval_ms}ms");
    }

    /// Stops sampling. Once this returns no further snapshot is published.
    /// Calling it while stopped is a no-op.
    pub async fn stop(&self) {
        let mut driver = self.driver.lock().await;
        let Some(handle) = driver.take() else {
            return;
        };
        // Waits out any in-flight cycle; later ticks see `active == false`.
        self.state.cycle.lock().await.active = false;
        handle.abort();
        self.state.running.store(false, Ordering::Release);
        info!("monitoring stopped");
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Acquire)
    }

    /// Effective interval of the current (or last) run, after clamping.
    pub fn interval_ms(&self) -> u64 {
        self.state.interval_ms.load(Ordering::Relaxed)
    }

    /// Calls `callback` with every snapshot published from now on.
    ///
    /// Callbacks run synchronously on the sampler task; keep them short.
    pub fn register<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(Arc<Snapshot>) + Send + Sync + 'static,
    {
        let cb: SnapshotCallback = Arc::new(callback);
        self.state.register(cb)
    }

    /// Returns false if `id` was not registered.
    pub fn unregister(&self, id: SubscriptionId) -> bool {
        self.state.unregister(id)
    }

    // Pull accessors: latest published values, never a fresh sample. Before
    // the first cycle they return defaults.

    pub fn latest(&self) -> Arc<Snapshot> {
        self.state.latest()
    }

    pub fn cpu_usage(&self) -> f64 {
        self.latest().cpu_usage
    }

    pub fn memory_info(&self) -> MemorySnapshot {
        self.latest().memory
    }

    pub fn disk_info(&self) -> Vec<DiskVolume> {
        self.latest().disks.clone()
    }

    pub fn network_stats(&self) -> NetworkStats {
        self.latest().network.clone()
    }

    /// The `n` highest-ranked processes of the latest cycle; `n == 0` (or
    /// anything past the end) returns the whole ranked list.
    pub fn top_processes(&self, n: usize) -> Vec<ProcessRecord> {
        take_top(self.latest().top_processes.clone(), n)
    }
}

impl Drop for MonitorEngine {
    fn drop(&mut self) {
        if let Ok(mut cycle) = self.state.cycle.try_lock() {
            cycle.active = false;
        }
        if let Some(handle) = self.driver.get_mut().take() {
            handle.abort();
        }
    }
}
