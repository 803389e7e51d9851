//! Job queue, worker thread, and per-key result rings.
//!
//! Producers submit price/wave jobs against an opaque key; one worker thread
//! pulls jobs in FIFO order, runs the dominant-period reduction outside any
//! critical section, and deposits the packed metrics into the key's bounded
//! ring. Consumers poll the ring through the read-only queries. All shared
//! state sits behind a single mutex held only for O(1) bookkeeping plus one
//! copy of the metrics vector.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use log::{debug, warn};

use crate::kernel::{ComputeBackend, HostBackend};
use crate::signal::dominant::{analyze_pair, PeriodBand};
use crate::signal::segment::DetrendMode;

pub use crate::signal::dominant::RESULT_FIELDS;

/// Default pending-job cap; overflow evicts the oldest job.
pub const QUEUE_MAX: usize = 256;
/// Default per-key result cap; overflow evicts the oldest result.
pub const RING_MAX: usize = 4096;

/// One unit of work, immutable once enqueued.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Opaque stream identifier results are filed under.
    pub key: i64,
    /// Logical timestamp copied into the deposited result.
    pub bar_time: i64,
    /// Price samples.
    pub price: Vec<f64>,
    /// Wave samples aligned with `price`.
    pub wave: Vec<f64>,
    /// Smallest usable analysis window; shorter inputs produce zeros.
    pub window_min: usize,
    /// Largest prefix of the inputs to analyze.
    pub window_max: usize,
    /// Requested transform length; `0` derives it.
    pub nfft: usize,
    /// Per-frame trend removal.
    pub detrend: DetrendMode,
    /// Shortest admissible dominant period, in samples.
    pub min_period: f64,
    /// Longest admissible dominant period, in samples.
    pub max_period: f64,
    /// Reserved; carried for ABI stability and never consulted.
    pub flags: i32,
}

/// One deposited result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResultEntry {
    /// `bar_time` of the job that produced this entry.
    pub bar_time: i64,
    /// Per-key sequence number, strictly increasing across deposits.
    pub seq: i64,
    /// Packed synchrony metrics (see [`crate::signal::dominant`]).
    pub fields: [f64; RESULT_FIELDS],
}

/// Per-key counters exposed to consumers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyStats {
    /// Jobs that ran to a deposit (degenerate zero results included).
    pub jobs_ok: u64,
    /// Jobs evicted from a full queue while this key was submitting.
    pub jobs_drop: u64,
    /// Wall-clock duration of the last compute, in milliseconds.
    pub last_ms: f64,
    /// Current ring occupancy.
    pub ring_len: usize,
}

/// Capacity knobs for the queue and the per-key rings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Pending-job cap.
    pub queue_max: usize,
    /// Per-key result cap.
    pub ring_max: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_max: QUEUE_MAX,
            ring_max: RING_MAX,
        }
    }
}

#[derive(Debug, Default)]
struct ChartEntry {
    chart_id: i64,
    seq: i64,
}

#[derive(Debug, Default)]
struct KeyContext {
    ring: VecDeque<ResultEntry>,
    seq: i64,
    jobs_ok: u64,
    jobs_drop: u64,
    last_ms: f64,
}

#[derive(Default)]
struct Shared {
    jobs: VecDeque<Job>,
    contexts: HashMap<i64, KeyContext>,
    charts: HashMap<i64, ChartEntry>,
    stop: bool,
    worker_started: bool,
}

struct Inner {
    shared: Mutex<Shared>,
    available: Condvar,
    backend: Arc<dyn ComputeBackend>,
    config: EngineConfig,
}

impl Inner {
    fn lock_shared(&self) -> MutexGuard<'_, Shared> {
        // A poisoned lock only means a panicking thread held it; the queue
        // and rings stay structurally valid, so keep serving.
        self.shared
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// The spectral engine: one worker, one queue, per-key result rings.
///
/// The worker thread starts lazily on the first accepted submit and is
/// joined on [`Engine::shutdown`] (also run on drop), so teardown is
/// deterministic.
pub struct Engine {
    inner: Arc<Inner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Engine on the in-process backend with default capacities.
    pub fn new() -> Self {
        Self::with_backend(Arc::new(HostBackend))
    }

    /// Engine on a caller-provided backend with default capacities.
    pub fn with_backend(backend: Arc<dyn ComputeBackend>) -> Self {
        Self::with_config(backend, EngineConfig::default())
    }

    /// Engine with explicit capacities. Caps are clamped to at least one.
    pub fn with_config(backend: Arc<dyn ComputeBackend>, config: EngineConfig) -> Self {
        let config = EngineConfig {
            queue_max: config.queue_max.max(1),
            ring_max: config.ring_max.max(1),
        };
        Self {
            inner: Arc::new(Inner {
                shared: Mutex::new(Shared::default()),
                available: Condvar::new(),
                backend,
                config,
            }),
            worker: Mutex::new(None),
        }
    }

    /// The compute backend this engine runs on.
    pub fn backend(&self) -> &Arc<dyn ComputeBackend> {
        &self.inner.backend
    }

    /// Enqueue a job. Returns `false` on empty inputs or after shutdown.
    ///
    /// A full queue silently evicts its oldest pending job and charges the
    /// drop to the submitting key; the submit itself still counts as
    /// accepted.
    pub fn submit(&self, job: Job) -> bool {
        if job.price.is_empty() || job.wave.is_empty() {
            return false;
        }

        let mut shared = self.inner.lock_shared();
        if shared.stop {
            return false;
        }

        if !shared.worker_started {
            let inner = Arc::clone(&self.inner);
            let spawned = thread::Builder::new()
                .name("spectral-worker".into())
                .spawn(move || worker_loop(inner));
            match spawned {
                Ok(handle) => {
                    shared.worker_started = true;
                    *self
                        .worker
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);
                }
                Err(err) => {
                    warn!("failed to start spectral worker: {err}");
                    return false;
                }
            }
        }

        if shared.jobs.len() >= self.inner.config.queue_max {
            shared.jobs.pop_front();
            let ctx = shared.contexts.entry(job.key).or_default();
            ctx.jobs_drop += 1;
            warn!("job queue full; dropped oldest pending job (key {})", job.key);
        }
        shared.jobs.push_back(job);
        drop(shared);
        self.inner.available.notify_one();
        true
    }

    /// Most recent result for `key`, if any.
    pub fn latest(&self, key: i64) -> Option<ResultEntry> {
        let shared = self.inner.lock_shared();
        shared
            .contexts
            .get(&key)
            .and_then(|ctx| ctx.ring.front().copied())
    }

    /// First ring entry whose `bar_time` matches exactly.
    pub fn by_time(&self, key: i64, bar_time: i64) -> Option<ResultEntry> {
        let shared = self.inner.lock_shared();
        shared
            .contexts
            .get(&key)?
            .ring
            .iter()
            .find(|entry| entry.bar_time == bar_time)
            .copied()
    }

    /// Ring entry at `index`, where `0` is the most recent deposit.
    pub fn at_index(&self, key: i64, index: usize) -> Option<ResultEntry> {
        let shared = self.inner.lock_shared();
        shared.contexts.get(&key)?.ring.get(index).copied()
    }

    /// Per-key counters, if the key has ever been touched.
    pub fn stats(&self, key: i64) -> Option<KeyStats> {
        let shared = self.inner.lock_shared();
        shared.contexts.get(&key).map(|ctx| KeyStats {
            jobs_ok: ctx.jobs_ok,
            jobs_drop: ctx.jobs_drop,
            last_ms: ctx.last_ms,
            ring_len: ctx.ring.len(),
        })
    }

    /// Bind `key` to a chart id, bumping the per-key config sequence.
    pub fn set_chart(&self, key: i64, chart_id: i64) {
        let mut shared = self.inner.lock_shared();
        let entry = shared.charts.entry(key).or_default();
        entry.chart_id = chart_id;
        entry.seq += 1;
    }

    /// Chart binding for `key` as `(chart_id, seq)`.
    pub fn chart(&self, key: i64) -> Option<(i64, i64)> {
        let shared = self.inner.lock_shared();
        shared
            .charts
            .get(&key)
            .map(|entry| (entry.chart_id, entry.seq))
    }

    /// Stop the worker, join it, and drop queued jobs and result state.
    ///
    /// Subsequent submits are rejected; queries return nothing. Idempotent.
    pub fn shutdown(&self) {
        {
            let mut shared = self.inner.lock_shared();
            shared.stop = true;
        }
        self.inner.available.notify_all();
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
        let mut shared = self.inner.lock_shared();
        shared.jobs.clear();
        shared.contexts.clear();
        debug!("spectral engine shut down");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(inner: Arc<Inner>) {
    debug!("spectral worker started on backend `{}`", inner.backend.name());
    loop {
        let job = {
            let mut shared = inner.lock_shared();
            loop {
                if shared.stop {
                    debug!("spectral worker stopping");
                    return;
                }
                if let Some(job) = shared.jobs.pop_front() {
                    break job;
                }
                shared = inner
                    .available
                    .wait(shared)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
            }
        };

        let started = Instant::now();
        let fields = compute_job(&job, inner.backend.as_ref());
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let mut shared = inner.lock_shared();
        let ring_max = inner.config.ring_max;
        let ctx = shared.contexts.entry(job.key).or_default();
        ctx.seq += 1;
        ctx.jobs_ok += 1;
        ctx.last_ms = elapsed_ms;
        if ctx.ring.len() >= ring_max {
            ctx.ring.pop_back();
        }
        ctx.ring.push_front(ResultEntry {
            bar_time: job.bar_time,
            seq: ctx.seq,
            fields,
        });
    }
}

/// Run the reduction for one job. Degenerate inputs and backend failures
/// produce the all-zero vector; the deposit still happens either way.
fn compute_job(job: &Job, backend: &dyn ComputeBackend) -> [f64; RESULT_FIELDS] {
    let usable = job.price.len().min(job.wave.len());
    if usable == 0 {
        return [0.0; RESULT_FIELDS];
    }
    let width = job.window_max.min(usable);
    if width == 0 || width < job.window_min {
        return [0.0; RESULT_FIELDS];
    }
    let band = PeriodBand {
        min_period: job.min_period,
        max_period: job.max_period,
    };
    match analyze_pair(
        &job.price[..width],
        &job.wave[..width],
        job.nfft,
        job.detrend,
        &band,
        backend,
    ) {
        Ok(fields) => fields,
        Err(err) => {
            warn!("spectral analysis failed (key {}): {err}", job.key);
            [0.0; RESULT_FIELDS]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fft::Direction;
    use crate::kernel::BackendError;
    use approx::assert_abs_diff_eq;
    use core::f64::consts::PI;
    use num_complex::Complex64;
    use std::time::Duration;

    fn tone_job(key: i64, bar_time: i64, shift: usize) -> Job {
        let price: Vec<f64> = (0..256).map(|i| (2.0 * PI * i as f64 / 20.0).cos()).collect();
        let wave: Vec<f64> = (0..256)
            .map(|i| (2.0 * PI * (i + shift) as f64 / 20.0).cos())
            .collect();
        Job {
            key,
            bar_time,
            price,
            wave,
            window_min: 64,
            window_max: 256,
            nfft: 0,
            detrend: DetrendMode::Mean,
            min_period: 10.0,
            max_period: 40.0,
            flags: 0,
        }
    }

    fn wait_for<F: Fn() -> bool>(predicate: F) {
        for _ in 0..5000 {
            if predicate() {
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
        panic!("timed out waiting for engine state");
    }

    #[test]
    fn matched_tones_synchronize_fully() {
        let engine = Engine::new();
        assert!(engine.submit(tone_job(1, 100, 0)));
        wait_for(|| engine.latest(1).is_some());

        let entry = engine.latest(1).expect("deposited result");
        assert_eq!(entry.bar_time, 100);
        assert_eq!(entry.seq, 1);
        assert_abs_diff_eq!(entry.fields[0], 20.0, epsilon = 0.5);
        assert_abs_diff_eq!(entry.fields[2], 20.0, epsilon = 0.5);
        assert_abs_diff_eq!(entry.fields[5], 100.0, epsilon = 1e-6);
        assert_abs_diff_eq!(entry.fields[6], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn quarter_cycle_shift_reads_half_synchrony() {
        let engine = Engine::new();
        assert!(engine.submit(tone_job(2, 7, 5)));
        wait_for(|| engine.latest(2).is_some());

        let entry = engine.latest(2).expect("deposited result");
        assert_abs_diff_eq!(entry.fields[5], 50.0, epsilon = 3.0);
    }

    #[test]
    fn sequence_numbers_increase_per_key() {
        let engine = Engine::new();
        for t in 0..5 {
            assert!(engine.submit(tone_job(3, t, 0)));
        }
        wait_for(|| engine.stats(3).map(|s| s.jobs_ok) == Some(5));

        for idx in 0..5 {
            let entry = engine.at_index(3, idx).expect("ring entry");
            assert_eq!(entry.seq, 5 - idx as i64);
            assert_eq!(entry.bar_time, 4 - idx as i64);
        }
        assert!(engine.at_index(3, 5).is_none());
    }

    #[test]
    fn by_time_scans_for_an_exact_match() {
        let engine = Engine::new();
        for t in [10, 20, 30] {
            assert!(engine.submit(tone_job(4, t, 0)));
        }
        wait_for(|| engine.stats(4).map(|s| s.jobs_ok) == Some(3));

        assert_eq!(engine.by_time(4, 20).expect("match").bar_time, 20);
        assert!(engine.by_time(4, 25).is_none());
    }

    #[test]
    fn unknown_key_yields_nothing() {
        let engine = Engine::new();
        assert!(engine.latest(99).is_none());
        assert!(engine.by_time(99, 0).is_none());
        assert!(engine.at_index(99, 0).is_none());
        assert!(engine.stats(99).is_none());
        assert!(engine.chart(99).is_none());
    }

    #[test]
    fn degenerate_window_deposits_zeros_and_consumes_a_seq() {
        let engine = Engine::new();
        let mut job = tone_job(5, 1, 0);
        job.price.truncate(16);
        job.wave.truncate(16);
        // usable width 16 < window_min 64.
        assert!(engine.submit(job));
        wait_for(|| engine.latest(5).is_some());

        let entry = engine.latest(5).expect("zero result");
        assert_eq!(entry.seq, 1);
        assert!(entry.fields.iter().all(|v| *v == 0.0));
        let stats = engine.stats(5).expect("stats");
        assert_eq!(stats.jobs_ok, 1);
    }

    #[test]
    fn empty_inputs_are_rejected_outright() {
        let engine = Engine::new();
        let mut job = tone_job(6, 1, 0);
        job.price.clear();
        assert!(!engine.submit(job));
        assert!(engine.stats(6).is_none());
    }

    #[test]
    fn ring_is_bounded_and_evicts_the_oldest() {
        let engine = Engine::with_config(
            Arc::new(HostBackend),
            EngineConfig {
                queue_max: QUEUE_MAX,
                ring_max: 3,
            },
        );
        for t in 0..5 {
            assert!(engine.submit(tone_job(7, t, 0)));
        }
        wait_for(|| engine.stats(7).map(|s| s.jobs_ok) == Some(5));

        let stats = engine.stats(7).expect("stats");
        assert_eq!(stats.ring_len, 3);
        assert_eq!(engine.latest(7).expect("front").bar_time, 4);
        assert!(engine.by_time(7, 0).is_none());
        assert!(engine.by_time(7, 1).is_none());
        assert_eq!(engine.by_time(7, 2).expect("oldest kept").bar_time, 2);
    }

    /// Host backend whose first transform blocks until the gate opens, so
    /// tests can pile up submissions deterministically.
    struct GatedBackend {
        inner: HostBackend,
        gate: Arc<(Mutex<bool>, Condvar)>,
    }

    impl GatedBackend {
        fn new() -> (Self, Arc<(Mutex<bool>, Condvar)>) {
            let gate = Arc::new((Mutex::new(false), Condvar::new()));
            (
                Self {
                    inner: HostBackend,
                    gate: Arc::clone(&gate),
                },
                gate,
            )
        }

        fn wait_open(&self) {
            let (lock, cv) = &*self.gate;
            let mut open = lock.lock().unwrap_or_else(|p| p.into_inner());
            while !*open {
                open = cv.wait(open).unwrap_or_else(|p| p.into_inner());
            }
        }
    }

    impl ComputeBackend for GatedBackend {
        fn name(&self) -> &'static str {
            "gated-host"
        }

        fn fft_batch(
            &self,
            data: &mut [Complex64],
            n: usize,
            direction: Direction,
        ) -> Result<(), BackendError> {
            self.wait_open();
            self.inner.fft_batch(data, n, direction)
        }

        fn dft(
            &self,
            input: &[Complex64],
            out: &mut [Complex64],
            direction: Direction,
        ) -> Result<(), BackendError> {
            self.inner.dft(input, out, direction)
        }

        fn scale(&self, data: &mut [Complex64], factor: f64) -> Result<(), BackendError> {
            self.inner.scale(data, factor)
        }
    }

    #[test]
    fn backpressure_drops_oldest_and_accounts_every_submit() {
        let (backend, gate) = GatedBackend::new();
        let engine = Engine::with_backend(Arc::new(backend));

        // The worker parks inside the first job's transform while the rest
        // flood the queue past its cap.
        let total = 260u64;
        for t in 0..total {
            assert!(engine.submit(tone_job(8, t as i64, 0)));
        }

        {
            let (lock, cv) = &*gate;
            *lock.lock().unwrap_or_else(|p| p.into_inner()) = true;
            cv.notify_all();
        }

        wait_for(|| {
            engine
                .stats(8)
                .map(|s| s.jobs_ok + s.jobs_drop == total)
                .unwrap_or(false)
        });

        let stats = engine.stats(8).expect("stats");
        assert!(stats.jobs_drop >= 3);
        assert_eq!(stats.jobs_ok + stats.jobs_drop, total);
        assert!(stats.ring_len <= RING_MAX);
    }

    #[test]
    fn shutdown_stops_deposits_and_rejects_submits() {
        let engine = Engine::new();
        assert!(engine.submit(tone_job(9, 1, 0)));
        wait_for(|| engine.latest(9).is_some());

        engine.shutdown();
        assert!(!engine.submit(tone_job(9, 2, 0)));
        assert!(engine.latest(9).is_none());
        assert!(engine.stats(9).is_none());

        // Idempotent.
        engine.shutdown();
    }

    #[test]
    fn chart_bindings_bump_their_sequence() {
        let engine = Engine::new();
        engine.set_chart(11, 500);
        assert_eq!(engine.chart(11), Some((500, 1)));
        engine.set_chart(11, 700);
        assert_eq!(engine.chart(11), Some((700, 2)));
    }

    #[test]
    fn last_ms_reflects_the_previous_compute() {
        let engine = Engine::new();
        assert!(engine.submit(tone_job(12, 1, 0)));
        wait_for(|| engine.stats(12).is_some());
        let stats = engine.stats(12).expect("stats");
        assert!(stats.last_ms >= 0.0);
    }
}
