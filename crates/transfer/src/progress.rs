use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

/// Callback invoked after every completed part.
pub type ProgressCallback = Arc<dyn Fn(&ProgressReport) + Send + Sync>;

/// Formats an ETA using only its two coarsest non-zero units.
///
/// Days and hours when at least a day remains, hours and minutes when at
/// least an hour remains, otherwise minutes. Seconds are dropped.
pub fn format_eta(eta: Duration) -> String {
    let secs = eta.as_secs();
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;

    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Progress after one part finished.
///
/// `eta` and `part_throughput` come from the time measured around each
/// individual upload call, i.e. per-worker latency. With more than one
/// worker they overstate the remaining wall-clock time; the `wall_clock_*`
/// fields describe the batch as a whole.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    /// Index of the part that just finished.
    pub part_index: usize,
    pub part_bytes: u64,
    pub part_elapsed: Duration,
    pub completed_parts: usize,
    pub total_parts: usize,
    pub remaining_parts: usize,
    /// Mean of all per-part durations so far.
    pub average_part_time: Duration,
    /// `average_part_time * remaining_parts`.
    pub eta: Duration,
    /// `part_bytes / part_elapsed`, in bytes per second.
    pub part_throughput: f64,
    /// Time since the tracker was created.
    pub wall_clock_elapsed: Duration,
    /// Wall-clock time per completed part times remaining parts.
    pub wall_clock_eta: Duration,
    /// Sliding-window throughput of the whole batch, in bytes per second.
    pub wall_clock_throughput: f64,
    /// Number of concurrent workers the durations were measured on.
    pub parallelism: usize,
}

impl ProgressReport {
    /// Human-readable per-worker ETA.
    pub fn eta_display(&self) -> String {
        format_eta(self.eta)
    }

    /// Human-readable wall-clock ETA.
    pub fn wall_clock_eta_display(&self) -> String {
        format_eta(self.wall_clock_eta)
    }

    /// Returns `true` when `eta` reflects per-worker latency rather than
    /// wall-clock progress.
    pub fn is_latency_based(&self) -> bool {
        self.parallelism > 1
    }

    /// Completed share of parts as a percentage (0-100).
    pub fn percentage(&self) -> f64 {
        if self.total_parts == 0 {
            return 0.0;
        }
        self.completed_parts as f64 / self.total_parts as f64 * 100.0
    }
}

/// Accumulates per-part durations and notifies callbacks.
pub struct ProgressTracker {
    inner: Mutex<TrackerInner>,
    callbacks: RwLock<Vec<ProgressCallback>>,
    speed: SpeedCalculator,
    started_at: Instant,
}

struct TrackerInner {
    total_parts: usize,
    parallelism: usize,
    durations: Vec<Duration>,
}

impl ProgressTracker {
    /// Creates a tracker for `total_parts` parts uploaded by `parallelism`
    /// workers.
    pub fn new(total_parts: usize, parallelism: usize) -> Self {
        Self {
            inner: Mutex::new(TrackerInner {
                total_parts,
                parallelism: parallelism.max(1),
                durations: Vec::with_capacity(total_parts),
            }),
            callbacks: RwLock::new(Vec::new()),
            speed: SpeedCalculator::new(None, None),
            started_at: Instant::now(),
        }
    }

    /// Registers a progress callback.
    pub fn on_progress(&self, callback: ProgressCallback) {
        let mut callbacks = self.callbacks.write().unwrap();
        callbacks.push(callback);
    }

    /// Records a finished part and notifies every callback.
    pub fn record(&self, part_index: usize, part_bytes: u64, elapsed: Duration) -> ProgressReport {
        self.speed.add_sample(part_bytes);
        let wall_clock_elapsed = self.started_at.elapsed();

        let report = {
            let mut inner = self.inner.lock().unwrap();
            inner.durations.push(elapsed);

            let completed_parts = inner.durations.len();
            let remaining_parts = inner.total_parts.saturating_sub(completed_parts);
            let total: Duration = inner.durations.iter().sum();
            let average_part_time = total / completed_parts as u32;
            let wall_per_part = wall_clock_elapsed / completed_parts as u32;

            let part_throughput = if elapsed.is_zero() {
                0.0
            } else {
                part_bytes as f64 / elapsed.as_secs_f64()
            };

            ProgressReport {
                part_index,
                part_bytes,
                part_elapsed: elapsed,
                completed_parts,
                total_parts: inner.total_parts,
                remaining_parts,
                average_part_time,
                eta: average_part_time * remaining_parts as u32,
                part_throughput,
                wall_clock_elapsed,
                wall_clock_eta: wall_per_part * remaining_parts as u32,
                wall_clock_throughput: self.speed.bytes_per_second(),
                parallelism: inner.parallelism,
            }
        };

        let callbacks = self.callbacks.read().unwrap();
        for cb in callbacks.iter() {
            cb(&report);
        }
        report
    }

    /// Per-part durations recorded so far, in completion order.
    pub fn durations(&self) -> Vec<Duration> {
        let inner = self.inner.lock().unwrap();
        inner.durations.clone()
    }
}

// ---------------------------------------------------------------------------
// SpeedCalculator
// ---------------------------------------------------------------------------

struct SpeedSample {
    bytes: u64,
    timestamp: Instant,
}

/// Wall-clock transfer speed over a sliding window of samples.
pub struct SpeedCalculator {
    inner: Mutex<SpeedInner>,
}

struct SpeedInner {
    samples: Vec<SpeedSample>,
    max_samples: usize,
    window_size: Duration,
}

impl SpeedCalculator {
    /// Creates a new calculator.
    ///
    /// - `window_size`: time window for speed calculation (default 60 s).
    /// - `max_samples`: maximum retained samples (default 256).
    pub fn new(window_size: Option<Duration>, max_samples: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(SpeedInner {
                samples: Vec::new(),
                max_samples: max_samples.unwrap_or(256),
                window_size: window_size.unwrap_or(Duration::from_secs(60)),
            }),
        }
    }

    /// Records `bytes` finished at the current instant.
    pub fn add_sample(&self, bytes: u64) {
        let mut s = self.inner.lock().unwrap();
        let now = Instant::now();
        s.samples.push(SpeedSample {
            bytes,
            timestamp: now,
        });

        if let Some(cutoff) = now.checked_sub(s.window_size) {
            s.samples.retain(|sample| sample.timestamp >= cutoff);
        }

        if s.samples.len() > s.max_samples {
            let excess = s.samples.len() - s.max_samples;
            s.samples.drain(..excess);
        }
    }

    /// Average speed in bytes/second within the window.
    ///
    /// Returns 0.0 with fewer than 2 samples. The first sample only marks
    /// the start of the window, so its bytes are not counted.
    pub fn bytes_per_second(&self) -> f64 {
        let s = self.inner.lock().unwrap();
        if s.samples.len() < 2 {
            return 0.0;
        }

        let first = &s.samples[0];
        let last = &s.samples[s.samples.len() - 1];
        let elapsed = last.timestamp.duration_since(first.timestamp);
        if elapsed.is_zero() {
            return 0.0;
        }

        let bytes: u64 = s.samples[1..].iter().map(|sample| sample.bytes).sum();
        bytes as f64 / elapsed.as_secs_f64()
    }
}
