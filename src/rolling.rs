//! C2 — rolling baseline store.
//!
//! Keeps a bounded window of the last N raw samples per key and reports
//! mean/stddev/z-score computed over the window *as it stood before* the
//! current sample is folded in, so baselines never include the value being
//! scored against them.
//!
//! Shaped after the teacher's keyed-stats-map-behind-a-lock posture
//! (`signals/quality.rs`'s `RollingStats` map) but swaps the Welford
//! accumulator for an explicit `VecDeque` sample buffer, since the spec
//! calls for a bounded baseline window and a pre-update sample count rather
//! than an unbounded running mean.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollingUpdate {
    pub n: usize,
    pub mean: f64,
    pub stddev: f64,
    pub z: f64,
}

impl RollingUpdate {
    pub fn unavailable() -> Self {
        Self {
            n: 0,
            mean: 0.0,
            stddev: 0.0,
            z: 0.0,
        }
    }
}

struct Entry {
    samples: VecDeque<f64>,
    last_touch: Instant,
}

pub struct RollingWindowStore {
    window_size: usize,
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl RollingWindowStore {
    pub fn new(window_size: usize, ttl: Duration) -> Self {
        Self {
            window_size: window_size.max(1),
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Folds `value` into the window for `key`, returning the baseline
    /// computed from the samples already present before this call. Infallible
    /// in this in-process implementation, but returns `Option` so callers
    /// already handle the "store unreachable" degrade path a remote baseline
    /// store would need.
    pub fn update(&self, key: &str, value: f64) -> Option<RollingUpdate> {
        let mut entries = self.entries.lock();
        self.sweep_expired(&mut entries);

        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            samples: VecDeque::with_capacity(self.window_size),
            last_touch: Instant::now(),
        });

        let n = entry.samples.len();
        let update = if n == 0 {
            RollingUpdate::unavailable()
        } else {
            let mean = entry.samples.iter().sum::<f64>() / n as f64;
            let variance = entry.samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n as f64;
            let stddev = variance.sqrt();
            let z = if stddev == 0.0 { 0.0 } else { (value - mean) / stddev };
            RollingUpdate { n, mean, stddev, z }
        };

        entry.samples.push_front(value);
        entry.samples.truncate(self.window_size);
        entry.last_touch = Instant::now();

        Some(update)
    }

    fn sweep_expired(&self, entries: &mut HashMap<String, Entry>) {
        let ttl = self.ttl;
        let now = Instant::now();
        entries.retain(|_, e| now.duration_since(e.last_touch) <= ttl);
    }
}
