/// Step clock - decides when one step interval has elapsed.
///
/// The clock is polled on every scheduler turn and compares the time source
/// against the last fire. It does not assume the host calls it at any
/// particular rate.
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Monotonic milliseconds.
pub trait TimeSource {
    fn now_ms(&self) -> f64;
}

/// Wall-clock time measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemTime {
    origin: Instant,
}

impl SystemTime {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTime {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Hand-advanced time. Clones share the same reading.
#[derive(Debug, Clone, Default)]
pub struct ManualTime {
    now: Arc<Mutex<f64>>,
}

impl ManualTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, ms: f64) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = ms;
    }

    pub fn advance(&self, ms: f64) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) += ms;
    }
}

impl TimeSource for ManualTime {
    fn now_ms(&self) -> f64 {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Clone)]
pub struct Clock {
    interval_ms: f64,
    last_fire: Option<f64>,
}

impl Clock {
    pub fn new(interval_ms: f64) -> Self {
        Self {
            interval_ms,
            last_fire: None,
        }
    }

    pub fn interval_ms(&self) -> f64 {
        self.interval_ms
    }

    pub fn set_interval_ms(&mut self, interval_ms: f64) {
        self.interval_ms = interval_ms;
    }

    /// Observe one scheduler turn at `now`. Returns true when a step is due.
    ///
    /// The first observation only starts the accounting. A fire resets the
    /// reference to `now`, so a stall produces a single fire rather than a
    /// burst. While `paused` the reference is left alone, which means
    /// resuming after a full interval fires straight away.
    pub fn tick(&mut self, now: f64, paused: bool) -> bool {
        let Some(last) = self.last_fire else {
            self.last_fire = Some(now);
            return false;
        };

        if paused || now - last < self.interval_ms {
            return false;
        }

        self.last_fire = Some(now);
        true
    }

    pub fn reset(&mut self) {
        self.last_fire = None;
    }
}
