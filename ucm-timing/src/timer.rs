use std::time::{Duration, Instant};

/// Trait for high-precision timers
pub trait Timer {
    /// Time since the timer was created.
    fn now(&self) -> Duration;
    fn sleep(&self, d: Duration);
    /// Records how late a timer fired compared to its deadline.
    fn record_lateness(&mut self, d: Duration);
    fn stats(&self) -> TimingStats;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimingStats {
    pub samples: usize,
    pub average_lateness_ns: f64,
    pub jitter_ns: f64,
    pub min_lateness_ns: f64,
    pub max_lateness_ns: f64,
}

impl TimingStats {
    pub fn from_samples(samples: &[Duration]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let times: Vec<f64> = samples.iter().map(|d| d.as_nanos() as f64).collect();
        let n = times.len() as f64;
        let avg = times.iter().sum::<f64>() / n;
        let var = times.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / n;
        let min = times.iter().copied().fold(f64::INFINITY, f64::min);
        let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self {
            samples: times.len(),
            average_lateness_ns: avg,
            jitter_ns: var.sqrt(),
            min_lateness_ns: min,
            max_lateness_ns: max,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    pub start: Instant,
    pub lateness: Vec<Duration>,
    pub max_samples: usize,
}

impl Timer for HighPrecisionTimer {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
    fn sleep(&self, d: Duration) {
        self.high_precision_sleep(d)
    }
    fn record_lateness(&mut self, d: Duration) {
        if self.lateness.len() >= self.max_samples {
            self.lateness.remove(0);
        }
        self.lateness.push(d);
    }
    fn stats(&self) -> TimingStats {
        TimingStats::from_samples(&self.lateness)
    }
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            lateness: Vec::with_capacity(1000),
            max_samples: 1000,
        }
    }

    pub fn high_precision_sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        #[cfg(target_os = "linux")]
        self.linux_sleep(duration);
        #[cfg(not(target_os = "linux"))]
        self.portable_sleep(duration);
    }

    #[cfg(target_os = "linux")]
    fn linux_sleep(&self, duration: Duration) {
        use libc::{clock_nanosleep, timespec, CLOCK_MONOTONIC};

        let req = timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        };

        unsafe {
            clock_nanosleep(CLOCK_MONOTONIC, 0, &req, std::ptr::null_mut());
        }
    }

    // Spin for very short waits, where thread::sleep overshoots badly.
    #[cfg(not(target_os = "linux"))]
    fn portable_sleep(&self, duration: Duration) {
        if duration.as_nanos() < 100_000 {
            let start = Instant::now();
            while start.elapsed() < duration {
                std::hint::spin_loop();
            }
        } else {
            std::thread::sleep(duration);
        }
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}
