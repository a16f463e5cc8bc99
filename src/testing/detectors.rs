//! Detector doubles for exercising the row stages and the dispatcher.

use crate::detect::ContentDetector;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// Flags values containing `needle` and counts every call.
#[derive(Debug, Default)]
pub struct CountingDetector {
    needle: String,
    calls: AtomicUsize,
}

impl CountingDetector {
    #[must_use]
    pub fn new(needle: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            needle: needle.into(),
            calls: AtomicUsize::new(0),
        })
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ContentDetector for CountingDetector {
    fn name(&self) -> &str {
        "counting"
    }

    fn detect(&self, value: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        !self.needle.is_empty() && value.contains(&self.needle)
    }
}

/// Panics on any value containing `trigger`.
#[derive(Debug)]
pub struct PanickingDetector {
    trigger: String,
}

impl PanickingDetector {
    #[must_use]
    pub fn new(trigger: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            trigger: trigger.into(),
        })
    }
}

impl ContentDetector for PanickingDetector {
    fn name(&self) -> &str {
        "panicking"
    }

    fn detect(&self, value: &str) -> bool {
        assert!(!value.contains(&self.trigger), "detector tripped on {value:?}");
        false
    }
}

/// Sleeps on every call and records how many calls overlapped at most.
///
/// Never flags anything.
#[derive(Debug)]
pub struct SlowDetector {
    delay: Duration,
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl SlowDetector {
    #[must_use]
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    /// Most calls observed in flight at once.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl ContentDetector for SlowDetector {
    fn name(&self) -> &str {
        "slow"
    }

    fn detect(&self, _value: &str) -> bool {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(self.delay);
        self.current.fetch_sub(1, Ordering::SeqCst);
        false
    }
}
