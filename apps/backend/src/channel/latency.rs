use std::collections::VecDeque;
use std::time::Duration;

/// Samples kept in the rolling window.
pub const LATENCY_WINDOW: usize = 100;

/// Rolling round-trip window with a maintained sum, so the mean is O(1).
///
/// Samples are stored in whole microseconds; the sum is exact.
#[derive(Debug, Default)]
pub struct LatencyWindow {
    samples: VecDeque<u64>,
    sum: u64,
}

impl LatencyWindow {
    pub fn record(&mut self, rtt: Duration) {
        let micros = u64::try_from(rtt.as_micros()).unwrap_or(u64::MAX);
        if self.samples.len() == LATENCY_WINDOW {
            if let Some(oldest) = self.samples.pop_front() {
                self.sum = self.sum.saturating_sub(oldest);
            }
        }
        self.samples.push_back(micros);
        self.sum = self.sum.saturating_add(micros);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Mean of the retained samples in microseconds.
    pub fn mean_micros(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.sum as f64 / self.samples.len() as f64)
    }

    pub fn mean(&self) -> Option<Duration> {
        self.mean_micros()
            .map(|micros| Duration::from_nanos((micros * 1000.0).round() as u64))
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.sum = 0;
    }
}
