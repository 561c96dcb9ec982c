use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Bounded time-and-count window over scalar samples (§4.2). Single writer
/// per window; no cross-monitor sharing (§5).
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    duration: Duration,
    max_data_points: usize,
    entries: VecDeque<(f64, Instant)>,
}

impl SlidingWindow {
    pub fn new(duration: Duration, max_data_points: usize) -> Self {
        Self {
            duration,
            max_data_points,
            entries: VecDeque::new(),
        }
    }

    /// Append a sample and evict anything outside the window or over cap.
    pub fn push(&mut self, value: f64, at: Instant) {
        self.entries.push_back((value, at));
        self.evict(at);
    }

    fn evict(&mut self, now: Instant) {
        while let Some(&(_, ts)) = self.entries.front() {
            if now.duration_since(ts) > self.duration {
                self.entries.pop_front();
            } else {
                break;
            }
        }
        while self.entries.len() > self.max_data_points {
            self.entries.pop_front();
        }
    }

    fn live(&self, cutoff: Option<Instant>) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().filter_map(move |&(value, ts)| match cutoff {
            Some(cutoff) if ts < cutoff => None,
            _ => Some(value),
        })
    }

    pub fn count(&self, cutoff: Option<Instant>) -> usize {
        self.live(cutoff).count()
    }

    pub fn sum(&self, cutoff: Option<Instant>) -> f64 {
        self.live(cutoff).sum()
    }

    pub fn mean(&self, cutoff: Option<Instant>) -> Option<f64> {
        let values: Vec<f64> = self.live(cutoff).collect();
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    }

    pub fn min(&self, cutoff: Option<Instant>) -> Option<f64> {
        self.live(cutoff).fold(None, |acc, v| match acc {
            None => Some(v),
            Some(m) if v < m => Some(v),
            Some(m) => Some(m),
        })
    }

    pub fn max(&self, cutoff: Option<Instant>) -> Option<f64> {
        self.live(cutoff).fold(None, |acc, v| match acc {
            None => Some(v),
            Some(m) if v > m => Some(v),
            Some(m) => Some(m),
        })
    }

    pub fn latest(&self) -> Option<f64> {
        self.entries.back().map(|&(v, _)| v)
    }

    pub fn default_cutoff(&self, now: Instant) -> Instant {
        now.checked_sub(self.duration).unwrap_or(now)
    }
}
