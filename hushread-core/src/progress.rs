use std::time::{Duration, Instant};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(400);

/// Reading position as a percentage of the document, `0.0` for empty text.
pub fn percent(offset: usize, len: usize) -> f64 {
    if len == 0 {
        0.0
    } else {
        offset as f64 / len as f64 * 100.0
    }
}

/// Whole-number percentage for progress indicators, clamped to `0..=100`.
pub fn percent_rounded(offset: usize, len: usize) -> u8 {
    percent(offset, len).round().clamp(0.0, 100.0) as u8
}

/// Offset targeted by a progress indicator set to `percent`.
pub fn offset_for_percent(percent: u8, len: usize) -> usize {
    let fraction = f64::from(percent.min(100)) / 100.0;
    ((fraction * len as f64).floor() as usize).min(len)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingSave {
    offset: usize,
    deadline: Instant,
}

/// Coalesces committed pages into debounced save requests: every commit
/// re-arms the timer and only the last offset is written once it expires.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    delay: Duration,
    pending: Option<PendingSave>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl ProgressTracker {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    pub fn schedule(&mut self, offset: usize, now: Instant) {
        self.pending = Some(PendingSave {
            offset,
            deadline: now + self.delay,
        });
    }

    /// Takes the pending offset if its timer has expired.
    pub fn poll(&mut self, now: Instant) -> Option<usize> {
        match self.pending {
            Some(pending) if now >= pending.deadline => {
                self.pending = None;
                Some(pending.offset)
            }
            _ => None,
        }
    }

    /// Takes the pending offset regardless of its timer.
    pub fn flush(&mut self) -> Option<usize> {
        self.pending.take().map(|pending| pending.offset)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.map(|pending| pending.deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_handles_empty_and_clamps() {
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(250, 1000), 25.0);
        assert_eq!(percent_rounded(999, 1000), 100);
        assert_eq!(percent_rounded(4, 1000), 0);
        assert_eq!(percent_rounded(5_000, 1000), 100);
    }

    #[test]
    fn percent_maps_back_to_offsets() {
        assert_eq!(offset_for_percent(0, 1234), 0);
        assert_eq!(offset_for_percent(50, 1234), 617);
        assert_eq!(offset_for_percent(100, 1234), 1234);
        assert_eq!(offset_for_percent(250, 1234), 1234);
    }

    #[test]
    fn rapid_commits_coalesce_into_one_save() {
        let start = Instant::now();
        let mut tracker = ProgressTracker::default();
        for (step, offset) in [100, 200, 300, 400, 500].into_iter().enumerate() {
            let now = start + Duration::from_millis(50 * step as u64);
            tracker.schedule(offset, now);
            assert_eq!(tracker.poll(now), None);
        }
        let last = start + Duration::from_millis(200);
        assert_eq!(tracker.poll(last + Duration::from_millis(399)), None);
        assert_eq!(tracker.poll(last + DEFAULT_DEBOUNCE), Some(500));
        assert_eq!(tracker.poll(last + Duration::from_secs(5)), None);
    }

    #[test]
    fn flush_and_cancel() {
        let now = Instant::now();
        let mut tracker = ProgressTracker::new(Duration::from_secs(1));
        tracker.schedule(42, now);
        assert_eq!(tracker.next_deadline(), Some(now + Duration::from_secs(1)));
        assert_eq!(tracker.flush(), Some(42));
        assert_eq!(tracker.flush(), None);

        tracker.schedule(7, now);
        tracker.cancel();
        assert_eq!(tracker.poll(now + Duration::from_secs(2)), None);
    }
}
