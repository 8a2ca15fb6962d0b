use std::fmt;
use tokio::time::{Duration, Instant};

/// Throughput bookkeeping for one run.
#[derive(Debug, Clone)]
pub struct Progress {
    started: Instant,
    pub total: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self {
            started: Instant::now(),
            total,
            completed: 0,
            succeeded: 0,
            failed: 0,
        }
    }

    pub fn record(&mut self, success: bool) {
        self.completed += 1;
        if success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot::compute(self.completed, self.total, self.started.elapsed())
    }
}

/// Rate and ETA derived from completions so far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub total: usize,
    pub per_minute: f64,
    pub eta: Option<Duration>,
}

impl ProgressSnapshot {
    pub fn compute(completed: usize, total: usize, elapsed: Duration) -> Self {
        let minutes = elapsed.as_secs_f64() / 60.0;
        let per_minute = if minutes > 0.0 {
            completed as f64 / minutes
        } else {
            0.0
        };
        let remaining = total.saturating_sub(completed);
        let eta = if per_minute > 0.0 {
            Some(Duration::from_secs_f64(remaining as f64 / per_minute * 60.0))
        } else {
            None
        };

        Self {
            completed,
            total,
            per_minute,
            eta,
        }
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} | {:.1}/min | ETA: ",
            self.completed, self.total, self.per_minute
        )?;
        match self.eta {
            Some(eta) => write!(f, "{:.0} min", eta.as_secs_f64() / 60.0),
            None => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_and_eta() {
        let snapshot = ProgressSnapshot::compute(20, 100, Duration::from_secs(240));
        assert!((snapshot.per_minute - 5.0).abs() < 1e-9);
        assert_eq!(snapshot.eta, Some(Duration::from_secs(16 * 60)));
        assert_eq!(snapshot.to_string(), "20/100 | 5.0/min | ETA: 16 min");
    }

    #[test]
    fn test_no_eta_before_any_progress() {
        let snapshot = ProgressSnapshot::compute(0, 100, Duration::ZERO);
        assert_eq!(snapshot.eta, None);
        assert_eq!(snapshot.to_string(), "0/100 | 0.0/min | ETA: unknown");
    }

    #[test]
    fn test_record_counts() {
        let mut progress = Progress::new(3);
        progress.record(true);
        progress.record(false);
        assert_eq!(progress.completed, 2);
        assert_eq!(progress.succeeded, 1);
        assert_eq!(progress.failed, 1);
    }
}
