use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    /// Groups of the batch that just finished.
    pub label: String,
}

impl Progress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            (self.completed as f64 / self.total as f64).min(1.0)
        }
    }
}

/// Receives a progress update after every batch.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, progress: &Progress);
}

/// Reports progress through the log.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_progress(&self, progress: &Progress) {
        info!(
            "Progress {}/{} ({:.0}%) - {}",
            progress.completed,
            progress.total,
            progress.fraction() * 100.0,
            progress.label
        );
    }
}

pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _progress: &Progress) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_is_bounded() {
        let p = |completed, total| Progress { completed, total, label: String::new() };
        assert_eq!(p(1, 4).fraction(), 0.25);
        assert_eq!(p(4, 4).fraction(), 1.0);
        assert_eq!(p(0, 0).fraction(), 1.0);
    }
}
