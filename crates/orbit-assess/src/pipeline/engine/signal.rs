use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Run-level cancellation, observed between stage transitions only.
#[derive(Debug, Clone, Default)]
pub struct RunSignal {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl RunSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self
                .deadline
                .map(|deadline| Instant::now() >= deadline)
                .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_shared_between_clones() {
        let signal = RunSignal::new();
        let worker = signal.clone();
        assert!(!worker.is_cancelled());
        signal.cancel();
        assert!(worker.is_cancelled());
    }

    #[test]
    fn elapsed_deadline_counts_as_cancelled() {
        assert!(RunSignal::with_deadline(Duration::ZERO).is_cancelled());
        assert!(!RunSignal::with_deadline(Duration::from_secs(3600)).is_cancelled());
    }
}
