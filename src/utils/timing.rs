use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};

/// Runs only the last call of a burst, once `wait` has passed without a newer call
pub struct Debounce {
    wait: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debounce {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            pending: None,
        }
    }

    /// Schedule `task`, replacing whatever was still waiting
    pub fn call<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let wait = self.wait;
        self.pending = Some(tokio::spawn(async move {
            sleep(wait).await;
            task.await;
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

/// Lets at most one call through per `limit` window
#[derive(Debug, Clone)]
pub struct Throttle {
    limit: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(limit: Duration) -> Self {
        Self { limit, last: None }
    }

    /// True when the caller may proceed; the window restarts on every `true`
    pub fn ready(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(previous) if now.duration_since(previous) < self.limit => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_debounce_runs_only_last_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let last_value = Arc::new(AtomicUsize::new(0));
        let mut debounce = Debounce::new(Duration::from_millis(20));

        for value in 1..=3 {
            let calls = Arc::clone(&calls);
            let last_value = Arc::clone(&last_value);
            debounce.call(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                last_value.store(value, Ordering::SeqCst);
            });
        }
        assert!(debounce.is_pending());

        sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(last_value.load(Ordering::SeqCst), 3);
        assert!(!debounce.is_pending());
    }

    #[tokio::test]
    async fn test_debounce_cancel() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut debounce = Debounce::new(Duration::from_millis(20));

        let counter = Arc::clone(&calls);
        debounce.call(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        debounce.cancel();

        sleep(Duration::from_millis(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_throttle_window() {
        let mut throttle = Throttle::new(Duration::from_millis(30));

        assert!(throttle.ready());
        assert!(!throttle.ready());

        sleep(Duration::from_millis(50)).await;
        assert!(throttle.ready());
    }
}
