//! Single-slot delayed task with cancel-and-replace semantics.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Holds at most one pending delayed action.
///
/// Scheduling while an action is pending aborts it and starts a fresh timer,
/// so a burst of events produces a single firing `delay` after the last one.
/// A zero delay runs the action immediately while holding the slot lock.
#[derive(Clone)]
pub struct Debouncer {
    delay: Duration,
    slot: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slot: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn schedule<F, Fut>(&self, fire: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.slot.lock().await;
        if let Some(pending) = slot.take() {
            pending.abort();
        }

        if self.delay.is_zero() {
            fire().await;
            return;
        }

        let delay = self.delay;
        let shared = Arc::clone(&self.slot);
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut slot = shared.lock().await;
            fire().await;
            *slot = None;
        }));
    }

    /// Drop the pending action, if any, without running it.
    pub async fn cancel(&self) {
        if let Some(pending) = self.slot.lock().await.take() {
            pending.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter_action(counter: &Arc<AtomicUsize>) -> impl FnOnce() -> std::future::Ready<()> {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_fires_once() {
        let debouncer = Debouncer::new(Duration::from_secs(5));
        let fired = Arc::new(AtomicUsize::new(0));

        debouncer.schedule(counter_action(&fired)).await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        debouncer.schedule(counter_action(&fired)).await;

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_fires_immediately() {
        let debouncer = Debouncer::new(Duration::ZERO);
        let fired = Arc::new(AtomicUsize::new(0));

        debouncer.schedule(counter_action(&fired)).await;
        debouncer.schedule(counter_action(&fired)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending() {
        let debouncer = Debouncer::new(Duration::from_secs(3));
        let fired = Arc::new(AtomicUsize::new(0));

        debouncer.schedule(counter_action(&fired)).await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        debouncer.cancel().await;

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
