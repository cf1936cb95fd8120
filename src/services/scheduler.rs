use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::{Instant, sleep_until};

/// A scheduled one-shot task that can be cancelled before it fires.
#[derive(Debug)]
pub struct TaskHandle {
    abort: AbortHandle,
}

impl TaskHandle {
    pub fn cancel(&self) {
        self.abort.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

/// Runs `task` once after `delay`. Must be called from within a tokio runtime.
///
/// The deadline is taken when this is called, not when the spawned task is
/// first polled.
pub fn schedule<F>(delay: Duration, task: F) -> TaskHandle
where
    F: FnOnce() + Send + 'static,
{
    let deadline = Instant::now() + delay;
    let handle = tokio::spawn(async move {
        sleep_until(deadline).await;
        task();
    });
    TaskHandle {
        abort: handle.abort_handle(),
    }
}

/// Holds at most one outstanding scheduled task; each trigger replaces the last.
#[derive(Debug, Default)]
pub struct Debounce {
    pending: Option<TaskHandle>,
}

impl Debounce {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger<F>(&mut self, delay: Duration, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        self.pending = Some(schedule(delay, task));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.cancel();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Debounce {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// A value waiting on a debounce timer.
///
/// Aborting a timer does not stop one whose closure is already running, so
/// every change bumps a generation and the timer only takes the value it was
/// scheduled for.
#[derive(Debug)]
pub struct Pending<T> {
    value: Option<T>,
    generation: u64,
}

impl<T> Default for Pending<T> {
    fn default() -> Self {
        Pending {
            value: None,
            generation: 0,
        }
    }
}

impl<T> Pending<T> {
    /// Stores `value` and returns the generation a timer should carry.
    pub fn set(&mut self, value: T) -> u64 {
        self.generation += 1;
        self.value = Some(value);
        self.generation
    }

    pub fn take(&mut self) -> Option<T> {
        self.generation += 1;
        self.value.take()
    }

    /// Takes the value only if nothing replaced or took it since `generation`.
    pub fn take_if_current(&mut self, generation: u64) -> Option<T> {
        if generation != self.generation {
            return None;
        }
        self.take()
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn is_some(&self) -> bool {
        self.value.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn scheduled_task_fires_after_delay() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let _handle = schedule(Duration::from_millis(500), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_task_never_fires() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let handle = schedule(Duration::from_millis(100), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        handle.cancel();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retrigger_keeps_only_the_last_task() {
        let fired = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut debounce = Debounce::new();
        for i in 0..3 {
            let fired = fired.clone();
            debounce.trigger(Duration::from_millis(200), move || {
                fired.lock().unwrap().push(i);
            });
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(debounce.is_pending());

        tokio::time::sleep(Duration::from_millis(300)).await;
        tokio::task::yield_now().await;
        assert_eq!(*fired.lock().unwrap(), vec![2]);
        assert!(!debounce.is_pending());
    }

    #[test]
    fn superseded_timer_cannot_take_newer_value() {
        let mut pending = Pending::default();
        let first = pending.set("draft");
        let second = pending.set("draft two");

        assert_eq!(pending.take_if_current(first), None);
        assert_eq!(pending.get(), Some(&"draft two"));
        assert_eq!(pending.take_if_current(second), Some("draft two"));
        assert!(!pending.is_some());
    }

    #[test]
    fn take_invalidates_outstanding_timer() {
        let mut pending = Pending::default();
        let generation = pending.set(1);
        assert_eq!(pending.take(), Some(1));

        pending.set(2);
        assert_eq!(pending.take_if_current(generation), None);
        assert!(pending.is_some());
    }
}
