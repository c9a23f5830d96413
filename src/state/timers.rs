//! Cancellable registry of deferred settlement tasks keyed by game id.

use std::{future::Future, time::Duration};

use dashmap::DashMap;
use tokio::task::JoinHandle;

/// Deferred-task registry.
///
/// Each entry is a spawned task sleeping until its game's timeout horizon.
/// Scheduling twice for the same game replaces (and aborts) the earlier task;
/// settlement cancels the timer; a fired task removes its own entry.
#[derive(Default)]
pub struct TimerRegistry {
    tasks: DashMap<i64, JoinHandle<()>>,
}

impl TimerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `fire` to run after `delay`, keyed by `game_id`.
    pub fn schedule<F>(&self, game_id: i64, delay: Duration, fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire.await;
        });
        if let Some(previous) = self.tasks.insert(game_id, handle) {
            previous.abort();
        }
    }

    /// Abort and forget the pending timer for `game_id`, if any.
    pub fn cancel(&self, game_id: i64) {
        if let Some((_, handle)) = self.tasks.remove(&game_id) {
            handle.abort();
        }
    }

    /// Drop the registry entry without aborting; called by a fired task on itself.
    pub fn complete(&self, game_id: i64) {
        self.tasks.remove(&game_id);
    }

    /// Number of pending timers.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };

    #[tokio::test(start_paused = true)]
    async fn scheduled_task_fires_after_the_delay() {
        let timers = TimerRegistry::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();

        timers.schedule(1, Duration::from_secs(60), async move {
            flag.store(true, Ordering::SeqCst);
        });
        assert_eq!(timers.pending(), 1);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_the_task_from_firing() {
        let timers = TimerRegistry::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();

        timers.schedule(7, Duration::from_secs(60), async move {
            flag.store(true, Ordering::SeqCst);
        });
        timers.cancel(7);
        assert_eq!(timers.pending(), 0);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_the_earlier_task() {
        let timers = TimerRegistry::new();
        let first = Arc::new(AtomicBool::new(false));
        let second = Arc::new(AtomicBool::new(false));

        let flag = first.clone();
        timers.schedule(3, Duration::from_secs(10), async move {
            flag.store(true, Ordering::SeqCst);
        });
        let flag = second.clone();
        timers.schedule(3, Duration::from_secs(10), async move {
            flag.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(!first.load(Ordering::SeqCst), "replaced task was aborted");
        assert!(second.load(Ordering::SeqCst));
    }
}
