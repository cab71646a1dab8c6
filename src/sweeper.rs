//! Background retention sweeps.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::gate::QuotaGate;
use crate::key::QuotaKey;

/// Handle to a running sweeper task. Dropping it stops the task.
#[derive(Debug)]
pub struct SweeperHandle {
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop sweeping.
    pub fn stop(self) {
        self.task.abort();
    }

    /// True once the task has stopped.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl<K: QuotaKey> QuotaGate<K> {
    /// Run [`sweep`](QuotaGate::sweep) every `interval` on the current tokio runtime.
    ///
    /// The first sweep happens one `interval` after spawning. An interval
    /// below one millisecond is rounded up.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn spawn_sweeper(&self, interval: Duration) -> SweeperHandle {
        let gate = self.clone();
        let interval = interval.max(Duration::from_millis(1));
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = gate.sweep();
                tracing::trace!(target: "quotagate::sweeper", evicted, remaining = gate.len(), "sweep tick");
            }
        });
        SweeperHandle { task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::GateConfig;

    #[tokio::test(start_paused = true)]
    async fn sweeper_evicts_stale_buckets_periodically() {
        let clock = ManualClock::default();
        let cfg = GateConfig::builder()
            .period(Duration::from_secs(1))
            .retention(Duration::from_secs(5))
            .build()
            .unwrap();
        let gate = QuotaGate::<u64>::new(cfg).with_clock(clock.clone());
        gate.fill(&1, 10).unwrap();
        gate.fill(&2, 10).unwrap();

        let handle = gate.spawn_sweeper(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(gate.len(), 2, "nothing is stale yet");

        clock.advance(Duration::from_secs(6));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(gate.is_empty());

        handle.stop();
    }

    #[tokio::test]
    async fn dropping_handle_stops_task() {
        let gate = QuotaGate::<u64>::new(GateConfig::default());
        let handle = gate.spawn_sweeper(Duration::from_millis(5));
        assert!(!handle.is_finished());
        drop(handle);
        tokio::task::yield_now().await;
    }
}
