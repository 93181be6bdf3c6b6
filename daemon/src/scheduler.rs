use std::cell::Cell;
use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::MissedTickBehavior;

use tempsense_model::{SensorSource, TelemetrySink};

use crate::pipeline::Pipeline;

/// Drives the pipeline at a fixed interval.
///
/// Ticks are counted independently of how long a cycle takes. A tick that fires while a cycle
/// is still running is queued, and at most one tick waits at a time; further ticks are dropped
/// until the queue has room again. Cycles therefore never overlap, they only start late.
pub struct Scheduler {
    interval: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Runs cycles until `shutdown` resolves. A cycle in flight at that point is finished first.
    pub async fn run<S, K>(&self, pipeline: &mut Pipeline<S, K>, shutdown: impl Future<Output = ()>)
    where
        S: SensorSource,
        K: TelemetrySink,
    {
        // Depth 1: the in-flight cycle plus one waiting tick.
        let (ticks, mut pending) = mpsc::channel::<()>(1);
        let stopping = Cell::new(false);

        let ticker = async {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let tick_loop = async {
                loop {
                    interval.tick().await;
                    match ticks.try_send(()) {
                        Ok(()) => {}
                        Err(TrySendError::Full(())) => {
                            log::warn!("Previous cycle still running, dropping tick")
                        }
                        Err(TrySendError::Closed(())) => break,
                    }
                }
            };

            tokio::select! {
                _ = tick_loop => {}
                _ = shutdown => log::info!("Shutting down"),
            }

            stopping.set(true);
            drop(ticks);
        };

        let worker = async {
            while pending.recv().await.is_some() {
                if stopping.get() {
                    break;
                }
                pipeline.cycle().await;
            }
        };

        tokio::join!(ticker, worker);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tempsense_common::sensor::DummySensor;
    use tempsense_common::telemetry::DummySink;
    use tempsense_model::{DeliveryError, Measurement};
    use tokio::sync::Notify;
    use tokio::time::{sleep, Instant};

    /// Blocks its first publish until `release` is notified and records when each call began.
    #[derive(Clone, Default)]
    struct StallingSink {
        release: Arc<Notify>,
        active: Arc<AtomicUsize>,
        max_active: Arc<AtomicUsize>,
        started: Arc<Mutex<Vec<Instant>>>,
    }

    impl TelemetrySink for StallingSink {
        async fn publish(&mut self, _: &[Measurement; 2]) -> Result<(), DeliveryError> {
            let first = {
                let mut started = self.started.lock().unwrap();
                started.push(Instant::now());
                started.len() == 1
            };

            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);

            if first {
                self.release.notified().await;
            }

            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_at_interval() {
        let sink = DummySink::default();
        let published = sink.published();
        let mut pipeline = Pipeline::new(DummySensor::new(20.0, 50.0), sink, "Pi-One");

        // Ticks at 0s, 5s and 10s.
        Scheduler::new(Duration::from_secs(5))
            .run(&mut pipeline, sleep(Duration::from_secs(12)))
            .await;

        assert_eq!(published.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_publish_defers_next_cycle() {
        let sink = StallingSink::default();
        let handle = sink.clone();
        let sensor = DummySensor::new(22.5, 41.0);
        let acquisitions = sensor.counter();
        let mut pipeline = Pipeline::new(sensor, sink, "Pi-One");
        let start = Instant::now();

        let observer = async {
            // The ticks at 5s and 10s fire while the first publish is stuck.
            sleep(Duration::from_secs(11)).await;
            assert_eq!(acquisitions.load(Ordering::SeqCst), 1);
            assert_eq!(handle.started.lock().unwrap().len(), 1);

            handle.release.notify_one();
            sleep(Duration::from_secs(2)).await;

            // Exactly one tick was queued behind the stalled cycle, the other was dropped.
            assert_eq!(acquisitions.load(Ordering::SeqCst), 2);
            let started = handle.started.lock().unwrap().clone();
            assert_eq!(started.len(), 2);
            assert!(started[1] - start >= Duration::from_secs(11));
        };

        Scheduler::new(Duration::from_secs(5))
            .run(&mut pipeline, observer)
            .await;

        assert_eq!(handle.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_finishes_cycle_in_flight() {
        let sink = StallingSink::default();
        let handle = sink.clone();
        let mut pipeline = Pipeline::new(DummySensor::new(22.5, 41.0), sink, "Pi-One");

        let release = handle.release.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(8)).await;
            release.notify_one();
        });

        Scheduler::new(Duration::from_secs(5))
            .run(&mut pipeline, sleep(Duration::from_secs(6)))
            .await;

        // The stalled publish ran to completion, the tick queued at 5s did not start a cycle.
        assert_eq!(handle.active.load(Ordering::SeqCst), 0);
        assert_eq!(handle.started.lock().unwrap().len(), 1);
    }
}
