//! Connecting icon animation timer
//!
//! At most one periodic timer exists at a time. Each timer carries a
//! generation number so ticks that were already queued when the timer got
//! cancelled can be recognised and dropped by the receiver.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Default time between two animation frames
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(400);

/// Receives the generation of the timer that fired. Returns `false` once the
/// receiving side is gone, which ends the timer.
pub type TickSink = Arc<dyn Fn(u64) -> bool + Send + Sync>;

struct RunningTimer {
    generation: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owner of the single animation timer
pub struct Animator {
    interval: Duration,
    sink: TickSink,
    next_generation: u64,
    timer: Option<RunningTimer>,
}

impl Animator {
    pub fn new(interval: Duration, sink: TickSink) -> Self {
        Self {
            interval,
            sink,
            next_generation: 0,
            timer: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Whether a tick of the given generation belongs to the running timer
    pub fn is_current(&self, generation: u64) -> bool {
        self.timer
            .as_ref()
            .is_some_and(|timer| timer.generation == generation)
    }

    /// Start the timer. Does nothing when one is already running.
    ///
    /// Returns `true` if a new timer was started.
    pub fn start(&mut self) -> bool {
        if self.timer.is_some() {
            tracing::trace!("Animation already running");
            return false;
        }

        let generation = self.next_generation;
        self.next_generation += 1;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_timer(
            generation,
            Instant::now() + self.interval,
            self.interval,
            self.sink.clone(),
            cancel.clone(),
        ));

        tracing::debug!(generation, interval = ?self.interval, "Started animation timer");
        self.timer = Some(RunningTimer {
            generation,
            cancel,
            handle,
        });
        true
    }

    /// Stop the running timer, if any
    pub fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel.cancel();
            timer.handle.abort();
            tracing::debug!(generation = timer.generation, "Stopped animation timer");
        }
    }

    /// Change the frame interval, restarting a running timer with it
    pub fn set_interval(&mut self, interval: Duration) {
        if interval == self.interval {
            return;
        }
        self.interval = interval;
        if self.is_running() {
            self.stop();
            self.start();
        }
    }
}

impl Drop for Animator {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_timer(
    generation: u64,
    first_tick: Instant,
    period: Duration,
    sink: TickSink,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(first_tick, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if !sink(generation) {
                    break;
                }
            }
        }
    }
}
