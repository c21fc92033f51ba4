//! ClockLoop - the periodic driver that ticks the observer.
//!
//! One tokio task owns the [`Observer`] for the lifetime of the loop and
//! calls `eval()` once per period. Each tick's processing time is measured
//! against the [`ClockContext`] and only the remaining budget is slept, so
//! a slow tick delays the next one instead of skipping clock values.
//!
//! Stopping sets a flag that the task checks between ticks; the task then
//! hands the observer back and every armed tracker is flushed.

use crate::observer::{Observer, ObserverHandle};
use bluesim_env::{Channel, ClockContext, EnvError, Environment, Fish};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Pacing of the clock loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockConfig {
    /// Target wall time per tick
    pub period: Duration,

    /// Stop on its own once the clock reaches this value
    pub max_ticks: Option<u64>,
}

impl ClockConfig {
    /// Pacing for `freq` ticks per second.
    pub fn from_freq(freq: f64) -> Result<Self, EnvError> {
        if !(freq.is_finite() && freq > 0.0) {
            return Err(EnvError::config(format!("clock frequency must be positive, got {freq}")));
        }
        Ok(Self {
            period: Duration::from_secs_f64(1.0 / freq),
            max_ticks: None,
        })
    }

    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    pub fn validate(&self) -> Result<(), EnvError> {
        if self.period.is_zero() {
            return Err(EnvError::config("clock period must be non-zero"));
        }
        Ok(())
    }
}

/// A running clock loop.
pub struct ClockLoop<E, F, C> {
    handle: ObserverHandle<E>,
    stop: Arc<AtomicBool>,
    task: JoinHandle<Observer<E, F, C>>,
}

impl<E, F, C> ClockLoop<E, F, C>
where
    E: Environment,
    F: Fish,
    C: Channel,
{
    /// Spawns the driver on the current tokio runtime.
    pub fn start<Ctx: ClockContext>(
        observer: Observer<E, F, C>,
        ctx: Arc<Ctx>,
        config: ClockConfig,
    ) -> Result<Self, EnvError> {
        config.validate()?;

        let handle = observer.handle();
        let stop = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(run(observer, ctx, config, Arc::clone(&stop)));

        Ok(Self { handle, stop, task })
    }

    /// Handle for scheduling instructions while the loop runs.
    pub fn handle(&self) -> ObserverHandle<E> {
        self.handle.clone()
    }

    /// Current tick.
    pub fn clock(&self) -> u64 {
        self.handle.clock()
    }

    /// Whether the driver task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signals the loop to stop at the next tick boundary, waits for it and
    /// flushes every armed tracker.
    pub async fn stop(self) -> Result<Observer<E, F, C>, EnvError> {
        self.stop.store(true, Ordering::Release);
        self.join().await
    }

    /// Waits for the loop to end by itself (`max_ticks`), then flushes.
    pub async fn join(self) -> Result<Observer<E, F, C>, EnvError> {
        let mut observer = self.task.await.map_err(EnvError::context)?;
        observer.finish();
        Ok(observer)
    }
}

async fn run<E, F, C, Ctx>(
    mut observer: Observer<E, F, C>,
    ctx: Arc<Ctx>,
    config: ClockConfig,
    stop: Arc<AtomicBool>,
) -> Observer<E, F, C>
where
    E: Environment,
    F: Fish,
    C: Channel,
    Ctx: ClockContext,
{
    info!(
        period_ms = config.period.as_secs_f64() * 1000.0,
        max_ticks = ?config.max_ticks,
        "Clock loop started"
    );

    loop {
        if stop.load(Ordering::Acquire) {
            break;
        }
        if config.max_ticks.is_some_and(|max| observer.clock() >= max) {
            break;
        }

        let started = ctx.now();
        let clock = observer.eval();
        let elapsed = ctx.now().saturating_sub(started);

        match config.period.checked_sub(elapsed) {
            Some(remaining) => ctx.sleep(remaining).await,
            None => {
                debug!(
                    clock,
                    overrun_ms = (elapsed - config.period).as_secs_f64() * 1000.0,
                    "Tick overran its period"
                );
                tokio::task::yield_now().await;
            }
        }
    }

    info!(ticks = observer.clock(), "Clock loop stopped");
    observer
}
