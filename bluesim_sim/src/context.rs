//! Virtual clock implementing ClockContext for deterministic runs.

use async_trait::async_trait;
use bluesim_env::ClockContext;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Simulation context backed by a virtual clock.
///
/// `sleep` advances the virtual clock instead of waiting, then yields so
/// other tasks on the runtime get to run. Tick processing takes zero
/// virtual time, so the driver always sleeps the full period and the run
/// is reproducible.
#[derive(Debug, Default)]
pub struct VirtualContext {
    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: AtomicU64,
}

impl VirtualContext {
    /// Creates a context at virtual time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        self.virtual_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::AcqRel);
    }

    /// Sets the virtual time to a specific value.
    pub fn set_time(&self, time_ns: u64) {
        self.virtual_time_ns.store(time_ns, Ordering::Release);
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        self.virtual_time_ns.load(Ordering::Acquire)
    }
}

#[async_trait]
impl ClockContext for VirtualContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }

    async fn sleep(&self, duration: Duration) {
        self.advance_time(duration);
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_context_time() {
        let ctx = VirtualContext::new();
        assert_eq!(ctx.now(), Duration::ZERO);

        ctx.advance_time(Duration::from_secs(1));
        assert_eq!(ctx.now(), Duration::from_secs(1));

        ctx.advance_time(Duration::from_millis(500));
        assert_eq!(ctx.now(), Duration::from_millis(1500));

        ctx.set_time(0);
        assert_eq!(ctx.time_ns(), 0);
    }

    #[tokio::test]
    async fn test_virtual_sleep_advances_clock() {
        let ctx = VirtualContext::shared();
        ctx.sleep(Duration::from_millis(250)).await;
        ctx.sleep(Duration::from_millis(250)).await;
        assert_eq!(ctx.now(), Duration::from_millis(500));
    }
}
