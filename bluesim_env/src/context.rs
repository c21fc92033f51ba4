//! Time abstraction for the periodic driver.

use async_trait::async_trait;
use std::time::Duration;

/// The clock the observation loop paces itself against.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time` and `Instant`
/// - **Simulation**: `VirtualContext` - a virtual clock that `sleep` advances
///
/// The driver reads `now()` before and after a tick to measure processing
/// time, then sleeps only the rest of the period.
#[async_trait]
pub trait ClockContext: Send + Sync + 'static {
    /// Returns the monotonic time since context creation.
    fn now(&self) -> Duration;

    /// Suspends the driver for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock
    async fn sleep(&self, duration: Duration);
}
