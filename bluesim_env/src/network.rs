//! Channel abstraction between fish (and the observer).

use crate::event::Event;
use crate::types::FishId;
use nalgebra::Vector2;

/// Who put an event on the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// The observer injecting an instruction
    Observer,
    /// A fish relaying or originating a message
    Fish(FishId),
}

/// Abstraction for the lossy, range-limited acoustic channel.
///
/// # Implementations
///
/// - **Simulation**: `SimChannel` - seeded range + loss model
///
/// # Interception
///
/// Every event the channel actually delivers is also appended to a
/// per-tick log. The observer drains that log once per tick; draining
/// must not change what the fish receive.
///
/// ```text
/// Fish A                    Channel                    Fish B
///   |                          |                          |
///   |-- transmit(event) ------>|                          |
///   |                          |-- [range / loss] ------->| inbox
///   |                          |-- delivered log ---> Observer
/// ```
pub trait Channel: Send + Sync + 'static {
    /// Injects an event at `position` for probabilistic delivery.
    ///
    /// `is_observer` marks instructions coming from the observer rather
    /// than from a fish; such events are not echoed into the delivered log.
    fn transmit(&self, source: Source, event: Event, position: Vector2<f64>, is_observer: bool);

    /// Takes every event delivered since the previous drain.
    fn drain_delivered(&self) -> Vec<Event>;
}
