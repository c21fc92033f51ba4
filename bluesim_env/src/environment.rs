//! Environment and fish abstractions consumed by the observer.

use crate::error::EnvError;
use crate::event::Event;
use crate::types::{FishId, FishSnapshot, Kinematics};
use nalgebra::{Vector2, Vector3};

/// Per-fish kinematic storage.
///
/// Implementations use interior mutability: the observer, the fish and the
/// integrator all hold shared references. Each fish's state is only ever
/// advanced by one integrator call at a time.
pub trait Environment: Send + Sync + 'static {
    /// Size of the (fixed) population.
    fn num_fish(&self) -> usize;

    /// Returns the kinematic state of a fish.
    fn kinematics(&self, id: FishId) -> Result<Kinematics, EnvError>;

    /// Replaces the kinematic state of a fish in one step.
    fn set_kinematics(&self, id: FishId, state: Kinematics) -> Result<(), EnvError>;

    /// Moves a fish without touching its velocities.
    fn set_position(&self, id: FishId, position: Vector3<f64>) -> Result<(), EnvError> {
        let mut state = self.kinematics(id)?;
        state.position = position;
        self.set_kinematics(id, state)
    }

    /// Euclidean distance between two fish (mm).
    fn distance(&self, a: FishId, b: FishId) -> Result<f64, EnvError> {
        let pa = self.kinematics(a)?.position;
        let pb = self.kinematics(b)?.position;
        Ok((pa - pb).norm())
    }
}

/// The observer's view of one fish agent.
///
/// How a fish reacts to its inbox is its own business; the observer only
/// pushes events in and reads state out.
pub trait Fish: Send + Sync + 'static {
    /// Places an event (and its imaginary origin) on the fish's inbox.
    fn enqueue(&self, event: Event, position: Vector2<f64>);

    /// Returns the readable algorithm state.
    fn snapshot(&self) -> FishSnapshot;

    /// Forgets the current leader election (`max_id` and clock back to -1).
    fn reset_leader_election(&self);
}
