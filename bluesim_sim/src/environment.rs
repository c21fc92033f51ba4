//! Ground-truth kinematic store for simulation.
//!
//! `SimEnvironment` holds the "god's eye view" of every fish: true global
//! position, velocity, heading and angular velocity. The integrator and
//! the observer read and rewrite it every tick.

use bluesim_env::{EnvError, Environment, FishId, Kinematics};
use nalgebra::Vector3;
use std::sync::{PoisonError, RwLock};

/// In-memory [`Environment`] for a fixed population.
#[derive(Debug)]
pub struct SimEnvironment {
    states: RwLock<Vec<Kinematics>>,
}

impl SimEnvironment {
    /// Creates an environment from explicit initial states.
    pub fn new(states: Vec<Kinematics>) -> Self {
        Self {
            states: RwLock::new(states),
        }
    }

    /// Places `num_fish` at rest on a square grid in the z = 0 plane.
    pub fn grid(num_fish: usize, spacing_mm: f64) -> Self {
        let cols = (num_fish as f64).sqrt().ceil().max(1.0) as usize;
        let states = (0..num_fish)
            .map(|i| {
                let position = Vector3::new(
                    (i % cols) as f64 * spacing_mm,
                    (i / cols) as f64 * spacing_mm,
                    0.0,
                );
                Kinematics::at_rest(position, 0.0)
            })
            .collect();
        Self::new(states)
    }

    /// Current positions of every fish, in fish order.
    pub fn positions(&self) -> Vec<Vector3<f64>> {
        self.read().iter().map(|k| k.position).collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Kinematics>> {
        self.states.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Environment for SimEnvironment {
    fn num_fish(&self) -> usize {
        self.read().len()
    }

    fn kinematics(&self, id: FishId) -> Result<Kinematics, EnvError> {
        self.read()
            .get(id.index())
            .copied()
            .ok_or(EnvError::UnknownFish(id))
    }

    fn set_kinematics(&self, id: FishId, state: Kinematics) -> Result<(), EnvError> {
        let mut states = self.states.write().unwrap_or_else(PoisonError::into_inner);
        let slot = states.get_mut(id.index()).ok_or(EnvError::UnknownFish(id))?;
        *slot = state;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_layout() {
        let env = SimEnvironment::grid(5, 100.0);
        assert_eq!(env.num_fish(), 5);

        let positions = env.positions();
        // 3 columns for 5 fish
        assert_eq!(positions[2], Vector3::new(200.0, 0.0, 0.0));
        assert_eq!(positions[3], Vector3::new(0.0, 100.0, 0.0));
    }

    #[test]
    fn test_distance_and_unknown_fish() {
        let env = SimEnvironment::grid(2, 300.0);
        assert!((env.distance(FishId(0), FishId(1)).unwrap() - 300.0).abs() < 1e-9);

        assert!(matches!(
            env.kinematics(FishId(7)),
            Err(EnvError::UnknownFish(FishId(7)))
        ));
        assert!(env.set_position(FishId(7), Vector3::zeros()).is_err());
    }

    #[test]
    fn test_set_position_keeps_velocity() {
        let env = SimEnvironment::grid(1, 0.0);
        let mut state = env.kinematics(FishId(0)).unwrap();
        state.velocity = Vector3::new(1.0, 2.0, 3.0);
        env.set_kinematics(FishId(0), state).unwrap();

        env.set_position(FishId(0), Vector3::new(5.0, 5.0, 5.0)).unwrap();
        let moved = env.kinematics(FishId(0)).unwrap();
        assert_eq!(moved.position, Vector3::new(5.0, 5.0, 5.0));
        assert_eq!(moved.velocity, Vector3::new(1.0, 2.0, 3.0));
    }
}
