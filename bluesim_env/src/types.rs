//! Common types shared by the observer, the fish and the environment.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Index of a fish in the swarm.
///
/// The population is fixed at start, so ids are dense `0..num_fish`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FishId(pub usize);

impl FishId {
    /// Returns the id as a slice index.
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for FishId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fish#{}", self.0)
    }
}

/// Kinematic state of one fish in the global frame.
///
/// Position and velocity are kept in millimetres; heading and angular
/// velocity in radians. Written back as a whole value so readers never
/// observe a position from one tick paired with a velocity from another.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Kinematics {
    /// Position [x, y, z] in mm
    pub position: Vector3<f64>,

    /// Velocity [vx, vy, vz] in mm/s
    pub velocity: Vector3<f64>,

    /// Heading φ in rad
    pub phi: f64,

    /// Angular velocity in rad/s
    pub vphi: f64,
}

impl Kinematics {
    /// Creates a fish at rest at the given position and heading.
    pub fn at_rest(position: Vector3<f64>, phi: f64) -> Self {
        Self {
            position,
            velocity: Vector3::zeros(),
            phi,
            vphi: 0.0,
        }
    }
}

impl Default for Kinematics {
    fn default() -> Self {
        Self::at_rest(Vector3::zeros(), 0.0)
    }
}

/// Read-only view of a fish's algorithm state at one instant.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FishSnapshot {
    /// Heading as believed by the fish (rad)
    pub orientation: f64,

    /// Current speed, if the fish has computed one yet
    pub speed: Option<f64>,

    /// Peers currently sensed
    pub neighbors: Vec<FishId>,

    /// Distance to each sensed neighbour
    pub neighbor_spacing: Vec<f64>,

    /// Currently held information message
    pub info: Option<String>,

    /// Hop depth at which `info` was received
    pub info_hops: u32,

    /// Local hop counter
    pub hop_count: u32,

    /// Largest id seen in the current leader election (-1 = none)
    pub leader_election_max_id: i64,

    /// Clock of the last leader election message (-1 = none)
    pub last_leader_election_clock: i64,
}
