//! BlueSim Core - observation engines for an underwater fish swarm
//!
//! This library holds the pure, I/O-free parts of the observer:
//! 1. **Dynamics**: sub-stepped Euler integration of fin thrust, drag and buoyancy
//! 2. **Instructions**: a tick-keyed queue with stable same-tick ordering
//! 3. **Tracking**: state machines scoring info spread, hop count and leader election
//! 4. **Recording**: per-tick trajectories and swarm statistics

pub mod dynamics;
pub mod instructions;
pub mod recorder;
pub mod trackers;

// Re-export key types for convenience
pub use dynamics::{Dynamics, DynamicsConfig, FinControl, Thrust};
pub use instructions::{Instruction, InstructionQueue, Target};
pub use recorder::{FishSample, FishTrack, StateRecorder};
pub use trackers::{
    HopCountSample, HopCountTracker, InfoConsistencyTracker, InfoSample, LeaderElectionTracker,
    LeaderSample, StudyLog, TrackerConfig, TrackerPhase, INFO_MISS_LIMIT,
};
