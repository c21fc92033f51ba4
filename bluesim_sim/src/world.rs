//! SimWorld - The simulation harness container.
//!
//! Wires the reference collaborators (environment, fish, channel,
//! integrator) to an [`Observer`]. The world can be stepped in lockstep
//! (fish then observer, one tick at a time) or split into a [`Swarm`] and
//! an observer for the real-time runner.

use crate::agent::{FishConfig, SimFish};
use crate::environment::SimEnvironment;
use crate::network::{ChannelConfig, SimChannel};
use crate::observer::{Observer, ObserverConfig, ObserverHandle};

use bluesim_core::{Dynamics, DynamicsConfig};
use bluesim_env::{EnvError, FishId};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Channel over the reference population.
pub type SimFishChannel = SimChannel<SimEnvironment, SimFish>;

/// Observer over the reference population.
pub type SimObserver = Observer<SimEnvironment, SimFish, SimFishChannel>;

/// Configuration for a simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Number of fish to spawn
    pub num_fish: usize,

    /// Tick rate in Hz, shared by the observer, the fish and the integrator
    pub clock_freq: f64,

    /// Run length in seconds
    pub duration_secs: f64,

    /// Grid spacing of the initial formation (mm)
    pub spawn_spacing_mm: f64,

    pub channel: ChannelConfig,
    pub fish: FishConfig,
    pub observer: ObserverConfig,
    pub dynamics: DynamicsConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            num_fish: 7,
            clock_freq: 1.0,
            duration_secs: 60.0,
            spawn_spacing_mm: 400.0,
            channel: ChannelConfig::default(),
            fish: FishConfig::default(),
            observer: ObserverConfig::default(),
            dynamics: DynamicsConfig::default(),
        }
    }
}

impl SimConfig {
    /// Parses a JSON config; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, EnvError> {
        serde_json::from_str(json).map_err(EnvError::serialization)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, EnvError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), EnvError> {
        if self.num_fish == 0 {
            return Err(EnvError::config("num_fish must be at least 1"));
        }
        if !(self.clock_freq.is_finite() && self.clock_freq > 0.0) {
            return Err(EnvError::config(format!(
                "clock_freq must be positive, got {}",
                self.clock_freq
            )));
        }
        if !(self.duration_secs.is_finite() && self.duration_secs >= 0.0) {
            return Err(EnvError::config(format!(
                "duration_secs must be non-negative, got {}",
                self.duration_secs
            )));
        }
        self.observer_config().validate()?;
        self.dynamics_config().validate()
    }

    /// Ticks in a full run.
    pub fn total_ticks(&self) -> u64 {
        (self.duration_secs * self.clock_freq).round() as u64
    }

    /// Observer settings with the shared tick rate applied.
    pub fn observer_config(&self) -> ObserverConfig {
        ObserverConfig {
            clock_freq: self.clock_freq,
            ..self.observer.clone()
        }
    }

    /// Integrator settings with the shared tick rate applied.
    pub fn dynamics_config(&self) -> DynamicsConfig {
        DynamicsConfig {
            clock_freq: self.clock_freq,
            ..self.dynamics.clone()
        }
    }
}

/// The fish side of the simulation: everything that acts, as opposed to
/// the observer that watches.
pub struct Swarm {
    env: Arc<SimEnvironment>,
    fish: Vec<Arc<SimFish>>,
    channel: Arc<SimFishChannel>,
    dynamics: Dynamics,
    fish_config: FishConfig,
}

impl Swarm {
    pub fn env(&self) -> &Arc<SimEnvironment> {
        &self.env
    }

    pub fn fish(&self) -> &[Arc<SimFish>] {
        &self.fish
    }

    pub fn channel(&self) -> &Arc<SimFishChannel> {
        &self.channel
    }

    /// One behaviour step for every fish, in id order.
    pub fn tick(&self, clock: u64) -> Result<(), EnvError> {
        for fish in &self.fish {
            fish.tick(
                self.env.as_ref(),
                self.channel.as_ref(),
                &self.dynamics,
                &self.fish_config,
                clock,
            )?;
        }
        Ok(())
    }
}

/// The SimWorld - container for the entire simulation.
pub struct SimWorld {
    config: SimConfig,
    swarm: Arc<Swarm>,
    observer: SimObserver,
}

impl SimWorld {
    /// Spawns the population on a grid and builds the observer over it.
    pub fn new(config: SimConfig) -> Result<Self, EnvError> {
        config.validate()?;

        let env = Arc::new(SimEnvironment::grid(config.num_fish, config.spawn_spacing_mm));
        let fish: Vec<Arc<SimFish>> = (0..config.num_fish)
            .map(|i| Arc::new(SimFish::new(FishId(i))))
            .collect();
        let channel = Arc::new(SimChannel::new(
            config.channel.clone(),
            Arc::clone(&env),
            fish.clone(),
            config.seed,
        ));
        let dynamics = Dynamics::new(config.dynamics_config())?;

        let observer = Observer::new(
            config.observer_config(),
            Arc::clone(&env),
            fish.clone(),
            Arc::clone(&channel),
        )?
        .with_initial_positions(env.positions());

        let swarm = Arc::new(Swarm {
            env,
            fish,
            channel,
            dynamics,
            fish_config: config.fish.clone(),
        });

        Ok(Self {
            config,
            swarm,
            observer,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn swarm(&self) -> &Arc<Swarm> {
        &self.swarm
    }

    pub fn observer(&self) -> &SimObserver {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut SimObserver {
        &mut self.observer
    }

    /// Handle for scheduling instructions.
    pub fn handle(&self) -> ObserverHandle<SimEnvironment> {
        self.observer.handle()
    }

    /// Current tick.
    pub fn clock(&self) -> u64 {
        self.observer.clock()
    }

    /// Advances the simulation by one tick: the fish act, then the
    /// observer delivers, intercepts and samples. Returns the new clock.
    pub fn step(&mut self) -> Result<u64, EnvError> {
        self.swarm.tick(self.observer.clock())?;
        Ok(self.observer.eval())
    }

    /// Steps `ticks` times.
    pub fn run(&mut self, ticks: u64) -> Result<u64, EnvError> {
        for _ in 0..ticks {
            self.step()?;
        }
        Ok(self.clock())
    }

    /// Flushes the trackers and returns the observer.
    pub fn finish(mut self) -> SimObserver {
        self.observer.finish();
        self.observer
    }

    /// Splits the world for the real-time runner.
    pub fn into_parts(self) -> (Arc<Swarm>, SimObserver) {
        (self.swarm, self.observer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluesim_env::Environment;

    #[test]
    fn test_sim_world_creation() {
        let config = SimConfig {
            num_fish: 5,
            ..Default::default()
        };
        let world = SimWorld::new(config).unwrap();

        assert_eq!(world.clock(), 0);
        assert_eq!(world.swarm().fish().len(), 5);
        assert_eq!(world.swarm().env().num_fish(), 5);
    }

    #[test]
    fn test_clock_freq_shared() {
        let config = SimConfig {
            clock_freq: 4.0,
            ..Default::default()
        };

        assert_eq!(config.observer_config().clock_freq, 4.0);
        assert_eq!(config.dynamics_config().clock_freq, 4.0);
        assert_eq!(config.total_ticks(), 240);
    }

    #[test]
    fn test_step_moves_fish() {
        let config = SimConfig {
            num_fish: 2,
            ..Default::default()
        };
        let mut world = SimWorld::new(config).unwrap();
        let start = world.swarm().env().positions();

        assert_eq!(world.run(3).unwrap(), 3);

        let after = world.swarm().env().positions();
        assert!(after[0].x > start[0].x);
        assert!(after[1].x > start[1].x);
        assert_eq!(world.observer().recorder().len(), 3);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{"num_fish": 3, "channel": {"loss_rate": 0.5}}"#;
        let config = SimConfig::from_json_str(json).unwrap();

        assert_eq!(config.num_fish, 3);
        assert_eq!(config.channel.loss_rate, 0.5);
        assert_eq!(config.channel.range_mm, ChannelConfig::default().range_mm);
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn test_malformed_json_rejected() {
        let result = SimConfig::from_json_str("{ not json");
        assert!(matches!(result, Err(EnvError::Serialization(_))));
    }

    #[test]
    fn test_empty_population_rejected() {
        let config = SimConfig {
            num_fish: 0,
            ..Default::default()
        };
        assert!(matches!(SimWorld::new(config), Err(EnvError::InvalidConfig(_))));
    }
}
