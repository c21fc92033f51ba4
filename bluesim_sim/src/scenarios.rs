//! Study scenarios: which instructions get scheduled, and when.

use crate::observer::ObserverHandle;
use bluesim_core::{Target, TrackerConfig};
use bluesim_env::{EnvError, Environment, Event, FishId, Opcode};
use nalgebra::Vector2;

/// Ticks between two consecutive runs of a study.
pub const ROUND_INTERVAL: u64 = 20;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// Tracked messages injected at rotating fish
    InfoSpread,

    /// Hop-count runs started at rotating fish
    HopCount,

    /// Repeated leader elections across the whole swarm
    LeaderElection,

    /// All three studies, one after the other
    Mixed,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::InfoSpread,
            ScenarioId::HopCount,
            ScenarioId::LeaderElection,
            ScenarioId::Mixed,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::InfoSpread => "info_spread",
            ScenarioId::HopCount => "hop_count",
            ScenarioId::LeaderElection => "leader_election",
            ScenarioId::Mixed => "mixed",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::InfoSpread => {
                "Inject tracked messages and count the fish that end up holding them"
            }
            ScenarioId::HopCount => "Start hop counts and record messages spent and hops reported",
            ScenarioId::LeaderElection => {
                "Restart leader elections and record the leader each fish settles on"
            }
            ScenarioId::Mixed => "Rotate through info spread, hop count and leader election",
        }
    }

    /// Studies recorded by this scenario.
    pub fn tracking(&self) -> TrackerConfig {
        match self {
            ScenarioId::InfoSpread => TrackerConfig {
                study_info_consistency: true,
                ..Default::default()
            },
            ScenarioId::HopCount => TrackerConfig {
                study_hop_count: true,
                ..Default::default()
            },
            ScenarioId::LeaderElection => TrackerConfig {
                study_leader_election: true,
                ..Default::default()
            },
            ScenarioId::Mixed => TrackerConfig::all(),
        }
    }

    /// Schedules every round that fits in `total_ticks`, starting on tick 1.
    ///
    /// Returns the number of instructions scheduled.
    pub fn schedule<E: Environment>(
        &self,
        handle: &ObserverHandle<E>,
        num_fish: usize,
        total_ticks: u64,
    ) -> Result<usize, EnvError> {
        if num_fish == 0 {
            return Ok(0);
        }

        let mut scheduled = 0;
        for (round, delay) in (1..total_ticks).step_by(ROUND_INTERVAL as usize).enumerate() {
            let target = FishId(round % num_fish);
            let (event, target) = match self.round_kind(round) {
                Opcode::InfoExternal => (
                    Event::info_external(format!("message-{round}"), true),
                    Target::Fish(target),
                ),
                Opcode::StartHopCount => (Event::new(Opcode::StartHopCount), Target::Fish(target)),
                _ => (Event::new(Opcode::StartLeaderElection), Target::All),
            };
            handle.instruct(event, delay, target, Vector2::zeros())?;
            scheduled += 1;
        }
        Ok(scheduled)
    }

    fn round_kind(&self, round: usize) -> Opcode {
        match self {
            ScenarioId::InfoSpread => Opcode::InfoExternal,
            ScenarioId::HopCount => Opcode::StartHopCount,
            ScenarioId::LeaderElection => Opcode::StartLeaderElection,
            ScenarioId::Mixed => match round % 3 {
                0 => Opcode::InfoExternal,
                1 => Opcode::StartHopCount,
                _ => Opcode::StartLeaderElection,
            },
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info_spread" | "infospread" | "info" => Ok(ScenarioId::InfoSpread),
            "hop_count" | "hopcount" | "hops" => Ok(ScenarioId::HopCount),
            "leader_election" | "leaderelection" | "leader" => Ok(ScenarioId::LeaderElection),
            "mixed" | "all" => Ok(ScenarioId::Mixed),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{SimConfig, SimWorld};
    use proptest::prelude::*;

    #[test]
    fn test_names_round_trip() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
        }
        assert_eq!("LEADER".parse::<ScenarioId>(), Ok(ScenarioId::LeaderElection));
        assert!("byzantine".parse::<ScenarioId>().is_err());
    }

    #[test]
    fn test_descriptions_are_distinct() {
        let descriptions: std::collections::HashSet<_> =
            ScenarioId::all().iter().map(|s| s.description()).collect();
        assert_eq!(descriptions.len(), ScenarioId::all().len());
        assert!(descriptions.iter().all(|d| !d.is_empty()));
    }

    #[test]
    fn test_tracking_matches_scenario() {
        assert!(ScenarioId::InfoSpread.tracking().study_info_consistency);
        assert!(!ScenarioId::InfoSpread.tracking().study_hop_count);
        assert!(ScenarioId::HopCount.tracking().study_hop_count);
        assert!(ScenarioId::LeaderElection.tracking().study_leader_election);
        assert_eq!(ScenarioId::Mixed.tracking(), TrackerConfig::all());
    }

    #[test]
    fn test_rounds_fit_in_run() {
        let world = SimWorld::new(SimConfig::default()).unwrap();
        let handle = world.handle();

        // Rounds start on ticks 1, 21, 41
        let scheduled = ScenarioId::Mixed.schedule(&handle, 7, 60).unwrap();
        assert_eq!(scheduled, 3);
        assert_eq!(handle.pending(), 3);
        assert!(handle.is_instructed());
    }

    #[test]
    fn test_short_run_schedules_nothing() {
        let world = SimWorld::new(SimConfig::default()).unwrap();
        let handle = world.handle();

        assert_eq!(ScenarioId::HopCount.schedule(&handle, 7, 1).unwrap(), 0);
        assert!(!handle.is_instructed());
    }

    proptest! {
        #[test]
        fn prop_one_instruction_per_round(total_ticks in 0u64..400, num_fish in 1usize..8) {
            let world = SimWorld::new(SimConfig::default()).unwrap();
            let handle = world.handle();

            let scheduled = ScenarioId::Mixed.schedule(&handle, num_fish, total_ticks).unwrap();
            let expected = total_ticks.saturating_sub(1).div_ceil(ROUND_INTERVAL) as usize;
            prop_assert_eq!(scheduled, expected);
            prop_assert_eq!(handle.pending(), expected);
        }
    }
}
