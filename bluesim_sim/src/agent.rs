//! SimFish - a minimal flooding agent for driving the observer.
//!
//! Real fish behaviour lives outside this workspace. `SimFish` implements
//! just enough of each algorithm for the trackers to have something to
//! measure:
//! - **Info**: adopt the first message heard, relay it once with hops + 1
//! - **Hop count**: the started fish is the source; every fish relays the
//!   first hop count it hears per run, and the source keeps the deepest echo
//! - **Leader election**: flood the largest id seen

use bluesim_core::{Dynamics, FinControl};
use bluesim_env::{
    Channel, EnvError, Environment, Event, Fish, FishId, FishSnapshot, Opcode, Payload, Source,
};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Behaviour parameters shared by every SimFish.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FishConfig {
    /// Peers closer than this count as neighbours (mm)
    pub sensing_range_mm: f64,

    /// Constant caudal gain while cruising
    pub cruise_caudal: f64,

    /// Dorsal gain holding depth against the buoyancy offset
    pub dorsal_trim: f64,
}

impl Default for FishConfig {
    fn default() -> Self {
        Self {
            sensing_range_mm: 700.0,
            cruise_caudal: 0.3,
            dorsal_trim: 0.5,
        }
    }
}

#[derive(Debug)]
struct FishState {
    inbox: VecDeque<(Event, Vector2<f64>)>,
    orientation: f64,
    speed: Option<f64>,
    neighbors: Vec<FishId>,
    neighbor_spacing: Vec<f64>,
    info: Option<String>,
    info_hops: u32,
    hop_count: u32,
    /// Hop-count run this fish last joined
    hop_run: Option<u64>,
    is_hop_source: bool,
    leader_election_max_id: i64,
    last_leader_election_clock: i64,
}

impl Default for FishState {
    fn default() -> Self {
        Self {
            inbox: VecDeque::new(),
            orientation: 0.0,
            speed: None,
            neighbors: Vec::new(),
            neighbor_spacing: Vec::new(),
            info: None,
            info_hops: 0,
            hop_count: 0,
            hop_run: None,
            is_hop_source: false,
            leader_election_max_id: -1,
            last_leader_election_clock: -1,
        }
    }
}

/// A simulated fish with an inbox and flooding behaviour.
#[derive(Debug)]
pub struct SimFish {
    id: FishId,
    state: Mutex<FishState>,
}

impl SimFish {
    pub fn new(id: FishId) -> Self {
        Self {
            id,
            state: Mutex::new(FishState::default()),
        }
    }

    pub fn id(&self) -> FishId {
        self.id
    }

    /// Events waiting in the inbox.
    pub fn pending(&self) -> usize {
        self.lock().inbox.len()
    }

    fn lock(&self) -> MutexGuard<'_, FishState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// One behaviour step: sense neighbours, handle the inbox, swim.
    pub fn tick<E, C>(
        &self,
        env: &E,
        channel: &C,
        dynamics: &Dynamics,
        config: &FishConfig,
        clock: u64,
    ) -> Result<(), EnvError>
    where
        E: Environment + ?Sized,
        C: Channel + ?Sized,
    {
        let here = env.kinematics(self.id)?.position.xy();

        let mut neighbors = Vec::new();
        let mut spacing = Vec::new();
        for other in (0..env.num_fish()).map(FishId).filter(|&j| j != self.id) {
            let d = env.distance(self.id, other)?;
            if d <= config.sensing_range_mm {
                neighbors.push(other);
                spacing.push(d);
            }
        }

        // Handle the inbox without holding the lock across transmissions
        let outgoing: Vec<Event> = {
            let mut state = self.lock();
            state.neighbors = neighbors;
            state.neighbor_spacing = spacing;
            let inbox: Vec<_> = state.inbox.drain(..).collect();
            inbox
                .iter()
                .filter_map(|(event, _)| self.react(&mut state, event, clock))
                .collect()
        };
        for event in outgoing {
            channel.transmit(Source::Fish(self.id), event, here, false);
        }

        let control = FinControl::new(config.dorsal_trim, config.cruise_caudal, 0.0, 0.0);
        dynamics.advance(env, self.id, &control)?;

        let after = env.kinematics(self.id)?;
        let mut state = self.lock();
        state.orientation = after.phi;
        state.speed = Some(after.velocity.norm());
        Ok(())
    }

    /// Updates local state for one event; returns the event to relay, if any.
    fn react(&self, state: &mut FishState, event: &Event, clock: u64) -> Option<Event> {
        match (event.opcode, &event.payload) {
            (Opcode::InfoExternal | Opcode::InfoInternal, Payload::Info { message, hops, .. }) => {
                if state.info.as_deref() == Some(message.as_str()) {
                    return None;
                }
                state.info = Some(message.clone());
                state.info_hops = *hops;
                Some(Event::info_internal(self.id, message.clone(), hops + 1))
            }
            (Opcode::StartHopCount, _) => {
                state.hop_run = Some(clock);
                state.is_hop_source = true;
                state.hop_count = 0;
                Some(Event::hop_count(self.id, 1, clock))
            }
            (Opcode::HopCount, Payload::Hops { hops, run }) => match state.hop_run {
                // Stragglers from an older run
                Some(current) if *run < current => None,
                Some(current) if *run == current => {
                    if state.is_hop_source {
                        state.hop_count = state.hop_count.max(*hops);
                    }
                    None
                }
                _ => {
                    state.hop_run = Some(*run);
                    state.is_hop_source = false;
                    state.hop_count = *hops;
                    Some(Event::hop_count(self.id, hops + 1, *run))
                }
            },
            (Opcode::StartLeaderElection, _) => {
                state.leader_election_max_id = self.id.index() as i64;
                state.last_leader_election_clock = clock as i64;
                Some(Event::leader_election(
                    self.id,
                    state.leader_election_max_id,
                    clock as i64,
                ))
            }
            (Opcode::LeaderElection, Payload::Leader { max_id, .. }) => {
                // Late joiners enter with their own id
                let own = state.leader_election_max_id.max(self.id.index() as i64);
                state.last_leader_election_clock = clock as i64;
                if *max_id > own {
                    state.leader_election_max_id = *max_id;
                    Some(Event::leader_election(self.id, *max_id, clock as i64))
                } else if state.leader_election_max_id < own {
                    state.leader_election_max_id = own;
                    Some(Event::leader_election(self.id, own, clock as i64))
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

impl Fish for SimFish {
    fn enqueue(&self, event: Event, position: Vector2<f64>) {
        self.lock().inbox.push_back((event, position));
    }

    fn snapshot(&self) -> FishSnapshot {
        let state = self.lock();
        FishSnapshot {
            orientation: state.orientation,
            speed: state.speed,
            neighbors: state.neighbors.clone(),
            neighbor_spacing: state.neighbor_spacing.clone(),
            info: state.info.clone(),
            info_hops: state.info_hops,
            hop_count: state.hop_count,
            leader_election_max_id: state.leader_election_max_id,
            last_leader_election_clock: state.last_leader_election_clock,
        }
    }

    fn reset_leader_election(&self) {
        let mut state = self.lock();
        state.leader_election_max_id = -1;
        state.last_leader_election_clock = -1;
    }
}
