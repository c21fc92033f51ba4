//! Observer - the god-like watcher of the swarm.
//!
//! Once per tick the observer:
//! 1. delivers every instruction due on this tick (`deliver_due`)
//! 2. drains the channel's delivered log and scores it (`intercept_and_score`)
//! 3. samples every fish into the state recorder (`sample_state`)
//! 4. advances the clock by exactly one
//!
//! Instructions are scheduled through an [`ObserverHandle`], which may be
//! used from any thread while a tick is running; a new instruction simply
//! becomes visible to the next `deliver_due` pass.

use bluesim_core::{
    FishSample, HopCountTracker, InfoConsistencyTracker, Instruction, InstructionQueue,
    LeaderElectionTracker, StateRecorder, StudyLog, Target, TrackerConfig,
};
use bluesim_env::{
    Channel, EnvError, Environment, Event, Fish, FishId, FishSnapshot, Opcode, Source,
};
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Observer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    /// Ticks per second; must match the fish clock
    pub clock_freq: f64,

    /// Divisor for recorded linear speeds (mm/s)
    pub speed_normalization: f64,

    /// Restore initial fish positions whenever an instruction fires
    pub reset_on_instruction: bool,

    /// Which studies keep finalized samples
    pub tracking: TrackerConfig,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            clock_freq: 1.0,
            speed_normalization: 9.0,
            reset_on_instruction: false,
            tracking: TrackerConfig::default(),
        }
    }
}

impl ObserverConfig {
    pub fn validate(&self) -> Result<(), EnvError> {
        if !(self.clock_freq.is_finite() && self.clock_freq > 0.0) {
            return Err(EnvError::config(format!(
                "clock_freq must be positive, got {}",
                self.clock_freq
            )));
        }
        if !(self.speed_normalization.is_finite() && self.speed_normalization > 0.0) {
            return Err(EnvError::config(format!(
                "speed_normalization must be positive, got {}",
                self.speed_normalization
            )));
        }
        Ok(())
    }

    /// Seconds per tick.
    pub fn period_secs(&self) -> f64 {
        1.0 / self.clock_freq
    }
}

/// State shared between the driver and instruction schedulers.
#[derive(Debug, Default)]
struct Shared {
    queue: Mutex<InstructionQueue>,
    clock: AtomicU64,
    instructed: AtomicBool,
    last_instructed: Mutex<Option<Vector2<f64>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cloneable entry point for scheduling instructions.
pub struct ObserverHandle<E> {
    shared: Arc<Shared>,
    env: Arc<E>,
}

impl<E> Clone for ObserverHandle<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            env: Arc::clone(&self.env),
        }
    }
}

impl<E: Environment> ObserverHandle<E> {
    /// Schedules `event` to fire `delay` ticks from now.
    ///
    /// # Arguments
    /// * `event` - Event to deliver
    /// * `delay` - Ticks relative to the current clock (0 = this tick if not yet delivered)
    /// * `target` - A single fish, every fish, or positional delivery via the channel
    /// * `position` - Imaginary event position; decides reach for positional delivery
    ///
    /// Returns the due tick.
    pub fn instruct(
        &self,
        event: Event,
        delay: u64,
        target: Target,
        position: Vector2<f64>,
    ) -> Result<u64, EnvError> {
        let marker = match target {
            Target::Fish(id) => self.env.kinematics(id)?.position.xy(),
            Target::All | Target::Positional => position,
        };

        let due = self.clock() + delay;
        let mut queue = lock(&self.shared.queue);
        queue.push(Instruction {
            due,
            event,
            target,
            position,
        });

        // Queue guard still held: the marker names the newest queued instruction
        *lock(&self.shared.last_instructed) = Some(marker);
        self.shared.instructed.store(true, Ordering::Release);
        Ok(due)
    }

    /// Current tick.
    pub fn clock(&self) -> u64 {
        self.shared.clock.load(Ordering::Acquire)
    }

    /// Whether any instruction was ever scheduled.
    pub fn is_instructed(&self) -> bool {
        self.shared.instructed.load(Ordering::Acquire)
    }

    /// Location of the most recent instruction (target fish or given position).
    pub fn last_instructed(&self) -> Option<Vector2<f64>> {
        *lock(&self.shared.last_instructed)
    }

    /// Instructions not yet delivered.
    pub fn pending(&self) -> usize {
        lock(&self.shared.queue).len()
    }
}

/// The observation engine.
///
/// Generic over the environment, fish and channel implementations so the
/// same observer drives the reference simulation and any other swarm.
pub struct Observer<E, F, C> {
    config: ObserverConfig,
    env: Arc<E>,
    fish: Vec<Arc<F>>,
    channel: Arc<C>,
    shared: Arc<Shared>,

    /// Positions restored when `reset_on_instruction` is on
    initial_positions: Option<Vec<Vector3<f64>>>,

    info: InfoConsistencyTracker,
    hop_count: HopCountTracker,
    leader: LeaderElectionTracker,
    study: StudyLog,
    recorder: StateRecorder,
}

impl<E, F, C> Observer<E, F, C>
where
    E: Environment,
    F: Fish,
    C: Channel,
{
    /// Creates an observer over a fixed population.
    ///
    /// `fish[i]` must be the fish stored as `FishId(i)` in `env`.
    pub fn new(
        config: ObserverConfig,
        env: Arc<E>,
        fish: Vec<Arc<F>>,
        channel: Arc<C>,
    ) -> Result<Self, EnvError> {
        config.validate()?;
        if fish.len() != env.num_fish() {
            return Err(EnvError::config(format!(
                "{} fish for an environment of {}",
                fish.len(),
                env.num_fish()
            )));
        }

        let recorder =
            StateRecorder::new(fish.len(), config.period_secs(), config.speed_normalization);
        let study = StudyLog::new(config.tracking.clone());

        Ok(Self {
            config,
            env,
            fish,
            channel,
            shared: Arc::new(Shared::default()),
            initial_positions: None,
            info: InfoConsistencyTracker::new(),
            hop_count: HopCountTracker::new(),
            leader: LeaderElectionTracker::new(),
            study,
            recorder,
        })
    }

    /// Remembers the positions to restore on reset.
    pub fn with_initial_positions(mut self, positions: Vec<Vector3<f64>>) -> Self {
        self.initial_positions = Some(positions);
        self
    }

    /// Returns a handle for scheduling instructions.
    pub fn handle(&self) -> ObserverHandle<E> {
        ObserverHandle {
            shared: Arc::clone(&self.shared),
            env: Arc::clone(&self.env),
        }
    }

    pub fn config(&self) -> &ObserverConfig {
        &self.config
    }

    /// Current tick.
    pub fn clock(&self) -> u64 {
        self.shared.clock.load(Ordering::Acquire)
    }

    /// Restore initial positions on every new instruction.
    pub fn activate_reset(&mut self) {
        self.config.reset_on_instruction = true;
    }

    pub fn deactivate_reset(&mut self) {
        self.config.reset_on_instruction = false;
    }

    pub fn recorder(&self) -> &StateRecorder {
        &self.recorder
    }

    pub fn study(&self) -> &StudyLog {
        &self.study
    }

    pub fn info_tracker(&self) -> &InfoConsistencyTracker {
        &self.info
    }

    pub fn hop_count_tracker(&self) -> &HopCountTracker {
        &self.hop_count
    }

    pub fn leader_tracker(&self) -> &LeaderElectionTracker {
        &self.leader
    }

    pub fn is_instructed(&self) -> bool {
        self.shared.instructed.load(Ordering::Acquire)
    }

    pub fn last_instructed(&self) -> Option<Vector2<f64>> {
        *lock(&self.shared.last_instructed)
    }

    fn snapshots(&self) -> Vec<FishSnapshot> {
        self.fish.iter().map(|f| f.snapshot()).collect()
    }

    /// Runs one full tick and returns the new clock value.
    pub fn eval(&mut self) -> u64 {
        self.deliver_due();
        self.intercept_and_score();
        if let Err(e) = self.sample_state() {
            warn!(clock = self.clock(), error = %e, "Skipping state sample");
        }
        self.shared.clock.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Delivers every instruction due on the current tick, in due then
    /// scheduling order. Returns how many were delivered.
    pub fn deliver_due(&mut self) -> usize {
        let clock = self.clock();
        let mut delivered = 0;

        loop {
            // Queue lock is released before dispatching
            let Some(instruction) = lock(&self.shared.queue).pop_due(clock) else {
                break;
            };

            // Any new instruction supersedes a tracked message
            self.finalize_info();

            if self.config.reset_on_instruction {
                self.reset_positions();
            }

            self.dispatch(instruction, clock);
            delivered += 1;
        }

        delivered
    }

    fn dispatch(&mut self, instruction: Instruction, clock: u64) {
        let Instruction {
            event,
            target,
            position,
            ..
        } = instruction;

        // Close previous runs before the fish start reacting to the new one
        match event.opcode {
            Opcode::StartHopCount => self.finalize_hop_count(),
            Opcode::StartLeaderElection => {
                self.finalize_leader();
                for fish in &self.fish {
                    fish.reset_leader_election();
                }
            }
            Opcode::Unknown(code) => {
                debug!(code, clock, "Delivering instruction with unknown opcode")
            }
            _ => {}
        }

        match target {
            Target::Fish(id) => match self.fish.get(id.index()) {
                Some(fish) => fish.enqueue(event.clone(), position),
                None => warn!(%id, clock, "Dropping instruction for unknown fish"),
            },
            Target::All => {
                for fish in &self.fish {
                    fish.enqueue(event.clone(), position);
                }
            }
            Target::Positional => {
                self.channel
                    .transmit(Source::Observer, event.clone(), position, true);
            }
        }

        match event.opcode {
            Opcode::InfoExternal => {
                if let Some(message) = event.tracked_message() {
                    self.info.arm(message, clock);
                }
            }
            Opcode::StartHopCount => self.hop_count.arm(),
            Opcode::StartLeaderElection => self.leader.arm(),
            _ => {}
        }
    }

    /// Drains the channel's delivered log and scores it.
    pub fn intercept_and_score(&mut self) {
        let clock = self.clock();
        let mut saw_info = false;

        for event in self.channel.drain_delivered() {
            match event.opcode {
                Opcode::InfoInternal => saw_info = true,
                Opcode::HopCount => self.hop_count.observe(&event),
                Opcode::LeaderElection => self.leader.observe(),
                Opcode::Unknown(code) => debug!(code, clock, "Ignoring intercepted unknown opcode"),
                _ => {}
            }
        }

        if self.info.record_tick(saw_info, clock) {
            self.finalize_info();
        }
    }

    /// Appends one sample per fish to the state recorder.
    pub fn sample_state(&mut self) -> Result<(), EnvError> {
        let n = self.env.num_fish();
        let mut samples = Vec::with_capacity(n);

        for (i, fish) in self.fish.iter().enumerate() {
            let id = FishId(i);
            let state = self.env.kinematics(id)?;
            let snapshot = fish.snapshot();
            let distances = (0..n)
                .filter(|&j| j != i)
                .map(|j| self.env.distance(id, FishId(j)))
                .collect::<Result<Vec<_>, _>>()?;

            samples.push(FishSample {
                position: state.position,
                orientation: snapshot.orientation,
                speed: snapshot.speed,
                distances,
                neighbor_spacing: snapshot.neighbor_spacing,
            });
        }

        self.recorder.record(&samples);
        Ok(())
    }

    /// Finalizes every tracker still armed. Called when the loop stops.
    pub fn finish(&mut self) {
        self.finalize_info();
        self.finalize_hop_count();
        self.finalize_leader();
    }

    fn finalize_info(&mut self) {
        if !self.info.is_armed() {
            return;
        }
        let snapshots = self.snapshots();
        if let Some(sample) = self.info.finalize(&snapshots) {
            info!(
                "{} out of {} got the message. Max hops: {} (clock {})",
                sample.correct,
                snapshots.len(),
                sample.max_hops,
                self.clock()
            );
            self.study.record_info(sample);
        }
    }

    fn finalize_hop_count(&mut self) {
        if !self.hop_count.is_armed() {
            return;
        }
        let snapshots = self.snapshots();
        if let Some(sample) = self.hop_count.finalize(&snapshots) {
            info!(
                messages = sample.messages,
                hops = ?sample.hops,
                clock = self.clock(),
                "Hop count finalized"
            );
            self.study.record_hop_count(sample);
        }
    }

    fn finalize_leader(&mut self) {
        if !self.leader.is_armed() {
            return;
        }
        let snapshots = self.snapshots();
        if let Some(sample) = self.leader.finalize(&snapshots) {
            info!(
                leaders = ?sample.leaders,
                messages = sample.messages,
                clock = self.clock(),
                "Leader election finalized"
            );
            self.study.record_leader(sample);
        }
    }

    fn reset_positions(&self) {
        let Some(positions) = &self.initial_positions else {
            return;
        };
        for (i, position) in positions.iter().enumerate() {
            if let Err(e) = self.env.set_position(FishId(i), *position) {
                warn!(error = %e, "Failed to reset fish position");
            }
        }
    }
}
