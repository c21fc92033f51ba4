//! The "TRACKING" Engine - algorithm-correctness trackers
//!
//! Three independent state machines follow one in-flight distributed
//! computation each:
//! - **Info consistency**: how many fish ended up holding a tracked message
//! - **Hop count**: messages spent and hops reported by the source fish
//! - **Leader election**: the leader each fish settled on and messages spent
//!
//! Each tracker goes `Idle → Armed → (finalize) → Idle`. Info consistency
//! finalizes on its own after [`INFO_MISS_LIMIT`] consecutive quiet ticks;
//! hop count and leader election only finalize when superseded by a new
//! start or when the observer stops.

use bluesim_env::{Event, FishId, FishSnapshot};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Consecutive ticks without relayed info before a tracked message is
/// considered fully propagated. One quiet tick is tolerated as jitter.
pub const INFO_MISS_LIMIT: u32 = 2;

/// Which studies record finalized samples.
///
/// Trackers arm and finalize regardless; the flags only decide whether the
/// sample lands in the [`StudyLog`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub study_info_consistency: bool,
    pub study_hop_count: bool,
    pub study_leader_election: bool,
}

impl TrackerConfig {
    /// Enables every study.
    pub fn all() -> Self {
        Self {
            study_info_consistency: true,
            study_hop_count: true,
            study_leader_election: true,
        }
    }
}

/// Lifecycle of a supersede-only tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackerPhase {
    #[default]
    Idle,
    Armed,
}

// =============================================================================
// SAMPLES
// =============================================================================

/// Outcome of one information-dissemination run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoSample {
    /// Fish holding the tracked message
    pub correct: usize,
    /// Deepest hop among those fish
    pub max_hops: u32,
}

/// Outcome of one hop-count run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopCountSample {
    /// Hop-count messages seen on the channel
    pub messages: u64,
    /// Hop count held by the source fish; `None` if no source was ever seen
    pub hops: Option<u32>,
}

/// Outcome of one leader election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderSample {
    /// Leader id believed by each fish, in fish order
    pub leaders: Vec<i64>,
    /// Leader-election messages seen on the channel
    pub messages: u64,
}

/// Finalized samples per study.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudyLog {
    #[serde(skip)]
    config: TrackerConfig,
    pub info: Vec<InfoSample>,
    pub hop_count: Vec<HopCountSample>,
    pub leader: Vec<LeaderSample>,
}

impl StudyLog {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn record_info(&mut self, sample: InfoSample) {
        if self.config.study_info_consistency {
            self.info.push(sample);
        }
    }

    pub fn record_hop_count(&mut self, sample: HopCountSample) {
        if self.config.study_hop_count {
            self.hop_count.push(sample);
        }
    }

    pub fn record_leader(&mut self, sample: LeaderSample) {
        if self.config.study_leader_election {
            self.leader.push(sample);
        }
    }

    /// Total number of samples across all studies.
    pub fn len(&self) -> usize {
        self.info.len() + self.hop_count.len() + self.leader.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for StudyLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.config.study_info_consistency {
            let correct: Vec<usize> = self.info.iter().map(|s| s.correct).collect();
            let hops: Vec<u32> = self.info.iter().map(|s| s.max_hops).collect();
            writeln!(f, "Num. Fish with Correct Info: {correct:?}")?;
            writeln!(f, "Num. Hops: {hops:?}")?;
        }
        if self.config.study_hop_count {
            let messages: Vec<u64> = self.hop_count.iter().map(|s| s.messages).collect();
            let hops: Vec<Option<u32>> = self.hop_count.iter().map(|s| s.hops).collect();
            writeln!(f, "Num. Messages: {messages:?}")?;
            writeln!(f, "Num. Hops: {hops:?}")?;
        }
        if self.config.study_leader_election {
            let leaders: Vec<&Vec<i64>> = self.leader.iter().map(|s| &s.leaders).collect();
            let messages: Vec<u64> = self.leader.iter().map(|s| s.messages).collect();
            writeln!(f, "Leader: {leaders:?}")?;
            writeln!(f, "Num. Messages: {messages:?}")?;
        }
        Ok(())
    }
}

// =============================================================================
// INFO CONSISTENCY
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
enum InfoPhase {
    #[default]
    Idle,
    Armed {
        message: String,
        misses: u32,
        armed_at: u64,
    },
}

/// Follows one tracked message until relaying stops.
#[derive(Debug, Clone, Default)]
pub struct InfoConsistencyTracker {
    phase: InfoPhase,
}

impl InfoConsistencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `message` from tick `clock`.
    pub fn arm(&mut self, message: impl Into<String>, clock: u64) {
        self.phase = InfoPhase::Armed {
            message: message.into(),
            misses: 0,
            armed_at: clock,
        };
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.phase, InfoPhase::Armed { .. })
    }

    pub fn tracked_message(&self) -> Option<&str> {
        match &self.phase {
            InfoPhase::Armed { message, .. } => Some(message),
            InfoPhase::Idle => None,
        }
    }

    /// Consecutive quiet ticks so far (0 when idle).
    pub fn misses(&self) -> u32 {
        match &self.phase {
            InfoPhase::Armed { misses, .. } => *misses,
            InfoPhase::Idle => 0,
        }
    }

    /// Scores one intercepted tick. Returns `true` when the run is complete
    /// and should be finalized now.
    ///
    /// The tick on which tracking was armed is not scored: fish have not had
    /// a chance to relay yet.
    pub fn record_tick(&mut self, saw_info: bool, clock: u64) -> bool {
        let InfoPhase::Armed { misses, armed_at, .. } = &mut self.phase else {
            return false;
        };
        if *armed_at == clock {
            return false;
        }

        if saw_info {
            *misses = 0;
        } else {
            *misses += 1;
        }
        *misses >= INFO_MISS_LIMIT
    }

    /// Scores the tracked message against every fish and returns to idle.
    pub fn finalize(&mut self, fish: &[FishSnapshot]) -> Option<InfoSample> {
        let InfoPhase::Armed { message, .. } = std::mem::take(&mut self.phase) else {
            return None;
        };

        let mut correct = 0;
        let mut max_hops = 0;
        for f in fish.iter().filter(|f| f.info.as_deref() == Some(message.as_str())) {
            correct += 1;
            max_hops = max_hops.max(f.info_hops);
        }

        Some(InfoSample { correct, max_hops })
    }
}

// =============================================================================
// HOP COUNT
// =============================================================================

/// Counts hop-count traffic and remembers which fish started the run.
#[derive(Debug, Clone, Default)]
pub struct HopCountTracker {
    phase: TrackerPhase,
    event_count: u64,
    source_pending: bool,
    /// Survives re-arming; a run that never sees traffic reports the old one
    source: Option<FishId>,
}

impl HopCountTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> TrackerPhase {
        self.phase
    }

    pub fn is_armed(&self) -> bool {
        self.phase == TrackerPhase::Armed
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    pub fn source(&self) -> Option<FishId> {
        self.source
    }

    /// Starts a fresh run. Finalize any armed run first.
    pub fn arm(&mut self) {
        self.phase = TrackerPhase::Armed;
        self.event_count = 0;
        self.source_pending = true;
    }

    /// Scores one intercepted hop-count event.
    pub fn observe(&mut self, event: &Event) {
        if !self.is_armed() {
            return;
        }
        if self.source_pending {
            if let Some(source) = event.source_id {
                self.source = Some(source);
            }
            self.source_pending = false;
        }
        self.event_count += 1;
    }

    /// Closes the armed run, if any.
    pub fn finalize(&mut self, fish: &[FishSnapshot]) -> Option<HopCountSample> {
        if !self.is_armed() {
            return None;
        }
        self.phase = TrackerPhase::Idle;
        self.source_pending = false;

        let hops = self
            .source
            .and_then(|id| fish.get(id.index()))
            .map(|f| f.hop_count);
        Some(HopCountSample {
            messages: self.event_count,
            hops,
        })
    }
}

// =============================================================================
// LEADER ELECTION
// =============================================================================

/// Counts leader-election traffic for the current election.
#[derive(Debug, Clone, Default)]
pub struct LeaderElectionTracker {
    phase: TrackerPhase,
    event_count: u64,
}

impl LeaderElectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> TrackerPhase {
        self.phase
    }

    pub fn is_armed(&self) -> bool {
        self.phase == TrackerPhase::Armed
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    /// Starts a fresh election. Finalize any armed one first.
    pub fn arm(&mut self) {
        self.phase = TrackerPhase::Armed;
        self.event_count = 0;
    }

    /// Scores one intercepted leader-election event.
    pub fn observe(&mut self) {
        if self.is_armed() {
            self.event_count += 1;
        }
    }

    /// Closes the armed election, if any.
    pub fn finalize(&mut self, fish: &[FishSnapshot]) -> Option<LeaderSample> {
        if !self.is_armed() {
            return None;
        }
        self.phase = TrackerPhase::Idle;

        Some(LeaderSample {
            leaders: fish.iter().map(|f| f.leader_election_max_id).collect(),
            messages: self.event_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fish_with_info(infos: &[(Option<&str>, u32)]) -> Vec<FishSnapshot> {
        infos
            .iter()
            .map(|(info, hops)| FishSnapshot {
                info: info.map(str::to_string),
                info_hops: *hops,
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_info_one_miss_tolerated() {
        let mut tracker = InfoConsistencyTracker::new();
        tracker.arm("north", 9);

        assert!(!tracker.record_tick(false, 9)); // arming tick not scored
        assert!(!tracker.record_tick(true, 10));
        assert!(!tracker.record_tick(false, 11));
        assert_eq!(tracker.misses(), 1);
        assert!(!tracker.record_tick(true, 12));
        assert_eq!(tracker.misses(), 0);
        assert!(!tracker.record_tick(false, 13));
        assert!(tracker.record_tick(false, 14));
    }

    #[test]
    fn test_info_idle_never_finalizes() {
        let mut tracker = InfoConsistencyTracker::new();
        for clock in 0..10 {
            assert!(!tracker.record_tick(false, clock));
        }
        assert!(tracker.finalize(&[]).is_none());
    }

    #[test]
    fn test_info_finalize_counts_matching_fish() {
        let mut tracker = InfoConsistencyTracker::new();
        tracker.arm("north", 0);

        let fish = fish_with_info(&[
            (Some("north"), 2),
            (Some("south"), 7),
            (None, 0),
            (Some("north"), 4),
        ]);
        let sample = tracker.finalize(&fish).unwrap();

        assert_eq!(sample, InfoSample { correct: 2, max_hops: 4 });
        assert!(!tracker.is_armed());
    }

    #[test]
    fn test_hop_count_captures_first_source_only() {
        let mut tracker = HopCountTracker::new();
        tracker.observe(&Event::hop_count(FishId(1), 0, 0)); // idle, ignored
        assert_eq!(tracker.event_count(), 0);

        tracker.arm();
        tracker.observe(&Event::hop_count(FishId(2), 0, 0));
        tracker.observe(&Event::hop_count(FishId(0), 1, 0));
        tracker.observe(&Event::hop_count(FishId(3), 2, 0));

        assert_eq!(tracker.source(), Some(FishId(2)));
        assert_eq!(tracker.event_count(), 3);

        let mut fish = vec![FishSnapshot::default(); 4];
        fish[2].hop_count = 5;
        let sample = tracker.finalize(&fish).unwrap();
        assert_eq!(sample, HopCountSample { messages: 3, hops: Some(5) });
        assert_eq!(tracker.phase(), TrackerPhase::Idle);
    }

    #[test]
    fn test_hop_count_silent_run_keeps_stale_source() {
        let mut tracker = HopCountTracker::new();
        let mut fish = vec![FishSnapshot::default(); 3];
        fish[1].hop_count = 2;

        // Never any traffic: no source at all
        tracker.arm();
        assert_eq!(
            tracker.finalize(&fish),
            Some(HopCountSample { messages: 0, hops: None })
        );

        tracker.arm();
        tracker.observe(&Event::hop_count(FishId(1), 0, 0));
        tracker.finalize(&fish);

        // Silent re-run reports the previous source
        tracker.arm();
        fish[1].hop_count = 9;
        assert_eq!(
            tracker.finalize(&fish),
            Some(HopCountSample { messages: 0, hops: Some(9) })
        );
    }

    #[test]
    fn test_leader_election_counts_while_armed() {
        let mut tracker = LeaderElectionTracker::new();
        tracker.observe();
        assert_eq!(tracker.event_count(), 0);

        tracker.arm();
        tracker.observe();
        tracker.observe();

        let fish: Vec<FishSnapshot> = [3, 3, -1]
            .iter()
            .map(|id| FishSnapshot {
                leader_election_max_id: *id,
                ..Default::default()
            })
            .collect();
        let sample = tracker.finalize(&fish).unwrap();
        assert_eq!(sample.leaders, vec![3, 3, -1]);
        assert_eq!(sample.messages, 2);
        assert!(tracker.finalize(&fish).is_none());
    }

    #[test]
    fn test_study_log_respects_config() {
        let mut log = StudyLog::new(TrackerConfig {
            study_hop_count: true,
            ..Default::default()
        });
        log.record_info(InfoSample { correct: 1, max_hops: 1 });
        log.record_hop_count(HopCountSample { messages: 4, hops: Some(2) });
        log.record_leader(LeaderSample { leaders: vec![], messages: 0 });

        assert_eq!(log.len(), 1);
        let report = log.to_string();
        assert!(report.contains("Num. Messages: [4]"));
        assert!(report.contains("Num. Hops: [Some(2)]"));
        assert!(!report.contains("Leader"));
    }
}
