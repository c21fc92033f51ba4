//! Events exchanged between the observer, the channel and the fish.
//!
//! The observer only ever dispatches on [`Opcode`]; payload semantics belong
//! to the fish. The opcode set is shared by every fish and channel
//! implementation and must stay stable.

use crate::types::FishId;
use serde::{Deserialize, Serialize};

/// Discriminator identifying an event's semantic kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    /// Information injected into the swarm from outside
    InfoExternal,
    /// Information relayed fish to fish
    InfoInternal,
    /// Kick-off of a hop-count run
    StartHopCount,
    /// Hop-count message
    HopCount,
    /// Kick-off of a leader election
    StartLeaderElection,
    /// Leader-election message
    LeaderElection,
    /// Wire code this build does not know; always ignored by the observer
    Unknown(u8),
}

impl Opcode {
    /// Returns the stable wire code.
    pub fn code(self) -> u8 {
        match self {
            Opcode::InfoExternal => 0,
            Opcode::InfoInternal => 1,
            Opcode::StartHopCount => 2,
            Opcode::HopCount => 3,
            Opcode::StartLeaderElection => 4,
            Opcode::LeaderElection => 5,
            Opcode::Unknown(code) => code,
        }
    }

    /// Maps a wire code back to an opcode.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Opcode::InfoExternal,
            1 => Opcode::InfoInternal,
            2 => Opcode::StartHopCount,
            3 => Opcode::HopCount,
            4 => Opcode::StartLeaderElection,
            5 => Opcode::LeaderElection,
            other => Opcode::Unknown(other),
        }
    }
}

/// Opcode-specific event content.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Payload {
    #[default]
    Empty,

    /// Information message and the hop depth it travelled
    Info {
        message: String,
        hops: u32,
        /// Ask the observer to measure how far this message spreads
        track: bool,
    },

    /// Hop counter carried by a hop-count message
    Hops {
        hops: u32,
        /// Tick at which the run was started; tells runs apart
        run: u64,
    },

    /// Candidate leader id and the sender's clock
    Leader { max_id: i64, clock: i64 },
}

/// An event travelling through inboxes and the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Semantic kind
    pub opcode: Opcode,

    /// Originating fish, `None` when injected by the observer
    pub source_id: Option<FishId>,

    /// Opcode-specific content
    pub payload: Payload,
}

impl Event {
    /// Creates an event with no payload.
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            source_id: None,
            payload: Payload::Empty,
        }
    }

    /// External information, optionally tracked by the observer.
    pub fn info_external(message: impl Into<String>, track: bool) -> Self {
        Self {
            opcode: Opcode::InfoExternal,
            source_id: None,
            payload: Payload::Info {
                message: message.into(),
                hops: 0,
                track,
            },
        }
    }

    /// Information relayed by `source` after `hops` hops.
    pub fn info_internal(source: FishId, message: impl Into<String>, hops: u32) -> Self {
        Self {
            opcode: Opcode::InfoInternal,
            source_id: Some(source),
            payload: Payload::Info {
                message: message.into(),
                hops,
                track: false,
            },
        }
    }

    /// Hop-count message from `source` belonging to `run`.
    pub fn hop_count(source: FishId, hops: u32, run: u64) -> Self {
        Self {
            opcode: Opcode::HopCount,
            source_id: Some(source),
            payload: Payload::Hops { hops, run },
        }
    }

    /// Leader-election message from `source`.
    pub fn leader_election(source: FishId, max_id: i64, clock: i64) -> Self {
        Self {
            opcode: Opcode::LeaderElection,
            source_id: Some(source),
            payload: Payload::Leader { max_id, clock },
        }
    }

    /// Returns the message to track if this is a tracked external info event.
    pub fn tracked_message(&self) -> Option<&str> {
        match (&self.opcode, &self.payload) {
            (Opcode::InfoExternal, Payload::Info { message, track: true, .. }) => {
                Some(message.as_str())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_codes_are_stable() {
        for code in 0..=5u8 {
            assert_eq!(Opcode::from_code(code).code(), code);
        }
        assert_eq!(Opcode::from_code(42), Opcode::Unknown(42));
        assert_eq!(Opcode::Unknown(42).code(), 42);
    }

    #[test]
    fn test_tracked_message() {
        let tracked = Event::info_external("north", true);
        assert_eq!(tracked.tracked_message(), Some("north"));

        let untracked = Event::info_external("north", false);
        assert_eq!(untracked.tracked_message(), None);

        // Relayed info is never a tracking request
        let relayed = Event::info_internal(FishId(1), "north", 1);
        assert_eq!(relayed.tracked_message(), None);
    }
}
