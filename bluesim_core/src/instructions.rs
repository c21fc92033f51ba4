//! Instruction queue keyed by the tick at which each instruction fires.
//!
//! A binary heap ordered by `(due, seq)` where `seq` is a monotonic
//! insertion counter. Instructions due on the same tick therefore come out
//! in the order they were scheduled, independent of heap internals.

use bluesim_env::{Event, FishId};
use nalgebra::Vector2;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Who receives an instruction when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Straight onto one fish's inbox
    Fish(FishId),
    /// Onto every inbox, no channel involved
    All,
    /// Through the channel from the instruction's position
    Positional,
}

/// A scheduled future event. Immutable once queued.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Clock tick at which the instruction fires
    pub due: u64,
    pub event: Event,
    pub target: Target,
    /// Imaginary origin of the event; decides reach for positional delivery
    pub position: Vector2<f64>,
}

#[derive(Debug)]
struct Queued {
    seq: u64,
    instruction: Instruction,
}

impl Queued {
    fn key(&self) -> (u64, u64) {
        (self.instruction.due, self.seq)
    }
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    // Reversed: BinaryHeap is a max-heap, we want the smallest key on top
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

/// Min-priority queue of instructions with stable tie-breaking.
#[derive(Debug, Default)]
pub struct InstructionQueue {
    heap: BinaryHeap<Queued>,
    next_seq: u64,
}

impl InstructionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an instruction and returns its insertion sequence number.
    pub fn push(&mut self, instruction: Instruction) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Queued { seq, instruction });
        seq
    }

    /// Due tick of the next instruction, if any.
    pub fn next_due(&self) -> Option<u64> {
        self.heap.peek().map(|q| q.instruction.due)
    }

    /// Pops the head instruction if it is due at or before `clock`.
    pub fn pop_due(&mut self, clock: u64) -> Option<Instruction> {
        match self.next_due() {
            Some(due) if due <= clock => self.heap.pop().map(|q| q.instruction),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluesim_env::Opcode;
    use proptest::prelude::*;

    fn instruction(due: u64, tag: u8) -> Instruction {
        Instruction {
            due,
            event: Event::new(Opcode::Unknown(tag)),
            target: Target::All,
            position: Vector2::zeros(),
        }
    }

    fn tag(instruction: &Instruction) -> u8 {
        instruction.event.opcode.code()
    }

    #[test]
    fn test_empty_queue_pops_nothing() {
        let mut queue = InstructionQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.next_due(), None);
        assert!(queue.pop_due(100).is_none());
    }

    #[test]
    fn test_not_due_yet() {
        let mut queue = InstructionQueue::new();
        queue.push(instruction(5, 1));

        assert!(queue.pop_due(4).is_none());
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop_due(5).map(|i| tag(&i)), Some(1));
    }

    #[test]
    fn test_same_tick_keeps_insertion_order() {
        let mut queue = InstructionQueue::new();
        queue.push(instruction(5, 10)); // A
        queue.push(instruction(3, 30));
        queue.push(instruction(5, 20)); // B

        assert_eq!(queue.pop_due(5).map(|i| tag(&i)), Some(30));
        assert_eq!(queue.pop_due(5).map(|i| tag(&i)), Some(10));
        assert_eq!(queue.pop_due(5).map(|i| tag(&i)), Some(20));
        assert!(queue.pop_due(5).is_none());
    }

    proptest! {
        #[test]
        fn prop_pops_in_due_then_insertion_order(dues in prop::collection::vec(0u64..8, 1..64)) {
            let mut queue = InstructionQueue::new();
            for (i, due) in dues.iter().enumerate() {
                queue.push(Instruction {
                    due: *due,
                    event: Event::new(Opcode::Unknown((i % 256) as u8)),
                    target: Target::Positional,
                    position: Vector2::new(i as f64, 0.0),
                });
            }

            let mut popped = Vec::new();
            while let Some(next) = queue.pop_due(u64::MAX) {
                popped.push((next.due, next.position.x as usize));
            }

            let mut expected: Vec<(u64, usize)> =
                dues.iter().enumerate().map(|(i, d)| (*d, i)).collect();
            expected.sort();
            prop_assert_eq!(popped, expected);
        }
    }
}
