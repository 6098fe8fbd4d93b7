//! The precomputed list of operation slots shared by all workers.

use std::sync::atomic::{AtomicUsize, Ordering};

use mixbench_types::OperationKind;

/// A claimed position in the [`AssignmentSequence`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot {
    /// Position of the slot in the sequence.
    pub index: usize,
    /// The operation assigned to this slot.
    pub kind: OperationKind,
}

/// An ordered, read-only sequence of operation kinds.
///
/// Workers claim slots with [`claim`](Self::claim). Every slot is handed out exactly once, in
/// sequence order, no matter how many workers race for it.
#[derive(Debug)]
pub struct AssignmentSequence {
    ops: Box<[OperationKind]>,
    next: AtomicUsize,
}

impl AssignmentSequence {
    /// Wraps a list of operations. Nothing is claimed yet.
    pub fn new(ops: impl Into<Box<[OperationKind]>>) -> Self {
        Self {
            ops: ops.into(),
            next: AtomicUsize::new(0),
        }
    }

    /// Atomically claims the next unclaimed slot.
    ///
    /// Returns `None` once the sequence is exhausted.
    pub fn claim(&self) -> Option<Slot> {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        self.ops.get(index).map(|&kind| Slot { index, kind })
    }

    /// The number of slots that have been claimed so far.
    pub fn claimed(&self) -> usize {
        self.next.load(Ordering::Relaxed).min(self.ops.len())
    }

    /// The total number of slots.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns `true` if there are no slots at all.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Returns `true` once every slot has been claimed.
    pub fn is_exhausted(&self) -> bool {
        self.claimed() == self.ops.len()
    }

    /// The full sequence of operation kinds.
    pub fn as_slice(&self) -> &[OperationKind] {
        &self.ops
    }

    /// Number of slots per kind, indexed by [`OperationKind::index`].
    pub fn counts(&self) -> [usize; 4] {
        let mut counts = [0; 4];
        for kind in self.ops.iter() {
            counts[kind.index()] += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn claims_in_order_until_exhausted() {
        let sequence = AssignmentSequence::new(vec![OperationKind::Put, OperationKind::Get]);

        assert_eq!(
            sequence.claim(),
            Some(Slot {
                index: 0,
                kind: OperationKind::Put
            })
        );
        assert_eq!(
            sequence.claim(),
            Some(Slot {
                index: 1,
                kind: OperationKind::Get
            })
        );
        assert_eq!(sequence.claim(), None);
        assert_eq!(sequence.claim(), None);
        assert_eq!(sequence.claimed(), 2);
        assert!(sequence.is_exhausted());
    }

    #[test]
    fn every_slot_is_claimed_exactly_once() {
        let sequence = Arc::new(AssignmentSequence::new(vec![OperationKind::Stat; 10_000]));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sequence = Arc::clone(&sequence);
                std::thread::spawn(move || {
                    let mut claimed = Vec::new();
                    while let Some(slot) = sequence.claim() {
                        claimed.push(slot.index);
                    }
                    claimed
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for index in handle.join().unwrap() {
                assert!(seen.insert(index), "slot {index} claimed twice");
            }
        }
        assert_eq!(seen.len(), 10_000);
    }
}
