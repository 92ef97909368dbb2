//! Sequence number allocation.

use std::sync::atomic::{AtomicU32, Ordering};

/// How sequence numbers are drawn for outgoing long frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequenceStrategy {
    /// Uniformly random 32-bit values with no collision avoidance.
    ///
    /// Two concurrent sends may draw the same value. The later registration
    /// replaces the earlier one in the pending registry and the displaced
    /// send fails at once with [`Superseded`]. The newer entry stays
    /// pending and is resolved by the shared ACK. (A displaced sender used
    /// to sit out its full timeout and then delete the newer entry on the
    /// way out, failing both sends.)
    ///
    /// [`Superseded`]: super::TransportError::Superseded
    #[default]
    Random,
    /// A counter starting at a random offset, wrapping at `u32::MAX`.
    ///
    /// Concurrent sends never share a sequence unless 2^32 requests are in
    /// flight at once.
    Counter,
}

/// Thread-safe sequence number source.
#[derive(Debug)]
pub struct SequenceGenerator {
    strategy: SequenceStrategy,
    counter: AtomicU32,
}

impl SequenceGenerator {
    /// Create a generator for `strategy`.
    pub fn new(strategy: SequenceStrategy) -> Self {
        Self {
            strategy,
            counter: AtomicU32::new(rand::random()),
        }
    }

    /// The strategy in use.
    pub fn strategy(&self) -> SequenceStrategy {
        self.strategy
    }

    /// Draw the next sequence number.
    pub fn next_sequence(&self) -> u32 {
        match self.strategy {
            SequenceStrategy::Random => rand::random(),
            SequenceStrategy::Counter => self.counter.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl Default for SequenceGenerator {
    fn default() -> Self {
        Self::new(SequenceStrategy::default())
    }
}
