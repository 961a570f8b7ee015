//! Injected chain clock
//!
//! The voting machine never reads wall time. Block heights and timestamps
//! are observed through a [`ChainClock`], so the same core runs against a
//! live chain feed, a replayed history, or a test harness that advances
//! time by hand.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{BlockNumber, ChainPoint, Timestamp};

/// Source of the current block height and timestamp
pub trait ChainClock: Send + Sync {
    /// The current observation point
    fn now(&self) -> ChainPoint;
}

/// A manually-driven clock for simulations and tests
#[derive(Debug)]
pub struct SimClock {
    block: AtomicU64,
    timestamp: AtomicU64,
}

impl SimClock {
    /// Create a clock positioned at the given point
    pub fn new(at: ChainPoint) -> Self {
        Self {
            block: AtomicU64::new(at.block),
            timestamp: AtomicU64::new(at.timestamp),
        }
    }

    /// Move the clock to an absolute point
    pub fn set(&self, at: ChainPoint) {
        self.block.store(at.block, Ordering::SeqCst);
        self.timestamp.store(at.timestamp, Ordering::SeqCst);
    }

    /// Advance the block height without touching the timestamp
    pub fn advance_blocks(&self, blocks: BlockNumber) {
        self.block.fetch_add(blocks, Ordering::SeqCst);
    }

    /// Advance the timestamp without touching the block height
    pub fn advance_time(&self, seconds: Timestamp) {
        self.timestamp.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(ChainPoint::new(1, 1))
    }
}

impl ChainClock for SimClock {
    fn now(&self) -> ChainPoint {
        ChainPoint {
            block: self.block.load(Ordering::SeqCst),
            timestamp: self.timestamp.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_clock_advances() {
        let clock = SimClock::new(ChainPoint::new(100, 1_000));
        clock.advance_blocks(5);
        clock.advance_time(60);
        assert_eq!(clock.now(), ChainPoint::new(105, 1_060));

        clock.set(ChainPoint::new(1, 1));
        assert_eq!(clock.now(), ChainPoint::new(1, 1));
    }
}
