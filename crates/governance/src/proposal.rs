//! Proposal data model
//!
//! Proposals, per-voter receipts, and the store that holds them. The store
//! is plain data plus id allocation; all concurrency control lives in the
//! [`VotingMachine`](crate::machine::VotingMachine).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use repgov_core::types::{Address, BlockNumber, Timestamp, TokenAmount};

/// One call a proposal will make through the dispatcher when executed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Call target
    pub target: Address,
    /// Native value forwarded with the call
    pub value: u128,
    /// Function signature, e.g. `transfer(address,uint256)`
    pub signature: String,
    /// Encoded call arguments
    pub calldata: Vec<u8>,
}

/// A governance proposal.
///
/// `for_votes` and `against_votes` start at zero and only grow, through
/// [`record_vote`](Proposal::record_vote). `canceled` and `executed` are
/// write-once and mutually exclusive. `eta` stays zero until the tally
/// first crosses the success threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    /// Monotonically increasing id, unique per machine instance
    pub id: u64,
    /// Account that created the proposal
    pub proposer: Address,
    /// Ordered action list, dispatched atomically on execution
    pub actions: Vec<Action>,
    /// Human-readable description
    pub description: String,
    /// Last block before voting opens; votes snapshot weight here
    pub start_block: BlockNumber,
    /// Last block of the voting window
    pub end_block: BlockNumber,
    /// Execution timestamp; zero until the success threshold is crossed
    pub eta: Timestamp,
    /// Accumulated weight in favor
    pub for_votes: TokenAmount,
    /// Accumulated weight against
    pub against_votes: TokenAmount,
    /// Reputation supply snapshotted at creation; quorum and the
    /// absolute-majority fast path are measured against this
    pub total_supply_at_start: TokenAmount,
    /// Set by a guardian or below-threshold cancellation
    pub canceled: bool,
    /// Set once the action list has been dispatched in full
    pub executed: bool,
}

impl Proposal {
    /// Whether the current tally satisfies majority and quorum
    pub fn meets_threshold(&self, quorum_votes: TokenAmount) -> bool {
        self.for_votes > self.against_votes && self.for_votes >= quorum_votes
    }

    /// Whether for-votes exceed an absolute majority of the supply snapshot
    pub fn has_absolute_majority(&self) -> bool {
        self.for_votes > self.total_supply_at_start / 2
    }

    /// Add a vote's weight to the tally
    pub fn record_vote(&mut self, support: bool, votes: TokenAmount) {
        if support {
            self.for_votes += votes;
        } else {
            self.against_votes += votes;
        }
    }

    /// Sum of the native value declared across all actions
    pub fn total_value(&self) -> u128 {
        self.actions.iter().map(|a| a.value).sum()
    }
}

/// Per-voter, per-proposal voting record. Created lazily on first vote and
/// immutable afterwards; its existence is what blocks double voting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Always true once the receipt exists
    pub has_voted: bool,
    /// Direction of the vote
    pub support: bool,
    /// Weight snapshotted at the proposal's start block
    pub votes: TokenAmount,
}

/// Holds all proposals and receipts, and allocates ids
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProposalStore {
    /// All proposals by id; never deleted
    proposals: HashMap<u64, Proposal>,
    /// Receipts by proposal id, then voter
    receipts: HashMap<u64, HashMap<Address, Receipt>>,
    /// Most recent proposal id per proposer
    latest_proposal_ids: HashMap<Address, u64>,
    /// Highest id allocated so far
    last_id: u64,
}

impl ProposalStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next proposal id: previous maximum plus one
    pub fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    /// Insert a proposal and record it as its proposer's latest
    pub fn insert(&mut self, proposal: Proposal) {
        let latest = self
            .latest_proposal_ids
            .entry(proposal.proposer)
            .or_insert(proposal.id);
        if proposal.id > *latest {
            *latest = proposal.id;
        }
        if proposal.id > self.last_id {
            self.last_id = proposal.id;
        }
        self.proposals.insert(proposal.id, proposal);
    }

    /// Look up a proposal by id
    pub fn get(&self, id: u64) -> Option<&Proposal> {
        self.proposals.get(&id)
    }

    /// The most recent proposal id created by `proposer`, if any
    pub fn latest_proposal_id(&self, proposer: &Address) -> Option<u64> {
        self.latest_proposal_ids.get(proposer).copied()
    }

    /// A voter's receipt on a proposal, if they voted
    pub fn receipt(&self, proposal_id: u64, voter: &Address) -> Option<Receipt> {
        self.receipts
            .get(&proposal_id)
            .and_then(|m| m.get(voter))
            .copied()
    }

    /// All receipts recorded for a proposal
    pub fn receipts_for(&self, proposal_id: u64) -> Option<&HashMap<Address, Receipt>> {
        self.receipts.get(&proposal_id)
    }

    /// Record a voter's receipt
    pub fn set_receipt(&mut self, proposal_id: u64, voter: Address, receipt: Receipt) {
        self.receipts
            .entry(proposal_id)
            .or_default()
            .insert(voter, receipt);
    }

    /// Replace the receipt map for a proposal (used when reloading
    /// persisted state)
    pub fn set_receipts(&mut self, proposal_id: u64, receipts: HashMap<Address, Receipt>) {
        self.receipts.insert(proposal_id, receipts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_proposal(id: u64, proposer: Address) -> Proposal {
        Proposal {
            id,
            proposer,
            actions: vec![Action {
                target: Address::from_low_u64(99),
                value: 0,
                signature: "setValue(uint256)".to_string(),
                calldata: vec![1, 2, 3],
            }],
            description: "sample".to_string(),
            start_block: 10,
            end_block: 20,
            eta: 0,
            for_votes: 0,
            against_votes: 0,
            total_supply_at_start: 1_000_000,
            canceled: false,
            executed: false,
        }
    }

    #[test]
    fn test_id_allocation_is_sequential() {
        let mut store = ProposalStore::new();
        assert_eq!(store.next_id(), 1);
        assert_eq!(store.next_id(), 2);
        assert_eq!(store.next_id(), 3);
    }

    #[test]
    fn test_insert_tracks_latest_per_proposer() {
        let mut store = ProposalStore::new();
        let proposer = Address::from_low_u64(7);

        let id = store.next_id();
        store.insert(sample_proposal(id, proposer));
        assert_eq!(store.latest_proposal_id(&proposer), Some(1));

        let id = store.next_id();
        store.insert(sample_proposal(id, proposer));
        assert_eq!(store.latest_proposal_id(&proposer), Some(2));
        assert!(store.get(1).is_some());
        assert!(store.get(2).is_some());
    }

    #[test]
    fn test_tally_and_threshold() {
        let mut proposal = sample_proposal(1, Address::from_low_u64(7));
        assert_eq!(proposal.for_votes, 0);
        assert_eq!(proposal.against_votes, 0);

        proposal.record_vote(true, 400);
        proposal.record_vote(false, 100);
        assert_eq!(proposal.for_votes, 400);
        assert_eq!(proposal.against_votes, 100);

        assert!(proposal.meets_threshold(300));
        assert!(!proposal.meets_threshold(500));
        assert!(!proposal.has_absolute_majority());

        proposal.record_vote(true, 500_000);
        assert!(proposal.has_absolute_majority());
    }

    #[test]
    fn test_receipts_keyed_by_voter() {
        let mut store = ProposalStore::new();
        let voter = Address::from_low_u64(3);
        let receipt = Receipt {
            has_voted: true,
            support: true,
            votes: 250,
        };

        assert!(store.receipt(1, &voter).is_none());
        store.set_receipt(1, voter, receipt);
        assert_eq!(store.receipt(1, &voter), Some(receipt));
        assert!(store.receipt(1, &Address::from_low_u64(4)).is_none());
    }
}
