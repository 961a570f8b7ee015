//! Governance events
//!
//! Mirrors the contract-level event surface. `ProposalCreated` carries the
//! full action payload because actions are not separately queryable on most
//! chains without an indexer; observers replaying the journal see the same
//! facts a log subscriber would.

use serde::{Deserialize, Serialize};

use repgov_core::types::{Address, BlockNumber, Timestamp, TokenAmount};

use crate::params::VotingParameters;
use crate::proposal::Action;

/// Everything the machine announces about state changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GovernanceEvent {
    /// A proposal was created
    ProposalCreated {
        id: u64,
        proposer: Address,
        actions: Vec<Action>,
        start_block: BlockNumber,
        end_block: BlockNumber,
        description: String,
    },
    /// A vote was cast
    VoteCast {
        proposal: u64,
        voter: Address,
        support: bool,
        votes: TokenAmount,
    },
    /// The tally first crossed the success threshold; timelock begins
    ProposalQueued {
        proposal: u64,
        eta: Timestamp,
        fast_track: bool,
    },
    /// A reaffirmation near eta pushed the execution time out
    EtaExtended { proposal: u64, eta: Timestamp },
    /// The proposal was canceled
    ProposalCanceled { proposal: u64, by: Address },
    /// The proposal's actions were dispatched in full
    ProposalExecuted { proposal: u64 },
    /// The parameter set changed through the avatar path
    ParametersChanged { parameters: VotingParameters },
    /// Guardian succession or renouncement
    GuardianChanged {
        previous: Address,
        current: Address,
    },
}
