//! Proposal state evaluation
//!
//! State is never stored; it is recomputed from the proposal's facts, the
//! current parameters, and a chain point. [`evaluate`] is a pure function
//! so the same classification runs inside the machine, in a verifier
//! replaying history, or in tests with hand-built proposals.

use std::fmt;

use serde::{Deserialize, Serialize};

use repgov_core::types::ChainPoint;

use crate::params::VotingParameters;
use crate::proposal::Proposal;

/// The lifecycle states of a proposal.
///
/// `Canceled`, `Defeated`, `Expired` and `Executed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalState {
    /// Voting has not opened yet
    Pending,
    /// Inside the voting window
    Active,
    /// Voting is over, the timelock has not elapsed
    ActiveTimelock,
    /// Canceled by the guardian or a below-threshold cancellation
    Canceled,
    /// Never reached quorum/majority, or lost it before execution
    Defeated,
    /// Timelock elapsed with quorum and majority intact; executable
    Succeeded,
    /// Grace period elapsed without execution
    Expired,
    /// Action list dispatched in full
    Executed,
}

impl ProposalState {
    /// Whether no further transitions are possible from this state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Canceled | Self::Defeated | Self::Expired | Self::Executed
        )
    }
}

impl fmt::Display for ProposalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "Pending",
            Self::Active => "Active",
            Self::ActiveTimelock => "ActiveTimelock",
            Self::Canceled => "Canceled",
            Self::Defeated => "Defeated",
            Self::Succeeded => "Succeeded",
            Self::Expired => "Expired",
            Self::Executed => "Executed",
        };
        f.write_str(name)
    }
}

/// Classify a proposal at the given chain point.
///
/// Check order matters: cancellation overrides every non-executed reading,
/// and `executed` is checked before any time-based decay so an executed
/// proposal never reads as `Expired`. A queued proposal whose majority was
/// lost while waiting classifies as `Defeated` once its timelock elapses.
pub fn evaluate(proposal: &Proposal, params: &VotingParameters, at: ChainPoint) -> ProposalState {
    if proposal.canceled {
        return ProposalState::Canceled;
    }
    if at.block <= proposal.start_block {
        return ProposalState::Pending;
    }
    if at.block <= proposal.end_block {
        return ProposalState::Active;
    }
    if proposal.executed {
        return ProposalState::Executed;
    }
    // Voting window over. eta == 0 means the threshold was never crossed.
    if proposal.eta == 0 {
        return ProposalState::Defeated;
    }
    if at.timestamp < proposal.eta {
        return ProposalState::ActiveTimelock;
    }
    let quorum = params.quorum_votes(proposal.total_supply_at_start);
    if !proposal.meets_threshold(quorum) {
        return ProposalState::Defeated;
    }
    if at.timestamp >= proposal.eta + params.grace_period {
        ProposalState::Expired
    } else {
        ProposalState::Succeeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::Action;
    use repgov_core::types::Address;

    fn proposal() -> Proposal {
        Proposal {
            id: 1,
            proposer: Address::from_low_u64(1),
            actions: vec![Action {
                target: Address::from_low_u64(2),
                value: 0,
                signature: String::new(),
                calldata: Vec::new(),
            }],
            description: String::new(),
            start_block: 100,
            end_block: 200,
            eta: 0,
            for_votes: 0,
            against_votes: 0,
            total_supply_at_start: 1_500_000,
            canceled: false,
            executed: false,
        }
    }

    fn params() -> VotingParameters {
        VotingParameters {
            quorum_ppm: 300_000, // 30% => 450_000 votes of 1_500_000 supply
            grace_period: 1_000,
            ..Default::default()
        }
    }

    #[test]
    fn test_pending_then_active_window() {
        let p = proposal();
        let ps = params();
        assert_eq!(evaluate(&p, &ps, ChainPoint::new(50, 0)), ProposalState::Pending);
        assert_eq!(evaluate(&p, &ps, ChainPoint::new(100, 0)), ProposalState::Pending);
        assert_eq!(evaluate(&p, &ps, ChainPoint::new(101, 0)), ProposalState::Active);
        assert_eq!(evaluate(&p, &ps, ChainPoint::new(200, 0)), ProposalState::Active);
    }

    #[test]
    fn test_defeated_without_eta() {
        let p = proposal();
        let ps = params();
        assert_eq!(
            evaluate(&p, &ps, ChainPoint::new(201, 0)),
            ProposalState::Defeated
        );
    }

    #[test]
    fn test_canceled_overrides_everything_else() {
        let mut p = proposal();
        p.canceled = true;
        p.eta = 5_000;
        p.for_votes = 1_000_000;
        let ps = params();
        assert_eq!(evaluate(&p, &ps, ChainPoint::new(50, 0)), ProposalState::Canceled);
        assert_eq!(
            evaluate(&p, &ps, ChainPoint::new(300, 4_000)),
            ProposalState::Canceled
        );
    }

    #[test]
    fn test_timelock_then_succeeded_then_expired() {
        let mut p = proposal();
        p.eta = 5_000;
        p.for_votes = 500_000;
        let ps = params();

        assert_eq!(
            evaluate(&p, &ps, ChainPoint::new(201, 4_999)),
            ProposalState::ActiveTimelock
        );
        assert_eq!(
            evaluate(&p, &ps, ChainPoint::new(201, 5_000)),
            ProposalState::Succeeded
        );
        assert_eq!(
            evaluate(&p, &ps, ChainPoint::new(201, 5_999)),
            ProposalState::Succeeded
        );
        assert_eq!(
            evaluate(&p, &ps, ChainPoint::new(201, 6_000)),
            ProposalState::Expired
        );
    }

    #[test]
    fn test_majority_lost_while_queued_reads_defeated() {
        let mut p = proposal();
        p.eta = 5_000;
        p.for_votes = 500_000;
        p.against_votes = 600_000;
        let ps = params();
        assert_eq!(
            evaluate(&p, &ps, ChainPoint::new(201, 5_000)),
            ProposalState::Defeated
        );
    }

    #[test]
    fn test_quorum_shortfall_reads_defeated() {
        let mut p = proposal();
        p.eta = 5_000;
        p.for_votes = 400_000; // below the 450_000 quorum
        let ps = params();
        assert_eq!(
            evaluate(&p, &ps, ChainPoint::new(201, 5_000)),
            ProposalState::Defeated
        );
    }

    #[test]
    fn test_executed_never_expires() {
        let mut p = proposal();
        p.eta = 5_000;
        p.for_votes = 500_000;
        p.executed = true;
        let ps = params();
        assert_eq!(
            evaluate(&p, &ps, ChainPoint::new(201, 1_000_000)),
            ProposalState::Executed
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(ProposalState::Canceled.is_terminal());
        assert!(ProposalState::Defeated.is_terminal());
        assert!(ProposalState::Expired.is_terminal());
        assert!(ProposalState::Executed.is_terminal());
        assert!(!ProposalState::Active.is_terminal());
        assert!(!ProposalState::ActiveTimelock.is_terminal());
    }
}
