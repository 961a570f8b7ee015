//! Governance parameters
//!
//! The nine tunable constants of the voting machine. Percentages are parts
//! per million of the reputation supply at the relevant snapshot block.
//! The set is mutable only through the avatar-gated
//! [`set_voting_parameters`](crate::machine::VotingMachine::set_voting_parameters)
//! entry point.

use serde::{Deserialize, Serialize};

use repgov_core::types::{BlockNumber, Timestamp, TokenAmount};

/// Denominator for the parts-per-million percentage fields
pub const PPM_DENOMINATOR: u128 = 1_000_000;

/// The governance parameter set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingParameters {
    /// Length of the voting window, in blocks
    pub voting_period: BlockNumber,
    /// Minimum for-votes for a proposal to be eligible to succeed,
    /// in ppm of supply at the proposal's start block
    pub quorum_ppm: u64,
    /// Minimum proposer weight, in ppm of current supply
    pub proposal_ppm: u64,
    /// Maximum number of actions a proposal may carry
    pub proposal_max_operations: u64,
    /// Blocks between proposal creation and the start of voting
    pub voting_delay: BlockNumber,
    /// Normal timelock, in seconds
    pub queue_period: Timestamp,
    /// Shortened timelock granted on absolute-majority support, in seconds
    pub fast_queue_period: Timestamp,
    /// Reaction window preserved when the outcome is reaffirmed near eta,
    /// in seconds
    pub game_changer_period: Timestamp,
    /// Window after eta during which a succeeded proposal stays executable,
    /// in seconds
    pub grace_period: Timestamp,
}

impl Default for VotingParameters {
    fn default() -> Self {
        Self {
            voting_period: 80_640,            // ~14 days of 15s blocks
            quorum_ppm: 30_000,               // 3%
            proposal_ppm: 2_500,              // 0.25%
            proposal_max_operations: 10,
            voting_delay: 1,
            queue_period: 2 * 24 * 3600,      // 2 days
            fast_queue_period: 3600,          // 1 hour
            game_changer_period: 24 * 3600,   // 1 day
            grace_period: 3 * 24 * 3600,      // 3 days
        }
    }
}

impl VotingParameters {
    /// For-votes required to reach quorum, given the supply at the
    /// proposal's start block
    pub fn quorum_votes(&self, total_supply: TokenAmount) -> TokenAmount {
        total_supply * self.quorum_ppm as u128 / PPM_DENOMINATOR
    }

    /// Minimum voting weight a proposer must hold, given current supply
    pub fn proposal_threshold(&self, total_supply: TokenAmount) -> TokenAmount {
        total_supply * self.proposal_ppm as u128 / PPM_DENOMINATOR
    }

    /// Apply a positional parameter update in the order
    /// `[voting_period, quorum_ppm, proposal_ppm, proposal_max_operations,
    /// voting_delay, queue_period, fast_queue_period, game_changer_period,
    /// grace_period]`.
    ///
    /// A zero-valued slot retains the prior value. This makes a literal
    /// zero unsettable through this path; the behavior is kept as-is from
    /// the original protocol and documented rather than redesigned.
    pub fn apply_update(&mut self, values: [u64; 9]) {
        let [voting_period, quorum_ppm, proposal_ppm, proposal_max_operations, voting_delay, queue_period, fast_queue_period, game_changer_period, grace_period] =
            values;

        if voting_period != 0 {
            self.voting_period = voting_period;
        }
        if quorum_ppm != 0 {
            self.quorum_ppm = quorum_ppm;
        }
        if proposal_ppm != 0 {
            self.proposal_ppm = proposal_ppm;
        }
        if proposal_max_operations != 0 {
            self.proposal_max_operations = proposal_max_operations;
        }
        if voting_delay != 0 {
            self.voting_delay = voting_delay;
        }
        if queue_period != 0 {
            self.queue_period = queue_period;
        }
        if fast_queue_period != 0 {
            self.fast_queue_period = fast_queue_period;
        }
        if game_changer_period != 0 {
            self.game_changer_period = game_changer_period;
        }
        if grace_period != 0 {
            self.grace_period = grace_period;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quorum_votes_ppm() {
        let params = VotingParameters {
            quorum_ppm: 300_000, // 30%
            ..Default::default()
        };
        assert_eq!(params.quorum_votes(1_500_000), 450_000);
    }

    #[test]
    fn test_proposal_threshold_ppm() {
        let params = VotingParameters::default();
        // 0.25% of 1_000_000
        assert_eq!(params.proposal_threshold(1_000_000), 2_500);
    }

    #[test]
    fn test_apply_update_zero_slots_retained() {
        let mut params = VotingParameters::default();
        let before = params;

        params.apply_update([0; 9]);
        assert_eq!(params, before);

        params.apply_update([0, 50_000, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(params.quorum_ppm, 50_000);
        assert_eq!(params.voting_period, before.voting_period);
        assert_eq!(params.grace_period, before.grace_period);
    }

    #[test]
    fn test_apply_update_all_slots() {
        let mut params = VotingParameters::default();
        params.apply_update([10, 20, 30, 40, 50, 60, 70, 80, 90]);
        assert_eq!(
            params,
            VotingParameters {
                voting_period: 10,
                quorum_ppm: 20,
                proposal_ppm: 30,
                proposal_max_operations: 40,
                voting_delay: 50,
                queue_period: 60,
                fast_queue_period: 70,
                game_changer_period: 80,
                grace_period: 90,
            }
        );
    }

    #[test]
    fn test_fast_queue_shorter_than_queue_by_default() {
        let params = VotingParameters::default();
        assert!(params.fast_queue_period < params.queue_period);
    }
}
