//! Timelock scheduling
//!
//! Computes a proposal's execution timestamp (`eta`) in response to tally
//! changes. Three rules, in the order they can fire over a proposal's life:
//!
//! 1. First threshold crossing with an absolute majority of the supply
//!    snapshot queues on the fast track (`fast_queue_period`).
//! 2. First threshold crossing otherwise queues on the normal timelock
//!    (`queue_period`).
//! 3. A reaffirming vote landing within `game_changer_period` of an
//!    existing eta pushes eta out to `now + game_changer_period`, so a
//!    late swing always leaves observers a full reaction window.
//!
//! When the tally stops satisfying the threshold, eta is deliberately left
//! in place; the state machine classifies the proposal as defeated once
//! its windows elapse. Within a single block the extension rule is
//! last-writer-wins, a documented property of the protocol.

use repgov_core::types::Timestamp;

use crate::params::VotingParameters;
use crate::proposal::Proposal;

/// The scheduling decision taken after a tally change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtaChange {
    /// First threshold crossing; the proposal enters the timelock
    Queued {
        /// The new execution timestamp
        eta: Timestamp,
        /// True when the absolute-majority fast path applied
        fast_track: bool,
    },
    /// A reaffirmation near eta pushed the execution timestamp out
    Extended {
        /// The new execution timestamp
        eta: Timestamp,
    },
}

impl EtaChange {
    /// The eta this change sets
    pub fn eta(&self) -> Timestamp {
        match *self {
            Self::Queued { eta, .. } | Self::Extended { eta } => eta,
        }
    }
}

/// Decide whether a tally change re-schedules the proposal.
///
/// Returns `None` when the tally does not currently satisfy the threshold,
/// or when it does but no eta rule applies (already queued and the vote
/// landed well before the game-changer horizon).
pub fn schedule(
    proposal: &Proposal,
    params: &VotingParameters,
    now: Timestamp,
) -> Option<EtaChange> {
    let quorum = params.quorum_votes(proposal.total_supply_at_start);
    if !proposal.meets_threshold(quorum) {
        return None;
    }

    if proposal.eta == 0 {
        let fast_track = proposal.has_absolute_majority();
        let delay = if fast_track {
            params.fast_queue_period
        } else {
            params.queue_period
        };
        return Some(EtaChange::Queued {
            eta: now + delay,
            fast_track,
        });
    }

    // Already queued: only a reaffirmation inside the game-changer horizon
    // moves eta, and never backwards.
    if now + params.game_changer_period > proposal.eta {
        let extended = now + params.game_changer_period;
        if extended > proposal.eta {
            return Some(EtaChange::Extended { eta: extended });
        }
    }

    None
}
