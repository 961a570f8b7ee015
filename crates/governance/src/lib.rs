//! Reputation-weighted governance voting machine
//!
//! This crate implements the proposal lifecycle of a delegated-voting DAO as
//! a portable core: proposal creation against a reputation snapshot, one-shot
//! voting inside a block-bounded window, quorum and majority evaluation,
//! adaptive timelock scheduling (normal queue, absolute-majority fast track,
//! late-swing extension), guardian emergency powers, and atomic timelocked
//! execution through an injected dispatcher.
//!
//! The chain itself stays outside: voting weights come from a
//! [`VotingPowerOracle`], block height and time from a
//! [`ChainClock`](repgov_core::ChainClock), and executed actions go through a
//! [`Dispatcher`]. State is always recomputed from stored facts plus the
//! current chain point; there is no stored "current state" field.

use thiserror::Error;

use repgov_core::storage::StorageError;
use repgov_core::types::Address;

pub mod dispatch;
pub mod events;
pub mod machine;
pub mod oracle;
pub mod params;
pub mod proposal;
pub mod scheduler;
pub mod state;

pub use dispatch::{DispatchError, DispatchedCall, Dispatcher, RecordingDispatcher};
pub use events::GovernanceEvent;
pub use machine::{MachineConfig, VotingMachine};
pub use oracle::{MockOracle, OracleError, VotingPowerOracle};
pub use params::VotingParameters;
pub use proposal::{Action, Proposal, ProposalStore, Receipt};
pub use scheduler::EtaChange;
pub use state::ProposalState;

/// Error types for governance operations.
///
/// Every failure is a whole-call abort: an `Err` return leaves the proposal
/// store exactly as it was before the call.
#[derive(Error, Debug)]
pub enum GovernanceError {
    /// Caller lacks the authority for the requested operation
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    /// Proposer's voting weight is below the proposal threshold
    #[error("Proposer {proposer} is below proposal threshold: {weight} < {threshold}")]
    BelowProposalThreshold {
        proposer: Address,
        weight: u128,
        threshold: u128,
    },

    /// Proposer already has a proposal in a live (pending or active) state
    #[error("Proposer {proposer} already has a live proposal: {proposal}")]
    LiveProposalExists { proposer: Address, proposal: u64 },

    /// No proposal with the given id
    #[error("Proposal not found: {0}")]
    ProposalNotFound(u64),

    /// Vote cast outside the proposal's voting window, whether it has not
    /// opened yet or has already ended
    #[error("Voting window is not open for proposal {0}")]
    VotingClosed(u64),

    /// Voter already has a receipt on this proposal
    #[error("Voter {voter} already voted on proposal {proposal}")]
    AlreadyVoted { proposal: u64, voter: Address },

    /// Proposal is in the wrong state for the requested operation
    #[error("Proposal {id} is {actual}: {reason}")]
    WrongState {
        id: u64,
        actual: ProposalState,
        reason: &'static str,
    },

    /// Proposal carries no actions
    #[error("Proposal must contain at least one action")]
    NoActions,

    /// Action count exceeds the configured maximum
    #[error("Too many actions: {given} > {max}")]
    TooManyActions { given: usize, max: u64 },

    /// The four action arrays differ in length
    #[error("Action arrays must have equal lengths")]
    ActionArityMismatch,

    /// Supplied value does not match the sum of the proposal's action values
    #[error("Supplied value {supplied} does not match declared action values {declared}")]
    ValueMismatch { declared: u128, supplied: u128 },

    /// An action reverted during execution
    #[error("Dispatch failed for proposal {proposal} at action {index}: {reason}")]
    DispatchFailed {
        proposal: u64,
        index: usize,
        reason: String,
    },

    /// Voting power oracle failure
    #[error("Oracle error: {0}")]
    Oracle(String),

    /// Error with storage
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for governance operations
pub type GovernanceResult<T> = Result<T, GovernanceError>;
