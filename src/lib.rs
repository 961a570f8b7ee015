//! repgov - a reputation-weighted DAO voting machine
//!
//! A portable reimplementation of an on-chain governance core: proposals,
//! reputation-snapshotted voting, quorum evaluation, adaptive timelock
//! scheduling, guardian emergency powers, and timelocked execution. The
//! chain is injected at the edges (clock, voting power oracle, dispatcher),
//! so the same core serves as an independent verifier, a simulator, or the
//! heart of an alternate-chain implementation.

pub use repgov_core::{
    Address, BlockNumber, ChainClock, ChainPoint, FileStorage, JsonStorage, MemoryStorage,
    SimClock, Storage, StorageError, StorageResult, Timestamp, TokenAmount,
};
pub use repgov_governance::{
    Action, DispatchError, DispatchedCall, Dispatcher, EtaChange, GovernanceError, GovernanceEvent,
    GovernanceResult, MachineConfig, MockOracle, OracleError, Proposal, ProposalState,
    ProposalStore, Receipt, RecordingDispatcher, VotingMachine, VotingParameters,
    VotingPowerOracle,
};
pub use repgov_governance::state::evaluate;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
