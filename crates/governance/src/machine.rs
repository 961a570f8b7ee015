//! The voting machine
//!
//! Ties the data model, state evaluation, and scheduler together behind the
//! public operation surface: `propose`, `cast_vote`, `cancel`, `execute`,
//! the guardian and parameter entry points, and the read-only queries.
//!
//! Every mutating operation holds the store's write lock end to end, giving
//! the same run-to-completion atomicity the chain would. Mutations are
//! prepared on a clone, persisted, and only then committed to the in-memory
//! store, so a failed call leaves no partial state behind.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use repgov_core::clock::ChainClock;
use repgov_core::storage::{JsonStorage, Storage, StorageError};
use repgov_core::types::{Address, ChainPoint, Timestamp, TokenAmount};

use crate::dispatch::Dispatcher;
use crate::events::GovernanceEvent;
use crate::oracle::VotingPowerOracle;
use crate::params::VotingParameters;
use crate::proposal::{Action, Proposal, ProposalStore, Receipt};
use crate::scheduler::{self, EtaChange};
use crate::state::{self, ProposalState};
use crate::{GovernanceError, GovernanceResult};

/// Storage keys
const CONFIG_PATH: &str = "governance/config";
const PROPOSALS_PATH: &str = "governance/proposals";
const RECEIPTS_PATH: &str = "governance/receipts";

/// Machine-level configuration: the privileged addresses, the guardian
/// succession epoch, and the current parameter set.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MachineConfig {
    /// The DAO avatar: sole authority for parameter changes, and for
    /// guardian succession once the foundation release has passed
    pub avatar: Address,
    /// Emergency-powers address; zero after renouncement
    pub guardian: Address,
    /// Timestamp after which guardian succession moves to the avatar
    pub foundation_release: Timestamp,
    /// The nine governance constants
    pub parameters: VotingParameters,
}

/// The governance proposal state machine
pub struct VotingMachine {
    oracle: Arc<dyn VotingPowerOracle>,
    dispatcher: Arc<dyn Dispatcher>,
    storage: Arc<dyn Storage>,
    clock: Arc<dyn ChainClock>,
    config: RwLock<MachineConfig>,
    store: RwLock<ProposalStore>,
    events: RwLock<Vec<GovernanceEvent>>,
}

impl VotingMachine {
    /// Create a machine, preferring a previously persisted configuration
    /// over the supplied one, and reloading any persisted proposals and
    /// receipts.
    pub async fn new(
        oracle: Arc<dyn VotingPowerOracle>,
        dispatcher: Arc<dyn Dispatcher>,
        storage: Arc<dyn Storage>,
        clock: Arc<dyn ChainClock>,
        config: MachineConfig,
    ) -> GovernanceResult<Self> {
        let config = match storage.get_json::<MachineConfig>(CONFIG_PATH).await {
            Ok(stored) => stored,
            Err(StorageError::KeyNotFound(_)) => {
                storage.put_json(CONFIG_PATH, &config).await?;
                config
            }
            Err(e) => return Err(e.into()),
        };

        let machine = Self {
            oracle,
            dispatcher,
            storage,
            clock,
            config: RwLock::new(config),
            store: RwLock::new(ProposalStore::new()),
            events: RwLock::new(Vec::new()),
        };
        machine.load_proposals().await?;
        Ok(machine)
    }

    /// Reload proposals and receipts from storage into the store
    async fn load_proposals(&self) -> GovernanceResult<()> {
        let prefix = format!("{}/", PROPOSALS_PATH);
        let keys = self.storage.list(&prefix).await?;

        let mut store = self.store.write().await;
        for key in &keys {
            let proposal: Proposal = self.storage.get_json(key).await?;
            let receipts_key = format!("{}/{}", RECEIPTS_PATH, proposal.id);
            if self.storage.exists(&receipts_key).await? {
                let receipts = self.storage.get_json(&receipts_key).await?;
                store.set_receipts(proposal.id, receipts);
            }
            store.insert(proposal);
        }
        if !keys.is_empty() {
            info!("Loaded {} proposals from storage", keys.len());
        }
        Ok(())
    }

    async fn save_proposal(&self, proposal: &Proposal) -> GovernanceResult<()> {
        let key = format!("{}/{}", PROPOSALS_PATH, proposal.id);
        self.storage.put_json(&key, proposal).await?;
        Ok(())
    }

    async fn save_receipts(
        &self,
        proposal_id: u64,
        receipts: &HashMap<Address, Receipt>,
    ) -> GovernanceResult<()> {
        let key = format!("{}/{}", RECEIPTS_PATH, proposal_id);
        self.storage.put_json(&key, receipts).await?;
        Ok(())
    }

    async fn save_config(&self, config: &MachineConfig) -> GovernanceResult<()> {
        self.storage.put_json(CONFIG_PATH, config).await?;
        Ok(())
    }

    async fn emit(&self, event: GovernanceEvent) {
        self.events.write().await.push(event);
    }

    async fn voting_power(&self, account: Address, block: u64) -> GovernanceResult<TokenAmount> {
        self.oracle
            .prior_voting_power(account, block)
            .await
            .map_err(|e| GovernanceError::Oracle(e.to_string()))
    }

    async fn total_supply(&self, block: u64) -> GovernanceResult<TokenAmount> {
        self.oracle
            .prior_total_supply(block)
            .await
            .map_err(|e| GovernanceError::Oracle(e.to_string()))
    }

    /// Create a proposal from four parallel action arrays.
    ///
    /// The proposer's weight at the immediately preceding block must meet
    /// the proposal threshold, and the proposer may not already have a
    /// proposal that is still `Pending` or `Active`.
    pub async fn propose(
        &self,
        proposer: Address,
        targets: Vec<Address>,
        values: Vec<u128>,
        signatures: Vec<String>,
        calldatas: Vec<Vec<u8>>,
        description: &str,
    ) -> GovernanceResult<u64> {
        let at = self.clock.now();
        let config = self.config.read().await.clone();
        let params = config.parameters;

        if targets.is_empty() {
            return Err(GovernanceError::NoActions);
        }
        if targets.len() != values.len()
            || targets.len() != signatures.len()
            || targets.len() != calldatas.len()
        {
            return Err(GovernanceError::ActionArityMismatch);
        }
        if targets.len() as u64 > params.proposal_max_operations {
            return Err(GovernanceError::TooManyActions {
                given: targets.len(),
                max: params.proposal_max_operations,
            });
        }

        let snapshot_block = at.block.saturating_sub(1);
        let supply = self.total_supply(snapshot_block).await?;
        let threshold = params.proposal_threshold(supply);
        let weight = self.voting_power(proposer, snapshot_block).await?;
        if weight < threshold {
            return Err(GovernanceError::BelowProposalThreshold {
                proposer,
                weight,
                threshold,
            });
        }

        let mut store = self.store.write().await;

        if let Some(latest) = store.latest_proposal_id(&proposer) {
            if let Some(previous) = store.get(latest) {
                let prev_state = state::evaluate(previous, &params, at);
                if matches!(prev_state, ProposalState::Pending | ProposalState::Active) {
                    return Err(GovernanceError::LiveProposalExists {
                        proposer,
                        proposal: latest,
                    });
                }
            }
        }

        let actions: Vec<Action> = targets
            .into_iter()
            .zip(values)
            .zip(signatures)
            .zip(calldatas)
            .map(|(((target, value), signature), calldata)| Action {
                target,
                value,
                signature,
                calldata,
            })
            .collect();

        let id = store.next_id();
        let proposal = Proposal {
            id,
            proposer,
            actions: actions.clone(),
            description: description.to_string(),
            start_block: at.block + params.voting_delay,
            end_block: at.block + params.voting_delay + params.voting_period,
            eta: 0,
            for_votes: 0,
            against_votes: 0,
            total_supply_at_start: supply,
            canceled: false,
            executed: false,
        };

        self.save_proposal(&proposal).await?;
        info!(
            id,
            %proposer,
            start_block = proposal.start_block,
            end_block = proposal.end_block,
            "Proposal created"
        );
        self.emit(GovernanceEvent::ProposalCreated {
            id,
            proposer,
            actions,
            start_block: proposal.start_block,
            end_block: proposal.end_block,
            description: description.to_string(),
        })
        .await;
        store.insert(proposal);

        Ok(id)
    }

    /// Cast a vote on an `Active` proposal.
    ///
    /// The voter's weight is snapshotted at the proposal's start block.
    /// After tallying, the scheduler decides whether the proposal enters
    /// the timelock or has its eta extended.
    pub async fn cast_vote(
        &self,
        voter: Address,
        proposal_id: u64,
        support: bool,
    ) -> GovernanceResult<()> {
        let at = self.clock.now();
        let params = self.config.read().await.parameters;

        let mut store = self.store.write().await;
        let mut updated = store
            .get(proposal_id)
            .ok_or(GovernanceError::ProposalNotFound(proposal_id))?
            .clone();

        if state::evaluate(&updated, &params, at) != ProposalState::Active {
            return Err(GovernanceError::VotingClosed(proposal_id));
        }
        if store.receipt(proposal_id, &voter).is_some() {
            return Err(GovernanceError::AlreadyVoted {
                proposal: proposal_id,
                voter,
            });
        }

        let votes = self.voting_power(voter, updated.start_block).await?;
        updated.record_vote(support, votes);

        let change = scheduler::schedule(&updated, &params, at.timestamp);
        if let Some(change) = change {
            updated.eta = change.eta();
        }

        let receipt = Receipt {
            has_voted: true,
            support,
            votes,
        };
        let mut receipts = store
            .receipts_for(proposal_id)
            .cloned()
            .unwrap_or_default();
        receipts.insert(voter, receipt);

        // Receipts first: a receipt without a tally merely drops the vote
        // on reload, while a tally without a receipt would let the voter
        // vote again and be counted twice.
        self.save_receipts(proposal_id, &receipts).await?;
        self.save_proposal(&updated).await?;
        debug!(
            proposal = proposal_id,
            %voter,
            support,
            votes = %votes,
            for_votes = %updated.for_votes,
            against_votes = %updated.against_votes,
            "Vote cast"
        );
        self.emit(GovernanceEvent::VoteCast {
            proposal: proposal_id,
            voter,
            support,
            votes,
        })
        .await;
        match change {
            Some(EtaChange::Queued { eta, fast_track }) => {
                info!(proposal = proposal_id, eta, fast_track, "Proposal queued");
                self.emit(GovernanceEvent::ProposalQueued {
                    proposal: proposal_id,
                    eta,
                    fast_track,
                })
                .await;
            }
            Some(EtaChange::Extended { eta }) => {
                info!(proposal = proposal_id, eta, "Eta extended near execution");
                self.emit(GovernanceEvent::EtaExtended {
                    proposal: proposal_id,
                    eta,
                })
                .await;
            }
            None => {}
        }

        store.insert(updated);
        store.set_receipts(proposal_id, receipts);

        Ok(())
    }

    /// Cancel a proposal.
    ///
    /// Two authorization paths: the guardian, for any proposal that has not
    /// reached a terminal state; or anyone, when the proposer's current
    /// weight has fallen below the proposal threshold.
    pub async fn cancel(&self, caller: Address, proposal_id: u64) -> GovernanceResult<()> {
        let at = self.clock.now();
        let config = self.config.read().await.clone();
        let params = config.parameters;

        let mut store = self.store.write().await;
        let mut updated = store
            .get(proposal_id)
            .ok_or(GovernanceError::ProposalNotFound(proposal_id))?
            .clone();

        let current = state::evaluate(&updated, &params, at);
        if current.is_terminal() {
            return Err(GovernanceError::WrongState {
                id: proposal_id,
                actual: current,
                reason: "cannot cancel a terminal proposal",
            });
        }

        let is_guardian = !config.guardian.is_zero() && caller == config.guardian;
        if !is_guardian {
            let snapshot_block = at.block.saturating_sub(1);
            let supply = self.total_supply(snapshot_block).await?;
            let threshold = params.proposal_threshold(supply);
            let proposer_weight = self.voting_power(updated.proposer, snapshot_block).await?;
            if proposer_weight >= threshold {
                return Err(GovernanceError::NotAuthorized(format!(
                    "caller {} is not the guardian and proposer still meets the threshold",
                    caller
                )));
            }
        }

        updated.canceled = true;

        self.save_proposal(&updated).await?;
        warn!(proposal = proposal_id, %caller, "Proposal canceled");
        self.emit(GovernanceEvent::ProposalCanceled {
            proposal: proposal_id,
            by: caller,
        })
        .await;
        store.insert(updated);

        Ok(())
    }

    /// Execute a `Succeeded` proposal.
    ///
    /// `value` must equal the sum of the actions' declared values. Actions
    /// dispatch in order; the first failure aborts the call and the
    /// proposal stays unexecuted.
    pub async fn execute(
        &self,
        caller: Address,
        proposal_id: u64,
        value: u128,
    ) -> GovernanceResult<()> {
        let at = self.clock.now();
        let params = self.config.read().await.parameters;

        let mut store = self.store.write().await;
        let mut updated = store
            .get(proposal_id)
            .ok_or(GovernanceError::ProposalNotFound(proposal_id))?
            .clone();

        let current = state::evaluate(&updated, &params, at);
        if current != ProposalState::Succeeded {
            return Err(GovernanceError::WrongState {
                id: proposal_id,
                actual: current,
                reason: "only a succeeded proposal can be executed",
            });
        }

        let declared = updated.total_value();
        if declared != value {
            return Err(GovernanceError::ValueMismatch {
                declared,
                supplied: value,
            });
        }

        for (index, action) in updated.actions.iter().enumerate() {
            self.dispatcher
                .dispatch(action.target, &action.signature, &action.calldata, action.value)
                .await
                .map_err(|e| GovernanceError::DispatchFailed {
                    proposal: proposal_id,
                    index,
                    reason: e.to_string(),
                })?;
        }

        updated.executed = true;

        self.save_proposal(&updated).await?;
        info!(proposal = proposal_id, %caller, "Proposal executed");
        self.emit(GovernanceEvent::ProposalExecuted {
            proposal: proposal_id,
        })
        .await;
        store.insert(updated);

        Ok(())
    }

    /// The proposal's state at the current chain point.
    /// Fails for an unknown id; never reports a default state.
    pub async fn state(&self, proposal_id: u64) -> GovernanceResult<ProposalState> {
        let at = self.clock.now();
        let params = self.config.read().await.parameters;
        let store = self.store.read().await;
        let proposal = store
            .get(proposal_id)
            .ok_or(GovernanceError::ProposalNotFound(proposal_id))?;
        Ok(state::evaluate(proposal, &params, at))
    }

    /// The proposal's stored action list
    pub async fn get_actions(&self, proposal_id: u64) -> GovernanceResult<Vec<Action>> {
        let store = self.store.read().await;
        store
            .get(proposal_id)
            .map(|p| p.actions.clone())
            .ok_or(GovernanceError::ProposalNotFound(proposal_id))
    }

    /// A voter's receipt on a proposal, if they voted
    pub async fn get_receipt(
        &self,
        proposal_id: u64,
        voter: Address,
    ) -> GovernanceResult<Option<Receipt>> {
        let store = self.store.read().await;
        if store.get(proposal_id).is_none() {
            return Err(GovernanceError::ProposalNotFound(proposal_id));
        }
        Ok(store.receipt(proposal_id, &voter))
    }

    /// A full copy of the stored proposal
    pub async fn get_proposal(&self, proposal_id: u64) -> GovernanceResult<Proposal> {
        let store = self.store.read().await;
        store
            .get(proposal_id)
            .cloned()
            .ok_or(GovernanceError::ProposalNotFound(proposal_id))
    }

    /// The most recent proposal id created by `proposer`
    pub async fn latest_proposal_id(&self, proposer: Address) -> Option<u64> {
        self.store.read().await.latest_proposal_id(&proposer)
    }

    /// Apply a positional parameter update. Avatar only; zero-valued slots
    /// retain their prior value.
    pub async fn set_voting_parameters(
        &self,
        caller: Address,
        values: [u64; 9],
    ) -> GovernanceResult<()> {
        let mut config = self.config.write().await;
        if caller != config.avatar {
            return Err(GovernanceError::NotAuthorized(
                "only the avatar may set voting parameters".to_string(),
            ));
        }

        let mut updated = config.clone();
        updated.parameters.apply_update(values);
        self.save_config(&updated).await?;
        info!(?values, "Voting parameters updated");
        self.emit(GovernanceEvent::ParametersChanged {
            parameters: updated.parameters,
        })
        .await;
        *config = updated;
        Ok(())
    }

    /// Replace the guardian.
    ///
    /// Before the foundation release, and while a guardian exists, only the
    /// guardian itself may do this. After the release, or once the guardian
    /// has renounced, the authority moves to the avatar.
    pub async fn set_guardian(&self, caller: Address, new_guardian: Address) -> GovernanceResult<()> {
        let at = self.clock.now();
        let mut config = self.config.write().await;

        let guardian_era =
            at.timestamp < config.foundation_release && !config.guardian.is_zero();
        let allowed = if guardian_era {
            caller == config.guardian
        } else {
            caller == config.avatar
        };
        if !allowed {
            return Err(GovernanceError::NotAuthorized(format!(
                "caller {} may not set the guardian",
                caller
            )));
        }

        let previous = config.guardian;
        let mut updated = config.clone();
        updated.guardian = new_guardian;
        self.save_config(&updated).await?;
        info!(%previous, current = %new_guardian, "Guardian changed");
        self.emit(GovernanceEvent::GuardianChanged {
            previous,
            current: new_guardian,
        })
        .await;
        *config = updated;
        Ok(())
    }

    /// Renounce the guardian role, leaving succession to the avatar
    pub async fn renounce_guardian(&self, caller: Address) -> GovernanceResult<()> {
        let mut config = self.config.write().await;
        if config.guardian.is_zero() || caller != config.guardian {
            return Err(GovernanceError::NotAuthorized(
                "only the current guardian may renounce".to_string(),
            ));
        }

        let previous = config.guardian;
        let mut updated = config.clone();
        updated.guardian = Address::ZERO;
        self.save_config(&updated).await?;
        warn!(%previous, "Guardian renounced");
        self.emit(GovernanceEvent::GuardianChanged {
            previous,
            current: Address::ZERO,
        })
        .await;
        *config = updated;
        Ok(())
    }

    /// Current machine configuration
    pub async fn config(&self) -> MachineConfig {
        self.config.read().await.clone()
    }

    /// The chain point the machine currently observes
    pub fn now(&self) -> ChainPoint {
        self.clock.now()
    }

    /// All events emitted so far
    pub async fn events(&self) -> Vec<GovernanceEvent> {
        self.events.read().await.clone()
    }

    /// Take and clear the event journal
    pub async fn drain_events(&self) -> Vec<GovernanceEvent> {
        std::mem::take(&mut *self.events.write().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::RecordingDispatcher;
    use crate::oracle::MockOracle;
    use repgov_core::clock::SimClock;
    use repgov_core::storage::MemoryStorage;

    const AVATAR: u64 = 0xDA0;
    const GUARDIAN: u64 = 0x6A2D;

    async fn machine_with(
        foundation_release: Timestamp,
    ) -> (Arc<MockOracle>, Arc<SimClock>, VotingMachine) {
        let oracle = Arc::new(MockOracle::new());
        oracle.set_total_supply(0, 1_000_000).await;
        let clock = Arc::new(SimClock::new(ChainPoint::new(10, 1_000)));
        let machine = VotingMachine::new(
            oracle.clone(),
            Arc::new(RecordingDispatcher::new()),
            Arc::new(MemoryStorage::new()),
            clock.clone(),
            MachineConfig {
                avatar: Address::from_low_u64(AVATAR),
                guardian: Address::from_low_u64(GUARDIAN),
                foundation_release,
                parameters: VotingParameters::default(),
            },
        )
        .await
        .unwrap();
        (oracle, clock, machine)
    }

    #[tokio::test]
    async fn test_set_parameters_requires_avatar() {
        let (_, _, machine) = machine_with(10_000).await;

        let err = machine
            .set_voting_parameters(Address::from_low_u64(1), [0; 9])
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::NotAuthorized(_)));

        machine
            .set_voting_parameters(Address::from_low_u64(AVATAR), [0, 111_111, 0, 0, 0, 0, 0, 0, 0])
            .await
            .unwrap();
        assert_eq!(machine.config().await.parameters.quorum_ppm, 111_111);
    }

    #[tokio::test]
    async fn test_guardian_succession_before_release() {
        let (_, _, machine) = machine_with(10_000).await;
        let guardian = Address::from_low_u64(GUARDIAN);
        let avatar = Address::from_low_u64(AVATAR);
        let next = Address::from_low_u64(77);

        // Before the release only the guardian may replace itself
        let err = machine.set_guardian(avatar, next).await.unwrap_err();
        assert!(matches!(err, GovernanceError::NotAuthorized(_)));
        machine.set_guardian(guardian, next).await.unwrap();
        assert_eq!(machine.config().await.guardian, next);
    }

    #[tokio::test]
    async fn test_guardian_succession_after_release() {
        let (_, clock, machine) = machine_with(10_000).await;
        clock.advance_time(20_000);

        let guardian = Address::from_low_u64(GUARDIAN);
        let avatar = Address::from_low_u64(AVATAR);
        let next = Address::from_low_u64(77);

        // After the release the guardian has lost succession authority
        let err = machine.set_guardian(guardian, next).await.unwrap_err();
        assert!(matches!(err, GovernanceError::NotAuthorized(_)));
        machine.set_guardian(avatar, next).await.unwrap();
        assert_eq!(machine.config().await.guardian, next);
    }

    #[tokio::test]
    async fn test_renounce_moves_succession_to_avatar() {
        let (_, _, machine) = machine_with(10_000).await;
        let guardian = Address::from_low_u64(GUARDIAN);
        let avatar = Address::from_low_u64(AVATAR);

        let err = machine.renounce_guardian(avatar).await.unwrap_err();
        assert!(matches!(err, GovernanceError::NotAuthorized(_)));

        machine.renounce_guardian(guardian).await.unwrap();
        assert!(machine.config().await.guardian.is_zero());

        // Renouncing twice is not possible
        let err = machine.renounce_guardian(guardian).await.unwrap_err();
        assert!(matches!(err, GovernanceError::NotAuthorized(_)));

        // Even before the release, succession now belongs to the avatar
        machine
            .set_guardian(avatar, Address::from_low_u64(88))
            .await
            .unwrap();
        assert_eq!(machine.config().await.guardian, Address::from_low_u64(88));
    }

    #[tokio::test]
    async fn test_persisted_config_wins_over_supplied() {
        let storage = Arc::new(MemoryStorage::new());
        let oracle = Arc::new(MockOracle::new());
        let clock = Arc::new(SimClock::default());

        let first = VotingMachine::new(
            oracle.clone(),
            Arc::new(RecordingDispatcher::new()),
            storage.clone(),
            clock.clone(),
            MachineConfig {
                avatar: Address::from_low_u64(AVATAR),
                guardian: Address::from_low_u64(GUARDIAN),
                foundation_release: 10_000,
                parameters: VotingParameters::default(),
            },
        )
        .await
        .unwrap();
        first
            .set_voting_parameters(Address::from_low_u64(AVATAR), [42, 0, 0, 0, 0, 0, 0, 0, 0])
            .await
            .unwrap();
        drop(first);

        let second = VotingMachine::new(
            oracle,
            Arc::new(RecordingDispatcher::new()),
            storage,
            clock,
            MachineConfig {
                avatar: Address::from_low_u64(AVATAR),
                guardian: Address::from_low_u64(GUARDIAN),
                foundation_release: 10_000,
                parameters: VotingParameters::default(),
            },
        )
        .await
        .unwrap();
        assert_eq!(second.config().await.parameters.voting_period, 42);
    }
}
