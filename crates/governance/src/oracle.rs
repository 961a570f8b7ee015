//! Voting power oracle boundary
//!
//! The reputation token lives outside this crate. The machine only ever
//! asks two historical questions: an account's delegation-resolved weight
//! at a block, and the total supply at a block. Delegation chains are the
//! oracle's concern; the core never walks them.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use repgov_core::types::{Address, BlockNumber, TokenAmount};

/// Errors surfaced by a voting power oracle
#[derive(Error, Debug)]
pub enum OracleError {
    /// The oracle has no data at or before the requested block
    #[error("No supply data at or before block {0}")]
    UnknownBlock(BlockNumber),

    /// Backend-specific failure
    #[error("{0}")]
    Other(String),
}

/// Historical voting weight and supply queries
#[async_trait]
pub trait VotingPowerOracle: Send + Sync {
    /// The account's effective (delegation-resolved) voting weight at the
    /// given block
    async fn prior_voting_power(
        &self,
        account: Address,
        block: BlockNumber,
    ) -> Result<TokenAmount, OracleError>;

    /// Total voting supply at the given block
    async fn prior_total_supply(&self, block: BlockNumber) -> Result<TokenAmount, OracleError>;
}

/// Checkpoint-based in-memory oracle for tests and simulations.
///
/// Weights and supply are step functions of block height: a query at block
/// `b` answers with the latest checkpoint at or before `b`. Accounts with
/// no checkpoint have zero weight; a supply query before the first
/// checkpoint is an error, since quorum math against an unknown supply
/// would be meaningless.
#[derive(Debug, Default)]
pub struct MockOracle {
    weights: RwLock<HashMap<Address, Vec<(BlockNumber, TokenAmount)>>>,
    supply: RwLock<Vec<(BlockNumber, TokenAmount)>>,
}

impl MockOracle {
    /// Create an empty oracle
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an account's weight from `block` onwards
    pub async fn set_voting_power(&self, account: Address, block: BlockNumber, weight: TokenAmount) {
        let mut weights = self.weights.write().await;
        let checkpoints = weights.entry(account).or_default();
        checkpoints.push((block, weight));
        checkpoints.sort_by_key(|&(b, _)| b);
    }

    /// Record the total supply from `block` onwards
    pub async fn set_total_supply(&self, block: BlockNumber, supply: TokenAmount) {
        let mut checkpoints = self.supply.write().await;
        checkpoints.push((block, supply));
        checkpoints.sort_by_key(|&(b, _)| b);
    }

    fn lookup(checkpoints: &[(BlockNumber, TokenAmount)], block: BlockNumber) -> Option<TokenAmount> {
        checkpoints
            .iter()
            .rev()
            .find(|&&(b, _)| b <= block)
            .map(|&(_, amount)| amount)
    }
}

#[async_trait]
impl VotingPowerOracle for MockOracle {
    async fn prior_voting_power(
        &self,
        account: Address,
        block: BlockNumber,
    ) -> Result<TokenAmount, OracleError> {
        let weights = self.weights.read().await;
        Ok(weights
            .get(&account)
            .and_then(|cps| Self::lookup(cps, block))
            .unwrap_or(0))
    }

    async fn prior_total_supply(&self, block: BlockNumber) -> Result<TokenAmount, OracleError> {
        let supply = self.supply.read().await;
        Self::lookup(&supply, block).ok_or(OracleError::UnknownBlock(block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_oracle_checkpoints() {
        let oracle = MockOracle::new();
        let account = Address::from_low_u64(1);

        oracle.set_voting_power(account, 10, 500).await;
        oracle.set_voting_power(account, 20, 800).await;
        oracle.set_total_supply(1, 1_000_000).await;

        // Before the first checkpoint the account has no weight
        assert_eq!(oracle.prior_voting_power(account, 5).await.unwrap(), 0);
        assert_eq!(oracle.prior_voting_power(account, 10).await.unwrap(), 500);
        assert_eq!(oracle.prior_voting_power(account, 19).await.unwrap(), 500);
        assert_eq!(oracle.prior_voting_power(account, 25).await.unwrap(), 800);

        // Unknown accounts resolve to zero weight
        let stranger = Address::from_low_u64(2);
        assert_eq!(oracle.prior_voting_power(stranger, 25).await.unwrap(), 0);

        assert_eq!(oracle.prior_total_supply(50).await.unwrap(), 1_000_000);
        assert!(matches!(
            oracle.prior_total_supply(0).await,
            Err(OracleError::UnknownBlock(0))
        ));
    }
}
