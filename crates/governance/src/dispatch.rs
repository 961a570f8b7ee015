//! Dispatch boundary
//!
//! Execution hands fully-formed calls to an external controller; this crate
//! only needs a capability interface for it. Representing the controller as
//! a trait keeps the executor's all-or-nothing contract testable without a
//! chain underneath.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use repgov_core::types::Address;

/// Errors surfaced by a dispatcher
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The underlying call reverted
    #[error("Call to {target} reverted: {reason}")]
    Reverted { target: Address, reason: String },

    /// Backend-specific failure
    #[error("{0}")]
    Other(String),
}

/// Dispatches a proposal's actions through the DAO controller
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Perform one call. Any `Err` aborts the whole execution.
    async fn dispatch(
        &self,
        target: Address,
        signature: &str,
        calldata: &[u8],
        value: u128,
    ) -> Result<(), DispatchError>;
}

/// One call as seen by the [`RecordingDispatcher`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchedCall {
    pub target: Address,
    pub signature: String,
    pub calldata: Vec<u8>,
    pub value: u128,
}

/// A dispatcher that records every call and can be armed to fail at a
/// given call index, for exercising execution atomicity.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    calls: RwLock<Vec<DispatchedCall>>,
    fail_at: RwLock<Option<usize>>,
}

impl RecordingDispatcher {
    /// Create a dispatcher that accepts every call
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the call with the given zero-based index revert
    pub async fn fail_at(&self, index: usize) {
        *self.fail_at.write().await = Some(index);
    }

    /// All calls dispatched so far, including the failing one
    pub async fn calls(&self) -> Vec<DispatchedCall> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn dispatch(
        &self,
        target: Address,
        signature: &str,
        calldata: &[u8],
        value: u128,
    ) -> Result<(), DispatchError> {
        let mut calls = self.calls.write().await;
        let index = calls.len();
        calls.push(DispatchedCall {
            target,
            signature: signature.to_string(),
            calldata: calldata.to_vec(),
            value,
        });
        drop(calls);

        if *self.fail_at.read().await == Some(index) {
            return Err(DispatchError::Reverted {
                target,
                reason: format!("armed failure at action {}", index),
            });
        }

        info!(%target, signature, value = %value, "Dispatched action");
        Ok(())
    }
}
