//! Governance scenario simulator
//!
//! Drives a full proposal lifecycle against the in-memory backends: two
//! proposals, one taking the normal timelock and one fast-tracked by an
//! absolute majority, with a guardian cancellation along the way. Useful
//! as an executable walkthrough of the machine's rules.
//!
//! Run with `RUST_LOG=info cargo run`.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use repgov::{
    Address, ChainPoint, MachineConfig, MemoryStorage, MockOracle, RecordingDispatcher, SimClock,
    VotingMachine, VotingParameters,
};

#[tokio::main]
async fn main() -> Result<()> {
    repgov_core::init_tracing();

    let avatar = Address::from_low_u64(0xA1);
    let guardian = Address::from_low_u64(0x6A);
    let proposer = Address::from_low_u64(1);
    let whale = Address::from_low_u64(2);
    let voter = Address::from_low_u64(3);

    // A small reputation distribution: 1.5M total supply.
    let oracle = Arc::new(MockOracle::new());
    oracle.set_total_supply(0, 1_500_000).await;
    oracle.set_voting_power(proposer, 0, 100_000).await;
    oracle.set_voting_power(whale, 0, 900_000).await;
    oracle.set_voting_power(voter, 0, 400_000).await;

    let clock = Arc::new(SimClock::new(ChainPoint::new(100, 1_000_000)));
    let dispatcher = Arc::new(RecordingDispatcher::new());

    let parameters = VotingParameters {
        voting_period: 100,
        voting_delay: 1,
        ..Default::default()
    };
    let machine = VotingMachine::new(
        oracle,
        dispatcher.clone(),
        Arc::new(MemoryStorage::new()),
        clock.clone(),
        MachineConfig {
            avatar,
            guardian,
            foundation_release: 2_000_000,
            parameters,
        },
    )
    .await?;

    // Proposal 1: routine parameter change, normal timelock.
    let id = machine
        .propose(
            proposer,
            vec![Address::from_low_u64(0xFEE)],
            vec![0],
            vec!["setFeeRecipient(address)".to_string()],
            vec![vec![0xA1]],
            "Route protocol fees to the community treasury",
        )
        .await?;
    let state = machine.state(id).await?;
    info!(id, %state, "Created");

    clock.advance_blocks(2);
    machine.cast_vote(voter, id, true).await?;
    machine.cast_vote(proposer, id, true).await?;
    let state = machine.state(id).await?;
    info!(id, %state, "After votes");

    clock.advance_blocks(100);
    clock.advance_time(parameters.queue_period + 1);
    let state = machine.state(id).await?;
    info!(id, %state, "Timelock elapsed");
    machine.execute(proposer, id, 0).await?;
    let state = machine.state(id).await?;
    info!(id, %state, "Executed");

    // Proposal 2: overwhelming support takes the fast track.
    let id = machine
        .propose(
            whale,
            vec![Address::from_low_u64(0xBEEF)],
            vec![0],
            vec!["pauseMarket()".to_string()],
            vec![Vec::new()],
            "Emergency market pause",
        )
        .await?;
    clock.advance_blocks(2);
    machine.cast_vote(whale, id, true).await?;
    let state = machine.state(id).await?;
    info!(id, %state, "Whale voted");

    clock.advance_blocks(100);
    clock.advance_time(parameters.fast_queue_period + 1);
    machine.execute(whale, id, 0).await?;
    let state = machine.state(id).await?;
    info!(id, %state, "Fast-tracked and executed");

    // Proposal 3: the guardian steps in.
    let id = machine
        .propose(
            proposer,
            vec![Address::from_low_u64(0xBAD)],
            vec![0],
            vec!["drainReserve()".to_string()],
            vec![Vec::new()],
            "Questionable reserve transfer",
        )
        .await?;
    machine.cancel(guardian, id).await?;
    let state = machine.state(id).await?;
    info!(id, %state, "Guardian canceled");

    println!("--- event journal ---");
    for event in machine.events().await {
        println!("{}", serde_json::to_string(&event)?);
    }
    println!("--- dispatched calls ---");
    for call in dispatcher.calls().await {
        println!("{} {} value={}", call.target, call.signature, call.value);
    }

    Ok(())
}
