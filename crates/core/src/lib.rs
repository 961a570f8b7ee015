//! Core primitives for the repgov voting machine
//!
//! This crate provides the fundamental building blocks shared by the
//! governance components: chain-level types (accounts, block numbers,
//! timestamps), the injected chain clock, and the async storage layer.

pub mod clock;
pub mod storage;
pub mod types;

// Re-export key components
pub use clock::{ChainClock, SimClock};
pub use storage::{FileStorage, JsonStorage, MemoryStorage, Storage, StorageError, StorageResult};
pub use types::{Address, AddressParseError, BlockNumber, ChainPoint, Timestamp, TokenAmount};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for repgov binaries
pub fn init_tracing() {
    use tracing_subscriber::FmtSubscriber;

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global tracing subscriber");
}
