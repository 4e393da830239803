//! Off-chain finalization for veilrps games.
//!
//! The [orchestrator::Orchestrator] watches for games whose moves are both
//! committed, decrypts the two moves through the gateway, and commits the
//! winner back to the ledger.

pub mod metrics;
pub mod orchestrator;
pub mod pending;

pub use metrics::Metrics;
pub use orchestrator::{FinalizeError, Handled, Orchestrator};
pub use pending::{PendingFinalizations, Phase};
