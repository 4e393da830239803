mod backoff;
pub mod codec;
pub mod config;
pub mod events;
pub mod gateway;
pub mod ledger;
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
pub mod relayer;
pub mod shutdown;
pub mod telemetry;

pub use codec::{EncryptedMove, EncryptionContext, Encryptor, MoveCodec};
pub use config::{ConfigError, ConnectionArgs, Tunables, ValidatedConfig};
pub use events::{ScanConfig, Stream};
pub use gateway::{DecryptionProtocol, Decryptor, GatewayClient, GatewayError, HttpGateway};
pub use ledger::{Confirmation, Ledger, LedgerClient};
pub use relayer::RelayerEncryptor;
use thiserror::Error;

/// Error type for ledger operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("{method} rejected: {reason}")]
    Rejected {
        method: &'static str,
        reason: String,
    },
    #[error("{method} reverted in {tx_hash}")]
    Reverted {
        method: &'static str,
        tx_hash: String,
    },
    #[error("{method} transaction {tx_hash} dropped before confirmation")]
    Dropped {
        method: &'static str,
        tx_hash: String,
    },
    #[error("receipt is missing {0} event")]
    MissingEvent(&'static str),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("invalid ledger value: {0}")]
    InvalidValue(#[from] veilrps_types::ParseError),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, Error>;
