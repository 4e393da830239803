//! Encrypted move encoding.

use crate::gateway::{Decryptor, GatewayError};
use std::future::Future;
use thiserror::Error;
use veilrps_types::{Address, CiphertextHandle, InvalidSymbol, Symbol};

/// Identity an encrypted move is bound to.
///
/// The ledger rejects a ciphertext whose proof was produced for another
/// (contract, submitter) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EncryptionContext {
    pub contract: Address,
    pub submitter: Address,
}

/// Output of the encryption capability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedMove {
    pub handle: CiphertextHandle,
    pub proof: Vec<u8>,
}

impl EncryptedMove {
    /// Bytes passed to `submitMove`.
    pub fn calldata(&self) -> Vec<u8> {
        self.proof.clone()
    }
}

#[derive(Debug, Error)]
pub enum EncryptError {
    #[error("encryption service unavailable: {0}")]
    Unavailable(String),
    #[error("encryption service rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("invalid encryption response: {0}")]
    InvalidResponse(String),
}

/// External capability producing a bound ciphertext and its proof.
pub trait Encryptor: Send + Sync + 'static {
    fn encrypt(
        &self,
        value: u8,
        context: EncryptionContext,
    ) -> impl Future<Output = Result<EncryptedMove, EncryptError>> + Send;
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error(transparent)]
    InvalidSymbol(#[from] InvalidSymbol),
    #[error(transparent)]
    Encrypt(#[from] EncryptError),
    #[error(transparent)]
    Decrypt(#[from] GatewayError),
}

/// Converts symbols to and from encrypted moves for one (contract, submitter) pair.
#[derive(Clone)]
pub struct MoveCodec<E> {
    encryptor: E,
    context: EncryptionContext,
}

impl<E: Encryptor> MoveCodec<E> {
    pub fn new(encryptor: E, context: EncryptionContext) -> Self {
        Self { encryptor, context }
    }

    pub fn context(&self) -> EncryptionContext {
        self.context
    }

    /// Validate `symbol` and encrypt it.
    pub async fn encode(&self, symbol: u8) -> Result<EncryptedMove, CodecError> {
        let symbol = Symbol::try_from(symbol)?;
        Ok(self.encryptor.encrypt(symbol.id(), self.context).await?)
    }

    /// Recover the symbol behind `handle` through an authorized decryptor.
    pub async fn decode<D: Decryptor>(
        &self,
        decryptor: &D,
        handle: CiphertextHandle,
    ) -> Result<Symbol, CodecError> {
        Ok(decryptor.decrypt(handle).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{gateway::GatewayClient, mocks::SimulatedFhe};
    use ethers::signers::{LocalWallet, Signer};

    fn context() -> EncryptionContext {
        EncryptionContext {
            contract: Address([0x11; 20]),
            submitter: Address([0x22; 20]),
        }
    }

    fn decryptor(fhe: &SimulatedFhe) -> GatewayClient<SimulatedFhe> {
        let signer = LocalWallet::new(&mut rand::thread_rng()).with_chain_id(31_337u64);
        GatewayClient::new(fhe.clone(), signer, context().contract, fhe.gateway_config())
    }

    #[tokio::test]
    async fn test_encode_then_decode() {
        let fhe = SimulatedFhe::new();
        let codec = MoveCodec::new(fhe.clone(), context());
        let gateway = decryptor(&fhe);
        for symbol in Symbol::ALL {
            let encrypted = codec.encode(symbol.id()).await.unwrap();
            assert!(!encrypted.handle.is_zero());
            assert_eq!(encrypted.calldata(), encrypted.proof);
            let decoded = codec.decode(&gateway, encrypted.handle).await.unwrap();
            assert_eq!(decoded, symbol);
        }
    }

    #[tokio::test]
    async fn test_encode_rejects_invalid_symbol() {
        let fhe = SimulatedFhe::new();
        let codec = MoveCodec::new(fhe.clone(), context());
        let err = codec.encode(3).await.unwrap_err();
        assert!(matches!(err, CodecError::InvalidSymbol(InvalidSymbol(3))));
        assert_eq!(fhe.encrypt_calls(), 0);
    }

    #[tokio::test]
    async fn test_encode_binds_context() {
        let fhe = SimulatedFhe::new();
        let codec = MoveCodec::new(fhe.clone(), context());
        let encrypted = codec.encode(Symbol::Rock.id()).await.unwrap();
        assert_eq!(fhe.binding(encrypted.handle), Some(context()));

        let other = MoveCodec::new(
            fhe.clone(),
            EncryptionContext {
                contract: Address([0x11; 20]),
                submitter: Address([0x33; 20]),
            },
        );
        let reencrypted = other.encode(Symbol::Rock.id()).await.unwrap();
        assert_ne!(reencrypted.handle, encrypted.handle);
        assert_ne!(reencrypted.proof, encrypted.proof);
    }
}
