//! Typed access to the game contract.

use crate::{
    events::{ScanConfig, Stream},
    Error, Result,
};
use ethers::{
    abi::Detokenize,
    contract::{parse_log, ContractCall, ContractError},
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::{Address as EvmAddress, Bytes, TransactionReceipt, U256, U64},
};
use std::{future::Future, sync::Arc};
use tracing::{debug, info};
use url::Url;
use veilrps_types::{
    Address, CiphertextHandle, Game, GameCreated, GameFinalized, GameId, GameResult, GameStatus,
    NeedsFinalization, Observed, Outcome,
};

pub mod bindings {
    ethers::contract::abigen!(
        PrivateRps,
        r#"[
            event GameCreated(uint256 indexed gameId, address indexed creator)
            event NeedsOffchainFinalize(uint256 indexed gameId, bytes32 firstMove, bytes32 secondMove)
            event GameFinalized(uint256 indexed gameId, address winner, uint8 outcome)
            function createGame(uint256 wager) external returns (uint256)
            function joinGame(uint256 gameId) external
            function submitMove(uint256 gameId, bytes encryptedMove) external
            function finalizeResult(uint256 gameId, uint8 winner) external
            function games(uint256 gameId) external view returns (address creator, address opponent, bytes32 firstMove, bytes32 secondMove, uint8 status, uint8 result, uint256 wager)
        ]"#
    );
}

use bindings::{GameCreatedFilter, GameFinalizedFilter, NeedsOffchainFinalizeFilter, PrivateRps};

/// Middleware stack used for every contract write.
pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// A write accepted by the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Confirmation {
    pub tx_hash: String,
    pub block_number: Option<u64>,
}

impl Confirmation {
    fn from_receipt(receipt: &TransactionReceipt) -> Self {
        Self {
            tx_hash: format!("{:#x}", receipt.transaction_hash),
            block_number: receipt.block_number.map(|number| number.as_u64()),
        }
    }
}

/// Ledger operations used by the finalizer and the auto-play agent.
///
/// Every write resolves only after the transaction is confirmed.
pub trait Ledger: Clone + Send + Sync + 'static {
    /// Account that signs writes.
    fn account(&self) -> Address;

    /// Game contract address.
    fn contract(&self) -> Address;

    fn create_game(&self, wager: u128) -> impl Future<Output = Result<GameId>> + Send;

    fn join_game(&self, game_id: GameId) -> impl Future<Output = Result<Confirmation>> + Send;

    fn submit_move(
        &self,
        game_id: GameId,
        ciphertext: Vec<u8>,
    ) -> impl Future<Output = Result<Confirmation>> + Send;

    fn finalize_result(
        &self,
        game_id: GameId,
        outcome: Outcome,
    ) -> impl Future<Output = Result<Confirmation>> + Send;

    /// Read a game, returning `None` if the ledger has never assigned `game_id`.
    fn game(&self, game_id: GameId) -> impl Future<Output = Result<Option<Game>>> + Send;
}

/// [Ledger] backed by a JSON-RPC endpoint.
#[derive(Clone)]
pub struct LedgerClient {
    provider: Provider<Http>,
    contract: PrivateRps<SignerClient>,
    signer: LocalWallet,
    account: Address,
    confirmations: usize,
}

impl LedgerClient {
    pub fn new(
        provider: Provider<Http>,
        wallet: LocalWallet,
        contract: Address,
        confirmations: u64,
    ) -> Self {
        let account = from_evm(wallet.address());
        let client = SignerMiddleware::new(provider.clone(), wallet.clone());
        let contract = PrivateRps::new(to_evm(contract), Arc::new(client));
        Self {
            provider,
            contract,
            signer: wallet,
            account,
            confirmations: confirmations.max(1) as usize,
        }
    }

    /// Connect to `rpc_url`, asking the node for its chain id when none is given.
    pub async fn connect(
        rpc_url: &Url,
        wallet: LocalWallet,
        contract: Address,
        chain_id: Option<u64>,
        confirmations: u64,
    ) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url.as_str())
            .map_err(|err| Error::Transport(err.to_string()))?;
        let chain_id = match chain_id {
            Some(chain_id) => chain_id,
            None => provider
                .get_chainid()
                .await
                .map_err(|err| Error::Transport(err.to_string()))?
                .as_u64(),
        };
        let wallet = wallet.with_chain_id(chain_id);
        info!(chain_id, account = %from_evm(wallet.address()), %contract, "connected to ledger");
        Ok(Self::new(provider, wallet, contract, confirmations))
    }

    /// Wallet signing writes, carrying the ledger's chain id.
    pub fn signer(&self) -> &LocalWallet {
        &self.signer
    }

    /// Watch `GameCreated` logs.
    pub fn game_created(&self, config: ScanConfig) -> Stream<Observed<GameCreated>> {
        Stream::scan(
            self.provider.clone(),
            self.contract.clone(),
            config,
            |log: GameCreatedFilter| {
                Ok(GameCreated {
                    game_id: game_id_from(log.game_id)?,
                    creator: from_evm(log.creator),
                })
            },
        )
    }

    /// Watch `NeedsOffchainFinalize` logs.
    pub fn needs_finalization(&self, config: ScanConfig) -> Stream<Observed<NeedsFinalization>> {
        Stream::scan(
            self.provider.clone(),
            self.contract.clone(),
            config,
            |log: NeedsOffchainFinalizeFilter| {
                Ok(NeedsFinalization {
                    game_id: game_id_from(log.game_id)?,
                    first_move: CiphertextHandle(log.first_move),
                    second_move: CiphertextHandle(log.second_move),
                })
            },
        )
    }

    /// Watch `GameFinalized` logs.
    pub fn game_finalized(&self, config: ScanConfig) -> Stream<Observed<GameFinalized>> {
        Stream::scan(
            self.provider.clone(),
            self.contract.clone(),
            config,
            finalized_event,
        )
    }

    async fn confirm<D: Detokenize>(
        &self,
        method: &'static str,
        call: ContractCall<SignerClient, D>,
    ) -> Result<TransactionReceipt> {
        let pending = call
            .send()
            .await
            .map_err(|err| contract_error(method, err))?;
        let tx_hash = format!("{:#x}", pending.tx_hash());
        debug!(method, %tx_hash, "transaction submitted");

        let receipt = pending
            .confirmations(self.confirmations)
            .await
            .map_err(|err| Error::Transport(err.to_string()))?
            .ok_or_else(|| Error::Dropped {
                method,
                tx_hash: tx_hash.clone(),
            })?;
        if receipt.status == Some(U64::zero()) {
            return Err(Error::Reverted { method, tx_hash });
        }
        debug!(method, %tx_hash, block = ?receipt.block_number, "transaction confirmed");
        Ok(receipt)
    }
}

impl Ledger for LedgerClient {
    fn account(&self) -> Address {
        self.account
    }

    fn contract(&self) -> Address {
        from_evm(self.contract.address())
    }

    async fn create_game(&self, wager: u128) -> Result<GameId> {
        let call = self.contract.create_game(U256::from(wager));
        let receipt = self.confirm("createGame", call).await?;
        created_game_id(self.contract.address(), &receipt)
    }

    async fn join_game(&self, game_id: GameId) -> Result<Confirmation> {
        let call = self.contract.join_game(U256::from(game_id));
        let receipt = self.confirm("joinGame", call).await?;
        Ok(Confirmation::from_receipt(&receipt))
    }

    async fn submit_move(&self, game_id: GameId, ciphertext: Vec<u8>) -> Result<Confirmation> {
        let call = self
            .contract
            .submit_move(U256::from(game_id), Bytes::from(ciphertext));
        let receipt = self.confirm("submitMove", call).await?;
        Ok(Confirmation::from_receipt(&receipt))
    }

    async fn finalize_result(&self, game_id: GameId, outcome: Outcome) -> Result<Confirmation> {
        let call = self
            .contract
            .finalize_result(U256::from(game_id), outcome.code());
        let receipt = self.confirm("finalizeResult", call).await?;
        Ok(Confirmation::from_receipt(&receipt))
    }

    async fn game(&self, game_id: GameId) -> Result<Option<Game>> {
        let (creator, opponent, first_move, second_move, status, result, wager) = self
            .contract
            .games(U256::from(game_id))
            .call()
            .await
            .map_err(|err| contract_error("games", err))?;
        if creator.is_zero() {
            return Ok(None);
        }
        if wager > U256::from(u128::MAX) {
            return Err(Error::InvalidData(format!("wager {wager} exceeds u128")));
        }
        Ok(Some(Game {
            id: game_id,
            creator: from_evm(creator),
            opponent: (!opponent.is_zero()).then(|| from_evm(opponent)),
            moves: [non_zero_handle(first_move), non_zero_handle(second_move)],
            status: GameStatus::try_from(status)?,
            result: GameResult::try_from(result)?,
            wager: wager.as_u128(),
        }))
    }
}

/// Recover the id assigned by `createGame` from its receipt.
///
/// Only `GameCreated` logs emitted by `contract` are considered.
pub fn created_game_id(contract: EvmAddress, receipt: &TransactionReceipt) -> Result<GameId> {
    receipt
        .logs
        .iter()
        .filter(|log| log.address == contract)
        .find_map(|log| parse_log::<GameCreatedFilter>(log.clone()).ok())
        .ok_or(Error::MissingEvent("GameCreated"))
        .and_then(|event| game_id_from(event.game_id))
}

fn finalized_event(log: GameFinalizedFilter) -> Result<GameFinalized> {
    Ok(GameFinalized {
        game_id: game_id_from(log.game_id)?,
        winner: from_evm(log.winner),
        outcome: Outcome::try_from(log.outcome)
            .map_err(|err| Error::InvalidData(err.to_string()))?,
    })
}

fn game_id_from(value: U256) -> Result<GameId> {
    if value > U256::from(u64::MAX) {
        return Err(Error::InvalidData(format!("game id {value} exceeds u64")));
    }
    Ok(value.as_u64())
}

fn non_zero_handle(bytes: [u8; 32]) -> Option<CiphertextHandle> {
    let handle = CiphertextHandle(bytes);
    (!handle.is_zero()).then_some(handle)
}

fn contract_error<M: Middleware>(method: &'static str, err: ContractError<M>) -> Error {
    if err.is_revert() {
        return Error::Rejected {
            method,
            reason: err.to_string(),
        };
    }
    Error::Transport(err.to_string())
}

pub(crate) fn to_evm(address: Address) -> EvmAddress {
    EvmAddress::from(address.0)
}

pub(crate) fn from_evm(address: EvmAddress) -> Address {
    Address(address.0)
}
