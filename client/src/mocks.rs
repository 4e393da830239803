//! In-memory stand-ins for the ledger and the FHE services.

use crate::{
    codec::{EncryptError, EncryptedMove, EncryptionContext, Encryptor},
    gateway::{DecryptionProtocol, DecryptionRequest, GatewayConfig, GatewayError, GatewayTransport},
    ledger::{Confirmation, Ledger},
    Error, Result,
};
use ethers::{
    types::{transaction::eip712::Eip712, Signature, H256},
    utils::keccak256,
};
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};
use veilrps_types::{
    Address, CiphertextHandle, Game, GameId, GameResult, GameStatus, Outcome, Slot,
};

/// Verifying contract used by [SimulatedFhe] authorizations.
pub const SIMULATED_VERIFIER: Address = Address([0x5d; 20]);

#[derive(Default)]
struct FheState {
    values: HashMap<CiphertextHandle, (u64, EncryptionContext)>,
    nonce: u64,
    encrypt_calls: usize,
    decrypt_calls: usize,
    delay: Duration,
    unavailable: bool,
}

/// Encryptor and gateway sharing one plaintext table.
///
/// Decryption checks the authorization signature and that it is scoped to the
/// contract the ciphertext was bound to.
#[derive(Clone, Default)]
pub struct SimulatedFhe {
    state: Arc<Mutex<FheState>>,
}

impl SimulatedFhe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings a [crate::GatewayClient] needs to talk to this simulator.
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            protocol: DecryptionProtocol::UserDecrypt,
            verifier: SIMULATED_VERIFIER,
            validity_days: Some(1),
            timeout: Duration::from_secs(5),
        }
    }

    /// Store an arbitrary plaintext, including values no honest encoder produces.
    pub fn insert(&self, value: u64, context: EncryptionContext) -> CiphertextHandle {
        let mut state = self.state.lock().unwrap();
        let handle = Self::next_handle(&mut state, context);
        state.values.insert(handle, (value, context));
        handle
    }

    pub fn binding(&self, handle: CiphertextHandle) -> Option<EncryptionContext> {
        let state = self.state.lock().unwrap();
        state.values.get(&handle).map(|(_, context)| *context)
    }

    pub fn encrypt_calls(&self) -> usize {
        self.state.lock().unwrap().encrypt_calls
    }

    pub fn decrypt_calls(&self) -> usize {
        self.state.lock().unwrap().decrypt_calls
    }

    /// Delay every decryption by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = delay;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    fn next_handle(state: &mut FheState, context: EncryptionContext) -> CiphertextHandle {
        state.nonce += 1;
        let mut preimage = Vec::with_capacity(48);
        preimage.extend_from_slice(context.contract.as_ref());
        preimage.extend_from_slice(context.submitter.as_ref());
        preimage.extend_from_slice(&state.nonce.to_be_bytes());
        CiphertextHandle(keccak256(preimage))
    }

    fn verify(request: &DecryptionRequest) -> std::result::Result<(), GatewayError> {
        let signed = &request.authorization;
        let typed = signed.authorization.typed_data(
            request.protocol,
            request.chain_id,
            SIMULATED_VERIFIER,
        )?;
        let digest = typed
            .encode_eip712()
            .map_err(|err| GatewayError::Authorization(err.to_string()))?;
        let signature = Signature::try_from(signed.signature.as_slice())
            .map_err(|err| GatewayError::Authorization(err.to_string()))?;
        let recovered = signature
            .recover(H256::from(digest))
            .map_err(|err| GatewayError::Authorization(err.to_string()))?;
        if recovered.0 != signed.signer.0 {
            return Err(GatewayError::Rejected {
                status: 403,
                body: "signature does not match signer".to_string(),
            });
        }
        if signed.authorization.public_key != request.keypair.public_key() {
            return Err(GatewayError::Rejected {
                status: 403,
                body: "authorization is for another key".to_string(),
            });
        }
        Ok(())
    }
}

impl Encryptor for SimulatedFhe {
    async fn encrypt(
        &self,
        value: u8,
        context: EncryptionContext,
    ) -> std::result::Result<EncryptedMove, EncryptError> {
        let mut state = self.state.lock().unwrap();
        state.encrypt_calls += 1;
        if state.unavailable {
            return Err(EncryptError::Unavailable("simulated outage".to_string()));
        }
        let handle = Self::next_handle(&mut state, context);
        state.values.insert(handle, (value as u64, context));

        let mut proof = handle.as_ref().to_vec();
        proof.extend_from_slice(context.submitter.as_ref());
        Ok(EncryptedMove { handle, proof })
    }
}

impl GatewayTransport for SimulatedFhe {
    async fn submit(&self, request: DecryptionRequest) -> std::result::Result<u64, GatewayError> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.decrypt_calls += 1;
            if state.unavailable {
                return Err(GatewayError::Unavailable("simulated outage".to_string()));
            }
            state.delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Self::verify(&request)?;

        let state = self.state.lock().unwrap();
        let Some((value, context)) = state.values.get(&request.handle) else {
            return Err(GatewayError::Rejected {
                status: 404,
                body: format!("unknown handle {}", request.handle),
            });
        };
        if context.contract != request.authorization.authorization.contract {
            return Err(GatewayError::Rejected {
                status: 403,
                body: "handle belongs to another contract".to_string(),
            });
        }
        Ok(*value)
    }
}

/// Ledger method names, used to inject failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    CreateGame,
    JoinGame,
    SubmitMove,
    FinalizeResult,
    Game,
}

impl Method {
    fn name(self) -> &'static str {
        match self {
            Method::CreateGame => "createGame",
            Method::JoinGame => "joinGame",
            Method::SubmitMove => "submitMove",
            Method::FinalizeResult => "finalizeResult",
            Method::Game => "games",
        }
    }
}

/// A write observed by [MockLedger].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    CreateGame { account: Address, wager: u128 },
    JoinGame { account: Address, game_id: GameId },
    SubmitMove { account: Address, game_id: GameId, ciphertext: Vec<u8> },
    FinalizeResult { account: Address, game_id: GameId, outcome: Outcome },
}

#[derive(Default)]
struct LedgerState {
    next_game: GameId,
    games: HashMap<GameId, Game>,
    calls: Vec<Call>,
    failing: HashSet<Method>,
    tx_count: u64,
}

/// Ledger kept in memory.
///
/// Clones share state. Use [MockLedger::as_account] to act as another player.
#[derive(Clone)]
pub struct MockLedger {
    account: Address,
    contract: Address,
    write_delay: Duration,
    state: Arc<Mutex<LedgerState>>,
}

impl MockLedger {
    pub fn new(account: Address, contract: Address) -> Self {
        Self {
            account,
            contract,
            write_delay: Duration::ZERO,
            state: Arc::new(Mutex::new(LedgerState {
                next_game: 1,
                ..Default::default()
            })),
        }
    }

    /// Same ledger, signing as `account`.
    pub fn as_account(&self, account: Address) -> Self {
        Self {
            account,
            ..self.clone()
        }
    }

    /// Delay every write by `delay` before it is applied.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    pub fn fail(&self, method: Method) {
        self.state.lock().unwrap().failing.insert(method);
    }

    pub fn recover(&self, method: Method) {
        self.state.lock().unwrap().failing.remove(&method);
    }

    pub fn insert_game(&self, game: Game) {
        let mut state = self.state.lock().unwrap();
        state.next_game = state.next_game.max(game.id + 1);
        state.games.insert(game.id, game);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn join_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::JoinGame { .. }))
            .count()
    }

    pub fn finalize_calls(&self, game_id: GameId) -> usize {
        self.calls()
            .iter()
            .filter(|call| {
                matches!(call, Call::FinalizeResult { game_id: id, .. } if *id == game_id)
            })
            .count()
    }

    pub fn stored_game(&self, game_id: GameId) -> Option<Game> {
        self.state.lock().unwrap().games.get(&game_id).cloned()
    }

    async fn write<T>(
        &self,
        method: Method,
        call: Call,
        apply: impl FnOnce(&mut LedgerState) -> std::result::Result<T, String>,
    ) -> Result<T> {
        if !self.write_delay.is_zero() {
            tokio::time::sleep(self.write_delay).await;
        }
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.failing.contains(&method) {
            return Err(Error::Transport(format!("{} failed", method.name())));
        }
        state.tx_count += 1;
        apply(&mut state).map_err(|reason| Error::Rejected {
            method: method.name(),
            reason,
        })
    }

    fn confirmation(state: &LedgerState) -> Confirmation {
        Confirmation {
            tx_hash: format!("0x{:064x}", state.tx_count),
            block_number: Some(state.tx_count),
        }
    }
}

impl Ledger for MockLedger {
    fn account(&self) -> Address {
        self.account
    }

    fn contract(&self) -> Address {
        self.contract
    }

    async fn create_game(&self, wager: u128) -> Result<GameId> {
        let account = self.account;
        self.write(
            Method::CreateGame,
            Call::CreateGame { account, wager },
            |state| {
                let id = state.next_game;
                state.next_game += 1;
                state.games.insert(
                    id,
                    Game {
                        id,
                        creator: account,
                        opponent: None,
                        moves: [None, None],
                        status: GameStatus::Created,
                        result: GameResult::Unresolved,
                        wager,
                    },
                );
                Ok(id)
            },
        )
        .await
    }

    async fn join_game(&self, game_id: GameId) -> Result<Confirmation> {
        let account = self.account;
        self.write(
            Method::JoinGame,
            Call::JoinGame { account, game_id },
            |state| {
                let game = state.games.get_mut(&game_id).ok_or("unknown game")?;
                if game.creator == account {
                    return Err("cannot join own game".to_string());
                }
                if game.status != GameStatus::Created {
                    return Err("game already joined".to_string());
                }
                game.opponent = Some(account);
                game.status = GameStatus::Joined;
                Ok(Self::confirmation(state))
            },
        )
        .await
    }

    async fn submit_move(&self, game_id: GameId, ciphertext: Vec<u8>) -> Result<Confirmation> {
        let account = self.account;
        let mut handle = [0u8; 32];
        let len = ciphertext.len().min(32);
        handle[..len].copy_from_slice(&ciphertext[..len]);
        self.write(
            Method::SubmitMove,
            Call::SubmitMove {
                account,
                game_id,
                ciphertext,
            },
            |state| {
                let game = state.games.get_mut(&game_id).ok_or("unknown game")?;
                let slot = if game.creator == account {
                    Slot::First
                } else if game.opponent == Some(account) {
                    Slot::Second
                } else {
                    return Err("not a player".to_string());
                };
                if game.moves[slot.index()].is_some() {
                    return Err("move already submitted".to_string());
                }
                game.moves[slot.index()] = Some(CiphertextHandle(handle));
                game.status = if game.moves.iter().all(Option::is_some) {
                    GameStatus::AwaitingFinalization
                } else {
                    GameStatus::MovesSubmitted
                };
                Ok(Self::confirmation(state))
            },
        )
        .await
    }

    async fn finalize_result(&self, game_id: GameId, outcome: Outcome) -> Result<Confirmation> {
        let account = self.account;
        self.write(
            Method::FinalizeResult,
            Call::FinalizeResult {
                account,
                game_id,
                outcome,
            },
            |state| {
                let game = state.games.get_mut(&game_id).ok_or("unknown game")?;
                if game.is_finalized() {
                    return Err("game already finalized".to_string());
                }
                game.status = GameStatus::Finalized;
                game.result = GameResult::Decided(outcome);
                Ok(Self::confirmation(state))
            },
        )
        .await
    }

    async fn game(&self, game_id: GameId) -> Result<Option<Game>> {
        let state = self.state.lock().unwrap();
        if state.failing.contains(&Method::Game) {
            return Err(Error::Transport("games failed".to_string()));
        }
        Ok(state.games.get(&game_id).cloned())
    }
}
