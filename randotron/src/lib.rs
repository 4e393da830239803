//! Auto-play agent: joins every game opened by someone else and submits a
//! uniformly random encrypted move.

use futures::{Stream, StreamExt};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::{
    collections::HashSet,
    fmt::Display,
    future::Future,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use veilrps_client::{
    codec::CodecError,
    shutdown::{drain, log_join},
    Confirmation, EncryptionContext, Encryptor, Ledger, MoveCodec,
};
use veilrps_types::{GameCreated, GameId, Observed, Symbol};

pub const SEED_LENGTH: usize = 32;

#[derive(Debug, Error)]
pub enum PlayError {
    #[error("failed to join: {0}")]
    Join(#[source] veilrps_client::Error),
    #[error("failed to encode move: {0}")]
    Encode(#[source] CodecError),
    #[error("failed to submit move: {0}")]
    Submit(#[source] veilrps_client::Error),
}

/// Why a `GameCreated` event was not played.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Skipped {
    /// The agent created the game itself.
    OwnGame,
    /// The game was already claimed by an earlier event.
    AlreadySeen,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Played {
    Moved {
        symbol: Symbol,
        join: Confirmation,
        submit: Confirmation,
    },
    Skipped(Skipped),
}

/// Main engine for the randotron.
pub struct Agent<L, E> {
    ledger: L,
    codec: Arc<MoveCodec<E>>,
    seen: Arc<Mutex<HashSet<GameId>>>,
    rng: Arc<Mutex<ChaCha20Rng>>,
}

impl<L: Clone, E> Clone for Agent<L, E> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            codec: self.codec.clone(),
            seen: self.seen.clone(),
            rng: self.rng.clone(),
        }
    }
}

impl<L: Ledger, E: Encryptor> Agent<L, E> {
    /// Moves are bound to the ledger's contract and account.
    pub fn new(ledger: L, encryptor: E, seed: [u8; SEED_LENGTH]) -> Self {
        let context = EncryptionContext {
            contract: ledger.contract(),
            submitter: ledger.account(),
        };
        Self {
            ledger,
            codec: Arc::new(MoveCodec::new(encryptor, context)),
            seen: Arc::new(Mutex::new(HashSet::new())),
            rng: Arc::new(Mutex::new(ChaCha20Rng::from_seed(seed))),
        }
    }

    fn claim(&self, game_id: GameId) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(game_id)
    }

    fn draw(&self) -> Symbol {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        Symbol::random(&mut *rng)
    }

    /// Join `event`'s game and submit a random move.
    pub async fn handle(&self, event: GameCreated) -> Result<Played, PlayError> {
        let game_id = event.game_id;
        if event.creator == self.ledger.account() {
            debug!(game_id, "skipping own game");
            return Ok(Played::Skipped(Skipped::OwnGame));
        }
        if !self.claim(game_id) {
            debug!(game_id, "game already seen");
            return Ok(Played::Skipped(Skipped::AlreadySeen));
        }

        let join = self
            .ledger
            .join_game(game_id)
            .await
            .map_err(PlayError::Join)?;
        info!(game_id, tx_hash = %join.tx_hash, "joined game");

        let symbol = self.draw();
        let encrypted = self
            .codec
            .encode(symbol.id())
            .await
            .map_err(PlayError::Encode)?;
        let submit = self
            .ledger
            .submit_move(game_id, encrypted.calldata())
            .await
            .map_err(PlayError::Submit)?;
        Ok(Played::Moved {
            symbol,
            join,
            submit,
        })
    }

    async fn process(self, event: GameCreated) {
        let game_id = event.game_id;
        match self.handle(event).await {
            Ok(Played::Moved { submit, .. }) => {
                info!(game_id, tx_hash = %submit.tx_hash, "submitted move")
            }
            Ok(Played::Skipped(_)) => {}
            Err(err) => error!(game_id, %err, "failed to play game"),
        }
    }

    /// Play every game announced on `events` until it ends or `shutdown` resolves.
    ///
    /// Returns the number of tasks aborted after the drain window.
    pub async fn run<S, Err>(
        &self,
        mut events: S,
        shutdown: impl Future<Output = ()>,
        drain_window: Duration,
    ) -> usize
    where
        S: Stream<Item = Result<Observed<GameCreated>, Err>> + Unpin,
        Err: Display,
    {
        let mut tasks = JoinSet::new();
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown requested");
                    break;
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    log_join(joined, "play");
                }
                next = events.next() => match next {
                    Some(Ok(observed)) => {
                        info!(
                            game_id = observed.event.game_id,
                            creator = %observed.event.creator,
                            block = observed.block_number,
                            "game created"
                        );
                        tasks.spawn(self.clone().process(observed.event));
                    }
                    Some(Err(err)) => warn!(%err, "failed to decode event"),
                    None => {
                        info!(in_flight = tasks.len(), "event stream ended");
                        break;
                    }
                },
            }
        }
        drain(tasks, drain_window).await
    }
}
