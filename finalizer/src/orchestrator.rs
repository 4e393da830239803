//! Turns `NeedsFinalization` events into committed results.
//!
//! Each event runs in its own task. A game is claimed in [PendingFinalizations]
//! before any work starts, so redelivered or duplicated events never lead to a
//! second `finalizeResult` from this process.

use crate::{
    metrics::Metrics,
    pending::{PendingFinalizations, Phase},
};
use futures::{Stream, StreamExt};
use std::{fmt::Display, future::Future, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use veilrps_client::{
    shutdown::{drain, log_join},
    Confirmation, Decryptor, GatewayError, Ledger,
};
use veilrps_types::{
    winner, CiphertextHandle, GameId, NeedsFinalization, Observed, Outcome, Slot, Symbol,
};

#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error("failed to decrypt {slot} move: {source}")]
    Decrypt {
        slot: Slot,
        #[source]
        source: GatewayError,
    },
    #[error("failed to submit result: {0}")]
    Submit(#[source] veilrps_client::Error),
}

/// What happened to a single event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Handled {
    Finalized {
        outcome: Outcome,
        confirmation: Confirmation,
    },
    /// The ledger already holds a result.
    AlreadyFinalized,
    /// Another task claimed the game first.
    Duplicate(Phase),
}

pub struct Orchestrator<L, D> {
    ledger: L,
    decryptor: Arc<D>,
    pending: PendingFinalizations,
    metrics: Metrics,
}

impl<L: Clone, D> Clone for Orchestrator<L, D> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            decryptor: self.decryptor.clone(),
            pending: self.pending.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<L: Ledger, D: Decryptor> Orchestrator<L, D> {
    pub fn new(ledger: L, decryptor: D, metrics: Metrics) -> Self {
        Self {
            ledger,
            decryptor: Arc::new(decryptor),
            pending: PendingFinalizations::new(),
            metrics,
        }
    }

    pub fn pending(&self) -> &PendingFinalizations {
        &self.pending
    }

    /// Finalize the game named by `event`, at most once per process.
    pub async fn handle(&self, event: NeedsFinalization) -> Result<Handled, FinalizeError> {
        let game_id = event.game_id;
        if let Err(phase) = self.pending.try_begin(game_id) {
            self.metrics.duplicate_events.inc();
            debug!(game_id, ?phase, "game already claimed, ignoring event");
            return Ok(Handled::Duplicate(phase));
        }

        let result = self.finalize(&event).await;
        match &result {
            Ok(Handled::Finalized { .. }) => {
                self.pending.advance(game_id, Phase::Done);
                self.metrics.finalized.inc();
            }
            Ok(Handled::AlreadyFinalized) => {
                self.pending.advance(game_id, Phase::Done);
                self.metrics.already_finalized.inc();
            }
            Ok(Handled::Duplicate(_)) => {}
            Err(_) => {
                self.pending.advance(game_id, Phase::Failed);
                self.metrics.failed.inc();
            }
        }
        result
    }

    async fn finalize(&self, event: &NeedsFinalization) -> Result<Handled, FinalizeError> {
        let game_id = event.game_id;
        match self.ledger.game(game_id).await {
            Ok(Some(game)) if game.is_finalized() => {
                info!(game_id, "game already finalized on ledger");
                return Ok(Handled::AlreadyFinalized);
            }
            Ok(_) => {}
            Err(err) => warn!(game_id, ?err, "failed to read game state, continuing"),
        }

        let first = self
            .decrypt(game_id, Slot::First, event.handle(Slot::First))
            .await?;
        let second = self
            .decrypt(game_id, Slot::Second, event.handle(Slot::Second))
            .await?;

        self.pending.advance(game_id, Phase::Computing);
        let outcome = winner(first, second);
        debug!(game_id, %first, %second, %outcome, "computed outcome");

        self.pending.advance(game_id, Phase::Submitting);
        let confirmation = self
            .ledger
            .finalize_result(game_id, outcome)
            .await
            .map_err(FinalizeError::Submit)?;
        Ok(Handled::Finalized {
            outcome,
            confirmation,
        })
    }

    async fn decrypt(
        &self,
        game_id: GameId,
        slot: Slot,
        handle: CiphertextHandle,
    ) -> Result<Symbol, FinalizeError> {
        let symbol = self
            .decryptor
            .decrypt(handle)
            .await
            .map_err(|source| FinalizeError::Decrypt { slot, source })?;
        debug!(game_id, %slot, %handle, "decrypted move");
        Ok(symbol)
    }

    async fn process(self, event: NeedsFinalization) {
        let game_id = event.game_id;
        match self.handle(event).await {
            Ok(Handled::Finalized {
                outcome,
                confirmation,
            }) => info!(
                game_id,
                %outcome,
                tx_hash = %confirmation.tx_hash,
                block = ?confirmation.block_number,
                "game finalized"
            ),
            Ok(Handled::AlreadyFinalized) | Ok(Handled::Duplicate(_)) => {}
            Err(err) => error!(game_id, %err, "finalization failed"),
        }
    }

    /// Consume `events` until it ends or `shutdown` resolves.
    ///
    /// In-flight tasks then get `drain_window` to finish before they are aborted.
    /// Returns the number of aborted tasks.
    pub async fn run<S, E>(
        &self,
        mut events: S,
        shutdown: impl Future<Output = ()>,
        drain_window: Duration,
    ) -> usize
    where
        S: Stream<Item = Result<Observed<NeedsFinalization>, E>> + Unpin,
        E: Display,
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
                    log_join(joined, "finalization");
                }
                next = events.next() => match next {
                    Some(Ok(observed)) => {
                        self.metrics.events_received.inc();
                        info!(
                            game_id = observed.event.game_id,
                            block = observed.block_number,
                            log_index = observed.log_index,
                            "game needs finalization"
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
