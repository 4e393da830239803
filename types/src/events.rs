//! Ledger events observed by the finalizer and the auto-play agent.

use crate::{
    game::{Address, CiphertextHandle, GameId, Slot},
    outcome::Outcome,
};
use serde::{Deserialize, Serialize};

/// A new game is open for an opponent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameCreated {
    pub game_id: GameId,
    pub creator: Address,
}

/// Both moves are committed and the game waits for an off-chain result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeedsFinalization {
    pub game_id: GameId,
    pub first_move: CiphertextHandle,
    pub second_move: CiphertextHandle,
}

impl NeedsFinalization {
    pub fn handle(&self, slot: Slot) -> CiphertextHandle {
        match slot {
            Slot::First => self.first_move,
            Slot::Second => self.second_move,
        }
    }
}

/// Terminal event emitted once a result is committed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameFinalized {
    pub game_id: GameId,
    pub winner: Address,
    pub outcome: Outcome,
}

/// An event together with where it was found in the log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observed<T> {
    pub event: T,
    pub block_number: u64,
    pub log_index: u64,
}

impl<T> Observed<T> {
    pub fn new(event: T, block_number: u64, log_index: u64) -> Self {
        Self {
            event,
            block_number,
            log_index,
        }
    }
}
