//! Per-game guard against finalizing twice.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use veilrps_types::GameId;

/// Progress of one game through the orchestrator.
///
/// A game with no entry is idle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Decrypting,
    Computing,
    Submitting,
    Done,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }
}

/// Games seen by this process.
///
/// Entries are never removed, so a failed game is not retried until restart.
#[derive(Clone, Default)]
pub struct PendingFinalizations {
    phases: Arc<Mutex<HashMap<GameId, Phase>>>,
}

impl PendingFinalizations {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<GameId, Phase>> {
        self.phases.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `game_id`, moving it from idle to [Phase::Decrypting].
    ///
    /// Returns the existing phase if the game was already claimed.
    pub fn try_begin(&self, game_id: GameId) -> Result<(), Phase> {
        let mut phases = self.lock();
        if let Some(phase) = phases.get(&game_id) {
            return Err(*phase);
        }
        phases.insert(game_id, Phase::Decrypting);
        Ok(())
    }

    pub fn advance(&self, game_id: GameId, phase: Phase) {
        self.lock().insert(game_id, phase);
    }

    pub fn phase(&self, game_id: GameId) -> Option<Phase> {
        self.lock().get(&game_id).copied()
    }

    /// Number of games not yet in a terminal phase.
    pub fn in_flight(&self) -> usize {
        self.lock()
            .values()
            .filter(|phase| !phase.is_terminal())
            .count()
    }
}
