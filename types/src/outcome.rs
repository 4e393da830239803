use crate::symbol::{Symbol, SYMBOL_COUNT};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid outcome: {0}")]
pub struct InvalidOutcome(pub u8);

/// Result of comparing two committed moves.
///
/// The discriminant is the value `finalizeResult` expects on the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Outcome {
    Draw = 0,
    Player1Wins = 1,
    Player2Wins = 2,
}

impl Outcome {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Draw => f.write_str("Draw"),
            Outcome::Player1Wins => f.write_str("Player 1"),
            Outcome::Player2Wins => f.write_str("Player 2"),
        }
    }
}

impl TryFrom<u8> for Outcome {
    type Error = InvalidOutcome;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Outcome::Draw),
            1 => Ok(Outcome::Player1Wins),
            2 => Ok(Outcome::Player2Wins),
            other => Err(InvalidOutcome(other)),
        }
    }
}

/// Decide a game from player 1's and player 2's moves.
pub fn winner(first: Symbol, second: Symbol) -> Outcome {
    if first == second {
        return Outcome::Draw;
    }
    if (first.id() + 1) % SYMBOL_COUNT == second.id() {
        return Outcome::Player2Wins;
    }
    Outcome::Player1Wins
}

#[cfg(test)]
mod tests {
    use super::*;
    use Symbol::*;

    #[test]
    fn test_winner_exhaustive() {
        let expected = [
            (Rock, Rock, Outcome::Draw),
            (Rock, Paper, Outcome::Player2Wins),
            (Rock, Scissors, Outcome::Player1Wins),
            (Paper, Rock, Outcome::Player1Wins),
            (Paper, Paper, Outcome::Draw),
            (Paper, Scissors, Outcome::Player2Wins),
            (Scissors, Rock, Outcome::Player2Wins),
            (Scissors, Paper, Outcome::Player1Wins),
            (Scissors, Scissors, Outcome::Draw),
        ];
        for (first, second, outcome) in expected {
            assert_eq!(winner(first, second), outcome, "{first} vs {second}");
        }
    }

    #[test]
    fn test_draw_iff_equal() {
        for first in Symbol::ALL {
            for second in Symbol::ALL {
                assert_eq!(winner(first, second) == Outcome::Draw, first == second);
            }
        }
    }

    #[test]
    fn test_swapping_players_swaps_winner() {
        for first in Symbol::ALL {
            for second in Symbol::ALL {
                let swapped = match winner(first, second) {
                    Outcome::Draw => Outcome::Draw,
                    Outcome::Player1Wins => Outcome::Player2Wins,
                    Outcome::Player2Wins => Outcome::Player1Wins,
                };
                assert_eq!(winner(second, first), swapped);
            }
        }
    }

    #[test]
    fn test_winner_agrees_with_beats() {
        for symbol in Symbol::ALL {
            assert_eq!(winner(symbol, symbol.beats()), Outcome::Player1Wins);
        }
    }

    #[test]
    fn test_outcome_codes() {
        assert_eq!(winner(Rock, Scissors).code(), 1);
        assert_eq!(winner(Scissors, Rock).code(), 2);
        assert_eq!(winner(Paper, Rock).code(), 1);
        assert_eq!(winner(Rock, Paper).code(), 2);
        for outcome in [Outcome::Draw, Outcome::Player1Wins, Outcome::Player2Wins] {
            assert_eq!(Outcome::try_from(outcome.code()), Ok(outcome));
        }
        assert_eq!(Outcome::try_from(3), Err(InvalidOutcome(3)));
    }
}
