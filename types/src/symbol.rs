use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of distinct symbols a player may commit to.
pub const SYMBOL_COUNT: u8 = 3;

/// A value outside of the symbol domain `{0, 1, 2}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid symbol: {0} (expected 0=Rock, 1=Paper or 2=Scissors)")]
pub struct InvalidSymbol(pub u64);

/// A move in Rock-Paper-Scissors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Symbol {
    Rock = 0,
    Paper = 1,
    Scissors = 2,
}

impl Symbol {
    pub const ALL: [Symbol; SYMBOL_COUNT as usize] =
        [Symbol::Rock, Symbol::Paper, Symbol::Scissors];

    /// Draw a symbol uniformly at random.
    pub fn random(rng: &mut impl Rng) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    /// The symbol this one defeats.
    pub fn beats(self) -> Self {
        // (a + 1) mod 3 beats a, so a beats (a + 2) mod 3
        Self::ALL[((self.id() + 2) % SYMBOL_COUNT) as usize]
    }

    pub fn name(self) -> &'static str {
        match self {
            Symbol::Rock => "Rock",
            Symbol::Paper => "Paper",
            Symbol::Scissors => "Scissors",
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u64> for Symbol {
    type Error = InvalidSymbol;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Symbol::Rock),
            1 => Ok(Symbol::Paper),
            2 => Ok(Symbol::Scissors),
            other => Err(InvalidSymbol(other)),
        }
    }
}

impl TryFrom<u8> for Symbol {
    type Error = InvalidSymbol;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Symbol::try_from(value as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_symbol_ids_round_trip() {
        for symbol in Symbol::ALL {
            assert_eq!(Symbol::try_from(symbol.id()), Ok(symbol));
        }
    }

    #[test]
    fn test_symbol_rejects_out_of_domain() {
        assert_eq!(Symbol::try_from(3u8), Err(InvalidSymbol(3)));
        assert_eq!(Symbol::try_from(5u64), Err(InvalidSymbol(5)));
        assert_eq!(Symbol::try_from(u64::MAX), Err(InvalidSymbol(u64::MAX)));
    }

    #[test]
    fn test_beats() {
        assert_eq!(Symbol::Rock.beats(), Symbol::Scissors);
        assert_eq!(Symbol::Paper.beats(), Symbol::Rock);
        assert_eq!(Symbol::Scissors.beats(), Symbol::Paper);
    }

    #[test]
    fn test_random_covers_domain() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let mut seen = [0usize; 3];
        for _ in 0..300 {
            seen[Symbol::random(&mut rng).id() as usize] += 1;
        }
        assert!(seen.iter().all(|count| *count > 0), "{seen:?}");
    }
}
