use crate::outcome::Outcome;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Identifier the ledger assigns to a game (monotonically increasing).
pub type GameId = u64;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("expected {expected} bytes of hex, got {got}")]
    InvalidLength { expected: usize, got: usize },
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("invalid {field}: {value}")]
    InvalidEnum { field: &'static str, value: u8 },
}

fn decode_fixed<const N: usize>(value: &str) -> Result<[u8; N], ParseError> {
    let trimmed = value.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let bytes = hex::decode(trimmed)?;
    let got = bytes.len();
    bytes.try_into().map_err(|_| ParseError::InvalidLength { expected: N, got })
}

macro_rules! fixed_hex {
    ($name:ident, $len:expr) => {
        impl $name {
            pub const LEN: usize = $len;

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(value: [u8; $len]) -> Self {
                Self(value)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode_fixed::<$len>(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(self, f)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = String::deserialize(deserializer)?;
                value.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

/// A 20-byte ledger account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

fixed_hex!(Address, 20);

impl Address {
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

/// Opaque reference to an encrypted move stored on the ledger.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CiphertextHandle(pub [u8; 32]);

fixed_hex!(CiphertextHandle, 32);

impl CiphertextHandle {
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

/// Player slot within a game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    First,
    Second,
}

impl Slot {
    pub fn index(self) -> usize {
        match self {
            Slot::First => 0,
            Slot::Second => 1,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::First => f.write_str("player 1"),
            Slot::Second => f.write_str("player 2"),
        }
    }
}

/// Lifecycle of a game as recorded by the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum GameStatus {
    Created = 0,
    Joined = 1,
    MovesSubmitted = 2,
    AwaitingFinalization = 3,
    Finalized = 4,
}

impl TryFrom<u8> for GameStatus {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(GameStatus::Created),
            1 => Ok(GameStatus::Joined),
            2 => Ok(GameStatus::MovesSubmitted),
            3 => Ok(GameStatus::AwaitingFinalization),
            4 => Ok(GameStatus::Finalized),
            value => Err(ParseError::InvalidEnum {
                field: "status",
                value,
            }),
        }
    }
}

/// Terminal result stored on the ledger (`Unresolved` until finalized).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameResult {
    Unresolved,
    Decided(Outcome),
}

impl TryFrom<u8> for GameResult {
    type Error = ParseError;

    /// Ledger encoding: 0 = unresolved, otherwise outcome code + 1.
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(GameResult::Unresolved),
            value => Outcome::try_from(value - 1)
                .map(GameResult::Decided)
                .map_err(|_| ParseError::InvalidEnum {
                    field: "result",
                    value,
                }),
        }
    }
}

/// Snapshot of a game read from the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub creator: Address,
    pub opponent: Option<Address>,
    pub moves: [Option<CiphertextHandle>; 2],
    pub status: GameStatus,
    pub result: GameResult,
    pub wager: u128,
}

impl Game {
    pub fn is_finalized(&self) -> bool {
        self.status == GameStatus::Finalized
    }

    pub fn move_handle(&self, slot: Slot) -> Option<CiphertextHandle> {
        self.moves[slot.index()]
    }

    /// Address credited with the win, if the game was decided in favor of a player.
    pub fn winner(&self) -> Option<Address> {
        match self.result {
            GameResult::Decided(Outcome::Player1Wins) => Some(self.creator),
            GameResult::Decided(Outcome::Player2Wins) => self.opponent,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse_and_display() {
        let text = "0x5fbdb2315678afecb367f032d93f642f64180aa3";
        let address: Address = text.parse().unwrap();
        assert_eq!(address.to_string(), text);
        let upper: Address = "5FBDB2315678AFECB367F032D93F642F64180AA3".parse().unwrap();
        assert_eq!(upper, address);
    }

    #[test]
    fn test_address_rejects_wrong_length() {
        let err = "0x1234".parse::<Address>().unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidLength {
                expected: 20,
                got: 2
            }
        );
        assert!(matches!(
            "0xzz".parse::<Address>(),
            Err(ParseError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_handle_serde() {
        let handle = CiphertextHandle([0xab; 32]);
        let json = serde_json::to_string(&handle).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "ab".repeat(32)));
        let back: CiphertextHandle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, handle);
    }

    #[test]
    fn test_status_and_result_codes() {
        assert_eq!(GameStatus::try_from(4), Ok(GameStatus::Finalized));
        assert!(GameStatus::try_from(5).is_err());
        assert_eq!(GameResult::try_from(0), Ok(GameResult::Unresolved));
        assert_eq!(GameResult::try_from(1), Ok(GameResult::Decided(Outcome::Draw)));
        assert_eq!(
            GameResult::try_from(3),
            Ok(GameResult::Decided(Outcome::Player2Wins))
        );
        assert!(GameResult::try_from(4).is_err());
    }

    #[test]
    fn test_game_winner() {
        let creator = Address([1; 20]);
        let opponent = Address([2; 20]);
        let mut game = Game {
            id: 1,
            creator,
            opponent: Some(opponent),
            moves: [Some(CiphertextHandle([1; 32])), Some(CiphertextHandle([2; 32]))],
            status: GameStatus::Finalized,
            result: GameResult::Decided(Outcome::Player2Wins),
            wager: 0,
        };
        assert_eq!(game.winner(), Some(opponent));
        game.result = GameResult::Decided(Outcome::Player1Wins);
        assert_eq!(game.winner(), Some(creator));
        game.result = GameResult::Decided(Outcome::Draw);
        assert_eq!(game.winner(), None);
        assert_eq!(game.move_handle(Slot::Second), Some(CiphertextHandle([2; 32])));
    }
}
