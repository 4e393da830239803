pub mod events;
pub mod game;
pub mod outcome;
pub mod symbol;

pub use events::{GameCreated, GameFinalized, NeedsFinalization, Observed};
pub use game::{Address, CiphertextHandle, Game, GameId, GameResult, GameStatus, ParseError, Slot};
pub use outcome::{winner, InvalidOutcome, Outcome};
pub use symbol::{InvalidSymbol, Symbol, SYMBOL_COUNT};
