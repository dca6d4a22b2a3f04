//! The symbolic alphabet of an encoded melody.
//!
//! Each token has a fixed text form, which is also its vocabulary key:
//!
//! | token          | text   |
//! |----------------|--------|
//! | `Pitch(60)`    | `60`   |
//! | `Rest`         | `r`    |
//! | `Continuation` | `-`    |
//! | `Separator`    | `/`    |

use std::fmt;
use std::str::FromStr;

use crate::event::{Event, EventKind};
use crate::Error;

pub const REST_SYMBOL: &str = "r";
pub const CONTINUATION_SYMBOL: &str = "-";
pub const SEPARATOR_SYMBOL: &str = "/";

/// One slot of a fixed-step token stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Token {
    /// Onset of a note with this MIDI pitch.
    Pitch(u8),
    /// Onset of a rest.
    Rest,
    /// The previous note or rest holds for one more step.
    Continuation,
    /// Song boundary. Also the generation terminator and start padding.
    Separator,
}

impl Token {
    /// The head token an event writes into its first slot.
    pub fn head_of(event: &Event) -> Self {
        match event.kind {
            EventKind::Note { pitch } => Token::Pitch(pitch),
            EventKind::Rest => Token::Rest,
        }
    }

    /// Whether this token starts a new event.
    pub fn is_head(&self) -> bool {
        matches!(self, Token::Pitch(_) | Token::Rest)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Pitch(pitch) => write!(f, "{pitch}"),
            Token::Rest => f.write_str(REST_SYMBOL),
            Token::Continuation => f.write_str(CONTINUATION_SYMBOL),
            Token::Separator => f.write_str(SEPARATOR_SYMBOL),
        }
    }
}

impl FromStr for Token {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            REST_SYMBOL => Ok(Token::Rest),
            CONTINUATION_SYMBOL => Ok(Token::Continuation),
            SEPARATOR_SYMBOL => Ok(Token::Separator),
            _ => match s.parse::<u8>() {
                Ok(pitch) if pitch <= 127 => Ok(Token::Pitch(pitch)),
                _ => Err(Error::InvalidToken(s.to_string())),
            },
        }
    }
}
