//! Fixed-step melody tokenization and autoregressive generation.
//!
//! Monophonic scores are quantized onto a grid of fixed time steps and
//! written as a token stream: the first slot of every note or rest carries
//! its symbol, the remaining slots carry a continuation marker. Songs are
//! joined into one corpus with separator cushions, mapped to dense integer
//! ids through a persisted [`Vocabulary`], and windowed into
//! `(context, next-token)` training pairs.
//!
//! Generation runs the other way: a [`Predictor`] proposes a next-token
//! distribution, the temperature sampler draws from it, and the decoder
//! turns the resulting stream back into timed events.
//!
//! # Example
//!
//! ```
//! use tunestep::{decode, encode, Event, Token, DEFAULT_STEP};
//!
//! let events = vec![Event::note(60, 1.0)];
//! let tokens = encode(&events, DEFAULT_STEP).unwrap();
//! assert_eq!(
//!     tokens,
//!     vec![Token::Pitch(60), Token::Continuation, Token::Continuation, Token::Continuation]
//! );
//! assert_eq!(decode(&tokens, DEFAULT_STEP).unwrap(), events);
//! ```
//!
//! # Modules
//!
//! - `event`: notes, rests, and scores as they arrive from a parser
//! - `token`: the symbolic alphabet and its text form
//! - `timeseries`: encoder and decoder between events and token streams
//! - `vocab`: symbol ↔ id bijection, persisted as JSON
//! - `corpus`: song assembly with separator cushions
//! - `windows`: lazy training-pair windows over an id stream
//! - `sampler`: temperature reshaping and weighted draws
//! - `predictor`: the next-token capability and a count-based n-gram model
//! - `generator`: the seeded generation loop
//! - `midi_writer`: SMF output for decoded melodies

pub mod corpus;
pub mod event;
pub mod generator;
pub mod midi_writer;
pub mod predictor;
pub mod sampler;
pub mod timeseries;
pub mod token;
pub mod vocab;
pub mod windows;

pub use corpus::{assemble, split_songs, CorpusBuilder, CorpusReport, SkippedScore};
pub use event::{Event, EventKind, Score, ACCEPTABLE_DURATIONS};
pub use generator::{
    GenerationParams, GenerationResult, GenerationSession, GeneratorState, MelodyGenerator,
};
pub use midi_writer::{events_to_midi, score_to_midi, RenderOptions};
pub use predictor::{NgramPredictor, Predictor};
pub use sampler::{reshape, sample_with_temperature};
pub use timeseries::{
    decode, decode_str, encode, encode_score, parse_stream, stream_to_string, MAX_SLOTS_PER_EVENT,
};
pub use token::Token;
pub use vocab::Vocabulary;
pub use windows::{TrainingPair, Windows};

/// Default quantization step, in quarter-length units per slot.
pub const DEFAULT_STEP: f64 = 0.25;

/// Default window length used for training contexts and separator cushions.
pub const DEFAULT_SEQUENCE_LENGTH: usize = 64;

/// Errors from encoding, vocabulary lookup, sampling, and generation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid duration {duration}: {reason}")]
    InvalidDuration { duration: f64, reason: String },

    #[error("time step must be positive and finite, got {0}")]
    InvalidStep(f64),

    #[error("unknown token '{0}'")]
    UnknownToken(String),

    #[error("unknown token id {0}")]
    UnknownId(u32),

    #[error("temperature must be positive, got {0}")]
    InvalidTemperature(f64),

    #[error("malformed token stream at position {position}: {reason}")]
    MalformedStream { position: usize, reason: String },

    #[error("invalid token symbol '{0}'")]
    InvalidToken(String),

    #[error("invalid probability distribution: {0}")]
    InvalidDistribution(String),

    #[error("max context length {max_context_length} must be in 1..={sequence_length}")]
    InvalidContextLength {
        max_context_length: usize,
        sequence_length: usize,
    },

    #[error("invalid vocabulary: {0}")]
    InvalidVocabulary(String),

    #[error("song has no events")]
    EmptySong,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
