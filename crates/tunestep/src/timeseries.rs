//! Encoder and decoder between timed events and fixed-step token streams.
//!
//! An event of duration `D` occupies `D / step` consecutive slots: its head
//! token in the first slot and a continuation marker in each remaining one.
//!
//! ```text
//! Note(60, 1.0), Rest(0.5), Note(62, 0.25)   step = 0.25
//!   -> 60 - - - r - 62
//! ```

use tracing::trace;

use crate::event::{Event, EventKind, Score};
use crate::token::Token;
use crate::{Error, Result};

/// How far `duration / step` may sit from an integer and still count as one.
const SLOT_TOLERANCE: f64 = 1e-6;

/// Longest event, in slots, the encoder will expand.
pub const MAX_SLOTS_PER_EVENT: usize = 1 << 16;

/// Decoded durations are snapped to multiples of `1 / DURATION_SCALE`.
const DURATION_SCALE: f64 = 1e9;

fn check_step(step: f64) -> Result<()> {
    if step.is_finite() && step > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidStep(step))
    }
}

/// Number of grid slots an event of `duration` fills.
fn slot_count(duration: f64, step: f64) -> Result<usize> {
    let ratio = duration / step;
    if !ratio.is_finite() {
        return Err(Error::InvalidDuration {
            duration,
            reason: "duration is not a finite number".to_string(),
        });
    }

    let slots = ratio.round();
    if (ratio - slots).abs() > SLOT_TOLERANCE {
        return Err(Error::InvalidDuration {
            duration,
            reason: format!("not a whole multiple of the {step} time step"),
        });
    }
    if slots < 1.0 {
        return Err(Error::InvalidDuration {
            duration,
            reason: "duration must cover at least one time step".to_string(),
        });
    }
    if slots > MAX_SLOTS_PER_EVENT as f64 {
        return Err(Error::InvalidDuration {
            duration,
            reason: format!("spans more than {MAX_SLOTS_PER_EVENT} steps of {step}"),
        });
    }

    Ok(slots as usize)
}

/// Quantize events onto the time grid.
///
/// Fails on the first event whose duration does not fill a whole number of
/// slots; no tokens are returned for a rejected sequence.
pub fn encode(events: &[Event], step: f64) -> Result<Vec<Token>> {
    check_step(step)?;

    let mut tokens = Vec::new();
    for event in events {
        if let Some(pitch) = event.pitch() {
            if pitch > 127 {
                return Err(Error::InvalidToken(pitch.to_string()));
            }
        }
        let slots = slot_count(event.duration, step)?;
        tokens.push(Token::head_of(event));
        tokens.extend(std::iter::repeat(Token::Continuation).take(slots - 1));
    }

    trace!(events = events.len(), slots = tokens.len(), "encoded events");
    Ok(tokens)
}

/// Validate a score against the accepted durations, then encode it.
pub fn encode_score(score: &Score, step: f64, accepted: &[f64]) -> Result<Vec<Token>> {
    score.check_acceptable_durations(accepted)?;
    encode(&score.events, step)
}

/// The event being accumulated while scanning a stream.
struct OpenEvent {
    kind: EventKind,
    slots: usize,
}

impl OpenEvent {
    fn close(self, step: f64) -> Event {
        // 0.1 * 3 is 0.30000000000000004; the score said 0.3.
        let duration = (step * self.slots as f64 * DURATION_SCALE).round() / DURATION_SCALE;
        Event {
            kind: self.kind,
            duration,
        }
    }
}

/// Rebuild timed events from a token stream.
///
/// Decoding stops at the first separator: whatever follows belongs to
/// another melody. An empty stream, or one that opens with a separator,
/// yields no events.
pub fn decode(tokens: &[Token], step: f64) -> Result<Vec<Event>> {
    check_step(step)?;

    let mut events = Vec::new();
    let mut open: Option<OpenEvent> = None;

    for (position, token) in tokens.iter().enumerate() {
        let kind = match *token {
            Token::Continuation => {
                match open.as_mut() {
                    Some(event) => event.slots += 1,
                    None => {
                        return Err(Error::MalformedStream {
                            position,
                            reason: "continuation marker with no preceding note or rest"
                                .to_string(),
                        })
                    }
                }
                continue;
            }
            Token::Separator => break,
            Token::Pitch(pitch) if pitch > 127 => {
                return Err(Error::MalformedStream {
                    position,
                    reason: format!("pitch {pitch} is outside the MIDI range"),
                })
            }
            Token::Pitch(pitch) => EventKind::Note { pitch },
            Token::Rest => EventKind::Rest,
        };

        if let Some(event) = open.take() {
            events.push(event.close(step));
        }
        open = Some(OpenEvent { kind, slots: 1 });
    }

    if let Some(event) = open {
        events.push(event.close(step));
    }

    Ok(events)
}

/// Decode a whitespace-delimited token stream.
pub fn decode_str(text: &str, step: f64) -> Result<Vec<Event>> {
    decode(&parse_stream(text)?, step)
}

/// Parse whitespace-delimited symbols into tokens.
pub fn parse_stream(text: &str) -> Result<Vec<Token>> {
    text.split_whitespace().map(str::parse).collect()
}

/// Render tokens as space-separated symbols.
pub fn stream_to_string(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(Token::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
