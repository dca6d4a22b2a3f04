use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Durations (in quarter lengths) a source score may use.
///
/// Anything else (tuplets, dotted sixteenths, ...) cannot be placed on the
/// default sixteenth-note grid and disqualifies the whole score.
pub const ACCEPTABLE_DURATIONS: [f64; 8] = [0.25, 0.5, 0.75, 1.0, 1.5, 2.0, 3.0, 4.0];

/// Tolerance used when comparing quarter-length durations.
pub(crate) const DURATION_EPSILON: f64 = 1e-9;

/// What sounds during an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A pitched note, MIDI number 0-127.
    Note { pitch: u8 },
    Rest,
}

/// A single note or rest with its length in quarter notes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(flatten)]
    pub kind: EventKind,
    pub duration: f64,
}

impl Event {
    pub fn note(pitch: u8, duration: f64) -> Self {
        Self {
            kind: EventKind::Note { pitch },
            duration,
        }
    }

    pub fn rest(duration: f64) -> Self {
        Self {
            kind: EventKind::Rest,
            duration,
        }
    }

    pub fn pitch(&self) -> Option<u8> {
        match self.kind {
            EventKind::Note { pitch } => Some(pitch),
            EventKind::Rest => None,
        }
    }

    pub fn is_rest(&self) -> bool {
        matches!(self.kind, EventKind::Rest)
    }
}

/// A monophonic score as handed over by a notation parser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Score {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub events: Vec<Event>,
}

impl Score {
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            title: None,
            events,
        }
    }

    /// Parse a score from its JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Total length in quarter notes.
    pub fn total_duration(&self) -> f64 {
        self.events.iter().map(|e| e.duration).sum()
    }

    /// Reject the score if any event uses a duration outside `accepted`.
    ///
    /// Reports the first offending event; callers drop the whole score.
    pub fn check_acceptable_durations(&self, accepted: &[f64]) -> Result<()> {
        for event in &self.events {
            let ok = accepted
                .iter()
                .any(|d| (d - event.duration).abs() <= DURATION_EPSILON);
            if !ok {
                return Err(Error::InvalidDuration {
                    duration: event.duration,
                    reason: "not in the accepted duration set".to_string(),
                });
            }
        }
        Ok(())
    }
}
