//! Sliding training windows over an id stream.
//!
//! ```text
//! ids = [11, 12, 13, 14], sequence_length = 2
//!   [11, 12] -> 13
//!   [12, 13] -> 14
//! ```
//!
//! Pairs borrow from the stream, so nothing is materialized up front and a
//! `Windows` value can be iterated any number of times (one pass per epoch,
//! several consumers at once) without shared cursor state.

use crate::{Error, Result};

/// One supervised example: a context window and the id that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingPair<'a> {
    pub context: &'a [u32],
    pub target: u32,
}

impl TrainingPair<'_> {
    /// Flattened `context.len() × vocab_size` one-hot matrix, row-major.
    pub fn one_hot(&self, vocab_size: usize) -> Result<Vec<f32>> {
        let mut matrix = vec![0.0; self.context.len() * vocab_size];
        for (row, &id) in self.context.iter().enumerate() {
            if id as usize >= vocab_size {
                return Err(Error::UnknownId(id));
            }
            matrix[row * vocab_size + id as usize] = 1.0;
        }
        Ok(matrix)
    }
}

/// All training pairs of an id stream, produced on demand.
#[derive(Debug, Clone, Copy)]
pub struct Windows<'a> {
    ids: &'a [u32],
    sequence_length: usize,
}

impl<'a> Windows<'a> {
    pub fn new(ids: &'a [u32], sequence_length: usize) -> Self {
        Self {
            ids,
            sequence_length,
        }
    }

    /// `L - S` for a stream of length `L`, or zero if the stream is shorter
    /// than one window plus its target.
    pub fn len(&self) -> usize {
        self.ids.len().saturating_sub(self.sequence_length)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    /// The pair starting at `offset`.
    pub fn get(&self, offset: usize) -> Option<TrainingPair<'a>> {
        if offset >= self.len() {
            return None;
        }
        let end = offset + self.sequence_length;
        Some(TrainingPair {
            context: &self.ids[offset..end],
            target: self.ids[end],
        })
    }

    /// A fresh pass starting from offset 0.
    pub fn iter(&self) -> WindowIter<'a> {
        WindowIter {
            windows: *self,
            offset: 0,
        }
    }
}

impl<'a> IntoIterator for Windows<'a> {
    type Item = TrainingPair<'a>;
    type IntoIter = WindowIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for &Windows<'a> {
    type Item = TrainingPair<'a>;
    type IntoIter = WindowIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Cursor over [`Windows`]; each iterator owns its own offset.
#[derive(Debug, Clone)]
pub struct WindowIter<'a> {
    windows: Windows<'a>,
    offset: usize,
}

impl<'a> Iterator for WindowIter<'a> {
    type Item = TrainingPair<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let pair = self.windows.get(self.offset)?;
        self.offset += 1;
        Some(pair)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.windows.len().saturating_sub(self.offset);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for WindowIter<'_> {}
