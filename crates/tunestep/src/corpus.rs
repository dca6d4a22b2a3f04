//! Corpus assembly: many songs, one token stream.
//!
//! Every song is surrounded by a cushion of `sequence_length` separators:
//!
//! ```text
//! / / / … song 1 … / / / … song 2 … / / /
//! ```
//!
//! A training window that starts inside one song's tail sees nothing but
//! separators before the next song begins, and a generation seed padded with
//! separators looks exactly like the start of a song.

use tracing::{debug, info, warn};

use crate::event::{Score, ACCEPTABLE_DURATIONS};
use crate::timeseries::{decode, encode_score, stream_to_string};
use crate::token::Token;
use crate::vocab::Vocabulary;
use crate::{Error, Result};

/// Join songs with separator cushions, preserving input order.
///
/// No songs means an empty corpus.
pub fn assemble<I, S>(songs: I, sequence_length: usize) -> Vec<Token>
where
    I: IntoIterator<Item = S>,
    S: AsRef<[Token]>,
{
    let mut corpus = Vec::new();
    for song in songs {
        if corpus.is_empty() {
            push_cushion(&mut corpus, sequence_length);
        }
        corpus.extend_from_slice(song.as_ref());
        push_cushion(&mut corpus, sequence_length);
    }
    corpus
}

fn push_cushion(corpus: &mut Vec<Token>, sequence_length: usize) {
    corpus.extend(std::iter::repeat(Token::Separator).take(sequence_length));
}

/// Split a corpus stream back into its songs.
///
/// Runs of separators of any length are boundaries; empty songs are dropped.
pub fn split_songs(tokens: &[Token]) -> Vec<&[Token]> {
    tokens
        .split(|t| *t == Token::Separator)
        .filter(|song| !song.is_empty())
        .collect()
}

/// A song left out of the corpus, and why.
#[derive(Debug)]
pub struct SkippedScore {
    pub name: String,
    pub error: Error,
}

/// Outcome of a batch assembly.
#[derive(Debug)]
pub struct CorpusReport {
    pub tokens: Vec<Token>,
    pub songs: usize,
    pub skipped: Vec<SkippedScore>,
}

impl CorpusReport {
    /// Build the vocabulary over the assembled stream.
    pub fn vocabulary(&self) -> Vocabulary {
        Vocabulary::build([&self.tokens])
    }

    pub fn to_text(&self) -> String {
        stream_to_string(&self.tokens)
    }
}

/// Batch corpus assembly that drops bad songs instead of failing.
///
/// One malformed score is a data problem, not a reason to lose the rest of
/// the corpus: it is logged, recorded in the report, and skipped.
#[derive(Debug)]
pub struct CorpusBuilder {
    step: f64,
    sequence_length: usize,
    accepted: Vec<f64>,
    songs: Vec<Vec<Token>>,
    skipped: Vec<SkippedScore>,
}

impl CorpusBuilder {
    pub fn new(step: f64, sequence_length: usize) -> Self {
        Self {
            step,
            sequence_length,
            accepted: ACCEPTABLE_DURATIONS.to_vec(),
            songs: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn with_accepted_durations(mut self, accepted: Vec<f64>) -> Self {
        self.accepted = accepted;
        self
    }

    /// Encode and add a score. Returns the song's tokens if it was kept.
    pub fn add_score(&mut self, name: impl Into<String>, score: &Score) -> Option<&[Token]> {
        let name = name.into();
        match encode_score(score, self.step, &self.accepted) {
            Ok(tokens) => self.keep(name, tokens),
            Err(error) => {
                self.skip(name, error);
                None
            }
        }
    }

    /// Add an already-encoded song.
    ///
    /// The stream must decode cleanly and hold no separators of its own.
    pub fn add_encoded(&mut self, name: impl Into<String>, tokens: Vec<Token>) -> Option<&[Token]> {
        let name = name.into();
        if let Some(position) = tokens.iter().position(|t| *t == Token::Separator) {
            self.skip(
                name,
                Error::MalformedStream {
                    position,
                    reason: "separator inside an encoded song".to_string(),
                },
            );
            return None;
        }
        if let Err(error) = decode(&tokens, self.step) {
            self.skip(name, error);
            return None;
        }
        self.keep(name, tokens)
    }

    /// Record a song that failed before it reached the builder (unreadable
    /// file, bad JSON).
    pub fn record_skip(&mut self, name: impl Into<String>, error: Error) {
        self.skip(name.into(), error);
    }

    fn keep(&mut self, name: String, tokens: Vec<Token>) -> Option<&[Token]> {
        if tokens.is_empty() {
            self.skip(name, Error::EmptySong);
            return None;
        }
        debug!(song = %name, slots = tokens.len(), "added song");
        self.songs.push(tokens);
        self.songs.last().map(Vec::as_slice)
    }

    fn skip(&mut self, name: String, error: Error) {
        warn!(song = %name, %error, "skipping song");
        self.skipped.push(SkippedScore { name, error });
    }

    pub fn song_count(&self) -> usize {
        self.songs.len()
    }

    pub fn finish(self) -> CorpusReport {
        let tokens = assemble(&self.songs, self.sequence_length);
        info!(
            songs = self.songs.len(),
            skipped = self.skipped.len(),
            tokens = tokens.len(),
            "assembled corpus"
        );
        CorpusReport {
            tokens,
            songs: self.songs.len(),
            skipped: self.skipped,
        }
    }

    /// Build the corpus and its vocabulary together.
    pub fn finish_with_vocabulary(self) -> Result<(CorpusReport, Vocabulary)> {
        let report = self.finish();
        let vocab = report.vocabulary();
        if vocab.is_empty() {
            return Err(Error::InvalidVocabulary(
                "corpus contains no songs".to_string(),
            ));
        }
        Ok((report, vocab))
    }
}
