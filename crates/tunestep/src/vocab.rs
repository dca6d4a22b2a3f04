//! Symbol ↔ id mapping for a corpus.
//!
//! Ids are handed out in first-seen order while walking the corpus. The
//! numbering carries no meaning, but once a model has been trained against
//! it the mapping is fixed: load the persisted file for every later step
//! instead of rebuilding, or ids silently drift between training and
//! generation.
//!
//! On disk the vocabulary is a JSON object from symbol to id:
//!
//! ```json
//! {
//!   "-": 1,
//!   "/": 0,
//!   "60": 2
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::token::Token;
use crate::{Error, Result};

/// Immutable bijection between tokens and dense ids `0..len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    tokens: Vec<Token>,
    ids: HashMap<Token, u32>,
}

impl Vocabulary {
    /// Build from token streams, numbering tokens as they are first seen.
    pub fn build<I, S>(streams: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[Token]>,
    {
        let mut tokens = Vec::new();
        let mut ids = HashMap::new();

        for stream in streams {
            for &token in stream.as_ref() {
                ids.entry(token).or_insert_with(|| {
                    tokens.push(token);
                    (tokens.len() - 1) as u32
                });
            }
        }

        debug!(size = tokens.len(), "built vocabulary");
        Self { tokens, ids }
    }

    /// Build from tokens listed in id order.
    pub fn from_tokens(tokens: Vec<Token>) -> Result<Self> {
        let mut ids = HashMap::with_capacity(tokens.len());
        for (id, &token) in tokens.iter().enumerate() {
            if ids.insert(token, id as u32).is_some() {
                return Err(Error::InvalidVocabulary(format!(
                    "token '{token}' listed twice"
                )));
            }
        }
        Ok(Self { tokens, ids })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn contains(&self, token: &Token) -> bool {
        self.ids.contains_key(token)
    }

    pub fn encode(&self, token: &Token) -> Result<u32> {
        self.ids
            .get(token)
            .copied()
            .ok_or_else(|| Error::UnknownToken(token.to_string()))
    }

    /// Look up a symbol in its text form.
    pub fn encode_symbol(&self, symbol: &str) -> Result<u32> {
        let token: Token = symbol
            .parse()
            .map_err(|_| Error::UnknownToken(symbol.to_string()))?;
        self.encode(&token)
    }

    pub fn decode(&self, id: u32) -> Result<Token> {
        self.tokens
            .get(id as usize)
            .copied()
            .ok_or(Error::UnknownId(id))
    }

    pub fn encode_stream(&self, tokens: &[Token]) -> Result<Vec<u32>> {
        tokens.iter().map(|t| self.encode(t)).collect()
    }

    pub fn decode_ids(&self, ids: &[u32]) -> Result<Vec<Token>> {
        ids.iter().map(|&id| self.decode(id)).collect()
    }

    /// `(id, token)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, Token)> + '_ {
        self.tokens
            .iter()
            .enumerate()
            .map(|(id, &token)| (id as u32, token))
    }

    pub fn to_json(&self) -> Result<String> {
        let mapping: BTreeMap<String, u32> = self
            .iter()
            .map(|(id, token)| (token.to_string(), id))
            .collect();
        Ok(serde_json::to_string_pretty(&mapping)?)
    }

    /// Parse a persisted mapping, requiring ids to cover `0..n` exactly once.
    pub fn from_json(json: &str) -> Result<Self> {
        let mapping: BTreeMap<String, u32> = serde_json::from_str(json)?;
        let size = mapping.len();
        let mut slots: Vec<Option<Token>> = vec![None; size];

        for (symbol, id) in mapping {
            let token: Token = symbol.parse().map_err(|_| {
                Error::InvalidVocabulary(format!("unrecognized symbol '{symbol}'"))
            })?;
            let slot = slots.get_mut(id as usize).ok_or_else(|| {
                Error::InvalidVocabulary(format!("id {id} is outside 0..{size}"))
            })?;
            if slot.is_some() {
                return Err(Error::InvalidVocabulary(format!("id {id} assigned twice")));
            }
            *slot = Some(token);
        }

        // n distinct ids below n leave no hole.
        let tokens = slots.into_iter().flatten().collect();
        Self::from_tokens(tokens)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        debug!(path = %path.display(), size = self.len(), "saved vocabulary");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let vocab = Self::from_json(&fs::read_to_string(path)?)?;
        debug!(path = %path.display(), size = vocab.len(), "loaded vocabulary");
        Ok(vocab)
    }
}
