//! The next-token prediction capability, plus a count-based model.
//!
//! The generation loop only needs "given these ids, how likely is each id
//! next". A trained network, a lookup table, or a test closure all fit
//! behind [`Predictor`].
//!
//! [`NgramPredictor`] is the lookup-table flavor: it counts which id follows
//! each context of length `1..=order` in a corpus and answers from the
//! longest context it has seen, backing off to shorter ones and finally to
//! plain id frequencies.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{Error, Result};

/// Anything that can propose a next-token distribution.
///
/// Implementations must return one non-negative weight per vocabulary id,
/// summing to 1 (up to float error). `context` holds at most the
/// generator's `max_context_length` most recent ids.
pub trait Predictor: Send + Sync {
    fn predict(&self, context: &[u32]) -> Result<Vec<f64>>;
}

impl<F> Predictor for F
where
    F: Fn(&[u32]) -> Vec<f64> + Send + Sync,
{
    fn predict(&self, context: &[u32]) -> Result<Vec<f64>> {
        Ok(self(context))
    }
}

/// Next-id counts keyed by following id.
type Counts = BTreeMap<u32, u64>;

/// Count-based n-gram model with longest-suffix backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NgramPredictor {
    order: usize,
    vocab_size: usize,
    /// Context key (comma-joined ids, lengths `1..=order`) to next-id counts.
    contexts: BTreeMap<String, Counts>,
    unigram: Counts,
}

impl NgramPredictor {
    /// Count transitions in an id stream.
    pub fn fit(ids: &[u32], vocab_size: usize, order: usize) -> Result<Self> {
        if vocab_size == 0 {
            return Err(Error::InvalidVocabulary("empty vocabulary".to_string()));
        }
        if let Some(&bad) = ids.iter().find(|&&id| id as usize >= vocab_size) {
            return Err(Error::UnknownId(bad));
        }

        let mut contexts: BTreeMap<String, Counts> = BTreeMap::new();
        let mut unigram = Counts::new();

        for (i, &next) in ids.iter().enumerate() {
            *unigram.entry(next).or_default() += 1;
            for n in 1..=order.min(i) {
                let key = context_key(&ids[i - n..i]);
                *contexts.entry(key).or_default().entry(next).or_default() += 1;
            }
        }

        info!(
            order,
            vocab_size,
            contexts = contexts.len(),
            "fitted n-gram predictor"
        );
        Ok(Self {
            order,
            vocab_size,
            contexts,
            unigram,
        })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn distribution(&self, counts: &Counts) -> Vec<f64> {
        let total: u64 = counts.values().sum();
        let mut probabilities = vec![0.0; self.vocab_size];
        for (&id, &count) in counts {
            if let Some(slot) = probabilities.get_mut(id as usize) {
                *slot = count as f64 / total as f64;
            }
        }
        probabilities
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string(self)?)?;
        debug!(path = %path.display(), "saved n-gram predictor");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let model: Self = serde_json::from_str(&fs::read_to_string(path)?)?;
        debug!(path = %path.display(), order = model.order, "loaded n-gram predictor");
        Ok(model)
    }
}

impl Predictor for NgramPredictor {
    fn predict(&self, context: &[u32]) -> Result<Vec<f64>> {
        for n in (1..=self.order.min(context.len())).rev() {
            let key = context_key(&context[context.len() - n..]);
            if let Some(counts) = self.contexts.get(&key) {
                return Ok(self.distribution(counts));
            }
        }

        if self.unigram.is_empty() {
            return Ok(vec![1.0 / self.vocab_size as f64; self.vocab_size]);
        }
        Ok(self.distribution(&self.unigram))
    }
}

/// Encode a context (slice of ids) as a string key for map lookup.
fn context_key(context: &[u32]) -> String {
    context
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sums_to_one(p: &[f64]) -> bool {
        (p.iter().sum::<f64>() - 1.0).abs() < 1e-9
    }

    #[test]
    fn closures_are_predictors() {
        let uniform = |_: &[u32]| vec![0.25; 4];
        assert_eq!(uniform.predict(&[1, 2]).unwrap(), vec![0.25; 4]);
    }

    #[test]
    fn longest_context_wins() {
        // 0 1 2 always, but 1 alone is followed by 2 or 3.
        let ids = [0, 1, 2, 0, 1, 2, 3, 1, 3];
        let model = NgramPredictor::fit(&ids, 4, 2).unwrap();

        assert_eq!(model.predict(&[0, 1]).unwrap(), vec![0.0, 0.0, 1.0, 0.0]);

        // "2,1" never occurs, so this falls back to what follows 1.
        let after_one = model.predict(&[2, 1]).unwrap();
        assert_eq!(after_one, vec![0.0, 0.0, 2.0 / 3.0, 1.0 / 3.0]);
    }

    #[test]
    fn backs_off_to_unigram() {
        let ids = [0, 0, 1, 2];
        let model = NgramPredictor::fit(&ids, 4, 3).unwrap();
        let p = model.predict(&[3]).unwrap();
        assert_eq!(p, vec![0.5, 0.25, 0.25, 0.0]);
        assert!(sums_to_one(&model.predict(&[]).unwrap()));
    }

    #[test]
    fn empty_corpus_is_uniform() {
        let model = NgramPredictor::fit(&[], 2, 2).unwrap();
        assert_eq!(model.predict(&[0, 1]).unwrap(), vec![0.5, 0.5]);
    }

    #[test]
    fn rejects_ids_outside_vocabulary() {
        assert!(matches!(
            NgramPredictor::fit(&[0, 5], 3, 2),
            Err(Error::UnknownId(5))
        ));
        assert!(NgramPredictor::fit(&[], 0, 2).is_err());
    }

    #[test]
    fn every_prediction_is_normalized() {
        let ids: Vec<u32> = (0..200).map(|i| (i * 7 % 5) as u32).collect();
        let model = NgramPredictor::fit(&ids, 5, 4).unwrap();
        for start in 0..ids.len() - 4 {
            let p = model.predict(&ids[start..start + 4]).unwrap();
            assert_eq!(p.len(), 5);
            assert!(sums_to_one(&p));
        }
    }

    #[test]
    fn save_and_load() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("ngram.json");
        let model = NgramPredictor::fit(&[0, 1, 2, 1, 0], 3, 2)?;
        model.save(&path)?;
        assert_eq!(NgramPredictor::load(&path)?, model);
        Ok(())
    }

    #[test]
    fn test_context_key() {
        assert_eq!(context_key(&[2, 10, 3]), "2,10,3");
        assert_eq!(context_key(&[]), "");
    }
}
