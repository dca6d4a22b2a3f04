//! Temperature sampling over a predicted next-token distribution.
//!
//! With `logits = ln(p)`, the reshaped distribution is
//! `softmax(logits / temperature)`:
//!
//! - `temperature = 1` leaves `p` as it is
//! - `temperature < 1` sharpens toward the most likely token
//! - `temperature > 1` flattens toward uniform over tokens with `p > 0`
//!
//! Tokens with zero probability stay impossible at every temperature.

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;

use crate::{Error, Result};

/// Reshape `probabilities` by `temperature` and renormalize.
pub fn reshape(probabilities: &[f64], temperature: f64) -> Result<Vec<f64>> {
    // Written so NaN fails too.
    if !(temperature > 0.0) {
        return Err(Error::InvalidTemperature(temperature));
    }
    if probabilities.is_empty() {
        return Err(Error::InvalidDistribution("empty probability vector".to_string()));
    }
    if let Some(bad) = probabilities.iter().find(|p| !p.is_finite() || **p < 0.0) {
        return Err(Error::InvalidDistribution(format!(
            "entry {bad} is not a non-negative finite number"
        )));
    }

    let log_max = probabilities
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|p| p.ln())
        .fold(f64::NEG_INFINITY, f64::max);
    if log_max == f64::NEG_INFINITY {
        return Err(Error::InvalidDistribution("no probability mass".to_string()));
    }

    // Shift by the largest logit before scaling so tiny temperatures
    // underflow the losers to zero instead of overflowing the winner.
    let weights: Vec<f64> = probabilities
        .iter()
        .map(|&p| {
            if p > 0.0 {
                ((p.ln() - log_max) / temperature).exp()
            } else {
                0.0
            }
        })
        .collect();

    let total: f64 = weights.iter().sum();
    Ok(weights.into_iter().map(|w| w / total).collect())
}

/// Draw one index from `probabilities` reshaped by `temperature`.
pub fn sample_with_temperature<R>(
    probabilities: &[f64],
    temperature: f64,
    rng: &mut R,
) -> Result<usize>
where
    R: Rng + ?Sized,
{
    let weights = reshape(probabilities, temperature)?;
    let dist =
        WeightedIndex::new(&weights).map_err(|e| Error::InvalidDistribution(e.to_string()))?;
    Ok(dist.sample(rng))
}
