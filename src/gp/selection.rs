//! Rank-based roulette selection.
//!
//! Individuals are ranked by fitness and weighted by position, so the
//! selection pressure does not depend on raw fitness magnitudes.

// Ranks become weights through floating point
#![allow(clippy::cast_precision_loss)]

use crate::error::{GrammarError, Result};
use rand::Rng;

/// Weights for a population already sorted best-first: `len - rank`.
#[must_use]
pub fn rank_weights(len: usize) -> Vec<f64> {
    (0..len).map(|rank| (len - rank) as f64).collect()
}

/// Fitness-proportionate pick over `weights`.
///
/// Draws a point in `[0, total]` and walks the weights in order, returning
/// the first index at which the remaining distance drops to zero. A zero
/// total degrades to a uniform pick.
///
/// # Errors
///
/// Returns [`GrammarError::PreconditionViolation`] if `weights` is empty.
pub fn select_index<R: Rng>(weights: &[f64], rng: &mut R) -> Result<usize> {
    if weights.is_empty() {
        return Err(GrammarError::precondition(
            "cannot select from an empty population",
        ));
    }

    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Ok(rng.gen_range(0..weights.len()));
    }

    let mut remainder = rng.gen_range(0.0..=total);
    for (index, weight) in weights.iter().enumerate() {
        remainder -= weight;
        if remainder <= 0.0 {
            return Ok(index);
        }
    }

    // Rounding can leave a sliver past the last weight.
    Ok(weights.len() - 1)
}

/// Roulette pick over `(candidate, weight)` pairs.
///
/// # Errors
///
/// Returns [`GrammarError::PreconditionViolation`] if `candidates` is empty.
pub fn select<'a, T, R: Rng>(candidates: &'a [(T, f64)], rng: &mut R) -> Result<&'a T> {
    let weights: Vec<f64> = candidates.iter().map(|(_, weight)| *weight).collect();
    let index = select_index(&weights, rng)?;
    Ok(&candidates[index].0)
}
