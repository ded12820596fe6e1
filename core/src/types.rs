//! Basic vocabulary shared across the search engine: words, phrases, scores.

use std::ops::{Add, AddAssign, Sub, SubAssign};

/// A single source or target token.
pub type Word = String;

/// An ordered sequence of words making up one side of a phrase pair.
pub type PhraseData = Vec<Word>;

/// A score that should never be preferred by any search algorithm; used to
/// mark proposals that must never be accepted (e.g. malformed segmentations
/// surfaced only under debug assertions).
pub const IMPOSSIBLE_SCORE: f32 = -1e30;

/// A vector of per-feature scalar scores, one slot per feature-function
/// dimension, laid out at a fixed offset per feature in configuration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scores(pub Vec<f32>);

impl Scores {
    pub fn zeros(n: usize) -> Self {
        Scores(vec![0.0; n])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Weighted inner product against a per-score weight vector.
    pub fn weighted_sum(&self, weights: &[f32]) -> f32 {
        self.0
            .iter()
            .zip(weights.iter())
            .map(|(s, w)| s * w)
            .sum()
    }
}

impl AddAssign<&Scores> for Scores {
    fn add_assign(&mut self, rhs: &Scores) {
        debug_assert_eq!(self.0.len(), rhs.0.len());
        for (a, b) in self.0.iter_mut().zip(rhs.0.iter()) {
            *a += b;
        }
    }
}

impl SubAssign<&Scores> for Scores {
    fn sub_assign(&mut self, rhs: &Scores) {
        debug_assert_eq!(self.0.len(), rhs.0.len());
        for (a, b) in self.0.iter_mut().zip(rhs.0.iter()) {
            *a -= b;
        }
    }
}

impl Add for Scores {
    type Output = Scores;
    fn add(mut self, rhs: Scores) -> Scores {
        self += &rhs;
        self
    }
}

impl Sub for Scores {
    type Output = Scores;
    fn sub(mut self, rhs: Scores) -> Scores {
        self -= &rhs;
        self
    }
}
