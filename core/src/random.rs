//! Shared-handle seeded PRNG with the discrete distributions the proposal
//! operators need.

use std::cell::RefCell;
use std::rc::Rc;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

/// A cheap-to-clone handle over one shared generator. Cloning `Random`
/// shares the same underlying stream (it does not fork an independent
/// sequence) so that every component drawing from the same `Random` handle
/// consumes one sequential stream, matching the original's
/// `shared_ptr<mt19937>`-backed design.
#[derive(Clone)]
pub struct Random {
    generator: Rc<RefCell<Pcg64>>,
}

impl Random {
    pub fn seeded(seed: u64) -> Self {
        Random {
            generator: Rc::new(RefCell::new(Pcg64::seed_from_u64(seed))),
        }
    }

    /// Uniform draw from `0..noptions`. `noptions` must be positive.
    pub fn draw_from_range(&self, noptions: u32) -> u32 {
        assert!(noptions > 0, "drawFromRange requires noptions > 0");
        self.generator.borrow_mut().gen_range(0..noptions)
    }

    /// Binary search into a cumulative (partial-sum) distribution after
    /// drawing uniformly in `[0, cumulative.last())`.
    pub fn draw_from_cumulative_distribution(&self, cumulative: &[f32]) -> usize {
        let total = *cumulative.last().expect("cumulative distribution must be non-empty");
        let draw: f32 = self.generator.borrow_mut().gen_range(0.0..total);
        match cumulative
            .iter()
            .position(|&c| c >= draw)
        {
            Some(idx) => idx,
            None => cumulative.len() - 1,
        }
    }

    /// Turns a (non-cumulative) weight vector into a partial sum and draws
    /// from it.
    pub fn draw_from_discrete_distribution(&self, weights: &[f32]) -> usize {
        let mut cumulative = Vec::with_capacity(weights.len());
        let mut acc = 0.0;
        for &w in weights {
            acc += w;
            cumulative.push(acc);
        }
        self.draw_from_cumulative_distribution(&cumulative)
    }

    /// Draw from a geometric distribution with success probability `decay`,
    /// capped at `cap` (inclusive).
    pub fn draw_from_geometric_distribution(&self, decay: f32, cap: u32) -> u32 {
        debug_assert!(decay > 0.0 && decay <= 1.0);
        // Inverse-CDF sampling: smallest k >= 0 such that drawing k failures
        // before the first success, matching boost::geometric_distribution's
        // support starting at 0.
        let u: f32 = self.generator.borrow_mut().gen_range(0.0..1.0);
        let k = if decay >= 1.0 {
            0
        } else {
            ((1.0 - u).ln() / (1.0 - decay).ln()).floor() as i64
        };
        (k.max(0) as u32).min(cap)
    }

    pub fn draw01(&self) -> f32 {
        self.generator.borrow_mut().gen_range(0.0..1.0)
    }

    pub fn flip_coin(&self, p: f32) -> bool {
        self.draw01() <= p
    }
}
