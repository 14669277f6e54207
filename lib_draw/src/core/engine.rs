//! # Draw Engine
//!
//! Uniform random selection of winners without replacement, decoupled
//! from animation and display concerns. The engine is pure with respect
//! to its inputs except for the injected randomness capability, so tests
//! can script the random source and assert exact output sequences.

use rand::Rng;

use crate::errors::DrawError;
use crate::models::{Attendee, Prize};

/// The engine's only source of randomness.
///
/// Each call must return an index uniformly distributed over
/// `0..bound`. The production source wraps the `rand` thread RNG;
/// tests substitute a scripted or seeded source.
pub trait RandomSource: Send {
    /// A uniform index in `0..bound`. `bound` is always at least 1.
    fn pick(&mut self, bound: usize) -> usize;
}

/// Production randomness backed by the thread-local RNG.
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn pick(&mut self, bound: usize) -> usize {
        rand::rng().random_range(0..bound)
    }
}

/// A scripted source replaying a fixed list of indices. Intended for
/// tests; panics when the script runs out.
pub struct ScriptedRandom {
    script: Vec<usize>,
    cursor: usize,
}

impl ScriptedRandom {
    pub fn new(script: Vec<usize>) -> Self {
        Self { script, cursor: 0 }
    }
}

impl RandomSource for ScriptedRandom {
    fn pick(&mut self, bound: usize) -> usize {
        let raw = self.script[self.cursor];
        self.cursor += 1;
        assert!(raw < bound, "scripted index {} out of bound {}", raw, bound);
        raw
    }
}

pub struct DrawEngine {
    rng: Box<dyn RandomSource>,
}

impl DrawEngine {
    pub fn new(rng: Box<dyn RandomSource>) -> Self {
        Self { rng }
    }

    /// Selects `min(requested, pool.len(), prize.remaining)` distinct
    /// winners from the pool by repeated uniform draw without
    /// replacement: one independent uniform choice per selection round,
    /// removing the chosen candidate each time.
    ///
    /// The returned order is the reveal order. No attendee outside the
    /// input pool can ever be selected, and none appears twice.
    pub fn draw(
        &mut self,
        pool: &[Attendee],
        prize: &Prize,
        requested: u32,
    ) -> Result<Vec<Attendee>, DrawError> {
        // Guard against stale input; the synchronized pool should
        // already satisfy this.
        let mut candidates: Vec<Attendee> = pool
            .iter()
            .filter(|a| a.is_eligible)
            .cloned()
            .collect();

        let actual = (requested as usize)
            .min(candidates.len())
            .min(prize.remaining as usize);
        if actual == 0 {
            return Err(DrawError::EmptyPoolOrOutOfStock);
        }

        let mut winners = Vec::with_capacity(actual);
        for _ in 0..actual {
            let index = self.rng.pick(candidates.len());
            winners.push(candidates.swap_remove(index));
        }

        log::info!(
            "Drew {} winner(s) for prize '{}' from a pool of {} (requested {})",
            winners.len(),
            prize.id,
            pool.len(),
            requested
        );
        Ok(winners)
    }

    /// Builds the operator-facing shuffle of display names, ending in the
    /// true winner's name. Padding names are drawn with replacement from
    /// the pool excluding the winner.
    ///
    /// This sequence is cosmetic only: the winner was fixed by `draw()`
    /// before any of it is generated, so the animation can never
    /// influence who actually won.
    pub fn reveal_sequence(
        &mut self,
        pool: &[Attendee],
        winner: &Attendee,
        target_len: usize,
    ) -> Vec<String> {
        let others: Vec<&Attendee> = pool.iter().filter(|a| a.id != winner.id).collect();

        let mut names = Vec::with_capacity(target_len.max(1));
        if !others.is_empty() {
            while names.len() + 1 < target_len {
                let index = self.rng.pick(others.len());
                names.push(others[index].name.clone());
            }
        }
        names.push(winner.name.clone());
        names
    }
}
