//! Injectable pseudo-random source for hit trials and AI target sampling

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Source of uniform samples in `[0, 1)`.
///
/// Every random decision in the simulation goes through this trait so that a
/// session can be replayed from its seed and tests can script outcomes.
pub trait RandomSource: Send {
    /// Next uniform sample in `[0, 1)`
    fn next_unit(&mut self) -> f32;

    /// Uniform sample in `[lo, hi)`
    fn range(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.next_unit()
    }

    /// Bernoulli trial succeeding with probability `p`
    fn chance(&mut self, p: f32) -> bool {
        self.next_unit() < p
    }
}

/// ChaCha-backed source seeded once per session
pub struct SeededRandom {
    rng: ChaCha8Rng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_unit(&mut self) -> f32 {
        self.rng.gen::<f32>()
    }
}

/// Replays a fixed list of samples, then repeats the last one
#[cfg(test)]
pub struct ScriptedRandom {
    samples: std::collections::VecDeque<f32>,
    last: f32,
}

#[cfg(test)]
impl ScriptedRandom {
    pub fn new(samples: &[f32]) -> Self {
        Self {
            samples: samples.iter().copied().collect(),
            last: samples.last().copied().unwrap_or(0.0),
        }
    }

    /// Source that always yields the same sample
    pub fn constant(sample: f32) -> Self {
        Self::new(&[sample])
    }
}

#[cfg(test)]
impl RandomSource for ScriptedRandom {
    fn next_unit(&mut self) -> f32 {
        match self.samples.pop_front() {
            Some(sample) => {
                self.last = sample;
                sample
            }
            None => self.last,
        }
    }
}
