//! Additive white Gaussian noise on symbol coordinates.
//!
//! The random source is owned by the simulator, so a seeded generator gives
//! a reproducible channel.

use super::mapper::Symbol;
use crate::error::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

#[derive(Debug)]
pub struct ChannelSimulator<R: Rng> {
    /// `None` for a noiseless channel
    noise: Option<Normal<f64>>,
    rng: R,
}

impl<R: Rng> ChannelSimulator<R> {
    pub fn new(noise_std_dev: f64, rng: R) -> Result<Self> {
        if !noise_std_dev.is_finite() || noise_std_dev < 0.0 {
            return Err(Error::Config(format!(
                "invalid noise standard deviation {}",
                noise_std_dev
            )));
        }

        let noise = if noise_std_dev == 0.0 {
            None
        } else {
            Some(Normal::new(0.0, noise_std_dev).map_err(|e| {
                Error::Config(format!(
                    "invalid noise standard deviation {}: {}",
                    noise_std_dev, e
                ))
            })?)
        };

        Ok(Self { noise, rng })
    }

    /// Add an independent noise sample to each coordinate, truncated toward
    /// zero on conversion back to an integer.
    pub fn perturb(&mut self, symbol: Symbol) -> Symbol {
        match &self.noise {
            None => symbol,
            Some(dist) => {
                let dx = dist.sample(&mut self.rng) as i64;
                let dy = dist.sample(&mut self.rng) as i64;
                Symbol::new(symbol.x.saturating_add(dx), symbol.y.saturating_add(dy))
            }
        }
    }

    pub fn perturb_all(&mut self, symbols: &mut [Symbol]) {
        for symbol in symbols.iter_mut() {
            *symbol = self.perturb(*symbol);
        }
    }
}

/// Generator for one chunk, derived from the run's base seed so results do
/// not depend on the order chunks are processed in.
pub fn chunk_rng(base_seed: u64, chunk_index: u64) -> StdRng {
    StdRng::seed_from_u64(base_seed.wrapping_add(chunk_index))
}
