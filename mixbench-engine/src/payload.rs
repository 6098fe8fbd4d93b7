//! Randomized object contents for `PUT` operations.

use std::fmt;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::{io, task};

use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use rand_distr::{Distribution, LogNormal};
use tokio::io::{AsyncRead, ReadBuf};

use crate::error::ConfigError;

/// Produces the payloads uploaded by `PUT` operations.
pub trait PayloadSource: fmt::Debug + Send + Sync {
    /// Returns the payload for the next object.
    fn next_payload(&self) -> Payload;
}

/// Distribution of object sizes.
#[derive(Clone, Debug)]
pub enum SizeDistribution {
    /// Every object has the same size.
    Fixed(u64),
    /// Sizes follow a *LogNormal* distribution.
    LogNormal(LogNormal<f64>),
}

impl SizeDistribution {
    /// Builds a *LogNormal* distribution from its median and 99th percentile.
    pub fn log_normal(p50: u64, p99: u64) -> Result<Self, ConfigError> {
        if p50 == 0 || p99 < p50 {
            return Err(ConfigError::InvalidSizes(format!(
                "expected 0 < p50 <= p99, got p50={p50} p99={p99}"
            )));
        }

        // Inspired by <https://stats.stackexchange.com/a/649432>
        let p50 = p50 as f64;
        let p99 = p99 as f64;
        let mu = p50.ln();
        let sigma = (p99.ln() - mu) / 2.3263;

        LogNormal::new(mu, sigma)
            .map(Self::LogNormal)
            .map_err(|err| ConfigError::InvalidSizes(err.to_string()))
    }

    fn sample(&self, rng: &mut SmallRng) -> u64 {
        match self {
            Self::Fixed(size) => *size,
            Self::LogNormal(distribution) => distribution.sample(rng) as u64,
        }
    }
}

/// A [`PayloadSource`] filling objects with pseudo-random bytes.
///
/// Every payload is derived from its own seed, drawn from a shared RNG. Two sources with the same
/// seed produce the same sequence of payloads.
#[derive(Debug)]
pub struct RandomPayloads {
    sizes: SizeDistribution,
    rng: Mutex<SmallRng>,
}

impl RandomPayloads {
    /// Creates a source with the given size distribution and a random seed.
    pub fn new(sizes: SizeDistribution) -> Self {
        Self {
            sizes,
            rng: Mutex::new(SmallRng::seed_from_u64(rand::random())),
        }
    }

    /// Creates a source producing objects of exactly `size` bytes.
    pub fn fixed(size: u64) -> Self {
        Self::new(SizeDistribution::Fixed(size))
    }

    /// Reseeds the source for reproducible payloads.
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(SmallRng::seed_from_u64(seed)),
            ..self
        }
    }
}

impl PayloadSource for RandomPayloads {
    fn next_payload(&self) -> Payload {
        let seed = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next_u64();

        let mut rng = SmallRng::seed_from_u64(seed);
        let len = self.sizes.sample(&mut rng);

        Payload { len, rng }
    }
}

/// Randomized contents of an object.
///
/// Clone this instance to reuse it with deterministic contents.
#[derive(Debug, Clone)]
pub struct Payload {
    /// The remaining length of the payload in bytes.
    pub len: u64,
    /// The RNG used to fill the payload with random bytes.
    pub rng: SmallRng,
}

impl io::Read for Payload {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len_to_fill = (buf.len() as u64).min(self.len) as usize;

        let fill_buf = &mut buf[..len_to_fill];
        self.rng.fill_bytes(fill_buf);

        self.len -= len_to_fill as u64;
        Ok(len_to_fill)
    }
}

impl AsyncRead for Payload {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut task::Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> task::Poll<io::Result<()>> {
        let len_to_fill = (buf.remaining() as u64).min(self.len) as usize;

        let fill_buf = buf.initialize_unfilled_to(len_to_fill);
        self.rng.fill_bytes(fill_buf);

        self.len -= len_to_fill as u64;
        buf.advance(len_to_fill);

        task::Poll::Ready(Ok(()))
    }
}
