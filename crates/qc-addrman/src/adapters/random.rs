//! Random Source Adapters

use parking_lot::Mutex;
use rand::rngs::{OsRng, StdRng};
use rand::{Rng, RngCore, SeedableRng};

use crate::ports::RandomSource;

fn low_bits(value: u64, bits: u32) -> u64 {
    if bits >= 64 {
        value
    } else {
        value & ((1u64 << bits) - 1)
    }
}

/// Production random source.
///
/// Sampling uses the thread-local CSPRNG; bucketing keys come straight
/// from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandomSource;

impl OsRandomSource {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RandomSource for OsRandomSource {
    fn random_usize(&self, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..max)
    }

    fn random_bits(&self, bits: u32) -> u64 {
        low_bits(rand::thread_rng().next_u64(), bits)
    }

    fn random_key(&self) -> [u8; 16] {
        let mut key = [0u8; 16];
        OsRng.fill_bytes(&mut key);
        key
    }
}

/// Deterministic random source for tests and reproducible simulations.
///
/// # Example
///
/// ```rust
/// use qc_addrman::adapters::SeededRandomSource;
/// use qc_addrman::ports::RandomSource;
///
/// let a = SeededRandomSource::new(7);
/// let b = SeededRandomSource::new(7);
/// assert_eq!(a.random_key(), b.random_key());
/// assert_eq!(a.random_usize(100), b.random_usize(100));
/// ```
#[derive(Debug)]
pub struct SeededRandomSource {
    rng: Mutex<StdRng>,
}

impl SeededRandomSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandomSource {
    fn random_usize(&self, max: usize) -> usize {
        if max == 0 {
            return 0;
        }
        self.rng.lock().gen_range(0..max)
    }

    fn random_bits(&self, bits: u32) -> u64 {
        low_bits(self.rng.lock().next_u64(), bits)
    }

    fn random_key(&self) -> [u8; 16] {
        let mut key = [0u8; 16];
        self.rng.lock().fill_bytes(&mut key);
        key
    }
}
