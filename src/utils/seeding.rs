//! Deterministic RNG derivation.
//!
//! Parallel workers (topology row partitions, per-source spread evaluation)
//! each derive their own RNG from a base seed plus a stream/index pair, so
//! results never depend on thread scheduling.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Derive an independent RNG for a (stream, index) pair under a base seed.
///
/// Uses splitmix64-style mixing so that adjacent indices do not produce
/// correlated generator states.
pub fn derive_rng(base_seed: u64, stream: u64, index: u64) -> StdRng {
    let mut z = base_seed
        ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ index.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    StdRng::seed_from_u64(z ^ (z >> 31))
}

/// Draw a fresh base seed from the thread-local entropy source.
pub fn random_seed() -> u64 {
    rand::thread_rng().gen()
}
