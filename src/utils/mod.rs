//! Shared utilities: deterministic seed derivation.

pub mod seeding;

pub use seeding::{derive_rng, random_seed};
