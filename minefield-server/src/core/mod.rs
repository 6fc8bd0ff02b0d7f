//! Core deterministic primitives.
//!
//! Seeded randomness shared by board generation and name generation.

pub mod rng;

// Re-export core types
pub use rng::{DeterministicRng, derive_round_seed};
