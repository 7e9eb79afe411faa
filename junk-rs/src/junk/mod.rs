//! Junk filter module
//!
//! Provides a trainable Bayesian junk filter: n-gram tokenization, a word
//! store with checked snapshots, a counting Bloom filter for rare words and
//! the scorer combining it all.

pub mod filter;
pub mod persist;
pub mod rarity;
pub mod scorer;
pub mod store;
pub mod tokenizer;
pub mod types;

pub use filter::Filter;
pub use rarity::{AlwaysCommon, CountingBloom, RarityOracle};
pub use scorer::Scorer;
pub use store::WordStore;
pub use tokenizer::Tokenizer;
pub use types::*;
