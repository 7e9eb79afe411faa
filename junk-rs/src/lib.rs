//! junk-rs: trainable junk filter for the mail server
//!
//! A Bayesian spam classifier learning from the messages a user files as
//! ham or spam.
//!
//! # Features
//!
//! - **Tokenization**: word n-grams (1, 2 and/or 3 words) over the subject
//!   and decoded text bodies
//! - **Scoring**: class-normalized token probabilities, smoothed and bounded,
//!   combined over the strongest ham and spam indicators
//! - **Rare words**: a counting Bloom filter keeps rarely seen tokens out of
//!   the score without store lookups
//! - **Storage**: checksummed snapshots written atomically, guarded by a lock
//!   file
//! - **Evaluation**: test, train/test split and chronological replay of
//!   labeled mail directories
//!
//! # Example
//!
//! ```no_run
//! use junk_rs::junk::{Filter, Params};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut filter = Filter::open_filter(Params::default(), "filter.db", "filter.bloom", true)?;
//!
//!     filter.train_message_path(false, "spam/1.eml")?;
//!     filter.train_message_path(true, "ham/1.eml")?;
//!
//!     let result = filter.classify_message_path("new.eml")?;
//!     println!("spam probability: {:.6}", result.probability);
//!
//!     filter.close()?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration management
//! - [`error`]: Error types and handling
//! - [`junk`]: Tokenizer, word store, rarity filter, scorer and filter
//! - [`message`]: Message parsing
//! - [`evaluate`]: Evaluation policies

pub mod config;
pub mod error;
pub mod evaluate;
pub mod junk;
pub mod message;

pub use config::JunkConfig;
pub use error::{JunkError, Result};
pub use junk::{Classification, Filter, Params};
pub use message::ParsedMessage;
