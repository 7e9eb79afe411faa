//! Junk filter types and data structures

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{JunkError, Result};

/// Set of scoring features extracted from one message
pub type TokenSet = BTreeSet<String>;

/// Classifier parameters, fixed for the lifetime of a filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Use 1-grams, i.e. single words, for scoring
    pub one_grams: bool,
    /// Use 2-grams, i.e. word pairs, for scoring
    pub two_grams: bool,
    /// Use 3-grams, i.e. word triplets, for scoring
    pub three_grams: bool,
    /// Maximum word power, e.g. min 0.05/max 0.95
    pub max_power: f64,
    /// Ignore words with ham/spaminess within this distance from 0.5
    pub ignore_words: f64,
    /// Number of top spam and number of top ham words from a message to use
    pub top_words: usize,
    /// Words are rare if encountered this number of times during training,
    /// and skipped for scoring
    pub rare_words: u32,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            one_grams: false,
            two_grams: true,
            three_grams: false,
            max_power: 0.05,
            ignore_words: 0.1,
            top_words: 10,
            rare_words: 1,
        }
    }
}

impl Params {
    /// Check that the parameters describe a usable classifier
    pub fn validate(&self) -> Result<()> {
        if !self.one_grams && !self.two_grams && !self.three_grams {
            return Err(JunkError::Config(
                "at least one of one-grams, two-grams or three-grams must be enabled".to_string(),
            ));
        }
        if !(0.0..0.5).contains(&self.max_power) {
            return Err(JunkError::Config(format!(
                "max-power must be in [0, 0.5), got {}",
                self.max_power
            )));
        }
        if !(0.0..0.5).contains(&self.ignore_words) {
            return Err(JunkError::Config(format!(
                "ignore-words must be in [0, 0.5), got {}",
                self.ignore_words
            )));
        }
        Ok(())
    }

    /// The enabled n-gram sizes, smallest first
    pub fn ngram_sizes(&self) -> Vec<usize> {
        [
            (1, self.one_grams),
            (2, self.two_grams),
            (3, self.three_grams),
        ]
        .into_iter()
        .filter(|(_, enabled)| *enabled)
        .map(|(n, _)| n)
        .collect()
    }
}

/// Ham and spam occurrence counts of a single token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordCounts {
    pub ham: u32,
    pub spam: u32,
}

impl WordCounts {
    pub fn total(&self) -> u64 {
        self.ham as u64 + self.spam as u64
    }

    pub fn is_empty(&self) -> bool {
        self.ham == 0 && self.spam == 0
    }

    pub(crate) fn add(&mut self, is_ham: bool) {
        if is_ham {
            self.ham = self.ham.saturating_add(1);
        } else {
            self.spam = self.spam.saturating_add(1);
        }
    }

    pub(crate) fn sub(&mut self, is_ham: bool) {
        if is_ham {
            self.ham = self.ham.saturating_sub(1);
        } else {
            self.spam = self.spam.saturating_sub(1);
        }
    }
}

/// A token that took part in scoring
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordScore {
    /// The token
    pub word: String,
    /// Smoothed spam probability of the token
    pub probability: f64,
    /// Training counts the probability was derived from
    pub counts: WordCounts,
}

/// Result of classifying a message
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    /// Combined spam probability, 0 is ham, 1 is spam
    pub probability: f64,
    /// All tokens of the message
    pub words: TokenSet,
    /// Retained ham-indicative tokens, most indicative first
    pub ham_words: Vec<WordScore>,
    /// Retained spam-indicative tokens, most indicative first
    pub spam_words: Vec<WordScore>,
    /// Tokens never seen during training
    pub unknown: usize,
    /// Tokens seen too rarely to be trusted
    pub rare: usize,
    /// Tokens too close to 0.5 to carry signal
    pub neutral: usize,
}

impl Classification {
    /// Whether the message is spam at the given threshold
    pub fn is_spam(&self, threshold: f64) -> bool {
        self.probability > threshold
    }
}

/// Counts of a batch training run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrainSummary {
    /// Ham messages trained
    pub ham: usize,
    /// Sent messages trained (as ham)
    pub sent: usize,
    /// Spam messages trained
    pub spam: usize,
    /// Files skipped because they could not be read or parsed
    pub malformed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_default() {
        let params = Params::default();
        assert!(!params.one_grams);
        assert!(params.two_grams);
        assert!(!params.three_grams);
        assert_eq!(params.max_power, 0.05);
        assert_eq!(params.ignore_words, 0.1);
        assert_eq!(params.top_words, 10);
        assert_eq!(params.rare_words, 1);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_params_require_ngram() {
        let params = Params {
            two_grams: false,
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(JunkError::Config(_))));
    }

    #[test]
    fn test_params_bounds() {
        let params = Params {
            max_power: 0.5,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = Params {
            ignore_words: -0.1,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_ngram_sizes() {
        let params = Params {
            one_grams: true,
            two_grams: false,
            three_grams: true,
            ..Default::default()
        };
        assert_eq!(params.ngram_sizes(), vec![1, 3]);
    }

    #[test]
    fn test_params_from_partial_toml() {
        let params: Params = toml::from_str("one_grams = true\ntop_words = 5").unwrap();
        assert!(params.one_grams);
        assert!(params.two_grams);
        assert_eq!(params.top_words, 5);
        assert_eq!(params.rare_words, 1);
    }

    #[test]
    fn test_word_counts() {
        let counts = WordCounts { ham: 2, spam: 3 };
        assert_eq!(counts.total(), 5);
        assert!(!counts.is_empty());
        assert!(WordCounts::default().is_empty());
    }
}
