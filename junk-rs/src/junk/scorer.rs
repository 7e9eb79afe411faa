//! Spam probability scoring
//!
//! Per-token probabilities are the class-normalized spam frequency, smoothed
//! toward 0.5 for tokens with few observations (Robinson) and bounded by the
//! maximum word power. Tokens that are rare or too close to 0.5 are dropped,
//! the strongest ham and spam indicators are kept, and those are combined in
//! log-odds space.

use std::cmp::Ordering;
use tracing::debug;

use super::rarity::RarityOracle;
use super::store::WordStore;
use super::types::{Classification, Params, TokenSet, WordCounts, WordScore};

/// Weight of the 0.5 prior in the smoothing, in observations.
const PRIOR_STRENGTH: f64 = 1.0;

/// Probability assumed for a token without evidence.
const PRIOR_PROBABILITY: f64 = 0.5;

/// Combines token statistics into a spam probability
pub struct Scorer<'a> {
    params: &'a Params,
    store: &'a WordStore,
    rarity: &'a dyn RarityOracle,
}

impl<'a> Scorer<'a> {
    pub fn new(params: &'a Params, store: &'a WordStore, rarity: &'a dyn RarityOracle) -> Self {
        Self {
            params,
            store,
            rarity,
        }
    }

    /// Smoothed, power-bounded spam probability of a token with `counts`
    pub fn word_probability(&self, counts: WordCounts) -> f64 {
        let ham_freq = frequency(counts.ham, self.store.hams());
        let spam_freq = frequency(counts.spam, self.store.spams());
        let raw = if ham_freq + spam_freq > 0.0 {
            spam_freq / (ham_freq + spam_freq)
        } else {
            PRIOR_PROBABILITY
        };

        let n = counts.total() as f64;
        let smoothed = (PRIOR_STRENGTH * PRIOR_PROBABILITY + n * raw) / (PRIOR_STRENGTH + n);

        smoothed.clamp(self.params.max_power, 1.0 - self.params.max_power)
    }

    /// Classify a set of tokens
    pub fn classify(&self, words: &TokenSet) -> Classification {
        let mut unknown = 0;
        let mut rare = 0;
        let mut neutral = 0;
        let mut hams = Vec::new();
        let mut spams = Vec::new();

        for word in words {
            if !self.rarity.at_least(word, self.params.rare_words.saturating_add(1)) {
                debug!(word = %word, "skipping rare word (rarity filter)");
                rare += 1;
                continue;
            }

            let counts = self.store.lookup(word);
            if counts.is_empty() {
                unknown += 1;
                continue;
            }
            if counts.total() <= self.params.rare_words as u64 {
                debug!(word = %word, ham = counts.ham, spam = counts.spam, "skipping rare word");
                rare += 1;
                continue;
            }

            let probability = self.word_probability(counts);
            if (probability - 0.5).abs() < self.params.ignore_words {
                debug!(word = %word, probability, "ignoring neutral word");
                neutral += 1;
                continue;
            }

            let score = WordScore {
                word: word.clone(),
                probability,
                counts,
            };
            if probability < 0.5 {
                hams.push(score);
            } else {
                spams.push(score);
            }
        }

        // Strongest indicators first, ties by word so results are reproducible.
        hams.sort_by(|a, b| cmp_prob(a.probability, b.probability).then_with(|| a.word.cmp(&b.word)));
        spams.sort_by(|a, b| cmp_prob(b.probability, a.probability).then_with(|| a.word.cmp(&b.word)));
        hams.truncate(self.params.top_words);
        spams.truncate(self.params.top_words);

        let log_odds: f64 = hams
            .iter()
            .chain(spams.iter())
            .map(|w| (w.probability / (1.0 - w.probability)).ln())
            .sum();
        let probability = combine(log_odds);

        for w in hams.iter().chain(spams.iter()) {
            debug!(
                word = %w.word,
                probability = w.probability,
                ham = w.counts.ham,
                spam = w.counts.spam,
                "scoring word"
            );
        }
        debug!(
            probability,
            ham_words = hams.len(),
            spam_words = spams.len(),
            unknown,
            rare,
            neutral,
            "classified"
        );

        Classification {
            probability,
            words: words.clone(),
            ham_words: hams,
            spam_words: spams,
            unknown,
            rare,
            neutral,
        }
    }
}

/// Occurrences of a token per trained message of its class
fn frequency(count: u32, messages: u32) -> f64 {
    if messages == 0 {
        0.0
    } else {
        count as f64 / messages as f64
    }
}

/// Logistic of the summed log-odds. An empty sum yields exactly 0.5.
fn combine(log_odds: f64) -> f64 {
    let p = 1.0 / (1.0 + (-log_odds).exp());
    if p.is_nan() {
        PRIOR_PROBABILITY
    } else {
        p.clamp(0.0, 1.0)
    }
}

fn cmp_prob(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}
