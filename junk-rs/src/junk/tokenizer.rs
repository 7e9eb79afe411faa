//! Feature extraction
//!
//! Splits message text into lowercased alphanumeric words and builds the
//! enabled 1-, 2- and 3-grams from them.

use crate::message::ParsedMessage;

use super::types::{Params, TokenSet};

/// Words longer than this are encoded blobs or hashes, not language.
const MAX_WORD_LEN: usize = 40;

/// Joins the words of an n-gram. Never part of a word.
const NGRAM_SEPARATOR: &str = " ";

/// Turns text into a set of scoring features
#[derive(Debug, Clone)]
pub struct Tokenizer {
    sizes: Vec<usize>,
}

impl Tokenizer {
    /// Create a tokenizer for the n-gram sizes enabled in `params`
    pub fn new(params: &Params) -> Self {
        Self {
            sizes: params.ngram_sizes(),
        }
    }

    /// Tokenize all text of a parsed message
    pub fn tokenize_message(&self, message: &ParsedMessage) -> TokenSet {
        self.tokenize_segments(message.segments())
    }

    /// Tokenize independent text segments into one set. N-grams never span
    /// two segments.
    pub fn tokenize_segments<'a, I>(&self, segments: I) -> TokenSet
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut tokens = TokenSet::new();
        for segment in segments {
            self.add_segment(segment, &mut tokens);
        }
        tokens
    }

    /// Tokenize a single text
    pub fn tokenize(&self, text: &str) -> TokenSet {
        self.tokenize_segments(std::iter::once(text))
    }

    fn add_segment(&self, text: &str, tokens: &mut TokenSet) {
        let words = split_words(text);
        for &n in &self.sizes {
            for window in words.windows(n) {
                tokens.insert(window.join(NGRAM_SEPARATOR));
            }
        }
    }
}

/// Lowercased words of `text`, split on anything that is not alphanumeric
fn split_words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && w.chars().count() <= MAX_WORD_LEN)
        .map(|w| w.to_lowercase())
        .collect()
}
