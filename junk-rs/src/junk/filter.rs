//! Junk filter orchestration
//!
//! A [`Filter`] owns the word store, the rarity filter and the tokenizer for
//! one store on disk, and holds an exclusive lock on that store until it is
//! closed or dropped.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::rarity::{AlwaysCommon, CountingBloom, RarityOracle, DEFAULT_BLOOM_SLOTS};
use super::scorer::Scorer;
use super::store::WordStore;
use super::tokenizer::Tokenizer;
use super::types::{Classification, Params, TokenSet, TrainSummary, WordCounts};
use crate::error::{JunkError, Result};
use crate::message::ParsedMessage;

/// A trainable junk filter backed by files on disk
pub struct Filter {
    params: Params,
    tokenizer: Tokenizer,
    db_path: PathBuf,
    bloom_path: PathBuf,
    words: WordStore,
    bloom: Option<CountingBloom>,
    lock: File,
    /// State changed since the last save
    modified: bool,
    /// Trained without a rarity filter loaded; the one on disk is outdated
    bloom_stale: bool,
}

impl Filter {
    /// Create a new, empty filter. Fails if the database or bloom filter file
    /// already exists, so a trained filter is never overwritten by accident.
    pub fn new_filter<P: AsRef<Path>, Q: AsRef<Path>>(
        params: Params,
        db_path: P,
        bloom_path: Q,
    ) -> Result<Self> {
        params.validate()?;
        let db_path = db_path.as_ref().to_path_buf();
        let bloom_path = bloom_path.as_ref().to_path_buf();

        // Checked under the lock, so a filter closing concurrently cannot
        // write its files between the check and the lock.
        let lock = acquire_lock(&db_path)?;
        for path in [&db_path, &bloom_path] {
            if path.exists() {
                return Err(JunkError::AlreadyExists(path.clone()));
            }
        }

        info!(db = %db_path.display(), "created new junk filter");

        Ok(Self {
            tokenizer: Tokenizer::new(&params),
            words: WordStore::new(params.ngram_sizes()),
            bloom: Some(CountingBloom::new(DEFAULT_BLOOM_SLOTS)),
            params,
            db_path,
            bloom_path,
            lock,
            modified: true,
            bloom_stale: false,
        })
    }

    /// Open an existing filter, or start an empty one if the database does
    /// not exist yet. With `load_bloom` false the rarity filter is not loaded
    /// and every token is checked against the word store directly.
    pub fn open_filter<P: AsRef<Path>, Q: AsRef<Path>>(
        params: Params,
        db_path: P,
        bloom_path: Q,
        load_bloom: bool,
    ) -> Result<Self> {
        params.validate()?;
        let db_path = db_path.as_ref().to_path_buf();
        let bloom_path = bloom_path.as_ref().to_path_buf();

        let lock = acquire_lock(&db_path)?;

        let (words, digest, mut modified) = if db_path.exists() {
            let (words, digest) = WordStore::load_with_digest(&db_path)?;
            (words, Some(digest), false)
        } else {
            info!(db = %db_path.display(), "no junk filter database, starting empty");
            (WordStore::new(params.ngram_sizes()), None, true)
        };

        if !words.is_empty() && words.ngram_sizes() != params.ngram_sizes().as_slice() {
            warn!(
                trained = ?words.ngram_sizes(),
                configured = ?params.ngram_sizes(),
                "junk filter was trained with different n-gram sizes"
            );
        }

        let bloom = if !load_bloom {
            None
        } else {
            let loaded = if bloom_path.exists() {
                let (bloom, stamp) = CountingBloom::load(&bloom_path)?;
                if digest == Some(stamp) {
                    Some(bloom)
                } else {
                    warn!(bloom = %bloom_path.display(), "rarity filter does not match database, rebuilding");
                    None
                }
            } else {
                None
            };
            match loaded {
                Some(bloom) => Some(bloom),
                None => {
                    modified = true;
                    Some(rebuild_bloom(&words))
                }
            }
        };

        info!(
            db = %db_path.display(),
            words = words.len(),
            hams = words.hams(),
            spams = words.spams(),
            "opened junk filter"
        );

        Ok(Self {
            tokenizer: Tokenizer::new(&params),
            params,
            db_path,
            bloom_path,
            words,
            bloom,
            lock,
            modified,
            bloom_stale: false,
        })
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Number of (ham, spam) messages trained
    pub fn message_counts(&self) -> (u32, u32) {
        (self.words.hams(), self.words.spams())
    }

    /// Number of distinct tokens in the database
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Training counts of a single token
    pub fn word_counts(&self, word: &str) -> WordCounts {
        self.words.lookup(word)
    }

    /// Whether a rarity filter is loaded
    pub fn has_bloom(&self) -> bool {
        self.bloom.is_some()
    }

    /// Tokenize a parsed message with this filter's n-gram settings
    pub fn parse_message(&self, message: &ParsedMessage) -> TokenSet {
        self.tokenizer.tokenize_message(message)
    }

    /// Train one message, given as its token set
    pub fn train(&mut self, is_ham: bool, words: &TokenSet) -> Result<()> {
        for word in words {
            self.words.increment(word, is_ham);
        }
        match self.bloom.as_mut() {
            Some(bloom) => words.iter().for_each(|w| bloom.record(w)),
            None => self.bloom_stale = true,
        }
        self.words.add_message(is_ham);
        self.modified = true;
        Ok(())
    }

    /// Undo an earlier [`Filter::train`] of the same token set, e.g. when a
    /// user reclassifies a message.
    pub fn untrain(&mut self, is_ham: bool, words: &TokenSet) -> Result<()> {
        self.words.remove_message(is_ham)?;
        for word in words {
            if self.words.remove(word, is_ham) {
                match self.bloom.as_mut() {
                    Some(bloom) => bloom.forget(word),
                    None => self.bloom_stale = true,
                }
            }
        }
        self.modified = true;
        Ok(())
    }

    /// Read, parse and train the message file at `path`
    pub fn train_message_path<P: AsRef<Path>>(&mut self, is_ham: bool, path: P) -> Result<()> {
        let message = ParsedMessage::from_path(path)?;
        let words = self.parse_message(&message);
        self.train(is_ham, &words)
    }

    /// Read, parse and untrain the message file at `path`
    pub fn untrain_message_path<P: AsRef<Path>>(&mut self, is_ham: bool, path: P) -> Result<()> {
        let message = ParsedMessage::from_path(path)?;
        let words = self.parse_message(&message);
        self.untrain(is_ham, &words)
    }

    /// Train the named files from a ham, an optional sent and a spam
    /// directory. Sent messages are the user's own and are trained as ham.
    /// Files that cannot be read or parsed are skipped and counted.
    pub fn train_dirs(
        &mut self,
        ham_dir: &Path,
        sent_dir: Option<&Path>,
        spam_dir: &Path,
        ham_files: &[String],
        sent_files: &[String],
        spam_files: &[String],
    ) -> Result<TrainSummary> {
        let start = Instant::now();
        let mut summary = TrainSummary::default();

        summary.ham = self.train_files(ham_dir, ham_files, true, &mut summary.malformed)?;
        if let Some(sent_dir) = sent_dir {
            summary.sent = self.train_files(sent_dir, sent_files, true, &mut summary.malformed)?;
        }
        summary.spam = self.train_files(spam_dir, spam_files, false, &mut summary.malformed)?;

        info!(
            ham = summary.ham,
            sent = summary.sent,
            spam = summary.spam,
            malformed = summary.malformed,
            duration_ms = start.elapsed().as_millis() as u64,
            "training done"
        );
        Ok(summary)
    }

    fn train_files(
        &mut self,
        dir: &Path,
        files: &[String],
        is_ham: bool,
        malformed: &mut usize,
    ) -> Result<usize> {
        let mut trained = 0;
        for name in files {
            let path = dir.join(name);
            let message = match ParsedMessage::from_path(&path) {
                Ok(message) => message,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping message");
                    *malformed += 1;
                    continue;
                }
            };
            let words = self.parse_message(&message);
            self.train(is_ham, &words)?;
            trained += 1;
        }
        Ok(trained)
    }

    /// Score a token set
    pub fn classify_words(&self, words: &TokenSet) -> Classification {
        let rarity: &dyn RarityOracle = match &self.bloom {
            Some(bloom) => bloom,
            None => &AlwaysCommon,
        };
        Scorer::new(&self.params, &self.words, rarity).classify(words)
    }

    /// Tokenize and score a parsed message
    pub fn classify_message(&self, message: &ParsedMessage) -> Classification {
        self.classify_words(&self.parse_message(message))
    }

    /// Read, parse, tokenize and score the message file at `path`
    pub fn classify_message_path<P: AsRef<Path>>(&self, path: P) -> Result<Classification> {
        let path = path.as_ref();
        let message = ParsedMessage::from_path(path)?;
        let result = self.classify_message(&message);
        debug!(path = %path.display(), probability = result.probability, "classified message");
        Ok(result)
    }

    /// Write the database and rarity filter to disk. Does nothing when
    /// nothing changed since the last successful save.
    pub fn save(&mut self) -> Result<()> {
        if !self.modified {
            return Ok(());
        }

        let digest = self.words.save(&self.db_path)?;
        match &self.bloom {
            Some(bloom) => bloom.save(&self.bloom_path, &digest)?,
            None if self.bloom_stale && self.bloom_path.exists() => {
                // Rebuilt from the database on the next open.
                fs::remove_file(&self.bloom_path)?;
                self.bloom_stale = false;
            }
            None => {}
        }

        self.modified = false;
        info!(
            db = %self.db_path.display(),
            words = self.words.len(),
            hams = self.words.hams(),
            spams = self.words.spams(),
            "saved junk filter"
        );
        Ok(())
    }

    /// Save and release the filter
    pub fn close(mut self) -> Result<()> {
        self.save()
    }

    /// Release the filter without saving
    pub fn discard(self) {
        debug!(db = %self.db_path.display(), "discarding junk filter changes");
    }
}

impl Drop for Filter {
    fn drop(&mut self) {
        let _ = self.lock.unlock();
    }
}

/// Path of the lock file guarding the database at `db_path`
fn lock_path(db_path: &Path) -> PathBuf {
    let mut path = db_path.as_os_str().to_owned();
    path.push(".lock");
    PathBuf::from(path)
}

fn acquire_lock(db_path: &Path) -> Result<File> {
    let path = lock_path(db_path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)?;

    match file.try_lock_exclusive() {
        Ok(()) => Ok(file),
        Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
            Err(JunkError::Locked(db_path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

fn rebuild_bloom(words: &WordStore) -> CountingBloom {
    let mut bloom = CountingBloom::new(DEFAULT_BLOOM_SLOTS);
    for (word, counts) in words.iter() {
        bloom.record_n(word, counts.total());
    }
    if !words.is_empty() {
        info!(words = words.len(), "rebuilt rarity filter from database");
    }
    bloom
}
