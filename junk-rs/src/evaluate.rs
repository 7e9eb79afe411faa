//! Evaluation policies
//!
//! Batch procedures measuring how well a filter separates ham from spam:
//! testing against labeled directories, a train/test split of a corpus and a
//! chronological replay of a mailbox.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::EvaluationConfig;
use crate::error::{JunkError, Result};
use crate::junk::{Filter, TrainSummary};
use crate::message::ParsedMessage;

/// Names of the files in `dir`, sorted
pub fn list_dir(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

/// Seed for the corpus shuffle of [`analyze`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShuffleSeed {
    /// Same shuffle on every run
    Fixed(u64),
    /// Seeded from the current time
    TimeBased,
}

impl ShuffleSeed {
    /// The `--seed` flag asks for a time based seed, otherwise seed 0 is used
    pub fn from_flag(seed: bool) -> Self {
        if seed {
            Self::TimeBased
        } else {
            Self::Fixed(0)
        }
    }

    pub fn rng(self) -> StdRng {
        match self {
            Self::Fixed(seed) => StdRng::seed_from_u64(seed),
            Self::TimeBased => StdRng::seed_from_u64(Utc::now().timestamp_millis() as u64),
        }
    }
}

/// Settings shared by the evaluation policies
#[derive(Debug, Clone, PartialEq)]
pub struct EvalOptions {
    /// Messages scoring above this are spam
    pub spam_threshold: f64,
    /// Fraction of each directory used for training in [`analyze`]
    pub train_ratio: f64,
    pub seed: ShuffleSeed,
    /// Directory with the user's sent messages, trained as ham
    pub sent_dir: Option<PathBuf>,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self::from(&EvaluationConfig::default())
    }
}

impl From<&EvaluationConfig> for EvalOptions {
    fn from(config: &EvaluationConfig) -> Self {
        Self {
            spam_threshold: config.spam_threshold,
            train_ratio: config.train_ratio,
            seed: ShuffleSeed::from_flag(config.seed),
            sent_dir: config.sent_dir.clone(),
        }
    }
}

/// Classification tallies of an evaluation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outcome {
    pub ham_ok: usize,
    pub ham_bad: usize,
    pub ham_malformed: usize,
    pub spam_ok: usize,
    pub spam_bad: usize,
    pub spam_malformed: usize,
}

impl Outcome {
    /// Tally one classified message. Returns whether it was classified
    /// correctly: a ham must score below the threshold, a spam above it.
    pub fn record(&mut self, is_ham: bool, probability: f64, threshold: f64) -> bool {
        let ok = if is_ham {
            probability < threshold
        } else {
            probability > threshold
        };
        match (is_ham, ok) {
            (true, true) => self.ham_ok += 1,
            (true, false) => self.ham_bad += 1,
            (false, true) => self.spam_ok += 1,
            (false, false) => self.spam_bad += 1,
        }
        ok
    }

    /// Tally one message that could not be parsed
    pub fn record_malformed(&mut self, is_ham: bool) {
        if is_ham {
            self.ham_malformed += 1;
        } else {
            self.spam_malformed += 1;
        }
    }

    pub fn malformed(&self) -> usize {
        self.ham_malformed + self.spam_malformed
    }

    /// True negative rate, hams identified as ham
    pub fn specificity(&self) -> Option<f64> {
        ratio(self.ham_ok, self.ham_ok + self.ham_bad)
    }

    /// True positive rate, spams identified as spam
    pub fn sensitivity(&self) -> Option<f64> {
        ratio(self.spam_ok, self.spam_ok + self.spam_bad)
    }

    /// Fraction of all classified messages identified correctly
    pub fn accuracy(&self) -> Option<f64> {
        ratio(
            self.ham_ok + self.spam_ok,
            self.ham_ok + self.ham_bad + self.spam_ok + self.spam_bad,
        )
    }
}

fn ratio(num: usize, denom: usize) -> Option<f64> {
    (denom > 0).then(|| num as f64 / denom as f64)
}

struct Metric(Option<f64>);

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{:.6}", v),
            None => write!(f, "n/a"),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "total ham, ok {}, bad {}", self.ham_ok, self.ham_bad)?;
        if self.ham_malformed > 0 {
            write!(f, ", malformed {}", self.ham_malformed)?;
        }
        writeln!(f)?;
        write!(f, "total spam, ok {}, bad {}", self.spam_ok, self.spam_bad)?;
        if self.spam_malformed > 0 {
            write!(f, ", malformed {}", self.spam_malformed)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "specifity (true negatives, hams identified): {}",
            Metric(self.specificity())
        )?;
        writeln!(
            f,
            "sensitivity (true positives, spams identified): {}",
            Metric(self.sensitivity())
        )?;
        writeln!(f, "accuracy: {}", Metric(self.accuracy()))
    }
}

/// Classify the named files of one labeled directory, writing a line for
/// every misclassified message to `out`
fn test_files<W: Write>(
    filter: &Filter,
    dir: &Path,
    files: &[String],
    is_ham: bool,
    threshold: f64,
    outcome: &mut Outcome,
    out: &mut W,
) -> Result<()> {
    for name in files {
        let path = dir.join(name);
        let result = match filter.classify_message_path(&path) {
            Ok(result) => result,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot classify message");
                outcome.record_malformed(is_ham);
                continue;
            }
        };
        let p = result.probability;
        outcome.record(is_ham, p, threshold);
        // A score exactly at the threshold counts as wrong but is not listed.
        if (is_ham && p > threshold) || (!is_ham && p < threshold) {
            writeln!(
                out,
                "{} {:?}: {:.4}",
                if is_ham { "ham" } else { "spam" },
                path.display().to_string(),
                p
            )?;
        }
    }
    Ok(())
}

/// Check every message in a ham and a spam directory against the filter
pub fn test_dirs<W: Write>(
    filter: &Filter,
    ham_dir: &Path,
    spam_dir: &Path,
    threshold: f64,
    out: &mut W,
) -> Result<Outcome> {
    let ham_files = list_dir(ham_dir)?;
    let spam_files = list_dir(spam_dir)?;

    let mut outcome = Outcome::default();
    test_files(filter, ham_dir, &ham_files, true, threshold, &mut outcome, out)?;
    test_files(filter, spam_dir, &spam_files, false, threshold, &mut outcome, out)?;
    Ok(outcome)
}

/// Shuffle `files` and split them into a training and a test part, the
/// training part holding `floor(ratio * len)` files
pub fn split_corpus(
    mut files: Vec<String>,
    ratio: f64,
    rng: &mut StdRng,
) -> (Vec<String>, Vec<String>) {
    files.shuffle(rng);
    let ntrain = ((ratio.clamp(0.0, 1.0) * files.len() as f64) as usize).min(files.len());
    let test = files.split_off(ntrain);
    (files, test)
}

/// Result of [`analyze`]
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeReport {
    pub trained: TrainSummary,
    pub outcome: Outcome,
}

impl fmt::Display for AnalyzeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "training done, nham {}, nsent {}, nspam {}",
            self.trained.ham, self.trained.sent, self.trained.spam
        )?;
        write!(f, "{}", self.outcome)
    }
}

/// Train on a shuffled part of the ham and spam directories (plus all sent
/// messages) and test on the rest
pub fn analyze<W: Write>(
    filter: &mut Filter,
    ham_dir: &Path,
    spam_dir: &Path,
    options: &EvalOptions,
    out: &mut W,
) -> Result<AnalyzeReport> {
    let mut rng = options.seed.rng();
    let (train_ham, test_ham) = split_corpus(list_dir(ham_dir)?, options.train_ratio, &mut rng);
    let (train_spam, test_spam) = split_corpus(list_dir(spam_dir)?, options.train_ratio, &mut rng);
    let sent_files = match &options.sent_dir {
        Some(dir) => list_dir(dir)?,
        None => Vec::new(),
    };

    let trained = filter.train_dirs(
        ham_dir,
        options.sent_dir.as_deref(),
        spam_dir,
        &train_ham,
        &sent_files,
        &train_spam,
    )?;

    let mut outcome = Outcome::default();
    let threshold = options.spam_threshold;
    test_files(filter, ham_dir, &test_ham, true, threshold, &mut outcome, out)?;
    test_files(filter, spam_dir, &test_spam, false, threshold, &mut outcome, out)?;

    Ok(AnalyzeReport { trained, outcome })
}

/// Result of [`play`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayReport {
    /// Dated ham messages found
    pub ham: usize,
    /// Dated sent messages found
    pub sent: usize,
    /// Dated spam messages found
    pub spam: usize,
    /// Messages that could not be parsed
    pub bad: usize,
    /// Messages without a date, left out
    pub undated: usize,
    pub outcome: Outcome,
}

impl fmt::Display for PlayReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "completed, nham {}, nsent {}, nspam {}, nbad {}, nwithoutdate {}",
            self.ham, self.sent, self.spam, self.bad, self.undated
        )?;
        write!(f, "{}", self.outcome)
    }
}

struct DatedMessage {
    path: PathBuf,
    is_ham: bool,
    sent: bool,
    date: DateTime<Utc>,
}

/// Parse a message for play, counting it as bad when it is not a message.
/// Read failures are fatal.
fn parse_for_play(path: &Path, report: &mut PlayReport) -> Result<Option<ParsedMessage>> {
    match ParsedMessage::from_path(path) {
        Ok(message) => Ok(Some(message)),
        Err(JunkError::Parse(reason)) => {
            warn!(path = %path.display(), reason = %reason, "bad message");
            report.bad += 1;
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Replay all messages in order of their date as if they were arriving:
/// classify each (except sent messages), tally the verdict, then train on it.
/// The filter is saved at the end.
pub fn play(
    filter: &mut Filter,
    ham_dir: &Path,
    spam_dir: &Path,
    options: &EvalOptions,
) -> Result<PlayReport> {
    let mut report = PlayReport::default();
    let mut messages = Vec::new();

    let mut dirs = vec![(ham_dir, true, false), (spam_dir, false, false)];
    if let Some(sent_dir) = options.sent_dir.as_deref() {
        dirs.push((sent_dir, true, true));
    }

    for (dir, is_ham, sent) in dirs {
        for name in list_dir(dir)? {
            let path = dir.join(name);
            let Some(message) = parse_for_play(&path, &mut report)? else {
                continue;
            };
            let Some(date) = message.date else {
                report.undated += 1;
                continue;
            };
            match (sent, is_ham) {
                (true, _) => report.sent += 1,
                (false, true) => report.ham += 1,
                (false, false) => report.spam += 1,
            }
            messages.push(DatedMessage {
                path,
                is_ham,
                sent,
                date,
            });
        }
    }

    // Stable, so messages with equal dates keep directory order.
    messages.sort_by_key(|m| m.date);
    info!(messages = messages.len(), "playing messages");

    for m in &messages {
        let Some(parsed) = parse_for_play(&m.path, &mut report)? else {
            continue;
        };
        let words = filter.parse_message(&parsed);
        if !m.sent {
            let result = filter.classify_words(&words);
            report
                .outcome
                .record(m.is_ham, result.probability, options.spam_threshold);
        }
        filter.train(m.is_ham, &words)?;
    }

    filter.save()?;
    Ok(report)
}
