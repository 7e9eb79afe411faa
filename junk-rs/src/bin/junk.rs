//! CLI tool for training and evaluating junk filters
//!
//! # Usage
//!
//! ```bash
//! # Train a new filter from a ham and a spam directory
//! junk train Archive/ Junk/ --sent-dir Sent/
//!
//! # Print the spam probability of a message
//! junk check message.eml
//!
//! # Report how well the filter separates two labeled directories
//! junk test Archive/ Junk/
//!
//! # Train on half of the messages, test on the other half
//! junk analyze Archive/ Junk/ --train-ratio 0.5
//!
//! # Replay messages in order of arrival
//! junk play Archive/ Junk/
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use junk_rs::evaluate::{self, EvalOptions};
use junk_rs::{Filter, JunkConfig};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "junk")]
#[command(about = "Train and evaluate junk filters", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use 1-grams, i.e. single words, for scoring
    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "true")]
    one_grams: Option<bool>,

    /// Use 2-grams, i.e. word pairs, for scoring
    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "true")]
    two_grams: Option<bool>,

    /// Use 3-grams, i.e. word triplets, for scoring
    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "true")]
    three_grams: Option<bool>,

    /// Maximum word power, e.g. min 0.05/max 0.95
    #[arg(long, global = true)]
    max_power: Option<f64>,

    /// Ignore words with ham/spaminess within this distance from 0.5
    #[arg(long, global = true)]
    ignore_words: Option<f64>,

    /// Number of top spam and number of top ham words from a message to use
    #[arg(long, global = true)]
    top_words: Option<usize>,

    /// Words are rare if encountered this number of times during training
    #[arg(long, global = true)]
    rare_words: Option<u32>,

    /// Mark messages as spam if their probability is above this threshold
    #[arg(long, global = true)]
    spam_threshold: Option<f64>,

    /// Fraction of messages to use for training during analyze
    #[arg(long, global = true)]
    train_ratio: Option<f64>,

    /// Seed the analyze shuffle from the current time instead of a fixed seed
    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "true")]
    seed: Option<bool>,

    /// Directory with sent messages, trained as ham
    #[arg(long, global = true)]
    sent_dir: Option<PathBuf>,

    /// Database file (default filter.db)
    #[arg(long, global = true)]
    dbpath: Option<PathBuf>,

    /// Bloom filter file (default filter.bloom)
    #[arg(long, global = true)]
    bloompath: Option<PathBuf>,

    /// Log every scored word
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a new junk filter with messages from a ham and a spam directory
    Train {
        /// Directory with ham messages
        ham_dir: PathBuf,
        /// Directory with spam messages
        spam_dir: PathBuf,
    },
    /// Print the spam probability of a message, from 0 to 1
    Check {
        /// Message file
        mail_file: PathBuf,
        /// Print the full classification as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check a ham and a spam directory against the filter and report the
    /// success ratio
    Test {
        ham_dir: PathBuf,
        spam_dir: PathBuf,
    },
    /// Train a new filter on part of the messages and test it on the rest
    Analyze {
        ham_dir: PathBuf,
        spam_dir: PathBuf,
    },
    /// Replay messages in order of arrival and report filter performance
    Play {
        ham_dir: PathBuf,
        spam_dir: PathBuf,
    },
}

impl Cli {
    /// Configuration file values with command line overrides applied
    fn load_config(&self) -> anyhow::Result<JunkConfig> {
        let mut config = match &self.config {
            Some(path) => JunkConfig::from_file(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => JunkConfig::default(),
        };

        let params = &mut config.params;
        if let Some(v) = self.one_grams {
            params.one_grams = v;
        }
        if let Some(v) = self.two_grams {
            params.two_grams = v;
        }
        if let Some(v) = self.three_grams {
            params.three_grams = v;
        }
        if let Some(v) = self.max_power {
            params.max_power = v;
        }
        if let Some(v) = self.ignore_words {
            params.ignore_words = v;
        }
        if let Some(v) = self.top_words {
            params.top_words = v;
        }
        if let Some(v) = self.rare_words {
            params.rare_words = v;
        }

        let evaluation = &mut config.evaluation;
        if let Some(v) = self.spam_threshold {
            evaluation.spam_threshold = v;
        }
        if let Some(v) = self.train_ratio {
            evaluation.train_ratio = v;
        }
        if let Some(v) = self.seed {
            evaluation.seed = v;
        }
        if let Some(dir) = &self.sent_dir {
            evaluation.sent_dir = Some(dir.clone());
        }

        if let Some(path) = &self.dbpath {
            config.storage.database_path = path.clone();
        }
        if let Some(path) = &self.bloompath {
            config.storage.bloom_path = path.clone();
        }
        if self.debug {
            config.logging.level = "debug".to_string();
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    // Initialize logging; reports go to stdout, logs to stderr
    let default_filter = format!("junk_rs={}", config.logging.level);
    let env_filter = if cli.debug {
        tracing_subscriber::EnvFilter::new(default_filter)
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| default_filter.into())
    };
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let storage = &config.storage;
    let options = EvalOptions::from(&config.evaluation);
    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Commands::Train { ham_dir, spam_dir } => {
            let mut filter = Filter::new_filter(
                config.params.clone(),
                &storage.database_path,
                &storage.bloom_path,
            )?;

            let ham_files = evaluate::list_dir(&ham_dir)
                .with_context(|| format!("listing {}", ham_dir.display()))?;
            let spam_files = evaluate::list_dir(&spam_dir)
                .with_context(|| format!("listing {}", spam_dir.display()))?;
            let sent_files = match &options.sent_dir {
                Some(dir) => evaluate::list_dir(dir)
                    .with_context(|| format!("listing {}", dir.display()))?,
                None => Vec::new(),
            };

            filter.train_dirs(
                &ham_dir,
                options.sent_dir.as_deref(),
                &spam_dir,
                &ham_files,
                &sent_files,
                &spam_files,
            )?;
            filter.close().context("saving filter")?;
        }
        Commands::Check { mail_file, json } => {
            let filter = open_existing(&config)?;
            let result = filter
                .classify_message_path(&mail_file)
                .with_context(|| format!("classifying {}", mail_file.display()))?;
            if json {
                writeln!(stdout, "{}", serde_json::to_string_pretty(&result)?)?;
            } else {
                writeln!(stdout, "{:.6}", result.probability)?;
            }
            filter.discard();
        }
        Commands::Test { ham_dir, spam_dir } => {
            let filter = open_existing(&config)?;
            let outcome = evaluate::test_dirs(
                &filter,
                &ham_dir,
                &spam_dir,
                options.spam_threshold,
                &mut stdout,
            )?;
            write!(stdout, "{}", outcome)?;
            filter.discard();
        }
        Commands::Analyze { ham_dir, spam_dir } => {
            let mut filter = Filter::new_filter(
                config.params.clone(),
                &storage.database_path,
                &storage.bloom_path,
            )?;
            let report = evaluate::analyze(&mut filter, &ham_dir, &spam_dir, &options, &mut stdout)?;
            write!(stdout, "{}", report)?;
            filter.close().context("saving filter")?;
        }
        Commands::Play { ham_dir, spam_dir } => {
            let mut filter = Filter::new_filter(
                config.params.clone(),
                &storage.database_path,
                &storage.bloom_path,
            )?;
            let report = evaluate::play(&mut filter, &ham_dir, &spam_dir, &options)?;
            write!(stdout, "{}", report)?;
            filter.close().context("saving filter")?;
        }
    }

    Ok(())
}

/// Open the configured filter read-only, without its rarity filter
fn open_existing(config: &JunkConfig) -> anyhow::Result<Filter> {
    let db = &config.storage.database_path;
    if !Path::new(db).exists() {
        anyhow::bail!("no junk filter database at {}", db.display());
    }
    let filter = Filter::open_filter(config.params.clone(), db, &config.storage.bloom_path, false)?;
    Ok(filter)
}
