//! Integration tests for the junk filter

use junk_rs::junk::{Filter, Params, TokenSet};
use junk_rs::{JunkError, ParsedMessage};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Helper to write a message file
fn write_message(dir: &Path, name: &str, subject: &str, body: &str) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    let raw = format!(
        "From: sender@example.com\r\nTo: user@example.com\r\nSubject: {}\r\n\r\n{}\r\n",
        subject, body
    );
    std::fs::write(&path, raw).unwrap();
    path
}

fn scenario_params() -> Params {
    Params {
        one_grams: true,
        two_grams: true,
        ..Default::default()
    }
}

/// Filter trained on five spams about viagra and five hams about meetings
fn trained_filter(root: &Path) -> Filter {
    let mut filter = Filter::new_filter(
        scenario_params(),
        root.join("filter.db"),
        root.join("filter.bloom"),
    )
    .unwrap();

    let offers = ["limited offer", "best price", "order today", "no prescription", "huge discount"];
    let meetings = ["monday morning", "room four", "quarterly review", "project status", "budget notes"];
    for (i, (offer, meeting)) in offers.iter().zip(meetings.iter()).enumerate() {
        let spam = write_message(&root.join("spam"), &i.to_string(), "free viagra now", offer);
        let ham = write_message(&root.join("ham"), &i.to_string(), "meeting agenda", meeting);
        filter.train_message_path(false, &spam).unwrap();
        filter.train_message_path(true, &ham).unwrap();
    }
    filter
}

fn set(words: &[&str]) -> TokenSet {
    words.iter().map(|w| w.to_string()).collect()
}

#[test]
fn test_spam_and_ham_scenario() {
    let dir = TempDir::new().unwrap();
    let filter = trained_filter(dir.path());

    let spam = write_message(dir.path(), "new-spam", "free viagra now", "free viagra now");
    let ham = write_message(dir.path(), "new-ham", "meeting agenda", "meeting agenda");

    let spam_result = filter.classify_message_path(&spam).unwrap();
    let ham_result = filter.classify_message_path(&ham).unwrap();

    assert!(spam_result.probability > 0.95, "spam scored {}", spam_result.probability);
    assert!(ham_result.probability < 0.05, "ham scored {}", ham_result.probability);
    assert!(spam_result.is_spam(0.95));
    assert!(!ham_result.is_spam(0.95));
    assert!(spam_result.words.contains("free viagra"));
}

#[test]
fn test_result_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let filter = trained_filter(root);
    let words = set(&["free", "viagra", "free viagra", "meeting"]);
    let before = filter.classify_words(&words).probability;
    let counts = filter.message_counts();
    filter.close().unwrap();

    let filter = Filter::open_filter(
        scenario_params(),
        root.join("filter.db"),
        root.join("filter.bloom"),
        true,
    )
    .unwrap();
    assert_eq!(filter.message_counts(), counts);
    assert_eq!(filter.classify_words(&words).probability, before);
}

#[test]
fn test_bloom_does_not_change_results() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    trained_filter(root).close().unwrap();

    let words = set(&["free", "viagra", "meeting agenda", "order today", "unseen words"]);

    let with_bloom =
        Filter::open_filter(scenario_params(), root.join("filter.db"), root.join("filter.bloom"), true)
            .unwrap();
    let a = with_bloom.classify_words(&words);
    with_bloom.discard();

    let without_bloom =
        Filter::open_filter(scenario_params(), root.join("filter.db"), root.join("filter.bloom"), false)
            .unwrap();
    let b = without_bloom.classify_words(&words);

    assert_eq!(a.probability, b.probability);
    assert_eq!(a.spam_words, b.spam_words);
    assert_eq!(a.ham_words, b.ham_words);
    assert_eq!(a.rare + a.unknown, b.rare + b.unknown);
}

#[test]
fn test_empty_and_neutral_input() {
    let dir = TempDir::new().unwrap();
    let mut filter = trained_filter(dir.path());

    assert_eq!(filter.classify_words(&TokenSet::new()).probability, 0.5);

    // Equally common in both classes
    for _ in 0..5 {
        filter.train(true, &set(&["hello"])).unwrap();
        filter.train(false, &set(&["hello"])).unwrap();
    }
    let result = filter.classify_words(&set(&["hello"]));
    assert_eq!(result.probability, 0.5);
    assert_eq!(result.neutral, 1);
}

#[test]
fn test_untrain_message_path() {
    let dir = TempDir::new().unwrap();
    let mut filter = trained_filter(dir.path());
    let spam = write_message(dir.path(), "reported", "cheap watches", "cheap watches here");

    let before = filter.word_count();
    filter.train_message_path(false, &spam).unwrap();
    assert!(filter.word_count() > before);
    filter.untrain_message_path(false, &spam).unwrap();
    assert_eq!(filter.word_count(), before);
    assert_eq!(filter.message_counts(), (5, 5));
}

#[test]
fn test_malformed_message_is_an_error() {
    let dir = TempDir::new().unwrap();
    let mut filter = trained_filter(dir.path());
    let path = dir.path().join("garbage");
    std::fs::write(&path, "this is not an email message").unwrap();

    assert!(matches!(filter.classify_message_path(&path), Err(JunkError::Parse(_))));
    assert!(matches!(
        filter.train_message_path(true, &path),
        Err(JunkError::Parse(_))
    ));
    assert_eq!(filter.message_counts(), (5, 5));
    assert!(matches!(
        filter.classify_message_path(dir.path().join("missing")),
        Err(JunkError::Io(_))
    ));
}

#[test]
fn test_train_dirs_counts_sent_and_malformed() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write_message(&root.join("ham"), "1", "meeting agenda", "monday");
    write_message(&root.join("spam"), "1", "free viagra", "now");
    std::fs::write(root.join("spam").join("2"), "").unwrap();
    write_message(&root.join("sent"), "1", "re: meeting agenda", "see you");

    let mut filter =
        Filter::new_filter(Params::default(), root.join("filter.db"), root.join("filter.bloom"))
            .unwrap();
    let summary = filter
        .train_dirs(
            &root.join("ham"),
            Some(root.join("sent").as_path()),
            &root.join("spam"),
            &["1".to_string()],
            &["1".to_string()],
            &["1".to_string(), "2".to_string(), "3".to_string()],
        )
        .unwrap();

    assert_eq!((summary.ham, summary.sent, summary.spam), (1, 1, 1));
    // One empty file, one missing file
    assert_eq!(summary.malformed, 2);
    assert_eq!(filter.message_counts(), (2, 1));
}

#[test]
fn test_parse_message_matches_tokenizer() {
    let dir = TempDir::new().unwrap();
    let filter =
        Filter::new_filter(Params::default(), dir.path().join("db"), dir.path().join("bloom"))
            .unwrap();
    let message = ParsedMessage {
        subject: Some("Free Viagra".to_string()),
        texts: vec!["now now".to_string()],
        date: None,
    };
    assert_eq!(filter.parse_message(&message), set(&["free viagra", "now now"]));
}

mod corruption {
    use super::*;

    fn saved_store(root: &Path) -> PathBuf {
        trained_filter(root).close().unwrap();
        root.join("filter.db")
    }

    fn open(root: &Path) -> junk_rs::Result<Filter> {
        Filter::open_filter(scenario_params(), root.join("filter.db"), root.join("filter.bloom"), true)
    }

    #[test]
    fn test_truncated_store_rejected() {
        let dir = TempDir::new().unwrap();
        let db = saved_store(dir.path());
        let data = std::fs::read(&db).unwrap();
        std::fs::write(&db, &data[..data.len() - 5]).unwrap();

        assert!(matches!(open(dir.path()), Err(JunkError::Corrupt { .. })));
    }

    #[test]
    fn test_flipped_byte_rejected() {
        let dir = TempDir::new().unwrap();
        let db = saved_store(dir.path());
        let mut data = std::fs::read(&db).unwrap();
        let last = data.len() - 1;
        data[last] ^= 0xff;
        std::fs::write(&db, &data).unwrap();

        assert!(matches!(open(dir.path()), Err(JunkError::Corrupt { .. })));
    }

    #[test]
    fn test_other_version_rejected() {
        let dir = TempDir::new().unwrap();
        let db = saved_store(dir.path());
        let mut data = std::fs::read(&db).unwrap();
        data[8..12].copy_from_slice(&99u32.to_le_bytes());
        std::fs::write(&db, &data).unwrap();

        assert!(matches!(
            open(dir.path()),
            Err(JunkError::IncompatibleVersion { found: 99, expected: 1, .. })
        ));
    }

    #[test]
    fn test_corrupt_bloom_rejected() {
        let dir = TempDir::new().unwrap();
        saved_store(dir.path());
        std::fs::write(dir.path().join("filter.bloom"), b"short").unwrap();

        assert!(matches!(open(dir.path()), Err(JunkError::Corrupt { .. })));
    }
}
