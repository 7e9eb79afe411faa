//! Message parsing for the junk filter
//!
//! Turns raw RFC 5322 bytes into the parts the classifier looks at: the
//! subject, the decoded body texts and the message date. MIME decoding is left
//! to `mail-parser`; this module only decides whether the input looks like a
//! message at all.

use chrono::{DateTime, Utc};
use mail_parser::MessageParser;
use std::path::Path;

use crate::error::{JunkError, Result};

/// A message reduced to the text the classifier scores
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedMessage {
    /// Subject header, decoded
    pub subject: Option<String>,
    /// Decoded text bodies, HTML parts converted to text
    pub texts: Vec<String>,
    /// Date header
    pub date: Option<DateTime<Utc>>,
}

impl ParsedMessage {
    /// Parse a raw message
    pub fn parse(raw: &[u8]) -> Result<Self> {
        if !has_header_block(raw) {
            return Err(JunkError::Parse("no message header found".to_string()));
        }

        let message = MessageParser::default()
            .parse(raw)
            .ok_or_else(|| JunkError::Parse("unparseable message".to_string()))?;

        let subject = message.subject().map(|s| s.to_string());

        let mut texts = Vec::new();
        let mut idx = 0;
        while let Some(text) = message.body_text(idx) {
            texts.push(text.into_owned());
            idx += 1;
        }

        let date = message
            .date()
            .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0));

        Ok(Self {
            subject,
            texts,
            date,
        })
    }

    /// Read and parse the message file at `path`
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read(path.as_ref())?;
        Self::parse(&raw)
    }

    /// Text segments to tokenize, subject first
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.subject
            .as_deref()
            .into_iter()
            .chain(self.texts.iter().map(|t| t.as_str()))
    }
}

/// Whether the input starts with a `Name: value` header line. Only the first
/// line is looked at.
fn has_header_block(raw: &[u8]) -> bool {
    let end = raw.iter().position(|&b| b == b'\n').unwrap_or(raw.len());
    let line = raw[..end].strip_suffix(b"\r").unwrap_or(&raw[..end]);
    match line.iter().position(|&b| b == b':') {
        Some(colon) if colon > 0 => line[..colon].iter().all(|b| b.is_ascii_graphic()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_has_header_block() {
        assert!(has_header_block(b"From: a@example.com\r\n\r\nBody"));
        assert!(has_header_block(b"Subject: hi\n"));
        assert!(!has_header_block(b""));
        assert!(!has_header_block(b"\nFrom: a@example.com"));
        assert!(!has_header_block(b"just some text without headers"));
        assert!(!has_header_block(b"not a header: because of spaces"));
        assert!(!has_header_block(b" folded: line\r\nFrom: a@example.com"));
    }

    #[test]
    fn test_header_check_ignores_body_bytes() {
        let mut raw = b"Subject: binary\r\n\r\n".to_vec();
        raw.extend_from_slice(&[0xff, 0xfe, 0x00, 0x80]);
        raw.extend(std::iter::repeat(b'x').take(1 << 16));
        assert!(has_header_block(&raw));

        assert!(!has_header_block(b"garbage first line\r\nSubject: late header\r\n"));
        assert!(has_header_block(b"X-Spam:\xff\xfe"));
    }

    #[test]
    fn test_parse_simple_text_email() {
        let message = b"From: sender@example.com\nTo: recipient@example.com\nSubject: Meeting agenda\nDate: Tue, 1 Jul 2003 10:52:37 +0200\n\nHello World";
        let parsed = ParsedMessage::parse(message).unwrap();

        assert_eq!(parsed.subject.as_deref(), Some("Meeting agenda"));
        assert_eq!(parsed.texts.len(), 1);
        assert!(parsed.texts[0].contains("Hello World"));
        assert_eq!(
            parsed.date,
            Some(Utc.with_ymd_and_hms(2003, 7, 1, 8, 52, 37).unwrap())
        );
    }

    #[test]
    fn test_parse_without_date() {
        let parsed = ParsedMessage::parse(b"Subject: no date\n\nbody").unwrap();
        assert!(parsed.date.is_none());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            ParsedMessage::parse(b"garbage"),
            Err(JunkError::Parse(_))
        ));
        assert!(ParsedMessage::parse(b"").is_err());
    }

    #[test]
    fn test_segments_subject_first() {
        let parsed = ParsedMessage {
            subject: Some("subject".to_string()),
            texts: vec!["one".to_string(), "two".to_string()],
            date: None,
        };
        let segments: Vec<&str> = parsed.segments().collect();
        assert_eq!(segments, vec!["subject", "one", "two"]);
    }
}
