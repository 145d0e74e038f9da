//! Text formats for the topic catalog and synonym table.
//!
//! This file is compiled twice: once into the library and once into `build.rs`
//! (via `#[path]`), so it must only depend on `std`.

use std::fmt;

/// Span into a flat list of synonym targets, packed into a single FST value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: u32,
    pub len: u32,
}

#[allow(dead_code)]
impl Range {
    pub const fn new(start: u32, len: u32) -> Self {
        Self { start, len }
    }

    pub const fn pack(self) -> u64 {
        ((self.start as u64) << 32) | self.len as u64
    }

    pub const fn unpack(value: u64) -> Self {
        Self {
            start: (value >> 32) as u32,
            len: (value & 0xFFFF_FFFF) as u32,
        }
    }

    pub fn as_usize_range(self) -> std::ops::Range<usize> {
        let start = self.start as usize;
        start..start + self.len as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    EmptyTopic { line: usize },
    InvalidTopic { line: usize, topic: String },
    MissingTargets { line: usize, word: String },
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::EmptyTopic { line } => write!(f, "line {line}: empty topic id"),
            DataError::InvalidTopic { line, topic } => {
                write!(f, "line {line}: topic id {topic:?} contains whitespace")
            }
            DataError::MissingTargets { line, word } => {
                write!(f, "line {line}: synonym {word:?} has no target topics")
            }
        }
    }
}

impl std::error::Error for DataError {}

fn content_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim_end_matches('\r')))
        .filter(|(_, line)| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
}

fn check_topic(line: usize, topic: &str) -> Result<(), DataError> {
    if topic.is_empty() {
        return Err(DataError::EmptyTopic { line });
    }
    if topic.chars().any(char::is_whitespace) {
        return Err(DataError::InvalidTopic {
            line,
            topic: topic.to_string(),
        });
    }
    Ok(())
}

/// Parses one topic id per line. Blank lines and `#` comments are skipped.
/// Order is preserved; duplicates are left for the catalog to collapse.
pub fn parse_topics(text: &str) -> Result<Vec<String>, DataError> {
    let mut topics = Vec::new();
    for (line, raw) in content_lines(text) {
        let topic = raw.trim();
        check_topic(line, topic)?;
        topics.push(topic.to_string());
    }
    Ok(topics)
}

/// Parses `word<TAB>topic,topic,...` rows. Words are lowercased.
pub fn parse_synonyms(text: &str) -> Result<Vec<(String, Vec<String>)>, DataError> {
    let mut rows = Vec::new();
    for (line, raw) in content_lines(text) {
        let mut parts = raw.splitn(2, '\t');
        let word = parts.next().unwrap_or_default().trim().to_lowercase();
        let targets: Vec<String> = parts
            .next()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        if targets.is_empty() {
            return Err(DataError::MissingTargets { line, word });
        }
        for target in &targets {
            check_topic(line, target)?;
        }
        rows.push((word, targets));
    }
    Ok(rows)
}
