//! Lexical mapping from selected words to catalog topics.
//!
//! Strategies run in priority order and only ever append unseen topics:
//! exact slug, curated synonym, then substring over the catalog (slugs of three
//! or more characters only). The substring pass is unbounded; common slugs such
//! as `set` can pull in several loosely related topics.

use crate::{Catalog, SynonymTable};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;

const MIN_SUBSTRING_SLUG: usize = 3;
const MIN_INLINE_TOKEN: usize = 2;

static NON_SLUG_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MatchResult {
    pub topic: String,
    pub label: String,
}

impl MatchResult {
    pub fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            label: slug_label(topic),
        }
    }
}

/// One word of a selection together with the topics it matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordMatches {
    pub word: String,
    pub matches: Vec<MatchResult>,
}

/// Lowercases and collapses every run of non `[a-z0-9]` characters into a
/// single hyphen, trimming hyphens at both ends.
pub fn slugify(word: &str) -> String {
    let lower = word.to_lowercase();
    NON_SLUG_RUN
        .replace_all(&lower, "-")
        .trim_matches('-')
        .to_string()
}

/// `linear-maps` -> `Linear Maps`.
pub fn slug_label(topic: &str) -> String {
    topic
        .split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Clone, Copy)]
pub struct SlugMatcher<'a> {
    catalog: &'a Catalog,
    synonyms: &'a SynonymTable,
}

impl SlugMatcher<'static> {
    /// Matcher over the compiled-in catalog and synonym table.
    pub fn builtin() -> Self {
        Self::new(Catalog::builtin(), SynonymTable::builtin())
    }
}

impl<'a> SlugMatcher<'a> {
    pub fn new(catalog: &'a Catalog, synonyms: &'a SynonymTable) -> Self {
        Self { catalog, synonyms }
    }

    /// Ranked, deduplicated topics for a single word or phrase.
    pub fn match_word(&self, word: &str) -> Vec<MatchResult> {
        let slug = slugify(word);
        let mut seen: HashSet<&str> = HashSet::new();
        let mut results = Vec::new();

        if !slug.is_empty() && self.catalog.contains(&slug) {
            seen.insert(slug.as_str());
            results.push(MatchResult::new(&slug));
        }

        for topic in self.synonyms.lookup(word) {
            if self.catalog.contains(topic) && seen.insert(topic.as_str()) {
                results.push(MatchResult::new(topic));
            }
        }

        if slug.len() >= MIN_SUBSTRING_SLUG {
            for topic in self.catalog.iter() {
                if topic.contains(slug.as_str()) && seen.insert(topic) {
                    results.push(MatchResult::new(topic));
                }
            }
        }

        results
    }

    /// Per-word matches for a multi-word selection, keyed by first occurrence
    /// (case-insensitive). Words without matches are dropped.
    pub fn find_inline_matches(&self, text: &str) -> Vec<WordMatches> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for raw in text.split_whitespace() {
            let word = raw.trim_matches(|c: char| !c.is_alphanumeric());
            if word.chars().count() < MIN_INLINE_TOKEN {
                continue;
            }
            if !seen.insert(word.to_lowercase()) {
                continue;
            }
            let matches = self.match_word(word);
            if !matches.is_empty() {
                out.push(WordMatches {
                    word: word.to_string(),
                    matches,
                });
            }
        }
        out
    }

    /// Matches for the selection as a whole: the direct match set for a single
    /// word, otherwise the deduplicated union of the per-word matches.
    pub fn whole_selection_matches(
        &self,
        text: &str,
        per_word: &[WordMatches],
    ) -> Vec<MatchResult> {
        let trimmed = text.trim();
        if !trimmed.contains(char::is_whitespace) {
            return self.match_word(trimmed);
        }
        let mut seen = HashSet::new();
        per_word
            .iter()
            .flat_map(|entry| entry.matches.iter())
            .filter(|result| seen.insert(result.topic.clone()))
            .cloned()
            .collect()
    }
}
