//! Learning-prompt templates seeded with a selection and its context.

use crate::context::SelectionContext;
use crate::storage::PreferenceStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

pub const STYLE_KEY: &str = "wikilens.prompt-style";

const DELIMITER: &str = "\"\"\"";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptStyle {
    /// Staged explanations, one confirmed level at a time.
    #[default]
    Progressive,
    /// Assess first, then explain only the revealed gaps.
    QuizFirst,
}

impl PromptStyle {
    pub const ALL: [PromptStyle; 2] = [PromptStyle::Progressive, PromptStyle::QuizFirst];

    pub fn as_str(self) -> &'static str {
        match self {
            PromptStyle::Progressive => "progressive",
            PromptStyle::QuizFirst => "quiz-first",
        }
    }
}

impl fmt::Display for PromptStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStyle(pub String);

impl fmt::Display for UnknownStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown prompt style `{}` (expected progressive or quiz-first)", self.0)
    }
}

impl std::error::Error for UnknownStyle {}

impl FromStr for PromptStyle {
    type Err = UnknownStyle;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PromptStyle::ALL
            .into_iter()
            .find(|style| style.as_str() == s.trim())
            .ok_or_else(|| UnknownStyle(s.to_string()))
    }
}

/// Optional framing for a prompt. Empty fields are left out of the output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptContext {
    pub page_url: String,
    pub heading_path: Vec<String>,
}

impl From<&SelectionContext> for PromptContext {
    fn from(ctx: &SelectionContext) -> Self {
        Self {
            page_url: ctx.page_url.clone(),
            heading_path: ctx.heading_path.clone(),
        }
    }
}

pub fn build_prompt(text: &str, style: PromptStyle, ctx: &PromptContext) -> String {
    let mut out = String::new();
    let mut context_lines = Vec::new();
    if !ctx.page_url.is_empty() {
        context_lines.push(format!("Source: {}", ctx.page_url));
    }
    if !ctx.heading_path.is_empty() {
        context_lines.push(format!("Section: {}", ctx.heading_path.join(" > ")));
    }
    if !context_lines.is_empty() {
        out.push_str("Context:\n");
        for line in context_lines {
            out.push_str(&line);
            out.push('\n');
        }
        out.push('\n');
    }

    out.push_str("I selected this passage while reading:\n");
    out.push_str(DELIMITER);
    out.push('\n');
    out.push_str(text);
    out.push('\n');
    out.push_str(DELIMITER);
    out.push_str("\n\n");

    match style {
        PromptStyle::Progressive => out.push_str(PROGRESSIVE_BODY),
        PromptStyle::QuizFirst => out.push_str(QUIZ_FIRST_BODY),
    }
    out
}

const PROGRESSIVE_BODY: &str = "\
Teach me this in three levels, one level per reply.

Level 1 - ELI5: explain it as if I were five, using an everyday analogy.
Level 2 - Clear and practical: explain it precisely, with a worked example I could reproduce.
Level 3 - Expert: cover the formal definition, edge cases and how it connects to related ideas.

In every level include:
- Misconceptions: the most common ways people get this wrong.
- Vocabulary check: list any term that could mean more than one thing here and ask me which meaning I intend before you define it.
- Mini-quiz: two or three short questions that check the level.

Rules:
- Do not move on to the next level until I confirm I am ready.
- Do not define an ambiguous term until I have told you what I mean by it.
";

const QUIZ_FIRST_BODY: &str = "\
Before explaining anything, find out what I already know.

1. Give me a medium-difficulty quiz of 3 to 5 questions on this passage. Do not explain anything yet.
2. Wait for my answers, then grade them and name the specific gaps they reveal.
3. Explain only those gaps, skipping what I already showed I understand.
4. Finish with one follow-up question per gap to confirm it is closed.
";

/// The persisted prompt style, falling back to [`PromptStyle::Progressive`]
/// when storage fails or holds an unknown value.
pub fn load_style(store: &dyn PreferenceStore) -> PromptStyle {
    match store.read(STYLE_KEY) {
        Ok(Some(raw)) => raw.parse().unwrap_or_else(|err: UnknownStyle| {
            warn!(error = %err, "ignoring stored prompt style");
            PromptStyle::default()
        }),
        Ok(None) => PromptStyle::default(),
        Err(err) => {
            debug!(error = %err, "prompt style unavailable; using default");
            PromptStyle::default()
        }
    }
}

/// Persists `style`. Failures are logged and otherwise ignored.
pub fn save_style(store: &dyn PreferenceStore, style: PromptStyle) {
    if let Err(err) = store.write(STYLE_KEY, style.as_str()) {
        warn!(error = %err, %style, "failed to persist prompt style");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{DisabledStore, MemoryStore};

    fn ctx() -> PromptContext {
        PromptContext {
            page_url: "https://docs.example/wiki/linear-maps".to_string(),
            heading_path: vec!["Linear Maps".to_string(), "Kernels".to_string()],
        }
    }

    #[test]
    fn progressive_embeds_selection_in_delimited_block() {
        let text = "A linear map \"preserves\" addition.";
        let prompt = build_prompt(text, PromptStyle::Progressive, &ctx());
        assert!(prompt.contains(&format!("\"\"\"\n{text}\n\"\"\"")));
        assert!(prompt.contains("Source: https://docs.example/wiki/linear-maps"));
        assert!(prompt.contains("Section: Linear Maps > Kernels"));
        assert!(prompt.contains("ELI5"));
        assert!(prompt.contains("Misconceptions"));
        assert!(prompt.contains("Vocabulary check"));
        assert!(prompt.contains("Mini-quiz"));
    }

    #[test]
    fn empty_context_omits_context_block() {
        let prompt = build_prompt("xyzzy", PromptStyle::Progressive, &PromptContext::default());
        assert!(!prompt.contains("Context:"));
        assert!(!prompt.contains("Source:"));
        assert!(!prompt.contains("Section:"));
        assert!(prompt.starts_with("I selected this passage"));
    }

    #[test]
    fn partial_context_keeps_only_present_lines() {
        let partial = PromptContext {
            page_url: String::new(),
            heading_path: vec!["Loops".to_string()],
        };
        let prompt = build_prompt("for each", PromptStyle::QuizFirst, &partial);
        assert!(prompt.contains("Section: Loops"));
        assert!(!prompt.contains("Source:"));
        assert!(prompt.contains("3 to 5 questions"));
    }

    #[test]
    fn style_parses_and_displays_kebab_case() {
        assert_eq!("quiz-first".parse::<PromptStyle>().unwrap(), PromptStyle::QuizFirst);
        assert_eq!(PromptStyle::QuizFirst.to_string(), "quiz-first");
        assert!("QuizFirst".parse::<PromptStyle>().is_err());
        assert_eq!(
            serde_json::to_string(&PromptStyle::Progressive).unwrap(),
            "\"progressive\""
        );
    }

    #[test]
    fn style_preference_round_trips_and_degrades() {
        let store = MemoryStore::new();
        assert_eq!(load_style(&store), PromptStyle::Progressive);
        save_style(&store, PromptStyle::QuizFirst);
        assert_eq!(load_style(&store), PromptStyle::QuizFirst);

        store.write(STYLE_KEY, "socratic").unwrap();
        assert_eq!(load_style(&store), PromptStyle::Progressive);

        save_style(&DisabledStore, PromptStyle::QuizFirst);
        assert_eq!(load_style(&DisabledStore), PromptStyle::Progressive);
    }
}
