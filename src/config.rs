use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;

/// Tunables for the lookup widget. Every field has a default, so a config file
/// only needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Prepended to `/<topic>` when building links.
    pub link_prefix: String,
    pub popup_width: i32,
    pub popup_height: i32,
    /// Gap between the pointer and the popup.
    pub popup_offset: i32,
    /// Minimum distance between the popup and any viewport edge.
    pub edge_inset: i32,
    /// How long a handled double-click suppresses the trailing mouse-up.
    pub suppress_ms: u64,
    pub copied_feedback_ms: u64,
    pub min_double_click_chars: usize,
    pub min_drag_chars: usize,
    pub excluded_tags: Vec<String>,
    pub excluded_classes: Vec<String>,
    pub marker_tag: String,
    pub marker_class: String,
    pub annotation_tag: String,
    pub annotation_class: String,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            link_prefix: String::new(),
            popup_width: 340,
            popup_height: 200,
            popup_offset: 10,
            edge_inset: 8,
            suppress_ms: 100,
            copied_feedback_ms: 2000,
            min_double_click_chars: 2,
            min_drag_chars: 3,
            excluded_tags: vec!["input".to_string(), "textarea".to_string()],
            excluded_classes: vec!["monaco-editor".to_string()],
            marker_tag: "mark".to_string(),
            marker_class: "dblclick-highlight".to_string(),
            annotation_tag: "span".to_string(),
            annotation_class: "dblclick-annotation".to_string(),
        }
    }
}

impl LookupConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// `<link_prefix>/<topic>`.
    pub fn topic_url(&self, topic: &str) -> String {
        format!("{}/{topic}", self.link_prefix.trim_end_matches('/'))
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {err}"),
            ConfigError::Parse(err) => write!(f, "invalid config: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        ConfigError::Parse(value)
    }
}
