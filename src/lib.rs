mod data;

pub mod clipboard;
pub mod config;
pub mod context;
pub mod controller;
pub mod dom;
pub mod highlight;
pub mod markup;
pub mod matcher;
pub mod prompt;
pub mod storage;

pub use clipboard::{ClipboardError, CopyOutcome, CopyPath, Host, copy_text};
pub use config::{ConfigError, LookupConfig};
pub use context::{SelectionContext, build_highlight_url, heading_hierarchy};
pub use controller::{
    EventTarget, LookupController, Outcome, PointerEvent, PopupState, Viewport, place_popup,
};
pub use data::DataError;
pub use dom::{Boundary, Document, DomError, NodeId, Range};
pub use highlight::{HighlightHandle, Highlighter, apply_highlight};
pub use markup::{MarkupError, parse_markup};
pub use matcher::{MatchResult, SlugMatcher, WordMatches, slug_label, slugify};
pub use prompt::{PromptContext, PromptStyle, build_prompt, load_style, save_style};
pub use storage::{DisabledStore, JsonFileStore, MemoryStore, PreferenceStore, StorageError};

use data::Range as TargetRange;
use fst::Map;
use once_cell::sync::Lazy;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};

static TOPIC_FST_BYTES: &[u8] = include_bytes!(env!("WIKILENS_TOPIC_FST"));
static TOPIC_LIST: &str = include_str!(env!("WIKILENS_TOPIC_LIST"));
static SYNONYM_FST_BYTES: &[u8] = include_bytes!(env!("WIKILENS_SYNONYM_FST"));
static SYNONYM_TARGETS: &str = include_str!(env!("WIKILENS_SYNONYM_TARGETS"));

static BUILTIN_CATALOG: Lazy<Catalog> = Lazy::new(|| Catalog {
    ids: TOPIC_LIST.lines().map(str::to_string).collect(),
    index: Map::new(Cow::Borrowed(TOPIC_FST_BYTES)).expect("valid topic fst"),
});

static BUILTIN_SYNONYMS: Lazy<SynonymTable> = Lazy::new(|| SynonymTable {
    index: Map::new(Cow::Borrowed(SYNONYM_FST_BYTES)).expect("valid synonym fst"),
    targets: SYNONYM_TARGETS.lines().map(str::to_string).collect(),
});

/// FST bytes: borrowed from the binary for builtin data, owned when built at
/// runtime.
type FstBytes = Cow<'static, [u8]>;

/// Ordered set of valid topic ids.
///
/// Exact membership goes through an FST keyed by id; substring scans walk the
/// ids in catalog order.
pub struct Catalog {
    ids: Vec<String>,
    index: Map<FstBytes>,
}

impl Catalog {
    /// Builds a catalog from ids in display order. Later duplicates are dropped.
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let ids: Vec<String> = ids
            .into_iter()
            .map(Into::into)
            .filter(|id| seen.insert(id.clone()))
            .collect();
        let mut keyed: Vec<(&str, u64)> = ids
            .iter()
            .enumerate()
            .map(|(position, id)| (id.as_str(), position as u64))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(b.0));
        let index = Map::from_iter(keyed).expect("sorted, deduplicated topic keys");
        Self {
            ids,
            index: owned(index),
        }
    }

    /// Parses the line-oriented `topics.txt` format.
    pub fn parse(text: &str) -> Result<Self, DataError> {
        data::parse_topics(text).map(Self::new)
    }

    /// The catalog compiled from `data/topics.txt`.
    pub fn builtin() -> &'static Catalog {
        &BUILTIN_CATALOG
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Curated lowercase word to topic id mapping.
pub struct SynonymTable {
    index: Map<FstBytes>,
    targets: Vec<String>,
}

impl SynonymTable {
    /// Builds a table from `(word, ids)` rows. Words are lowercased and the
    /// first row for a word wins.
    pub fn new<I, W, T>(rows: I) -> Self
    where
        I: IntoIterator<Item = (W, Vec<T>)>,
        W: AsRef<str>,
        T: Into<String>,
    {
        let mut merged: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (word, ids) in rows {
            merged
                .entry(word.as_ref().trim().to_lowercase())
                .or_insert_with(|| ids.into_iter().map(Into::into).collect());
        }
        let mut targets = Vec::new();
        let mut keyed = Vec::with_capacity(merged.len());
        for (word, ids) in merged {
            let range = TargetRange::new(targets.len() as u32, ids.len() as u32);
            keyed.push((word, range.pack()));
            targets.extend(ids);
        }
        let index = Map::from_iter(keyed).expect("BTreeMap yields sorted synonym keys");
        Self {
            index: owned(index),
            targets,
        }
    }

    /// Parses the tab-separated `synonyms.tsv` format.
    pub fn parse(text: &str) -> Result<Self, DataError> {
        data::parse_synonyms(text).map(Self::new)
    }

    /// The table compiled from `data/synonyms.tsv`.
    pub fn builtin() -> &'static SynonymTable {
        &BUILTIN_SYNONYMS
    }

    pub fn empty() -> Self {
        Self::new(Vec::<(String, Vec<String>)>::new())
    }

    /// Returns the mapped ids for a word, in ranked order.
    pub fn lookup(&self, word: &str) -> &[String] {
        let key = word.trim().to_lowercase();
        match self.index.get(&key) {
            Some(packed) => {
                let span = TargetRange::unpack(packed).as_usize_range();
                self.targets.get(span).unwrap_or(&[])
            }
            None => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

fn owned(map: Map<Vec<u8>>) -> Map<FstBytes> {
    let bytes = map.into_fst().into_inner();
    Map::new(Cow::Owned(bytes)).expect("bytes from a freshly built fst")
}
