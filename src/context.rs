//! Section breadcrumbs and shareable text-fragment links for a selection.

use crate::dom::{Document, NodeId};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;

/// `encodeURIComponent` minus `-`, which text directives treat as syntax.
const FRAGMENT_TEXT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Everything captured about one gesture. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionContext {
    pub raw_text: String,
    #[serde(skip)]
    pub anchor: Option<NodeId>,
    pub heading_path: Vec<String>,
    pub page_url: String,
    pub highlight_url: String,
}

impl SelectionContext {
    pub fn capture(doc: &Document, raw_text: &str, anchor: Option<NodeId>, page_url: &str) -> Self {
        let heading_path = anchor
            .map(|node| heading_hierarchy(doc, node))
            .unwrap_or_default();
        Self {
            raw_text: raw_text.to_string(),
            anchor,
            heading_path,
            page_url: page_url.to_string(),
            highlight_url: build_highlight_url(page_url, raw_text),
        }
    }
}

/// `h1`..`h6` -> 1..6.
pub fn heading_rank(doc: &Document, node: NodeId) -> Option<u8> {
    let tag = doc.tag(node)?.as_bytes();
    match tag {
        [b'h', digit @ b'1'..=b'6'] => Some(digit - b'0'),
        _ => None,
    }
}

/// Heading texts that frame `anchor`, outermost first.
///
/// Walks from the anchor up to the root, scanning preceding siblings nearest
/// first at every level. The first heading seen for a rank wins; ranks that
/// never appear are simply absent. A heading anchor counts as its own section.
pub fn heading_hierarchy(doc: &Document, anchor: NodeId) -> Vec<String> {
    let mut found: [Option<String>; 6] = Default::default();
    let mut current = Some(anchor);
    while let Some(node) = current {
        record_heading(doc, node, &mut found);
        let mut sibling = doc.previous_sibling(node);
        while let Some(prev) = sibling {
            record_heading(doc, prev, &mut found);
            sibling = doc.previous_sibling(prev);
        }
        current = doc.parent(node);
    }

    found.into_iter().flatten().collect()
}

fn record_heading(doc: &Document, node: NodeId, found: &mut [Option<String>; 6]) {
    let Some(rank) = heading_rank(doc, node) else {
        return;
    };
    let slot = &mut found[usize::from(rank - 1)];
    if slot.is_some() {
        return;
    }
    let text = doc
        .text_content(node)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if !text.is_empty() {
        *slot = Some(text);
    }
}

/// `page_url` without its fragment plus a `#:~:text=` directive for `text`.
pub fn build_highlight_url(page_url: &str, text: &str) -> String {
    let base = page_url.split('#').next().unwrap_or_default();
    let encoded = utf8_percent_encode(text.trim(), FRAGMENT_TEXT);
    format!("{base}#:~:text={encoded}")
}
