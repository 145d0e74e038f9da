//! Reversible selection highlighting.
//!
//! Applying a highlight wraps the live selection in a marker element and
//! annotates matched words inside it. The returned [`HighlightHandle`] records
//! every structural change (marker, annotation spans, split ancestors) so that
//! [`HighlightHandle::release`] can undo exactly those changes.

use crate::config::LookupConfig;
use crate::dom::{Boundary, Document, DomError, NodeId, Range, Side, SplitAncestor};
use crate::matcher::SlugMatcher;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, warn};

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]{2,}").expect("valid word pattern"));

pub const TOPIC_ATTRIBUTE: &str = "data-topic";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapPath {
    /// The range was wrapped in place.
    Surround,
    /// The range crossed element boundaries; its contents were extracted into
    /// the marker and the marker inserted at the range's position.
    Extract,
}

/// Ownership token for one live highlight.
#[must_use = "dropping a handle without releasing it leaks the marker"]
#[derive(Debug)]
pub struct HighlightHandle {
    marker: NodeId,
    annotations: Vec<NodeId>,
    split_ancestors: Vec<SplitAncestor>,
    path: WrapPath,
}

impl HighlightHandle {
    pub fn marker(&self) -> NodeId {
        self.marker
    }

    pub fn annotations(&self) -> &[NodeId] {
        &self.annotations
    }

    pub fn path(&self) -> WrapPath {
        self.path
    }

    /// True when `node` is the marker or anything inside it.
    pub fn covers(&self, doc: &Document, node: NodeId) -> bool {
        doc.contains(self.marker, node)
    }

    /// Undoes the highlight: unwraps annotations, merges split ancestors back
    /// into their originals, unwraps the marker, then merges adjacent text in
    /// every element the highlight split.
    pub fn release(self, doc: &mut Document) {
        let mut touched: Vec<NodeId> = self
            .annotations
            .iter()
            .filter_map(|&span| doc.parent(span))
            .collect();
        for &span in &self.annotations {
            if let Err(err) = doc.unwrap_node(span) {
                warn!(error = %err, %span, "failed to unwrap annotation");
            }
        }
        for split in &self.split_ancestors {
            if let Err(err) = merge_back(doc, split) {
                warn!(error = %err, original = %split.original, "failed to merge split ancestor");
            }
            touched.push(split.original);
        }
        touched.extend(doc.parent(self.marker));
        if let Err(err) = doc.unwrap_node(self.marker) {
            warn!(error = %err, marker = %self.marker, "failed to unwrap highlight marker");
        }
        touched.sort_unstable();
        touched.dedup();
        for node in touched {
            if doc.parent(node).is_some() || node == doc.root() {
                doc.normalize(node);
            }
        }
        debug!(path = ?self.path, annotations = self.annotations.len(), "released highlight");
    }
}

fn merge_back(doc: &mut Document, split: &SplitAncestor) -> Result<(), DomError> {
    let moved = doc.children(split.clone).to_vec();
    match split.side {
        Side::Start => {
            for node in moved {
                doc.append_child(split.original, node)?;
            }
        }
        Side::End => {
            let first = doc.children(split.original).first().copied();
            for node in moved {
                doc.insert_before(split.original, node, first)?;
            }
        }
    }
    doc.detach(split.clone)
}

/// Wraps the document's live selection and annotates matched words inside it.
///
/// Returns `None` (and leaves the tree untouched) when there is no selection or
/// the selected text is blank. The live selection is cleared on success.
pub fn apply_highlight(
    doc: &mut Document,
    matcher: &SlugMatcher<'_>,
    config: &LookupConfig,
) -> Option<HighlightHandle> {
    let range = doc.selection()?;
    let text = doc.range_text(&range);
    if text.trim().is_empty() {
        debug!("blank selection; nothing to highlight");
        return None;
    }

    let marker = doc.create_element(&config.marker_tag);
    if let Err(err) = doc.set_attribute(marker, "class", config.marker_class.as_str()) {
        warn!(error = %err, "failed to tag highlight marker");
    }

    let (path, split_ancestors) = match doc.surround_range(&range, marker) {
        Ok(()) => (WrapPath::Surround, Vec::new()),
        Err(DomError::PartiallySelected) => {
            debug!("selection crosses element boundaries; extracting into marker");
            match wrap_by_extraction(doc, &range, marker) {
                Ok(splits) => (WrapPath::Extract, splits),
                Err(err) => {
                    warn!(error = %err, "failed to wrap selection");
                    return None;
                }
            }
        }
        Err(err) => {
            warn!(error = %err, "failed to wrap selection");
            return None;
        }
    };

    let annotations = annotate(doc, marker, matcher, config);
    doc.clear_selection();
    debug!(?path, annotations = annotations.len(), "applied highlight");
    Some(HighlightHandle {
        marker,
        annotations,
        split_ancestors,
        path,
    })
}

fn wrap_by_extraction(
    doc: &mut Document,
    range: &Range,
    marker: NodeId,
) -> Result<Vec<SplitAncestor>, DomError> {
    let extraction = doc.extract_range(range)?;
    for node in extraction.nodes {
        doc.append_child(marker, node)?;
    }
    doc.insert_at(extraction.parent, extraction.index, marker)?;
    Ok(extraction.split_ancestors)
}

fn annotate(
    doc: &mut Document,
    marker: NodeId,
    matcher: &SlugMatcher<'_>,
    config: &LookupConfig,
) -> Vec<NodeId> {
    let mut cache: HashMap<String, Option<(String, String)>> = HashMap::new();
    let mut spans = Vec::new();
    for node in doc.text_nodes(marker) {
        let Some(text) = doc.text(node).map(str::to_string) else {
            continue;
        };
        let hits: Vec<(usize, usize, String, String)> = WORD
            .find_iter(&text)
            .filter_map(|token| {
                let best = cache
                    .entry(token.as_str().to_lowercase())
                    .or_insert_with(|| {
                        matcher
                            .match_word(token.as_str())
                            .into_iter()
                            .next()
                            .map(|m| (m.topic, m.label))
                    })
                    .clone()?;
                Some((token.start(), token.end(), best.0, best.1))
            })
            .collect();
        if hits.is_empty() {
            continue;
        }
        match annotate_text_node(doc, node, &hits, config) {
            Ok(created) => spans.extend(created),
            Err(err) => warn!(error = %err, %node, "failed to annotate text"),
        }
    }
    spans
}

/// Splits one text node around each hit, wrapping every token in its own
/// annotation element.
fn annotate_text_node(
    doc: &mut Document,
    node: NodeId,
    hits: &[(usize, usize, String, String)],
    config: &LookupConfig,
) -> Result<Vec<NodeId>, DomError> {
    let parent = doc.parent(node).ok_or(DomError::UnknownNode(node))?;
    let mut spans = Vec::with_capacity(hits.len());
    let mut current = Some(node);
    let mut consumed = 0;
    for (start, end, topic, label) in hits {
        let Some(cur) = current else {
            break;
        };
        let token = if *start > consumed {
            doc.split_text(cur, start - consumed)?
        } else {
            cur
        };
        let token_len = end - start;
        current = if doc.text(token).map_or(0, str::len) > token_len {
            Some(doc.split_text(token, token_len)?)
        } else {
            None
        };
        consumed = *end;

        let span = doc.create_element(&config.annotation_tag);
        doc.set_attribute(span, "class", config.annotation_class.as_str())?;
        doc.set_attribute(span, TOPIC_ATTRIBUTE, topic.as_str())?;
        doc.set_attribute(span, "title", label.as_str())?;
        doc.insert_before(parent, span, Some(token))?;
        doc.append_child(span, token)?;
        spans.push(span);
    }
    Ok(spans)
}

enum Carried {
    /// Text offset relative to the release scope.
    Inside(usize),
    Outside(Boundary),
}

impl Carried {
    fn save(doc: &Document, scope: NodeId, boundary: Boundary) -> Option<Self> {
        if doc.contains(scope, boundary.node) {
            doc.text_offset_in(scope, boundary).map(Carried::Inside)
        } else {
            Some(Carried::Outside(boundary))
        }
    }

    fn restore(&self, doc: &Document, scope: NodeId, side: Side) -> Option<Boundary> {
        match *self {
            Carried::Inside(offset) => doc.boundary_at_text_offset_in(scope, offset, side),
            Carried::Outside(boundary) => Some(boundary),
        }
    }
}

/// Owner of the single live highlight.
#[derive(Debug, Default)]
pub struct Highlighter {
    live: Option<HighlightHandle>,
    applied: u64,
    released: u64,
}

impl Highlighter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases any live highlight (keeping the selection), then highlights the
    /// current selection.
    pub fn apply(
        &mut self,
        doc: &mut Document,
        matcher: &SlugMatcher<'_>,
        config: &LookupConfig,
    ) -> bool {
        self.release_keeping_selection(doc);
        match apply_highlight(doc, matcher, config) {
            Some(handle) => {
                self.live = Some(handle);
                self.applied += 1;
                true
            }
            None => false,
        }
    }

    pub fn release(&mut self, doc: &mut Document) -> bool {
        match self.live.take() {
            Some(handle) => {
                handle.release(doc);
                self.released += 1;
                true
            }
            None => false,
        }
    }

    /// Like [`Highlighter::release`], but carries the document's live selection
    /// across the release.
    pub fn release_keeping_selection(&mut self, doc: &mut Document) -> bool {
        let live = self.is_live();
        self.release_carrying(doc, None);
        live
    }

    /// Releases the live highlight, carrying the selection and `anchor` across
    /// it. Returns where `anchor` ended up: itself when it survived, otherwise
    /// the node now holding its text position.
    pub fn release_around(&mut self, doc: &mut Document, anchor: NodeId) -> NodeId {
        self.release_carrying(doc, Some(anchor)).unwrap_or(anchor)
    }

    /// Only the marker's parent changes shape on release, and its text content
    /// does not change, so positions inside it travel as text offsets relative
    /// to it. Positions elsewhere stay valid as they are.
    fn release_carrying(&mut self, doc: &mut Document, anchor: Option<NodeId>) -> Option<NodeId> {
        let Some(scope) = self.live.as_ref().and_then(|handle| doc.parent(handle.marker())) else {
            self.release(doc);
            return anchor;
        };
        let saved = doc.selection().and_then(|range| {
            Some((
                Carried::save(doc, scope, range.start)?,
                Carried::save(doc, scope, range.end)?,
            ))
        });
        let anchor_offset = anchor
            .filter(|&node| doc.contains(scope, node))
            .and_then(|node| doc.text_offset_in(scope, Boundary::new(node, 0)));

        self.release(doc);

        if let Some((start, end)) = saved {
            let restored = start
                .restore(doc, scope, Side::Start)
                .zip(end.restore(doc, scope, Side::End))
                .map(|(start, end)| Range::new(start, end));
            if let Err(err) = doc.set_selection(restored) {
                warn!(error = %err, "failed to restore selection after release");
            }
        }
        anchor.map(|node| {
            if doc.is_connected(node) {
                return node;
            }
            anchor_offset
                .and_then(|offset| doc.boundary_at_text_offset_in(scope, offset, Side::Start))
                .map_or(scope, |boundary| boundary.node)
        })
    }

    pub fn live(&self) -> Option<&HighlightHandle> {
        self.live.as_ref()
    }

    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    /// True when `node` sits inside the live marker.
    pub fn covers(&self, doc: &Document, node: NodeId) -> bool {
        self.live.as_ref().is_some_and(|handle| handle.covers(doc, node))
    }

    pub fn applied(&self) -> u64 {
        self.applied
    }

    pub fn released(&self) -> u64 {
        self.released
    }
}
