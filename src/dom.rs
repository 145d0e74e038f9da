//! Arena-backed content tree with DOM-style ranges and a single live selection.
//!
//! Invariants:
//! - `NodeId`s are never reused; detached nodes stay in the arena.
//! - A node has at most one parent and never contains itself.
//! - Text boundaries are byte offsets that sit on a `char` boundary; element
//!   boundaries are child indices.

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// One end of a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    pub node: NodeId,
    pub offset: usize,
}

impl Boundary {
    pub const fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: Boundary,
    pub end: Boundary,
}

impl Range {
    pub const fn new(start: Boundary, end: Boundary) -> Self {
        Self { start, end }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Start,
    End,
}

/// A partially contained ancestor that was split during extraction: `clone`
/// holds the part of `original` that fell inside the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitAncestor {
    pub original: NodeId,
    pub clone: NodeId,
    pub side: Side,
}

/// Result of [`Document::extract_range`]. `nodes` are detached, in document
/// order, and belong at `parent[index]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub nodes: Vec<NodeId>,
    pub split_ancestors: Vec<SplitAncestor>,
    pub parent: NodeId,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    UnknownNode(NodeId),
    NotAnElement(NodeId),
    NotText(NodeId),
    OffsetOutOfBounds { node: NodeId, offset: usize },
    HierarchyRequest { parent: NodeId, child: NodeId },
    InvalidRange,
    PartiallySelected,
}

impl fmt::Display for DomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomError::UnknownNode(id) => write!(f, "unknown {id}"),
            DomError::NotAnElement(id) => write!(f, "{id} is not an element"),
            DomError::NotText(id) => write!(f, "{id} is not a text node"),
            DomError::OffsetOutOfBounds { node, offset } => {
                write!(f, "offset {offset} is out of bounds for {node}")
            }
            DomError::HierarchyRequest { parent, child } => {
                write!(f, "cannot insert {child} under {parent}")
            }
            DomError::InvalidRange => write!(f, "range boundaries are detached or out of order"),
            DomError::PartiallySelected => {
                write!(f, "range partially selects a non-text node")
            }
        }
    }
}

impl std::error::Error for DomError {}

enum Anchor {
    Before(NodeId),
    AtEnd(NodeId),
}

pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    selection: Option<Range>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates an empty document whose root is a `body` element.
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            selection: None,
        };
        doc.root = doc.create_element("body");
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> Result<&Node, DomError> {
        self.nodes.get(id.0).ok_or(DomError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DomError> {
        self.nodes.get_mut(id.0).ok_or(DomError::UnknownNode(id))
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
        })
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Text(text.into()))
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.node(id).ok().map(|node| &node.kind)
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.tag(id).is_some()
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Text(text) => Some(text),
            NodeKind::Element { .. } => None,
        }
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        self.text(id).is_some()
    }

    pub fn set_text(&mut self, id: NodeId, value: impl Into<String>) -> Result<(), DomError> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Text(text) => {
                *text = value.into();
                Ok(())
            }
            NodeKind::Element { .. } => Err(DomError::NotText(id)),
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn set_attribute(
        &mut self,
        id: NodeId,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), DomError> {
        let value = value.into();
        match &mut self.node_mut(id)?.kind {
            NodeKind::Element { attributes, .. } => {
                match attributes.iter_mut().find(|(key, _)| key == name) {
                    Some((_, existing)) => *existing = value,
                    None => attributes.push((name.to_string(), value)),
                }
                Ok(())
            }
            NodeKind::Text(_) => Err(DomError::NotAnElement(id)),
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attribute(id, "class")
            .is_some_and(|value| value.split_whitespace().any(|c| c == class))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).ok().and_then(|node| node.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|node| node.children.as_slice()).unwrap_or(&[])
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&child| child == id)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        self.children(parent).get(index + 1).copied()
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        index
            .checked_sub(1)
            .and_then(|prev| self.children(parent).get(prev).copied())
    }

    /// Iterates strict ancestors, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&current| self.parent(current))
    }

    /// Nearest inclusive ancestor matching `predicate`.
    pub fn closest<F>(&self, id: NodeId, mut predicate: F) -> Option<NodeId>
    where
        F: FnMut(&Document, NodeId) -> bool,
    {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|&candidate| predicate(self, candidate))
    }

    /// Inclusive containment.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).any(|candidate| candidate == ancestor)
    }

    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        std::iter::once(a)
            .chain(self.ancestors(a))
            .find(|&candidate| self.contains(candidate, b))
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        self.contains(self.root, id)
    }

    /// Pre-order traversal including `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    pub fn text_nodes(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|&node| self.is_text(node))
            .collect()
    }

    pub fn text_content(&self, id: NodeId) -> String {
        self.text_nodes(id)
            .into_iter()
            .filter_map(|node| self.text(node))
            .collect()
    }

    /// Removes `id` from its parent. Detached nodes are left untouched.
    pub fn detach(&mut self, id: NodeId) -> Result<(), DomError> {
        let Some(parent) = self.node(id)?.parent else {
            return Ok(());
        };
        self.node_mut(parent)?.children.retain(|&child| child != id);
        self.node_mut(id)?.parent = None;
        Ok(())
    }

    fn check_insert(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        if !self.is_element(parent) {
            return Err(DomError::NotAnElement(parent));
        }
        self.node(child)?;
        if self.contains(child, parent) {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        Ok(())
    }

    fn place(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<(), DomError> {
        let len = self.node(parent)?.children.len();
        if index > len {
            return Err(DomError::OffsetOutOfBounds {
                node: parent,
                offset: index,
            });
        }
        self.node_mut(parent)?.children.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.check_insert(parent, child)?;
        self.detach(child)?;
        let len = self.children(parent).len();
        self.place(parent, len, child)
    }

    /// Inserts `child` before `reference`, or appends when `reference` is `None`.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        if reference == Some(child) {
            return Ok(());
        }
        self.check_insert(parent, child)?;
        if let Some(reference) = reference {
            if self.parent(reference) != Some(parent) {
                return Err(DomError::HierarchyRequest {
                    parent,
                    child: reference,
                });
            }
        }
        self.detach(child)?;
        let index = match reference {
            Some(reference) => self
                .index_in_parent(reference)
                .ok_or(DomError::UnknownNode(reference))?,
            None => self.children(parent).len(),
        };
        self.place(parent, index, child)
    }

    /// Moves every child of `node` into its parent at `node`'s position and
    /// detaches `node`.
    pub fn unwrap_node(&mut self, node: NodeId) -> Result<(), DomError> {
        let parent = self.parent(node).ok_or(DomError::UnknownNode(node))?;
        let children = self.children(node).to_vec();
        for child in children {
            self.insert_before(parent, child, Some(node))?;
        }
        self.detach(node)
    }

    /// Text.splitText: `id` keeps `[..offset]`, the returned node holds the rest
    /// and is inserted right after `id` when `id` has a parent.
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> Result<NodeId, DomError> {
        let text = self.text(id).ok_or(DomError::NotText(id))?;
        if offset > text.len() || !text.is_char_boundary(offset) {
            return Err(DomError::OffsetOutOfBounds { node: id, offset });
        }
        let tail = text[offset..].to_string();
        let head = text[..offset].to_string();
        self.set_text(id, head)?;
        let tail_node = self.create_text(tail);
        if let Some(parent) = self.parent(id) {
            let index = self.index_in_parent(id).ok_or(DomError::UnknownNode(id))?;
            self.place(parent, index + 1, tail_node)?;
        }
        Ok(tail_node)
    }

    pub fn shallow_clone(&mut self, id: NodeId) -> Result<NodeId, DomError> {
        let kind = self.node(id)?.kind.clone();
        Ok(self.alloc(kind))
    }

    /// Merges adjacent text children of `id` and drops empty ones. Does not
    /// descend into child elements.
    pub fn normalize(&mut self, id: NodeId) {
        let children = self.children(id).to_vec();
        let mut previous_text: Option<NodeId> = None;
        for child in children {
            match self.text(child).map(str::to_string) {
                Some(text) if text.is_empty() => {
                    let _ = self.detach(child);
                }
                Some(text) => match previous_text {
                    Some(prev) => {
                        if let Ok(node) = self.node_mut(prev) {
                            if let NodeKind::Text(existing) = &mut node.kind {
                                existing.push_str(&text);
                            }
                        }
                        let _ = self.detach(child);
                    }
                    None => previous_text = Some(child),
                },
                None => previous_text = None,
            }
        }
    }

    /// Serializes a subtree. Used for structural comparisons and CLI output.
    pub fn to_markup(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_markup(id, &mut out);
        out
    }

    fn write_markup(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            Some(NodeKind::Text(text)) => escape_into(text, false, out),
            Some(NodeKind::Element { tag, attributes }) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_into(value, true, out);
                    out.push('"');
                }
                out.push('>');
                for &child in self.children(id) {
                    self.write_markup(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            None => {}
        }
    }

    fn boundary_len(&self, id: NodeId) -> Result<usize, DomError> {
        let node = self.node(id)?;
        Ok(match &node.kind {
            NodeKind::Text(text) => text.len(),
            NodeKind::Element { .. } => node.children.len(),
        })
    }

    fn check_boundary(&self, boundary: Boundary) -> Result<(), DomError> {
        let len = self.boundary_len(boundary.node)?;
        let on_char = self
            .text(boundary.node)
            .is_none_or(|text| text.is_char_boundary(boundary.offset.min(text.len())));
        if boundary.offset > len || !on_char {
            return Err(DomError::OffsetOutOfBounds {
                node: boundary.node,
                offset: boundary.offset,
            });
        }
        if !self.is_connected(boundary.node) {
            return Err(DomError::InvalidRange);
        }
        Ok(())
    }

    fn position_key(&self, boundary: Boundary) -> Vec<usize> {
        let mut key: Vec<usize> = std::iter::once(boundary.node)
            .chain(self.ancestors(boundary.node))
            .filter_map(|node| self.index_in_parent(node))
            .collect();
        key.reverse();
        key.push(boundary.offset);
        key
    }

    /// Tree-order comparison of two connected boundaries.
    pub fn compare_boundaries(&self, a: Boundary, b: Boundary) -> Ordering {
        self.position_key(a).cmp(&self.position_key(b))
    }

    pub fn validate_range(&self, range: &Range) -> Result<(), DomError> {
        self.check_boundary(range.start)?;
        self.check_boundary(range.end)?;
        if self.compare_boundaries(range.start, range.end) == Ordering::Greater {
            return Err(DomError::InvalidRange);
        }
        Ok(())
    }

    /// Text covered by a range, gathered from the boundaries' common ancestor.
    pub fn range_text(&self, range: &Range) -> String {
        let Some(ancestor) = self.common_ancestor(range.start.node, range.end.node) else {
            return String::new();
        };
        let mut out = String::new();
        let mut inside = false;
        self.collect_range_text(ancestor, range, &mut inside, &mut out);
        out
    }

    fn collect_range_text(&self, id: NodeId, range: &Range, inside: &mut bool, out: &mut String) {
        if let Some(text) = self.text(id) {
            let mut lo = 0;
            let mut hi = text.len();
            if id == range.start.node {
                *inside = true;
                lo = range.start.offset.min(text.len());
            }
            if id == range.end.node {
                hi = range.end.offset.min(text.len());
            }
            if *inside && lo <= hi {
                out.push_str(text.get(lo..hi).unwrap_or_default());
            }
            if id == range.end.node {
                *inside = false;
            }
            return;
        }
        let children = self.children(id);
        for index in 0..=children.len() {
            let here = Boundary::new(id, index);
            if here == range.start {
                *inside = true;
            }
            if here == range.end {
                *inside = false;
            }
            if let Some(&child) = children.get(index) {
                self.collect_range_text(child, range, inside, out);
            }
        }
    }

    pub fn selection(&self) -> Option<Range> {
        self.selection
    }

    /// Replaces the live selection. Invalid ranges leave no selection.
    pub fn set_selection(&mut self, range: Option<Range>) -> Result<(), DomError> {
        match range {
            Some(range) => {
                let checked = self.validate_range(&range);
                self.selection = checked.as_ref().ok().map(|_| range);
                checked
            }
            None => {
                self.selection = None;
                Ok(())
            }
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn selection_text(&self) -> String {
        self.selection
            .map(|range| self.range_text(&range))
            .unwrap_or_default()
    }

    /// A range covering everything inside `id`.
    pub fn node_contents_range(&self, id: NodeId) -> Result<Range, DomError> {
        let len = self.boundary_len(id)?;
        Ok(Range::new(Boundary::new(id, 0), Boundary::new(id, len)))
    }

    /// Range over the first occurrence of `needle` in the text under `root`,
    /// possibly spanning several text nodes.
    pub fn find_text(&self, root: NodeId, needle: &str) -> Option<Range> {
        if needle.is_empty() {
            return None;
        }
        let haystack = self.text_content(root);
        let start = haystack.find(needle)?;
        let end = start + needle.len();
        let start = self.boundary_in(root, start, Side::Start)?;
        let end = self.boundary_in(root, end, Side::End)?;
        Some(Range::new(start, end))
    }

    /// Byte offset of a boundary within the text content of `scope`, which must
    /// contain the boundary's node.
    pub fn text_offset_in(&self, scope: NodeId, boundary: Boundary) -> Option<usize> {
        if !self.contains(scope, boundary.node) {
            return None;
        }
        let mut acc = 0;
        let mut stack = vec![scope];
        while let Some(node) = stack.pop() {
            if node == boundary.node {
                return match self.text(node) {
                    Some(text) => (boundary.offset <= text.len()).then_some(acc + boundary.offset),
                    None => {
                        let before = self.children(node).get(..boundary.offset)?;
                        Some(acc + before.iter().map(|&child| self.text_len(child)).sum::<usize>())
                    }
                };
            }
            match self.text(node) {
                Some(text) => acc += text.len(),
                None => stack.extend(self.children(node).iter().rev().copied()),
            }
        }
        None
    }

    /// Inverse of [`Document::text_offset_in`]. `side` picks the following text
    /// node (start) or the preceding one (end) when the offset falls between nodes.
    pub fn boundary_at_text_offset_in(
        &self,
        scope: NodeId,
        offset: usize,
        side: Side,
    ) -> Option<Boundary> {
        self.boundary_in(scope, offset, side)
    }

    fn text_len(&self, id: NodeId) -> usize {
        self.text_nodes(id)
            .into_iter()
            .filter_map(|node| self.text(node))
            .map(str::len)
            .sum()
    }

    fn boundary_in(&self, root: NodeId, offset: usize, side: Side) -> Option<Boundary> {
        let mut acc = 0;
        let mut last = None;
        for node in self.text_nodes(root) {
            let text = self.text(node)?;
            let len = text.len();
            let inside = match side {
                Side::Start => offset < acc + len,
                Side::End => offset <= acc + len && len > 0,
            };
            if inside && offset >= acc {
                let local = offset - acc;
                return text
                    .is_char_boundary(local)
                    .then_some(Boundary::new(node, local));
            }
            acc += len;
            last = Some(Boundary::new(node, len));
        }
        if offset == acc { last } else { None }
    }

    /// DOM `surroundContents`: fails without mutating when a non-text node is
    /// partially selected.
    pub fn surround_range(&mut self, range: &Range, wrapper: NodeId) -> Result<(), DomError> {
        self.validate_range(range)?;
        if !self.is_element(wrapper) {
            return Err(DomError::NotAnElement(wrapper));
        }
        let start_parent = self.effective_parent(range.start.node)?;
        let end_parent = self.effective_parent(range.end.node)?;
        if start_parent != end_parent {
            return Err(DomError::PartiallySelected);
        }
        if self.contains(wrapper, start_parent) {
            return Err(DomError::HierarchyRequest {
                parent: start_parent,
                child: wrapper,
            });
        }
        self.detach(wrapper)?;
        let ((parent, from), (_, to)) = self.split_boundaries(range)?;
        let moved = self
            .children(parent)
            .get(from..to.max(from))
            .unwrap_or_default()
            .to_vec();
        for node in moved {
            self.detach(node)?;
            let len = self.children(wrapper).len();
            self.place(wrapper, len, node)?;
        }
        self.place(parent, from, wrapper)
    }

    fn effective_parent(&self, id: NodeId) -> Result<NodeId, DomError> {
        if self.is_text(id) {
            self.parent(id).ok_or(DomError::InvalidRange)
        } else {
            self.node(id).map(|_| id)
        }
    }

    /// Splits text at both boundaries and resolves them to `(parent, child index)`.
    fn split_boundaries(
        &mut self,
        range: &Range,
    ) -> Result<((NodeId, usize), (NodeId, usize)), DomError> {
        // The end is split first so the start offset stays valid when both
        // boundaries share a text node.
        let end = self.anchor_for(range.end)?;
        let start = self.anchor_for(range.start)?;
        Ok((self.resolve_anchor(start)?, self.resolve_anchor(end)?))
    }

    fn anchor_for(&mut self, boundary: Boundary) -> Result<Anchor, DomError> {
        let Boundary { node, offset } = boundary;
        if let Some(text) = self.text(node) {
            let len = text.len();
            if offset == 0 {
                return Ok(Anchor::Before(node));
            }
            if offset >= len {
                return self.anchor_after(node);
            }
            let tail = self.split_text(node, offset)?;
            if self.parent(tail).is_none() {
                return Err(DomError::InvalidRange);
            }
            return Ok(Anchor::Before(tail));
        }
        match self.children(node).get(offset) {
            Some(&child) => Ok(Anchor::Before(child)),
            None => Ok(Anchor::AtEnd(node)),
        }
    }

    fn anchor_after(&self, node: NodeId) -> Result<Anchor, DomError> {
        match self.next_sibling(node) {
            Some(next) => Ok(Anchor::Before(next)),
            None => self
                .parent(node)
                .map(Anchor::AtEnd)
                .ok_or(DomError::InvalidRange),
        }
    }

    fn resolve_anchor(&self, anchor: Anchor) -> Result<(NodeId, usize), DomError> {
        match anchor {
            Anchor::Before(node) => {
                let parent = self.parent(node).ok_or(DomError::InvalidRange)?;
                let index = self.index_in_parent(node).ok_or(DomError::InvalidRange)?;
                Ok((parent, index))
            }
            Anchor::AtEnd(node) => Ok((node, self.children(node).len())),
        }
    }

    /// Extracts the range's contents. Partially selected ancestors are split:
    /// the selected part moves into a shallow clone and every split is recorded
    /// so the caller can merge it back.
    pub fn extract_range(&mut self, range: &Range) -> Result<Extraction, DomError> {
        self.validate_range(range)?;
        let ((start_parent, start_index), (end_parent, end_index)) =
            self.split_boundaries(range)?;
        let ancestor = self
            .common_ancestor(start_parent, end_parent)
            .ok_or(DomError::InvalidRange)?;
        let mut split_ancestors = Vec::new();

        let (start_piece, start_top) = if start_parent == ancestor {
            (None, None)
        } else {
            let (piece, top) = self.split_upward(
                start_parent,
                start_index,
                ancestor,
                Side::Start,
                &mut split_ancestors,
            )?;
            (Some(piece), Some(top))
        };
        let (end_piece, end_top) = if end_parent == ancestor {
            (None, None)
        } else {
            let (piece, top) = self.split_upward(
                end_parent,
                end_index,
                ancestor,
                Side::End,
                &mut split_ancestors,
            )?;
            (Some(piece), Some(top))
        };

        let from = match start_top {
            Some(top) => self.index_in_parent(top).ok_or(DomError::InvalidRange)? + 1,
            None => start_index,
        };
        let to = match end_top {
            Some(top) => self.index_in_parent(top).ok_or(DomError::InvalidRange)?,
            None => end_index,
        };
        let middle = self
            .children(ancestor)
            .get(from..to.max(from))
            .unwrap_or_default()
            .to_vec();
        for &node in &middle {
            self.detach(node)?;
        }

        let nodes = start_piece
            .into_iter()
            .chain(middle)
            .chain(end_piece)
            .collect();
        Ok(Extraction {
            nodes,
            split_ancestors,
            parent: ancestor,
            index: from,
        })
    }

    /// Moves the selected side of `container` (and of each ancestor up to, but
    /// excluding, `stop`) into a chain of shallow clones. Returns the outermost
    /// clone and the child of `stop` it was split from.
    fn split_upward(
        &mut self,
        container: NodeId,
        index: usize,
        stop: NodeId,
        side: Side,
        records: &mut Vec<SplitAncestor>,
    ) -> Result<(NodeId, NodeId), DomError> {
        let clone = self.shallow_clone(container)?;
        let taken = match side {
            Side::Start => self.children(container)[index..].to_vec(),
            Side::End => self.children(container)[..index].to_vec(),
        };
        for node in taken {
            self.detach(node)?;
            let len = self.children(clone).len();
            self.place(clone, len, node)?;
        }
        records.push(SplitAncestor {
            original: container,
            clone,
            side,
        });

        let mut current = clone;
        let mut child = container;
        loop {
            let parent = self.parent(child).ok_or(DomError::InvalidRange)?;
            if parent == stop {
                return Ok((current, child));
            }
            let parent_clone = self.shallow_clone(parent)?;
            let position = self.index_in_parent(child).ok_or(DomError::InvalidRange)?;
            let siblings = match side {
                Side::Start => self.children(parent)[position + 1..].to_vec(),
                Side::End => self.children(parent)[..position].to_vec(),
            };
            if side == Side::End {
                for node in siblings {
                    self.detach(node)?;
                    let len = self.children(parent_clone).len();
                    self.place(parent_clone, len, node)?;
                }
                let len = self.children(parent_clone).len();
                self.place(parent_clone, len, current)?;
            } else {
                self.place(parent_clone, 0, current)?;
                for node in siblings {
                    self.detach(node)?;
                    let len = self.children(parent_clone).len();
                    self.place(parent_clone, len, node)?;
                }
            }
            records.push(SplitAncestor {
                original: parent,
                clone: parent_clone,
                side,
            });
            current = parent_clone;
            child = parent;
        }
    }

    /// Inserts detached `node` at `parent[index]`.
    pub fn insert_at(&mut self, parent: NodeId, index: usize, node: NodeId) -> Result<(), DomError> {
        self.check_insert(parent, node)?;
        self.detach(node)?;
        self.place(parent, index, node)
    }
}

fn escape_into(value: &str, attribute: bool, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
}
