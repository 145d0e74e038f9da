//! Loads rendered HTML into a [`Document`].
//!
//! Parsing goes through `scraper` (html5ever), so entities, unclosed tags and
//! misnested markup are recovered the way a browser would. Comments,
//! doctypes and processing instructions are dropped. Full documents contribute
//! their `body` children; fragments contribute everything.

use crate::dom::{Document, DomError};
use once_cell::sync::Lazy;
use scraper::{Html, Node, Selector};
use std::fmt;
use tracing::debug;

static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("valid body selector"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupError {
    Dom(DomError),
}

impl fmt::Display for MarkupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkupError::Dom(err) => write!(f, "tree error: {err}"),
        }
    }
}

impl std::error::Error for MarkupError {}

impl From<DomError> for MarkupError {
    fn from(value: DomError) -> Self {
        MarkupError::Dom(value)
    }
}

/// Parses `source` into a fresh document under its `body` root.
pub fn parse_markup(source: &str) -> Result<Document, MarkupError> {
    let html = if is_full_document(source) {
        Html::parse_document(source)
    } else {
        Html::parse_fragment(source)
    };
    if !html.errors.is_empty() {
        debug!(errors = html.errors.len(), "recovered from malformed markup");
    }
    let top = html
        .select(&BODY)
        .next()
        .unwrap_or_else(|| html.root_element());

    let mut doc = Document::new();
    let mut elements = vec![doc.root()];
    let mut pending: Vec<_> = top.children().map(|child| (child, doc.root())).collect();
    pending.reverse();
    while let Some((item, parent)) = pending.pop() {
        match item.value() {
            Node::Text(text) => {
                if !text.is_empty() {
                    let node = doc.create_text(&**text);
                    doc.append_child(parent, node)?;
                }
            }
            Node::Element(element) => {
                let node = doc.create_element(element.name());
                for (name, value) in element.attrs() {
                    doc.set_attribute(node, name, value)?;
                }
                doc.append_child(parent, node)?;
                elements.push(node);
                let children: Vec<_> = item.children().collect();
                pending.extend(children.into_iter().rev().map(|child| (child, node)));
            }
            _ => {}
        }
    }

    // Dropped comments can leave text runs split in two.
    for element in elements {
        doc.normalize(element);
    }
    Ok(doc)
}

fn is_full_document(source: &str) -> bool {
    let head = source.trim_start();
    let head = head.get(..9).unwrap_or(head).to_ascii_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_attributes() {
        let doc = parse_markup(
            r#"<article><h2 id="intro">Intro</h2><p class="lead">A <b>bold</b> move&amp;more</p></article>"#,
        )
        .unwrap();
        assert_eq!(
            doc.to_markup(doc.root()),
            r#"<body><article><h2 id="intro">Intro</h2><p class="lead">A <b>bold</b> move&amp;more</p></article></body>"#
        );
    }

    #[test]
    fn void_and_self_closing_tags_do_not_nest() {
        let doc = parse_markup("<p>a<br>b<img src='x.png'/>c</p>").unwrap();
        let p = doc.children(doc.root())[0];
        assert_eq!(doc.children(p).len(), 5);
        assert_eq!(doc.text_content(p), "abc");
    }

    #[test]
    fn misnested_and_unclosed_markup_is_recovered() {
        let doc = parse_markup("<p><b>x</p>").unwrap();
        assert_eq!(doc.to_markup(doc.root()), "<body><p><b>x</b></p></body>");
        let doc = parse_markup("<p>open").unwrap();
        assert_eq!(doc.to_markup(doc.root()), "<body><p>open</p></body>");
    }

    #[test]
    fn comments_are_dropped_and_entities_decoded() {
        let doc = parse_markup("<p>x<!-- note -->&lt;y&#62; &hellip;</p>").unwrap();
        let p = doc.children(doc.root())[0];
        assert_eq!(doc.children(p).len(), 1);
        assert_eq!(doc.text_content(doc.root()), "x<y> \u{2026}");
    }

    #[test]
    fn full_documents_contribute_their_body() {
        let doc = parse_markup(
            "<!DOCTYPE html><html><head><title>Skip</title></head><body><h1>Kept</h1></body></html>",
        )
        .unwrap();
        assert_eq!(doc.to_markup(doc.root()), "<body><h1>Kept</h1></body>");
    }
}
