//! Gesture coordination for the lookup popup.
//!
//! One [`LookupController`] owns the document, the live highlight and the popup
//! state. Handlers take events stamped with `at_ms`; the double-click
//! suppression window and the copy confirmation are deadlines compared against
//! those stamps rather than timers.

use crate::clipboard::{CopyOutcome, Host, copy_text};
use crate::config::LookupConfig;
use crate::context::SelectionContext;
use crate::dom::{Document, NodeId};
use crate::highlight::{Highlighter, TOPIC_ATTRIBUTE};
use crate::matcher::{MatchResult, SlugMatcher, WordMatches};
use crate::prompt::{PromptContext, PromptStyle, build_prompt, load_style, save_style};
use crate::storage::PreferenceStore;
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Viewport {
    pub width: i32,
    pub height: i32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTarget {
    Content(NodeId),
    /// Anywhere inside the host-rendered popup.
    Popup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
    pub target: EventTarget,
    pub x: i32,
    pub y: i32,
    pub at_ms: u64,
}

impl PointerEvent {
    pub fn on(node: NodeId, x: i32, y: i32, at_ms: u64) -> Self {
        Self {
            target: EventTarget::Content(node),
            x,
            y,
            at_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ignored,
    PopupShown,
    Opened { url: String },
    Dismissed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopupState {
    pub visible: bool,
    pub x: i32,
    pub y: i32,
    pub context: SelectionContext,
    pub whole_selection_matches: Vec<MatchResult>,
    pub per_word_matches: Vec<WordMatches>,
}

impl PopupState {
    /// Whether the popup has a wiki-links section.
    pub fn has_links(&self) -> bool {
        !self.whole_selection_matches.is_empty() || !self.per_word_matches.is_empty()
    }
}

/// Top-left corner for a popup opened at pointer `(x, y)`.
///
/// Opens below-right of the pointer, flips left/up when that would overflow,
/// then clamps to `edge_inset`. On viewports smaller than the popup plus both
/// insets, the top/left inset wins.
pub fn place_popup(x: i32, y: i32, viewport: Viewport, config: &LookupConfig) -> (i32, i32) {
    let (w, h) = (config.popup_width, config.popup_height);
    let inset = config.edge_inset;

    let mut left = x;
    let mut top = y.saturating_add(config.popup_offset);
    if left.saturating_add(w) > viewport.width.saturating_sub(inset) {
        left = x.saturating_sub(w);
    }
    if top.saturating_add(h) > viewport.height.saturating_sub(inset) {
        top = y.saturating_sub(h).saturating_sub(config.popup_offset);
    }
    left = left
        .min(viewport.width.saturating_sub(w).saturating_sub(inset))
        .max(inset);
    top = top
        .min(viewport.height.saturating_sub(h).saturating_sub(inset))
        .max(inset);
    (left, top)
}

pub struct LookupController<'a, H: Host> {
    doc: Document,
    host: H,
    matcher: SlugMatcher<'a>,
    store: &'a dyn PreferenceStore,
    config: LookupConfig,
    page_url: String,
    viewport: Viewport,
    style: PromptStyle,
    highlighter: Highlighter,
    popup: Option<PopupState>,
    pressed: Option<NodeId>,
    suppress_until: Option<u64>,
    copied_until: Option<u64>,
}

impl<'a, H: Host> LookupController<'a, H> {
    pub fn new(
        doc: Document,
        host: H,
        matcher: SlugMatcher<'a>,
        store: &'a dyn PreferenceStore,
    ) -> Self {
        let style = load_style(store);
        Self {
            doc,
            host,
            matcher,
            store,
            config: LookupConfig::default(),
            page_url: String::new(),
            viewport: Viewport::default(),
            style,
            highlighter: Highlighter::new(),
            popup: None,
            pressed: None,
            suppress_until: None,
            copied_until: None,
        }
    }

    pub fn with_config(mut self, config: LookupConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_page_url(mut self, page_url: impl Into<String>) -> Self {
        self.page_url = page_url.into();
        self
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn doc_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn config(&self) -> &LookupConfig {
        &self.config
    }

    pub fn highlighter(&self) -> &Highlighter {
        &self.highlighter
    }

    pub fn popup(&self) -> Option<&PopupState> {
        self.popup.as_ref()
    }

    pub fn style(&self) -> PromptStyle {
        self.style
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Switches the prompt template and persists the choice.
    pub fn set_style(&mut self, style: PromptStyle) {
        self.style = style;
        save_style(self.store, style);
    }

    pub fn on_double_click(&mut self, event: PointerEvent) -> Outcome {
        let Some(target) = self.gesture_target(event.target) else {
            return Outcome::Ignored;
        };
        let text = self.doc.selection_text();
        let word = text.trim();
        if word.chars().count() < self.config.min_double_click_chars {
            return Outcome::Ignored;
        }
        self.suppress_until = Some(event.at_ms.saturating_add(self.config.suppress_ms));

        if !word.contains(char::is_whitespace) {
            let matches = self.matcher.match_word(word);
            if let [only] = matches.as_slice() {
                debug!(word, topic = %only.topic, "single match; opening directly");
                self.dismiss();
                self.doc.clear_selection();
                return self.open_topic(&only.topic);
            }
        }
        let word = word.to_string();
        self.show_popup(&word, target, event.x, event.y);
        Outcome::PopupShown
    }

    pub fn on_mouse_up(&mut self, event: PointerEvent) -> Outcome {
        if self.suppress_until.is_some_and(|until| event.at_ms < until) {
            return Outcome::Ignored;
        }
        let Some(target) = self.gesture_target(event.target) else {
            return Outcome::Ignored;
        };
        let text = self.doc.selection_text();
        let text = text.trim();
        if text.chars().count() < self.config.min_drag_chars || !text.contains(char::is_whitespace)
        {
            return Outcome::Ignored;
        }
        let anchor = self
            .pressed
            .filter(|&node| self.doc.is_connected(node))
            .unwrap_or(target);
        let text = text.to_string();
        self.show_popup(&text, anchor, event.x, event.y);
        Outcome::PopupShown
    }

    pub fn on_mouse_down(&mut self, event: PointerEvent) -> Outcome {
        let EventTarget::Content(node) = event.target else {
            self.pressed = None;
            return Outcome::Ignored;
        };
        self.pressed = Some(node);
        if self.popup.is_none()
            || self.highlighter.covers(&self.doc, node)
            || self.annotation_at(node).is_some()
        {
            return Outcome::Ignored;
        }
        self.dismiss();
        Outcome::Dismissed
    }

    /// Clicks on annotations open their topic.
    pub fn on_click(&mut self, event: PointerEvent) -> Outcome {
        let EventTarget::Content(node) = event.target else {
            return Outcome::Ignored;
        };
        let topic = self
            .annotation_at(node)
            .and_then(|span| self.doc.attribute(span, TOPIC_ATTRIBUTE))
            .map(str::to_string);
        match topic {
            Some(topic) => self.open_topic(&topic),
            None => Outcome::Ignored,
        }
    }

    pub fn on_key_down(&mut self, key: &str) -> Outcome {
        if key == "Escape" && self.dismiss() {
            Outcome::Dismissed
        } else {
            Outcome::Ignored
        }
    }

    pub fn open_topic(&mut self, topic: &str) -> Outcome {
        let url = self.config.topic_url(topic);
        info!(%url, "opening topic");
        self.host.open_in_new_context(&url);
        Outcome::Opened { url }
    }

    /// Closes the popup and releases the live highlight. Returns whether a
    /// popup was open.
    pub fn dismiss(&mut self) -> bool {
        self.highlighter.release_keeping_selection(&mut self.doc);
        self.copied_until = None;
        self.popup.take().is_some()
    }

    /// The prompt for the open popup in the current style.
    pub fn prompt(&self) -> Option<String> {
        let popup = self.popup.as_ref()?;
        Some(build_prompt(
            &popup.context.raw_text,
            self.style,
            &PromptContext::from(&popup.context),
        ))
    }

    pub fn copy_prompt(&mut self, now_ms: u64) -> Option<CopyOutcome> {
        let prompt = self.prompt()?;
        Some(self.copy(&prompt, now_ms))
    }

    pub fn copy_highlight_link(&mut self, now_ms: u64) -> Option<CopyOutcome> {
        let link = self.popup.as_ref()?.context.highlight_url.clone();
        Some(self.copy(&link, now_ms))
    }

    /// Whether the "Copied!" confirmation is still showing at `now_ms`.
    pub fn is_copied(&self, now_ms: u64) -> bool {
        self.copied_until.is_some_and(|until| now_ms < until)
    }

    fn copy(&mut self, text: &str, now_ms: u64) -> CopyOutcome {
        let outcome = copy_text(&mut self.doc, &mut self.host, text);
        if outcome.is_copied() {
            self.copied_until = Some(now_ms.saturating_add(self.config.copied_feedback_ms));
        }
        outcome
    }

    fn show_popup(&mut self, text: &str, anchor: NodeId, x: i32, y: i32) {
        // The old highlight may have split the headings around the anchor.
        let anchor = self.highlighter.release_around(&mut self.doc, anchor);
        let context = SelectionContext::capture(&self.doc, text, Some(anchor), &self.page_url);
        let per_word_matches = self.matcher.find_inline_matches(text);
        let whole_selection_matches = self
            .matcher
            .whole_selection_matches(text, &per_word_matches);

        self.highlighter
            .apply(&mut self.doc, &self.matcher, &self.config);

        let (x, y) = place_popup(x, y, self.viewport, &self.config);
        debug!(
            matches = whole_selection_matches.len(),
            words = per_word_matches.len(),
            x,
            y,
            "showing popup"
        );
        self.popup = Some(PopupState {
            visible: true,
            x,
            y,
            context,
            whole_selection_matches,
            per_word_matches,
        });
        self.copied_until = None;
    }

    /// The content node for a gesture, or `None` when the target is excluded.
    fn gesture_target(&self, target: EventTarget) -> Option<NodeId> {
        let EventTarget::Content(node) = target else {
            return None;
        };
        let excluded = self.doc.closest(node, |doc, candidate| {
            doc.tag(candidate)
                .is_some_and(|tag| self.config.excluded_tags.iter().any(|t| t == tag))
                || self
                    .config
                    .excluded_classes
                    .iter()
                    .any(|class| doc.has_class(candidate, class))
        });
        if excluded.is_some() || self.annotation_at(node).is_some() {
            return None;
        }
        Some(node)
    }

    fn annotation_at(&self, node: NodeId) -> Option<NodeId> {
        let class = self.config.annotation_class.as_str();
        self.doc.closest(node, |doc, candidate| {
            doc.has_class(candidate, class) && doc.attribute(candidate, TOPIC_ATTRIBUTE).is_some()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::CopyPath;
    use crate::clipboard::tests::RecordingHost;
    use crate::highlight::WrapPath;
    use crate::markup::parse_markup;
    use crate::storage::MemoryStore;
    use crate::ClipboardError;

    const PAGE: &str = concat!(
        "<h1>Linear Algebra</h1>",
        "<h2>Maps</h2>",
        "<p>Learn about vectors and xyzzy today.</p>",
        "<p>Every linear transformation matrix is square.</p>",
        r#"<textarea>vectors in a form</textarea>"#,
    );

    const SECTIONS: &str = concat!(
        "<h1>Guide</h1>",
        "<h2>Vectors</h2>",
        "<p>Span and basis xyzzy.</p>",
        "<h2>Maps</h2>",
        "<p>Kernel and image.</p>",
    );

    fn controller_for<'a>(
        store: &'a MemoryStore,
        markup: &str,
    ) -> LookupController<'a, RecordingHost> {
        let doc = parse_markup(markup).unwrap();
        LookupController::new(doc, RecordingHost::new(), SlugMatcher::builtin(), store)
    }

    fn controller(store: &MemoryStore) -> LookupController<'_, RecordingHost> {
        controller_for(store, PAGE).with_page_url("https://docs.example/wiki/linear-algebra#top")
    }

    fn paragraph(ctl: &LookupController<'_, RecordingHost>, index: usize) -> NodeId {
        let doc = ctl.doc();
        doc.children(doc.root())[index]
    }

    fn select(ctl: &mut LookupController<'_, RecordingHost>, needle: &str) {
        let doc = ctl.doc_mut();
        let range = doc.find_text(doc.root(), needle).expect("needle present");
        doc.set_selection(Some(range)).unwrap();
    }

    fn live_markers(doc: &Document) -> usize {
        doc.descendants(doc.root())
            .into_iter()
            .filter(|&node| doc.has_class(node, "dblclick-highlight"))
            .count()
    }

    #[test]
    fn single_match_double_click_opens_directly() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store);
        let p = paragraph(&ctl, 2);
        select(&mut ctl, "vectors");

        let outcome = ctl.on_double_click(PointerEvent::on(p, 100, 100, 1_000));
        assert_eq!(
            outcome,
            Outcome::Opened {
                url: "/vector-spaces".to_string()
            }
        );
        assert_eq!(ctl.host().opened, ["/vector-spaces"]);
        assert!(ctl.popup().is_none());
        assert!(ctl.doc().selection().is_none());
        assert_eq!(ctl.highlighter().applied(), 0);
    }

    #[test]
    fn unmatched_double_click_shows_prompt_without_links() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store);
        let p = paragraph(&ctl, 2);
        select(&mut ctl, "xyzzy");

        assert_eq!(
            ctl.on_double_click(PointerEvent::on(p, 100, 100, 1_000)),
            Outcome::PopupShown
        );
        let popup = ctl.popup().unwrap();
        assert!(popup.visible);
        assert!(!popup.has_links());
        assert_eq!(popup.context.heading_path, ["Linear Algebra", "Maps"]);
        assert_eq!(
            popup.context.highlight_url,
            "https://docs.example/wiki/linear-algebra#:~:text=xyzzy"
        );
        let prompt = ctl.prompt().unwrap();
        assert!(prompt.contains("\"\"\"\nxyzzy\n\"\"\""));
        assert!(prompt.contains("Section: Linear Algebra > Maps"));
        assert_eq!(live_markers(ctl.doc()), 1);
    }

    #[test]
    fn drag_selection_collects_per_word_and_whole_matches() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store);
        let p = paragraph(&ctl, 3);
        let text = ctl.doc().children(p)[0];
        ctl.on_mouse_down(PointerEvent::on(text, 40, 300, 0));
        select(&mut ctl, "linear transformation matrix");

        assert_eq!(
            ctl.on_mouse_up(PointerEvent::on(p, 300, 300, 400)),
            Outcome::PopupShown
        );
        let popup = ctl.popup().unwrap();
        let words: Vec<_> = popup.per_word_matches.iter().map(|w| w.word.as_str()).collect();
        assert_eq!(words, ["linear", "transformation", "matrix"]);
        let whole: Vec<_> = popup
            .whole_selection_matches
            .iter()
            .map(|m| m.topic.as_str())
            .collect();
        assert_eq!(whole, ["linear-maps", "matrices"]);
        assert_eq!(popup.context.heading_path, ["Linear Algebra", "Maps"]);
    }

    #[test]
    fn heading_path_follows_the_pressed_element() {
        let store = MemoryStore::new();
        let mut ctl = controller_for(&store, SECTIONS);
        let first = paragraph(&ctl, 2);
        let second = paragraph(&ctl, 4);
        let pressed = ctl.doc().children(first)[0];
        ctl.on_mouse_down(PointerEvent::on(pressed, 10, 10, 0));
        select(&mut ctl, "xyzzy.MapsKernel and");

        assert_eq!(
            ctl.on_mouse_up(PointerEvent::on(second, 200, 200, 300)),
            Outcome::PopupShown
        );
        let popup = ctl.popup().unwrap();
        assert_eq!(popup.context.heading_path, ["Guide", "Vectors"]);
        assert_eq!(popup.context.raw_text, "xyzzy.MapsKernel and");
    }

    #[test]
    fn press_inside_popup_forgets_the_earlier_anchor() {
        let store = MemoryStore::new();
        let mut ctl = controller_for(&store, SECTIONS);
        let first = paragraph(&ctl, 2);
        let second = paragraph(&ctl, 4);
        ctl.on_mouse_down(PointerEvent::on(first, 10, 10, 0));
        let in_popup = PointerEvent {
            target: EventTarget::Popup,
            x: 0,
            y: 0,
            at_ms: 5,
        };
        assert_eq!(ctl.on_mouse_down(in_popup), Outcome::Ignored);
        select(&mut ctl, "Kernel and image");

        assert_eq!(
            ctl.on_mouse_up(PointerEvent::on(second, 200, 200, 300)),
            Outcome::PopupShown
        );
        assert_eq!(ctl.popup().unwrap().context.heading_path, ["Guide", "Maps"]);
    }

    #[test]
    fn context_is_read_after_the_previous_highlight_is_released() {
        let store = MemoryStore::new();
        let mut ctl = controller_for(
            &store,
            "<h1>Top</h1><h2>Maps</h2><p>Learn about xyzzy today.</p>",
        );
        let p = paragraph(&ctl, 2);
        select(&mut ctl, "apsLearn about");
        assert_eq!(ctl.on_mouse_up(PointerEvent::on(p, 0, 0, 0)), Outcome::PopupShown);
        let live = ctl.highlighter().live().unwrap();
        assert_eq!(live.path(), WrapPath::Extract);
        let marker = live.marker();

        assert_eq!(ctl.on_mouse_down(PointerEvent::on(marker, 0, 0, 10)), Outcome::Ignored);
        select(&mut ctl, "about xyzzy");
        assert_eq!(ctl.on_mouse_up(PointerEvent::on(p, 0, 0, 400)), Outcome::PopupShown);

        let popup = ctl.popup().unwrap();
        assert_eq!(popup.context.heading_path, ["Top", "Maps"]);
        assert_eq!(popup.context.raw_text, "about xyzzy");
        assert_eq!(ctl.highlighter().applied(), 2);
        assert_eq!(ctl.highlighter().released(), 1);
        let h2 = paragraph(&ctl, 1);
        assert_eq!(ctl.doc().to_markup(h2), "<h2>Maps</h2>");
    }

    #[test]
    fn double_click_needs_two_characters() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store);
        let p = paragraph(&ctl, 2);
        assert_eq!(ctl.on_double_click(PointerEvent::on(p, 0, 0, 0)), Outcome::Ignored);
        select(&mut ctl, "a");
        assert_eq!(ctl.on_double_click(PointerEvent::on(p, 0, 0, 10)), Outcome::Ignored);
        assert!(ctl.popup().is_none());
        assert!(ctl.host().opened.is_empty());

        // An ignored double-click does not open the suppression window.
        select(&mut ctl, "xyzzy today");
        assert_eq!(ctl.on_mouse_up(PointerEvent::on(p, 0, 0, 20)), Outcome::PopupShown);
    }

    #[test]
    fn drag_below_the_length_threshold_is_ignored() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store);
        let p = paragraph(&ctl, 2);
        select(&mut ctl, "s ");
        assert_eq!(ctl.on_mouse_up(PointerEvent::on(p, 0, 0, 0)), Outcome::Ignored);
        select(&mut ctl, "t v");
        assert_eq!(ctl.on_mouse_up(PointerEvent::on(p, 0, 0, 10)), Outcome::PopupShown);

        let config = LookupConfig {
            min_drag_chars: 4,
            ..LookupConfig::default()
        };
        let mut strict = controller(&store).with_config(config);
        let p = paragraph(&strict, 2);
        select(&mut strict, "t v");
        assert_eq!(strict.on_mouse_up(PointerEvent::on(p, 0, 0, 0)), Outcome::Ignored);
        assert!(strict.popup().is_none());
    }

    #[test]
    fn single_word_drag_is_left_to_double_click() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store);
        let p = paragraph(&ctl, 3);
        select(&mut ctl, "matrix");
        assert_eq!(ctl.on_mouse_up(PointerEvent::on(p, 0, 0, 0)), Outcome::Ignored);
        select(&mut ctl, "is");
        assert_eq!(ctl.on_double_click(PointerEvent::on(p, 0, 0, 0)), Outcome::PopupShown);
    }

    #[test]
    fn trailing_mouse_up_is_suppressed() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store);
        let p = paragraph(&ctl, 2);
        select(&mut ctl, "xyzzy");
        ctl.on_double_click(PointerEvent::on(p, 10, 10, 1_000));

        select(&mut ctl, "xyzzy today");
        assert_eq!(ctl.on_mouse_up(PointerEvent::on(p, 10, 10, 1_050)), Outcome::Ignored);
        assert_eq!(ctl.on_mouse_up(PointerEvent::on(p, 10, 10, 1_100)), Outcome::PopupShown);
    }

    #[test]
    fn excluded_targets_never_start_a_gesture() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store);
        let textarea = paragraph(&ctl, 4);
        let inner = ctl.doc().children(textarea)[0];
        select(&mut ctl, "vectors in a form");
        assert_eq!(ctl.on_double_click(PointerEvent::on(inner, 0, 0, 0)), Outcome::Ignored);
        assert_eq!(ctl.on_mouse_up(PointerEvent::on(textarea, 0, 0, 0)), Outcome::Ignored);
        let popup_event = PointerEvent {
            target: EventTarget::Popup,
            x: 0,
            y: 0,
            at_ms: 0,
        };
        assert_eq!(ctl.on_mouse_up(popup_event), Outcome::Ignored);
        assert!(ctl.host().opened.is_empty());
    }

    #[test]
    fn second_gesture_releases_exactly_once() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store);
        let p2 = paragraph(&ctl, 2);
        let p3 = paragraph(&ctl, 3);
        let before = ctl.doc().to_markup(ctl.doc().root());

        select(&mut ctl, "about vectors and");
        ctl.on_mouse_up(PointerEvent::on(p2, 0, 0, 0));
        select(&mut ctl, "linear transformation");
        ctl.on_mouse_up(PointerEvent::on(p3, 0, 0, 500));

        assert_eq!(ctl.highlighter().applied(), 2);
        assert_eq!(ctl.highlighter().released(), 1);
        assert_eq!(live_markers(ctl.doc()), 1);
        assert_eq!(ctl.popup().unwrap().context.raw_text, "linear transformation");

        assert_eq!(ctl.on_key_down("Escape"), Outcome::Dismissed);
        assert_eq!(ctl.highlighter().released(), 2);
        assert_eq!(ctl.doc().to_markup(ctl.doc().root()), before);
        assert_eq!(ctl.on_key_down("Escape"), Outcome::Ignored);
    }

    #[test]
    fn mouse_down_outside_dismisses_but_inside_does_not() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store);
        let p3 = paragraph(&ctl, 3);
        select(&mut ctl, "linear transformation matrix");
        ctl.on_mouse_up(PointerEvent::on(p3, 0, 0, 0));
        let marker = ctl.highlighter().live().unwrap().marker();

        assert_eq!(ctl.on_mouse_down(PointerEvent::on(marker, 0, 0, 10)), Outcome::Ignored);
        let inside_popup = PointerEvent {
            target: EventTarget::Popup,
            x: 0,
            y: 0,
            at_ms: 20,
        };
        assert_eq!(ctl.on_mouse_down(inside_popup), Outcome::Ignored);
        assert!(ctl.popup().is_some());

        let heading = paragraph(&ctl, 0);
        assert_eq!(ctl.on_mouse_down(PointerEvent::on(heading, 0, 0, 30)), Outcome::Dismissed);
        assert!(ctl.popup().is_none());
        assert!(!ctl.highlighter().is_live());
    }

    #[test]
    fn clicking_an_annotation_opens_its_topic() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store);
        let p3 = paragraph(&ctl, 3);
        select(&mut ctl, "linear transformation matrix");
        ctl.on_mouse_up(PointerEvent::on(p3, 0, 0, 0));
        let span = ctl.highlighter().live().unwrap().annotations()[2];
        let word = ctl.doc().children(span)[0];

        assert_eq!(ctl.on_mouse_down(PointerEvent::on(word, 0, 0, 10)), Outcome::Ignored);
        assert_eq!(
            ctl.on_click(PointerEvent::on(word, 0, 0, 20)),
            Outcome::Opened {
                url: "/matrices".to_string()
            }
        );
        assert_eq!(ctl.on_double_click(PointerEvent::on(word, 0, 0, 30)), Outcome::Ignored);
        assert!(ctl.popup().is_some());
    }

    #[test]
    fn copy_feedback_expires_and_falls_back() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store);
        let p = paragraph(&ctl, 2);
        assert_eq!(ctl.copy_prompt(0), None);

        select(&mut ctl, "xyzzy");
        ctl.on_double_click(PointerEvent::on(p, 0, 0, 0));
        ctl.host_mut().clipboard = Some(ClipboardError::InsecureContext);

        assert_eq!(
            ctl.copy_highlight_link(5_000),
            Some(CopyOutcome::Copied(CopyPath::Fallback))
        );
        assert_eq!(
            ctl.host().copied,
            ["https://docs.example/wiki/linear-algebra#:~:text=xyzzy"]
        );
        assert!(ctl.is_copied(6_999));
        assert!(!ctl.is_copied(7_000));
        assert_eq!(live_markers(ctl.doc()), 1);
    }

    #[test]
    fn style_changes_persist_and_drive_the_prompt() {
        let store = MemoryStore::new();
        let mut ctl = controller(&store);
        let p = paragraph(&ctl, 2);
        select(&mut ctl, "xyzzy");
        ctl.on_double_click(PointerEvent::on(p, 0, 0, 0));

        ctl.set_style(PromptStyle::QuizFirst);
        assert!(ctl.prompt().unwrap().contains("3 to 5 questions"));
        assert_eq!(load_style(&store), PromptStyle::QuizFirst);

        let reopened = controller(&store);
        assert_eq!(reopened.style(), PromptStyle::QuizFirst);
    }

    #[test]
    fn custom_link_prefix_is_used() {
        let store = MemoryStore::new();
        let config = LookupConfig {
            link_prefix: "/wiki".to_string(),
            ..LookupConfig::default()
        };
        let mut ctl = controller(&store).with_config(config);
        let p = paragraph(&ctl, 2);
        select(&mut ctl, "vectors");
        assert_eq!(
            ctl.on_double_click(PointerEvent::on(p, 0, 0, 0)),
            Outcome::Opened {
                url: "/wiki/vector-spaces".to_string()
            }
        );
    }

    #[test]
    fn popup_stays_inside_viewport() {
        let config = LookupConfig::default();
        let viewport = Viewport {
            width: 1024,
            height: 768,
        };
        let points = [
            (0, 0),
            (1024, 0),
            (0, 768),
            (1024, 768),
            (512, 384),
            (-50, -50),
            (5_000, 5_000),
            (i32::MAX, i32::MAX),
            (i32::MIN, i32::MIN),
        ];
        for (x, y) in points {
            let (left, top) = place_popup(x, y, viewport, &config);
            assert!(left >= 8, "left {left} for {x},{y}");
            assert!(top >= 8, "top {top} for {x},{y}");
            assert!(left + config.popup_width <= viewport.width - 8);
            assert!(top + config.popup_height <= viewport.height - 8);
        }
        assert_eq!(place_popup(100, 100, viewport, &config), (100, 110));
        assert_eq!(place_popup(1000, 700, viewport, &config), (660, 490));
    }
}
