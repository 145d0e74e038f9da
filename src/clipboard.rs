//! Host side effects: navigation and clipboard writes with a fallback path.

use crate::dom::Document;
use std::fmt;
use tracing::{debug, warn};

const OFFSCREEN_STYLE: &str = "position:fixed;left:-9999px;top:0;opacity:0";

/// The environment the widget runs in.
pub trait Host {
    /// Opens `url` in a new browsing context.
    fn open_in_new_context(&mut self, url: &str);
    /// Asynchronous clipboard API, already resolved by the host.
    fn clipboard_write(&mut self, text: &str) -> Result<(), ClipboardError>;
    /// Legacy copy command over the current selection. Returns whether the
    /// host reported success.
    fn exec_copy(&mut self, selected: &str) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardError {
    InsecureContext,
    PermissionDenied,
    Unavailable(String),
}

impl fmt::Display for ClipboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClipboardError::InsecureContext => write!(f, "clipboard requires a secure context"),
            ClipboardError::PermissionDenied => write!(f, "clipboard permission denied"),
            ClipboardError::Unavailable(reason) => write!(f, "clipboard unavailable: {reason}"),
        }
    }
}

impl std::error::Error for ClipboardError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyPath {
    Clipboard,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied(CopyPath),
    Failed,
}

impl CopyOutcome {
    pub fn is_copied(self) -> bool {
        matches!(self, CopyOutcome::Copied(_))
    }
}

/// Copies `text`, falling back to an off-screen textarea plus the legacy copy
/// command when the clipboard API fails. The document's selection is restored
/// afterwards.
pub fn copy_text(doc: &mut Document, host: &mut dyn Host, text: &str) -> CopyOutcome {
    match host.clipboard_write(text) {
        Ok(()) => return CopyOutcome::Copied(CopyPath::Clipboard),
        Err(err) => debug!(error = %err, "clipboard write failed; using fallback copy"),
    }

    let previous = doc.selection();
    let textarea = doc.create_element("textarea");
    let content = doc.create_text(text);
    let prepared = doc
        .set_attribute(textarea, "style", OFFSCREEN_STYLE)
        .and_then(|()| doc.set_attribute(textarea, "readonly", ""))
        .and_then(|()| doc.append_child(textarea, content))
        .and_then(|()| doc.append_child(doc.root(), textarea))
        .and_then(|()| doc.node_contents_range(content))
        .and_then(|range| doc.set_selection(Some(range)));

    let copied = match prepared {
        Ok(()) => {
            let selected = doc.selection_text();
            host.exec_copy(&selected)
        }
        Err(err) => {
            warn!(error = %err, "failed to stage fallback copy");
            false
        }
    };

    if let Err(err) = doc.detach(textarea) {
        warn!(error = %err, "failed to remove fallback textarea");
    }
    if let Err(err) = doc.set_selection(previous) {
        debug!(error = %err, "previous selection no longer valid");
    }

    if copied {
        CopyOutcome::Copied(CopyPath::Fallback)
    } else {
        warn!("fallback copy command failed");
        CopyOutcome::Failed
    }
}
