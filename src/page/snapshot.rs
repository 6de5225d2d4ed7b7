use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::dom::{PageDom, PageNode};
use crate::config::SnapshotConfig;

/// Attributes that survive sanitizing. Everything else is dropped before the
/// snapshot leaves the process.
const ALLOWED_ATTRS: [&str; 11] = [
    "id",
    "name",
    "class",
    "role",
    "type",
    "placeholder",
    "aria-label",
    "href",
    "src",
    "alt",
    "title",
];

/// Closed set of tags a descriptor can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    Button,
    A,
    Input,
    Textarea,
    Select,
    H1,
    H2,
    H3,
    Text,
    Img,
    Label,
}

impl Tag {
    fn from_raw(tag: &str) -> Option<Tag> {
        match tag {
            "button" => Some(Tag::Button),
            "a" => Some(Tag::A),
            "input" => Some(Tag::Input),
            "textarea" => Some(Tag::Textarea),
            "select" => Some(Tag::Select),
            "h1" => Some(Tag::H1),
            "h2" => Some(Tag::H2),
            "h3" => Some(Tag::H3),
            "p" | "span" => Some(Tag::Text),
            "img" => Some(Tag::Img),
            "label" => Some(Tag::Label),
            _ => None,
        }
    }
}

/// One sanitized element, safe to send to the interpreter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementDescriptor {
    pub tag: Tag,
    pub text: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
}

/// Compact, size-bounded description of the visible page. Produced fresh per
/// capture; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    /// Capture time, milliseconds since the epoch
    pub timestamp: i64,
    pub elements: Vec<ElementDescriptor>,
}

#[derive(Debug, Clone)]
pub struct SnapshotOptions {
    pub max_elements: usize,
    pub max_text_len: usize,
    pub max_attr_len: usize,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            max_elements: 100,
            max_text_len: 100,
            max_attr_len: 100,
        }
    }
}

impl From<&SnapshotConfig> for SnapshotOptions {
    fn from(cfg: &SnapshotConfig) -> Self {
        Self {
            max_elements: cfg.max_elements,
            max_text_len: cfg.max_text_len,
            max_attr_len: cfg.max_attr_len,
        }
    }
}

/// Tags whose content reads as prose. Runs of these coalesce into a single
/// `text` descriptor so the snapshot doesn't fragment flowing text per tag.
fn is_text_bearing(tag: &str) -> bool {
    matches!(tag, "p" | "span" | "h1" | "h2" | "h3")
}

/// Convert a raw capture into a bounded snapshot.
///
/// Reads only; a snapshot is always returned, even from a degenerate capture.
/// Nodes with unknown tags or a zero render box are skipped, runs of
/// consecutive text-bearing nodes are merged, text is truncated with an
/// ellipsis marker and attributes are filtered down to the allow-list.
pub fn sanitize(dom: &PageDom, opts: &SnapshotOptions) -> PageSnapshot {
    let mut elements = Vec::new();
    let nodes = &dom.nodes;
    let mut i = 0;

    while i < nodes.len() && elements.len() < opts.max_elements {
        let node = &nodes[i];

        if is_text_bearing(&node.tag) {
            // Consume the whole run even when nothing in it is visible.
            let run_end = run_end(nodes, i);
            if let Some(desc) = coalesce_run(&nodes[i..run_end], opts) {
                elements.push(desc);
            }
            i = run_end;
            continue;
        }

        if node.visible {
            if let Some(desc) = describe(node, opts) {
                elements.push(desc);
            }
        }
        i += 1;
    }

    PageSnapshot {
        url: dom.url.clone(),
        timestamp: epoch_millis(),
        elements,
    }
}

/// End of the run of consecutive text-bearing nodes starting at `start`.
fn run_end(nodes: &[PageNode], start: usize) -> usize {
    let mut end = start;
    while end < nodes.len() && is_text_bearing(&nodes[end].tag) {
        end += 1;
    }
    end
}

/// Merge a run of text-bearing nodes into one descriptor. Invisible nodes
/// contribute nothing; an empty merged text yields no descriptor. A run with
/// a single visible heading keeps the heading tag, everything else flattens
/// to `text`.
fn coalesce_run(run: &[PageNode], opts: &SnapshotOptions) -> Option<ElementDescriptor> {
    let visible: Vec<&PageNode> = run.iter().filter(|n| n.visible).collect();

    let pieces: Vec<&str> = visible
        .iter()
        .map(|n| n.text.trim())
        .filter(|t| !t.is_empty())
        .collect();
    if pieces.is_empty() {
        return None;
    }

    let tag = match visible.as_slice() {
        [only] => Tag::from_raw(&only.tag).unwrap_or(Tag::Text),
        _ => Tag::Text,
    };

    let first = visible[0];
    Some(ElementDescriptor {
        tag,
        text: truncate(&pieces.join(" "), opts.max_text_len),
        attrs: collect_attrs(first, opts.max_attr_len),
    })
}

/// Describe a single non-prose node.
fn describe(node: &PageNode, opts: &SnapshotOptions) -> Option<ElementDescriptor> {
    let tag = Tag::from_raw(&node.tag)?;
    let label = extract_label(node, tag);

    Some(ElementDescriptor {
        tag,
        text: truncate(label.trim(), opts.max_text_len),
        attrs: collect_attrs(node, opts.max_attr_len),
    })
}

/// Short human-meaningful label for a non-text element.
fn extract_label(node: &PageNode, tag: Tag) -> String {
    match tag {
        Tag::Img => node
            .first_attr(&["alt", "title", "aria-label"])
            .unwrap_or_default()
            .to_string(),
        Tag::Input if is_button_like_input(node) => node
            .first_attr(&["value", "title", "aria-label"])
            .unwrap_or_default()
            .to_string(),
        _ => node.text.clone(),
    }
}

fn is_button_like_input(node: &PageNode) -> bool {
    matches!(
        node.attr("type"),
        Some("submit") | Some("button") | Some("reset") | Some("image")
    )
}

fn collect_attrs(node: &PageNode, max_attr_len: usize) -> BTreeMap<String, String> {
    ALLOWED_ATTRS
        .iter()
        .filter_map(|name| {
            node.attr(name)
                .filter(|v| !v.is_empty())
                .map(|v| (name.to_string(), cap(v, max_attr_len)))
        })
        .collect()
}

/// Char-boundary-safe truncation with an ellipsis marker.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max).collect();
        out.push('…');
        out
    }
}

/// Plain length cap, no marker.
fn cap(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

fn epoch_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
