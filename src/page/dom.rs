use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Identifier of a page context (a browser tab) as reported by the extension.
pub type ContextId = u32;

/// Raw page capture reported by the page context.
///
/// The capture script walks the document in order, restricted to the selector
/// allow-list (interactive elements, headings, paragraphs, spans, images,
/// labels), and reports one node per visited element. All interpretation of
/// the capture — visibility filtering, coalescing, truncation, text matching
/// — happens on this side of the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageDom {
    /// URL of the captured document
    pub url: String,
    /// Nodes in document order
    pub nodes: Vec<PageNode>,
}

/// One captured element.
///
/// `id` is stable only for the lifetime of this capture; actions address
/// elements by id and a fresh capture invalidates all previous ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageNode {
    pub id: u32,

    /// Lowercased tag name
    pub tag: String,

    /// Rendered text content. For button-like inputs the capture script
    /// reports the `value` attribute here, since textContent is empty.
    #[serde(default)]
    pub text: String,

    /// Raw attributes as present on the element
    #[serde(default)]
    pub attrs: HashMap<String, String>,

    /// Whether the element has a non-zero render box
    #[serde(default)]
    pub visible: bool,

    /// For `<label>` nodes without a `for` attribute: the id of a nested
    /// form control, when one exists.
    #[serde(default)]
    pub control: Option<u32>,
}

impl PageNode {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// First non-empty of the given attributes.
    pub fn first_attr(&self, names: &[&str]) -> Option<&str> {
        names
            .iter()
            .filter_map(|n| self.attr(n))
            .find(|v| !v.is_empty())
    }
}

impl PageDom {
    /// Look up a node by the value of its `id` attribute (not the capture id).
    pub fn node_with_dom_id(&self, dom_id: &str) -> Option<&PageNode> {
        self.nodes.iter().find(|n| n.attr("id") == Some(dom_id))
    }

    /// Look up a node by capture id.
    pub fn node(&self, id: u32) -> Option<&PageNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}
