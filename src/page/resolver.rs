use super::dom::{PageDom, PageNode};

/// Find the actionable element best matching the given text.
///
/// Scans links, buttons, `role=button|link` and submit inputs in document
/// order. Both sides are compared trimmed and lowercased. An exact match
/// anywhere in the document wins over an earlier partial match; among
/// partials the first in document order wins, so resolution against the same
/// page is repeatable.
pub fn find_by_text<'a>(dom: &'a PageDom, text: &str) -> Option<&'a PageNode> {
    let query = text.trim().to_lowercase();
    if query.is_empty() {
        return None;
    }

    let mut first_partial: Option<&PageNode> = None;
    for node in dom.nodes.iter().filter(|n| is_actionable(n)) {
        let candidate = candidate_text(node).trim().to_lowercase();
        if candidate == query {
            return Some(node);
        }
        if first_partial.is_none() && candidate.contains(&query) {
            first_partial = Some(node);
        }
    }
    first_partial
}

/// Find the form control for the given label text.
///
/// Phase 1: `<label>` elements whose text contains the query
/// (case-insensitive), resolved through the `for` attribute or a nested
/// control. Phase 2: any input/textarea/select whose `aria-label` or
/// `placeholder` contains the query. Returns None only if both phases miss.
pub fn find_for_input<'a>(dom: &'a PageDom, label_text: &str) -> Option<&'a PageNode> {
    let query = label_text.trim().to_lowercase();
    if query.is_empty() {
        return None;
    }

    for label in dom.nodes.iter().filter(|n| n.tag == "label") {
        if !label.text.trim().to_lowercase().contains(&query) {
            continue;
        }
        if let Some(target_id) = label.attr("for") {
            if let Some(target) = dom.node_with_dom_id(target_id) {
                return Some(target);
            }
        } else if let Some(control_id) = label.control {
            if let Some(target) = dom.node(control_id) {
                return Some(target);
            }
        }
    }

    // No label matched; fall back to attribute matching.
    dom.nodes
        .iter()
        .filter(|n| is_form_control(n))
        .find(|n| {
            n.first_attr(&["aria-label", "placeholder"])
                .map(|v| v.to_lowercase().contains(&query))
                .unwrap_or(false)
        })
}

fn is_actionable(node: &PageNode) -> bool {
    match node.tag.as_str() {
        "a" | "button" => true,
        "input" => node.attr("type") == Some("submit"),
        _ => matches!(node.attr("role"), Some("button") | Some("link")),
    }
}

fn is_form_control(node: &PageNode) -> bool {
    matches!(node.tag.as_str(), "input" | "textarea" | "select")
}

/// Rendered text of a candidate; button-like inputs report their value.
fn candidate_text(node: &PageNode) -> &str {
    if node.text.is_empty() {
        node.first_attr(&["value", "aria-label"]).unwrap_or("")
    } else {
        &node.text
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn node(id: u32, tag: &str, text: &str) -> PageNode {
        PageNode {
            id,
            tag: tag.to_string(),
            text: text.to_string(),
            attrs: HashMap::new(),
            visible: true,
            control: None,
        }
    }

    fn with_attrs(mut n: PageNode, attrs: &[(&str, &str)]) -> PageNode {
        n.attrs = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        n
    }

    fn dom(nodes: Vec<PageNode>) -> PageDom {
        PageDom {
            url: "https://example.com".to_string(),
            nodes,
        }
    }

    #[test]
    fn exact_match_beats_earlier_partial() {
        let page = dom(vec![
            node(1, "a", "Login help"),
            node(2, "button", "Login"),
        ]);

        let found = find_by_text(&page, "Login").unwrap();
        assert_eq!(found.id, 2);
    }

    #[test]
    fn first_partial_wins_without_an_exact_match() {
        let page = dom(vec![
            node(1, "a", "Log In now"),
            node(2, "a", "Log In later"),
        ]);

        let found = find_by_text(&page, "log in").unwrap();
        assert_eq!(found.id, 1);
    }

    #[test]
    fn matching_is_case_insensitive_and_trimmed() {
        let page = dom(vec![node(1, "button", "  Sign Up  ")]);

        assert_eq!(find_by_text(&page, "sign up").unwrap().id, 1);
        assert_eq!(find_by_text(&page, " SIGN UP ").unwrap().id, 1);
    }

    #[test]
    fn no_match_returns_none() {
        let page = dom(vec![node(1, "button", "Login")]);

        assert!(find_by_text(&page, "Register").is_none());
        assert!(find_by_text(&page, "").is_none());
    }

    #[test]
    fn non_actionable_elements_are_not_candidates() {
        let page = dom(vec![
            node(1, "p", "Login"),
            node(2, "h1", "Login"),
            with_attrs(node(3, "div", "Login"), &[("role", "button")]),
        ]);

        // Prose mentioning "Login" must not win over the role=button div.
        let found = find_by_text(&page, "Login").unwrap();
        assert_eq!(found.id, 3);
    }

    #[test]
    fn submit_input_matches_on_its_value() {
        let page = dom(vec![with_attrs(
            node(1, "input", ""),
            &[("type", "submit"), ("value", "Search")],
        )]);

        assert_eq!(find_by_text(&page, "search").unwrap().id, 1);
    }

    #[test]
    fn label_with_for_attribute_resolves_to_referenced_control() {
        let page = dom(vec![
            with_attrs(node(1, "label", "Username"), &[("for", "user")]),
            with_attrs(node(2, "input", ""), &[("id", "user")]),
        ]);

        assert_eq!(find_for_input(&page, "username").unwrap().id, 2);
    }

    #[test]
    fn label_without_for_resolves_to_nested_control() {
        let mut label = node(1, "label", "Email address");
        label.control = Some(7);
        let page = dom(vec![label, node(7, "input", "")]);

        assert_eq!(find_for_input(&page, "email").unwrap().id, 7);
    }

    #[test]
    fn attribute_fallback_fires_only_when_no_label_matches() {
        let page = dom(vec![
            with_attrs(node(1, "label", "Password"), &[("for", "pw")]),
            with_attrs(node(2, "input", ""), &[("id", "pw")]),
            with_attrs(node(3, "input", ""), &[("placeholder", "Password again")]),
        ]);

        // Label phase wins even though the placeholder also contains the text.
        assert_eq!(find_for_input(&page, "password").unwrap().id, 2);

        // With no matching label, placeholder matching takes over.
        assert_eq!(find_for_input(&page, "again").unwrap().id, 3);
    }

    #[test]
    fn aria_label_fallback_matches_controls() {
        let page = dom(vec![with_attrs(
            node(1, "textarea", ""),
            &[("aria-label", "Your comment")],
        )]);

        assert_eq!(find_for_input(&page, "comment").unwrap().id, 1);
    }

    #[test]
    fn find_for_input_returns_none_when_both_phases_miss() {
        let page = dom(vec![
            with_attrs(node(1, "label", "Name"), &[("for", "n")]),
            with_attrs(node(2, "input", ""), &[("id", "n")]),
        ]);

        assert!(find_for_input(&page, "phone").is_none());
    }
}
