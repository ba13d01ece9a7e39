//! Encapsulation scopes.
//!
//! Template and extension output is a flat run of siblings sharing an
//! `about` id, not a subtree. A [`Scope`] names the first and last sibling of
//! such a run; membership is decided by walking forward from `first`.
use crate::classify::is_first_encapsulation_wrapper;
use crate::{Document, NodeId};
use core_types::Dsr;
use tools::text::is_inter_element_whitespace;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scope {
    pub first: NodeId,
    pub last: NodeId,
    pub about: String,
    /// The first node's range at the time the scope opened.
    pub dsr: Option<Dsr>,
    /// Set by a handler to end the scope after the current node's handlers.
    pub clear: bool,
}

impl Scope {
    /// Opens a scope at an encapsulation wrapper; `None` for other nodes.
    pub fn open(doc: &Document, first: NodeId) -> Option<Scope> {
        if !is_first_encapsulation_wrapper(doc, first) {
            return None;
        }
        let about = doc.attr(first, "about")?.to_string();
        let siblings = about_siblings(doc, first, &about);
        let last = siblings.last().copied().unwrap_or(first);
        Some(Scope {
            first,
            last,
            dsr: doc.dsr(first),
            about,
            clear: false,
        })
    }

    /// Siblings from `first` through `last`, inclusive.
    pub fn members(&self, doc: &Document) -> Vec<NodeId> {
        let mut out = vec![self.first];
        let mut cur = self.first;
        while cur != self.last {
            match doc.next_sibling(cur) {
                Some(next) => {
                    out.push(next);
                    cur = next;
                }
                None => break,
            }
        }
        out
    }
}

/// Positions where the HTML tree builder would foster-parent content.
pub fn is_fosterable_position(doc: &Document, node: NodeId) -> bool {
    doc.parent(node).is_some_and(|p| {
        matches!(
            doc.node_name(p),
            Some("table" | "tbody" | "thead" | "tfoot" | "tr")
        )
    })
}

/// `node` followed by every later sibling carrying the same `about`.
///
/// Whitespace text in table-internal positions does not break the run, but
/// whitespace trailing the run is not part of it.
pub fn about_siblings(doc: &Document, node: NodeId, about: &str) -> Vec<NodeId> {
    let mut nodes = vec![node];
    if about.is_empty() {
        return nodes;
    }
    let mut cur = doc.next_sibling(node);
    while let Some(n) = cur {
        let same_about = doc.attr(n, "about") == Some(about);
        let fosterable_ws = is_fosterable_position(doc, n)
            && doc.text(n).is_some_and(is_inter_element_whitespace);
        if !same_about && !fosterable_ws {
            break;
        }
        nodes.push(n);
        cur = doc.next_sibling(n);
    }
    while nodes.len() > 1 {
        let last = nodes[nodes.len() - 1];
        if doc.text(last).is_some_and(is_inter_element_whitespace) {
            nodes.pop();
        } else {
            break;
        }
    }
    nodes
}

/// The node just past the encapsulation unit that starts at `node`.
pub fn skip_over_encapsulated_content(doc: &Document, node: NodeId) -> Option<NodeId> {
    match doc.attr(node, "about") {
        Some(about) => {
            let siblings = about_siblings(doc, node, about);
            siblings.last().and_then(|last| doc.next_sibling(*last))
        }
        None => doc.next_sibling(node),
    }
}

/// Walks back over same-`about` siblings to the unit's first wrapper.
pub fn find_first_encapsulation_wrapper(doc: &Document, node: NodeId) -> Option<NodeId> {
    let about = doc.attr(node, "about").filter(|a| a.starts_with("#mwt"))?;
    let mut first = node;
    while let Some(prev) = doc.prev_sibling(first) {
        if doc.attr(prev, "about") != Some(about) {
            break;
        }
        first = prev;
    }
    is_first_encapsulation_wrapper(doc, first).then_some(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(doc: &mut Document, parent: NodeId, name: &str, attrs: &[(&str, &str)]) -> NodeId {
        let id = doc.create_element_with_attrs(name, attrs);
        doc.append_child(parent, id).expect("append");
        id
    }

    #[test]
    fn scope_spans_same_about_siblings_and_drops_trailing_whitespace() {
        let mut doc = Document::new();
        let root = doc.root();
        let first = el(&mut doc, root, "p", &[("typeof", "mw:Transclusion"), ("about", "#mwt1")]);
        let mid = el(&mut doc, root, "p", &[("about", "#mwt1")]);
        let ws = doc.create_text("\n");
        doc.append_child(root, ws).expect("append ws");
        let other = el(&mut doc, root, "p", &[]);

        let scope = Scope::open(&doc, first).expect("scope opens");
        assert_eq!(scope.last, mid);
        assert_eq!(scope.members(&doc), [first, mid]);
        assert_eq!(skip_over_encapsulated_content(&doc, first), Some(ws));
        assert_eq!(find_first_encapsulation_wrapper(&doc, mid), Some(first));
        assert_eq!(find_first_encapsulation_wrapper(&doc, other), None);
        assert!(Scope::open(&doc, mid).is_none());
    }

    #[test]
    fn whitespace_inside_tables_does_not_end_the_run() {
        let mut doc = Document::new();
        let root = doc.root();
        let tbody = el(&mut doc, root, "tbody", &[]);
        let first = el(&mut doc, tbody, "tr", &[("typeof", "mw:Transclusion"), ("about", "#mwt3")]);
        let ws = doc.create_text("\n");
        doc.append_child(tbody, ws).expect("append ws");
        let second = el(&mut doc, tbody, "tr", &[("about", "#mwt3")]);
        let trailing = doc.create_text(" ");
        doc.append_child(tbody, trailing).expect("append trailing");

        assert_eq!(about_siblings(&doc, first, "#mwt3"), [first, ws, second]);
    }
}
