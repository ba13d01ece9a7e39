//! Arena-backed document tree.
//!
//! Invariants:
//! - Node 0 is the document root; it has no parent and is never freed.
//! - Sibling links are doubly linked and always agree with the parent's
//!   first/last child links, so splices are O(1).
//! - A detached node keeps its metadata and may be re-inserted. A removed
//!   node is freed: its metadata is dropped and it can no longer be linked.
use crate::node::{Element, NodeId, NodeKind};
use crate::store::{CallRecord, MetadataStore, SourceRecord};
use core_types::{DiffMark, DiffMarks, Dsr};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DomError {
    FreedNode(NodeId),
    NotAContainer(NodeId),
    RootNotMovable,
    WouldCycle { parent: NodeId, child: NodeId },
    NotAChild { parent: NodeId, child: NodeId },
    Detached(NodeId),
}

impl fmt::Display for DomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomError::FreedNode(id) => write!(f, "node {id} was removed from the document"),
            DomError::NotAContainer(id) => write!(f, "node {id} cannot have children"),
            DomError::RootNotMovable => f.write_str("the document root cannot be moved"),
            DomError::WouldCycle { parent, child } => {
                write!(f, "inserting {child} under {parent} would create a cycle")
            }
            DomError::NotAChild { parent, child } => {
                write!(f, "node {child} is not a child of {parent}")
            }
            DomError::Detached(id) => write!(f, "node {id} has no parent"),
        }
    }
}

impl std::error::Error for DomError {}

#[derive(Debug)]
struct NodeRecord {
    kind: NodeKind,
    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
    freed: bool,
}

impl NodeRecord {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            freed: false,
        }
    }
}

#[derive(Debug)]
pub struct Document {
    nodes: Vec<NodeRecord>,
    store: MetadataStore,
    next_about: u32,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeRecord::new(NodeKind::Document)],
            store: MetadataStore::default(),
            next_about: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeRecord::new(kind));
        id
    }

    fn rec(&self, id: NodeId) -> &NodeRecord {
        &self.nodes[id.index()]
    }

    fn rec_mut(&mut self, id: NodeId) -> &mut NodeRecord {
        &mut self.nodes[id.index()]
    }

    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.push(NodeKind::Element(Element::new(name)))
    }

    pub fn create_element_with_attrs(&mut self, name: &str, attrs: &[(&str, &str)]) -> NodeId {
        let mut element = Element::new(name);
        for (k, v) in attrs {
            element.set_attr(k, *v);
        }
        self.push(NodeKind::Element(element))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Comment(text.into()))
    }

    /// Allocates a fresh encapsulation identifier (`#mwt<N>`).
    pub fn new_about_id(&mut self) -> String {
        let id = format!("#mwt{}", self.next_about);
        self.next_about += 1;
        id
    }

    /// Makes sure later [`Self::new_about_id`] calls do not collide with an
    /// identifier already present in the tree.
    pub fn reserve_about_id(&mut self, about: &str) {
        if let Some(n) = about.strip_prefix("#mwt").and_then(|n| n.parse::<u32>().ok()) {
            self.next_about = self.next_about.max(n + 1);
        }
    }

    // ---- node inspection ----

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.rec(id).kind
    }

    pub fn is_freed(&self, id: NodeId) -> bool {
        self.rec(id).freed
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.rec(id).kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.rec_mut(id).kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.name.as_str())
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn is_element_named(&self, id: NodeId, name: &str) -> bool {
        self.node_name(id) == Some(name)
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.rec(id).kind, NodeKind::Text(_))
    }

    pub fn is_comment(&self, id: NodeId) -> bool {
        matches!(self.rec(id).kind, NodeKind::Comment(_))
    }

    /// Character data of a text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.rec(id).kind {
            NodeKind::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Body of a comment node.
    pub fn comment(&self, id: NodeId) -> Option<&str> {
        match &self.rec(id).kind {
            NodeKind::Comment(s) => Some(s),
            _ => None,
        }
    }

    /// Replaces the character data of a text or comment node.
    pub fn set_text(&mut self, id: NodeId, value: impl Into<String>) {
        match &mut self.rec_mut(id).kind {
            NodeKind::Text(s) | NodeKind::Comment(s) => *s = value.into(),
            _ => debug_assert!(false, "set_text on non-character node {id}"),
        }
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.rec(id).kind {
            NodeKind::Text(s) => out.push_str(s),
            NodeKind::Comment(_) => {}
            NodeKind::Document | NodeKind::Element(_) => {
                for child in self.children(id) {
                    self.collect_text(child, out);
                }
            }
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attr(name)
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        if let Some(el) = self.element_mut(id) {
            el.set_attr(name, value);
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<String> {
        self.element_mut(id)?.remove_attr(name)
    }

    /// True if the `typeof` attribute lists `ty` as one of its tokens.
    pub fn has_type_of(&self, id: NodeId, ty: &str) -> bool {
        self.element(id).is_some_and(|el| el.has_token("typeof", ty))
    }

    pub fn add_type_of(&mut self, id: NodeId, ty: &str) {
        if let Some(el) = self.element_mut(id) {
            el.add_token("typeof", ty);
        }
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if let Some(el) = self.element_mut(id) {
            el.add_token("class", class);
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id).is_some_and(|el| el.has_token("class", class))
    }

    // ---- navigation ----

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.rec(id).parent
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.rec(id).first_child
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.rec(id).last_child
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.rec(id).next_sibling
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.rec(id).prev_sibling
    }

    pub fn has_children(&self, id: NodeId) -> bool {
        self.rec(id).first_child.is_some()
    }

    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            doc: self,
            next: self.rec(id).first_child,
        }
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).count()
    }

    /// Pre-order list of `id` and everything below it.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            let mut child = self.rec(node).last_child;
            while let Some(c) = child {
                stack.push(c);
                child = self.rec(c).prev_sibling;
            }
        }
        out
    }

    pub fn is_ancestor_of(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = self.rec(node).parent;
        while let Some(p) = cur {
            if p == ancestor {
                return true;
            }
            cur = self.rec(p).parent;
        }
        false
    }

    /// True if `id` can reach the document root through its parents.
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root() || self.is_ancestor_of(self.root(), id)
    }

    /// Nearest ancestor (excluding `id`) named `name`.
    pub fn ancestor_named(&self, id: NodeId, name: &str) -> Option<NodeId> {
        let mut cur = self.rec(id).parent;
        while let Some(p) = cur {
            if self.is_element_named(p, name) {
                return Some(p);
            }
            cur = self.rec(p).parent;
        }
        None
    }

    // ---- mutation ----

    fn check_container(&self, parent: NodeId) -> Result<(), DomError> {
        let rec = self.rec(parent);
        if rec.freed {
            return Err(DomError::FreedNode(parent));
        }
        match rec.kind {
            NodeKind::Document | NodeKind::Element(_) => Ok(()),
            _ => Err(DomError::NotAContainer(parent)),
        }
    }

    fn check_movable(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        if child == self.root() {
            return Err(DomError::RootNotMovable);
        }
        if self.rec(child).freed {
            return Err(DomError::FreedNode(child));
        }
        if child == parent || self.is_ancestor_of(child, parent) {
            return Err(DomError::WouldCycle { parent, child });
        }
        Ok(())
    }

    fn unlink(&mut self, id: NodeId) {
        let (parent, prev, next) = {
            let rec = self.rec(id);
            (rec.parent, rec.prev_sibling, rec.next_sibling)
        };
        match prev {
            Some(p) => self.rec_mut(p).next_sibling = next,
            None => {
                if let Some(par) = parent {
                    self.rec_mut(par).first_child = next;
                }
            }
        }
        match next {
            Some(n) => self.rec_mut(n).prev_sibling = prev,
            None => {
                if let Some(par) = parent {
                    self.rec_mut(par).last_child = prev;
                }
            }
        }
        let rec = self.rec_mut(id);
        rec.parent = None;
        rec.prev_sibling = None;
        rec.next_sibling = None;
    }

    /// Inserts `child` into `parent` before `reference`, or at the end when
    /// `reference` is `None`. The child is detached from its old position first.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        self.check_container(parent)?;
        self.check_movable(parent, child)?;
        if let Some(r) = reference {
            if self.rec(r).parent != Some(parent) {
                return Err(DomError::NotAChild { parent, child: r });
            }
            if r == child {
                return Ok(());
            }
        }
        self.unlink(child);
        let prev = match reference {
            Some(r) => self.rec(r).prev_sibling,
            None => self.rec(parent).last_child,
        };
        {
            let rec = self.rec_mut(child);
            rec.parent = Some(parent);
            rec.prev_sibling = prev;
            rec.next_sibling = reference;
        }
        match prev {
            Some(p) => self.rec_mut(p).next_sibling = Some(child),
            None => self.rec_mut(parent).first_child = Some(child),
        }
        match reference {
            Some(r) => self.rec_mut(r).prev_sibling = Some(child),
            None => self.rec_mut(parent).last_child = Some(child),
        }
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Inserts `child` right after `reference` in `reference`'s parent.
    pub fn insert_after(&mut self, reference: NodeId, child: NodeId) -> Result<(), DomError> {
        let parent = self.rec(reference).parent.ok_or(DomError::Detached(reference))?;
        let next = self.rec(reference).next_sibling;
        self.insert_before(parent, child, next)
    }

    /// Unlinks a node (and its subtree) from the tree, keeping its metadata.
    pub fn detach(&mut self, id: NodeId) {
        self.unlink(id);
    }

    /// Deletes a node and its subtree, dropping all of their metadata.
    pub fn remove(&mut self, id: NodeId) {
        if id == self.root() {
            debug_assert!(false, "attempted to remove the document root");
            return;
        }
        self.unlink(id);
        for node in self.descendants(id) {
            self.store.discard(node);
            let rec = self.rec_mut(node);
            rec.freed = true;
        }
    }

    /// Puts `new` where `old` is and deletes `old`.
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> Result<(), DomError> {
        let parent = self.rec(old).parent.ok_or(DomError::Detached(old))?;
        self.insert_before(parent, new, Some(old))?;
        self.remove(old);
        Ok(())
    }

    /// Moves every child of `from` into `to`, before `reference`.
    pub fn migrate_children(
        &mut self,
        from: NodeId,
        to: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        while let Some(child) = self.rec(from).first_child {
            self.insert_before(to, child, reference)?;
        }
        Ok(())
    }

    /// Replaces `id` by its children.
    pub fn unwrap(&mut self, id: NodeId) -> Result<(), DomError> {
        let parent = self.rec(id).parent.ok_or(DomError::Detached(id))?;
        self.migrate_children(id, parent, Some(id))?;
        self.remove(id);
        Ok(())
    }

    /// Coalesces adjacent text children of `id` and drops empty ones.
    pub fn normalize(&mut self, id: NodeId) {
        let mut child = self.rec(id).first_child;
        while let Some(c) = child {
            let next = self.rec(c).next_sibling;
            if let NodeKind::Text(s) = &self.rec(c).kind {
                if s.is_empty() {
                    self.remove(c);
                    child = next;
                    continue;
                }
                if let Some(n) = next {
                    if let NodeKind::Text(tail) = &self.rec(n).kind {
                        let tail = tail.clone();
                        if let NodeKind::Text(s) = &mut self.rec_mut(c).kind {
                            s.push_str(&tail);
                        }
                        self.remove(n);
                        continue;
                    }
                }
            }
            child = next;
        }
    }

    // ---- metadata ----

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut MetadataStore {
        &mut self.store
    }

    pub fn source(&self, id: NodeId) -> Option<&SourceRecord> {
        self.store.source(id)
    }

    pub fn source_mut(&mut self, id: NodeId) -> &mut SourceRecord {
        self.store.source_mut(id)
    }

    /// The node's `dsr` if both offsets are present.
    pub fn dsr(&self, id: NodeId) -> Option<Dsr> {
        self.store.source(id)?.valid_dsr()
    }

    pub fn is_literal_html(&self, id: NodeId) -> bool {
        self.store.source(id).is_some_and(SourceRecord::is_literal_html)
    }

    pub fn call(&self, id: NodeId) -> Option<&CallRecord> {
        self.store.call(id)
    }

    pub fn call_mut(&mut self, id: NodeId) -> &mut CallRecord {
        self.store.call_mut(id)
    }

    pub fn diff_marks(&self, id: NodeId) -> DiffMarks {
        self.store.diff(id)
    }

    pub fn mark(&mut self, id: NodeId, mark: DiffMark) {
        self.store.mark(id, mark);
    }

    /// Marks `id` and records the change on its ancestors: `children-changed`
    /// on the parent for insertions and deletions, `subtree-changed` further
    /// up until an ancestor that already carries it.
    pub fn add_diff_mark(&mut self, id: NodeId, mark: DiffMark) {
        if self.store.diff(id).contains(mark) {
            return;
        }
        self.store.mark(id, mark);
        let root = self.root();
        let mut parent = self.parent(id).filter(|p| *p != root);
        if let Some(p) = parent {
            if matches!(mark, DiffMark::Inserted | DiffMark::Deleted) {
                self.store.mark(p, DiffMark::ChildrenChanged);
            }
        }
        while let Some(p) = parent {
            if self.store.diff(p).contains(DiffMark::SubtreeChanged) {
                return;
            }
            self.store.mark(p, DiffMark::SubtreeChanged);
            parent = self.parent(p).filter(|p| *p != root);
        }
    }
}

pub struct Children<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let cur = self.next?;
        self.next = self.doc.rec(cur).next_sibling;
        Some(cur)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(doc: &Document, parent: NodeId) -> Vec<String> {
        doc.children(parent)
            .map(|c| match doc.kind(c) {
                NodeKind::Element(el) => el.name.clone(),
                NodeKind::Text(t) => format!("'{t}'"),
                NodeKind::Comment(t) => format!("<!--{t}-->"),
                NodeKind::Document => "#document".to_string(),
            })
            .collect()
    }

    #[test]
    fn splice_keeps_links_consistent() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = doc.create_element("a");
        let b = doc.create_element("b");
        let c = doc.create_element("c");
        doc.append_child(root, a).expect("append a");
        doc.append_child(root, c).expect("append c");
        doc.insert_before(root, b, Some(c)).expect("insert b");
        assert_eq!(names(&doc, root), ["a", "b", "c"]);
        assert_eq!(doc.prev_sibling(c), Some(b));
        assert_eq!(doc.next_sibling(a), Some(b));

        doc.insert_after(c, a).expect("move a to end");
        assert_eq!(names(&doc, root), ["b", "c", "a"]);
        assert_eq!(doc.first_child(root), Some(b));
        assert_eq!(doc.last_child(root), Some(a));
        assert_eq!(doc.prev_sibling(b), None);
    }

    #[test]
    fn insertion_rejects_cycles_and_foreign_references() {
        let mut doc = Document::new();
        let root = doc.root();
        let outer = doc.create_element("div");
        let inner = doc.create_element("span");
        doc.append_child(root, outer).expect("append outer");
        doc.append_child(outer, inner).expect("append inner");
        assert_eq!(
            doc.append_child(inner, outer),
            Err(DomError::WouldCycle {
                parent: inner,
                child: outer
            })
        );
        let stray = doc.create_text("x");
        assert_eq!(
            doc.insert_before(root, stray, Some(inner)),
            Err(DomError::NotAChild {
                parent: root,
                child: inner
            })
        );
        let text = doc.create_text("t");
        assert_eq!(doc.append_child(text, stray), Err(DomError::NotAContainer(text)));
    }

    #[test]
    fn remove_frees_subtree_and_metadata_but_detach_keeps_it() {
        let mut doc = Document::new();
        let root = doc.root();
        let p = doc.create_element("p");
        let t = doc.create_text("hi");
        doc.append_child(root, p).expect("append p");
        doc.append_child(p, t).expect("append text");
        doc.source_mut(p).fostered = true;

        doc.detach(p);
        assert!(!doc.is_attached(p));
        assert!(doc.source(p).is_some_and(|dp| dp.fostered));

        doc.append_child(root, p).expect("reattach");
        doc.remove(p);
        assert!(doc.is_freed(p));
        assert!(doc.is_freed(t));
        assert!(doc.source(p).is_none());
        assert_eq!(doc.append_child(root, p), Err(DomError::FreedNode(p)));
        assert!(!doc.has_children(root));
    }

    #[test]
    fn normalize_merges_text_runs() {
        let mut doc = Document::new();
        let root = doc.root();
        for s in ["a", "", "b"] {
            let t = doc.create_text(s);
            doc.append_child(root, t).expect("append");
        }
        let br = doc.create_element("br");
        doc.append_child(root, br).expect("append br");
        let t = doc.create_text("c");
        doc.append_child(root, t).expect("append c");
        doc.normalize(root);
        assert_eq!(names(&doc, root), ["'ab'", "br", "'c'"]);
    }

    #[test]
    fn unwrap_and_about_ids() {
        let mut doc = Document::new();
        let root = doc.root();
        let span = doc.create_element("span");
        doc.append_child(root, span).expect("append span");
        for s in ["x", "y"] {
            let t = doc.create_text(s);
            doc.append_child(span, t).expect("append");
        }
        doc.unwrap(span).expect("unwrap");
        assert_eq!(names(&doc, root), ["'x'", "'y'"]);

        doc.reserve_about_id("#mwt7");
        assert_eq!(doc.new_about_id(), "#mwt8");
        assert_eq!(doc.new_about_id(), "#mwt9");
    }

    #[test]
    fn diff_marks_propagate_to_ancestors() {
        let mut doc = Document::new();
        let root = doc.root();
        let ul = doc.create_element("ul");
        let li = doc.create_element("li");
        let b = doc.create_element("b");
        doc.append_child(root, ul).expect("append ul");
        doc.append_child(ul, li).expect("append li");
        doc.append_child(li, b).expect("append b");

        doc.add_diff_mark(b, DiffMark::Inserted);
        assert!(doc.diff_marks(b).contains(DiffMark::Inserted));
        assert!(doc.diff_marks(li).contains(DiffMark::ChildrenChanged));
        assert!(doc.diff_marks(li).contains(DiffMark::SubtreeChanged));
        assert!(doc.diff_marks(ul).contains(DiffMark::SubtreeChanged));
        assert!(!doc.diff_marks(ul).contains(DiffMark::ChildrenChanged));
        assert!(doc.diff_marks(root).is_empty());

        doc.add_diff_mark(li, DiffMark::Modified);
        assert!(doc.diff_marks(li).contains(DiffMark::Modified));
        assert!(!doc.diff_marks(ul).contains(DiffMark::ChildrenChanged));
    }
}
