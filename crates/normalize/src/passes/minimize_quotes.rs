//! Quote tag minimization.
//!
//! `''`/`'''` produce `i`/`b` runs that are not minimal, for example
//! `<i>A</i><b><i>X</i></b><b><i>Y</i></b><i>Z</i>`. Adjacent equal tags are
//! merged, and a tag whose sole child matches its neighbour is swapped with
//! that child so the merge can happen: the example becomes
//! `<i>A<b>XY</b>Z</i>`.
//!
//! Every merge or swap marks the touched nodes `children-changed` and the
//! relocated ones `moved`; a merged-away node that was inserted or modified
//! passes that on to the survivor as `modified`. Template output is never
//! merged or entered.
use crate::context::PassContext;
use dom::classify::{QUOTE_TAGS, has_parsoid_about_id, is_first_encapsulation_wrapper};
use dom::traverse::{DomTraverser, HandlerError, HandlerResult, Step, Visit};
use dom::{DiffMark, Document, DomError, NodeId};

pub(crate) fn register<'a>(traverser: &mut DomTraverser<'static, PassContext<'a>>) {
    traverser.add_handler(None, "minimize-quotes", minimize_subtree);
}

fn minimize_subtree(
    doc: &mut Document,
    node: NodeId,
    _visit: &mut Visit<'_, PassContext<'_>>,
) -> HandlerResult {
    minimize(doc, node)?;
    Ok(Step::ResumeAt(doc.next_sibling(node)))
}

fn is_quote(doc: &Document, node: NodeId) -> bool {
    doc.node_name(node).is_some_and(|n| QUOTE_TAGS.contains(&n))
}

fn is_encapsulated(doc: &Document, node: NodeId) -> bool {
    is_first_encapsulation_wrapper(doc, node) || has_parsoid_about_id(doc, node)
}

fn sorted_attrs(doc: &Document, node: NodeId) -> Vec<(String, String)> {
    let mut attrs = doc
        .element(node)
        .map(|el| el.attrs.clone())
        .unwrap_or_default();
    attrs.sort();
    attrs
}

/// Same tag, same surface syntax, and for literal HTML the same attributes.
fn similar(doc: &Document, a: NodeId, b: NodeId) -> bool {
    if doc.node_name(a) != doc.node_name(b) {
        return false;
    }
    let html = doc.is_literal_html(a);
    if html != doc.is_literal_html(b) {
        return false;
    }
    !html || sorted_attrs(doc, a) == sorted_attrs(doc, b)
}

fn mergeable(doc: &Document, a: NodeId, b: NodeId) -> bool {
    is_quote(doc, a) && !is_encapsulated(doc, a) && !is_encapsulated(doc, b) && similar(doc, a, b)
}

/// `a`'s only child, when it is a quote that could merge with `b`.
fn swappable_child(doc: &Document, a: NodeId, b: NodeId) -> Option<NodeId> {
    if !is_quote(doc, a) || is_encapsulated(doc, a) || doc.child_count(a) != 1 {
        return None;
    }
    let child = doc.first_child(a)?;
    mergeable(doc, child, b).then_some(child)
}

/// Appends `b`'s children to `a` and deletes `b`. Inserted or modified
/// content in `b` leaves `a` modified.
fn merge(doc: &mut Document, a: NodeId, b: NodeId) -> Result<(), HandlerError> {
    let sentinel = doc.first_child(b);
    let carried = doc.diff_marks(b);
    doc.migrate_children(b, a, None)?;
    doc.remove(b);
    doc.normalize(a);
    if let Some(moved) = sentinel.filter(|n| !doc.is_freed(*n) && doc.parent(*n) == Some(a)) {
        doc.mark(moved, DiffMark::Moved);
    }
    doc.mark(a, DiffMark::ChildrenChanged);
    if carried.contains(DiffMark::Inserted) || carried.contains(DiffMark::Modified) {
        doc.add_diff_mark(a, DiffMark::Modified);
    }
    if let Some(next) = doc.next_sibling(a) {
        doc.mark(next, DiffMark::Moved);
    }
    if let Some(parent) = doc.parent(a).filter(|p| *p != doc.root()) {
        doc.add_diff_mark(parent, DiffMark::ChildrenChanged);
    }
    Ok(())
}

/// Turns `outer(inner(...))` into `inner(outer(...))`; returns the new
/// outer node.
fn swap(doc: &mut Document, outer: NodeId) -> Result<NodeId, HandlerError> {
    let inner = doc
        .first_child(outer)
        .ok_or_else(|| HandlerError::Invariant(format!("{outer} has no child to swap")))?;
    let parent = doc.parent(outer).ok_or(DomError::Detached(outer))?;
    doc.migrate_children(inner, outer, None)?;
    doc.insert_before(parent, inner, Some(outer))?;
    doc.append_child(inner, outer)?;
    if let Some(first) = doc.first_child(outer) {
        doc.mark(first, DiffMark::Moved);
    }
    for node in [outer, inner] {
        doc.mark(node, DiffMark::Moved);
        doc.mark(node, DiffMark::ChildrenChanged);
    }
    if parent != doc.root() {
        doc.add_diff_mark(parent, DiffMark::ChildrenChanged);
    }
    Ok(inner)
}

/// Minimizes every sibling run below `root`, deepest runs first.
fn minimize(doc: &mut Document, root: NodeId) -> Result<(), HandlerError> {
    let mut stack = vec![(root, false)];
    while let Some((node, expanded)) = stack.pop() {
        if expanded {
            minimize_children(doc, node)?;
            continue;
        }
        stack.push((node, true));
        for child in doc.children(node) {
            if doc.is_element(child) && !is_encapsulated(doc, child) {
                stack.push((child, false));
            }
        }
    }
    Ok(())
}

/// Merges and swaps across `parent`'s children until no pair changes. A
/// node that absorbed another is re-minimized and then compared with its new
/// neighbour.
fn minimize_children(doc: &mut Document, parent: NodeId) -> Result<(), HandlerError> {
    let mut cur = doc.first_child(parent);
    while let Some(a) = cur {
        let Some(b) = doc.next_sibling(a) else {
            break;
        };
        if mergeable(doc, a, b) {
            merge(doc, a, b)?;
            minimize(doc, a)?;
            continue;
        }
        if let Some(child) = swappable_child(doc, a, b) {
            debug_assert!(doc.parent(child) == Some(a));
            let outer = swap(doc, a)?;
            merge(doc, outer, b)?;
            minimize(doc, outer)?;
            cur = Some(outer);
            continue;
        }
        if swappable_child(doc, b, a).is_some() {
            let outer = swap(doc, b)?;
            merge(doc, a, outer)?;
            minimize(doc, a)?;
            continue;
        }
        cur = Some(b);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::passes::Pass;
    use crate::passes::test_util::{run_pass, run_pass_on, tree};
    use dom::{DiffMark, parse_document};

    #[test]
    fn bold_italic_runs_collapse() {
        let (doc, report) = run_pass(
            Pass::MinimizeQuotes,
            "<p><i>A</i><b><i>X</i></b><b><i>Y</i></b><i>Z</i></p>",
        );
        assert!(report.is_clean());
        assert_eq!(tree(&doc), "<p><i>A<b>XY</b>Z</i></p>");
        let i = doc
            .first_child(doc.first_child(doc.root()).expect("p"))
            .expect("i");
        assert!(doc.diff_marks(i).contains(DiffMark::ChildrenChanged));
    }

    #[test]
    fn adjacent_equal_tags_merge_and_coalesce_text() {
        let (doc, _) = run_pass(Pass::MinimizeQuotes, "<b>a</b><b>b</b><b>c</b>");
        assert_eq!(tree(&doc), "<b>abc</b>");
        let b = doc.first_child(doc.root()).expect("b");
        assert_eq!(doc.child_count(b), 1);
    }

    #[test]
    fn literal_html_only_merges_with_equal_attributes() {
        let html = "<b data-parsoid='{\"stx\":\"html\"}' class=\"x\">a</b><b data-parsoid='{\"stx\":\"html\"}' class=\"y\">b</b>";
        let (doc, _) = run_pass(Pass::MinimizeQuotes, html);
        assert_eq!(tree(&doc), "<b class=\"x\">a</b><b class=\"y\">b</b>");

        let mixed = "<b data-parsoid='{\"stx\":\"html\"}'>a</b><b>b</b>";
        let (doc, _) = run_pass(Pass::MinimizeQuotes, mixed);
        assert_eq!(tree(&doc), "<b>a</b><b>b</b>");
    }

    #[test]
    fn template_output_is_left_alone() {
        let html = "<i about=\"#mwt1\" typeof=\"mw:Transclusion\">a</i><i>b</i><span><b><i>x</i></b></span>";
        let (doc, _) = run_pass(Pass::MinimizeQuotes, html);
        assert_eq!(tree(&doc), html);
    }

    #[test]
    fn merging_keeps_the_edit_marks_of_the_absorbed_node() {
        let mut doc = parse_document("<p><b>old</b><b>new</b></p>").expect("fixture");
        let p = doc.first_child(doc.root()).expect("p");
        let fresh = doc.last_child(p).expect("second b");
        doc.mark(fresh, DiffMark::Inserted);
        let report = run_pass_on(Pass::MinimizeQuotes, &mut doc);
        assert!(report.is_clean());
        assert_eq!(tree(&doc), "<p><b>oldnew</b></p>");
        let b = doc.first_child(p).expect("merged b");
        let marks = doc.diff_marks(b);
        assert!(marks.contains(DiffMark::Modified));
        assert!(marks.contains(DiffMark::ChildrenChanged));
        assert!(doc.diff_marks(p).contains(DiffMark::ChildrenChanged));
        assert!(doc.diff_marks(p).contains(DiffMark::SubtreeChanged));
    }

    #[test]
    fn unmarked_merges_do_not_claim_modifications() {
        let (doc, _) = run_pass(Pass::MinimizeQuotes, "<p><b>a</b><b>b</b></p>");
        let p = doc.first_child(doc.root()).expect("p");
        let b = doc.first_child(p).expect("b");
        assert!(!doc.diff_marks(b).contains(DiffMark::Modified));
        assert!(doc.diff_marks(b).contains(DiffMark::ChildrenChanged));
    }

    #[test]
    fn minimization_is_stable() {
        let (once, _) = run_pass(Pass::MinimizeQuotes, "<i>A</i><b><i>X</i></b><i>Z</i>");
        let html = tree(&once);
        let (twice, _) = run_pass(Pass::MinimizeQuotes, &html);
        assert_eq!(tree(&twice), html);
    }
}
