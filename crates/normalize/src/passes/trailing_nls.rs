//! Trailing newline migration.
//!
//! Newlines (and comments between them) at the end of a line-ending
//! construct move to just after it, so the separator before the next sibling
//! is emitted once. Zero-width synthetic nodes at the end do not stop the
//! migration; they keep their place at the end and shift back by the moved
//! width.
//!
//! Children are handled before their parent and right to left, so a table
//! is fixed up before the content fostered out of it. When the source
//! element or the moved nodes carry diff marks, the moved nodes are marked
//! `moved` and both the element and its parent `children-changed`.
use crate::context::PassContext;
use dom::classify::{is_marker_meta, is_zero_width_subtree};
use dom::traverse::{DomTraverser, HandlerError, HandlerResult, Step, Visit};
use dom::{DiffMark, Document, NodeId, NodeKind};
use tools::comment::decoded_comment_length;
use tools::text::{is_wikitext_whitespace, split_trailing_newlines};

/// Tags that end a line in wikitext, or whose implicit end tag can leak
/// newlines into one that does.
const MIGRATE_FROM: &[&str] = &[
    "pre", "th", "td", "tr", "li", "dd", "ol", "ul", "dl", "caption", "p",
];

pub(crate) fn register<'a>(traverser: &mut DomTraverser<'static, PassContext<'a>>) {
    traverser.add_handler(None, "migrate-trailing-nls", migrate_subtree);
}

/// Handles the whole subtree of the first node visited and moves past it.
fn migrate_subtree(
    doc: &mut Document,
    node: NodeId,
    _visit: &mut Visit<'_, PassContext<'_>>,
) -> HandlerResult {
    migrate_trailing_nls(doc, node)?;
    Ok(Step::ResumeAt(doc.next_sibling(node)))
}

fn table_parent(doc: &Document, node: NodeId) -> Option<NodeId> {
    let mut n = node;
    if matches!(doc.node_name(n), Some("td" | "th")) {
        n = doc.parent(n)?;
    }
    if doc.is_element_named(n, "tr") {
        n = doc.parent(n)?;
    }
    if matches!(doc.node_name(n), Some("tbody" | "thead" | "tfoot" | "caption")) {
        n = doc.parent(n)?;
    }
    doc.is_element_named(n, "table").then_some(n)
}

fn ends_line_in_wikitext(doc: &Document, node: NodeId) -> bool {
    doc.node_name(node)
        .is_some_and(|name| MIGRATE_FROM.contains(&name))
        && !doc.is_literal_html(node)
}

/// A newline can leave `node` when the node ends a line in wikitext, when
/// its end tag was synthesized, or when it is the last child of a node that
/// qualifies. Nothing leaves a table whose content was fostered.
fn can_migrate_out_of(doc: &Document, node: Option<NodeId>) -> bool {
    let Some(node) = node else {
        return false;
    };
    if !doc.is_element(node) || doc.is_element_named(node, "table") {
        return false;
    }
    if let Some(table) = table_parent(doc, node) {
        let fostered_before = doc
            .prev_sibling(table)
            .filter(|p| doc.is_element(*p))
            .and_then(|p| doc.source(p))
            .is_some_and(|dp| dp.fostered);
        if fostered_before {
            return false;
        }
    }
    let dp = doc.source(node);
    if dp.is_some_and(|dp| dp.fostered) {
        return false;
    }
    ends_line_in_wikitext(doc, node)
        || dp.is_some_and(|dp| dp.auto_inserted_end)
        || (doc.next_sibling(node).is_none() && can_migrate_out_of(doc, doc.parent(node)))
}

fn migrate_trailing_nls(doc: &mut Document, elt: NodeId) -> Result<(), HandlerError> {
    if !matches!(doc.kind(elt), NodeKind::Element(_) | NodeKind::Document) {
        return Ok(());
    }
    let mut child = doc.last_child(elt);
    while let Some(c) = child {
        let prev = doc.prev_sibling(c);
        migrate_trailing_nls(doc, c)?;
        child = prev;
    }
    if can_migrate_out_of(doc, Some(elt)) {
        migrate_out_of(doc, elt)?;
    }
    Ok(())
}

fn migrate_out_of(doc: &mut Document, elt: NodeId) -> Result<(), HandlerError> {
    let mut barrier = None;
    let mut n = doc.last_child(elt);
    while let Some(c) = n.filter(|c| is_zero_width_subtree(doc, *c)) {
        barrier = Some(c);
        n = doc.prev_sibling(c);
    }

    // Find the comment/newline run preceded by real content.
    let mut first_to_migrate = None;
    let mut partial = false;
    let mut found_nl = false;
    let mut correction = 0usize;
    while let Some(c) = n {
        if let Some(body) = doc.comment(c) {
            first_to_migrate = Some(c);
            correction += decoded_comment_length(body);
        } else if let Some(text) = doc.text(c) {
            if is_wikitext_whitespace(text) && text.contains('\n') {
                found_nl = true;
                first_to_migrate = Some(c);
                partial = false;
                correction += text.len();
            } else if text.ends_with('\n') {
                found_nl = true;
                first_to_migrate = Some(c);
                partial = true;
                correction += split_trailing_newlines(text).1.len();
                break;
            } else {
                break;
            }
        } else {
            break;
        }
        n = doc.prev_sibling(c);
    }

    let (Some(first), true) = (first_to_migrate, found_nl) else {
        return Ok(());
    };
    let Some(parent) = doc.parent(elt) else {
        return Ok(());
    };

    // An end-tag marker carries the range of the tag it closes; keep them
    // adjacent.
    let mut insert_at = doc.next_sibling(elt);
    if let Some(meta) = insert_at {
        let elt_name = doc.node_name(elt).unwrap_or_default();
        if is_marker_meta(doc, meta, "mw:EndTag") && doc.attr(meta, "data-etag") == Some(elt_name) {
            insert_at = doc.next_sibling(meta);
        }
    }

    let mut moved = Vec::new();
    let mut cur = Some(first);
    while let Some(c) = cur.filter(|c| Some(*c) != barrier) {
        let next = doc.next_sibling(c);
        let moving = if partial {
            partial = false;
            let text = doc.text(c).unwrap_or_default().to_string();
            let (kept, newlines) = split_trailing_newlines(&text);
            let moved = doc.create_text(newlines);
            doc.set_text(c, kept);
            moved
        } else {
            c
        };
        doc.insert_before(parent, moving, insert_at)?;
        moved.push(moving);
        cur = next;
    }

    let edited = !doc.diff_marks(elt).is_empty()
        || moved.iter().any(|m| !doc.diff_marks(*m).is_empty());
    if edited {
        for m in &moved {
            doc.mark(*m, DiffMark::Moved);
        }
        doc.add_diff_mark(elt, DiffMark::ChildrenChanged);
        if parent != doc.root() {
            doc.add_diff_mark(parent, DiffMark::ChildrenChanged);
        }
    }

    adjust_offsets(doc, elt, barrier, insert_at, correction);
    log::trace!(target: "normalize.nls", "moved {correction} byte(s) out of {elt}");
    Ok(())
}

/// Shrinks `elt`'s end by the moved width, grows the following element back
/// over it, and shifts the zero-width barrier run.
fn adjust_offsets(
    doc: &mut Document,
    elt: NodeId,
    barrier: Option<NodeId>,
    insert_at: Option<NodeId>,
    correction: usize,
) {
    let delta = -(correction as isize);
    let old_end = doc.dsr(elt).and_then(|d| d.end);
    if let Some(dsr) = doc.source_mut(elt).dsr.as_mut() {
        if let Some(end) = dsr.end {
            dsr.end = Some(end.saturating_sub(correction).max(dsr.start.unwrap_or(0)));
        }
    }
    if let (Some(next), Some(old_end)) = (insert_at.filter(|n| doc.is_element(*n)), old_end) {
        if let Some(dsr) = doc.source_mut(next).dsr.as_mut() {
            if dsr.start == Some(old_end) {
                dsr.start = Some(old_end.saturating_sub(correction));
            }
        }
    }
    let mut n = barrier;
    while let Some(b) = n {
        let dp = doc.source_mut(b);
        if let Some(tsr) = dp.tsr.as_mut() {
            tsr.shift(delta);
        }
        if let Some(dsr) = dp.dsr.as_mut() {
            if dsr.is_valid() {
                dsr.shift(delta);
            }
        }
        n = doc.next_sibling(b);
    }
}
