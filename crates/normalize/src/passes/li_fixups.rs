//! List item fixups: the "LI hack" and trailing category migration.
//!
//! `* <li class="x">foo` parses to a synthetic empty `li` followed by the
//! literal one. The synthetic item is dropped and its source text kept on
//! the survivor so the list marker can be regenerated.
//!
//! Category links at the very end of a page's last list item belong after
//! the list; they are moved there and every list on the rightmost path gives
//! up the moved width.
use crate::context::PassContext;
use dom::classify::{
    is_category_link, is_essentially_empty, is_list, is_list_item, last_non_separator_child,
};
use dom::scope::find_first_encapsulation_wrapper;
use dom::traverse::{DomTraverser, HandlerError, HandlerResult, Step, Visit};
use dom::{Document, DomError, Dsr, NodeId};
use serde_json::Value;
use tools::comment::decoded_comment_length;
use tools::text::split_trailing_whitespace;

pub(crate) fn register<'a>(traverser: &mut DomTraverser<'static, PassContext<'a>>) {
    traverser.add_handler(Some("li"), "li-hack", handle_li_hack);
    traverser.add_handler(Some("li"), "migrate-trailing-categories", migrate_trailing_categories);
}

fn handle_li_hack(
    doc: &mut Document,
    node: NodeId,
    visit: &mut Visit<'_, PassContext<'_>>,
) -> HandlerResult {
    let Some(prev) = doc.prev_sibling(node) else {
        return Ok(Step::Continue);
    };
    let applies = doc.is_literal_html(node)
        && doc.is_element_named(prev, "li")
        && !doc.is_literal_html(prev)
        && is_essentially_empty(doc, prev);
    if !applies {
        return Ok(Step::Continue);
    }
    let prev_dsr = doc.dsr(prev);
    let Some(src) = prev_dsr
        .and_then(|d| Some((d.start?, d.end?)))
        .and_then(|(start, end)| visit.ctx.source_slice(start, end))
    else {
        log::debug!(target: "normalize.li", "no source for synthetic item {prev}; keeping it");
        return Ok(Step::Continue);
    };

    if doc.has_type_of(node, "mw:Transclusion") {
        if let Some(parts) = doc.call_mut(node).parts_mut() {
            parts.insert(0, Value::from(src));
        }
    } else {
        doc.source_mut(node).li_hack_src = Some(src.to_string());
    }

    if let (Some(node_dsr), Some(prev_dsr)) = (doc.dsr(node), prev_dsr) {
        let widened = Dsr {
            start: prev_dsr.start,
            end: node_dsr.end,
            open_width: node_dsr
                .open_width
                .zip(prev_dsr.width())
                .map(|(open, prev_width)| open + prev_width),
            close_width: node_dsr.close_width,
        };
        doc.source_mut(node).dsr = Some(widened);
    }
    doc.remove(prev);
    Ok(Step::Continue)
}

/// Whether everything from `c` back to its encapsulation wrapper can move
/// along with it.
fn migration_info(doc: &Document, c: NodeId) -> (Option<NodeId>, bool) {
    let Some(tpl_root) = find_first_encapsulation_wrapper(doc, c) else {
        return (None, true);
    };
    let stop = doc.prev_sibling(tpl_root);
    let mut cur = Some(c);
    while let Some(n) = cur.filter(|n| Some(*n) != stop) {
        let blank_span = doc.is_element_named(n, "span") && doc.text_content(n).trim().is_empty();
        if !is_category_link(doc, n) && !blank_span {
            return (Some(tpl_root), false);
        }
        cur = doc.prev_sibling(n);
    }
    (Some(tpl_root), true)
}

/// The leftmost node of the trailing run to move, if the run starts at a
/// newline or comment.
fn find_last_migratable_node(doc: &Document, li: NodeId) -> Option<NodeId> {
    let mut sentinel = None;
    let mut cur = last_non_separator_child(doc, li);
    while let Some(mut c) = cur {
        let (tpl_root, migratable) = migration_info(doc, c);
        if !migratable {
            break;
        }
        if let Some(root) = tpl_root {
            c = root;
        }
        if let Some(text) = doc.text(c) {
            let (body, tail) = split_trailing_whitespace(text);
            if tail.contains('\n') {
                sentinel = Some(c);
            }
            if !body.is_empty() {
                break;
            }
        } else if doc.is_comment(c) {
            sentinel = Some(c);
        } else if !is_category_link(doc, c) {
            break;
        }
        cur = doc.prev_sibling(c);
    }
    sentinel
}

fn migrate_trailing_categories(
    doc: &mut Document,
    li: NodeId,
    visit: &mut Visit<'_, PassContext<'_>>,
) -> HandlerResult {
    if visit.scope.is_some() {
        return Ok(Step::Continue);
    }
    let Some(parent) = doc.parent(li) else {
        return Ok(Step::Continue);
    };
    let ends_with_category =
        last_non_separator_child(doc, li).is_some_and(|c| is_category_link(doc, c));
    if doc.next_sibling(li).is_some() || !is_list(doc, parent) || !ends_with_category {
        return Ok(Step::Continue);
    }

    let mut outer_list = parent;
    loop {
        let Some(item) = doc.parent(outer_list).filter(|p| is_list_item(doc, *p)) else {
            break;
        };
        if doc.next_sibling(item).is_some() {
            return Ok(Step::Continue);
        }
        outer_list = doc.parent(item).ok_or(DomError::Detached(item))?;
    }

    let Some(sentinel) = find_last_migratable_node(doc, li) else {
        return Ok(Step::Continue);
    };

    let li_dsr = doc.dsr(li);
    let after = outer_list;
    let list_parent = doc.parent(outer_list).ok_or(DomError::Detached(outer_list))?;
    let mut new_end: Option<usize> = None;
    loop {
        let c = doc
            .last_child(li)
            .ok_or_else(|| HandlerError::Invariant(format!("ran out of children in {li}")))?;
        let insert_at = doc.next_sibling(after);
        if doc.is_element(c) {
            new_end = doc.dsr(c).and_then(|d| d.start);
            doc.insert_before(list_parent, c, insert_at)?;
        } else if let Some(text) = doc.text(c).map(str::to_string) {
            let (body, tail) = split_trailing_whitespace(&text);
            if body.is_empty() {
                new_end = new_end.and_then(|e| e.checked_sub(text.len()));
                doc.insert_before(list_parent, c, insert_at)?;
            } else {
                let tail_len = tail.len();
                let moved = doc.create_text(tail);
                let kept = body.to_string();
                doc.set_text(c, kept);
                doc.insert_before(list_parent, moved, insert_at)?;
                new_end = new_end.and_then(|e| e.checked_sub(tail_len));
            }
        } else if let Some(body) = doc.comment(c).map(str::to_string) {
            new_end = new_end.and_then(|e| e.checked_sub(decoded_comment_length(&body)));
            doc.insert_before(list_parent, c, insert_at)?;
        }
        if c == sentinel {
            break;
        }
    }

    let delta = match (li_dsr.and_then(|d| d.end), new_end) {
        (Some(end), Some(new_end)) if end > new_end => end - new_end,
        _ => return Ok(Step::Continue),
    };

    // Shrink every item and list on the path from `li` up to `outer_list`.
    let mut item = li;
    loop {
        let list = doc.parent(item).ok_or(DomError::Detached(item))?;
        shrink_end(doc, item, delta);
        shrink_end(doc, list, delta);
        if list == outer_list {
            break;
        }
        item = doc.parent(list).ok_or(DomError::Detached(list))?;
    }
    log::debug!(target: "normalize.li", "moved trailing categories out of {outer_list}");
    Ok(Step::Continue)
}

fn shrink_end(doc: &mut Document, node: NodeId, delta: usize) {
    if let Some(dsr) = doc.source_mut(node).dsr.as_mut() {
        dsr.end = dsr.end.and_then(|e| e.checked_sub(delta));
    }
}
