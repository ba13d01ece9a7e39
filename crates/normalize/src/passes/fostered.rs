//! Fostered content marking.
//!
//! The tree builder leaves a `table typeof="mw:FosterBox"` where content was
//! foster-parented out of a table. Everything between the box and its table
//! was fostered: inline runs are collected into a holder (`p`, or `span`
//! inside a paragraph), block content is flagged in place. When any of it
//! came from a transclusion, the region gets synthetic transclusion markers
//! so the encapsulation unit can still be found.
use crate::context::PassContext;
use dom::classify::{is_encapsulated_top_level, is_marker_meta, is_tpl_start_marker_meta};
use dom::traverse::{DomTraverser, HandlerError, HandlerResult, Step, Visit};
use dom::{Document, DomError, NodeId, SourceRecord};
use serde_json::Value;

pub const FOSTER_BOX_TYPE: &str = "mw:FosterBox";
pub const TRANSCLUSION_SHADOW_TYPE: &str = "mw:TransclusionShadow";
pub(crate) const HANDLER_NAME: &str = "mark-fostered";

pub(crate) fn register<'a>(traverser: &mut DomTraverser<'static, PassContext<'a>>) {
    traverser.add_handler(Some("table"), HANDLER_NAME, mark_fostered);
    traverser.add_handler(Some("meta"), "remove-transclusion-shadow", remove_shadow_meta);
}

fn remove_shadow_meta(
    doc: &mut Document,
    node: NodeId,
    _visit: &mut Visit<'_, PassContext<'_>>,
) -> HandlerResult {
    if !is_marker_meta(doc, node, TRANSCLUSION_SHADOW_TYPE) {
        return Ok(Step::Continue);
    }
    let next = doc.next_sibling(node);
    doc.remove(node);
    Ok(Step::ResumeAt(next))
}

fn new_holder(doc: &mut Document, in_paragraph: bool) -> NodeId {
    let holder = doc.create_element(if in_paragraph { "span" } else { "p" });
    doc.store_mut().set_source(
        holder,
        SourceRecord {
            fostered: true,
            ..SourceRecord::default()
        },
    );
    holder
}

/// Drops shadow metas in `node`'s subtree. Returns whether the subtree held
/// transcluded content or shadows.
fn remove_transclusion_shadows(doc: &mut Document, node: NodeId) -> bool {
    if !doc.is_element(node) {
        return false;
    }
    if is_marker_meta(doc, node, TRANSCLUSION_SHADOW_TYPE) {
        doc.remove(node);
        return true;
    }
    let mut fostered_transclusions = doc
        .source(node)
        .is_some_and(|dp| dp.tmp.in_transclusion);
    let mut child = doc.first_child(node);
    while let Some(c) = child {
        let next = doc.next_sibling(c);
        if remove_transclusion_shadows(doc, c) {
            fostered_transclusions = true;
        }
        child = next;
    }
    fostered_transclusions
}

fn mark_fostered(
    doc: &mut Document,
    node: NodeId,
    visit: &mut Visit<'_, PassContext<'_>>,
) -> HandlerResult {
    if !doc.has_type_of(node, FOSTER_BOX_TYPE) {
        return Ok(Step::Continue);
    }
    let parent = doc.parent(node).ok_or(DomError::Detached(node))?;
    let in_paragraph =
        doc.is_element_named(parent, "p") || doc.ancestor_named(parent, "p").is_some();
    let classifier = visit.ctx.classifier;

    let mut table = doc.next_sibling(node);
    while let Some(t) = table {
        if doc.is_element_named(t, "table") {
            break;
        }
        table = doc.next_sibling(t);
    }
    let Some(table) = table else {
        return Err(HandlerError::Invariant(format!(
            "foster box {node} is not followed by its table"
        )));
    };

    let mut holder = new_holder(doc, in_paragraph);
    let mut fostered = Vec::new();
    let mut fostered_transclusions = false;
    let mut sibling = doc.next_sibling(node);
    while let Some(s) = sibling.filter(|s| *s != table) {
        fostered.push(s);
        let next = doc.next_sibling(s);
        if doc.is_element(s) {
            if classifier.is_block_node(doc, s) || classifier.is_sol_transparent(doc, s) {
                doc.source_mut(s).fostered = true;
                if doc.has_children(holder) {
                    doc.insert_before(parent, holder, Some(s))?;
                    holder = new_holder(doc, in_paragraph);
                }
            } else {
                doc.append_child(holder, s)?;
            }
            if remove_transclusion_shadows(doc, s) {
                fostered_transclusions = true;
            }
        } else {
            doc.append_child(holder, s)?;
        }
        sibling = next;
    }

    if doc.has_children(holder) {
        doc.insert_before(parent, holder, Some(table))?;
    } else {
        doc.remove(holder);
    }

    if fostered_transclusions {
        insert_transclusion_metas(doc, node, table)?;
    }

    // After the transclusion metas, so moved end annotations land inside them.
    let table_next = doc.next_sibling(table);
    fostered.retain(|n| !doc.is_freed(*n));
    if let Some(&first) = fostered.first() {
        for elem in fostered.clone() {
            move_fostered_annotations(doc, elem, first, parent, table_next)?;
        }
    }

    log::debug!(
        target: "normalize.fostered",
        "marked {} fostered node(s) before {table}",
        fostered.len()
    );
    doc.remove(node);
    Ok(Step::ResumeAt(Some(table)))
}

fn insert_transclusion_metas(
    doc: &mut Document,
    foster_box: NodeId,
    table: NodeId,
) -> Result<(), HandlerError> {
    let about = doc.new_about_id();
    let start = doc.create_element_with_attrs(
        "meta",
        &[
            ("about", about.as_str()),
            ("id", about.trim_start_matches('#')),
            ("typeof", "mw:Transclusion"),
        ],
    );
    let tsr = doc.source(table).and_then(|dp| dp.tsr);
    let record = doc.source_mut(start);
    record.tsr = tsr;
    record.tmp.from_foster = true;
    let box_parent = doc.parent(foster_box).ok_or(DomError::Detached(foster_box))?;
    doc.insert_before(box_parent, start, Some(foster_box))?;

    let end = doc.create_element_with_attrs(
        "meta",
        &[("about", about.as_str()), ("typeof", "mw:Transclusion/End")],
    );
    // Skip the table's own transclusions and shadows; trailing text and
    // comments stay after the end marker.
    let mut sibling = doc.next_sibling(table);
    let mut before_text = None;
    while let Some(s) = sibling {
        let skippable = !is_tpl_start_marker_meta(doc, s)
            && (is_encapsulated_top_level(doc, s)
                || is_marker_meta(doc, s, TRANSCLUSION_SHADOW_TYPE));
        if skippable {
            before_text = None;
        } else if doc.is_text(s) || doc.is_comment(s) {
            before_text.get_or_insert(s);
        } else {
            break;
        }
        sibling = doc.next_sibling(s);
    }
    let table_parent = doc.parent(table).ok_or(DomError::Detached(table))?;
    doc.insert_before(table_parent, end, before_text.or(sibling))?;
    Ok(())
}

fn annotation_type(doc: &Document, node: NodeId) -> Option<&str> {
    if !doc.is_element_named(node, "meta") {
        return None;
    }
    doc.attr(node, "typeof")?
        .split_ascii_whitespace()
        .find(|t| t.starts_with("mw:Annotation/"))
}

fn mark_moved(doc: &mut Document, node: NodeId) {
    doc.source_mut(node)
        .extra
        .insert("wasMoved".to_string(), Value::Bool(true));
}

/// Annotation ranges opened in fostered content now open before it; ranges
/// closed there now close after the table.
fn move_fostered_annotations(
    doc: &mut Document,
    node: NodeId,
    first_fostered: NodeId,
    table_parent: NodeId,
    table_next: Option<NodeId>,
) -> Result<(), HandlerError> {
    let is_end = annotation_type(doc, node).map(|ty| ty.ends_with("/End"));
    match is_end {
        Some(true) => {
            mark_moved(doc, node);
            doc.insert_before(table_parent, node, table_next)?;
        }
        Some(false) if node != first_fostered => {
            mark_moved(doc, node);
            let parent = doc
                .parent(first_fostered)
                .ok_or(DomError::Detached(first_fostered))?;
            doc.insert_before(parent, node, Some(first_fostered))?;
        }
        Some(false) => {}
        None => {
            if doc.is_element(node) {
                let children: Vec<NodeId> = doc.children(node).collect();
                for child in children {
                    move_fostered_annotations(doc, child, first_fostered, table_parent, table_next)?;
                }
            }
        }
    }
    Ok(())
}
