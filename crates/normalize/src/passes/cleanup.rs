//! Final cleanup: strips marker metas, handles empty elements, trims
//! one-shot record fields and persists what is left.
//!
//! Wikitext headings, lists, list items and table cells also lose the
//! spaces and tabs on their first and last line, stepping over nodes that
//! render nothing.
use crate::cite::{REF_MARKER_TYPE, is_references_container};
use crate::config::NormalizeConfig;
use crate::context::PassContext;
use crate::lint::lint_ignored_table_attrs;
use dom::classify::{has_parsoid_about_id, is_rendering_transparent};
use dom::persist::{StoreOptions, store_node_data};
use dom::traverse::{DomTraverser, HandlerError, HandlerResult, Step, Visit};
use dom::{DomError, Document, NodeId};

/// Marker types that only matter while the tree is being built.
const BUILD_MARKERS: &[&str] = &["StartTag", "EndTag", "TSRMarker", "Transclusion"];
const STRIPPED_TAG_TYPE: &str = "mw:Placeholder/StrippedTag";

/// Wikitext tags whose end tag is never written out.
const NO_CLOSING_TAGS: &[&str] = &["pre", "li", "dt", "dd", "hr", "tr", "td", "th"];
const FLAGGED_EMPTY: &[&str] = &["li", "tr", "p"];
const TRIMMABLE_WS_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "ol", "li", "ul", "dd", "dl", "dt", "td", "th", "caption",
];

pub(crate) fn register<'a>(
    traverser: &mut DomTraverser<'static, PassContext<'a>>,
    config: &NormalizeConfig,
) {
    if config.lint_ignored_table_attrs {
        traverser.add_handler(Some("table"), "lint-ignored-table-attrs", lint_table);
    }
    traverser.add_handler(Some("meta"), "strip-marker-metas", strip_marker_metas);
    traverser.add_handler(None, "handle-empty-elements", handle_empty_elements);
    traverser.add_handler(None, "cleanup-and-store", cleanup_and_store);
}

fn lint_table(
    doc: &mut Document,
    node: NodeId,
    visit: &mut Visit<'_, PassContext<'_>>,
) -> HandlerResult {
    let lints = lint_ignored_table_attrs(doc, node, visit.scope.as_deref());
    visit.ctx.lints.extend(lints);
    Ok(Step::Continue)
}

/// `mw:<marker>` or `mw:<marker>/<anything>` for one of the build markers.
fn is_build_marker_token(token: &str) -> bool {
    let Some(rest) = token.strip_prefix("mw:") else {
        return false;
    };
    BUILD_MARKERS.iter().any(|marker| {
        rest.strip_prefix(marker)
            .is_some_and(|tail| tail.is_empty() || tail.starts_with('/'))
    })
}

/// At the top level every marker token counts, ref markers included.
/// Inside an expansion the whole `typeof` must be a single build marker.
fn is_strippable_marker(type_of: &str, at_top_level: bool) -> bool {
    if at_top_level {
        type_of
            .split_ascii_whitespace()
            .any(|t| t == REF_MARKER_TYPE || is_build_marker_token(t))
    } else {
        is_build_marker_token(type_of)
    }
}

fn strip_marker_metas(
    doc: &mut Document,
    node: NodeId,
    visit: &mut Visit<'_, PassContext<'_>>,
) -> HandlerResult {
    let Some(type_of) = doc.attr(node, "typeof") else {
        return Ok(Step::Continue);
    };
    let marker = is_strippable_marker(type_of, visit.at_top_level);
    let stripped_tag = !visit.ctx.config.rt_test_mode && doc.has_type_of(node, STRIPPED_TAG_TYPE);
    // Metas that picked up a transclusion type but carry call data stay.
    let keeps_call = doc.call(node).is_some_and(|c| !c.is_empty())
        && !doc.has_type_of(node, REF_MARKER_TYPE);
    if !(stripped_tag || (marker && !keeps_call)) {
        return Ok(Step::Continue);
    }
    let next = doc.next_sibling(node);
    doc.remove(node);
    log::trace!(target: "normalize.cleanup", "stripped marker meta {node}");
    Ok(Step::ResumeAt(next))
}

/// Only comments and whitespace.
fn is_empty_node(doc: &Document, node: NodeId) -> bool {
    doc.children(node).all(|c| {
        doc.is_comment(c)
            || doc
                .text(c)
                .is_some_and(|t| t.bytes().all(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n')))
    })
}

fn handle_empty_elements(
    doc: &mut Document,
    node: NodeId,
    visit: &mut Visit<'_, PassContext<'_>>,
) -> HandlerResult {
    let Some(name) = doc.node_name(node) else {
        return Ok(Step::Continue);
    };
    if !FLAGGED_EMPTY.contains(&name) || !is_empty_node(doc, node) {
        return Ok(Step::Continue);
    }
    let in_scope = visit.scope.is_some();
    let has_own_attrs = doc.element(node).is_some_and(|el| {
        el.attrs
            .iter()
            .any(|(attr, _)| !(in_scope && (attr == "about" || attr == "typeof")))
    });
    if has_own_attrs {
        return Ok(Step::Continue);
    }

    let first_of_scope = visit.scope.as_deref().is_some_and(|s| s.first == node);
    if in_scope && !first_of_scope {
        log::warn!(target: "normalize.cleanup", "removing empty <{name}> {node} from template output");
        let next = doc.next_sibling(node);
        doc.remove(node);
        return Ok(Step::ResumeAt(next));
    }
    if visit.ctx.config.mark_empty_elements {
        doc.add_class(node, "mw-empty-elt");
    }
    Ok(Step::Continue)
}

fn is_blank(text: &str) -> bool {
    text.bytes().all(|b| b == b' ' || b == b'\t')
}

/// Drops blank text at either end of `node` and strips spaces and tabs
/// from the text that ends the walk. Rendering-transparent nodes are
/// stepped over and kept.
fn trim_whitespace(doc: &mut Document, node: NodeId) {
    let mut cur = doc.first_child(node);
    while let Some(c) = cur {
        let next = doc.next_sibling(c);
        if doc.text(c).is_some_and(is_blank) {
            doc.remove(c);
        } else if !is_rendering_transparent(doc, c) {
            break;
        }
        cur = next;
    }
    if let Some(c) = cur {
        if let Some(text) = doc.text(c) {
            let trimmed = text.trim_start_matches([' ', '\t']).to_string();
            doc.set_text(c, trimmed);
        }
    }

    let mut cur = doc.last_child(node);
    while let Some(c) = cur {
        let prev = doc.prev_sibling(c);
        if doc.text(c).is_some_and(is_blank) {
            doc.remove(c);
        } else if !is_rendering_transparent(doc, c) {
            break;
        }
        cur = prev;
    }
    if let Some(c) = cur {
        if let Some(text) = doc.text(c) {
            let trimmed = text.trim_end_matches([' ', '\t']).to_string();
            doc.set_text(c, trimmed);
        }
    }
}

/// Inside rendered reference text, or a references list, records are the
/// only description left of the markup.
fn in_reference_text(doc: &Document, node: NodeId) -> bool {
    let mut cur = Some(node);
    while let Some(n) = cur {
        if doc.has_class(n, "mw-reference-text") || is_references_container(doc, n) {
            return true;
        }
        cur = doc.parent(n);
    }
    false
}

fn is_page_prop_meta(doc: &Document, node: NodeId) -> bool {
    doc.is_element_named(node, "meta")
        && doc
            .attr(node, "property")
            .is_some_and(|p| p.starts_with("mw:PageProp/"))
}

/// Both tags synthesized and nothing but whitespace inside.
fn is_auto_inserted_empty(doc: &Document, node: NodeId) -> bool {
    let synthetic = doc
        .source(node)
        .is_some_and(|dp| dp.auto_inserted_start && dp.auto_inserted_end && !dp.is_literal_html());
    synthetic
        && doc
            .children(node)
            .all(|c| doc.text(c).is_some_and(|t| t.trim().is_empty()))
}

fn cleanup_and_store(
    doc: &mut Document,
    node: NodeId,
    visit: &mut Visit<'_, PassContext<'_>>,
) -> HandlerResult {
    if !doc.is_element(node) {
        return Ok(Step::Continue);
    }
    let parent = doc.parent(node).ok_or(DomError::Detached(node))?;

    if is_auto_inserted_empty(doc, node) {
        let next = doc.next_sibling(node);
        doc.migrate_children(node, parent, Some(node))?;
        doc.remove(node);
        log::trace!(target: "normalize.cleanup", "dropped empty synthetic element {node}");
        return Ok(Step::ResumeAt(next));
    }

    let first_of_scope = visit.scope.as_deref().is_some_and(|s| s.first == node);
    let last_of_scope = visit.scope.as_deref().is_some_and(|s| s.last == node);
    let in_scope = visit.scope.is_some();
    let name = doc.node_name(node).unwrap_or_default().to_string();
    let has_call = doc.call(node).is_some_and(|c| !c.is_empty());
    let page_prop = is_page_prop_meta(doc, node);

    let dp = doc.source_mut(node);
    if dp.auto_inserted_end && !dp.is_literal_html() && NO_CLOSING_TAGS.contains(&name.as_str()) {
        dp.auto_inserted_end = false;
    }
    if has_call && dp.valid_dsr().is_some() && !page_prop {
        dp.src = None;
    } else if first_of_scope && (!visit.at_top_level || dp.tsr.is_none()) {
        dp.src = None;
    }
    dp.clear_scratch();
    if dp.dsr.is_some_and(|d| d.start.is_none() && d.end.is_none()) {
        dp.dsr = None;
    }
    if dp.fostered && !first_of_scope {
        if let Some(dsr) = dp.dsr.as_mut() {
            dsr.start = dsr.end;
        }
    }
    let has_stx = dp.stx.is_some();

    if !visit.at_top_level {
        return Ok(Step::Continue);
    }

    if in_scope && !has_parsoid_about_id(doc, node) && doc.has_type_of(node, "mw:Nowiki") {
        let resume = doc.first_child(node).or(doc.next_sibling(node));
        doc.migrate_children(node, parent, Some(node))?;
        doc.remove(node);
        return Ok(Step::ResumeAt(resume));
    }

    if !doc.is_literal_html(node) && TRIMMABLE_WS_TAGS.contains(&name.as_str()) {
        trim_whitespace(doc, node);
    }

    let discard = visit.ctx.config.discard_data_parsoid
        || (in_scope
            && !first_of_scope
            && !in_reference_text(doc, node)
            && (!has_stx || !last_of_scope));
    let options = StoreOptions {
        discard_data_parsoid: discard,
        page_bundle: visit.ctx.page_bundle.is_some(),
    };
    store_node_data(doc, node, options, visit.ctx.page_bundle.as_mut())
        .map_err(|err| HandlerError::Invariant(err.to_string()))?;
    Ok(Step::Continue)
}
