//! Reference extraction: numbers `<ref>` markers and renders their
//! containers through the context's [`CitationState`].
//!
//! [`CitationState`]: crate::cite::CitationState
use crate::cite::{is_ref_marker, is_references_container};
use crate::context::PassContext;
use dom::traverse::{DomTraverser, HandlerResult, Step, Visit};
use dom::{Document, NodeId};

pub(crate) fn register<'a>(traverser: &mut DomTraverser<'static, PassContext<'a>>) {
    traverser.add_handler(None, "extract-refs", extract_refs);
}

fn extract_refs(
    doc: &mut Document,
    node: NodeId,
    visit: &mut Visit<'_, PassContext<'_>>,
) -> HandlerResult {
    // Nested pipelines see refs only as part of their enclosing top-level
    // document.
    if !visit.at_top_level || !doc.is_element(node) {
        return Ok(Step::Continue);
    }
    if is_ref_marker(doc, node) {
        let citation = visit.ctx.citations.extract_ref_from_node(doc, node)?;
        return Ok(Step::ResumeAt(doc.next_sibling(citation)));
    }
    if is_references_container(doc, node) {
        let rendered = visit.ctx.citations.insert_references_into_dom(doc, node)?;
        return Ok(Step::ResumeAt(doc.next_sibling(rendered)));
    }
    Ok(Step::Continue)
}
