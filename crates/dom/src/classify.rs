//! Capability queries the passes ask about nodes.
//!
//! [`ContentClassifier`] is the seam for wiki-specific knowledge. Every
//! method has a default answer matching wikitext semantics, so
//! [`WikitextClassifier`] is an empty implementation.
use crate::{Document, NodeId};

const BLOCK_SCOPE_OPENERS: &[&str] = &[
    "p", "table", "tr", "ul", "ol", "li", "dl", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote",
    "pre",
];

const BLOCK_SCOPE_CLOSERS: &[&str] = &["td", "th"];

const BLOCK_TAGS: &[&str] = &[
    "div", "p", "table", "tbody", "thead", "tfoot", "caption", "tr", "td", "th", "ul", "ol", "li",
    "dl", "dt", "dd", "h1", "h2", "h3", "h4", "h5", "h6", "hgroup", "article", "aside", "nav",
    "section", "footer", "header", "figure", "figcaption", "fieldset", "details", "blockquote",
    "hr", "button", "canvas", "center", "col", "colgroup", "embed", "map", "object", "pre",
    "progress", "video",
];

/// `typeof` prefixes that open an encapsulation unit.
const ENCAPSULATION_TYPES: &[&str] = &[
    "mw:Transclusion",
    "mw:Param",
    "mw:LanguageVariant",
    "mw:Extension/",
];

pub const QUOTE_TAGS: &[&str] = &["i", "b"];

pub trait ContentClassifier {
    fn opens_block_scope(&self, name: &str) -> bool {
        BLOCK_SCOPE_OPENERS.contains(&name)
    }

    fn closes_block_scope(&self, name: &str) -> bool {
        BLOCK_SCOPE_CLOSERS.contains(&name)
    }

    fn is_block_tag(&self, name: &str) -> bool {
        BLOCK_TAGS.contains(&name)
    }

    fn is_block_node(&self, doc: &Document, node: NodeId) -> bool {
        doc.node_name(node).is_some_and(|name| self.is_block_tag(name))
    }

    fn is_category_link(&self, doc: &Document, node: NodeId) -> bool {
        is_category_link(doc, node)
    }

    fn is_first_encapsulation_wrapper(&self, doc: &Document, node: NodeId) -> bool {
        is_first_encapsulation_wrapper(doc, node)
    }

    fn is_marker_meta(&self, doc: &Document, node: NodeId, ty: &str) -> bool {
        is_marker_meta(doc, node, ty)
    }

    /// Nodes that render nothing at the start of a line (category links,
    /// page properties, include directives and comments).
    fn is_sol_transparent(&self, doc: &Document, node: NodeId) -> bool {
        if doc.is_comment(node) {
            return true;
        }
        match doc.node_name(node) {
            Some("link") => doc
                .attr(node, "rel")
                .is_some_and(|rel| rel.split_ascii_whitespace().any(|r| r.starts_with("mw:PageProp/"))),
            Some("meta") => doc.attr(node, "typeof").is_some_and(|ty| {
                ty.split_ascii_whitespace().any(|t| {
                    t.starts_with("mw:PageProp/")
                        || t.starts_with("mw:Includes/")
                        || t.starts_with("mw:Placeholder")
                })
            }) || doc
                .attr(node, "property")
                .is_some_and(|p| p.starts_with("mw:PageProp/")),
            _ => false,
        }
    }

    /// Contexts in which unwrapped indent-pre content gets a paragraph.
    fn wraps_inline_in_paragraph(&self, name: &str) -> bool {
        name == "blockquote"
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct WikitextClassifier;

impl ContentClassifier for WikitextClassifier {}

pub fn is_category_link(doc: &Document, node: NodeId) -> bool {
    doc.element(node)
        .is_some_and(|el| el.name == "link" && el.has_token("rel", "mw:PageProp/Category"))
}

/// An element carrying an encapsulation `typeof` and an `about` id.
pub fn is_first_encapsulation_wrapper(doc: &Document, node: NodeId) -> bool {
    let Some(el) = doc.element(node) else {
        return false;
    };
    el.attr("about").is_some()
        && el.attr("typeof").is_some_and(|ty| {
            ty.split_ascii_whitespace()
                .any(|t| ENCAPSULATION_TYPES.iter().any(|p| is_type_or_subtype(t, p)))
        })
}

// `mw:Transclusion` matches itself but not `mw:TransclusionShadow`;
// prefixes ending in `/` match any subtype.
fn is_type_or_subtype(token: &str, prefix: &str) -> bool {
    if prefix.ends_with('/') {
        return token.len() > prefix.len() && token.starts_with(prefix);
    }
    token == prefix
}

pub fn is_marker_meta(doc: &Document, node: NodeId, ty: &str) -> bool {
    doc.is_element_named(node, "meta") && doc.has_type_of(node, ty)
}

/// Encapsulation ids minted by the parser (`#mwt<N>`).
pub fn has_parsoid_about_id(doc: &Document, node: NodeId) -> bool {
    doc.attr(node, "about").is_some_and(|a| a.starts_with("#mwt"))
}

pub fn is_tpl_start_marker_meta(doc: &Document, node: NodeId) -> bool {
    is_marker_meta(doc, node, "mw:Transclusion")
}

/// An element that is part of some encapsulation unit's top level.
pub fn is_encapsulated_top_level(doc: &Document, node: NodeId) -> bool {
    has_parsoid_about_id(doc, node)
}

/// A list container (`ul`, `ol`, `dl`).
pub fn is_list(doc: &Document, node: NodeId) -> bool {
    matches!(doc.node_name(node), Some("ul" | "ol" | "dl"))
}

pub fn is_list_item(doc: &Document, node: NodeId) -> bool {
    matches!(doc.node_name(node), Some("li" | "dt" | "dd"))
}

/// Whitespace-only text or a comment: nodes that separate content.
pub fn is_separator(doc: &Document, node: NodeId) -> bool {
    doc.is_comment(node)
        || doc
            .text(node)
            .is_some_and(tools::text::is_inter_element_whitespace)
}

pub fn last_non_separator_child(doc: &Document, node: NodeId) -> Option<NodeId> {
    let mut child = doc.last_child(node);
    while let Some(c) = child {
        if !is_separator(doc, c) {
            return Some(c);
        }
        child = doc.prev_sibling(c);
    }
    None
}

/// Nodes that render nothing: comments, page-property links, metas that
/// are not literal HTML (tag shadows always count), and fallback-id spans.
pub fn is_rendering_transparent(doc: &Document, node: NodeId) -> bool {
    if doc.is_comment(node) {
        return true;
    }
    match doc.node_name(node) {
        Some("link") => doc
            .attr(node, "rel")
            .is_some_and(|rel| rel.split_ascii_whitespace().any(|r| r.starts_with("mw:PageProp/"))),
        Some("meta") => {
            doc.has_type_of(node, "mw:StartTag")
                || doc.has_type_of(node, "mw:EndTag")
                || !doc.is_literal_html(node)
        }
        Some("span") => doc.has_type_of(node, "mw:FallbackId"),
        _ => false,
    }
}

/// No element or comment children and only blank (space/tab) text.
pub fn is_essentially_empty(doc: &Document, node: NodeId) -> bool {
    doc.children(node).all(|c| {
        doc.text(c)
            .is_some_and(|t| t.bytes().all(|b| b == b' ' || b == b'\t'))
    })
}

/// A node that contributes no source text: zero-width range and only
/// zero-width element children.
///
/// `dsr` is consulted first; a node without one falls back to its `tsr`.
pub fn is_zero_width_subtree(doc: &Document, node: NodeId) -> bool {
    if !doc.is_element(node) {
        return false;
    }
    let record = doc.source(node);
    let zero = match record.and_then(|dp| dp.valid_dsr()) {
        Some(dsr) => dsr.is_zero_width(),
        None => record
            .and_then(|dp| dp.tsr)
            .is_some_and(|tsr| tsr.is_zero_width()),
    };
    zero && doc.children(node).all(|c| is_zero_width_subtree(doc, c))
}
