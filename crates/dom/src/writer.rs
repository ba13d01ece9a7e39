//! Markup output. Data attributes are written only if they are already
//! attributes; see [`crate::persist::store_data_attribs`].
use crate::markup::is_void_element;
use crate::{Document, NodeId, NodeKind};
use tools::entities::{escape_attr, escape_text};

/// Serializes `node` and its subtree. The document node writes only its
/// children.
pub fn to_html(doc: &Document, node: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, node, &mut out);
    out
}

/// Serializes the children of `node`.
pub fn inner_html(doc: &Document, node: NodeId) -> String {
    let mut out = String::new();
    for child in doc.children(node) {
        write_node(doc, child, &mut out);
    }
    out
}

fn write_node(doc: &Document, node: NodeId, out: &mut String) {
    match doc.kind(node) {
        NodeKind::Document => {
            for child in doc.children(node) {
                write_node(doc, child, out);
            }
        }
        NodeKind::Text(text) => {
            let raw = doc
                .parent(node)
                .and_then(|p| doc.node_name(p))
                .is_some_and(|name| name == "script" || name == "style");
            if raw {
                out.push_str(text);
            } else {
                out.push_str(&escape_text(text));
            }
        }
        NodeKind::Comment(body) => {
            out.push_str("<!--");
            out.push_str(body);
            out.push_str("-->");
        }
        NodeKind::Element(el) => {
            out.push('<');
            out.push_str(&el.name);
            for (name, value) in &el.attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape_attr(value));
                out.push('"');
            }
            out.push('>');
            if is_void_element(&el.name) {
                return;
            }
            for child in doc.children(node) {
                write_node(doc, child, out);
            }
            out.push_str("</");
            out.push_str(&el.name);
            out.push('>');
        }
    }
}
