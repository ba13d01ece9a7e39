//! Indent-pre fixups.
//!
//! A line-initial space means "preformatted" in wikitext, but not inside
//! templated or literal HTML block openers, nor inside a references list.
//! Synthetic `pre`s found there are unwrapped and the eaten spaces put back.
//! Literal `<pre>` keeps its structure and only loses the newline the HTML
//! parser would swallow after the start tag.
use crate::cite::is_references_container;
use crate::context::PassContext;
use dom::classify::has_parsoid_about_id;
use dom::traverse::{DomTraverser, HandlerError, HandlerResult, Step, Visit};
use dom::{ContentClassifier, Document, NodeId};
use tools::text::indent_pre_text;

pub(crate) fn register<'a>(traverser: &mut DomTraverser<'static, PassContext<'a>>) {
    traverser.add_handler(None, "suppress-indent-pre", suppress_indent_pre);
    traverser.add_handler(Some("pre"), "strip-html-pre-newline", strip_html_pre_newline);
}

fn suppress_indent_pre(
    doc: &mut Document,
    node: NodeId,
    visit: &mut Visit<'_, PassContext<'_>>,
) -> HandlerResult {
    let Some(name) = doc.node_name(node).map(str::to_string) else {
        return Ok(Step::Continue);
    };
    let classifier = visit.ctx.classifier;
    let suppresses = is_references_container(doc, node)
        || (classifier.opens_block_scope(&name)
            && (has_parsoid_about_id(doc, node) || doc.is_literal_html(node)));
    if suppresses {
        let wrap = classifier.wraps_inline_in_paragraph(&name);
        delete_indent_pre(doc, node, wrap, classifier)?;
    }
    Ok(Step::Continue)
}

fn delete_indent_pre(
    doc: &mut Document,
    node: NodeId,
    wrap_in_paragraph: bool,
    classifier: &dyn ContentClassifier,
) -> Result<(), HandlerError> {
    let mut child = doc.first_child(node);
    while let Some(c) = child {
        let next = doc.next_sibling(c);
        if doc.is_element_named(c, "pre") && !doc.is_literal_html(c) {
            unwrap_indent_pre(doc, node, c, wrap_in_paragraph)?;
        } else if doc
            .node_name(c)
            .is_some_and(|name| !classifier.closes_block_scope(name))
        {
            delete_indent_pre(doc, c, wrap_in_paragraph, classifier)?;
        }
        child = next;
    }
    Ok(())
}

fn unwrap_indent_pre(
    doc: &mut Document,
    parent: NodeId,
    pre: NodeId,
    wrap_in_paragraph: bool,
) -> Result<(), HandlerError> {
    let target = if wrap_in_paragraph {
        let p = doc.create_element("p");
        doc.insert_before(parent, p, Some(pre))?;
        p
    } else {
        parent
    };
    let anchor = if wrap_in_paragraph { None } else { Some(pre) };
    let space = doc.create_text(" ");
    doc.insert_before(target, space, anchor)?;

    while let Some(c) = doc.first_child(pre) {
        let last = doc.next_sibling(c).is_none();
        if let Some(text) = doc.text(c) {
            let fixed = indent_pre_text(text, last);
            doc.set_text(c, fixed);
        } else if doc.is_element(c) {
            reinsert_leading_space(doc, c, last);
        }
        doc.insert_before(target, c, anchor)?;
    }
    doc.remove(pre);
    Ok(())
}

fn reinsert_leading_space(doc: &mut Document, elt: NodeId, is_last_child: bool) {
    let mut child = doc.first_child(elt);
    while let Some(c) = child {
        let next = doc.next_sibling(c);
        let last = is_last_child && next.is_none();
        if let Some(text) = doc.text(c) {
            let fixed = indent_pre_text(text, last);
            doc.set_text(c, fixed);
        } else if doc.is_element(c) {
            reinsert_leading_space(doc, c, last);
        }
        child = next;
    }
}

/// The line break opening `text`, unless a second one follows it.
fn leading_line_break(text: &str) -> Option<&'static str> {
    let nl = if text.starts_with("\r\n") {
        "\r\n"
    } else if text.starts_with('\r') {
        "\r"
    } else if text.starts_with('\n') {
        "\n"
    } else {
        return None;
    };
    match text.as_bytes().get(nl.len()) {
        Some(b'\r' | b'\n') => None,
        _ => Some(nl),
    }
}

fn strip_html_pre_newline(
    doc: &mut Document,
    node: NodeId,
    _visit: &mut Visit<'_, PassContext<'_>>,
) -> HandlerResult {
    if !doc.is_literal_html(node) || doc.source(node).is_some_and(|dp| dp.stripped_nl.is_some()) {
        return Ok(Step::Continue);
    }
    let Some(first) = doc.first_child(node) else {
        return Ok(Step::Continue);
    };
    let Some(nl) = doc.text(first).and_then(leading_line_break) else {
        return Ok(Step::Continue);
    };
    let break_follows = doc
        .next_sibling(first)
        .and_then(|n| doc.text(n))
        .is_some_and(|t| t.starts_with(['\r', '\n']));
    if break_follows {
        return Ok(Step::Continue);
    }
    let rest = doc.text(first).unwrap_or_default()[nl.len()..].to_string();
    doc.set_text(first, rest);
    doc.source_mut(node).stripped_nl = Some(nl.to_string());
    Ok(Step::Continue)
}

#[cfg(test)]
mod tests {
    use crate::passes::Pass;
    use crate::passes::test_util::{run_pass, run_pass_on, tree};

    #[test]
    fn templated_blocks_lose_their_indent_pres() {
        let (doc, report) = run_pass(
            Pass::IndentPre,
            "<div about=\"#mwt1\" typeof=\"mw:Transclusion\"><ul about=\"#mwt1\"><li><pre>a\nb</pre></li></ul></div>",
        );
        assert!(report.is_clean());
        // `div` does not open a block scope; the `ul` does.
        assert_eq!(
            tree(&doc),
            "<div about=\"#mwt1\" typeof=\"mw:Transclusion\"><ul about=\"#mwt1\"><li> a\n b</li></ul></div>"
        );
    }

    #[test]
    fn final_newline_of_the_last_child_stays_bare() {
        let (doc, _) = run_pass(
            Pass::IndentPre,
            "<ul data-parsoid='{\"stx\":\"html\"}'><li><pre>x\n<b>y\nz\n</b></pre></li></ul>",
        );
        assert_eq!(tree(&doc), "<ul><li> x\n <b>y\n z\n</b></li></ul>");
    }

    #[test]
    fn blockquote_content_is_paragraph_wrapped() {
        let (doc, _) = run_pass(
            Pass::IndentPre,
            "<blockquote data-parsoid='{\"stx\":\"html\"}'><pre>q</pre></blockquote>",
        );
        assert_eq!(tree(&doc), "<blockquote><p> q</p></blockquote>");
    }

    #[test]
    fn table_cells_reset_the_context() {
        let html = "<table data-parsoid='{\"stx\":\"html\"}'><tbody><tr><td><pre>c</pre></td></tr></tbody></table>";
        let (doc, _) = run_pass(Pass::IndentPre, html);
        assert_eq!(
            tree(&doc),
            "<table><tbody><tr><td><pre>c</pre></td></tr></tbody></table>"
        );
    }

    #[test]
    fn references_containers_suppress_indent_pre() {
        let (doc, _) = run_pass(
            Pass::IndentPre,
            "<ol typeof=\"mw:Extension/references\"><pre>r</pre></ol>",
        );
        assert_eq!(
            tree(&doc),
            "<ol typeof=\"mw:Extension/references\"> r</ol>"
        );
    }

    #[test]
    fn literal_pre_strips_one_leading_line_break() {
        for (body, rest, nl) in [("\nx", "x", "\n"), ("\r\nx", "x", "\r\n"), ("\r", "", "\r")] {
            let html = format!("<pre data-parsoid='{{\"stx\":\"html\"}}'>{body}</pre>");
            let (doc, _) = run_pass(Pass::IndentPre, &html);
            let pre = doc.first_child(doc.root()).expect("pre");
            assert_eq!(doc.text_content(pre), rest);
            assert_eq!(doc.source(pre).and_then(|dp| dp.stripped_nl.as_deref()), Some(nl));
        }
    }

    #[test]
    fn literal_pre_keeps_a_doubled_line_break() {
        for body in ["\n\nx", "\r\n\nx", "\n\rx"] {
            let html = format!("<pre data-parsoid='{{\"stx\":\"html\"}}'>{body}</pre>");
            let (doc, _) = run_pass(Pass::IndentPre, &html);
            let pre = doc.first_child(doc.root()).expect("pre");
            assert_eq!(doc.text_content(pre), body);
            assert!(doc.source(pre).and_then(|dp| dp.stripped_nl.as_deref()).is_none());
        }
    }

    #[test]
    fn literal_pre_newline_depends_on_the_following_text() {
        let html = "<pre data-parsoid='{\"stx\":\"html\"}'>\n<!--c-->x</pre>";
        let (doc, _) = run_pass(Pass::IndentPre, html);
        let pre = doc.first_child(doc.root()).expect("pre");
        assert_eq!(doc.text(doc.first_child(pre).expect("text")), Some(""));
        assert_eq!(doc.source(pre).and_then(|dp| dp.stripped_nl.as_deref()), Some("\n"));

        let mut doc = dom::parse_document("<pre data-parsoid='{\"stx\":\"html\"}'>\n</pre>").expect("fixture");
        let pre = doc.first_child(doc.root()).expect("pre");
        let second = doc.create_text("\nx");
        doc.append_child(pre, second).expect("append");
        run_pass_on(Pass::IndentPre, &mut doc);
        assert_eq!(doc.text_content(pre), "\n\nx");
        assert!(doc.source(pre).and_then(|dp| dp.stripped_nl.as_deref()).is_none());
    }

    #[test]
    fn plain_indent_pre_is_untouched() {
        let (doc, _) = run_pass(Pass::IndentPre, "<pre>x</pre>");
        assert_eq!(tree(&doc), "<pre>x</pre>");
    }
}
