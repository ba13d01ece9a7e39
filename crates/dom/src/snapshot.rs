//! Deterministic tree dumps for test comparisons.
//!
//! Not a stable format. Each node is one line, indented two spaces per
//! depth. Elements list their attributes in order followed by the source
//! range and diff marks held in the store; text is shown with `\n` escaped.
use crate::{Document, NodeId, NodeKind};
use std::fmt::{self, Write};

const INDENT_STEP: &str = "  ";

#[derive(Clone, Copy, Debug)]
pub struct DomSnapshotOptions {
    /// Include `dsr` from the metadata store.
    pub show_ranges: bool,
    /// Include diff marks from the metadata store.
    pub show_diff: bool,
}

impl Default for DomSnapshotOptions {
    fn default() -> Self {
        Self {
            show_ranges: true,
            show_diff: false,
        }
    }
}

#[derive(Debug)]
pub struct DomSnapshot {
    lines: Vec<String>,
}

impl DomSnapshot {
    pub fn new(doc: &Document, root: NodeId, options: DomSnapshotOptions) -> Self {
        let mut lines = Vec::new();
        walk(doc, root, &options, 0, &mut lines);
        Self { lines }
    }

    pub fn as_lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for DomSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i != 0 {
                f.write_str("\n")?;
            }
            f.write_str(line)?;
        }
        Ok(())
    }
}

fn escape_newlines(s: &str) -> String {
    s.replace('\r', "\\r").replace('\n', "\\n")
}

fn walk(doc: &Document, node: NodeId, options: &DomSnapshotOptions, depth: usize, out: &mut Vec<String>) {
    let mut line = INDENT_STEP.repeat(depth);
    match doc.kind(node) {
        NodeKind::Document => line.push_str("#document"),
        NodeKind::Text(text) => {
            let _ = write!(line, "\"{}\"", escape_newlines(text));
        }
        NodeKind::Comment(body) => {
            let _ = write!(line, "<!--{}-->", escape_newlines(body));
        }
        NodeKind::Element(el) => {
            line.push('<');
            line.push_str(&el.name);
            for (name, value) in &el.attrs {
                let _ = write!(line, " {name}=\"{value}\"");
            }
            line.push('>');
            if options.show_ranges {
                if let Some(dsr) = doc.source(node).and_then(|s| s.dsr) {
                    let _ = write!(line, " dsr={:?}", <Vec<Option<i64>>>::from(dsr));
                }
            }
            if options.show_diff {
                let marks = doc.diff_marks(node);
                if !marks.is_empty() {
                    let _ = write!(line, " diff={marks}");
                }
            }
        }
    }
    out.push(line);
    for child in doc.children(node) {
        walk(doc, child, options, depth + 1, out);
    }
}

/// Panics with both snapshots when the two subtrees differ.
pub fn assert_dom_eq(
    expected: (&Document, NodeId),
    actual: (&Document, NodeId),
    options: DomSnapshotOptions,
) {
    let expected = DomSnapshot::new(expected.0, expected.1, options).render();
    let actual = DomSnapshot::new(actual.0, actual.1, options).render();
    if expected != actual {
        panic!("DOM mismatch\nexpected:\n{expected}\nactual:\n{actual}");
    }
}
