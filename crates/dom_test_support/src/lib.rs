use std::fmt::Write;

pub mod fixtures;

pub use fixtures::{FixtureCase, FixtureFile, load_fixture_file};

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ch if ch < ' ' => {
                let _ = write!(&mut out, "\\u{{{:02X}}}", ch as u32);
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Renders the first differing line with two lines of context either side.
pub fn diff_lines(expected: &[String], actual: &[String]) -> String {
    let max = expected.len().max(actual.len());
    const MISSING: &str = "<missing>";
    fn line<'a>(lines: &'a [String], i: usize) -> &'a str {
        lines.get(i).map(String::as_str).unwrap_or(MISSING)
    }
    let mut out = String::new();
    let mismatch = (0..max).find(|&i| line(expected, i) != line(actual, i));
    if let Some(i) = mismatch {
        let start = i.saturating_sub(2);
        let end = (i + 3).min(max);
        let _ = writeln!(
            &mut out,
            "first mismatch at line {} (showing {}..={}):",
            i + 1,
            start + 1,
            end
        );
        for idx in start..end {
            let marker = if idx == i { ">" } else { " " };
            let _ = writeln!(&mut out, "{marker} {:>4}  expected: {}", idx + 1, line(expected, idx));
            let _ = writeln!(&mut out, "{marker} {:>4}    actual: {}", idx + 1, line(actual, idx));
        }
    }
    let _ = writeln!(
        &mut out,
        "expected {} lines, actual {} lines",
        expected.len(),
        actual.len()
    );
    out
}

/// One line per node of the markup's tree.
pub fn tree_lines(html: &str) -> Vec<String> {
    let doc = dom::parse_fragment(html)
        .unwrap_or_else(|err| panic!("fixture markup does not parse: {err}\n{html}"));
    let options = dom::snapshot::DomSnapshotOptions {
        show_ranges: false,
        show_diff: false,
    };
    dom::snapshot::DomSnapshot::new(&doc, doc.root(), options)
        .as_lines()
        .to_vec()
}

/// Compares two serialized trees node by node.
pub fn assert_same_tree(expected: &str, actual: &str, label: &str) {
    let expected_lines = tree_lines(expected);
    let actual_lines = tree_lines(actual);
    if expected_lines != actual_lines {
        panic!(
            "tree mismatch in {label}\n{}\nexpected html: \"{}\"\nactual html:   \"{}\"",
            diff_lines(&expected_lines, &actual_lines),
            escape_text(expected),
            escape_text(actual)
        );
    }
}
