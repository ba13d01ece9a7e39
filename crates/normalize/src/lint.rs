//! Lint findings collected while normalizing.
use core_types::Dsr;
use dom::{Document, NodeId, Scope};
use serde::Serialize;
use serde_json::Value;
use tools::comment::is_ignorable_attr_text;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LintKind {
    IgnoredTableAttr,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LintEntry {
    pub kind: LintKind,
    pub dsr: Option<Dsr>,
    pub in_transclusion: bool,
}

/// Table rows whose source-form attributes were dropped by the renderer.
///
/// Only the `tbody` children of `table` are inspected. A row reports once,
/// on its first key or value that is neither blank nor a comment run.
pub fn lint_ignored_table_attrs(
    doc: &Document,
    table: NodeId,
    scope: Option<&Scope>,
) -> Vec<LintEntry> {
    let mut out = Vec::new();
    if !doc.is_element_named(table, "table") {
        return out;
    }
    for section in doc.children(table) {
        if !doc.is_element_named(section, "tbody") {
            continue;
        }
        for row in doc.children(section) {
            if !doc.is_element_named(row, "tr") {
                continue;
            }
            let Some(record) = doc.source(row) else {
                continue;
            };
            let Some(sa) = &record.sa else {
                continue;
            };
            let offending = sa.iter().any(|(key, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                !is_ignorable_attr_text(key) || !is_ignorable_attr_text(&value)
            });
            if !offending {
                continue;
            }
            let entry = match scope {
                Some(scope) => LintEntry {
                    kind: LintKind::IgnoredTableAttr,
                    dsr: scope.dsr,
                    in_transclusion: true,
                },
                None => LintEntry {
                    kind: LintKind::IgnoredTableAttr,
                    dsr: record.dsr,
                    in_transclusion: false,
                },
            };
            log::debug!(target: "normalize.lint", "ignored table attribute on {row}");
            out.push(entry);
        }
    }
    out
}
