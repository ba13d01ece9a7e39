//! The normalization passes, in the order [`Pass::ORDER`] runs them.
//!
//! Each pass is a set of handlers over one traversal. References add a
//! document-level step after their traversal at the top level.
use crate::context::PassContext;
use dom::traverse::{DomTraverser, HandlerError, TraverseError, TraverseReport, ViolationKind};
use dom::{Document, NodeId};

pub mod cleanup;
pub mod fostered;
pub mod indent_pre;
pub mod li_fixups;
pub mod minimize_quotes;
pub mod refs;
pub mod trailing_nls;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Pass {
    MarkFostered,
    IndentPre,
    ListFixups,
    TrailingNewlines,
    MinimizeQuotes,
    References,
    Cleanup,
}

impl Pass {
    pub const ORDER: [Pass; 7] = [
        Pass::MarkFostered,
        Pass::IndentPre,
        Pass::ListFixups,
        Pass::TrailingNewlines,
        Pass::MinimizeQuotes,
        Pass::References,
        Pass::Cleanup,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Pass::MarkFostered => "mark-fostered-content",
            Pass::IndentPre => "indent-pre",
            Pass::ListFixups => "li-fixups",
            Pass::TrailingNewlines => "migrate-trailing-nls",
            Pass::MinimizeQuotes => "minimize-quotes",
            Pass::References => "references",
            Pass::Cleanup => "cleanup",
        }
    }

    fn traverser<'a>(self, ctx: &PassContext<'a>) -> DomTraverser<'static, PassContext<'a>> {
        let mut traverser = DomTraverser::new().check_if_attached(ctx.config.check_if_attached);
        match self {
            Pass::MarkFostered => fostered::register(&mut traverser),
            Pass::IndentPre => indent_pre::register(&mut traverser),
            Pass::ListFixups => li_fixups::register(&mut traverser),
            Pass::TrailingNewlines => trailing_nls::register(&mut traverser),
            Pass::MinimizeQuotes => minimize_quotes::register(&mut traverser),
            Pass::References => refs::register(&mut traverser),
            Pass::Cleanup => cleanup::register(&mut traverser, ctx.config),
        }
        traverser
    }

    /// Runs this pass over `root`. Contract violations are left in the
    /// report for the caller to surface.
    pub fn run(
        self,
        doc: &mut Document,
        root: NodeId,
        ctx: &mut PassContext<'_>,
        at_top_level: bool,
    ) -> TraverseReport {
        log::trace!(target: "normalize", "running {}", self.name());
        let mut traverser = self.traverser(ctx);
        let mut report = traverser.traverse(doc, root, ctx, at_top_level);
        if self == Pass::References && at_top_level {
            let source_len = source_length(doc, root, ctx);
            if let Err(err) = ctx
                .citations
                .insert_missing_references_into_dom(doc, root, source_len)
            {
                report.violations.push(failed(root, "insert-missing-references", err));
            }
        }
        report
    }
}

fn failed(node: NodeId, handler: &'static str, err: HandlerError) -> TraverseError {
    let violation = TraverseError {
        node,
        handler,
        kind: ViolationKind::HandlerFailed(err),
    };
    log::error!(target: "normalize", "{violation}");
    violation
}

/// End of the source the tree covers: the text itself when known, else the
/// furthest range end among `root`'s children.
fn source_length(doc: &Document, root: NodeId, ctx: &PassContext<'_>) -> usize {
    if let Some(source) = ctx.source {
        return source.len();
    }
    doc.children(root)
        .filter_map(|c| doc.dsr(c).and_then(|d| d.end))
        .max()
        .unwrap_or(0)
}
