//! Runs the passes in order over one document.
use crate::context::PassContext;
use crate::error::NormalizeError;
use crate::lint::LintEntry;
use crate::passes::{Pass, fostered};
use dom::persist::load_data_attribs;
use dom::traverse::{TraverseReport, ViolationKind};
use dom::{Document, NodeId, PageBundle};

/// What a suite run leaves besides the rewritten tree.
#[derive(Debug, Default)]
pub struct SuiteReport {
    pub lints: Vec<LintEntry>,
    /// Records collected in page bundle mode.
    pub page_bundle: Option<PageBundle>,
    /// Nodes handlers left detached, per pass. Not an error.
    pub detached: Vec<(&'static str, NodeId)>,
}

#[derive(Clone, Debug)]
pub struct PassSuite {
    passes: Vec<Pass>,
}

impl Default for PassSuite {
    fn default() -> Self {
        Self::new()
    }
}

impl PassSuite {
    pub fn new() -> Self {
        Self {
            passes: Pass::ORDER.to_vec(),
        }
    }

    /// A suite running `passes`, kept in their canonical relative order.
    pub fn with_passes(passes: &[Pass]) -> Self {
        Self {
            passes: Pass::ORDER
                .into_iter()
                .filter(|p| passes.contains(p))
                .collect(),
        }
    }

    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    /// Normalizes `root`'s subtree. Inline data attributes are loaded into
    /// the store first; cleanup writes them back at the top level.
    ///
    /// Fails after the first pass that reports a contract violation. Its
    /// changes, and those of earlier passes, stay in the tree.
    pub fn run(
        &self,
        doc: &mut Document,
        root: NodeId,
        ctx: &mut PassContext<'_>,
        at_top_level: bool,
    ) -> Result<SuiteReport, NormalizeError> {
        load_data_attribs(doc, root)?;
        let mut detached = Vec::new();
        for &pass in &self.passes {
            let report = pass.run(doc, root, ctx, at_top_level);
            detached.extend(report.detached.iter().map(|(node, _)| (pass.name(), *node)));
            check_report(pass, report)?;
        }
        log::debug!(
            target: "normalize",
            "normalized {root}: {} lint(s), {} detached",
            ctx.lints.len(),
            detached.len()
        );
        Ok(SuiteReport {
            lints: std::mem::take(&mut ctx.lints),
            page_bundle: ctx.page_bundle.take(),
            detached,
        })
    }
}

fn check_report(pass: Pass, report: TraverseReport) -> Result<(), NormalizeError> {
    if report.violations.is_empty() {
        return Ok(());
    }
    let foster_failure = report.violations.iter().find(|v| {
        v.handler == fostered::HANDLER_NAME && matches!(v.kind, ViolationKind::HandlerFailed(_))
    });
    if let Some(violation) = foster_failure {
        return Err(NormalizeError::FosterStructure {
            foster_box: violation.node,
        });
    }
    Err(NormalizeError::HandlerContract {
        pass: pass.name(),
        violations: report.violations,
    })
}
