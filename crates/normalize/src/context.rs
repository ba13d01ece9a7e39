use crate::cite::CitationState;
use crate::config::NormalizeConfig;
use crate::lint::LintEntry;
use dom::{ContentClassifier, PageBundle};

/// Shared state threaded through every pass handler of one suite run.
pub struct PassContext<'a> {
    pub config: &'a NormalizeConfig,
    pub classifier: &'a dyn ContentClassifier,
    /// Source text the tree was parsed from, when the caller has it.
    pub source: Option<&'a str>,
    pub citations: &'a mut dyn CitationState,
    pub lints: Vec<LintEntry>,
    /// Collects records when page bundle storage is enabled.
    pub page_bundle: Option<PageBundle>,
}

impl<'a> PassContext<'a> {
    pub fn new(
        config: &'a NormalizeConfig,
        classifier: &'a dyn ContentClassifier,
        citations: &'a mut dyn CitationState,
    ) -> Self {
        Self {
            config,
            classifier,
            source: None,
            citations,
            lints: Vec::new(),
            page_bundle: config.store_in_page_bundle.then(PageBundle::new),
        }
    }

    /// Source text covered by `start..end`, if it is in bounds.
    pub fn source_slice(&self, start: usize, end: usize) -> Option<&'a str> {
        self.source.and_then(|src| src.get(start..end))
    }
}
