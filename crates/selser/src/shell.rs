use dom::{Document, WikitextClassifier};
use normalize::{Cite, PassContext, PassSuite};

use crate::config::SelserConfig;
use crate::error::SelserError;
use crate::traits::{CachedDiff, DiffEngine, Emitter, PriorRevision, PriorRevisionFetch};

#[derive(Debug, Default)]
pub struct SerializeRequest {
    pub page: String,
    /// Revision the edit was based on. Used to fetch prior data when none
    /// is supplied inline.
    pub revision_id: Option<String>,
    pub prior: Option<PriorRevision>,
    /// Replayed instead of running the diff engine.
    pub cached_diff: Option<CachedDiff>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// The whole page was regenerated.
    Full,
    /// Only changed subtrees were regenerated.
    Selective,
    /// Nothing changed; the prior source came back as is.
    Unchanged,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerializeOutcome {
    pub text: String,
    pub mode: Mode,
}

/// Decides per request whether prior source can be reused and drives the
/// pass suite and the emitter accordingly.
pub struct SelectiveSerializer<D, E, F> {
    config: SelserConfig,
    suite: PassSuite,
    diff: D,
    emitter: E,
    fetch: F,
}

impl<D, E, F> SelectiveSerializer<D, E, F>
where
    D: DiffEngine,
    E: Emitter,
    F: PriorRevisionFetch,
{
    pub fn new(config: SelserConfig, diff: D, emitter: E, fetch: F) -> Self {
        Self {
            config,
            suite: PassSuite::new(),
            diff,
            emitter,
            fetch,
        }
    }

    pub fn with_suite(mut self, suite: PassSuite) -> Self {
        self.suite = suite;
        self
    }

    pub fn config(&self) -> &SelserConfig {
        &self.config
    }

    pub fn diff_engine(&self) -> &D {
        &self.diff
    }

    pub fn emitter(&self) -> &E {
        &self.emitter
    }

    /// Produces source text for `doc`.
    ///
    /// Without prior source the tree is normalized and fully regenerated.
    /// With it, an empty diff returns the prior source untouched (no pass
    /// runs, the emitter is not called); otherwise the diff-marked tree is
    /// normalized and emitted selectively.
    pub async fn serialize(
        &mut self,
        doc: &mut Document,
        request: &SerializeRequest,
    ) -> Result<SerializeOutcome, SelserError> {
        if !self.config.selective {
            return self.regenerate(doc, None);
        }

        let fetched;
        let prior = match (&request.prior, &request.revision_id) {
            (Some(prior), _) => Some(prior),
            (None, Some(revision)) => match self.fetch.fetch(&request.page, revision).await {
                Ok(prior) => {
                    fetched = prior;
                    Some(&fetched)
                }
                Err(err) => {
                    log::warn!(
                        target: "selser",
                        "falling back to full serialization of `{}`: {err}",
                        request.page
                    );
                    None
                }
            },
            (None, None) => None,
        };
        let Some(prior) = prior else {
            return self.regenerate(doc, None);
        };

        let summary = match &request.cached_diff {
            Some(cached) => cached.apply(doc),
            None => self.diff.diff(prior, doc),
        };
        if summary.is_empty {
            log::debug!(target: "selser", "`{}` unchanged, reusing prior source", request.page);
            return Ok(SerializeOutcome {
                text: prior.source.clone(),
                mode: Mode::Unchanged,
            });
        }
        self.regenerate(doc, Some(&prior.source))
    }

    fn regenerate(
        &mut self,
        doc: &mut Document,
        prior_source: Option<&str>,
    ) -> Result<SerializeOutcome, SelserError> {
        let config = &self.config.normalize;
        let mut cite = Cite::new(config.responsive_references);
        let mut ctx = PassContext::new(config, &WikitextClassifier, &mut cite);
        // Offsets in a diff-marked tree point into the prior source.
        ctx.source = prior_source;
        let root = doc.root();
        let report = self.suite.run(doc, root, &mut ctx, true)?;
        if !report.lints.is_empty() {
            log::debug!(target: "selser", "{} lint(s) while normalizing", report.lints.len());
        }

        let selective = prior_source.is_some();
        let text = self.emitter.emit(doc, selective)?;
        Ok(SerializeOutcome {
            text,
            mode: if selective { Mode::Selective } else { Mode::Full },
        })
    }
}
