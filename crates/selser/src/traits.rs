//! Collaborators the shell delegates to. None of them is implemented here.
use core_types::DiffMark;
use dom::{Document, NodeId};
use std::future::Future;

use crate::error::{EmitError, FetchError};

/// Source text and, when available, the parsed tree of the revision an edit
/// was based on.
#[derive(Debug)]
pub struct PriorRevision {
    pub source: String,
    pub tree: Option<Document>,
}

impl PriorRevision {
    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            tree: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiffSummary {
    /// Nothing changed since the prior revision.
    pub is_empty: bool,
}

/// Marks nodes of an edited tree that differ from the prior revision.
pub trait DiffEngine {
    fn diff(&mut self, prior: &PriorRevision, doc: &mut Document) -> DiffSummary;
}

/// A diff computed ahead of time, replayed onto the edited tree instead of
/// asking the [`DiffEngine`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CachedDiff {
    pub marks: Vec<(NodeId, DiffMark)>,
}

impl CachedDiff {
    pub fn apply(&self, doc: &mut Document) -> DiffSummary {
        for &(node, mark) in &self.marks {
            if doc.is_freed(node) {
                log::debug!(target: "selser", "cached diff names freed node {node}");
                continue;
            }
            doc.mark(node, mark);
        }
        DiffSummary {
            is_empty: self.marks.is_empty(),
        }
    }
}

/// Turns a normalized tree into source text. With `selective` set the
/// emitter reuses prior source for unmarked subtrees.
pub trait Emitter {
    fn emit(&mut self, doc: &Document, selective: bool) -> Result<String, EmitError>;
}

pub trait PriorRevisionFetch {
    fn fetch(
        &self,
        page: &str,
        revision: &str,
    ) -> impl Future<Output = Result<PriorRevision, FetchError>>;
}

/// A fetcher for callers that never have prior revisions on hand.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPriorRevisions;

impl PriorRevisionFetch for NoPriorRevisions {
    async fn fetch(&self, page: &str, revision: &str) -> Result<PriorRevision, FetchError> {
        Err(FetchError::NotFound {
            page: page.to_string(),
            revision: revision.to_string(),
        })
    }
}
