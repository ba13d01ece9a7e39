//! Selective resynthesis: reuse prior source for unedited parts of a page
//! and regenerate only what changed.
//!
//! The diff engine, the emitter and the prior revision fetch are supplied
//! by the caller through the traits in [`traits`].
pub mod config;
pub mod error;
pub mod shell;
pub mod traits;

pub use crate::config::SelserConfig;
pub use crate::error::{EmitError, FetchError, SelserError};
pub use crate::shell::{Mode, SelectiveSerializer, SerializeOutcome, SerializeRequest};
pub use crate::traits::{
    CachedDiff, DiffEngine, DiffSummary, Emitter, NoPriorRevisions, PriorRevision,
    PriorRevisionFetch,
};
