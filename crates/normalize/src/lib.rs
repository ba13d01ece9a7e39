//! DOM normalization passes run between tree building and serialization.
//!
//! [`PassSuite`] runs every pass over a document with a [`PassContext`]
//! holding the configuration, the content classifier and the citation
//! state. Passes leave the tree in the canonical shape the serializer
//! expects and persist node records at the end.
pub mod cite;
pub mod config;
pub mod context;
pub mod error;
pub mod lint;
pub mod passes;
pub mod pipeline;

pub use crate::cite::{CitationState, Cite};
pub use crate::config::{NormalizeConfig, ResponsiveReferences};
pub use crate::context::PassContext;
pub use crate::error::NormalizeError;
pub use crate::lint::{LintEntry, LintKind};
pub use crate::passes::Pass;
pub use crate::pipeline::{PassSuite, SuiteReport};
