//! Arena document model with sidecar metadata, plus the pieces every
//! normalization pass needs: a traversal engine, encapsulation scopes and
//! node classification.
pub mod classify;
mod document;
pub mod markup;
mod node;
pub mod persist;
pub mod scope;
#[cfg(any(test, feature = "dom-snapshot"))]
pub mod snapshot;
pub mod store;
pub mod traverse;
mod writer;

pub use crate::classify::{ContentClassifier, WikitextClassifier};
pub use crate::document::{Children, Document, DomError};
pub use crate::markup::{MarkupError, parse_document, parse_fragment};
pub use crate::node::{Element, NodeId, NodeKind};
pub use crate::persist::{PageBundle, PersistError, StoreOptions};
pub use crate::scope::Scope;
pub use crate::store::{CallRecord, MetadataStore, Scratch, SourceRecord};
pub use crate::traverse::{DomTraverser, HandlerError, HandlerResult, Step, TraverseError, TraverseReport, Visit};
pub use crate::writer::{inner_html, to_html};
pub use core_types::{DiffMark, DiffMarks, Dsr, Tsr};
