//! Normalization and selective resynthesis of parsed wiki documents.
//!
//! Parse or build a [`Document`], run a [`PassSuite`] over it, and hand it
//! to a [`SelectiveSerializer`] together with the collaborators that diff
//! and emit source text.
pub use dom::{Document, NodeId, parse_document, parse_fragment, to_html};
pub use normalize::{NormalizeConfig, NormalizeError, Pass, PassSuite, SuiteReport};
pub use selser::{
    Mode, SelectiveSerializer, SelserConfig, SelserError, SerializeOutcome, SerializeRequest,
};

pub mod traits {
    pub use selser::traits::*;
}
