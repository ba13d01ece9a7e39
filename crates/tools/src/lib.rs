//! Text helpers shared by the DOM and normalization crates.
//!
//! Offsets everywhere in this workspace are byte offsets into the original
//! source, so every length reported here is a byte length.
pub mod comment;
pub mod entities;
pub mod text;
