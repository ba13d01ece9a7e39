mod diff;
mod range;

pub use diff::{DiffMark, DiffMarks};
pub use range::{Dsr, Tsr};
