//! Source offsets attached to nodes.
//!
//! A [`Dsr`] covers a node's whole extent in the original source plus the
//! widths of its open and close syntax. A [`Tsr`] covers a single token and
//! is only meaningful until cleanup clears it.
//!
//! Serialized form follows the attribute storage: `dsr` is a 4-element array
//! `[start, end, openWidth, closeWidth]`, `tsr` a 2-element array. Negative
//! or `null` entries read back as absent.
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Option<i64>>", into = "Vec<Option<i64>>")]
pub struct Dsr {
    pub start: Option<usize>,
    pub end: Option<usize>,
    pub open_width: Option<usize>,
    pub close_width: Option<usize>,
}

impl Dsr {
    pub const fn new(start: usize, end: usize, open_width: usize, close_width: usize) -> Self {
        debug_assert!(start <= end);
        Self {
            start: Some(start),
            end: Some(end),
            open_width: Some(open_width),
            close_width: Some(close_width),
        }
    }

    /// A range with known offsets but unknown tag widths.
    pub const fn span(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self {
            start: Some(start),
            end: Some(end),
            open_width: None,
            close_width: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }

    pub fn has_valid_widths(&self) -> bool {
        self.open_width.is_some() && self.close_width.is_some()
    }

    pub fn width(&self) -> Option<usize> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => end.checked_sub(start),
            _ => None,
        }
    }

    pub fn is_zero_width(&self) -> bool {
        self.width() == Some(0)
    }

    /// Moves both offsets by `delta`, leaving absent offsets absent.
    pub fn shift(&mut self, delta: isize) {
        self.start = self.start.map(|v| v.saturating_add_signed(delta));
        self.end = self.end.map(|v| v.saturating_add_signed(delta));
    }

    /// Source range of the node's content, between its open and close syntax.
    pub fn inner(&self) -> Option<(usize, usize)> {
        let start = self.start? + self.open_width.unwrap_or(0);
        let end = self.end?.checked_sub(self.close_width.unwrap_or(0))?;
        (start <= end).then_some((start, end))
    }
}

impl From<Vec<Option<i64>>> for Dsr {
    fn from(raw: Vec<Option<i64>>) -> Self {
        let at = |i: usize| {
            raw.get(i)
                .copied()
                .flatten()
                .and_then(|v| usize::try_from(v).ok())
        };
        Self {
            start: at(0),
            end: at(1),
            open_width: at(2),
            close_width: at(3),
        }
    }
}

impl From<Dsr> for Vec<Option<i64>> {
    fn from(dsr: Dsr) -> Self {
        [dsr.start, dsr.end, dsr.open_width, dsr.close_width]
            .into_iter()
            .map(|v| v.and_then(|v| i64::try_from(v).ok()))
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(usize, usize)", into = "(usize, usize)")]
pub struct Tsr {
    pub start: usize,
    pub end: usize,
}

impl Tsr {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn shift(&mut self, delta: isize) {
        self.start = self.start.saturating_add_signed(delta);
        self.end = self.end.saturating_add_signed(delta);
    }

    pub fn is_zero_width(&self) -> bool {
        self.start == self.end
    }
}

impl From<(usize, usize)> for Tsr {
    fn from((start, end): (usize, usize)) -> Self {
        Self { start, end }
    }
}

impl From<Tsr> for (usize, usize) {
    fn from(tsr: Tsr) -> Self {
        (tsr.start, tsr.end)
    }
}
