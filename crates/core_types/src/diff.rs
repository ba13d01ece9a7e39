use std::fmt;

/// Per-node change annotation produced by the external diff engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiffMark {
    Modified,
    ChildrenChanged,
    Inserted,
    Deleted,
    Moved,
    SubtreeChanged,
}

impl DiffMark {
    pub const ALL: [DiffMark; 6] = [
        DiffMark::Modified,
        DiffMark::ChildrenChanged,
        DiffMark::Inserted,
        DiffMark::Deleted,
        DiffMark::Moved,
        DiffMark::SubtreeChanged,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DiffMark::Modified => "modified",
            DiffMark::ChildrenChanged => "children-changed",
            DiffMark::Inserted => "inserted",
            DiffMark::Deleted => "deleted",
            DiffMark::Moved => "moved",
            DiffMark::SubtreeChanged => "subtree-changed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mark| mark.as_str() == s)
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for DiffMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiffMarks(u8);

impl DiffMarks {
    pub const EMPTY: DiffMarks = DiffMarks(0);

    pub fn insert(&mut self, mark: DiffMark) {
        self.0 |= mark.bit();
    }

    pub fn contains(self, mark: DiffMark) -> bool {
        self.0 & mark.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = DiffMark> {
        DiffMark::ALL.into_iter().filter(move |mark| self.contains(*mark))
    }
}

impl FromIterator<DiffMark> for DiffMarks {
    fn from_iter<I: IntoIterator<Item = DiffMark>>(iter: I) -> Self {
        let mut marks = DiffMarks::EMPTY;
        for mark in iter {
            marks.insert(mark);
        }
        marks
    }
}

impl fmt::Display for DiffMarks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, mark) in self.iter().enumerate() {
            if i != 0 {
                f.write_str(" ")?;
            }
            f.write_str(mark.as_str())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_render_in_declaration_order() {
        let marks: DiffMarks = [DiffMark::Moved, DiffMark::Modified].into_iter().collect();
        assert_eq!(marks.to_string(), "modified moved");
        assert!(!marks.contains(DiffMark::Inserted));
    }

    #[test]
    fn parse_round_trips_names() {
        for mark in DiffMark::ALL {
            assert_eq!(DiffMark::parse(mark.as_str()), Some(mark));
        }
        assert_eq!(DiffMark::parse("bogus"), None);
    }
}
