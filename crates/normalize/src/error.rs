use dom::traverse::TraverseError;
use dom::{DomError, NodeId, PersistError};
use std::fmt;

#[derive(Debug)]
pub enum NormalizeError {
    /// A pass finished, but at least one of its handlers broke the
    /// traversal contract.
    HandlerContract {
        pass: &'static str,
        violations: Vec<TraverseError>,
    },
    /// A foster box with no table among its following siblings.
    FosterStructure { foster_box: NodeId },
    Dom(DomError),
    Persist(PersistError),
    Config(toml::de::Error),
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeError::HandlerContract { pass, violations } => {
                write!(f, "pass `{pass}` had {} handler contract violation(s)", violations.len())?;
                if let Some(first) = violations.first() {
                    write!(f, "; first: {first}")?;
                }
                Ok(())
            }
            NormalizeError::FosterStructure { foster_box } => {
                write!(f, "foster box {foster_box} is not followed by its table")
            }
            NormalizeError::Dom(err) => write!(f, "{err}"),
            NormalizeError::Persist(err) => write!(f, "{err}"),
            NormalizeError::Config(err) => write!(f, "invalid normalize config: {err}"),
        }
    }
}

impl std::error::Error for NormalizeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NormalizeError::Dom(err) => Some(err),
            NormalizeError::Persist(err) => Some(err),
            NormalizeError::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DomError> for NormalizeError {
    fn from(err: DomError) -> Self {
        NormalizeError::Dom(err)
    }
}

impl From<PersistError> for NormalizeError {
    fn from(err: PersistError) -> Self {
        NormalizeError::Persist(err)
    }
}
