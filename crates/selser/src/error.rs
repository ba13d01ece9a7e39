use normalize::NormalizeError;
use std::fmt;

/// Failure reported by an [`Emitter`](crate::Emitter).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmitError {
    pub message: String,
}

impl EmitError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for EmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "emitter failed: {}", self.message)
    }
}

impl std::error::Error for EmitError {}

/// Why prior revision data could not be fetched. Never returned from
/// [`SelectiveSerializer::serialize`](crate::SelectiveSerializer::serialize);
/// the shell falls back to full mode instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchError {
    NotFound { page: String, revision: String },
    Unavailable(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::NotFound { page, revision } => {
                write!(f, "revision {revision} of `{page}` not found")
            }
            FetchError::Unavailable(reason) => write!(f, "prior revision unavailable: {reason}"),
        }
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug)]
pub enum SelserError {
    Normalize(NormalizeError),
    Emit(EmitError),
    Config(toml::de::Error),
}

impl fmt::Display for SelserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelserError::Normalize(err) => write!(f, "normalization failed: {err}"),
            SelserError::Emit(err) => write!(f, "{err}"),
            SelserError::Config(err) => write!(f, "invalid selser config: {err}"),
        }
    }
}

impl std::error::Error for SelserError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SelserError::Normalize(err) => Some(err),
            SelserError::Emit(err) => Some(err),
            SelserError::Config(err) => Some(err),
        }
    }
}

impl From<NormalizeError> for SelserError {
    fn from(err: NormalizeError) -> Self {
        SelserError::Normalize(err)
    }
}

impl From<EmitError> for SelserError {
    fn from(err: EmitError) -> Self {
        SelserError::Emit(err)
    }
}
