use std::{error::Error, fmt};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    Empty,

    InvalidCharacter { input: String, position: usize },

    LeadingDigit { input: String },
}

impl fmt::Display for IdentifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierError::Empty => write!(f, "Identifier is empty"),
            IdentifierError::InvalidCharacter { input, position } => {
                write!(
                    f,
                    "Invalid character at position {position} in identifier `{input}`"
                )
            }
            IdentifierError::LeadingDigit { input } => {
                write!(f, "Identifier `{input}` must not start with a digit")
            }
        }
    }
}

impl Error for IdentifierError {}

#[derive(Debug)]
pub enum TemporalError {
    ParseFailed {
        input: String,
        kind: &'static str,
        source: chrono::ParseError,
    },
}

impl fmt::Display for TemporalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemporalError::ParseFailed { input, kind, source } => {
                write!(f, "Failed to parse `{input}` as {kind}: {source}")
            }
        }
    }
}

impl Error for TemporalError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TemporalError::ParseFailed { source, .. } => Some(source),
        }
    }
}

pub type IdentifierResult<T> = std::result::Result<T, IdentifierError>;
pub type TemporalResult<T> = std::result::Result<T, TemporalError>;
