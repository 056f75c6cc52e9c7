//! Error types for schedule parsing and compilation.

use std::fmt;

/// A prompt could not be turned into a schedule.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The step count was zero.
    InvalidSteps { steps: usize },
    /// A `when` field did not parse as a number.
    InvalidNumber { value: String },
    /// Nested directives exceeded the configured recursion ceiling.
    NestingTooDeep { limit: usize },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::InvalidSteps { steps } => {
                write!(f, "step count must be at least 1, got {steps}")
            }
            ParseError::InvalidNumber { value } => {
                write!(f, "invalid number '{value}' in directive")
            }
            ParseError::NestingTooDeep { limit } => {
                write!(f, "directives nested deeper than {limit} levels")
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Failure of a full compile: either the prompt or the encoder.
///
/// Encoder errors are carried unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError<E> {
    Parse(ParseError),
    Encode(E),
}

impl<E> From<ParseError> for CompileError<E> {
    fn from(e: ParseError) -> Self {
        CompileError::Parse(e)
    }
}

impl<E: fmt::Display> fmt::Display for CompileError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Parse(e) => write!(f, "{e}"),
            CompileError::Encode(e) => write!(f, "encoder failed: {e}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for CompileError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompileError::Parse(e) => Some(e),
            CompileError::Encode(e) => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_messages() {
        assert_eq!(
            ParseError::InvalidNumber { value: "x".into() }.to_string(),
            "invalid number 'x' in directive"
        );
        assert!(
            ParseError::NestingTooDeep { limit: 4 }
                .to_string()
                .contains('4')
        );
    }

    #[test]
    fn encode_error_passes_through() {
        let err: CompileError<String> = CompileError::Encode("model offline".into());
        assert_eq!(err.to_string(), "encoder failed: model offline");
        match err {
            CompileError::Encode(inner) => assert_eq!(inner, "model offline"),
            CompileError::Parse(_) => panic!("expected encode error"),
        }
    }

    #[test]
    fn parse_error_converts() {
        let err: CompileError<String> = ParseError::InvalidSteps { steps: 0 }.into();
        assert!(matches!(err, CompileError::Parse(ParseError::InvalidSteps { steps: 0 })));
    }
}
