use std::fmt;
use bx_bytecode::AllocationError;
use thiserror::Error;
use crate::symbols::VarKind;

/// Approximate position of an error in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
    /// A short piece of the input remaining at the error
    pub snippet: String,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)?;
        if !self.snippet.is_empty() {
            write!(f, " near `{}`", self.snippet)?;
        }
        Ok(())
    }
}

/// Every error is fatal: compilation stops at the first one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("{message} at {location}")]
    Syntax { message: String, location: Location },

    #[error("Unterminated {literal} literal at {location}")]
    UnterminatedLiteral { literal: &'static str, location: Location },

    #[error("Undefined variable: {name} at {location}")]
    UndefinedVariable { name: String, location: Location },

    #[error("Variable {name} is not {expected} at {location}")]
    WrongVariableType { name: String, expected: VarKind, location: Location },

    #[error("Unknown identifier: {name} at {location}")]
    UnknownStatement { name: String, location: Location },

    #[error("Nested loops are not supported at {location}")]
    UnsupportedNestedLoop { location: Location },

    #[error("Too many variables (limit {limit}) at {location}")]
    CapacityExceeded { limit: usize, location: Location },

    #[error("Out of memory: {0}")]
    AllocationFailure(#[from] AllocationError),

    #[error("Jump offset {offset} does not fit in 16 bits at {location}")]
    JumpOutOfRange { offset: i64, location: Location },
}

impl CompileError {
    pub fn location(&self) -> Option<&Location> {
        match self {
            CompileError::Syntax { location, .. }
            | CompileError::UnterminatedLiteral { location, .. }
            | CompileError::UndefinedVariable { location, .. }
            | CompileError::WrongVariableType { location, .. }
            | CompileError::UnknownStatement { location, .. }
            | CompileError::UnsupportedNestedLoop { location }
            | CompileError::CapacityExceeded { location, .. }
            | CompileError::JumpOutOfRange { location, .. } => Some(location),
            CompileError::AllocationFailure(_) => None,
        }
    }
}

pub type CompileResult<T> = Result<T, CompileError>;
