use thiserror::Error;

use crate::{parse::ParseError, symbol::Ty, util::Location};

// An error found while analysing a program, before it is run. These are normal,
// and should be rendered nicely to the programmer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SemanticError {
    #[error("identifier already declared: '{name}'")]
    DuplicateDeclaration { location: Location, name: String },

    #[error("undeclared identifier: '{name}'")]
    UndeclaredIdentifier { location: Location, name: String },

    #[error("undeclared procedure: '{name}'")]
    UndeclaredProcedure { location: Location, name: String },

    #[error("'{name}' is not callable")]
    NotCallable { location: Location, name: String },

    #[error("procedure '{name}' expects {expected} arguments, but {found} were passed")]
    ArityMismatch {
        location: Location,
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("mismatched types: expected {expected}, found {found}")]
    TypeMismatch {
        location: Location,
        expected: Ty,
        found: Ty,
    },

    #[error("unknown type: '{name}'")]
    UnknownType { location: Location, name: String },

    #[error("'{name}' is not a variable")]
    NotAVariable { location: Location, name: String },
}

impl SemanticError {
    pub fn location(&self) -> &Location {
        match self {
            SemanticError::DuplicateDeclaration { location, .. }
            | SemanticError::UndeclaredIdentifier { location, .. }
            | SemanticError::UndeclaredProcedure { location, .. }
            | SemanticError::NotCallable { location, .. }
            | SemanticError::ArityMismatch { location, .. }
            | SemanticError::TypeMismatch { location, .. }
            | SemanticError::UnknownType { location, .. }
            | SemanticError::NotAVariable { location, .. } => location,
        }
    }
}

// An error raised while running a program that passed analysis.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("invalid {ty} value for '{name}': {input:?}")]
    InvalidInputValue {
        location: Location,
        name: String,
        ty: Ty,
        input: String,
    },

    #[error("end of input while reading '{name}'")]
    UnexpectedEndOfInput { location: Location, name: String },

    #[error("variable '{name}' used before being assigned a value")]
    UninitializedVariable { location: Location, name: String },

    #[error("division by zero")]
    DivisionByZero { location: Location },

    #[error("integer overflow")]
    Overflow { location: Location },

    #[error("operator '{op}' cannot be applied to {value}")]
    InvalidOperand {
        location: Location,
        op: String,
        value: String,
    },

    #[error("procedure '{name}' exceeded the maximum call depth of {limit}")]
    RecursionLimit {
        location: Location,
        name: String,
        limit: usize,
    },

    #[error("i/o error: {source}")]
    Io {
        location: Location,
        #[source]
        source: std::io::Error,
    },
}

impl RuntimeError {
    pub fn location(&self) -> &Location {
        match self {
            RuntimeError::InvalidInputValue { location, .. }
            | RuntimeError::UnexpectedEndOfInput { location, .. }
            | RuntimeError::UninitializedVariable { location, .. }
            | RuntimeError::DivisionByZero { location }
            | RuntimeError::Overflow { location }
            | RuntimeError::InvalidOperand { location, .. }
            | RuntimeError::RecursionLimit { location, .. }
            | RuntimeError::Io { location, .. } => location,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Semantic(#[from] SemanticError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl Error {
    pub fn location(&self) -> Location {
        match self {
            Error::Parse(e) => e.location(),
            Error::Semantic(e) => e.location().clone(),
            Error::Runtime(e) => e.location().clone(),
        }
    }
}
