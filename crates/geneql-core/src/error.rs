//! Compile-time error types for GeneQL.

use crate::query::lexer::{LexError, Position};
use crate::query::parser::SyntaxError;
use crate::query::validator::SemanticError;
use thiserror::Error;

/// Any failure turning query text into a plan.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// The text could not be tokenized
    #[error(transparent)]
    Lex(#[from] LexError),

    /// The tokens do not form a query
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// The query does not fit the schema
    #[error(transparent)]
    Semantic(#[from] SemanticError),
}

impl CompileError {
    /// Source position for lexical and syntax errors
    pub fn position(&self) -> Option<Position> {
        match self {
            CompileError::Lex(e) => Some(e.position),
            CompileError::Syntax(e) => Some(e.position),
            CompileError::Semantic(_) => None,
        }
    }
}

/// A specialized `Result` type for compilation.
pub type Result<T> = std::result::Result<T, CompileError>;
