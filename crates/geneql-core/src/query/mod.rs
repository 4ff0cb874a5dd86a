/// Query compiler
///
/// GeneQL lexing, parsing, validation and the compiled plan.
/// Abstract Syntax Tree types
#[allow(missing_docs)]
pub mod ast;
/// GeneQL lexer
#[allow(missing_docs)]
pub mod lexer;
/// GeneQL parser
#[allow(missing_docs)]
pub mod parser;
/// Compiled plans
#[allow(missing_docs)]
pub mod plan;
/// Schema validation
#[allow(missing_docs)]
pub mod validator;

// Re-export main types
pub use ast::*;
pub use lexer::{tokenize, LexError, LexErrorKind, Lexer, Position, Token, TokenKind};
pub use parser::{parse, parse_tokens, Parser, SyntaxError};
pub use plan::{Access, FieldAssignment, Filter, Operation, Plan, Principal, Target};
pub use validator::{SemanticError, SemanticErrorKind, Validator};
