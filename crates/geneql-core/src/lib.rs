//! # GeneQL Core
//!
//! Compiler for the GeneQL authorization query language: text is lexed,
//! parsed into an AST, and validated against a [`Schema`] into a [`Plan`].

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Plan envelope encoding
#[allow(missing_docs)]
pub mod codec;
pub mod error;
pub mod query;
/// Entity and permission schema
#[allow(missing_docs)]
pub mod schema;
pub mod value;

pub use codec::CodecError;
pub use error::{CompileError, Result};
pub use query::*;
pub use schema::{EntityDef, EntityKind, FieldDef, Schema, SchemaError};
pub use value::{FieldType, Row, Value};

use tracing::debug;

/// Compile query text into a plan bound to `principal`.
///
/// Stages run in order and stop at the first error.
pub fn compile(text: &str, schema: &Schema, principal: &Principal) -> Result<Plan> {
    let query = parse(text)?;
    debug!(kind = %query.kind(), "parsed query");

    let plan = Validator::new(schema).validate(&query, principal)?;
    debug!(plan = %plan, "validated query");

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_end_to_end() {
        let schema = Schema::genesis();
        let principal = Principal::new("User", "alice");
        let plan = compile(
            r#"CHECK User(id = "alice") CAN read ON Resource(id = "doc1")"#,
            &schema,
            &principal,
        )
        .unwrap();
        assert_eq!(plan.kind(), OperationKind::Check);
        assert_eq!(plan.principal, principal);
    }

    #[test]
    fn test_compile_stops_at_first_error() {
        let schema = Schema::genesis();
        let principal = Principal::new("User", "alice");

        let err = compile("GET Nothing WHERE", &schema, &principal).unwrap_err();
        assert!(matches!(err, CompileError::Syntax(_)));

        let err = compile("GET Nothing", &schema, &principal).unwrap_err();
        assert!(matches!(
            err,
            CompileError::Semantic(SemanticError {
                kind: SemanticErrorKind::UnknownEntity,
                ..
            })
        ));
        assert!(err.position().is_none());
    }
}
