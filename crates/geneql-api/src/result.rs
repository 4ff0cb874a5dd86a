//! Flattened query results for clients that want one shape for every call.

use crate::error::GeneQLError;
use geneql_engine::Outcome;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Success flag plus either JSON data or an error message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl QueryResult {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: impl fmt::Display) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
        }
    }
}

impl From<Result<Outcome, GeneQLError>> for QueryResult {
    fn from(result: Result<Outcome, GeneQLError>) -> Self {
        match result {
            Ok(outcome) => QueryResult::ok(outcome.to_json()),
            Err(e) => QueryResult::err(e),
        }
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.data, &self.error) {
            (_, Some(error)) if !self.success => write!(f, "QueryResult(success=false, error={})", error),
            (Some(data), _) => write!(f, "QueryResult(success=true, data={})", data),
            _ => write!(f, "QueryResult(success={})", self.success),
        }
    }
}
