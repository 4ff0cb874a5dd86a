//! Evaluation results.

use crate::graph::{DeleteReport, EdgeKey, PermissionEdge};
use geneql_core::Value;
use serde_json::json;
use std::fmt;

/// A projected field of a returned row
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub value: Value,
}

/// A row returned by GET, with fields in projection order
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub entity: String,
    pub id: String,
    pub fields: Vec<Field>,
}

impl Record {
    /// Value of a projected field
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }
}

/// Allow or deny
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// Which rule decided a check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    /// A permission edge exists
    DirectGrant,
    /// The subject owns the resource
    Ownership,
    /// Nothing allowed it
    NoGrant,
}

/// Result of the decision algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOutcome {
    pub decision: Decision,
    pub reason: DecisionReason,
}

impl CheckOutcome {
    pub fn allow(reason: DecisionReason) -> Self {
        Self {
            decision: Decision::Allow,
            reason,
        }
    }

    pub fn deny() -> Self {
        Self {
            decision: Decision::Deny,
            reason: DecisionReason::NoGrant,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.decision == Decision::Allow
    }
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.decision, self.reason) {
            (Decision::Allow, DecisionReason::DirectGrant) => write!(f, "allow (direct grant)"),
            (Decision::Allow, DecisionReason::Ownership) => write!(f, "allow (owner)"),
            (Decision::Allow, DecisionReason::NoGrant) => write!(f, "allow"),
            (Decision::Deny, _) => write!(f, "deny"),
        }
    }
}

/// What evaluating a plan produced
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// GET
    Records(Vec<Record>),
    /// CHECK
    Decision(CheckOutcome),
    /// GRANT; `created` is false when an existing edge was refreshed
    Granted { edge: PermissionEdge, created: bool },
    /// REVOKE; `removed` is false when there was nothing to revoke
    Revoked { key: EdgeKey, removed: bool },
    /// UPDATE
    Updated { entity: String, count: usize },
    /// DELETE
    Deleted { entity: String, report: DeleteReport },
}

impl Outcome {
    /// Plain JSON rendering for clients
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Outcome::Records(records) => serde_json::Value::Array(
                records
                    .iter()
                    .map(|record| {
                        let fields: serde_json::Map<String, serde_json::Value> = record
                            .fields
                            .iter()
                            .map(|f| (f.name.clone(), f.value.to_json()))
                            .collect();
                        json!({
                            "entity": record.entity,
                            "id": record.id,
                            "fields": fields,
                        })
                    })
                    .collect(),
            ),
            Outcome::Decision(check) => {
                let reason = match check.reason {
                    DecisionReason::DirectGrant => "direct_grant",
                    DecisionReason::Ownership => "ownership",
                    DecisionReason::NoGrant => "no_grant",
                };
                json!({ "allowed": check.is_allowed(), "reason": reason })
            }
            Outcome::Granted { edge, created } => json!({
                "edge": edge.to_json(),
                "created": created,
            }),
            Outcome::Revoked { key, removed } => json!({
                "subject": key.subject.to_string(),
                "object": key.object.to_string(),
                "permission": key.permission,
                "removed": removed,
            }),
            Outcome::Updated { entity, count } => json!({
                "entity": entity,
                "updated": count,
            }),
            Outcome::Deleted { entity, report } => json!({
                "entity": entity,
                "deleted": report.rows,
                "edges_removed": report.edges_removed,
                "grants_orphaned": report.grants_orphaned,
            }),
        }
    }

    /// The decision of a CHECK
    pub fn as_decision(&self) -> Option<&CheckOutcome> {
        match self {
            Outcome::Decision(check) => Some(check),
            _ => None,
        }
    }

    /// The rows of a GET
    pub fn records(&self) -> Option<&[Record]> {
        match self {
            Outcome::Records(records) => Some(records),
            _ => None,
        }
    }
}
