/// Compiled, validated query plans
///
/// A plan is what the evaluator runs: every entity and field is resolved
/// against the schema, literals are typed values, and `SELF` has been
/// replaced by the principal the plan was compiled for.
use super::ast::{Comparator, OperationKind};
use crate::schema::EntityKind;
use crate::value::{FieldType, Row, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The acting user a plan is bound to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub entity: String,
    pub id: String,
}

impl Principal {
    pub fn new(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.entity, self.id)
    }
}

/// Row predicate evaluated against stored rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    /// Matches every row
    All,
    Compare {
        field: String,
        op: Comparator,
        value: Value,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    /// `id = "<id>"`
    pub fn id_equals(id: impl Into<String>) -> Self {
        Filter::Compare {
            field: "id".to_string(),
            op: Comparator::Eq,
            value: Value::String(id.into()),
        }
    }

    /// Conjunction that does not nest `All`
    pub fn and(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), f) => {
                left.push(f);
                Filter::And(left)
            }
            (f, Filter::And(mut right)) => {
                right.insert(0, f);
                Filter::And(right)
            }
            (left, right) => Filter::And(vec![left, right]),
        }
    }

    /// Whether `row` satisfies the predicate. Missing fields read as null.
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Filter::All => true,
            Filter::Compare { field, op, value } => {
                let actual = row.get(field).unwrap_or(&Value::Null);
                let equal = actual.loosely_equals(value);
                match op {
                    Comparator::Eq => equal,
                    Comparator::Ne => !equal,
                }
            }
            Filter::And(items) => items.iter().all(|f| f.matches(row)),
            Filter::Or(items) => items.iter().any(|f| f.matches(row)),
        }
    }

    /// The id this filter pins, when it is a plain `id = "..."` test
    pub fn pinned_id(&self) -> Option<&str> {
        match self {
            Filter::Compare {
                field,
                op: Comparator::Eq,
                value: Value::String(id),
            } if field == "id" => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::All => write!(f, "*"),
            Filter::Compare { field, op, value } => write!(f, "{} {} {}", field, op, value),
            Filter::And(items) | Filter::Or(items) => {
                let connective = if matches!(self, Filter::And(_)) { "AND" } else { "OR" };
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", connective)?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Entity type plus the predicate that selects its rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub entity: String,
    pub filter: Filter,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.entity, self.filter)
    }
}

/// Operands of CHECK, GRANT and REVOKE. Both targets denote a single row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Access {
    pub subject: Target,
    pub permission: String,
    pub resource: Target,
    /// Field of the resource row holding its owner's id
    pub owner_field: String,
}

/// `field = value` with the declared type, re-checked at run time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAssignment {
    pub field: String,
    pub value: Value,
    pub field_type: FieldType,
}

/// What a plan does
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    Get {
        target: Target,
        /// Fields to return, in output order
        projection: Vec<String>,
    },
    Check(Access),
    Grant(Access),
    Revoke(Access),
    Update {
        target: Target,
        assignments: Vec<FieldAssignment>,
        /// Set when the rows are resources: the principal needs `admin`
        /// on every matched row, judged through this owner field
        owner_field: Option<String>,
    },
    Delete {
        target: Target,
        kind: EntityKind,
        owner_field: Option<String>,
    },
}

/// A validated, principal-bound query ready for evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Fingerprint of the schema the plan was compiled against
    pub schema_version: u32,
    pub principal: Principal,
    pub operation: Operation,
}

impl Plan {
    pub fn kind(&self) -> OperationKind {
        match self.operation {
            Operation::Get { .. } => OperationKind::Get,
            Operation::Check(_) => OperationKind::Check,
            Operation::Grant(_) => OperationKind::Grant,
            Operation::Revoke(_) => OperationKind::Revoke,
            Operation::Update { .. } => OperationKind::Update,
            Operation::Delete { .. } => OperationKind::Delete,
        }
    }

    /// Whether a caller may re-run this plan after a retryable store error
    pub fn is_retry_safe(&self) -> bool {
        self.kind().is_idempotent()
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operation {
            Operation::Get { target, projection } => {
                write!(f, "Get {} -> [{}]", target, projection.join(", "))?
            }
            Operation::Check(access) | Operation::Grant(access) | Operation::Revoke(access) => {
                write!(
                    f,
                    "{} {} {} on {}",
                    self.kind(),
                    access.subject,
                    access.permission,
                    access.resource
                )?
            }
            Operation::Update {
                target,
                assignments,
                ..
            } => {
                write!(f, "Update {} set ", target)?;
                for (i, a) in assignments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", a.field, a.value)?;
                }
            }
            Operation::Delete { target, kind, .. } => write!(f, "Delete {} ({})", target, kind)?,
        }
        write!(
            f,
            " as {} (schema {:08x})",
            self.principal, self.schema_version
        )
    }
}
