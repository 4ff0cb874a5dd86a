/// Abstract Syntax Tree (AST) node types for GeneQL queries
///
/// The AST is context-free: `SELF` stays symbolic and no schema lookups have
/// happened yet. `Display` renders the canonical query text, which the parser
/// reads back into an equal tree.
use super::lexer::TokenKind;
use std::fmt;

/// A complete GeneQL query
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Get(GetQuery),
    Check(CheckQuery),
    Grant(GrantQuery),
    Revoke(RevokeQuery),
    Update(UpdateQuery),
    Delete(DeleteQuery),
}

/// The six operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Get,
    Check,
    Grant,
    Revoke,
    Update,
    Delete,
}

/// GET entity_ref [: projection] [WHERE cond_list]
#[derive(Debug, Clone, PartialEq)]
pub struct GetQuery {
    pub target: EntityRef,
    pub projection: Projection,
    pub filter: Option<Condition>,
}

/// CHECK subject CAN permission ON resource
#[derive(Debug, Clone, PartialEq)]
pub struct CheckQuery {
    pub subject: Reference,
    pub permission: String,
    pub resource: EntityRef,
}

/// GRANT permission ON resource TO subject
#[derive(Debug, Clone, PartialEq)]
pub struct GrantQuery {
    pub permission: String,
    pub resource: EntityRef,
    pub subject: Reference,
}

/// REVOKE permission ON resource FROM subject
#[derive(Debug, Clone, PartialEq)]
pub struct RevokeQuery {
    pub permission: String,
    pub resource: EntityRef,
    pub subject: Reference,
}

/// UPDATE entity_ref SET assignments [WHERE cond_list]
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateQuery {
    pub target: EntityRef,
    pub assignments: Vec<Assignment>,
    pub filter: Option<Condition>,
}

/// DELETE entity_ref [WHERE cond_list]
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteQuery {
    pub target: EntityRef,
    pub filter: Option<Condition>,
}

/// A subject position: an entity reference or the bare `SELF` token
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    Entity(EntityRef),
    Principal,
}

/// Entity type name plus an optional selector
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRef {
    pub entity: String,
    pub selector: Selector,
}

/// How an entity reference narrows its type
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// `User` - every row of the type
    All,
    /// `User.alice`
    Id(String),
    /// `User(username = "alice")`
    Conditions(Condition),
    /// `User.*`
    Wildcard,
    /// `User.SELF`
    Principal,
}

/// Which fields GET returns
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    All,
    Fields(Vec<String>),
}

/// `field = literal` inside SET
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub field: String,
    pub value: Literal,
}

/// Condition tree. A single `cond_list` level is either all-AND or all-OR.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        field: String,
        op: Comparator,
        value: Literal,
    },
    All(Vec<Condition>),
    Any(Vec<Condition>),
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Comparator {
    Eq, // =
    Ne, // !=
}

/// Literal values in queries
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// `SELF` used as a value
    Principal,
}

impl Query {
    /// Operation kind of this query
    pub fn kind(&self) -> OperationKind {
        match self {
            Query::Get(_) => OperationKind::Get,
            Query::Check(_) => OperationKind::Check,
            Query::Grant(_) => OperationKind::Grant,
            Query::Revoke(_) => OperationKind::Revoke,
            Query::Update(_) => OperationKind::Update,
            Query::Delete(_) => OperationKind::Delete,
        }
    }
}

impl OperationKind {
    /// Whether re-running the operation verbatim cannot double-apply it
    pub fn is_idempotent(&self) -> bool {
        !matches!(self, OperationKind::Update | OperationKind::Delete)
    }

    /// Whether the operation writes to the graph
    pub fn is_mutation(&self) -> bool {
        !matches!(self, OperationKind::Get | OperationKind::Check)
    }
}

impl EntityRef {
    /// `Type` with no selector
    pub fn all(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            selector: Selector::All,
        }
    }

    /// `Type(field = "value")`
    pub fn with_field(
        entity: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            entity: entity.into(),
            selector: Selector::Conditions(Condition::Compare {
                field: field.into(),
                op: Comparator::Eq,
                value: Literal::String(value.into()),
            }),
        }
    }
}

// Display implementations render canonical GeneQL text

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Get(q) => {
                write!(f, "GET {}", q.target)?;
                if let Projection::Fields(fields) = &q.projection {
                    write!(f, " : {}", fields.join(", "))?;
                }
                if let Some(filter) = &q.filter {
                    write!(f, " WHERE {}", TopLevel(filter))?;
                }
                Ok(())
            }
            Query::Check(q) => write!(
                f,
                "CHECK {} CAN {} ON {}",
                q.subject, q.permission, q.resource
            ),
            Query::Grant(q) => write!(
                f,
                "GRANT {} ON {} TO {}",
                q.permission, q.resource, q.subject
            ),
            Query::Revoke(q) => write!(
                f,
                "REVOKE {} ON {} FROM {}",
                q.permission, q.resource, q.subject
            ),
            Query::Update(q) => {
                write!(f, "UPDATE {} SET ", q.target)?;
                for (i, assignment) in q.assignments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", assignment.field, assignment.value)?;
                }
                if let Some(filter) = &q.filter {
                    write!(f, " WHERE {}", TopLevel(filter))?;
                }
                Ok(())
            }
            Query::Delete(q) => {
                write!(f, "DELETE {}", q.target)?;
                if let Some(filter) = &q.filter {
                    write!(f, " WHERE {}", TopLevel(filter))?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Get => write!(f, "GET"),
            OperationKind::Check => write!(f, "CHECK"),
            OperationKind::Grant => write!(f, "GRANT"),
            OperationKind::Revoke => write!(f, "REVOKE"),
            OperationKind::Update => write!(f, "UPDATE"),
            OperationKind::Delete => write!(f, "DELETE"),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Entity(entity) => write!(f, "{}", entity),
            Reference::Principal => write!(f, "SELF"),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.entity)?;
        match &self.selector {
            Selector::All => Ok(()),
            Selector::Id(id) => write!(f, ".{}", id),
            Selector::Conditions(cond) => write!(f, "({})", TopLevel(cond)),
            Selector::Wildcard => write!(f, ".*"),
            Selector::Principal => write!(f, ".SELF"),
        }
    }
}

/// A condition printed without surrounding parentheses
struct TopLevel<'a>(&'a Condition);

impl fmt::Display for TopLevel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Condition::Compare { field, op, value } => write!(f, "{} {} {}", field, op, value),
            Condition::All(items) => write_joined(f, items, "AND"),
            Condition::Any(items) => write_joined(f, items, "OR"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Condition], connective: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", connective)?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// Nested groups are parenthesized
impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Compare { .. } => write!(f, "{}", TopLevel(self)),
            _ => write!(f, "({})", TopLevel(self)),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparator::Eq => write!(f, "="),
            Comparator::Ne => write!(f, "!="),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => {
                write!(f, "\"")?;
                for ch in s.chars() {
                    match ch {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        other => write!(f, "{}", other)?,
                    }
                }
                write!(f, "\"")
            }
            Literal::Integer(i) => write!(f, "{}", i),
            // Debug keeps the fractional part, so the text re-lexes as a float
            Literal::Float(fl) => write!(f, "{:?}", fl),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Principal => write!(f, "{}", TokenKind::SelfRef),
        }
    }
}
