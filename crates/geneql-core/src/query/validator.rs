/// Semantic validation: AST + schema + principal -> Plan
///
/// Every name is resolved against the schema, every literal is typed against
/// the field it is compared with or assigned to, and `SELF` is bound to the
/// acting principal.
use super::ast::*;
use super::plan::{Access, FieldAssignment, Filter, Operation, Plan, Principal, Target};
use crate::schema::{EntityDef, EntityKind, FieldDef, Schema};
use crate::value::{FieldType, Value};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Categories of semantic failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticErrorKind {
    UnknownEntity,
    UnknownField,
    UnknownPermission,
    TypeMismatch,
    AmbiguousReference,
    MissingRequiredField,
    ImmutableField,
    InvalidSelf,
}

impl fmt::Display for SemanticErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SemanticErrorKind::UnknownEntity => "unknown entity",
            SemanticErrorKind::UnknownField => "unknown field",
            SemanticErrorKind::UnknownPermission => "unknown permission",
            SemanticErrorKind::TypeMismatch => "type mismatch",
            SemanticErrorKind::AmbiguousReference => "ambiguous reference",
            SemanticErrorKind::MissingRequiredField => "missing required field",
            SemanticErrorKind::ImmutableField => "immutable field",
            SemanticErrorKind::InvalidSelf => "invalid SELF",
        };
        write!(f, "{}", name)
    }
}

/// A query that parses but does not make sense against the schema.
///
/// `detail` names the offending element, e.g. `User.nickname`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {detail}")]
pub struct SemanticError {
    pub kind: SemanticErrorKind,
    pub detail: String,
}

impl SemanticError {
    fn new(kind: SemanticErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

type Result<T> = std::result::Result<T, SemanticError>;

/// Resolves queries against a schema
pub struct Validator<'s> {
    schema: &'s Schema,
    fingerprint: u32,
}

impl<'s> Validator<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            fingerprint: schema.fingerprint(),
        }
    }

    /// Validate `query` for `principal` and produce a plan
    pub fn validate(&self, query: &Query, principal: &Principal) -> Result<Plan> {
        let scope = Scope {
            schema: self.schema,
            principal: self.principal_entity(principal)?,
            principal_id: &principal.id,
        };

        let operation = match query {
            Query::Get(q) => scope.get(q)?,
            Query::Check(q) => Operation::Check(scope.access(&q.subject, &q.permission, &q.resource)?),
            Query::Grant(q) => Operation::Grant(scope.access(&q.subject, &q.permission, &q.resource)?),
            Query::Revoke(q) => {
                Operation::Revoke(scope.access(&q.subject, &q.permission, &q.resource)?)
            }
            Query::Update(q) => scope.update(q)?,
            Query::Delete(q) => {
                let (def, target) = scope.target(&q.target, q.filter.as_ref())?;
                Operation::Delete {
                    target,
                    kind: def.kind,
                    owner_field: def.owner_field().map(str::to_string),
                }
            }
        };

        Ok(Plan {
            schema_version: self.fingerprint,
            principal: principal.clone(),
            operation,
        })
    }

    fn principal_entity(&self, principal: &Principal) -> Result<&'s EntityDef> {
        match self.schema.entity(&principal.entity) {
            Some(def) if def.kind == EntityKind::Principal => Ok(def),
            Some(_) => Err(SemanticError::new(
                SemanticErrorKind::UnknownEntity,
                format!("acting principal type '{}' is not a principal entity", principal.entity),
            )),
            None => Err(SemanticError::new(
                SemanticErrorKind::UnknownEntity,
                format!("acting principal type '{}'", principal.entity),
            )),
        }
    }
}

/// Per-query resolution state
struct Scope<'s, 'p> {
    schema: &'s Schema,
    principal: &'s EntityDef,
    principal_id: &'p str,
}

impl<'s> Scope<'s, '_> {
    fn get(&self, query: &GetQuery) -> Result<Operation> {
        let (def, target) = self.target(&query.target, query.filter.as_ref())?;
        let projection = match &query.projection {
            Projection::All => def.field_names().map(str::to_string).collect(),
            Projection::Fields(fields) => {
                for field in fields {
                    self.field(def, field)?;
                }
                fields.clone()
            }
        };
        Ok(Operation::Get { target, projection })
    }

    fn update(&self, query: &UpdateQuery) -> Result<Operation> {
        let (def, target) = self.target(&query.target, query.filter.as_ref())?;

        let mut seen = HashSet::new();
        let mut assignments = Vec::with_capacity(query.assignments.len());
        for assignment in &query.assignments {
            let field = self.field(def, &assignment.field)?;
            if field.name == "id" {
                return Err(SemanticError::new(
                    SemanticErrorKind::ImmutableField,
                    format!("{}.id cannot be assigned", def.name),
                ));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(SemanticError::new(
                    SemanticErrorKind::AmbiguousReference,
                    format!("{}.{} is assigned more than once", def.name, field.name),
                ));
            }
            assignments.push(FieldAssignment {
                field: field.name.clone(),
                value: self.coerce(def, field, &assignment.value)?,
                field_type: field.field_type,
            });
        }

        Ok(Operation::Update {
            target,
            assignments,
            owner_field: def.owner_field().map(str::to_string),
        })
    }

    fn access(&self, subject: &Reference, permission: &str, resource: &EntityRef) -> Result<Access> {
        let subject = match subject {
            Reference::Principal => Target {
                entity: self.principal.name.clone(),
                filter: Filter::id_equals(self.principal_id),
            },
            Reference::Entity(entity_ref) => {
                self.single_row(entity_ref, EntityKind::Principal)?.1
            }
        };

        if !self.schema.has_permission(permission) {
            return Err(SemanticError::new(
                SemanticErrorKind::UnknownPermission,
                permission,
            ));
        }

        let (def, resource) = self.single_row(resource, EntityKind::Resource)?;
        let owner_field = def.owner_field().unwrap_or_default().to_string();

        Ok(Access {
            subject,
            permission: permission.to_string(),
            resource,
            owner_field,
        })
    }

    /// Target of GET, UPDATE and DELETE: selector combined with WHERE
    fn target(&self, entity_ref: &EntityRef, filter: Option<&Condition>) -> Result<(&'s EntityDef, Target)> {
        let def = self.entity(&entity_ref.entity)?;

        let selected = match &entity_ref.selector {
            Selector::All => Filter::All,
            Selector::Conditions(cond) => self.lower(def, cond)?,
            Selector::Wildcard => {
                return Err(SemanticError::new(
                    SemanticErrorKind::AmbiguousReference,
                    format!("{}.* is only valid as a GET projection", def.name),
                ))
            }
            Selector::Id(_) | Selector::Principal if filter.is_some() => {
                return Err(SemanticError::new(
                    SemanticErrorKind::AmbiguousReference,
                    format!("{} names a row and also has a WHERE clause", entity_ref),
                ))
            }
            Selector::Id(id) => Filter::id_equals(id.as_str()),
            Selector::Principal => self.principal_row(def)?,
        };

        let filter = match filter {
            Some(cond) => selected.and(self.lower(def, cond)?),
            None => selected,
        };

        Ok((
            def,
            Target {
                entity: def.name.clone(),
                filter,
            },
        ))
    }

    /// Reference that must denote exactly one row of the given kind
    fn single_row(&self, entity_ref: &EntityRef, kind: EntityKind) -> Result<(&'s EntityDef, Target)> {
        let def = self.entity(&entity_ref.entity)?;
        if def.kind != kind {
            return Err(SemanticError::new(
                SemanticErrorKind::UnknownEntity,
                format!("{} is not a {} entity", def.name, kind),
            ));
        }

        let filter = match &entity_ref.selector {
            Selector::Id(id) => Filter::id_equals(id.as_str()),
            Selector::Principal => self.principal_row(def)?,
            Selector::All | Selector::Wildcard => {
                return Err(SemanticError::new(
                    SemanticErrorKind::AmbiguousReference,
                    format!("{} does not name a single row", entity_ref),
                ))
            }
            Selector::Conditions(cond) => {
                let mut equalities = Vec::new();
                collect_equalities(cond, &mut equalities).ok_or_else(|| {
                    SemanticError::new(
                        SemanticErrorKind::AmbiguousReference,
                        format!("{} must use only '=' joined by AND", entity_ref),
                    )
                })?;
                if !equalities.iter().any(|(field, _)| def.is_unique(field)) {
                    return Err(SemanticError::new(
                        SemanticErrorKind::MissingRequiredField,
                        format!("{} must pin id or a unique field", entity_ref),
                    ));
                }
                self.lower(def, cond)?
            }
        };

        Ok((
            def,
            Target {
                entity: def.name.clone(),
                filter,
            },
        ))
    }

    fn principal_row(&self, def: &EntityDef) -> Result<Filter> {
        if def.name != self.principal.name {
            return Err(SemanticError::new(
                SemanticErrorKind::InvalidSelf,
                format!("{}.SELF but the principal is a {}", def.name, self.principal.name),
            ));
        }
        Ok(Filter::id_equals(self.principal_id))
    }

    fn lower(&self, def: &EntityDef, cond: &Condition) -> Result<Filter> {
        match cond {
            Condition::Compare { field, op, value } => {
                let field = self.field(def, field)?;
                Ok(Filter::Compare {
                    field: field.name.clone(),
                    op: *op,
                    value: self.coerce(def, field, value)?,
                })
            }
            Condition::All(items) => Ok(Filter::And(
                items
                    .iter()
                    .map(|c| self.lower(def, c))
                    .collect::<Result<_>>()?,
            )),
            Condition::Any(items) => Ok(Filter::Or(
                items
                    .iter()
                    .map(|c| self.lower(def, c))
                    .collect::<Result<_>>()?,
            )),
        }
    }

    fn coerce(&self, def: &EntityDef, field: &FieldDef, literal: &Literal) -> Result<Value> {
        let value = match (field.field_type, literal) {
            (FieldType::String, Literal::String(s)) => Value::String(s.clone()),
            (FieldType::String, Literal::Principal) => Value::String(self.principal_id.to_string()),
            (FieldType::Number, Literal::Integer(i)) => Value::Integer(*i),
            (FieldType::Number, Literal::Float(f)) => Value::Float(*f),
            (FieldType::Boolean, Literal::Boolean(b)) => Value::Boolean(*b),
            (FieldType::Timestamp, Literal::String(s)) => {
                let ts = DateTime::parse_from_rfc3339(s).map_err(|_| {
                    SemanticError::new(
                        SemanticErrorKind::TypeMismatch,
                        format!("{}.{}: {:?} is not an RFC 3339 timestamp", def.name, field.name, s),
                    )
                })?;
                Value::Timestamp(ts.with_timezone(&Utc))
            }
            (expected, literal) => {
                return Err(SemanticError::new(
                    SemanticErrorKind::TypeMismatch,
                    format!(
                        "{}.{} is {}, found {}",
                        def.name,
                        field.name,
                        expected,
                        literal_type(literal)
                    ),
                ))
            }
        };
        Ok(value)
    }

    fn entity(&self, name: &str) -> Result<&'s EntityDef> {
        self.schema
            .entity(name)
            .ok_or_else(|| SemanticError::new(SemanticErrorKind::UnknownEntity, name))
    }

    fn field<'d>(&self, def: &'d EntityDef, name: &str) -> Result<&'d FieldDef> {
        def.field(name).ok_or_else(|| {
            SemanticError::new(
                SemanticErrorKind::UnknownField,
                format!("{}.{}", def.name, name),
            )
        })
    }
}

/// Flatten a purely conjunctive equality tree; `None` if it has OR or `!=`
fn collect_equalities<'c>(cond: &'c Condition, out: &mut Vec<(&'c str, &'c Literal)>) -> Option<()> {
    match cond {
        Condition::Compare {
            field,
            op: Comparator::Eq,
            value,
        } => {
            out.push((field, value));
            Some(())
        }
        Condition::Compare { .. } | Condition::Any(_) => None,
        Condition::All(items) => items.iter().try_for_each(|c| collect_equalities(c, out)),
    }
}

fn literal_type(literal: &Literal) -> &'static str {
    match literal {
        Literal::String(_) => "string literal",
        Literal::Integer(_) | Literal::Float(_) => "number literal",
        Literal::Boolean(_) => "boolean literal",
        Literal::Principal => "SELF",
    }
}
