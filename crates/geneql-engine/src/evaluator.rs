//! Plan evaluation against the authorization graph.
//!
//! Reads run on a snapshot. Every mutating plan runs inside one store
//! transaction, so a failure at any step leaves the graph untouched.

use crate::error::{Result, RuntimeError, StoreError};
use crate::graph::{
    CascadeRule, EdgeKey, EdgeRemoval, EdgeUpsert, EdgeWrite, GraphRead, GraphStore,
    GraphTransaction, NodeRef, PermissionEdge, RowDeletion,
};
use crate::interrupt::{CancellationToken, Interrupt};
use crate::outcome::{CheckOutcome, DecisionReason, Field, Outcome, Record};
use chrono::Utc;
use geneql_core::schema::ADMIN_PERMISSION;
use geneql_core::{
    Access, EntityKind, FieldAssignment, OperationKind, Operation, Plan, Principal, Row, Target,
};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Who is running a plan, and when to give up
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub principal: Principal,
    pub interrupt: Interrupt,
}

impl ExecutionContext {
    pub fn new(principal: Principal) -> Self {
        Self {
            principal,
            interrupt: Interrupt::none(),
        }
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.interrupt = self.interrupt.with_token(token);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.interrupt = self.interrupt.with_deadline(deadline);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.interrupt = self.interrupt.with_timeout(timeout);
        self
    }
}

/// Executes plans against a graph store
pub struct Evaluator<'g> {
    graph: &'g dyn GraphStore,
}

impl<'g> Evaluator<'g> {
    pub fn new(graph: &'g dyn GraphStore) -> Self {
        Self { graph }
    }

    /// Execute `plan` on behalf of `ctx.principal`
    pub fn execute(&self, plan: &Plan, ctx: &ExecutionContext) -> Result<Outcome> {
        if plan.principal != ctx.principal {
            return Err(RuntimeError::PrincipalMismatch {
                plan: plan.principal.to_string(),
                caller: ctx.principal.to_string(),
            });
        }

        let result = self.dispatch(plan, ctx);
        match &result {
            Err(RuntimeError::Store(e @ (StoreError::Cancelled | StoreError::DeadlineExceeded))) => {
                warn!(kind = %plan.kind(), principal = %ctx.principal, error = %e, "evaluation interrupted");
            }
            Err(e) => debug!(kind = %plan.kind(), error = %e, "evaluation failed"),
            Ok(_) => {}
        }
        result
    }

    fn dispatch(&self, plan: &Plan, ctx: &ExecutionContext) -> Result<Outcome> {
        ctx.interrupt.check()?;

        match &plan.operation {
            Operation::Get { target, projection } => {
                let snapshot = self.graph.snapshot()?;
                ctx.interrupt.check()?;
                let rows = snapshot.find(&target.entity, &target.filter)?;
                let records = rows
                    .iter()
                    .map(|row| project(&target.entity, row, projection))
                    .collect();
                Ok(Outcome::Records(records))
            }
            Operation::Check(access) => {
                let snapshot = self.graph.snapshot()?;
                let (subject, _) = resolve_one(&*snapshot, &access.subject, ctx)?;
                let (resource, resource_row) = resolve_one(&*snapshot, &access.resource, ctx)?;
                ctx.interrupt.check()?;
                let check = decide(
                    &*snapshot,
                    &subject,
                    &access.permission,
                    &resource,
                    &resource_row,
                    &access.owner_field,
                )?;
                debug!(subject = %subject, permission = %access.permission, resource = %resource, decision = %check, "checked access");
                Ok(Outcome::Decision(check))
            }
            Operation::Grant(access) => self.grant(access, ctx),
            Operation::Revoke(access) => self.revoke(access, ctx),
            Operation::Update {
                target,
                assignments,
                owner_field,
            } => self.update(target, assignments, owner_field.as_deref(), ctx),
            Operation::Delete {
                target,
                kind,
                owner_field,
            } => self.delete(target, *kind, owner_field.as_deref(), ctx),
        }
    }

    fn grant(&self, access: &Access, ctx: &ExecutionContext) -> Result<Outcome> {
        let (edge, upsert) = self.in_transaction(ctx, |tx| {
            let (subject, resource) = delegate(&*tx, access, OperationKind::Grant, ctx)?;
            let edge = PermissionEdge {
                key: EdgeKey::new(subject, resource, access.permission.as_str()),
                granted_at: Utc::now(),
                granted_by: Some(NodeRef::from(&ctx.principal)),
            };
            ctx.interrupt.check()?;
            let upsert = tx.upsert_edge(EdgeWrite::new(edge.clone()))?;
            Ok((edge, upsert))
        })?;

        info!(edge = %edge.key, by = %ctx.principal, refreshed = (upsert == EdgeUpsert::Refreshed), "permission granted");
        Ok(Outcome::Granted {
            edge,
            created: upsert == EdgeUpsert::Created,
        })
    }

    fn revoke(&self, access: &Access, ctx: &ExecutionContext) -> Result<Outcome> {
        let (key, removed) = self.in_transaction(ctx, |tx| {
            let (subject, resource) = delegate(&*tx, access, OperationKind::Revoke, ctx)?;
            let key = EdgeKey::new(subject, resource, access.permission.as_str());
            ctx.interrupt.check()?;
            let removed = tx.delete_edge(EdgeRemoval::new(key.clone()))?;
            Ok((key, removed))
        })?;

        info!(edge = %key, by = %ctx.principal, removed, "permission revoked");
        Ok(Outcome::Revoked { key, removed })
    }

    fn update(
        &self,
        target: &Target,
        assignments: &[FieldAssignment],
        owner_field: Option<&str>,
        ctx: &ExecutionContext,
    ) -> Result<Outcome> {
        for assignment in assignments {
            if !assignment.value.conforms_to(assignment.field_type) {
                return Err(RuntimeError::TypeMismatch {
                    entity: target.entity.clone(),
                    field: assignment.field.clone(),
                    expected: assignment.field_type.to_string(),
                    actual: assignment.value.type_name().to_string(),
                });
            }
        }
        let values: Vec<_> = assignments
            .iter()
            .map(|a| (a.field.clone(), a.value.clone()))
            .collect();

        let count = self.in_transaction(ctx, |tx| {
            ctx.interrupt.check()?;
            let rows = tx.find(&target.entity, &target.filter)?;
            if let Some(owner_field) = owner_field {
                guard_rows(&*tx, &target.entity, &rows, owner_field, OperationKind::Update, ctx)?;
            }
            for row in &rows {
                ctx.interrupt.check()?;
                tx.update_fields(&target.entity, row.id(), &values)?;
            }
            Ok(rows.len())
        })?;

        info!(entity = %target.entity, filter = %target.filter, count, by = %ctx.principal, "rows updated");
        Ok(Outcome::Updated {
            entity: target.entity.clone(),
            count,
        })
    }

    fn delete(
        &self,
        target: &Target,
        kind: EntityKind,
        owner_field: Option<&str>,
        ctx: &ExecutionContext,
    ) -> Result<Outcome> {
        let cascade = match kind {
            EntityKind::Resource => vec![CascadeRule::RemoveEdgesAsObject],
            EntityKind::Principal => {
                vec![CascadeRule::RemoveEdgesAsSubject, CascadeRule::ClearGrantor]
            }
        };

        let report = self.in_transaction(ctx, |tx| {
            ctx.interrupt.check()?;
            if let Some(owner_field) = owner_field {
                let rows = tx.find(&target.entity, &target.filter)?;
                guard_rows(&*tx, &target.entity, &rows, owner_field, OperationKind::Delete, ctx)?;
            }
            let deletion = RowDeletion::new(target.entity.as_str(), target.filter.clone(), cascade);
            Ok(tx.delete_rows(deletion)?)
        })?;

        info!(
            entity = %target.entity,
            rows = report.rows,
            edges_removed = report.edges_removed,
            grants_orphaned = report.grants_orphaned,
            by = %ctx.principal,
            "rows deleted"
        );
        Ok(Outcome::Deleted {
            entity: target.entity.clone(),
            report,
        })
    }

    /// Run `f` in a transaction: commit on success, roll back on error
    fn in_transaction<T>(
        &self,
        ctx: &ExecutionContext,
        f: impl FnOnce(&mut (dyn GraphTransaction + 'g)) -> Result<T>,
    ) -> Result<T> {
        let mut tx = self.graph.begin_transaction(&ctx.interrupt)?;
        match f(&mut *tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback() {
                    warn!(error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }
}

/// Resolve both operands and require `admin` on the resource for the principal
fn delegate<R: GraphRead + ?Sized>(
    reader: &R,
    access: &Access,
    kind: OperationKind,
    ctx: &ExecutionContext,
) -> Result<(NodeRef, NodeRef)> {
    let (subject, _) = resolve_one(reader, &access.subject, ctx)?;
    let (resource, resource_row) = resolve_one(reader, &access.resource, ctx)?;

    ctx.interrupt.check()?;
    let principal = NodeRef::from(&ctx.principal);
    let authority = decide(
        reader,
        &principal,
        ADMIN_PERMISSION,
        &resource,
        &resource_row,
        &access.owner_field,
    )?;
    if !authority.is_allowed() {
        warn!(principal = %principal, action = %kind, resource = %resource, "delegation denied");
        return Err(RuntimeError::Forbidden {
            principal: principal.to_string(),
            action: kind.to_string(),
            resource: resource.to_string(),
            required: ADMIN_PERMISSION.to_string(),
        });
    }

    Ok((subject, resource))
}

/// Require `admin` for the principal on every matched resource row
fn guard_rows<R: GraphRead + ?Sized>(
    reader: &R,
    entity: &str,
    rows: &[Row],
    owner_field: &str,
    kind: OperationKind,
    ctx: &ExecutionContext,
) -> Result<()> {
    let principal = NodeRef::from(&ctx.principal);
    for row in rows {
        ctx.interrupt.check()?;
        let resource = NodeRef::new(entity, row.id());
        let authority = decide(reader, &principal, ADMIN_PERMISSION, &resource, row, owner_field)?;
        if !authority.is_allowed() {
            warn!(principal = %principal, action = %kind, resource = %resource, "mutation denied");
            return Err(RuntimeError::Forbidden {
                principal: principal.to_string(),
                action: kind.to_string(),
                resource: resource.to_string(),
                required: ADMIN_PERMISSION.to_string(),
            });
        }
    }
    Ok(())
}

/// The decision algorithm: direct edge, then ownership, else deny
fn decide<R: GraphRead + ?Sized>(
    reader: &R,
    subject: &NodeRef,
    permission: &str,
    resource: &NodeRef,
    resource_row: &Row,
    owner_field: &str,
) -> std::result::Result<CheckOutcome, StoreError> {
    let key = EdgeKey::new(subject.clone(), resource.clone(), permission);
    if reader.find_edge(&key)?.is_some() {
        return Ok(CheckOutcome::allow(DecisionReason::DirectGrant));
    }

    let owner = resource_row.get(owner_field).and_then(|v| v.as_str());
    if owner == Some(subject.id.as_str()) {
        return Ok(CheckOutcome::allow(DecisionReason::Ownership));
    }

    Ok(CheckOutcome::deny())
}

/// Find exactly one row for a single-row reference
fn resolve_one<R: GraphRead + ?Sized>(
    reader: &R,
    target: &Target,
    ctx: &ExecutionContext,
) -> Result<(NodeRef, Row)> {
    ctx.interrupt.check()?;
    let mut rows = reader.find(&target.entity, &target.filter)?;
    match rows.len() {
        0 => Err(RuntimeError::NotFound {
            entity: target.entity.clone(),
            filter: target.filter.to_string(),
        }),
        1 => {
            let row = rows.remove(0);
            Ok((NodeRef::new(target.entity.as_str(), row.id()), row))
        }
        count => Err(RuntimeError::AmbiguousMatch {
            entity: target.entity.clone(),
            filter: target.filter.to_string(),
            count,
        }),
    }
}

fn project(entity: &str, row: &Row, projection: &[String]) -> Record {
    Record {
        entity: entity.to_string(),
        id: row.id().to_string(),
        fields: projection
            .iter()
            .map(|name| Field {
                name: name.clone(),
                value: row.get(name).cloned().unwrap_or(geneql_core::Value::Null),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DeleteReport;
    use crate::memory::MemoryGraph;
    use geneql_core::{compile, Filter, Schema, Value};

    fn alice() -> Principal {
        Principal::new("User", "alice")
    }

    fn setup() -> (Schema, MemoryGraph) {
        let schema = Schema::genesis();
        let graph = MemoryGraph::new(&schema);
        graph
            .insert_rows(
                "User",
                ["alice", "bob", "carol"]
                    .iter()
                    .map(|id| Row::new(*id).with("username", *id).with("active", true)),
            )
            .unwrap();
        graph
            .insert_row("Resource", Row::new("doc1").with("owner", "alice").with("name", "Plan"))
            .unwrap();
        (schema, graph)
    }

    fn run(schema: &Schema, graph: &MemoryGraph, principal: &Principal, text: &str) -> Result<Outcome> {
        let plan = compile(text, schema, principal).unwrap();
        Evaluator::new(graph).execute(&plan, &ExecutionContext::new(principal.clone()))
    }

    fn check(schema: &Schema, graph: &MemoryGraph, text: &str) -> CheckOutcome {
        *run(schema, graph, &alice(), text)
            .unwrap()
            .as_decision()
            .unwrap()
    }

    #[test]
    fn test_get_projection_order() {
        let (schema, graph) = setup();
        let outcome = run(&schema, &graph, &alice(), "GET User : active, username WHERE id != \"carol\"").unwrap();
        let records = outcome.records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "alice");
        let names: Vec<_> = records[0].fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["active", "username"]);
        assert_eq!(records[1].get("username"), Some(&Value::from("bob")));
    }

    #[test]
    fn test_owner_has_implicit_access() {
        let (schema, graph) = setup();
        let outcome = check(&schema, &graph, "CHECK SELF CAN write ON Resource.doc1");
        assert_eq!(outcome, CheckOutcome::allow(DecisionReason::Ownership));
        assert_eq!(graph.edge_count().unwrap(), 0);
    }

    #[test]
    fn test_grant_then_check() {
        let (schema, graph) = setup();
        let outcome = run(&schema, &graph, &alice(), "GRANT read ON Resource.doc1 TO User.bob").unwrap();
        let Outcome::Granted { edge, created } = outcome else {
            panic!("expected grant");
        };
        assert!(created);
        assert_eq!(edge.granted_by, Some(NodeRef::new("User", "alice")));

        assert_eq!(
            check(&schema, &graph, "CHECK User.bob CAN read ON Resource.doc1"),
            CheckOutcome::allow(DecisionReason::DirectGrant)
        );
        assert_eq!(
            check(&schema, &graph, "CHECK User.bob CAN write ON Resource.doc1"),
            CheckOutcome::deny()
        );
    }

    #[test]
    fn test_delegation_requires_admin() {
        let (schema, graph) = setup();
        let bob = Principal::new("User", "bob");
        let err = run(&schema, &graph, &bob, "GRANT read ON Resource.doc1 TO User.carol").unwrap_err();
        assert!(matches!(err, RuntimeError::Forbidden { ref required, .. } if required == "admin"));
        assert_eq!(graph.edge_count().unwrap(), 0);

        // An admin edge is enough to delegate
        run(&schema, &graph, &alice(), "GRANT admin ON Resource.doc1 TO User.bob").unwrap();
        run(&schema, &graph, &bob, "GRANT read ON Resource.doc1 TO User.carol").unwrap();
        assert_eq!(graph.edge_count().unwrap(), 2);
    }

    #[test]
    fn test_missing_and_ambiguous_rows() {
        let (schema, graph) = setup();
        let err = run(&schema, &graph, &alice(), "CHECK User.dave CAN read ON Resource.doc1").unwrap_err();
        assert!(matches!(err, RuntimeError::NotFound { ref entity, .. } if entity == "User"));

        // username is declared unique but the store does not enforce it
        graph
            .insert_row("User", Row::new("alice2").with("username", "alice"))
            .unwrap();
        let err = run(
            &schema,
            &graph,
            &alice(),
            r#"CHECK User(username = "alice") CAN read ON Resource.doc1"#,
        )
        .unwrap_err();
        assert!(matches!(err, RuntimeError::AmbiguousMatch { count: 2, .. }));
    }

    #[test]
    fn test_update_applies_to_all_matches() {
        let (schema, graph) = setup();
        let outcome = run(&schema, &graph, &alice(), "UPDATE User SET active = false WHERE id != SELF").unwrap();
        assert_eq!(
            outcome,
            Outcome::Updated {
                entity: "User".to_string(),
                count: 2
            }
        );
        let inactive = graph
            .snapshot()
            .unwrap()
            .find("User", &geneql_core::Filter::Compare {
                field: "active".to_string(),
                op: geneql_core::Comparator::Eq,
                value: Value::Boolean(false),
            })
            .unwrap();
        assert_eq!(inactive.len(), 2);
    }

    #[test]
    fn test_update_rejects_mistyped_plan() {
        let (schema, graph) = setup();
        let mut plan = compile("UPDATE User.bob SET active = false", &schema, &alice()).unwrap();
        if let Operation::Update { assignments, .. } = &mut plan.operation {
            assignments[0].value = Value::from("nope");
        }
        let err = Evaluator::new(&graph)
            .execute(&plan, &ExecutionContext::new(alice()))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::TypeMismatch { ref field, .. } if field == "active"));
    }

    #[test]
    fn test_principal_mismatch() {
        let (schema, graph) = setup();
        let plan = compile("GET User", &schema, &alice()).unwrap();
        let err = Evaluator::new(&graph)
            .execute(&plan, &ExecutionContext::new(Principal::new("User", "bob")))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::PrincipalMismatch { .. }));
    }

    #[test]
    fn test_cancelled_before_start() {
        let (schema, graph) = setup();
        let plan = compile("GRANT read ON Resource.doc1 TO User.bob", &schema, &alice()).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let ctx = ExecutionContext::new(alice()).with_token(token);
        let err = Evaluator::new(&graph).execute(&plan, &ctx).unwrap_err();
        assert_eq!(err, RuntimeError::Store(StoreError::Cancelled));
        assert_eq!(graph.edge_count().unwrap(), 0);
    }

    #[test]
    fn test_expired_deadline() {
        let (schema, graph) = setup();
        let plan = compile("DELETE Resource.doc1", &schema, &alice()).unwrap();
        let ctx = ExecutionContext::new(alice()).with_deadline(Instant::now());
        let err = Evaluator::new(&graph).execute(&plan, &ctx).unwrap_err();
        assert_eq!(err, RuntimeError::Store(StoreError::DeadlineExceeded));
        assert_eq!(graph.row_count("Resource").unwrap(), 1);
    }

    #[test]
    fn test_resource_mutation_requires_admin() {
        let (schema, graph) = setup();
        let bob = Principal::new("User", "bob");

        let err = run(&schema, &graph, &bob, "UPDATE Resource.doc1 SET owner = SELF").unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Forbidden { ref action, ref required, .. } if action == "UPDATE" && required == "admin"
        ));
        let err = run(&schema, &graph, &bob, "DELETE Resource.doc1").unwrap_err();
        assert!(matches!(err, RuntimeError::Forbidden { ref action, .. } if action == "DELETE"));

        let doc = graph.snapshot().unwrap().find("Resource", &Filter::id_equals("doc1")).unwrap();
        assert_eq!(doc[0].get("owner"), Some(&Value::from("alice")));
        assert!(run(&schema, &graph, &bob, "GRANT read ON Resource.doc1 TO User.bob").is_err());

        // Owners and admin holders may mutate
        run(&schema, &graph, &alice(), "GRANT admin ON Resource.doc1 TO User.bob").unwrap();
        run(&schema, &graph, &bob, r#"UPDATE Resource.doc1 SET name = "Plan B""#).unwrap();
        run(&schema, &graph, &alice(), "DELETE Resource.doc1").unwrap();
        assert_eq!(graph.row_count("Resource").unwrap(), 0);
    }

    #[test]
    fn test_resource_guard_covers_every_match() {
        let (schema, graph) = setup();
        graph
            .insert_row("Resource", Row::new("doc2").with("owner", "bob"))
            .unwrap();
        let bob = Principal::new("User", "bob");

        // bob owns doc2 but not doc1, so the whole batch is refused
        let err = run(&schema, &graph, &bob, r#"UPDATE Resource SET name = "mine""#).unwrap_err();
        assert!(matches!(err, RuntimeError::Forbidden { ref resource, .. } if resource == "Resource.doc1"));
        let named = graph
            .snapshot()
            .unwrap()
            .find("Resource", &Filter::Compare {
                field: "name".to_string(),
                op: geneql_core::Comparator::Eq,
                value: Value::from("mine"),
            })
            .unwrap();
        assert!(named.is_empty());
    }

    /// Delegates to a memory graph but fails the nth row update
    struct FailingStore {
        inner: MemoryGraph,
        fail_on_update: usize,
    }

    struct FailingTransaction<'g> {
        inner: Box<dyn GraphTransaction + 'g>,
        updates: usize,
        fail_on_update: usize,
    }

    impl GraphStore for FailingStore {
        fn snapshot(&self) -> std::result::Result<Box<dyn GraphRead + '_>, StoreError> {
            self.inner.snapshot()
        }

        fn begin_transaction(
            &self,
            interrupt: &Interrupt,
        ) -> std::result::Result<Box<dyn GraphTransaction + '_>, StoreError> {
            Ok(Box::new(FailingTransaction {
                inner: self.inner.begin_transaction(interrupt)?,
                updates: 0,
                fail_on_update: self.fail_on_update,
            }))
        }
    }

    impl GraphRead for FailingTransaction<'_> {
        fn find(&self, entity: &str, filter: &Filter) -> std::result::Result<Vec<Row>, StoreError> {
            self.inner.find(entity, filter)
        }

        fn find_edge(&self, key: &EdgeKey) -> std::result::Result<Option<PermissionEdge>, StoreError> {
            self.inner.find_edge(key)
        }

        fn edges_of(&self, node: &NodeRef) -> std::result::Result<Vec<PermissionEdge>, StoreError> {
            self.inner.edges_of(node)
        }
    }

    impl GraphTransaction for FailingTransaction<'_> {
        fn upsert_edge(&mut self, write: EdgeWrite) -> std::result::Result<EdgeUpsert, StoreError> {
            self.inner.upsert_edge(write)
        }

        fn delete_edge(&mut self, removal: EdgeRemoval) -> std::result::Result<bool, StoreError> {
            self.inner.delete_edge(removal)
        }

        fn update_fields(
            &mut self,
            entity: &str,
            row_id: &str,
            values: &[(String, Value)],
        ) -> std::result::Result<(), StoreError> {
            self.updates += 1;
            if self.updates == self.fail_on_update {
                return Err(StoreError::Backend(format!("write to {}.{} failed", entity, row_id)));
            }
            self.inner.update_fields(entity, row_id, values)
        }

        fn delete_rows(&mut self, deletion: RowDeletion) -> std::result::Result<DeleteReport, StoreError> {
            self.inner.delete_rows(deletion)
        }

        fn commit(self: Box<Self>) -> std::result::Result<(), StoreError> {
            self.inner.commit()
        }

        fn rollback(self: Box<Self>) -> std::result::Result<(), StoreError> {
            self.inner.rollback()
        }
    }

    #[test]
    fn test_update_failing_mid_batch_changes_nothing() {
        let (schema, inner) = setup();
        let store = FailingStore {
            inner,
            fail_on_update: 2,
        };
        let plan = compile("UPDATE User SET active = false", &schema, &alice()).unwrap();

        let err = Evaluator::new(&store)
            .execute(&plan, &ExecutionContext::new(alice()))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Store(StoreError::Backend(_))));

        // alice was written before bob failed; the rollback drops her change too
        let active = store
            .inner
            .snapshot()
            .unwrap()
            .find("User", &Filter::Compare {
                field: "active".to_string(),
                op: geneql_core::Comparator::Eq,
                value: Value::Boolean(true),
            })
            .unwrap();
        assert_eq!(active.len(), 3);
    }
}
