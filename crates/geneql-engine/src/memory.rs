//! In-memory authorization graph.
//!
//! State lives behind `RwLock<Arc<GraphState>>`. Readers clone the `Arc`
//! and keep a frozen view; a writer holds the writer mutex, edits a private
//! copy, and swaps it in on commit.

use crate::error::StoreError;
use crate::graph::{
    CascadeRule, DeleteReport, EdgeKey, EdgeRemoval, EdgeUpsert, EdgeWrite, GraphRead,
    GraphStore, GraphTransaction, NodeRef, PermissionEdge, RowDeletion,
};
use crate::interrupt::Interrupt;
use geneql_core::{Filter, Row, Schema, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, TryLockError};
use std::time::Duration;
use tracing::debug;

// How long a blocked writer sleeps between interrupt checks
const WRITER_POLL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Default)]
struct GraphState {
    // entity type -> id -> row
    rows: BTreeMap<String, BTreeMap<String, Row>>,
    edges: BTreeMap<EdgeKey, PermissionEdge>,
}

impl GraphState {
    fn table(&self, entity: &str) -> Result<&BTreeMap<String, Row>, StoreError> {
        self.rows
            .get(entity)
            .ok_or_else(|| StoreError::UnknownEntity(entity.to_string()))
    }

    fn table_mut(&mut self, entity: &str) -> Result<&mut BTreeMap<String, Row>, StoreError> {
        self.rows
            .get_mut(entity)
            .ok_or_else(|| StoreError::UnknownEntity(entity.to_string()))
    }

    fn find(&self, entity: &str, filter: &Filter) -> Result<Vec<Row>, StoreError> {
        if let Some(id) = filter.pinned_id() {
            return Ok(self.table(entity)?.get(id).cloned().into_iter().collect());
        }
        Ok(self
            .table(entity)?
            .values()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect())
    }

    fn edges_of(&self, node: &NodeRef) -> Vec<PermissionEdge> {
        self.edges
            .values()
            .filter(|e| e.subject() == node || e.object() == node)
            .cloned()
            .collect()
    }
}

/// Reference graph store kept entirely in memory
pub struct MemoryGraph {
    state: RwLock<Arc<GraphState>>,
    writer: Mutex<()>,
}

impl MemoryGraph {
    /// Create an empty graph with one table per schema entity
    pub fn new(schema: &Schema) -> Self {
        let mut state = GraphState::default();
        for entity in &schema.entities {
            state.rows.insert(entity.name.clone(), BTreeMap::new());
        }
        Self {
            state: RwLock::new(Arc::new(state)),
            writer: Mutex::new(()),
        }
    }

    /// Insert or replace a row. Rows are created by the embedding
    /// application, never by queries.
    pub fn insert_row(&self, entity: &str, row: Row) -> Result<(), StoreError> {
        self.insert_rows(entity, std::iter::once(row))
    }

    /// Insert or replace many rows in one publish
    pub fn insert_rows(
        &self,
        entity: &str,
        rows: impl IntoIterator<Item = Row>,
    ) -> Result<(), StoreError> {
        let _writer = self.writer.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut next = (*self.snapshot_state()?).clone();
        let table = next.table_mut(entity)?;
        for row in rows {
            table.insert(row.id().to_string(), row);
        }
        self.publish(next)
    }

    /// Number of rows of `entity`
    pub fn row_count(&self, entity: &str) -> Result<usize, StoreError> {
        Ok(self.snapshot_state()?.table(entity)?.len())
    }

    /// Number of permission edges
    pub fn edge_count(&self) -> Result<usize, StoreError> {
        Ok(self.snapshot_state()?.edges.len())
    }

    fn snapshot_state(&self) -> Result<Arc<GraphState>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(Arc::clone(&state))
    }

    fn publish(&self, next: GraphState) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::LockPoisoned)?;
        *state = Arc::new(next);
        Ok(())
    }

    /// Wait for the writer slot, giving up when `interrupt` fires
    fn acquire_writer(&self, interrupt: &Interrupt) -> Result<MutexGuard<'_, ()>, StoreError> {
        loop {
            interrupt.check()?;
            match self.writer.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::WouldBlock) => std::thread::sleep(WRITER_POLL),
                Err(TryLockError::Poisoned(_)) => return Err(StoreError::LockPoisoned),
            }
        }
    }
}

impl fmt::Debug for MemoryGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("MemoryGraph");
        match self.snapshot_state() {
            Ok(state) => {
                let rows: BTreeMap<&str, usize> = state
                    .rows
                    .iter()
                    .map(|(entity, table)| (entity.as_str(), table.len()))
                    .collect();
                debug.field("rows", &rows).field("edges", &state.edges.len())
            }
            Err(_) => debug.field("state", &"<poisoned>"),
        };
        debug.finish_non_exhaustive()
    }
}

/// Frozen read view
struct MemorySnapshot {
    state: Arc<GraphState>,
}

impl GraphRead for MemorySnapshot {
    fn find(&self, entity: &str, filter: &Filter) -> Result<Vec<Row>, StoreError> {
        self.state.find(entity, filter)
    }

    fn find_edge(&self, key: &EdgeKey) -> Result<Option<PermissionEdge>, StoreError> {
        Ok(self.state.edges.get(key).cloned())
    }

    fn edges_of(&self, node: &NodeRef) -> Result<Vec<PermissionEdge>, StoreError> {
        Ok(self.state.edges_of(node))
    }
}

impl GraphStore for MemoryGraph {
    fn snapshot(&self) -> Result<Box<dyn GraphRead + '_>, StoreError> {
        Ok(Box::new(MemorySnapshot {
            state: self.snapshot_state()?,
        }))
    }

    fn begin_transaction(
        &self,
        interrupt: &Interrupt,
    ) -> Result<Box<dyn GraphTransaction + '_>, StoreError> {
        let writer = self.acquire_writer(interrupt)?;
        let working = (*self.snapshot_state()?).clone();
        Ok(Box::new(MemoryTransaction {
            graph: self,
            _writer: writer,
            working,
            interrupt: interrupt.clone(),
            finished: false,
        }))
    }
}

struct MemoryTransaction<'g> {
    graph: &'g MemoryGraph,
    // Held until the transaction ends: one writer at a time
    _writer: MutexGuard<'g, ()>,
    working: GraphState,
    interrupt: Interrupt,
    finished: bool,
}

impl GraphRead for MemoryTransaction<'_> {
    fn find(&self, entity: &str, filter: &Filter) -> Result<Vec<Row>, StoreError> {
        self.working.find(entity, filter)
    }

    fn find_edge(&self, key: &EdgeKey) -> Result<Option<PermissionEdge>, StoreError> {
        Ok(self.working.edges.get(key).cloned())
    }

    fn edges_of(&self, node: &NodeRef) -> Result<Vec<PermissionEdge>, StoreError> {
        Ok(self.working.edges_of(node))
    }
}

impl GraphTransaction for MemoryTransaction<'_> {
    fn upsert_edge(&mut self, write: EdgeWrite) -> Result<EdgeUpsert, StoreError> {
        let edge = write.into_edge();
        let previous = self.working.edges.insert(edge.key.clone(), edge);
        Ok(match previous {
            Some(_) => EdgeUpsert::Refreshed,
            None => EdgeUpsert::Created,
        })
    }

    fn delete_edge(&mut self, removal: EdgeRemoval) -> Result<bool, StoreError> {
        Ok(self.working.edges.remove(removal.key()).is_some())
    }

    fn update_fields(
        &mut self,
        entity: &str,
        row_id: &str,
        values: &[(String, Value)],
    ) -> Result<(), StoreError> {
        let row = self
            .working
            .table_mut(entity)?
            .get_mut(row_id)
            .ok_or_else(|| StoreError::Backend(format!("row {}.{} does not exist", entity, row_id)))?;
        for (field, value) in values {
            row.set(field.as_str(), value.clone());
        }
        Ok(())
    }

    // Only edges are cascaded. Resource rows whose owner field names a
    // deleted user keep that id.
    fn delete_rows(&mut self, deletion: RowDeletion) -> Result<DeleteReport, StoreError> {
        let table = self.working.table_mut(deletion.entity())?;
        let ids: Vec<String> = table
            .values()
            .filter(|row| deletion.filter().matches(row))
            .map(|row| row.id().to_string())
            .collect();
        for id in &ids {
            table.remove(id);
        }

        let mut report = DeleteReport {
            rows: ids.len(),
            ..DeleteReport::default()
        };
        let edges = &mut self.working.edges;
        for id in ids {
            let node = NodeRef::new(deletion.entity(), id);
            for rule in deletion.cascade() {
                match rule {
                    CascadeRule::RemoveEdgesAsObject => {
                        let before = edges.len();
                        edges.retain(|key, _| key.object != node);
                        report.edges_removed += before - edges.len();
                    }
                    CascadeRule::RemoveEdgesAsSubject => {
                        let before = edges.len();
                        edges.retain(|key, _| key.subject != node);
                        report.edges_removed += before - edges.len();
                    }
                    CascadeRule::ClearGrantor => {
                        for edge in edges.values_mut() {
                            if edge.granted_by.as_ref() == Some(&node) {
                                edge.granted_by = None;
                                report.grants_orphaned += 1;
                            }
                        }
                    }
                }
            }
        }

        Ok(report)
    }

    fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        self.interrupt.check()?;
        let working = std::mem::take(&mut self.working);
        self.graph.publish(working)?;
        self.finished = true;
        Ok(())
    }

    fn rollback(mut self: Box<Self>) -> Result<(), StoreError> {
        self.finished = true;
        debug!("transaction rolled back");
        Ok(())
    }
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            debug!("uncommitted transaction discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn graph() -> MemoryGraph {
        let graph = MemoryGraph::new(&Schema::genesis());
        graph
            .insert_row("User", Row::new("alice").with("username", "alice"))
            .unwrap();
        graph
            .insert_row("User", Row::new("bob").with("username", "bob"))
            .unwrap();
        graph
            .insert_row("Resource", Row::new("doc1").with("owner", "alice"))
            .unwrap();
        graph
    }

    fn edge(subject: &str, object: &str, permission: &str, by: Option<&str>) -> PermissionEdge {
        PermissionEdge {
            key: EdgeKey::new(
                NodeRef::new("User", subject),
                NodeRef::new("Resource", object),
                permission,
            ),
            granted_at: Utc::now(),
            granted_by: by.map(|b| NodeRef::new("User", b)),
        }
    }

    #[test]
    fn test_find_in_id_order() {
        let graph = graph();
        let snapshot = graph.snapshot().unwrap();
        let users = snapshot.find("User", &Filter::All).unwrap();
        let ids: Vec<_> = users.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["alice", "bob"]);

        let bob = snapshot.find("User", &Filter::id_equals("bob")).unwrap();
        assert_eq!(bob.len(), 1);
        assert!(snapshot
            .find("User", &Filter::id_equals("carol"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_unknown_entity() {
        let graph = graph();
        let err = graph.snapshot().unwrap().find("Group", &Filter::All).unwrap_err();
        assert_eq!(err, StoreError::UnknownEntity("Group".to_string()));
        assert!(graph.insert_row("Group", Row::new("g")).is_err());
    }

    #[test]
    fn test_commit_publishes() {
        let graph = graph();
        let mut tx = graph.begin_transaction(&Interrupt::none()).unwrap();
        let created = tx
            .upsert_edge(EdgeWrite::new(edge("bob", "doc1", "read", Some("alice"))))
            .unwrap();
        assert_eq!(created, EdgeUpsert::Created);
        // Reads inside the transaction see its own writes
        assert!(tx.find_edge(&edge("bob", "doc1", "read", None).key).unwrap().is_some());
        tx.commit().unwrap();

        assert_eq!(graph.edge_count().unwrap(), 1);
    }

    #[test]
    fn test_snapshot_is_isolated() {
        let graph = graph();
        let before = graph.snapshot().unwrap();

        let mut tx = graph.begin_transaction(&Interrupt::none()).unwrap();
        tx.upsert_edge(EdgeWrite::new(edge("bob", "doc1", "read", None)))
            .unwrap();
        tx.commit().unwrap();

        let key = edge("bob", "doc1", "read", None).key;
        assert!(before.find_edge(&key).unwrap().is_none());
        assert!(graph.snapshot().unwrap().find_edge(&key).unwrap().is_some());
    }

    #[test]
    fn test_drop_discards_changes() {
        let graph = graph();
        {
            let mut tx = graph.begin_transaction(&Interrupt::none()).unwrap();
            tx.upsert_edge(EdgeWrite::new(edge("bob", "doc1", "read", None)))
                .unwrap();
        }
        assert_eq!(graph.edge_count().unwrap(), 0);

        let mut tx = graph.begin_transaction(&Interrupt::none()).unwrap();
        tx.update_fields("User", "bob", &[("active".to_string(), Value::Boolean(false))])
            .unwrap();
        tx.rollback().unwrap();
        let bob = graph.snapshot().unwrap().find("User", &Filter::id_equals("bob")).unwrap();
        assert_eq!(bob[0].get("active"), None);
    }

    #[test]
    fn test_cancelled_commit_discards_changes() {
        let graph = graph();
        let token = crate::CancellationToken::new();
        let interrupt = Interrupt::none().with_token(token.clone());

        let mut tx = graph.begin_transaction(&interrupt).unwrap();
        tx.upsert_edge(EdgeWrite::new(edge("bob", "doc1", "read", None)))
            .unwrap();
        token.cancel();
        assert_eq!(tx.commit(), Err(StoreError::Cancelled));
        assert_eq!(graph.edge_count().unwrap(), 0);

        assert!(matches!(
            graph.begin_transaction(&interrupt),
            Err(StoreError::Cancelled)
        ));
    }

    #[test]
    fn test_blocked_writer_honours_interrupt() {
        let graph = graph();
        let _held = graph.begin_transaction(&Interrupt::none()).unwrap();

        let started = std::time::Instant::now();
        let interrupt = Interrupt::none().with_timeout(Duration::from_millis(20));
        assert!(matches!(
            graph.begin_transaction(&interrupt),
            Err(StoreError::DeadlineExceeded)
        ));
        assert!(started.elapsed() < Duration::from_secs(5));

        let token = crate::CancellationToken::new();
        let interrupt = Interrupt::none().with_token(token.clone());
        std::thread::scope(|s| {
            let waiter = s.spawn(|| graph.begin_transaction(&interrupt).map(|_| ()));
            std::thread::sleep(Duration::from_millis(10));
            token.cancel();
            assert_eq!(waiter.join().unwrap(), Err(StoreError::Cancelled));
        });
    }

    #[test]
    fn test_debug_reports_counts() {
        let graph = graph();
        let debug = format!("{:?}", graph);
        assert!(debug.starts_with("MemoryGraph"));
        assert!(debug.contains("\"User\": 2"));
        assert!(debug.contains("edges: 0"));
    }

    #[test]
    fn test_deleted_owner_id_is_kept() {
        let graph = graph();
        let mut tx = graph.begin_transaction(&Interrupt::none()).unwrap();
        tx.delete_rows(RowDeletion::new(
            "User",
            Filter::id_equals("alice"),
            vec![CascadeRule::RemoveEdgesAsSubject, CascadeRule::ClearGrantor],
        ))
        .unwrap();
        tx.commit().unwrap();

        let doc = graph.snapshot().unwrap().find("Resource", &Filter::id_equals("doc1")).unwrap();
        assert_eq!(doc[0].get("owner"), Some(&Value::from("alice")));
    }

    #[test]
    fn test_cascade_rules() {
        let graph = graph();
        graph.insert_row("Resource", Row::new("doc2").with("owner", "bob")).unwrap();

        let mut tx = graph.begin_transaction(&Interrupt::none()).unwrap();
        tx.upsert_edge(EdgeWrite::new(edge("bob", "doc1", "read", Some("alice"))))
            .unwrap();
        tx.upsert_edge(EdgeWrite::new(edge("alice", "doc2", "read", Some("bob"))))
            .unwrap();
        tx.upsert_edge(EdgeWrite::new(edge("bob", "doc2", "write", Some("bob"))))
            .unwrap();
        tx.commit().unwrap();

        let mut tx = graph.begin_transaction(&Interrupt::none()).unwrap();
        let report = tx
            .delete_rows(RowDeletion::new(
                "User",
                Filter::id_equals("bob"),
                vec![CascadeRule::RemoveEdgesAsSubject, CascadeRule::ClearGrantor],
            ))
            .unwrap();
        tx.commit().unwrap();

        assert_eq!(
            report,
            DeleteReport {
                rows: 1,
                edges_removed: 2,
                grants_orphaned: 1,
            }
        );
        let remaining = graph
            .snapshot()
            .unwrap()
            .edges_of(&NodeRef::new("User", "alice"))
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].granted_by, None);
    }
}
