//! Authorization graph store interface.
//!
//! The evaluator reaches the graph only through these traits. Edge and row
//! mutations take write tickets ([`EdgeWrite`], [`EdgeRemoval`],
//! [`RowDeletion`]) that only this crate can construct, so every change to
//! the permission graph goes through plan evaluation.

use crate::error::StoreError;
use crate::interrupt::Interrupt;
use chrono::{DateTime, SecondsFormat, Utc};
use geneql_core::{Filter, Principal, Row, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A row in the graph, by entity type and id
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub entity: String,
    pub id: String,
}

impl NodeRef {
    pub fn new(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

impl From<&Principal> for NodeRef {
    fn from(principal: &Principal) -> Self {
        NodeRef::new(principal.entity.as_str(), principal.id.as_str())
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.entity, self.id)
    }
}

/// Identity of a permission edge. At most one edge exists per key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    pub subject: NodeRef,
    pub object: NodeRef,
    pub permission: String,
}

impl EdgeKey {
    pub fn new(subject: NodeRef, object: NodeRef, permission: impl Into<String>) -> Self {
        Self {
            subject,
            object,
            permission: permission.into(),
        }
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.subject, self.permission, self.object)
    }
}

/// A granted permission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionEdge {
    pub key: EdgeKey,
    pub granted_at: DateTime<Utc>,
    /// Grantor; cleared when the grantor is deleted
    pub granted_by: Option<NodeRef>,
}

impl PermissionEdge {
    pub fn subject(&self) -> &NodeRef {
        &self.key.subject
    }

    pub fn object(&self) -> &NodeRef {
        &self.key.object
    }

    pub fn permission(&self) -> &str {
        &self.key.permission
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "subject": self.key.subject.to_string(),
            "object": self.key.object.to_string(),
            "permission": self.key.permission,
            "granted_at": self.granted_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            "granted_by": self.granted_by.as_ref().map(|g| g.to_string()),
        })
    }
}

/// Ticket to insert or refresh an edge
#[derive(Debug)]
pub struct EdgeWrite {
    edge: PermissionEdge,
}

impl EdgeWrite {
    pub(crate) fn new(edge: PermissionEdge) -> Self {
        Self { edge }
    }

    pub fn edge(&self) -> &PermissionEdge {
        &self.edge
    }

    pub fn into_edge(self) -> PermissionEdge {
        self.edge
    }
}

/// Ticket to remove an edge
#[derive(Debug)]
pub struct EdgeRemoval {
    key: EdgeKey,
}

impl EdgeRemoval {
    pub(crate) fn new(key: EdgeKey) -> Self {
        Self { key }
    }

    pub fn key(&self) -> &EdgeKey {
        &self.key
    }
}

/// What else goes when a row is deleted.
///
/// Rules touch edges only. Deleting a user leaves the owner field of the
/// resources it owned unchanged, so the dangling id still grants ownership
/// to any user later created with the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CascadeRule {
    /// Drop edges whose object is the deleted row
    RemoveEdgesAsObject,
    /// Drop edges whose subject is the deleted row
    RemoveEdgesAsSubject,
    /// Null `granted_by` on surviving edges the deleted row granted
    ClearGrantor,
}

/// Ticket to delete matching rows, with the cascade the store must apply
#[derive(Debug)]
pub struct RowDeletion {
    entity: String,
    filter: Filter,
    cascade: Vec<CascadeRule>,
}

impl RowDeletion {
    pub(crate) fn new(entity: impl Into<String>, filter: Filter, cascade: Vec<CascadeRule>) -> Self {
        Self {
            entity: entity.into(),
            filter,
            cascade,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Rules in the order they must be applied
    pub fn cascade(&self) -> &[CascadeRule] {
        &self.cascade
    }
}

/// Result of a row deletion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReport {
    pub rows: usize,
    pub edges_removed: usize,
    /// Surviving edges whose grantor was deleted
    pub grants_orphaned: usize,
}

/// Whether an upsert inserted a new edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeUpsert {
    Created,
    Refreshed,
}

/// Read access to a consistent view of the graph
pub trait GraphRead {
    /// Rows of `entity` matching `filter`, in the store's natural order
    fn find(&self, entity: &str, filter: &Filter) -> Result<Vec<Row>, StoreError>;

    /// The edge with this key, if granted
    fn find_edge(&self, key: &EdgeKey) -> Result<Option<PermissionEdge>, StoreError>;

    /// Edges where `node` is the subject or the object
    fn edges_of(&self, node: &NodeRef) -> Result<Vec<PermissionEdge>, StoreError>;
}

/// A graph backend
pub trait GraphStore: Send + Sync {
    /// A read view that does not change while it is held
    fn snapshot(&self) -> Result<Box<dyn GraphRead + '_>, StoreError>;

    /// Start a write transaction. Writers are serialized; dropping the
    /// transaction without committing discards its changes.
    fn begin_transaction(
        &self,
        interrupt: &Interrupt,
    ) -> Result<Box<dyn GraphTransaction + '_>, StoreError>;
}

/// An all-or-nothing batch of graph changes. Reads observe earlier writes
/// in the same transaction.
pub trait GraphTransaction: GraphRead {
    fn upsert_edge(&mut self, write: EdgeWrite) -> Result<EdgeUpsert, StoreError>;

    /// Returns whether an edge was removed
    fn delete_edge(&mut self, removal: EdgeRemoval) -> Result<bool, StoreError>;

    /// Overwrite attributes of one row. `id` cannot be changed.
    fn update_fields(
        &mut self,
        entity: &str,
        row_id: &str,
        values: &[(String, Value)],
    ) -> Result<(), StoreError>;

    fn delete_rows(&mut self, deletion: RowDeletion) -> Result<DeleteReport, StoreError>;

    /// Publish all changes atomically
    fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discard all changes
    fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
