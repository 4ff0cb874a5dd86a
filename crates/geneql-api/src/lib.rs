//! # GeneQL
//!
//! A query language for authorization graphs. Query text is compiled against
//! a [`Schema`] into a principal-bound [`Plan`], which the evaluator runs
//! against a [`GraphStore`].
//!
//! ## Quick Start
//!
//! ```rust
//! use geneql::{GeneQL, MemoryGraph, Principal, Row, Schema};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let schema = Schema::genesis();
//!     let graph = Arc::new(MemoryGraph::new(&schema));
//!     graph.insert_row("User", Row::new("alice"))?;
//!     graph.insert_row("User", Row::new("bob"))?;
//!     graph.insert_row("Resource", Row::new("doc1").with("owner", "alice"))?;
//!
//!     let db = GeneQL::new(schema, graph)?;
//!     let ctx = db.context(Principal::new("User", "alice"));
//!
//!     db.compile_and_run("GRANT read ON Resource.doc1 TO User.bob", &ctx)?;
//!     assert!(db.check_access(&ctx, "bob", "doc1", "read")?);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub mod config;
pub mod error;
pub mod logging;
pub mod result;

pub use config::GeneQLConfig;
pub use error::{ConfigError, GeneQLError, Result};
pub use result::QueryResult;

// Compiler
pub use geneql_core::{
    parse, CodecError, CompileError, EntityDef, EntityKind, FieldDef, FieldType, OperationKind,
    Operation, Plan, Principal, Query, Row, Schema, SchemaError, SemanticError, SemanticErrorKind,
    Value,
};

// Evaluator
pub use geneql_engine::{
    CancellationToken, CheckOutcome, Decision, DecisionReason, EdgeKey, ExecutionContext,
    GraphStore, MemoryGraph, NodeRef, Outcome, PermissionEdge, Record, RuntimeError, StoreError,
};

use geneql_core::{
    CheckQuery, EntityRef, GetQuery, GrantQuery, Projection, Reference, RevokeQuery, Validator,
};
use geneql_engine::Evaluator;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How [`GeneQL::get_user`] finds a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserLookup {
    Id(String),
    Username(String),
    Email(String),
}

impl UserLookup {
    fn field(&self) -> (&'static str, &str) {
        match self {
            UserLookup::Id(v) => ("id", v),
            UserLookup::Username(v) => ("username", v),
            UserLookup::Email(v) => ("email", v),
        }
    }
}

/// The main GeneQL handle.
///
/// Holds a schema and the graph it describes. Cheap to clone and safe to
/// share across threads; every clone talks to the same graph.
#[derive(Clone)]
pub struct GeneQL {
    schema: Arc<Schema>,
    fingerprint: u32,
    graph: Arc<dyn GraphStore>,
    default_timeout: Option<Duration>,
}

impl GeneQL {
    /// Bind a validated schema to a graph
    pub fn new(schema: Schema, graph: Arc<dyn GraphStore>) -> Result<Self> {
        schema.validate().map_err(ConfigError::from)?;
        let fingerprint = schema.fingerprint();
        debug!(schema_version = %format!("{:08x}", fingerprint), "opened graph");
        Ok(Self {
            schema: Arc::new(schema),
            fingerprint,
            graph,
            default_timeout: None,
        })
    }

    /// Load the schema named by `config` and bind it to `graph`
    pub fn from_config(config: &GeneQLConfig, graph: Arc<dyn GraphStore>) -> Result<Self> {
        let mut db = Self::new(config.load_schema()?, graph)?;
        db.default_timeout = config.default_timeout();
        Ok(db)
    }

    /// An empty in-memory graph for `config`'s schema
    pub fn in_memory(config: &GeneQLConfig) -> Result<(Self, Arc<MemoryGraph>)> {
        let schema = config.load_schema()?;
        let graph = Arc::new(MemoryGraph::new(&schema));
        let mut db = Self::new(schema, graph.clone())?;
        db.default_timeout = config.default_timeout();
        Ok((db, graph))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The schema version plans must carry to run here
    pub fn fingerprint(&self) -> u32 {
        self.fingerprint
    }

    /// Execution context for `principal`, with the configured default deadline
    pub fn context(&self, principal: Principal) -> ExecutionContext {
        let ctx = ExecutionContext::new(principal);
        match self.default_timeout {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx,
        }
    }

    /// Parse without a schema or principal. The result can be cached and
    /// validated repeatedly.
    pub fn parse(&self, text: &str) -> std::result::Result<Query, CompileError> {
        parse(text)
    }

    /// Compile query text into a plan bound to `principal`
    pub fn compile(&self, text: &str, principal: &Principal) -> std::result::Result<Plan, CompileError> {
        geneql_core::compile(text, &self.schema, principal)
    }

    /// Validate an already-parsed query
    pub fn prepare(&self, query: &Query, principal: &Principal) -> std::result::Result<Plan, CompileError> {
        Ok(Validator::new(&self.schema).validate(query, principal)?)
    }

    /// Run a compiled plan
    pub fn run(&self, plan: &Plan, ctx: &ExecutionContext) -> std::result::Result<Outcome, RuntimeError> {
        if plan.schema_version != self.fingerprint {
            return Err(RuntimeError::StaleSchema {
                plan: plan.schema_version,
                current: self.fingerprint,
            });
        }
        Evaluator::new(&*self.graph).execute(plan, ctx)
    }

    /// Decode a plan produced by [`Plan::encode`] and run it
    pub fn run_encoded(&self, bytes: &[u8], ctx: &ExecutionContext) -> Result<Outcome> {
        let plan = Plan::decode(bytes)?;
        Ok(self.run(&plan, ctx)?)
    }

    /// Compile `text` for `ctx.principal` and run it
    pub fn compile_and_run(&self, text: &str, ctx: &ExecutionContext) -> Result<Outcome> {
        let plan = self.compile(text, &ctx.principal)?;
        Ok(self.run(&plan, ctx)?)
    }

    /// Like [`compile_and_run`](Self::compile_and_run), flattened into a [`QueryResult`]
    pub fn execute(&self, text: &str, ctx: &ExecutionContext) -> QueryResult {
        self.compile_and_run(text, ctx).into()
    }

    /// Find one user by id, username or email
    pub fn get_user(&self, ctx: &ExecutionContext, lookup: UserLookup) -> Result<Option<Record>> {
        let user = self.entity_of(EntityKind::Principal)?;
        let (field, value) = lookup.field();
        let query = Query::Get(GetQuery {
            target: EntityRef::with_field(user, field, value),
            projection: Projection::All,
            filter: None,
        });
        let outcome = self.run_query(&query, ctx)?;
        Ok(outcome.records().and_then(|records| records.first().cloned()))
    }

    /// Whether user `user_id` holds `permission` on resource `resource_id`
    pub fn check_access(
        &self,
        ctx: &ExecutionContext,
        user_id: &str,
        resource_id: &str,
        permission: &str,
    ) -> Result<bool> {
        let query = Query::Check(CheckQuery {
            subject: self.user_ref(user_id)?,
            permission: permission.to_string(),
            resource: self.resource_ref(resource_id)?,
        });
        let outcome = self.run_query(&query, ctx)?;
        Ok(outcome.as_decision().is_some_and(CheckOutcome::is_allowed))
    }

    /// Grant `permission` on a resource to a user, as `ctx.principal`
    pub fn grant_access(
        &self,
        ctx: &ExecutionContext,
        user_id: &str,
        resource_id: &str,
        permission: &str,
    ) -> Result<Outcome> {
        let query = Query::Grant(GrantQuery {
            permission: permission.to_string(),
            resource: self.resource_ref(resource_id)?,
            subject: self.user_ref(user_id)?,
        });
        self.run_query(&query, ctx)
    }

    /// Revoke `permission` on a resource from a user, as `ctx.principal`
    pub fn revoke_access(
        &self,
        ctx: &ExecutionContext,
        user_id: &str,
        resource_id: &str,
        permission: &str,
    ) -> Result<Outcome> {
        let query = Query::Revoke(RevokeQuery {
            permission: permission.to_string(),
            resource: self.resource_ref(resource_id)?,
            subject: self.user_ref(user_id)?,
        });
        self.run_query(&query, ctx)
    }

    fn run_query(&self, query: &Query, ctx: &ExecutionContext) -> Result<Outcome> {
        let plan = self.prepare(query, &ctx.principal)?;
        Ok(self.run(&plan, ctx)?)
    }

    fn entity_of(&self, kind: EntityKind) -> Result<&str> {
        self.schema
            .entities
            .iter()
            .find(|e| e.kind == kind)
            .map(|e| e.name.as_str())
            .ok_or_else(|| ConfigError::MissingEntity(kind).into())
    }

    fn user_ref(&self, id: &str) -> Result<Reference> {
        let user = self.entity_of(EntityKind::Principal)?;
        Ok(Reference::Entity(EntityRef::with_field(user, "id", id)))
    }

    fn resource_ref(&self, id: &str) -> Result<EntityRef> {
        let resource = self.entity_of(EntityKind::Resource)?;
        Ok(EntityRef::with_field(resource, "id", id))
    }
}

impl std::fmt::Debug for GeneQL {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneQL")
            .field("schema_version", &format_args!("{:08x}", self.fingerprint))
            .field("entities", &self.schema.entities.len())
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (GeneQL, Arc<MemoryGraph>) {
        let (db, graph) = GeneQL::in_memory(&GeneQLConfig::new()).unwrap();
        graph
            .insert_row("User", Row::new("alice").with("username", "alice").with("email", "alice@example.com"))
            .unwrap();
        graph.insert_row("User", Row::new("bob")).unwrap();
        graph
            .insert_row("Resource", Row::new("doc1").with("owner", "alice"))
            .unwrap();
        (db, graph)
    }

    fn alice() -> Principal {
        Principal::new("User", "alice")
    }

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_get_user() {
        let (db, _graph) = setup();
        let ctx = db.context(alice());

        let user = db
            .get_user(&ctx, UserLookup::Email("alice@example.com".to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(user.id, "alice");
        assert_eq!(user.get("username"), Some(&Value::from("alice")));

        assert!(db
            .get_user(&ctx, UserLookup::Username("nobody".to_string()))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_access_helpers() {
        let (db, graph) = setup();
        let ctx = db.context(alice());

        assert!(!db.check_access(&ctx, "bob", "doc1", "read").unwrap());
        db.grant_access(&ctx, "bob", "doc1", "read").unwrap();
        assert!(db.check_access(&ctx, "bob", "doc1", "read").unwrap());
        assert_eq!(graph.edge_count().unwrap(), 1);

        db.revoke_access(&ctx, "bob", "doc1", "read").unwrap();
        assert!(!db.check_access(&ctx, "bob", "doc1", "read").unwrap());
    }

    #[test]
    fn test_helper_rejects_unknown_permission() {
        let (db, _graph) = setup();
        let err = db
            .grant_access(&db.context(alice()), "bob", "doc1", "launch")
            .unwrap_err();
        assert!(matches!(err, GeneQLError::Compile(CompileError::Semantic(_))));
    }

    #[test]
    fn test_default_timeout_applies() {
        let config = GeneQLConfig::new().with_default_timeout(Duration::from_secs(30));
        let (db, _graph) = GeneQL::in_memory(&config).unwrap();
        assert!(db.context(alice()).interrupt.deadline().is_some());
    }
}
