//! # GeneQL Engine
//!
//! Authorization graph and plan evaluator. Plans come from
//! [`geneql_core::compile`]; the [`Evaluator`] runs them against any
//! [`GraphStore`], of which [`MemoryGraph`] is the reference implementation.

#![warn(clippy::all)]

pub mod error;
pub mod evaluator;
pub mod graph;
pub mod interrupt;
pub mod memory;
pub mod outcome;

pub use error::{Result, RuntimeError, StoreError};
pub use evaluator::{Evaluator, ExecutionContext};
pub use graph::{
    CascadeRule, DeleteReport, EdgeKey, EdgeRemoval, EdgeUpsert, EdgeWrite, GraphRead,
    GraphStore, GraphTransaction, NodeRef, PermissionEdge, RowDeletion,
};
pub use interrupt::{CancellationToken, Interrupt};
pub use memory::MemoryGraph;
pub use outcome::{CheckOutcome, Decision, DecisionReason, Field, Outcome, Record};
