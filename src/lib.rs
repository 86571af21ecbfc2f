//! Serialization and planning support for VoltDB-style query plan trees.
//!
//! The centerpiece is the materialized scan that turns the constant list of
//! a SQL `IN (...)` predicate into a row source for an index join. Plans
//! travel as `{"PLAN_NODES": [...]}` JSON documents and are rebuilt against a
//! [`Database`] catalog.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod query;

pub use config::{CodecOptions, ConfigError};
pub use error::{ChildArity, PlanError, PlanErrorWithCode, Result};
pub use query::catalog::{Database, DatabaseEstimates, IndexDef, TableDef};
pub use query::expr::{ColumnRef, ComparisonOp, ConjunctionOp, Expression, ExpressionType};
pub use query::plan::cost::CostEstimate;
pub use query::plan::document::{decode_plan, encode_plan, from_json_str, plan_hash, to_json_string};
pub use query::plan::explain::{ExplainNode, ExplainProp};
pub use query::plan::materialized::MaterializedScanNode;
pub use query::plan::nodes::{
    JoinType, NestLoopIndexNode, ProjectedColumn, ProjectionNode, SeqScanNode,
};
pub use query::plan::{DecodedNode, PlanNode, PlanNodeId, PlanNodeKind, PlanNodeType};
pub use query::value::{Value, ValueType};
