//! Materialized scan over the constant list of a SQL `IN (...)` predicate.
//!
//! The planner turns the list side of an index-accelerated `IN` into this
//! childless row source and pairs it with a nested-loop index join that
//! probes the real table once per element. The node carries nothing but the
//! ordered element expressions; its position in that order is the order in
//! which rows are produced.

use serde_json::Value as Json;
use tracing::trace;

use crate::error::Result;
use crate::query::catalog::Database;
use crate::query::expr::Expression;
use crate::query::json::{self, JsonObject};
use crate::query::plan::cost::{CostContext, CostEstimate};
use crate::query::plan::PlanNodeType;

/// Wire key holding the element expressions.
pub const TABLE_DATA: &str = "TABLE_DATA";

/// Constant-expression row source for an `IN` list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaterializedScanNode {
    table_data: Vec<Expression>,
}

impl MaterializedScanNode {
    /// Fixed explain line for every materialized scan.
    pub const EXPLAIN: &'static str = "MATERIALIZED SCAN of SQL-IN-LIST";

    /// Creates a node with an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a node owning `rows` in the given order.
    pub fn with_table_data(rows: Vec<Expression>) -> Self {
        Self { table_data: rows }
    }

    /// Replaces the whole list with a copy of `rows`.
    pub fn set_table_data(&mut self, rows: &[Expression]) {
        self.table_data = rows.to_vec();
    }

    /// Read-only view of the list.
    pub fn table_data(&self) -> &[Expression] {
        &self.table_data
    }

    /// Owned copy of the list, detached from the node.
    pub fn to_table_data(&self) -> Vec<Expression> {
        self.table_data.clone()
    }

    /// Number of list elements.
    pub fn len(&self) -> usize {
        self.table_data.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.table_data.is_empty()
    }

    /// Always [`PlanNodeType::MaterializedScan`].
    pub fn plan_node_type(&self) -> PlanNodeType {
        PlanNodeType::MaterializedScan
    }

    /// Replaying the node yields the same rows in the same order.
    pub fn is_order_deterministic(&self) -> bool {
        true
    }

    /// Constant `(1, 1)`. The paired index join accounts for the real cost
    /// of the `IN` list, so this estimate ignores list length and inputs.
    pub fn compute_cost_estimate(&self, _ctx: &CostContext<'_>) -> CostEstimate {
        CostEstimate::UNIT
    }

    /// Fixed description; the indent is accepted for interface parity only.
    pub fn explain(&self, _indent: &str) -> String {
        Self::EXPLAIN.to_string()
    }

    pub(crate) fn write_fields(&self, obj: &mut JsonObject) -> Result<()> {
        let rows = self
            .table_data
            .iter()
            .map(|expr| expr.to_json().map(Json::Object))
            .collect::<Result<Vec<_>>>()?;
        obj.insert(TABLE_DATA.into(), Json::Array(rows));
        Ok(())
    }

    pub(crate) fn load_fields(obj: &JsonObject, db: &Database) -> Result<Self> {
        const CONTEXT: &str = "MATERIALIZEDSCAN";
        let entries = json::required_array(obj, CONTEXT, TABLE_DATA)?;
        let mut table_data = Vec::with_capacity(entries.len());
        for entry in entries {
            let element = json::element_object(entry, CONTEXT, TABLE_DATA)?;
            table_data.push(Expression::from_json(element, db)?);
        }
        trace!(rows = table_data.len(), "loaded materialized scan table data");
        Ok(Self { table_data })
    }
}
