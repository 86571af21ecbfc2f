//! Node kinds that surround a materialized scan in an `IN`-list plan.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::{PlanError, Result};
use crate::query::catalog::Database;
use crate::query::expr::Expression;
use crate::query::json::{self, JsonObject};
use crate::query::plan::cost::{
    apply_selectivity, CostContext, CostEstimate, DEFAULT_PREDICATE_SELECTIVITY,
    DEFAULT_ROWS_PER_KEY,
};

/// Wire keys used by the node kinds in this module.
pub mod keys {
    /// Scanned or probed table.
    pub const TARGET_TABLE_NAME: &str = "TARGET_TABLE_NAME";
    /// Probed index.
    pub const TARGET_INDEX_NAME: &str = "TARGET_INDEX_NAME";
    /// Optional filter.
    pub const PREDICATE: &str = "PREDICATE";
    /// Join flavor.
    pub const JOIN_TYPE: &str = "JOIN_TYPE";
    /// Index probe keys.
    pub const SEARCHKEY_EXPRESSIONS: &str = "SEARCHKEY_EXPRESSIONS";
    /// Projected columns.
    pub const OUTPUT_SCHEMA: &str = "OUTPUT_SCHEMA";
    /// Alias of a projected column.
    pub const COLUMN_NAME: &str = "COLUMN_NAME";
    /// Expression of a projected column.
    pub const EXPRESSION: &str = "EXPRESSION";
}

/// Full scan of a base table.
#[derive(Clone, Debug, PartialEq)]
pub struct SeqScanNode {
    /// Scanned table.
    pub target_table: String,
    /// Optional row filter.
    pub predicate: Option<Expression>,
}

impl SeqScanNode {
    /// Scan of `table` without a filter.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            target_table: table.into(),
            predicate: None,
        }
    }

    /// Adds a row filter.
    pub fn with_predicate(mut self, predicate: Expression) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub(crate) fn compute_cost_estimate(&self, ctx: &CostContext<'_>) -> CostEstimate {
        let rows = ctx.estimates.table_rows(&self.target_table);
        let output = match self.predicate {
            Some(_) => apply_selectivity(rows, DEFAULT_PREDICATE_SELECTIVITY),
            None => rows,
        };
        CostEstimate::new(rows, output)
    }

    pub(crate) fn explain(&self, _indent: &str) -> String {
        match &self.predicate {
            Some(pred) => format!(
                "SEQUENTIAL SCAN of \"{}\" filter by {pred}",
                self.target_table
            ),
            None => format!("SEQUENTIAL SCAN of \"{}\"", self.target_table),
        }
    }

    pub(crate) fn write_fields(&self, obj: &mut JsonObject) -> Result<()> {
        obj.insert(
            keys::TARGET_TABLE_NAME.into(),
            self.target_table.clone().into(),
        );
        write_predicate(obj, self.predicate.as_ref())
    }

    pub(crate) fn load_fields(obj: &JsonObject, db: &Database) -> Result<Self> {
        const CONTEXT: &str = "SEQSCAN";
        let table = json::required_str(obj, CONTEXT, keys::TARGET_TABLE_NAME)?;
        db.table(table)?;
        Ok(Self {
            target_table: table.to_owned(),
            predicate: load_predicate(obj, CONTEXT, db)?,
        })
    }
}

/// Join flavor of a nested-loop index join.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinType {
    /// Emit only matched outer rows.
    Inner,
    /// Emit every outer row, padding misses with nulls.
    Left,
}

impl JoinType {
    fn as_str(self) -> &'static str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
        }
    }
}

/// Nested-loop join probing an index on `target_table` once per outer row.
#[derive(Clone, Debug, PartialEq)]
pub struct NestLoopIndexNode {
    /// Join flavor.
    pub join_type: JoinType,
    /// Probed table.
    pub target_table: String,
    /// Probed index.
    pub index_name: String,
    /// Key expressions, one per leading index column.
    pub search_keys: Vec<Expression>,
    /// Optional post-join filter.
    pub predicate: Option<Expression>,
}

impl NestLoopIndexNode {
    /// Inner join probing `index` on `table` with `search_keys`.
    pub fn new(
        table: impl Into<String>,
        index: impl Into<String>,
        search_keys: Vec<Expression>,
    ) -> Self {
        Self {
            join_type: JoinType::Inner,
            target_table: table.into(),
            index_name: index.into(),
            search_keys,
            predicate: None,
        }
    }

    /// Sets the join flavor.
    pub fn with_join_type(mut self, join_type: JoinType) -> Self {
        self.join_type = join_type;
        self
    }

    /// Adds a post-join filter.
    pub fn with_predicate(mut self, predicate: Expression) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub(crate) fn compute_cost_estimate(&self, ctx: &CostContext<'_>) -> Result<CostEstimate> {
        let outer = ctx.child_output;
        let index = ctx.database.index(&self.target_table, &self.index_name)?;
        check_search_key_count(self.search_keys.len(), index.columns.len())?;
        let output = if index.unique {
            outer
        } else {
            let table_rows = ctx.estimates.table_rows(&self.target_table);
            outer.saturating_mul(DEFAULT_ROWS_PER_KEY).min(table_rows)
        };
        Ok(CostEstimate::new(outer, output.max(1)))
    }

    pub(crate) fn explain(&self, indent: &str) -> String {
        format!(
            "NESTLOOP INDEX {} JOIN\n{indent} inline INDEX SCAN of \"{}\" using \"{}\"",
            self.join_type.as_str(),
            self.target_table,
            self.index_name
        )
    }

    pub(crate) fn write_fields(&self, obj: &mut JsonObject) -> Result<()> {
        obj.insert(keys::JOIN_TYPE.into(), self.join_type.as_str().into());
        obj.insert(
            keys::TARGET_TABLE_NAME.into(),
            self.target_table.clone().into(),
        );
        obj.insert(keys::TARGET_INDEX_NAME.into(), self.index_name.clone().into());
        let search_keys = self
            .search_keys
            .iter()
            .map(|expr| expr.to_json().map(Json::Object))
            .collect::<Result<Vec<_>>>()?;
        obj.insert(keys::SEARCHKEY_EXPRESSIONS.into(), Json::Array(search_keys));
        write_predicate(obj, self.predicate.as_ref())
    }

    pub(crate) fn load_fields(obj: &JsonObject, db: &Database) -> Result<Self> {
        const CONTEXT: &str = "NESTLOOPINDEX";
        let join_type: JoinType =
            serde_json::from_value(json::required(obj, CONTEXT, keys::JOIN_TYPE)?.clone())
                .map_err(|_| PlanError::invalid(CONTEXT, keys::JOIN_TYPE, "INNER or LEFT"))?;
        let table = json::required_str(obj, CONTEXT, keys::TARGET_TABLE_NAME)?;
        let index_name = json::required_str(obj, CONTEXT, keys::TARGET_INDEX_NAME)?;
        let index = db.index(table, index_name)?;
        let entries = json::required_array(obj, CONTEXT, keys::SEARCHKEY_EXPRESSIONS)?;
        check_search_key_count(entries.len(), index.columns.len())?;
        let search_keys = entries
            .iter()
            .map(|entry| {
                let element = json::element_object(entry, CONTEXT, keys::SEARCHKEY_EXPRESSIONS)?;
                Expression::from_json(element, db)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            join_type,
            target_table: table.to_owned(),
            index_name: index_name.to_owned(),
            search_keys,
            predicate: load_predicate(obj, CONTEXT, db)?,
        })
    }
}

/// One output column of a projection.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectedColumn {
    /// Output name.
    pub alias: String,
    /// Computed value.
    pub expression: Expression,
}

/// Computes output columns from each input row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProjectionNode {
    /// Output columns in order.
    pub columns: Vec<ProjectedColumn>,
}

impl ProjectionNode {
    /// Projection with no columns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an output column.
    pub fn with_column(mut self, alias: impl Into<String>, expression: Expression) -> Self {
        self.columns.push(ProjectedColumn {
            alias: alias.into(),
            expression,
        });
        self
    }

    pub(crate) fn write_fields(&self, obj: &mut JsonObject) -> Result<()> {
        let mut schema = Vec::with_capacity(self.columns.len());
        for col in &self.columns {
            let mut entry = JsonObject::new();
            entry.insert(keys::COLUMN_NAME.into(), col.alias.clone().into());
            entry.insert(
                keys::EXPRESSION.into(),
                Json::Object(col.expression.to_json()?),
            );
            schema.push(Json::Object(entry));
        }
        obj.insert(keys::OUTPUT_SCHEMA.into(), Json::Array(schema));
        Ok(())
    }

    pub(crate) fn load_fields(obj: &JsonObject, db: &Database) -> Result<Self> {
        const CONTEXT: &str = "PROJECTION";
        let entries = json::required_array(obj, CONTEXT, keys::OUTPUT_SCHEMA)?;
        let mut columns = Vec::with_capacity(entries.len());
        for entry in entries {
            let entry = json::element_object(entry, CONTEXT, keys::OUTPUT_SCHEMA)?;
            let alias = json::required_str(entry, CONTEXT, keys::COLUMN_NAME)?;
            let expr = json::required_object(entry, CONTEXT, keys::EXPRESSION)?;
            columns.push(ProjectedColumn {
                alias: alias.to_owned(),
                expression: Expression::from_json(expr, db)?,
            });
        }
        Ok(Self { columns })
    }
}

/// An empty key list probes the whole index; more keys than indexed columns
/// cannot be matched.
fn check_search_key_count(found: usize, index_columns: usize) -> Result<()> {
    if found > index_columns {
        return Err(PlanError::invalid(
            "NESTLOOPINDEX",
            keys::SEARCHKEY_EXPRESSIONS,
            "at most one key per index column",
        ));
    }
    Ok(())
}

fn write_predicate(obj: &mut JsonObject, predicate: Option<&Expression>) -> Result<()> {
    if let Some(pred) = predicate {
        obj.insert(keys::PREDICATE.into(), Json::Object(pred.to_json()?));
    }
    Ok(())
}

fn load_predicate(
    obj: &JsonObject,
    context: &'static str,
    db: &Database,
) -> Result<Option<Expression>> {
    match json::optional(obj, keys::PREDICATE) {
        None => Ok(None),
        Some(raw) => {
            let pred = raw
                .as_object()
                .ok_or_else(|| PlanError::invalid(context, keys::PREDICATE, "an object"))?;
            Expression::from_json(pred, db).map(Some)
        }
    }
}
