//! Cardinality estimates attached to planned nodes.

use crate::query::catalog::{Database, DatabaseEstimates};

/// Fraction of scanned rows assumed to survive a scan predicate.
pub const DEFAULT_PREDICATE_SELECTIVITY: f64 = 0.1;
/// Rows assumed to match one key of a non-unique index.
pub const DEFAULT_ROWS_PER_KEY: u64 = 10;

/// Estimated tuple counts for one node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CostEstimate {
    /// Tuples the node touches.
    pub processed: u64,
    /// Tuples the node emits.
    pub output: u64,
}

impl CostEstimate {
    /// One tuple processed, one emitted.
    pub const UNIT: CostEstimate = CostEstimate {
        processed: 1,
        output: 1,
    };

    /// Creates an estimate.
    pub fn new(processed: u64, output: u64) -> Self {
        Self { processed, output }
    }

    /// Estimate for a node that forwards its input unchanged.
    pub fn pass_through(input: u64) -> Self {
        Self {
            processed: input,
            output: input,
        }
    }
}

/// Inputs available to a node while it computes its estimate.
#[derive(Clone, Copy, Debug)]
pub struct CostContext<'a> {
    /// Output estimate of the node's child, 0 for leaves.
    pub child_output: u64,
    /// Table cardinalities.
    pub estimates: &'a DatabaseEstimates,
    /// Catalog for index metadata.
    pub database: &'a Database,
}

impl<'a> CostContext<'a> {
    /// Context for a leaf node.
    pub fn leaf(estimates: &'a DatabaseEstimates, database: &'a Database) -> Self {
        Self {
            child_output: 0,
            estimates,
            database,
        }
    }

    /// Same context with a different child estimate.
    pub fn with_child_output(self, child_output: u64) -> Self {
        Self {
            child_output,
            ..self
        }
    }
}

pub(crate) fn apply_selectivity(rows: u64, selectivity: f64) -> u64 {
    ((rows as f64) * selectivity).ceil().max(1.0) as u64
}
