#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::fmt;

use thiserror::Error;

use crate::query::plan::{PlanNodeId, PlanNodeType};
use crate::query::value::ValueType;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PlanError>;

/// Number of children a plan node kind accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildArity {
    /// Leaf node.
    None,
    /// Exactly one input.
    One,
}

impl ChildArity {
    /// Number of children this arity allows.
    pub fn count(self) -> usize {
        match self {
            ChildArity::None => 0,
            ChildArity::One => 1,
        }
    }
}

impl fmt::Display for ChildArity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildArity::None => f.write_str("no children"),
            ChildArity::One => f.write_str("exactly one child"),
        }
    }
}

/// Errors raised while building, validating, encoding, or decoding plans.
///
/// Every variant is fatal for the operation that produced it. Nothing in the
/// crate swallows these or substitutes defaults.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A node carries a number of children its kind does not allow.
    #[error("{node_type} node {id} requires {expected} (found {found})")]
    ChildArity {
        id: PlanNodeId,
        node_type: PlanNodeType,
        expected: ChildArity,
        found: usize,
    },
    /// A required key is absent from a serialized object.
    #[error("missing required field '{field}' in {context}")]
    MissingField {
        context: &'static str,
        field: &'static str,
    },
    /// A key is present but holds the wrong JSON shape.
    #[error("field '{field}' in {context} must be {expected}")]
    InvalidField {
        context: &'static str,
        field: &'static str,
        expected: &'static str,
    },
    /// Plan node type tag is not one this crate knows.
    #[error("unknown plan node type '{0}'")]
    UnknownPlanNodeType(String),
    /// Expression type tag is not one this crate knows.
    #[error("unknown expression type '{0}'")]
    UnknownExpressionType(String),
    /// Only one of the two estimate keys was present.
    #[error("node {0} carries a partial cost estimate")]
    PartialEstimate(PlanNodeId),
    /// Plan document contains no nodes.
    #[error("plan document contains no nodes")]
    EmptyPlan,
    /// Two nodes share the same identifier.
    #[error("duplicate plan node id {0}")]
    DuplicateNodeId(PlanNodeId),
    /// A node references a child id that is not in the document.
    #[error("node {parent} references unknown child {child}")]
    UnknownChild {
        parent: PlanNodeId,
        child: PlanNodeId,
    },
    /// A node is reachable more than once (shared child or cycle).
    #[error("node {0} is referenced more than once")]
    SharedNode(PlanNodeId),
    /// A node in the document is unreachable from the root.
    #[error("node {0} is not reachable from the plan root")]
    OrphanNode(PlanNodeId),
    /// Plan tree nesting exceeds the configured limit.
    #[error("plan tree exceeds depth {max}")]
    PlanTooDeep { max: usize },
    /// Plan document holds more nodes than the configured limit.
    #[error("plan document exceeds {max} nodes (got {count})")]
    TooManyNodes { count: usize, max: usize },
    /// Referenced table is absent from the catalog.
    #[error("unknown table '{0}'")]
    UnknownTable(String),
    /// Referenced column is absent from its table.
    #[error("unknown column '{column}' in table '{table}'")]
    UnknownColumn { table: String, column: String },
    /// Referenced index is absent from its table.
    #[error("unknown index '{index}' on table '{table}'")]
    UnknownIndex { table: String, index: String },
    /// Serialized column position disagrees with the catalog.
    #[error("column '{table}.{column}' is at index {expected}, plan says {found}")]
    ColumnIndexMismatch {
        table: String,
        column: String,
        expected: usize,
        found: usize,
    },
    /// A constant's value does not match its declared type.
    #[error("constant of type {expected} cannot hold {found}")]
    ValueTypeMismatch {
        expected: ValueType,
        found: &'static str,
    },
    /// Float constants must be finite to survive JSON.
    #[error("float constant must be finite")]
    NonFiniteFloat,
    /// Underlying JSON failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PlanError {
    pub(crate) fn missing(context: &'static str, field: &'static str) -> Self {
        PlanError::MissingField { context, field }
    }

    pub(crate) fn invalid(
        context: &'static str,
        field: &'static str,
        expected: &'static str,
    ) -> Self {
        PlanError::InvalidField {
            context,
            field,
            expected,
        }
    }

    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            PlanError::ChildArity { .. } => "ChildArity",
            PlanError::MissingField { .. } => "MissingField",
            PlanError::InvalidField { .. } => "InvalidField",
            PlanError::UnknownPlanNodeType(_) => "UnknownPlanNodeType",
            PlanError::UnknownExpressionType(_) => "UnknownExpressionType",
            PlanError::PartialEstimate(_) => "PartialEstimate",
            PlanError::EmptyPlan => "EmptyPlan",
            PlanError::DuplicateNodeId(_) => "DuplicateNodeId",
            PlanError::UnknownChild { .. } => "UnknownChild",
            PlanError::SharedNode(_) => "SharedNode",
            PlanError::OrphanNode(_) => "OrphanNode",
            PlanError::PlanTooDeep { .. } => "PlanTooDeep",
            PlanError::TooManyNodes { .. } => "TooManyNodes",
            PlanError::UnknownTable(_) => "UnknownTable",
            PlanError::UnknownColumn { .. } => "UnknownColumn",
            PlanError::UnknownIndex { .. } => "UnknownIndex",
            PlanError::ColumnIndexMismatch { .. } => "ColumnIndexMismatch",
            PlanError::ValueTypeMismatch { .. } => "TypeMismatch",
            PlanError::NonFiniteFloat => "NonFiniteFloat",
            PlanError::Json(_) => "Json",
        }
    }

    /// Whether the error reports a broken tree shape rather than bad field data.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            PlanError::ChildArity { .. }
                | PlanError::EmptyPlan
                | PlanError::DuplicateNodeId(_)
                | PlanError::UnknownChild { .. }
                | PlanError::SharedNode(_)
                | PlanError::OrphanNode(_)
                | PlanError::PlanTooDeep { .. }
                | PlanError::TooManyNodes { .. }
        )
    }
}

/// Convenience wrapper that formats plan errors with their codes.
pub struct PlanErrorWithCode<'a>(pub &'a PlanError);

impl fmt::Display for PlanErrorWithCode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.0.code(), self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_prefix_display() {
        let err = PlanError::missing("MATERIALIZEDSCAN", "TABLE_DATA");
        assert_eq!(
            PlanErrorWithCode(&err).to_string(),
            "[MissingField] missing required field 'TABLE_DATA' in MATERIALIZEDSCAN"
        );
        assert!(!err.is_structural());
    }

    #[test]
    fn arity_errors_are_structural() {
        let err = PlanError::ChildArity {
            id: PlanNodeId(3),
            node_type: PlanNodeType::MaterializedScan,
            expected: ChildArity::None,
            found: 1,
        };
        assert!(err.is_structural());
        assert_eq!(
            err.to_string(),
            "MATERIALIZEDSCAN node 3 requires no children (found 1)"
        );
    }
}
