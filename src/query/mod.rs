#![forbid(unsafe_code)]

//! Plan trees, their expressions, and the catalog they resolve against.

/// Table, column, and index metadata plus cardinality estimates.
pub mod catalog;

/// Scalar expressions carried by plan nodes.
pub mod expr;

/// Typed accessors over serialized JSON objects.
pub mod json;

/// Plan nodes, costing, explain output, and the document codec.
pub mod plan;

/// Constant values and their declared SQL types.
pub mod value;
