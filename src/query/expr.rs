//! Scalar expression trees and their tagged JSON encoding.
//!
//! Each expression serializes to a self-describing object whose `TYPE` key
//! names the variant. [`Expression::from_json`] is the single factory that
//! rebuilds any variant; column references are checked against the catalog
//! passed in.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::{PlanError, Result};
use crate::query::catalog::Database;
use crate::query::json::{self, JsonObject};
use crate::query::value::{Value, ValueType};

/// Wire keys used by expression objects.
pub mod keys {
    /// Variant tag.
    pub const TYPE: &str = "TYPE";
    /// Declared value type of a constant or parameter.
    pub const VALUE_TYPE: &str = "VALUE_TYPE";
    /// Constant payload.
    pub const VALUE: &str = "VALUE";
    /// Null marker of a constant.
    pub const IS_NULL: &str = "ISNULL";
    /// Parameter position.
    pub const PARAM_IDX: &str = "PARAM_IDX";
    /// Table of a column reference.
    pub const TABLE_NAME: &str = "TABLE_NAME";
    /// Column of a column reference.
    pub const COLUMN_NAME: &str = "COLUMN_NAME";
    /// Catalog position of a column reference.
    pub const COLUMN_IDX: &str = "COLUMN_IDX";
    /// Left operand.
    pub const LEFT: &str = "LEFT";
    /// Right operand.
    pub const RIGHT: &str = "RIGHT";
}

/// Wire tag identifying an expression variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpressionType {
    /// Literal constant.
    ValueConstant,
    /// Positional statement parameter.
    ValueParameter,
    /// Column of a base table.
    ValueTuple,
    /// `=`
    CompareEqual,
    /// `<>`
    #[serde(rename = "COMPARE_NOTEQUAL")]
    CompareNotEqual,
    /// `<`
    #[serde(rename = "COMPARE_LESSTHAN")]
    CompareLessThan,
    /// `>`
    #[serde(rename = "COMPARE_GREATERTHAN")]
    CompareGreaterThan,
    /// `<=`
    #[serde(rename = "COMPARE_LESSTHANOREQUALTO")]
    CompareLessThanOrEqualTo,
    /// `>=`
    #[serde(rename = "COMPARE_GREATERTHANOREQUALTO")]
    CompareGreaterThanOrEqualTo,
    /// `AND`
    ConjunctionAnd,
    /// `OR`
    ConjunctionOr,
}

impl ExpressionType {
    /// Wire name of the tag.
    pub fn as_str(self) -> &'static str {
        match self {
            ExpressionType::ValueConstant => "VALUE_CONSTANT",
            ExpressionType::ValueParameter => "VALUE_PARAMETER",
            ExpressionType::ValueTuple => "VALUE_TUPLE",
            ExpressionType::CompareEqual => "COMPARE_EQUAL",
            ExpressionType::CompareNotEqual => "COMPARE_NOTEQUAL",
            ExpressionType::CompareLessThan => "COMPARE_LESSTHAN",
            ExpressionType::CompareGreaterThan => "COMPARE_GREATERTHAN",
            ExpressionType::CompareLessThanOrEqualTo => "COMPARE_LESSTHANOREQUALTO",
            ExpressionType::CompareGreaterThanOrEqualTo => "COMPARE_GREATERTHANOREQUALTO",
            ExpressionType::ConjunctionAnd => "CONJUNCTION_AND",
            ExpressionType::ConjunctionOr => "CONJUNCTION_OR",
        }
    }

    fn parse(raw: &str) -> Result<Self> {
        serde_json::from_value(Json::String(raw.to_owned()))
            .map_err(|_| PlanError::UnknownExpressionType(raw.to_owned()))
    }
}

impl fmt::Display for ExpressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    /// `=`
    Equal,
    /// `<>`
    NotEqual,
    /// `<`
    LessThan,
    /// `>`
    GreaterThan,
    /// `<=`
    LessThanOrEqual,
    /// `>=`
    GreaterThanOrEqual,
}

impl ComparisonOp {
    fn expression_type(self) -> ExpressionType {
        match self {
            ComparisonOp::Equal => ExpressionType::CompareEqual,
            ComparisonOp::NotEqual => ExpressionType::CompareNotEqual,
            ComparisonOp::LessThan => ExpressionType::CompareLessThan,
            ComparisonOp::GreaterThan => ExpressionType::CompareGreaterThan,
            ComparisonOp::LessThanOrEqual => ExpressionType::CompareLessThanOrEqualTo,
            ComparisonOp::GreaterThanOrEqual => ExpressionType::CompareGreaterThanOrEqualTo,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            ComparisonOp::Equal => "=",
            ComparisonOp::NotEqual => "<>",
            ComparisonOp::LessThan => "<",
            ComparisonOp::GreaterThan => ">",
            ComparisonOp::LessThanOrEqual => "<=",
            ComparisonOp::GreaterThanOrEqual => ">=",
        }
    }
}

/// Boolean connectives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConjunctionOp {
    /// Logical AND.
    And,
    /// Logical OR.
    Or,
}

/// Resolved reference to a base-table column.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    /// Table name.
    pub table: String,
    /// Column name.
    pub column: String,
    /// Position of the column within the table.
    pub column_index: usize,
}

/// Value-producing expression tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    /// Literal constant; `value` is [`Value::Null`] for typed nulls.
    Constant {
        /// Declared type.
        value_type: ValueType,
        /// Payload.
        value: Value,
    },
    /// Positional statement parameter bound at execution time.
    Parameter {
        /// Zero-based parameter position.
        index: u32,
        /// Declared type.
        value_type: ValueType,
    },
    /// Column of a base table.
    Column(ColumnRef),
    /// Binary comparison.
    Comparison {
        /// Operator.
        op: ComparisonOp,
        /// Left operand.
        left: Box<Expression>,
        /// Right operand.
        right: Box<Expression>,
    },
    /// Binary AND/OR.
    Conjunction {
        /// Connective.
        op: ConjunctionOp,
        /// Left operand.
        left: Box<Expression>,
        /// Right operand.
        right: Box<Expression>,
    },
}

impl Expression {
    /// Constant typed by its value. A bare null is typed `BIGINT`; use
    /// [`Expression::typed_constant`] for other null types.
    pub fn constant(value: impl Into<Value>) -> Self {
        let value = value.into();
        let value_type = value.natural_type().unwrap_or(ValueType::Bigint);
        Expression::Constant { value_type, value }
    }

    /// Constant with an explicit type, checked against the value.
    pub fn typed_constant(value_type: ValueType, value: Value) -> Result<Self> {
        if !value.fits(value_type) {
            return Err(PlanError::ValueTypeMismatch {
                expected: value_type,
                found: value.kind_name(),
            });
        }
        Ok(Expression::Constant { value_type, value })
    }

    /// Statement parameter.
    pub fn parameter(index: u32, value_type: ValueType) -> Self {
        Expression::Parameter { index, value_type }
    }

    /// Column reference resolved against `db`.
    pub fn column(db: &Database, table: &str, column: &str) -> Result<Self> {
        let column_index = db.column_index(table, column)?;
        Ok(Expression::Column(ColumnRef {
            table: table.to_owned(),
            column: column.to_owned(),
            column_index,
        }))
    }

    /// Binary comparison.
    pub fn compare(op: ComparisonOp, left: Expression, right: Expression) -> Self {
        Expression::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Logical AND of two expressions.
    pub fn and(left: Expression, right: Expression) -> Self {
        Expression::Conjunction {
            op: ConjunctionOp::And,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Logical OR of two expressions.
    pub fn or(left: Expression, right: Expression) -> Self {
        Expression::Conjunction {
            op: ConjunctionOp::Or,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Wire tag of this expression.
    pub fn expression_type(&self) -> ExpressionType {
        match self {
            Expression::Constant { .. } => ExpressionType::ValueConstant,
            Expression::Parameter { .. } => ExpressionType::ValueParameter,
            Expression::Column(_) => ExpressionType::ValueTuple,
            Expression::Comparison { op, .. } => op.expression_type(),
            Expression::Conjunction { op, .. } => match op {
                ConjunctionOp::And => ExpressionType::ConjunctionAnd,
                ConjunctionOp::Or => ExpressionType::ConjunctionOr,
            },
        }
    }

    /// Serializes the expression into a standalone tagged object.
    pub fn to_json(&self) -> Result<JsonObject> {
        let mut obj = JsonObject::new();
        obj.insert(
            keys::TYPE.into(),
            Json::String(self.expression_type().as_str().into()),
        );
        match self {
            Expression::Constant { value_type, value } => {
                if !value.fits(*value_type) {
                    return Err(PlanError::ValueTypeMismatch {
                        expected: *value_type,
                        found: value.kind_name(),
                    });
                }
                obj.insert(keys::VALUE_TYPE.into(), value_type.as_str().into());
                let is_null = matches!(value, Value::Null);
                obj.insert(keys::IS_NULL.into(), Json::Bool(is_null));
                if !is_null {
                    obj.insert(keys::VALUE.into(), value.to_json()?);
                }
            }
            Expression::Parameter { index, value_type } => {
                obj.insert(keys::VALUE_TYPE.into(), value_type.as_str().into());
                obj.insert(keys::PARAM_IDX.into(), Json::from(*index));
            }
            Expression::Column(col) => {
                obj.insert(keys::TABLE_NAME.into(), col.table.clone().into());
                obj.insert(keys::COLUMN_NAME.into(), col.column.clone().into());
                obj.insert(keys::COLUMN_IDX.into(), Json::from(col.column_index));
            }
            Expression::Comparison { left, right, .. }
            | Expression::Conjunction { left, right, .. } => {
                obj.insert(keys::LEFT.into(), Json::Object(left.to_json()?));
                obj.insert(keys::RIGHT.into(), Json::Object(right.to_json()?));
            }
        }
        Ok(obj)
    }

    /// Rebuilds any expression variant from its tagged object.
    pub fn from_json(obj: &JsonObject, db: &Database) -> Result<Self> {
        const CONTEXT: &str = "expression";
        let tag = ExpressionType::parse(json::required_str(obj, CONTEXT, keys::TYPE)?)?;
        let context = tag.as_str();
        match tag {
            ExpressionType::ValueConstant => {
                let raw_type = json::required(obj, context, keys::VALUE_TYPE)?;
                let value_type = ValueType::parse(context, keys::VALUE_TYPE, raw_type)?;
                let value = if json::required_bool(obj, context, keys::IS_NULL)? {
                    Value::Null
                } else {
                    Value::from_json(value_type, json::required(obj, context, keys::VALUE)?)?
                };
                Ok(Expression::Constant { value_type, value })
            }
            ExpressionType::ValueParameter => {
                let raw_type = json::required(obj, context, keys::VALUE_TYPE)?;
                let value_type = ValueType::parse(context, keys::VALUE_TYPE, raw_type)?;
                let index = u32::try_from(json::required_u64(obj, context, keys::PARAM_IDX)?)
                    .map_err(|_| PlanError::invalid(context, keys::PARAM_IDX, "a 32-bit index"))?;
                Ok(Expression::Parameter { index, value_type })
            }
            ExpressionType::ValueTuple => {
                let table = json::required_str(obj, context, keys::TABLE_NAME)?;
                let column = json::required_str(obj, context, keys::COLUMN_NAME)?;
                let found = json::required_u64(obj, context, keys::COLUMN_IDX)? as usize;
                let expected = db.column_index(table, column)?;
                if expected != found {
                    return Err(PlanError::ColumnIndexMismatch {
                        table: table.to_owned(),
                        column: column.to_owned(),
                        expected,
                        found,
                    });
                }
                Ok(Expression::Column(ColumnRef {
                    table: table.to_owned(),
                    column: column.to_owned(),
                    column_index: expected,
                }))
            }
            ExpressionType::ConjunctionAnd | ExpressionType::ConjunctionOr => {
                let (left, right) = load_operands(obj, context, db)?;
                let op = if tag == ExpressionType::ConjunctionAnd {
                    ConjunctionOp::And
                } else {
                    ConjunctionOp::Or
                };
                Ok(Expression::Conjunction { op, left, right })
            }
            ExpressionType::CompareEqual => load_comparison(ComparisonOp::Equal, obj, context, db),
            ExpressionType::CompareNotEqual => {
                load_comparison(ComparisonOp::NotEqual, obj, context, db)
            }
            ExpressionType::CompareLessThan => {
                load_comparison(ComparisonOp::LessThan, obj, context, db)
            }
            ExpressionType::CompareGreaterThan => {
                load_comparison(ComparisonOp::GreaterThan, obj, context, db)
            }
            ExpressionType::CompareLessThanOrEqualTo => {
                load_comparison(ComparisonOp::LessThanOrEqual, obj, context, db)
            }
            ExpressionType::CompareGreaterThanOrEqualTo => {
                load_comparison(ComparisonOp::GreaterThanOrEqual, obj, context, db)
            }
        }
    }
}

fn load_comparison(
    op: ComparisonOp,
    obj: &JsonObject,
    context: &'static str,
    db: &Database,
) -> Result<Expression> {
    let (left, right) = load_operands(obj, context, db)?;
    Ok(Expression::Comparison { op, left, right })
}

fn load_operands(
    obj: &JsonObject,
    context: &'static str,
    db: &Database,
) -> Result<(Box<Expression>, Box<Expression>)> {
    let left = Expression::from_json(json::required_object(obj, context, keys::LEFT)?, db)?;
    let right = Expression::from_json(json::required_object(obj, context, keys::RIGHT)?, db)?;
    Ok((Box::new(left), Box::new(right)))
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Constant { value, .. } => match value {
                Value::Null => f.write_str("NULL"),
                Value::Bool(v) => write!(f, "{}", if *v { "TRUE" } else { "FALSE" }),
                Value::Int(v) => write!(f, "{v}"),
                Value::Float(v) => write!(f, "{v}"),
                Value::String(v) => write!(f, "'{}'", v.replace('\'', "''")),
                Value::Bytes(v) => write!(f, "X'{}'", hex::encode(v)),
                Value::DateTime(v) => write!(f, "TIMESTAMP({v})"),
            },
            Expression::Parameter { index, .. } => write!(f, "?{index}"),
            Expression::Column(col) => write!(f, "{}.{}", col.table, col.column),
            Expression::Comparison { op, left, right } => {
                write!(f, "({left} {} {right})", op.symbol())
            }
            Expression::Conjunction { op, left, right } => {
                let word = match op {
                    ConjunctionOp::And => "AND",
                    ConjunctionOp::Or => "OR",
                };
                write!(f, "({left} {word} {right})")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::catalog::TableDef;
    use serde_json::json;

    fn db() -> Database {
        Database::new().with_table(
            TableDef::new("ORDERS")
                .with_column("ID")
                .with_column("CUSTOMER"),
        )
    }

    fn object(value: Json) -> JsonObject {
        value.as_object().cloned().expect("object literal")
    }

    #[test]
    fn constant_encoding_matches_wire_shape() {
        let obj = Expression::constant(42_i64).to_json().unwrap();
        assert_eq!(
            Json::Object(obj),
            json!({
                "TYPE": "VALUE_CONSTANT",
                "VALUE_TYPE": "BIGINT",
                "ISNULL": false,
                "VALUE": 42
            })
        );
    }

    #[test]
    fn typed_null_round_trips() {
        let expr = Expression::typed_constant(ValueType::Varchar, Value::Null).unwrap();
        let obj = expr.to_json().unwrap();
        assert!(!obj.contains_key(keys::VALUE));
        assert_eq!(Expression::from_json(&obj, &db()).unwrap(), expr);
    }

    #[test]
    fn nested_predicate_round_trips() {
        let db = db();
        let expr = Expression::and(
            Expression::compare(
                ComparisonOp::Equal,
                Expression::column(&db, "ORDERS", "CUSTOMER").unwrap(),
                Expression::parameter(0, ValueType::Bigint),
            ),
            Expression::compare(
                ComparisonOp::GreaterThanOrEqual,
                Expression::column(&db, "ORDERS", "ID").unwrap(),
                Expression::constant(10_i64),
            ),
        );
        let obj = expr.to_json().unwrap();
        assert_eq!(Expression::from_json(&obj, &db).unwrap(), expr);
        assert_eq!(
            expr.to_string(),
            "((ORDERS.CUSTOMER = ?0) AND (ORDERS.ID >= 10))"
        );
    }

    #[test]
    fn column_index_must_match_catalog() {
        let obj = object(json!({
            "TYPE": "VALUE_TUPLE",
            "TABLE_NAME": "ORDERS",
            "COLUMN_NAME": "CUSTOMER",
            "COLUMN_IDX": 0
        }));
        let err = Expression::from_json(&obj, &db()).unwrap_err();
        assert!(matches!(
            err,
            PlanError::ColumnIndexMismatch {
                expected: 1,
                found: 0,
                ..
            }
        ));
    }

    #[test]
    fn unknown_column_fails() {
        let obj = object(json!({
            "TYPE": "VALUE_TUPLE",
            "TABLE_NAME": "ORDERS",
            "COLUMN_NAME": "TOTAL",
            "COLUMN_IDX": 2
        }));
        assert_eq!(
            Expression::from_json(&obj, &db()).unwrap_err().code(),
            "UnknownColumn"
        );
    }

    #[test]
    fn every_comparison_tag_decodes_to_its_operator() {
        let cases = [
            ("COMPARE_EQUAL", ComparisonOp::Equal),
            ("COMPARE_NOTEQUAL", ComparisonOp::NotEqual),
            ("COMPARE_LESSTHAN", ComparisonOp::LessThan),
            ("COMPARE_GREATERTHAN", ComparisonOp::GreaterThan),
            ("COMPARE_LESSTHANOREQUALTO", ComparisonOp::LessThanOrEqual),
            ("COMPARE_GREATERTHANOREQUALTO", ComparisonOp::GreaterThanOrEqual),
        ];
        for (tag, op) in cases {
            let obj = object(json!({
                "TYPE": tag,
                "LEFT": { "TYPE": "VALUE_PARAMETER", "VALUE_TYPE": "BIGINT", "PARAM_IDX": 0 },
                "RIGHT": {
                    "TYPE": "VALUE_CONSTANT", "VALUE_TYPE": "BIGINT", "ISNULL": false, "VALUE": 1
                }
            }));
            let expected = Expression::compare(
                op,
                Expression::parameter(0, ValueType::Bigint),
                Expression::constant(1_i64),
            );
            assert_eq!(Expression::from_json(&obj, &db()).unwrap(), expected, "{tag}");
            assert_eq!(expected.to_json().unwrap()[keys::TYPE], json!(tag));
        }
    }

    #[test]
    fn unknown_tag_fails() {
        let obj = object(json!({ "TYPE": "FUNCTION", "NAME": "abs" }));
        assert!(matches!(
            Expression::from_json(&obj, &db()),
            Err(PlanError::UnknownExpressionType(tag)) if tag == "FUNCTION"
        ));
    }

    #[test]
    fn mismatched_constant_is_rejected_on_encode() {
        let expr = Expression::Constant {
            value_type: ValueType::Bigint,
            value: Value::from("seven"),
        };
        assert_eq!(expr.to_json().unwrap_err().code(), "TypeMismatch");
        assert!(Expression::typed_constant(ValueType::Bigint, Value::from("seven")).is_err());
    }

    #[test]
    fn missing_operand_fails() {
        let obj = object(json!({
            "TYPE": "COMPARE_EQUAL",
            "LEFT": { "TYPE": "VALUE_PARAMETER", "VALUE_TYPE": "BIGINT", "PARAM_IDX": 0 }
        }));
        assert!(matches!(
            Expression::from_json(&obj, &db()),
            Err(PlanError::MissingField { field: "RIGHT", .. })
        ));
    }
}
