#![allow(missing_docs)]

use plan_wire::{
    decode_plan, encode_plan, from_json_str, plan_hash, to_json_string, CodecOptions,
    CostEstimate, Database, DatabaseEstimates, Expression, MaterializedScanNode,
    NestLoopIndexNode, PlanNode, PlanNodeId, PlanNodeKind, PlanNodeType, ProjectionNode,
    SeqScanNode, TableDef, Value, ValueType,
};
use proptest::prelude::*;
use serde_json::json;

fn catalog() -> Database {
    Database::new()
        .with_table(
            TableDef::new("ORDERS")
                .with_column("ID")
                .with_column("CUSTOMER")
                .with_column("TOTAL")
                .with_index("ORDERS_PK", ["ID"], true)
                .with_index("ORDERS_BY_CUSTOMER", ["CUSTOMER"], false)
                .with_row_count(50_000),
        )
        .with_table(TableDef::new("CUSTOMERS").with_column("ID").with_column("NAME"))
}

fn arb_value(ty: ValueType) -> BoxedStrategy<Value> {
    let non_null = match ty {
        ValueType::Boolean => any::<bool>().prop_map(Value::Bool).boxed(),
        ValueType::Bigint => any::<i64>().prop_map(Value::Int).boxed(),
        ValueType::Float => (-4_000i32..4_000)
            .prop_map(|v| Value::Float(f64::from(v) / 4.0))
            .boxed(),
        ValueType::Varchar => "[a-zA-Z0-9 ']{0,12}".prop_map(Value::String).boxed(),
        ValueType::Varbinary => prop::collection::vec(any::<u8>(), 0..8)
            .prop_map(Value::Bytes)
            .boxed(),
        ValueType::Timestamp => any::<i64>().prop_map(Value::DateTime).boxed(),
    };
    prop_oneof![1 => Just(Value::Null), 6 => non_null].boxed()
}

fn arb_value_type() -> impl Strategy<Value = ValueType> {
    prop_oneof![
        Just(ValueType::Boolean),
        Just(ValueType::Bigint),
        Just(ValueType::Float),
        Just(ValueType::Varchar),
        Just(ValueType::Varbinary),
        Just(ValueType::Timestamp),
    ]
}

fn arb_element() -> impl Strategy<Value = Expression> {
    prop_oneof![
        4 => arb_value_type().prop_flat_map(|ty| {
            arb_value(ty).prop_map(move |v| {
                Expression::typed_constant(ty, v).expect("generated value fits its type")
            })
        }),
        1 => (0u32..16, arb_value_type()).prop_map(|(idx, ty)| Expression::parameter(idx, ty)),
    ]
}

/// SEND <- NESTLOOPINDEX(ORDERS_PK) <- MATERIALIZEDSCAN(rows)
fn in_list_plan(rows: &[Expression]) -> PlanNode {
    let scan = PlanNode::materialized_scan(PlanNodeId(3), rows);
    let join = PlanNode::with_children(
        PlanNodeId(2),
        PlanNodeKind::NestLoopIndex(NestLoopIndexNode::new(
            "ORDERS",
            "ORDERS_PK",
            vec![Expression::parameter(0, ValueType::Bigint)],
        )),
        vec![scan],
    );
    PlanNode::with_children(PlanNodeId(1), PlanNodeKind::Send, vec![join])
}

fn scan_rows(root: &PlanNode) -> &[Expression] {
    match &root.children[0].children[0].kind {
        PlanNodeKind::MaterializedScan(scan) => scan.table_data(),
        other => panic!("expected materialized scan, got {other:?}"),
    }
}

proptest! {
    #[test]
    fn prop_in_list_survives_text_round_trip(rows in prop::collection::vec(arb_element(), 0..40)) {
        let db = catalog();
        let mut root = in_list_plan(&rows);
        root.compute_cost_estimates(&DatabaseEstimates::from_database(&db), &db).unwrap();

        let text = to_json_string(&root, &CodecOptions::default()).unwrap();
        let back = from_json_str(&text, &db, &CodecOptions::default()).unwrap();

        prop_assert_eq!(scan_rows(&back), rows.as_slice());
        prop_assert_eq!(&back, &root);
        prop_assert_eq!(plan_hash(&back).unwrap(), plan_hash(&root).unwrap());
    }

    #[test]
    fn prop_scan_cost_ignores_list_length(len in 0usize..2_000, rows in 1u64..10_000_000) {
        let db = catalog();
        let estimates = DatabaseEstimates::from_database(&db).with_table_rows("ORDERS", rows);
        let values: Vec<Expression> = (0..len as i64).map(|v| Expression::constant(v)).collect();
        let mut scan = PlanNode::materialized_scan(PlanNodeId(1), &values);
        prop_assert_eq!(scan.compute_cost_estimates(&estimates, &db).unwrap(), CostEstimate::UNIT);
    }

    #[test]
    fn prop_set_table_data_is_detached(
        first in prop::collection::vec(any::<i64>(), 0..20),
        extra in any::<i64>(),
    ) {
        let mut rows: Vec<Expression> = first.iter().map(|v| Expression::constant(*v)).collect();
        let expected = rows.clone();
        let mut node = MaterializedScanNode::new();
        node.set_table_data(&rows);
        rows.push(Expression::constant(extra));
        rows.reverse();
        prop_assert_eq!(node.table_data(), expected.as_slice());
    }
}

#[test]
fn decodes_hand_written_in_list_document() {
    let doc = json!({
        "PLAN_NODES": [
            { "ID": 1, "PLAN_NODE_TYPE": "SEND", "CHILDREN_IDS": [2] },
            {
                "ID": 2,
                "PLAN_NODE_TYPE": "PROJECTION",
                "CHILDREN_IDS": [3],
                "OUTPUT_SCHEMA": [{
                    "COLUMN_NAME": "TOTAL",
                    "EXPRESSION": {
                        "TYPE": "VALUE_TUPLE",
                        "TABLE_NAME": "ORDERS",
                        "COLUMN_NAME": "TOTAL",
                        "COLUMN_IDX": 2
                    }
                }]
            },
            {
                "ID": 3,
                "PLAN_NODE_TYPE": "NESTLOOPINDEX",
                "CHILDREN_IDS": [4],
                "JOIN_TYPE": "INNER",
                "TARGET_TABLE_NAME": "ORDERS",
                "TARGET_INDEX_NAME": "ORDERS_BY_CUSTOMER",
                "SEARCHKEY_EXPRESSIONS": [
                    { "TYPE": "VALUE_PARAMETER", "VALUE_TYPE": "VARCHAR", "PARAM_IDX": 0 }
                ]
            },
            {
                "ID": 4,
                "PLAN_NODE_TYPE": "MATERIALIZEDSCAN",
                "CHILDREN_IDS": [],
                "TABLE_DATA": [
                    {
                        "TYPE": "VALUE_CONSTANT",
                        "VALUE_TYPE": "VARCHAR",
                        "ISNULL": false,
                        "VALUE": "acme"
                    },
                    {
                        "TYPE": "VALUE_CONSTANT",
                        "VALUE_TYPE": "VARCHAR",
                        "ISNULL": false,
                        "VALUE": "globex"
                    },
                    { "TYPE": "VALUE_CONSTANT", "VALUE_TYPE": "VARCHAR", "ISNULL": true }
                ]
            }
        ]
    });
    let db = catalog();
    let mut root = decode_plan(&doc, &db, &CodecOptions::default()).unwrap();
    assert_eq!(root.node_count(), 4);
    assert!(root.is_order_deterministic());
    assert_eq!(
        scan_rows(&root.children[0]),
        [
            Expression::constant("acme"),
            Expression::constant("globex"),
            Expression::typed_constant(ValueType::Varchar, Value::Null).unwrap(),
        ]
        .as_slice()
    );

    let est = root
        .compute_cost_estimates(&DatabaseEstimates::from_database(&db), &db)
        .unwrap();
    // one outer row, ten matches per key on a non-unique index
    assert_eq!(est, CostEstimate::new(10, 10));

    let explain = root.explain_plan();
    assert!(explain.ends_with("\n   MATERIALIZED SCAN of SQL-IN-LIST\n"));
    assert!(explain.contains("inline INDEX SCAN of \"ORDERS\" using \"ORDERS_BY_CUSTOMER\""));
}

#[test]
fn encoded_document_keeps_envelope_order() {
    let db = catalog();
    let mut root = in_list_plan(&[Expression::constant(1_i64), Expression::constant(2_i64)]);
    root.compute_cost_estimates(&DatabaseEstimates::from_database(&db), &db)
        .unwrap();
    let doc = encode_plan(&root).unwrap();
    let scan = doc["PLAN_NODES"][2].as_object().unwrap();
    let keys: Vec<&str> = scan.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        [
            "ID",
            "PLAN_NODE_TYPE",
            "CHILDREN_IDS",
            "ESTIMATED_PROCESSED_TUPLE_COUNT",
            "ESTIMATED_OUTPUT_TUPLE_COUNT",
            "TABLE_DATA"
        ]
    );
    assert_eq!(scan["ESTIMATED_OUTPUT_TUPLE_COUNT"], json!(1));
}

#[test]
fn seq_scan_breaks_order_determinism() {
    let db = catalog();
    let filter = Expression::compare(
        plan_wire::ComparisonOp::GreaterThan,
        Expression::column(&db, "ORDERS", "TOTAL").unwrap(),
        Expression::constant(100_i64),
    );
    let mut root = PlanNode::with_children(
        PlanNodeId(1),
        PlanNodeKind::Projection(
            ProjectionNode::new()
                .with_column("ID", Expression::column(&db, "ORDERS", "ID").unwrap()),
        ),
        vec![PlanNode::new(
            PlanNodeId(2),
            PlanNodeKind::SeqScan(SeqScanNode::new("ORDERS").with_predicate(filter)),
        )],
    );
    assert!(!root.is_order_deterministic());
    let est = root
        .compute_cost_estimates(&DatabaseEstimates::from_database(&db), &db)
        .unwrap();
    assert_eq!(est, CostEstimate::pass_through(5_000));
    assert_eq!(root.children[0].estimates(), Some(CostEstimate::new(50_000, 5_000)));
}

#[test]
fn materialized_scan_with_declared_child_is_rejected() {
    let doc = json!({
        "PLAN_NODES": [
            { "ID": 1, "PLAN_NODE_TYPE": "MATERIALIZEDSCAN", "CHILDREN_IDS": [2] },
            { "ID": 2, "PLAN_NODE_TYPE": "MATERIALIZEDSCAN", "CHILDREN_IDS": [], "TABLE_DATA": [] }
        ]
    });
    let err = decode_plan(&doc, &catalog(), &CodecOptions::default()).unwrap_err();
    assert_eq!(err.code(), "ChildArity");
    assert!(err.is_structural());
    assert!(err.to_string().starts_with("MATERIALIZEDSCAN node 1 requires no children"));
}

#[test]
fn unknown_node_type_is_reported() {
    let doc = json!({
        "PLAN_NODES": [{ "ID": 1, "PLAN_NODE_TYPE": "HASHJOIN", "CHILDREN_IDS": [] }]
    });
    let err = decode_plan(&doc, &catalog(), &CodecOptions::default()).unwrap_err();
    assert_eq!(err.code(), "UnknownPlanNodeType");
}

#[test]
fn plan_node_types_match_wire_tags() {
    let rows = [Expression::constant(true)];
    let root = in_list_plan(&rows);
    let types: Vec<PlanNodeType> = vec![
        root.plan_node_type(),
        root.children[0].plan_node_type(),
        root.children[0].children[0].plan_node_type(),
    ];
    assert_eq!(
        types,
        [
            PlanNodeType::Send,
            PlanNodeType::NestLoopIndex,
            PlanNodeType::MaterializedScan
        ]
    );
}
