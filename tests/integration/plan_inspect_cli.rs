#![allow(missing_docs)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

const CATALOG: &str = r#"
[[tables]]
name = "ORDERS"
columns = ["ID", "CUSTOMER", "TOTAL"]
row_count = 20000

[[tables.indexes]]
name = "ORDERS_PK"
columns = ["ID"]
unique = true
"#;

const PLAN: &str = r#"{
  "PLAN_NODES": [
    { "ID": 1, "PLAN_NODE_TYPE": "SEND", "CHILDREN_IDS": [2] },
    {
      "ID": 2, "PLAN_NODE_TYPE": "NESTLOOPINDEX", "CHILDREN_IDS": [3],
      "JOIN_TYPE": "INNER", "TARGET_TABLE_NAME": "ORDERS", "TARGET_INDEX_NAME": "ORDERS_PK",
      "SEARCHKEY_EXPRESSIONS": [
        { "TYPE": "VALUE_PARAMETER", "VALUE_TYPE": "BIGINT", "PARAM_IDX": 0 }
      ]
    },
    {
      "ID": 3, "PLAN_NODE_TYPE": "MATERIALIZEDSCAN", "CHILDREN_IDS": [],
      "TABLE_DATA": [
        { "TYPE": "VALUE_CONSTANT", "VALUE_TYPE": "BIGINT", "ISNULL": false, "VALUE": 7 },
        { "TYPE": "VALUE_CONSTANT", "VALUE_TYPE": "BIGINT", "ISNULL": false, "VALUE": 3 }
      ]
    }
  ]
}"#;

struct Fixture {
    _dir: TempDir,
    catalog: PathBuf,
    plan: PathBuf,
    config: PathBuf,
}

fn setup(plan: &str) -> Fixture {
    let dir = TempDir::new().expect("tempdir");
    let catalog = dir.path().join("catalog.toml");
    let plan_path = dir.path().join("plan.json");
    let config = dir.path().join("codec.toml");
    fs::write(&catalog, CATALOG).expect("write catalog");
    fs::write(&plan_path, plan).expect("write plan");
    fs::write(&config, "pretty = false\n").expect("write config");
    Fixture {
        _dir: dir,
        catalog,
        plan: plan_path,
        config,
    }
}

fn base_args(fx: &Fixture) -> Vec<std::ffi::OsString> {
    vec![
        "--catalog".into(),
        fx.catalog.clone().into(),
        "--config".into(),
        fx.config.clone().into(),
    ]
}

#[test]
fn explain_prints_indented_plan() {
    let fx = setup(PLAN);
    let output = cargo_bin_cmd!("plan-inspect")
        .args(base_args(&fx))
        .arg("explain")
        .arg(&fx.plan)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert_eq!(
        text,
        "RETURN RESULTS\n \
         NESTLOOP INDEX INNER JOIN\n  \
         inline INDEX SCAN of \"ORDERS\" using \"ORDERS_PK\"\n  \
         MATERIALIZED SCAN of SQL-IN-LIST\n"
    );
}

#[test]
fn explain_json_can_redact_literals() {
    let fx = setup(PLAN);
    let output = cargo_bin_cmd!("plan-inspect")
        .args(base_args(&fx))
        .args(["--format", "json", "explain", "--redact"])
        .arg(&fx.plan)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let tree: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(tree["op"], "SEND");
    let scan = &tree["inputs"][0]["inputs"][0];
    assert_eq!(scan["op"], "MATERIALIZEDSCAN");
    let values = scan["props"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["key"] == "values")
        .expect("values prop");
    assert_eq!(values["value"], "<redacted>");
}

#[test]
fn redact_requires_json_format() {
    let fx = setup(PLAN);
    let output = cargo_bin_cmd!("plan-inspect")
        .args(base_args(&fx))
        .args(["explain", "--redact"])
        .arg(&fx.plan)
        .assert()
        .failure()
        .get_output()
        .clone();
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8(output.stderr).expect("utf8");
    assert!(stderr.contains("[Usage] --redact requires --format json"), "stderr: {stderr}");
}

#[test]
fn validate_reports_node_count_and_hash() {
    let fx = setup(PLAN);
    let output = cargo_bin_cmd!("plan-inspect")
        .args(base_args(&fx))
        .args(["--format", "json", "validate"])
        .arg(&fx.plan)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(report["nodes"], 3);
    assert_eq!(report["hash"].as_str().unwrap().len(), 16);
}

#[test]
fn estimate_attaches_counts() {
    let fx = setup(PLAN);
    let output = cargo_bin_cmd!("plan-inspect")
        .args(base_args(&fx))
        .arg("estimate")
        .arg(&fx.plan)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let doc: Value = serde_json::from_slice(&output).expect("valid json");
    let nodes = doc["PLAN_NODES"].as_array().unwrap();
    assert_eq!(nodes.len(), 3);
    for node in nodes {
        assert_eq!(node["ESTIMATED_PROCESSED_TUPLE_COUNT"], 1);
        assert_eq!(node["ESTIMATED_OUTPUT_TUPLE_COUNT"], 1);
    }
    assert_eq!(nodes[2]["TABLE_DATA"][0]["VALUE"], 7);
    assert_eq!(nodes[2]["TABLE_DATA"][1]["VALUE"], 3);
}

#[test]
fn structural_error_exits_with_code() {
    let fx = setup(
        r#"{ "PLAN_NODES": [
            { "ID": 1, "PLAN_NODE_TYPE": "MATERIALIZEDSCAN", "CHILDREN_IDS": [2] },
            { "ID": 2, "PLAN_NODE_TYPE": "MATERIALIZEDSCAN", "CHILDREN_IDS": [] }
        ] }"#,
    );
    let output = cargo_bin_cmd!("plan-inspect")
        .args(base_args(&fx))
        .arg("validate")
        .arg(&fx.plan)
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).expect("utf8");
    assert!(stderr.contains("[ChildArity]"), "stderr: {stderr}");
}

#[test]
fn unknown_table_without_catalog_fails() {
    let fx = setup(PLAN);
    let output = cargo_bin_cmd!("plan-inspect")
        .arg("--config")
        .arg(&fx.config)
        .arg("explain")
        .arg(&fx.plan)
        .env_remove("PLAN_WIRE_CATALOG")
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).expect("utf8");
    assert!(stderr.contains("[UnknownTable]"), "stderr: {stderr}");
}

#[test]
fn bad_config_is_reported() {
    let fx = setup(PLAN);
    fs::write(&fx.config, "max_depth = \"deep\"\n").expect("rewrite config");
    cargo_bin_cmd!("plan-inspect")
        .args(base_args(&fx))
        .arg("validate")
        .arg(&fx.plan)
        .assert()
        .failure();
}
