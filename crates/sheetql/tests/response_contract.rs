use std::process::Command;

use serde_json::Value;

#[test]
fn contract_prints_the_ask_response_schema() {
    let output = Command::new(env!("CARGO_BIN_EXE_sheetql"))
        .arg("contract")
        .output()
        .expect("contract should execute");

    assert!(output.status.success(), "contract should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout
        .lines()
        .find(|line| line.starts_with('{'))
        .expect("stdout should carry the schema line");
    let schema: Value = serde_json::from_str(line).expect("schema should be json");

    assert_eq!(schema["title"], "QueryResponse");
    let encoded = schema.to_string();
    for field in ["status", "generatedQuery", "rows", "errorKind", "message", "translation"] {
        assert!(encoded.contains(field), "schema should mention {field}");
    }
}

#[test]
fn contract_pretty_output_spans_lines() {
    let output = Command::new(env!("CARGO_BIN_EXE_sheetql"))
        .args(["contract", "--pretty"])
        .output()
        .expect("contract should execute");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\n  \"$schema\""));
}
