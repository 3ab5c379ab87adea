#![allow(dead_code)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const PIE_VISUAL: &str = "definition/pages/overview/visuals/pie1/visual.json";
pub const COLUMN_VISUAL: &str = "definition/pages/overview/visuals/col1/visual.json";
pub const OVERVIEW_PAGE: &str = "definition/pages/overview/page.json";
pub const DETAILS_PAGE: &str = "definition/pages/details/page.json";

pub struct TestEnv {
    _tmp: TempDir,
    pub home: PathBuf,
    pub report: PathBuf,
    pub model: PathBuf,
    pub thin: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let home = tmp.path().join("home");
        fs::create_dir_all(&home).expect("create isolated home");

        let report = make_fixture_report(tmp.path());
        let model = make_fixture_model(tmp.path());
        let thin = make_fixture_thin_report(tmp.path());

        Self {
            _tmp: tmp,
            home,
            report,
            model,
            thin,
        }
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("pbifix");
        cmd.env("HOME", &self.home)
            .env_remove("FABRIC_TOKEN")
            .env_remove("PBIFIX_LOG");
        cmd
    }

    pub fn run_json(&self, args: &[&str]) -> Value {
        let mut cmd = self.cmd();
        let out = cmd
            .arg("--json")
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&out).expect("valid json output")
    }

    pub fn run_json_failure(&self, args: &[&str]) -> Value {
        let mut cmd = self.cmd();
        let out = cmd
            .arg("--json")
            .args(args)
            .assert()
            .failure()
            .code(1)
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&out).expect("valid json error output")
    }

    pub fn report_arg(&self) -> &str {
        self.report.to_str().expect("report path utf8")
    }

    pub fn read_report_part(&self, rel: &str) -> Value {
        read_json(&self.report.join(rel))
    }

    pub fn read_model(&self) -> Value {
        read_json(&self.model.join("model.bim"))
    }

    pub fn audit_lines(&self) -> Vec<Value> {
        let path = self.home.join(".config/pbifix/audit.jsonl");
        fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .map(|l| serde_json::from_str(l).expect("audit line json"))
            .collect()
    }
}

pub fn read_json(path: &Path) -> Value {
    let raw = fs::read_to_string(path).expect("read json file");
    serde_json::from_str(&raw).expect("parse json file")
}

fn write_json(path: &Path, value: &Value) {
    fs::create_dir_all(path.parent().expect("parent dir")).expect("create parent dir");
    fs::write(path, serde_json::to_string_pretty(value).expect("serialize")).expect("write");
}

fn make_fixture_report(base: &Path) -> PathBuf {
    let report = base.join("Sales.Report");
    write_json(
        &report.join("definition.pbir"),
        &json!({
            "version": "4.0",
            "datasetReference": {"byPath": {"path": "../Sales.SemanticModel"}}
        }),
    );
    write_json(
        &report.join("definition/report.json"),
        &json!({"themeCollection": {}}),
    );
    write_json(
        &report.join(OVERVIEW_PAGE),
        &json!({"name": "overview", "displayName": "Overview", "width": 1280, "height": 720}),
    );
    write_json(
        &report.join(PIE_VISUAL),
        &json!({
            "name": "pie1",
            "visual": {
                "visualType": "pieChart",
                "query": {"queryState": {
                    "Category": {"projections": [{"field": {"Column": {"Property": "Region"}}}]},
                    "Y": {"projections": [{"field": {"Measure": {"Property": "Revenue"}}}]}
                }}
            },
            "filterConfig": {"filters": [{"name": "regionFilter"}]}
        }),
    );
    write_json(
        &report.join(COLUMN_VISUAL),
        &json!({"name": "col1", "visual": {"visualType": "clusteredColumnChart"}}),
    );
    write_json(
        &report.join(DETAILS_PAGE),
        &json!({"name": "details", "displayName": "Details", "width": 1920, "height": 1080}),
    );
    report
}

fn make_fixture_model(base: &Path) -> PathBuf {
    let model = base.join("Sales.SemanticModel");
    write_json(
        &model.join("model.bim"),
        &json!({
            "name": "Sales",
            "compatibilityLevel": 1567,
            "model": {
                "culture": "en-US",
                "tables": [{
                    "name": "Orders",
                    "columns": [
                        {"name": "OrderDate", "dataType": "dateTime", "sourceColumn": "OrderDate"},
                        {"name": "Revenue", "dataType": "double", "sourceColumn": "Revenue"}
                    ],
                    "partitions": [{"name": "Orders", "source": {"type": "m", "expression": "Orders"}}]
                }]
            }
        }),
    );
    model
}

fn make_fixture_thin_report(base: &Path) -> PathBuf {
    let report = base.join("Thin.Report");
    write_json(
        &report.join("definition.pbir"),
        &json!({
            "version": "4.0",
            "datasetReference": {"byConnection": {
                "connectionString": "Data Source=powerbi://api.powerbi.com/v1.0/myorg/Finance;Initial Catalog=Sales"
            }}
        }),
    );
    write_json(
        &report.join("definition/pages/p1/page.json"),
        &json!({"name": "p1", "displayName": "Main", "width": 1280, "height": 720}),
    );
    report
}
