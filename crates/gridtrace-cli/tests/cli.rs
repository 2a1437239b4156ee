use assert_cmd::Command;
use gridtrace_io::{write_tables, CsvDirectory, RecordSource, SINCAL_TABLES};
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write(dir: &Path, name: &str, body: &str) {
    fs::write(dir.join(format!("{name}.csv")), body).unwrap();
}

/// Substation 200 -> 100 with a two-segment cable to a house at 102
fn export(dir: &Path) {
    write(
        dir,
        "Element",
        "Element_ID,Name,VoltLevel_ID,Flag_State\n\
         1,Cable 1,1,1\n2,MS Trafo,2,1\n3,House 3,1,1\n4,Cable 4,1,1\n",
    );
    write(
        dir,
        "Terminal",
        "Terminal_ID,Element_ID,Node_ID,TerminalNo,Flag_Terminal\n\
         10,1,100,1,7\n11,1,101,2,7\n20,2,200,1,7\n21,2,100,2,7\n\
         30,3,102,1,7\n40,4,101,1,7\n41,4,102,2,7\n",
    );
    write(dir, "VoltageLevel", "VoltLevel_ID,Un\n1,0.4\n2,20\n");
    write(
        dir,
        "Node",
        "Node_ID,Name,VoltLevel_ID,Flag_Variant\n100,LV,1,1\n101,Joint,1,1\n102,House,1,1\n200,MV,2,1\n",
    );
    write(
        dir,
        "Line",
        "Element_ID,Flag_Variant,l,Flag_LineTyp,r,x,r0,x0,c,c0\n\
         1,1,0.05,1,0.2,0.08,0.8,0.3,250,100\n4,1,0.03,1,0.2,0.08,0.8,0.3,250,100\n",
    );
    write(
        dir,
        "TwoWindingTransformer",
        "Element_ID,Un1,Un2,Sn,VecGrp,ur,Vfe\n2,20,0.4,0.4,10,4,4.6\n",
    );
    write(
        dir,
        "Load",
        "Element_ID,P1,Q1,P,Q,fP,fQ,Flag_Lf\n3,0,0,0.006,0,1,1,1\n",
    );
}

fn manifest(out: &Path) -> Value {
    let text = fs::read_to_string(out.join("manifest.json")).unwrap();
    serde_json::from_str(&text).unwrap()
}

#[test]
fn gridtrace_convert_whole_network() {
    let input = tempdir().unwrap();
    export(input.path());
    let out_dir = tempdir().unwrap();
    let out = out_dir.path().join("result");

    Command::cargo_bin("gridtrace")
        .unwrap()
        .args(["convert", input.path().to_str().unwrap(), "--out", out.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 1 network(s)"));

    let manifest = manifest(&out);
    let networks = manifest["networks"].as_array().unwrap();
    assert_eq!(networks.len(), 1);
    assert_eq!(networks[0]["name"], "network");
    assert!(out.join("network.json").exists());
    assert!(out.join("network.dot").exists());

    // cables 1 and 4 merge into one 80 m line
    let snapshot: Value =
        serde_json::from_str(&fs::read_to_string(out.join("network.json")).unwrap()).unwrap();
    let lines: Vec<&Value> = snapshot["elements"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["id"] == "1" || e["id"] == "4")
        .collect();
    assert_eq!(lines.len(), 1);
}

#[test]
fn gridtrace_convert_sqlite_database() {
    let csv = tempdir().unwrap();
    export(csv.path());
    let source = CsvDirectory::open(csv.path()).unwrap();
    let tables: Vec<_> = SINCAL_TABLES
        .iter()
        .filter_map(|name| source.table(name).unwrap())
        .collect();
    let out_dir = tempdir().unwrap();
    let db = out_dir.path().join("network.db");
    write_tables(&db, &tables).unwrap();
    let out = out_dir.path().join("result");

    Command::cargo_bin("gridtrace")
        .unwrap()
        .args(["convert", db.to_str().unwrap(), "--out", out.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 1 network(s)"));

    assert_eq!(manifest(&out)["networks"].as_array().unwrap().len(), 1);
    assert!(out.join("network.json").exists());

    let output = Command::cargo_bin("gridtrace")
        .unwrap()
        .args(["inspect", db.to_str().unwrap(), "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let summary: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["records"]["lines"], 2);
    assert_eq!(summary["graph"]["bus_count"], 4);
}

#[test]
fn gridtrace_convert_islands() {
    let input = tempdir().unwrap();
    export(input.path());
    let out_dir = tempdir().unwrap();
    let out = out_dir.path().join("islands");

    Command::cargo_bin("gridtrace")
        .unwrap()
        .args([
            "convert",
            input.path().to_str().unwrap(),
            "--out",
            out.to_str().unwrap(),
            "--separate-islands",
            "--resolve-cycles",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("100.mstrafo_2"));

    let manifest = manifest(&out);
    assert_eq!(manifest["networks"][0]["name"], "100.mstrafo_2");
    assert!(out.join("100.mstrafo_2.json").exists());
}

#[test]
fn gridtrace_convert_reads_config_file() {
    let input = tempdir().unwrap();
    export(input.path());
    let out_dir = tempdir().unwrap();
    let out = out_dir.path().join("lv");
    let config = out_dir.path().join("gridtrace.toml");
    fs::write(&config, "voltage_filter = \"lv\"\ninclude_transformers = false\n").unwrap();

    Command::cargo_bin("gridtrace")
        .unwrap()
        .args([
            "convert",
            input.path().to_str().unwrap(),
            "--out",
            out.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
        ])
        .assert()
        .success();

    let text = fs::read_to_string(out.join("network.json")).unwrap();
    assert!(text.contains("sourcebus_20000"));
    assert!(!text.contains("\"200\""));
}

#[test]
fn gridtrace_convert_missing_input_fails() {
    let out_dir = tempdir().unwrap();
    Command::cargo_bin("gridtrace")
        .unwrap()
        .args([
            "convert",
            out_dir.path().join("nope").to_str().unwrap(),
            "--out",
            out_dir.path().join("out").to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not a directory or a database file"));
}

#[test]
fn gridtrace_convert_never_overwrites_the_export() {
    let input = tempdir().unwrap();
    export(input.path());
    Command::cargo_bin("gridtrace")
        .unwrap()
        .args([
            "convert",
            input.path().to_str().unwrap(),
            "--out",
            input.path().to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("refusing to replace"));
    assert!(input.path().join("Line.csv").exists());
}

#[test]
fn gridtrace_inspect_json() {
    let input = tempdir().unwrap();
    export(input.path());
    let output = Command::cargo_bin("gridtrace")
        .unwrap()
        .args(["inspect", input.path().to_str().unwrap(), "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let summary: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["records"]["lines"], 2);
    assert_eq!(summary["records"]["transformers"], 1);
    assert_eq!(summary["graph"]["bus_count"], 4);
}

#[test]
fn gridtrace_completions_bash() {
    Command::cargo_bin("gridtrace")
        .unwrap()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gridtrace"));
}
