use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

fn fixture(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/data");
    path.push(name);
    path
}

fn bvbs() -> Command {
    let mut cmd = Command::cargo_bin("bvbs").expect("找不到 bvbs 可执行文件");
    cmd.env_remove("BVBS_CONFIG");
    cmd
}

#[test]
fn parse_lists_every_record() {
    bvbs()
        .arg("parse")
        .arg(fixture("sample.abs"))
        .assert()
        .success()
        .stdout(predicate::str::contains("#1 HALLE-3-12-BWS-1 type=BWS d=12 n=10"))
        .stdout(predicate::str::contains("checksum=valid (modulo-256)"))
        .stdout(predicate::str::contains("warning: checksum mismatch"))
        .stdout(predicate::str::contains("warning: no geometry found"))
        .stdout(predicate::str::contains("3 record(s), 0 with errors"));
}

#[test]
fn parse_json_is_machine_readable() {
    let output = bvbs()
        .args(["parse", "--json"])
        .arg(fixture("sample.abs"))
        .output()
        .expect("执行 bvbs parse 失败");
    assert!(output.status.success());

    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("输出应为合法 JSON");
    let entries = value.as_array().expect("输出应为数组");
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["metadata"]["quantity"], 10);
    assert_eq!(entries[0]["checksum"]["status"], "valid");
    assert_eq!(entries[1]["checksum"]["status"], "mismatch");
    assert_eq!(entries[0]["segments"].as_array().map(Vec::len), Some(3));
    assert!(entries[2]["segments"].is_null());
}

#[test]
fn verify_fails_on_mismatch() {
    bvbs()
        .arg("verify")
        .arg(fixture("sample.abs"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("#1 valid (modulo-256)"))
        .stdout(predicate::str::contains("#2 mismatch (found 56"))
        .stdout(predicate::str::contains("#3 missing"))
        .stderr(predicate::str::contains("1 record(s) failed checksum verification"));
}

#[test]
fn encode_prints_reference_stirrup() {
    bvbs()
        .args([
            "encode",
            "--diameter",
            "12",
            "--roll-diameter",
            "48",
            "--quantity",
            "10",
            "--position",
            "1",
            "--segment",
            "800:90:L",
            "--segment",
            "400:90:L",
            "--segment",
            "600",
        ])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("BF2D@H"))
        .stdout(predicate::str::contains("@Ps1800.0@a75.4@t1875.4@"))
        .stdout(predicate::str::contains("@Gw90.0@r24.0@oL@"));
}

#[test]
fn encode_rejects_invalid_shape() {
    bvbs()
        .args(["encode", "--diameter", "12", "--segment", "800:200:L"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least two segments are required"))
        .stderr(predicate::str::contains("segment 1: bend angle 200"));
}

#[test]
fn encode_rejects_malformed_segment() {
    bvbs()
        .args(["encode", "--diameter", "12", "--segment", "800:90:Q"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("direction must be L or R"));
}

#[test]
fn encoded_file_verifies_with_configured_variant() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let config = dir.path().join("bvbs.toml");
    std::fs::write(&config, "[encoder]\nvariant = \"legacy\"\n").expect("写入配置失败");
    let output = dir.path().join("hook.abs");

    bvbs()
        .arg("--config")
        .arg(&config)
        .args([
            "encode",
            "--diameter",
            "10",
            "--segment",
            "150:135:L",
            "--segment",
            "1200:-90",
            "--segment",
            "300",
            "--output",
        ])
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let written = std::fs::read_to_string(&output).expect("读取输出文件失败");
    assert!(written.contains("@Gw-90.0@r20.0@oR@"), "written: {written}");

    bvbs()
        .arg("verify")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("#1 valid"));
}

#[test]
fn geometry_prints_path_or_placeholder() {
    bvbs()
        .arg("geometry")
        .arg(fixture("sample.abs"))
        .assert()
        .success()
        .stdout(predicate::str::contains("#1 HALLE-3-12-BWS-1 viewBox="))
        .stdout(predicate::str::contains("M0.00 0.00 L800.00 0.00"))
        .stdout(predicate::str::contains("#3 BWS-9 no preview"));
}
