// Sequent - 16-bit Control Engine Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

const LOAD: u16 = 0xF000;

const SET_SP: [u16; 2] = [0x4031, 0x0400]; // MOV #0x0400, SP
const EINT: u16 = 0xD232; // BIS #8, SR
const NOP: u16 = 0x4303;
const JMP_SELF: u16 = 0x3FFF;
const RETI: u16 = 0x1300;
const MARK_R10: u16 = 0x431A; // MOV #1, R10

fn nonce() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos()
}

fn temp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("sequent-tests-{}-{}", prefix, nonce()));
    std::fs::create_dir_all(&dir).expect("Failed to create temp dir");
    dir
}

/// Builds a flat image covering `LOAD..=0xFFFF` from (address, words) chunks.
fn image_bytes(chunks: &[(u16, &[u16])]) -> Vec<u8> {
    let mut bytes = vec![0u8; 0x1_0000 - LOAD as usize];
    for (addr, words) in chunks {
        for (i, w) in words.iter().enumerate() {
            let offset = (*addr - LOAD) as usize + 2 * i;
            bytes[offset..offset + 2].copy_from_slice(&w.to_le_bytes());
        }
    }
    bytes
}

fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("Failed to write temp file");
    path
}

/// MOV #1, R10 then spin.
fn write_mark_program(dir: &Path) -> PathBuf {
    write_file(
        dir,
        "mark.bin",
        &image_bytes(&[(LOAD, &[MARK_R10, JMP_SELF])]),
    )
}

fn run_sequent(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sequent"))
        .args(args)
        .output()
        .expect("Failed to execute command")
}

fn read_result(output_dir: &Path) -> serde_json::Value {
    let content =
        std::fs::read_to_string(output_dir.join("result.json")).expect("result.json missing");
    serde_json::from_str(&content).unwrap()
}

#[test]
fn test_script_pass_with_no_progress_expected() {
    let dir = temp_dir("pass");
    write_mark_program(&dir);
    let script = write_file(
        &dir,
        "script.yaml",
        br#"
schema_version: "1.0"
inputs:
  image: "mark.bin"
limits:
  max_cycles: 5000
  no_progress_cycles: 40
assertions:
  - expected_stop_reason: no_progress
  - register_value:
      register: R10
      expected_value: 1
"#,
    );
    let out_dir = dir.join("out");

    let output = run_sequent(&[
        "test",
        "--script",
        script.to_str().unwrap(),
        "--output-dir",
        out_dir.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(0), "{:?}", output);

    let result = read_result(&out_dir);
    assert_eq!(result["result_schema_version"], "1.0");
    assert_eq!(result["status"], "pass");
    assert_eq!(result["stop_reason"], "no_progress");
    assert_eq!(
        result["stop_reason_details"]["triggered_limit"]["name"],
        "no_progress_cycles"
    );
    assert!(result["cycles"].as_u64().unwrap() < 5000);
    assert_eq!(result["image_hash"].as_str().unwrap().len(), 64);
    assert!(out_dir.join("snapshot.json").exists());
}

#[test]
fn test_unexpected_no_progress_fails() {
    let dir = temp_dir("stuck");
    write_mark_program(&dir);
    let script = write_file(
        &dir,
        "script.yaml",
        br#"
schema_version: "1.0"
inputs:
  image: "mark.bin"
limits:
  max_cycles: 5000
  no_progress_cycles: 40
"#,
    );
    let out_dir = dir.join("out");

    let output = run_sequent(&[
        "test",
        "-c",
        script.to_str().unwrap(),
        "--output-dir",
        out_dir.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(read_result(&out_dir)["status"], "fail");
}

#[test]
fn test_register_assertion_failure_exit_code() {
    let dir = temp_dir("assert-fail");
    write_mark_program(&dir);
    let script = write_file(
        &dir,
        "script.yaml",
        br#"
schema_version: "1.0"
inputs:
  image: "mark.bin"
limits:
  max_cycles: 200
assertions:
  - register_value:
      register: R10
      expected_value: 2
"#,
    );
    let out_dir = dir.join("out");

    let output = run_sequent(&[
        "test",
        "--script",
        script.to_str().unwrap(),
        "--output-dir",
        out_dir.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(1));

    let result = read_result(&out_dir);
    assert_eq!(result["status"], "fail");
    assert_eq!(result["stop_reason"], "max_cycles");
    assert_eq!(result["cycles"], 200);
    assert_eq!(result["assertions"][0]["passed"], false);
    assert_eq!(result["assertions"][0]["actual"], 1);
}

#[test]
fn test_invalid_script_is_config_error() {
    let dir = temp_dir("bad-script");
    write_mark_program(&dir);
    let script = write_file(
        &dir,
        "script.yaml",
        br#"
schema_version: "2.0"
inputs:
  image: "mark.bin"
limits:
  max_cycles: 100
"#,
    );
    let out_dir = dir.join("out");

    let output = run_sequent(&[
        "test",
        "--script",
        script.to_str().unwrap(),
        "--output-dir",
        out_dir.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(2));

    let result = read_result(&out_dir);
    assert_eq!(result["status"], "error");
    assert_eq!(result["stop_reason"], "config_error");
    assert!(result["message"]
        .as_str()
        .unwrap()
        .contains("schema_version"));
    assert!(!out_dir.join("snapshot.json").exists());
}

#[test]
fn test_missing_image_is_config_error() {
    let dir = temp_dir("no-image");
    let script = write_file(
        &dir,
        "script.yaml",
        br#"
schema_version: "1.0"
inputs:
  image: "absent.bin"
limits:
  max_cycles: 100
"#,
    );

    let output = run_sequent(&["test", "--script", script.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_breakpoint_stops_at_instruction_boundary() {
    let dir = temp_dir("breakpoint");
    write_mark_program(&dir);
    let script = write_file(
        &dir,
        "script.yaml",
        br#"
schema_version: "1.0"
inputs:
  image: "mark.bin"
limits:
  max_cycles: 5000
assertions:
  - expected_stop_reason: breakpoint
  - register_value:
      register: PC
      expected_value: 0xF002
  - register_value:
      register: R10
      expected_value: 1
"#,
    );
    let out_dir = dir.join("out");

    let output = run_sequent(&[
        "test",
        "--script",
        script.to_str().unwrap(),
        "--output-dir",
        out_dir.to_str().unwrap(),
        "--breakpoint",
        "0xF002",
    ]);
    assert_eq!(output.status.code(), Some(0), "{:?}", output);

    let result = read_result(&out_dir);
    assert_eq!(result["stop_reason"], "breakpoint");
    assert_eq!(result["stop_reason_details"]["observed"]["value"], 0xF002);
    assert!(result["cycles"].as_u64().unwrap() < 20);
}

#[test]
fn test_irq_stimulus_from_manifest() {
    let dir = temp_dir("irq");
    write_file(
        &dir,
        "irq.bin",
        &image_bytes(&[
            (LOAD, &[SET_SP[0], SET_SP[1], EINT, NOP, JMP_SELF]),
            (0xF100, &[MARK_R10, RETI]),
            (0xFFF8, &[0xF100]),
        ]),
    );
    write_file(
        &dir,
        "system.yaml",
        br#"
name: "irq-bench"
irq_stimuli:
  - line: 0
    assert_at: 100
"#,
    );
    let script = write_file(
        &dir,
        "script.yaml",
        br#"
schema_version: "1.0"
inputs:
  image: "irq.bin"
  system: "system.yaml"
limits:
  max_cycles: 400
assertions:
  - expected_stop_reason: max_cycles
  - register_value:
      register: R10
      expected_value: 1
"#,
    );
    let out_dir = dir.join("out");

    let output = run_sequent(&[
        "test",
        "--script",
        script.to_str().unwrap(),
        "--output-dir",
        out_dir.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(0), "{:?}", output);

    let result = read_result(&out_dir);
    assert!(result["interrupts"].as_u64().unwrap() >= 1);
}

#[test]
fn test_interactive_run_writes_vcd_and_snapshot() {
    let dir = temp_dir("vcd");
    let image = write_mark_program(&dir);
    let vcd = dir.join("trace.vcd");
    let snapshot = dir.join("snapshot.json");

    let output = run_sequent(&[
        "--image",
        image.to_str().unwrap(),
        "--max-cycles",
        "50",
        "--vcd",
        vcd.to_str().unwrap(),
        "--snapshot",
        snapshot.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(0), "{:?}", output);

    let waveform = std::fs::read_to_string(&vcd).unwrap();
    assert!(waveform.contains("$timescale"));
    assert!(waveform.contains("$var wire"));
    assert!(waveform.contains("#50"));

    let snap: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&snapshot).unwrap()).unwrap();
    assert_eq!(snap["status"], "ok");
    assert_eq!(snap["cycles"], 50);
    assert_eq!(snap["stop_reason"], "max_cycles");
}

#[test]
fn test_interactive_requires_image() {
    let output = run_sequent(&["--max-cycles", "10"]);
    assert_eq!(output.status.code(), Some(2));
}
