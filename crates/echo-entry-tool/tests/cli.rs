// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs, clippy::unwrap_used)]
use std::path::PathBuf;

use assert_cmd::Command;
use echo_entry_codec::{
    BinaryDataWriter, DataWriter, JsonDataWriter, NameBinder, SerializationContext, TypeName,
};
use predicates::prelude::*;
use tempfile::TempDir;

fn context() -> SerializationContext<NameBinder> {
    SerializationContext::new(NameBinder)
}

fn scenario<W: DataWriter<Type = TypeName>>(w: &mut W) {
    w.begin_reference_node(Some("root"), Some(&TypeName::from("Game.Player")), 0).unwrap();
    w.write_i32(Some("x"), 42).unwrap();
    w.write_string(Some("y"), "hi").unwrap();
    w.end_node(Some("root")).unwrap();
}

fn binary_file(dir: &TempDir) -> PathBuf {
    let mut w = BinaryDataWriter::new(Vec::new(), context());
    scenario(&mut w);
    let path = dir.path().join("scene.bin");
    std::fs::write(&path, w.into_inner().unwrap()).unwrap();
    path
}

fn json_file(dir: &TempDir) -> PathBuf {
    let mut w = JsonDataWriter::new(Vec::new(), context());
    scenario(&mut w);
    let path = dir.path().join("scene.json");
    std::fs::write(&path, w.into_inner().unwrap()).unwrap();
    path
}

fn echo_entries() -> Command {
    Command::cargo_bin("echo-entries").unwrap()
}

#[test]
fn dump_lists_a_binary_stream() {
    let dir = TempDir::new().unwrap();
    echo_entries()
        .arg("dump")
        .arg(binary_file(&dir))
        .assert()
        .success()
        .stdout(predicate::str::contains("root: { id=0 type=TypeName(\"Game.Player\")"))
        .stdout(predicate::str::contains("  x: 42i32"))
        .stdout(predicate::str::contains("  y: \"hi\""));
}

#[test]
fn dump_reads_json_by_extension() {
    let dir = TempDir::new().unwrap();
    echo_entries()
        .arg("dump")
        .arg(json_file(&dir))
        .assert()
        .success()
        .stdout(predicate::str::contains("  x: 42i64"));
}

#[test]
fn explicit_format_overrides_the_extension() {
    let dir = TempDir::new().unwrap();
    let renamed = dir.path().join("scene.dat");
    std::fs::rename(json_file(&dir), &renamed).unwrap();
    echo_entries()
        .args(["dump", "--format", "json"])
        .arg(&renamed)
        .assert()
        .success()
        .stdout(predicate::str::contains("  y: \"hi\""));
}

#[test]
fn summary_prints_only_counts() {
    let dir = TempDir::new().unwrap();
    echo_entries()
        .args(["dump", "--summary"])
        .arg(binary_file(&dir))
        .assert()
        .success()
        .stdout(
            "nodes: 1, arrays: 0, primitive arrays: 0, primitives: 2, references: 0, invalid: 0\n",
        );
}

#[test]
fn hex_prints_the_binary_rendering() {
    let dir = TempDir::new().unwrap();
    echo_entries()
        .arg("hex")
        .arg(binary_file(&dir))
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Binary hex dump: 01010400000072006F006F0074002F"));
}

#[test]
fn strict_mode_fails_on_codec_errors() {
    let dir = TempDir::new().unwrap();
    let path = binary_file(&dir);
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 4]).unwrap();

    echo_entries().arg("dump").arg(&path).assert().success();
    echo_entries()
        .args(["--strict", "dump"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("codec error(s) logged"));
}

#[test]
fn missing_file_is_reported() {
    let dir = TempDir::new().unwrap();
    echo_entries()
        .arg("dump")
        .arg(dir.path().join("absent.bin"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}
