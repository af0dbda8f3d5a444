//! CLI smoke tests for the ms binary

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn show_missing_session_exits_one() {
    let temp = tempfile::tempdir().unwrap();

    Command::cargo_bin("ms")
        .unwrap()
        .current_dir(temp.path())
        .args(["show", "--session-id", "ghost"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("No memory entries"));
}

#[test]
fn shared_on_empty_store_prints_sections() {
    let temp = tempfile::tempdir().unwrap();

    Command::cargo_bin("ms")
        .unwrap()
        .current_dir(temp.path())
        .arg("shared")
        .assert()
        .success()
        .stdout(predicate::str::contains("Preferences"));
}

#[test]
fn shared_json_round_trips_written_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join(".kb/memory/shared/memory.json");

    let mut memory = memstore::SharedMemory::default();
    memory.preferences.push(memstore::SharedFact {
        content: "short answers".to_string(),
        updated_at: 1,
    });
    memstore::save_shared_memory(&path, &memory).unwrap();

    Command::cargo_bin("ms")
        .unwrap()
        .current_dir(temp.path())
        .args(["shared", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("short answers"));
}
