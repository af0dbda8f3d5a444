//! CLI smoke tests for the kb binary

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn agents_list_without_agents_exits_one() {
    let temp = tempfile::tempdir().unwrap();

    Command::cargo_bin("kb")
        .unwrap()
        .current_dir(temp.path())
        .args(["agents", "list"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("No agents found"));
}

#[test]
fn agents_list_shows_valid_and_invalid() {
    let temp = tempfile::tempdir().unwrap();
    let agents = temp.path().join(".kb/agents");

    std::fs::create_dir_all(agents.join("good")).unwrap();
    std::fs::write(
        agents.join("good/agent.yml"),
        "id: good\nname: Good\ndescription: works\ncapabilities: [search]\npreferred_tier: small\n",
    )
    .unwrap();
    std::fs::create_dir_all(agents.join("broken")).unwrap();
    std::fs::write(agents.join("broken/agent.yml"), "id: broken\n").unwrap();

    Command::cargo_bin("kb")
        .unwrap()
        .current_dir(temp.path())
        .args(["agents", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("good"))
        .stdout(predicate::str::contains("broken"));
}

#[test]
fn run_without_transport_terminates_on_no_tool_calls() {
    let temp = tempfile::tempdir().unwrap();

    // The null client proposes no tools, so the loop terminates after one
    // iteration and the gate verdicts the run partial
    Command::cargo_bin("kb")
        .unwrap()
        .current_dir(temp.path())
        .args(["run", "say hello", "--json"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("no_tool_calls"));
}
