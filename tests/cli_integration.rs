use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::tempdir;

const CONFIG: &str = r#"
source:
  url: https://redmine.example.com
mappings:
  user_user: {alice: alice.j, bob: bob.j}
  project_project: {core: CORE}
  tracker_issue_type: {Bug: Bug}
  issue_status_issue_status: {New: Open, Closed: Done}
  issue_priority_issue_priority: {Normal: Medium}
  relationship_link_type: {relates: Relates}
"#;

fn snapshot() -> Value {
    json!({
        "users": [
            {"id": 1, "login": "alice", "firstname": "Alice", "lastname": "Jones"},
            {"id": 2, "login": "bob"},
            {"id": 3, "login": "carol", "status": 3}
        ],
        "projects": [
            {"id": 1, "identifier": "core", "name": "Core"},
            {"id": 2, "identifier": "web", "name": "Web", "parent": {"id": 1, "name": "Core"}}
        ],
        "trackers": [{"id": 1, "name": "Bug"}],
        "issue_statuses": [
            {"id": 1, "name": "New"},
            {"id": 5, "name": "Closed", "is_closed": true}
        ],
        "issue_priorities": [{"id": 2, "name": "Normal", "is_default": true}],
        "issues": [{
            "id": 100,
            "project": {"id": 1},
            "tracker": {"id": 1},
            "status": {"id": 5},
            "priority": {"id": 2},
            "author": {"id": 1},
            "subject": "Crash on save",
            "created_on": "2020-01-01T10:00:00Z",
            "updated_on": "2020-01-05T10:00:00Z",
            "journals": [{
                "id": 7,
                "user": {"id": 2},
                "created_on": "2020-01-03T09:30:00Z",
                "notes": "Fixed in trunk.",
                "details": [
                    {"property": "attr", "name": "status_id", "old_value": "1", "new_value": "5"}
                ]
            }],
            "relations": [
                {"id": 3, "issue_id": 100, "issue_to_id": 101, "relation_type": "relates"}
            ]
        }]
    })
}

fn workspace(config: &str) -> tempfile::TempDir {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("config.yml"), config).unwrap();
    fs::write(
        dir.path().join("snapshot.json"),
        serde_json::to_string(&snapshot()).unwrap(),
    )
    .unwrap();
    dir
}

fn run_trackport(root: &Path, args: &[&str], stdin: Option<&str>) -> Output {
    let binary = assert_cmd::cargo::cargo_bin!("trackport");
    let mut cmd = Command::new(binary);
    cmd.current_dir(root);
    cmd.env("NO_COLOR", "1");
    cmd.env_remove("RUST_LOG");
    cmd.args(args);
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    let mut child = cmd.spawn().expect("trackport command executes");
    if let Some(input) = stdin {
        // The command may exit before reading its input.
        let _ = child.stdin.take().unwrap().write_all(input.as_bytes());
    }
    child.wait_with_output().unwrap()
}

fn run_json(root: &Path, args: &[&str]) -> Value {
    let output = run_trackport(root, args, None);
    assert!(
        output.status.success(),
        "trackport {:?} failed:\nstdout:\n{}\nstderr:\n{}",
        args,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid json stdout")
}

fn run_err_json(root: &Path, args: &[&str]) -> Value {
    let output = run_trackport(root, args, None);
    assert!(
        !output.status.success(),
        "expected trackport {:?} to fail, but it succeeded:\nstdout:\n{}",
        args,
        String::from_utf8_lossy(&output.stdout),
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    let json_line = stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("");
    serde_json::from_str(json_line).expect("valid json error line in stderr")
}

const EXPORT: &[&str] = &[
    "export",
    "--source",
    "snapshot.json",
    "--config",
    "config.yml",
    "--no-prompt",
];

#[test]
fn export_writes_issue_documents_into_project_buckets() {
    let dir = workspace(CONFIG);
    let document = run_json(dir.path(), EXPORT);

    let projects = document["projects"].as_array().unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0]["key"], "CORE");
    assert!(document.get("links").is_none());

    let issue = &projects[0]["issues"][0];
    assert_eq!(issue["externalId"], "100");
    assert_eq!(issue["summary"], "Crash on save");
    assert_eq!(issue["reporter"], "alice.j");
    assert_eq!(issue["issueType"], "Bug");
    assert_eq!(issue["status"], "Done");
    assert_eq!(issue["priority"], "Medium");
    assert_eq!(issue["created"], "2020-01-01T10:00:00Z");
    assert!(issue.get("assignee").is_none());

    assert_eq!(
        issue["comments"],
        json!([{"author": "bob.j", "body": "Fixed in trunk.", "created": "2020-01-03T09:30:00Z"}])
    );
    let event = &issue["history"][0];
    assert_eq!(event["author"], "bob.j");
    assert_eq!(event["created"], "2020-01-03T09:30:00Z");
    assert_eq!(event["items"][0]["field"], "status");
    assert_eq!(event["items"][0]["fieldType"], "jira");
    assert_eq!(event["items"][0]["fromString"], "Open");
    assert_eq!(event["items"][0]["toString"], "Done");
}

#[test]
fn export_links_only() {
    let dir = workspace(CONFIG);
    let mut args = EXPORT.to_vec();
    args.extend(["--links", "--no-issues", "--pretty-print"]);
    let document = run_json(dir.path(), &args);

    assert_eq!(document["projects"], json!([{"key": "CORE", "issues": []}]));
    assert_eq!(
        document["links"],
        json!([{"name": "Relates", "sourceId": "100", "destinationId": "101"}])
    );
}

#[test]
fn export_to_file_prints_summary() {
    let dir = workspace(CONFIG);
    let mut args = EXPORT.to_vec();
    args.extend(["--links", "--output", "out.json"]);
    let summary = run_json(dir.path(), &args);

    assert_eq!(summary["output"], "out.json");
    assert_eq!(summary["projects"], 1);
    assert_eq!(summary["issues"], 1);
    assert_eq!(summary["links"], 1);

    let written: Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("out.json")).unwrap()).unwrap();
    assert_eq!(written["projects"][0]["issues"][0]["externalId"], "100");
}

#[test]
fn unmapped_value_fails_without_prompting() {
    let dir = workspace(&CONFIG.replace("{Normal: Medium}", "{}"));
    let err = run_err_json(dir.path(), EXPORT);
    assert_eq!(err["error"], "mapping_unresolved");
    assert!(err["message"].as_str().unwrap().contains("'Normal'"));
}

#[test]
fn piped_input_is_never_prompted() {
    let dir = workspace(&CONFIG.replace("{Normal: Medium}", "{}"));
    let output = run_trackport(
        dir.path(),
        &["export", "--source", "snapshot.json", "--config", "config.yml"],
        Some("Low\n"),
    );
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());

    let stderr = String::from_utf8_lossy(&output.stderr);
    let last = stderr.lines().last().unwrap_or("");
    let err: Value = serde_json::from_str(last).expect("valid json error line in stderr");
    assert_eq!(err["error"], "mapping_unresolved");
    assert!(!stderr.contains("[Issue priority"), "{stderr}");
}

#[test]
fn filter_selects_issues_to_export() {
    let dir = workspace(CONFIG);
    let mut args = EXPORT.to_vec();
    args.extend(["--output", "out.json", "--filter", "project_id=core"]);
    let summary = run_json(dir.path(), &args);
    // Issue 100 is closed and only open issues match by default.
    assert_eq!(summary["issues"], 0);

    let mut args = EXPORT.to_vec();
    args.extend(["--output", "out.json", "--filter", "project_id=core&status_id=closed"]);
    let summary = run_json(dir.path(), &args);
    assert_eq!(summary["issues"], 1);

    let mut args = EXPORT.to_vec();
    args.extend(["--output", "out.json", "--filter", "status_id=*&issue_id=7,8"]);
    let summary = run_json(dir.path(), &args);
    assert_eq!(summary["issues"], 0);
}

#[test]
fn malformed_filter_is_rejected() {
    let dir = workspace(CONFIG);
    let mut args = EXPORT.to_vec();
    args.extend(["--filter", "tracker_id=bug"]);
    let err = run_err_json(dir.path(), &args);
    assert_eq!(err["error"], "invalid_filter");
    assert!(err["message"].as_str().unwrap().contains("tracker_id"));
}

#[test]
fn pretty_errors_are_plain_text() {
    let dir = workspace("mappings:\n  nonsense_table: {}\n");
    let output = run_trackport(
        dir.path(),
        &["--format", "pretty", "check-config", "--config", "config.yml"],
        None,
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("error: invalid configuration"), "{stderr}");
}

#[test]
fn check_config_reports_tables_and_coverage() {
    let dir = workspace(CONFIG);
    let report = run_json(
        dir.path(),
        &["check-config", "--config", "config.yml", "--source", "snapshot.json"],
    );

    assert_eq!(report["config"], "config.yml");
    assert_eq!(report["features"]["text_formatting"], "none");
    let tables = report["tables"].as_array().unwrap();
    assert!(tables.contains(&json!({"table": "user_user", "values": 2})));
    assert!(tables.contains(&json!({"table": "issue_category_component", "values": 0})));

    let coverage = report["coverage"].as_array().unwrap();
    let unmapped = |resource: &str| {
        coverage
            .iter()
            .find(|c| c["resource"] == resource)
            .map(|c| c["unmapped"].clone())
            .unwrap()
    };
    assert_eq!(unmapped("user"), json!(["carol"]));
    assert_eq!(unmapped("project"), json!(["web"]));
    assert_eq!(unmapped("tracker"), json!([]));
    assert_eq!(
        report["warnings"],
        json!(["no source api_key: attachment URIs will not authenticate"])
    );
}

#[test]
fn check_config_pretty_lists_tables() {
    let dir = workspace(CONFIG);
    assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("trackport"))
        .current_dir(dir.path())
        .env("NO_COLOR", "1")
        .args(["--pretty", "check-config", "--config", "config.yml"])
        .assert()
        .success()
        .stderr(
            predicate::str::contains("config.yml is valid")
                .and(predicate::str::contains("TABLE"))
                .and(predicate::str::contains("user_user"))
                .and(predicate::str::contains("RESOURCE").not()),
        );
}

#[test]
fn check_config_names_the_misshapen_value() {
    let dir = workspace("mappings:\n  user_user:\n    jsmith: 42\n");
    let err = run_err_json(dir.path(), &["check-config", "--config", "config.yml"]);
    assert_eq!(err["error"], "invalid_config");
    let message = err["message"].as_str().unwrap();
    assert!(message.contains("'user_user'") && message.contains("'jsmith'"), "{message}");
}

#[test]
fn check_config_rejects_unknown_tables() {
    let dir = workspace("mappings:\n  nonsense_table: {}\n");
    let err = run_err_json(dir.path(), &["check-config", "--config", "config.yml"]);
    assert_eq!(err["error"], "invalid_config");
}

#[test]
fn list_users_shows_logins() {
    let dir = workspace(CONFIG);
    let users = run_json(dir.path(), &["list", "users", "--source", "snapshot.json"]);
    assert_eq!(
        users,
        json!([
            {"id": 1, "value": "alice", "detail": "Alice Jones"},
            {"id": 2, "value": "bob"}
        ])
    );
}

#[test]
fn list_users_by_account_status() {
    let dir = workspace(CONFIG);
    let locked = run_json(dir.path(), &["list", "users", "--locked", "--source", "snapshot.json"]);
    assert_eq!(locked, json!([{"id": 3, "value": "carol", "detail": "locked"}]));

    let all = run_json(dir.path(), &["list", "users", "--all", "--source", "snapshot.json"]);
    assert_eq!(all.as_array().unwrap().len(), 3);

    let output = run_trackport(
        dir.path(),
        &["list", "users", "--all", "--locked", "--source", "snapshot.json"],
        None,
    );
    assert!(!output.status.success());
}

#[test]
fn list_projects_shows_full_names() {
    let dir = workspace(CONFIG);
    let projects = run_json(dir.path(), &["list", "projects", "--source", "snapshot.json"]);
    assert_eq!(
        projects,
        json!([
            {"id": 1, "value": "core", "detail": "Core"},
            {"id": 2, "value": "web", "detail": "Core / Web"}
        ])
    );
}

#[test]
fn long_version_names_the_commit() {
    let dir = workspace(CONFIG);
    assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("trackport"))
        .current_dir(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with(format!(
            "trackport {} (commit ",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn list_pretty_prints_a_table() {
    let dir = workspace(CONFIG);
    assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("trackport"))
        .current_dir(dir.path())
        .env("NO_COLOR", "1")
        .args(["--pretty", "list", "statuses", "--source", "snapshot.json"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("ID VALUE")
                .and(predicate::str::contains("Closed"))
                .and(predicate::str::contains("closed")),
        );
}

#[test]
fn categories_require_a_project() {
    let dir = workspace(CONFIG);
    assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("trackport"))
        .current_dir(dir.path())
        .args(["list", "categories", "--source", "snapshot.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error\":\"invalid_config\""));
}
