//! Shared source data for unit tests.

use serde_json::{Value, json};

use crate::config::MappingConfig;
use crate::directory::{SourceDirectory, SourceSnapshot};
use crate::export::ExportContext;
use crate::model::Issue;
use crate::prompt::NoPrompt;
use crate::resolver::Resolver;
use crate::text::WikiConverter;

pub const CONFIG: &str = r#"
mappings:
  user_user: {alice: alice.j, bob: bob.j, carol: carol.j}
  group_user: {devs: dev-team}
  project_project: {core: CORE, docs: DOCS, legacy: CORE}
  tracker_issue_type: {Bug: Bug, Feature: Story}
  issue_status_issue_status: {New: Open, Closed: Done, Rejected: Done}
  issue_priority_issue_priority: {Normal: Medium, Urgent: Highest}
  issue_category_component:
    core: {UI: ui}
  issue_category_label:
    core: {DB: database}
  version_version:
    core: {'1.0': v1, '2.0': v2}
  custom_field_custom_field:
    Severity: Severity
    Reviewer: Reviewer
    Flag: Flag
    Points: Story Points
    Reviewers: Reviewers
    Notes: Notes
  relationship_link_type: {relates: Relates, blocks: Blocks}
"#;

pub fn snapshot() -> SourceSnapshot {
    serde_json::from_value(json!({
        "users": [
            {"id": 1, "login": "alice"},
            {"id": 2, "login": "bob"},
            {"id": 3, "login": "carol", "status": 3}
        ],
        "groups": [{"id": 10, "name": "devs"}],
        "projects": [
            {"id": 1, "identifier": "core", "name": "Core",
             "issue_categories": [{"id": 4, "name": "UI"}, {"id": 5, "name": "DB"}],
             "versions": [{"id": 9, "name": "1.0"}, {"id": 11, "name": "2.0"}]},
            {"id": 2, "identifier": "docs", "name": "Docs"},
            {"id": 3, "identifier": "legacy", "name": "Legacy"}
        ],
        "trackers": [{"id": 1, "name": "Bug"}, {"id": 2, "name": "Feature"}],
        "issue_statuses": [
            {"id": 1, "name": "New"},
            {"id": 5, "name": "Closed", "is_closed": true},
            {"id": 6, "name": "Rejected", "is_closed": true}
        ],
        "issue_priorities": [
            {"id": 2, "name": "Normal", "is_default": true},
            {"id": 4, "name": "Urgent"}
        ],
        "custom_fields": [
            {"id": 1, "name": "Severity", "field_format": "list", "customized_type": "issue"},
            {"id": 2, "name": "Reviewer", "field_format": "user", "customized_type": "issue"},
            {"id": 3, "name": "Flag", "field_format": "bool", "customized_type": "issue"},
            {"id": 4, "name": "Points", "field_format": "int", "customized_type": "issue"},
            {"id": 5, "name": "Reviewers", "field_format": "user", "customized_type": "issue",
             "multiple": true},
            {"id": 6, "name": "Notes", "field_format": "text", "customized_type": "issue"},
            {"id": 7, "name": "Address", "field_format": "ip", "customized_type": "issue"}
        ]
    }))
    .unwrap()
}

pub fn directory() -> SourceDirectory {
    SourceDirectory::build(&snapshot(), true)
}

pub fn config() -> MappingConfig {
    MappingConfig::from_yaml(CONFIG).unwrap()
}

pub fn context(directory: &SourceDirectory) -> ExportContext<'_, NoPrompt> {
    let config = config();
    let text = WikiConverter::new(config.features.text_formatting);
    ExportContext::new(directory, Resolver::new(config, NoPrompt), Box::new(text))
}

/// A minimal issue of project `core`, with `overrides` replacing top-level keys.
pub fn issue(overrides: Value) -> Issue {
    let mut base = json!({
        "id": 100,
        "project": {"id": 1},
        "tracker": {"id": 1},
        "status": {"id": 1},
        "priority": {"id": 2},
        "author": {"id": 1},
        "subject": "Crash on save",
        "created_on": "2020-01-01T10:00:00Z",
        "updated_on": "2020-01-05T10:00:00Z"
    });
    if let (Some(base), Value::Object(overrides)) = (base.as_object_mut(), overrides) {
        base.extend(overrides);
    }
    serde_json::from_value(base).unwrap()
}

/// A journal entry by `user` at `2020-01-0{day}T12:00:00Z`.
pub fn journal(id: u64, user: u64, day: u32, details: Value) -> Value {
    json!({
        "id": id,
        "user": {"id": user},
        "created_on": format!("2020-01-{day:02}T12:00:00Z"),
        "details": details
    })
}
