use std::collections::HashSet;
use std::path::Path;

use clap::ValueEnum;

use crate::directory::{SourceDirectory, SourceSnapshot};
use crate::error::{Result, TrackportError};
use crate::model::{Project, User};
use crate::output::{self, Format, ListedRecord};

/// Redmine account status of a locked user.
const LOCKED: u8 = 3;

/// Source resources whose identifying values can be listed, to help write
/// mapping tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListResource {
    Users,
    Groups,
    Projects,
    Trackers,
    Statuses,
    Priorities,
    CustomFields,
    Categories,
    Versions,
}

impl ListResource {
    fn is_project_scoped(self) -> bool {
        matches!(self, Self::Categories | Self::Versions)
    }
}

/// Which user accounts `list users` shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UserStatus {
    #[default]
    Active,
    Locked,
    All,
}

impl UserStatus {
    fn includes(self, user: &User) -> bool {
        let locked = user.status == Some(LOCKED);
        match self {
            Self::Active => user.status.is_none_or(|s| s == 1),
            Self::Locked => locked,
            Self::All => true,
        }
    }
}

pub fn run(
    resource: ListResource,
    source: &Path,
    project: Option<&str>,
    users: UserStatus,
    format: Format,
) -> Result<()> {
    let snapshot = SourceSnapshot::load(source)?;
    let directory = SourceDirectory::build(&snapshot, true);
    let records = collect(&directory, resource, project, users)?;
    output::print_records(&records, format)
}

/// `Parent / Child` name of a project, outermost ancestor first.
fn full_name(directory: &SourceDirectory, project: &Project) -> String {
    let mut names = vec![project.name.as_str()];
    let mut visited = HashSet::from([project.id]);
    let mut parent = project.parent.as_ref();
    while let Some(reference) = parent {
        if !visited.insert(reference.id) {
            break;
        }
        match directory.project(reference.id) {
            Some(p) => {
                names.push(&p.name);
                parent = p.parent.as_ref();
            }
            None => break,
        }
    }
    names.reverse();
    names.join(" / ")
}

fn collect(
    directory: &SourceDirectory,
    resource: ListResource,
    project: Option<&str>,
    users: UserStatus,
) -> Result<Vec<ListedRecord>> {
    let scope = match (resource.is_project_scoped(), project) {
        (true, Some(identifier)) => Some(directory.project_by_identifier(identifier).ok_or_else(
            || TrackportError::InvalidConfig(format!("no project with identifier '{identifier}'")),
        )?),
        (true, None) => {
            return Err(TrackportError::InvalidConfig(
                "--project is required for categories and versions".into(),
            ));
        }
        (false, _) => None,
    };

    let records = match resource {
        ListResource::Users => directory
            .users()
            .filter(|u| users.includes(u))
            .map(|u| {
                let full_name = [u.firstname.as_deref(), u.lastname.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(" ");
                let mut detail = Vec::new();
                if !full_name.is_empty() {
                    detail.push(full_name);
                }
                if u.status == Some(LOCKED) {
                    detail.push("locked".into());
                }
                ListedRecord::new(u.id, &u.login, (!detail.is_empty()).then(|| detail.join(", ")))
            })
            .collect(),
        ListResource::Groups => directory
            .groups()
            .map(|g| ListedRecord::new(g.id, &g.name, None))
            .collect(),
        ListResource::Projects => directory
            .projects()
            .map(|p| ListedRecord::new(p.id, &p.identifier, Some(full_name(directory, p))))
            .collect(),
        ListResource::Trackers => directory
            .trackers()
            .map(|t| ListedRecord::new(t.id, &t.name, None))
            .collect(),
        ListResource::Statuses => directory
            .statuses()
            .map(|s| ListedRecord::new(s.id, &s.name, s.is_closed.then(|| "closed".into())))
            .collect(),
        ListResource::Priorities => directory
            .priorities()
            .map(|p| ListedRecord::new(p.id, &p.name, p.is_default.then(|| "default".into())))
            .collect(),
        ListResource::CustomFields => directory
            .custom_fields()
            .map(|c| {
                let detail = if c.multiple {
                    format!("{}, multiple", c.field_format)
                } else {
                    c.field_format.clone()
                };
                ListedRecord::new(c.id, &c.name, Some(detail))
            })
            .collect(),
        ListResource::Categories => scope
            .map(|p| {
                p.issue_categories
                    .iter()
                    .map(|c| ListedRecord::new(c.id, &c.name, None))
                    .collect()
            })
            .unwrap_or_default(),
        ListResource::Versions => scope
            .map(|p| {
                p.versions
                    .iter()
                    .map(|v| ListedRecord::new(v.id, &v.name, v.status.clone()))
                    .collect()
            })
            .unwrap_or_default(),
    };
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use serde_json::json;

    fn directory() -> SourceDirectory {
        SourceDirectory::build(&fixtures::snapshot(), true)
    }

    fn list(resource: ListResource, project: Option<&str>) -> Result<Vec<ListedRecord>> {
        collect(&directory(), resource, project, UserStatus::Active)
    }

    fn values(records: &[ListedRecord]) -> Vec<&str> {
        records.iter().map(|r| r.value.as_str()).collect()
    }

    #[test]
    fn users_are_filtered_by_account_status() {
        let dir = directory();
        let active = collect(&dir, ListResource::Users, None, UserStatus::Active).unwrap();
        assert_eq!(values(&active), vec!["alice", "bob"]);
        assert_eq!(active[0].detail, None);

        let locked = collect(&dir, ListResource::Users, None, UserStatus::Locked).unwrap();
        assert_eq!(values(&locked), vec!["carol"]);
        assert_eq!(locked[0].detail.as_deref(), Some("locked"));

        let all = collect(&dir, ListResource::Users, None, UserStatus::All).unwrap();
        assert_eq!(values(&all), vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn projects_show_their_hierarchy() {
        let mut snapshot = fixtures::snapshot();
        snapshot.projects[1].parent = Some(serde_json::from_value(json!({"id": 1})).unwrap());
        snapshot.projects[2].parent = Some(serde_json::from_value(json!({"id": 2})).unwrap());
        let dir = SourceDirectory::build(&snapshot, true);
        let records = collect(&dir, ListResource::Projects, None, UserStatus::Active).unwrap();
        let names: Vec<_> = records.iter().filter_map(|r| r.detail.as_deref()).collect();
        assert_eq!(names, vec!["Core", "Core / Docs", "Core / Docs / Legacy"]);
    }

    #[test]
    fn categories_are_listed_per_project() {
        let records = list(ListResource::Categories, Some("core")).unwrap();
        let names: Vec<_> = records.iter().map(|r| r.value.as_str()).collect();
        assert_eq!(names, vec!["UI", "DB"]);

        let err = list(ListResource::Versions, None).unwrap_err();
        assert_eq!(err.code(), "invalid_config");
        let err = list(ListResource::Versions, Some("nope")).unwrap_err();
        assert_eq!(err.code(), "invalid_config");
    }

    #[test]
    fn custom_fields_show_format() {
        let records = list(ListResource::CustomFields, None).unwrap();
        let reviewers = records.iter().find(|r| r.value == "Reviewers").unwrap();
        assert_eq!(reviewers.detail.as_deref(), Some("user, multiple"));
    }
}
