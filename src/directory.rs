//! Lookup tables over the source records of one export run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackportError};
use crate::model::{
    CustomFieldDef, Group, Issue, IssueCategory, IssuePriority, IssueStatus, NamedRef, Project,
    Tracker, User, Version,
};

/// Everything the source client yields for one run, in the shape it yields it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSnapshot {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub trackers: Vec<Tracker>,
    #[serde(default)]
    pub issue_statuses: Vec<IssueStatus>,
    #[serde(default)]
    pub issue_priorities: Vec<IssuePriority>,
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldDef>,
    #[serde(default)]
    pub issues: Vec<Issue>,
}

impl SourceSnapshot {
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

/// Source records indexed by ID. Groups are only indexed when issues may be
/// assigned to groups; custom fields only when they customize issues.
#[derive(Debug, Default)]
pub struct SourceDirectory {
    users: BTreeMap<u64, User>,
    groups: Option<BTreeMap<u64, Group>>,
    projects: BTreeMap<u64, Project>,
    trackers: BTreeMap<u64, Tracker>,
    statuses: BTreeMap<u64, IssueStatus>,
    priorities: BTreeMap<u64, IssuePriority>,
    custom_fields: BTreeMap<u64, CustomFieldDef>,
}

impl SourceDirectory {
    pub fn build(snapshot: &SourceSnapshot, allow_group_assignment: bool) -> Self {
        fn index<T: Clone>(items: &[T], id: impl Fn(&T) -> u64) -> BTreeMap<u64, T> {
            items.iter().map(|item| (id(item), item.clone())).collect()
        }

        Self {
            users: index(&snapshot.users, |u| u.id),
            groups: allow_group_assignment.then(|| index(&snapshot.groups, |g| g.id)),
            projects: index(&snapshot.projects, |p| p.id),
            trackers: index(&snapshot.trackers, |t| t.id),
            statuses: index(&snapshot.issue_statuses, |s| s.id),
            priorities: index(&snapshot.issue_priorities, |p| p.id),
            custom_fields: snapshot
                .custom_fields
                .iter()
                .filter(|cf| cf.customized_type == "issue")
                .map(|cf| (cf.id, cf.clone()))
                .collect(),
        }
    }

    pub fn user(&self, id: u64) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn group(&self, id: u64) -> Option<&Group> {
        self.groups.as_ref().and_then(|groups| groups.get(&id))
    }

    pub fn groups_enabled(&self) -> bool {
        self.groups.is_some()
    }

    pub fn project(&self, id: u64) -> Option<&Project> {
        self.projects.get(&id)
    }

    pub fn project_by_identifier(&self, identifier: &str) -> Option<&Project> {
        self.projects.values().find(|p| p.identifier == identifier)
    }

    pub fn tracker(&self, id: u64) -> Option<&Tracker> {
        self.trackers.get(&id)
    }

    pub fn status(&self, id: u64) -> Option<&IssueStatus> {
        self.statuses.get(&id)
    }

    pub fn priority(&self, id: u64) -> Option<&IssuePriority> {
        self.priorities.get(&id)
    }

    pub fn custom_field(&self, id: u64) -> Option<&CustomFieldDef> {
        self.custom_fields.get(&id)
    }

    pub fn category(&self, project_id: u64, id: u64) -> Option<&IssueCategory> {
        self.project(project_id)?
            .issue_categories
            .iter()
            .find(|c| c.id == id)
    }

    /// Versions of a project. Projects without versions yield an empty slice.
    pub fn versions(&self, project_id: u64) -> &[Version] {
        self.project(project_id)
            .map(|p| p.versions.as_slice())
            .unwrap_or_default()
    }

    pub fn version(&self, project_id: u64, id: u64) -> Option<&Version> {
        self.versions(project_id).iter().find(|v| v.id == id)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter().flat_map(|groups| groups.values())
    }

    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    pub fn trackers(&self) -> impl Iterator<Item = &Tracker> {
        self.trackers.values()
    }

    pub fn statuses(&self) -> impl Iterator<Item = &IssueStatus> {
        self.statuses.values()
    }

    pub fn priorities(&self) -> impl Iterator<Item = &IssuePriority> {
        self.priorities.values()
    }

    pub fn custom_fields(&self) -> impl Iterator<Item = &CustomFieldDef> {
        self.custom_fields.values()
    }

    // Strict lookups for references carried by issues. A miss means the
    // snapshot is inconsistent, which aborts the run.

    pub fn require_user(&self, reference: &NamedRef) -> Result<&User> {
        self.user(reference.id).ok_or(TrackportError::UnknownResource {
            kind: "user",
            id: reference.id,
        })
    }

    pub fn require_project(&self, reference: &NamedRef) -> Result<&Project> {
        self.project(reference.id)
            .ok_or(TrackportError::UnknownResource {
                kind: "project",
                id: reference.id,
            })
    }

    pub fn require_tracker(&self, reference: &NamedRef) -> Result<&Tracker> {
        self.tracker(reference.id)
            .ok_or(TrackportError::UnknownResource {
                kind: "tracker",
                id: reference.id,
            })
    }

    pub fn require_status(&self, reference: &NamedRef) -> Result<&IssueStatus> {
        self.status(reference.id)
            .ok_or(TrackportError::UnknownResource {
                kind: "issue status",
                id: reference.id,
            })
    }

    pub fn require_priority(&self, reference: &NamedRef) -> Result<&IssuePriority> {
        self.priority(reference.id)
            .ok_or(TrackportError::UnknownResource {
                kind: "issue priority",
                id: reference.id,
            })
    }

    pub fn require_category(
        &self,
        project_id: u64,
        reference: &NamedRef,
    ) -> Result<&IssueCategory> {
        self.category(project_id, reference.id)
            .ok_or(TrackportError::UnknownResource {
                kind: "issue category",
                id: reference.id,
            })
    }

    pub fn require_version(&self, project_id: u64, reference: &NamedRef) -> Result<&Version> {
        self.version(project_id, reference.id)
            .ok_or(TrackportError::UnknownResource {
                kind: "version",
                id: reference.id,
            })
    }

    pub fn require_custom_field(&self, id: u64) -> Result<&CustomFieldDef> {
        self.custom_field(id).ok_or(TrackportError::UnknownResource {
            kind: "custom field",
            id,
        })
    }
}
