//! Issue selection with Redmine's issue-list query syntax, applied to a
//! loaded snapshot: `project_id=core&tracker_id=1,2&status_id=closed`.
//!
//! Criteria combine with AND; comma-separated values within one criterion
//! combine with OR. As in Redmine, a project also selects its subprojects,
//! and only open issues are selected unless `status_id` says otherwise.

use std::collections::{BTreeSet, HashSet};

use crate::directory::SourceDirectory;
use crate::error::{Result, TrackportError};
use crate::model::Issue;

#[derive(Debug, Clone, PartialEq, Eq)]
enum StatusFilter {
    Open,
    Closed,
    Any,
    Ids(BTreeSet<u64>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReferenceField {
    Tracker,
    Priority,
    Author,
    AssignedTo,
    Category,
    FixedVersion,
}

impl ReferenceField {
    fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "tracker_id" => Self::Tracker,
            "priority_id" => Self::Priority,
            "author_id" => Self::Author,
            "assigned_to_id" => Self::AssignedTo,
            "category_id" => Self::Category,
            "fixed_version_id" => Self::FixedVersion,
            _ => return None,
        })
    }

    fn value(self, issue: &Issue) -> Option<u64> {
        match self {
            Self::Tracker => Some(issue.tracker.id),
            Self::Priority => Some(issue.priority.id),
            Self::Author => Some(issue.author.id),
            Self::AssignedTo => issue.assigned_to.as_ref().map(|r| r.id),
            Self::Category => issue.category.as_ref().map(|r| r.id),
            Self::FixedVersion => issue.fixed_version.as_ref().map(|r| r.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueFilter {
    issue_ids: Option<BTreeSet<u64>>,
    projects: Option<Vec<String>>,
    status: StatusFilter,
    references: Vec<(ReferenceField, BTreeSet<u64>)>,
}

impl IssueFilter {
    pub fn parse(query: &str) -> Result<Self> {
        let pairs: Vec<(String, String)> =
            serde_urlencoded::from_str(query.trim_start_matches('?'))
                .map_err(|e| TrackportError::InvalidFilter(format!("'{query}': {e}")))?;

        let mut filter = Self {
            issue_ids: None,
            projects: None,
            status: StatusFilter::Open,
            references: Vec::new(),
        };
        for (key, value) in pairs {
            match key.as_str() {
                "issue_id" => filter.issue_ids = Some(ids(&key, &value)?),
                "project_id" => {
                    filter.projects = Some(
                        value
                            .split(',')
                            .map(|token| token.trim().to_string())
                            .filter(|token| !token.is_empty())
                            .collect(),
                    )
                }
                "status_id" => {
                    filter.status = match value.trim() {
                        "open" | "o" => StatusFilter::Open,
                        "closed" | "c" => StatusFilter::Closed,
                        "*" => StatusFilter::Any,
                        other => StatusFilter::Ids(ids(&key, other)?),
                    }
                }
                other => match ReferenceField::from_key(other) {
                    Some(field) => filter.references.push((field, ids(&key, &value)?)),
                    None => {
                        return Err(TrackportError::InvalidFilter(format!(
                            "unsupported filter parameter '{other}'"
                        )));
                    }
                },
            }
        }
        Ok(filter)
    }

    pub fn matches(&self, issue: &Issue, directory: &SourceDirectory) -> bool {
        if let Some(ids) = &self.issue_ids {
            if !ids.contains(&issue.id) {
                return false;
            }
        }
        if let Some(projects) = &self.projects {
            if !in_projects(issue.project.id, projects, directory) {
                return false;
            }
        }
        let status_ok = match &self.status {
            StatusFilter::Any => true,
            StatusFilter::Ids(ids) => ids.contains(&issue.status.id),
            StatusFilter::Open => directory.status(issue.status.id).is_some_and(|s| !s.is_closed),
            StatusFilter::Closed => directory.status(issue.status.id).is_some_and(|s| s.is_closed),
        };
        status_ok
            && self
                .references
                .iter()
                .all(|(field, ids)| field.value(issue).is_some_and(|id| ids.contains(&id)))
    }

    pub fn apply<'i>(&self, issues: &'i [Issue], directory: &SourceDirectory) -> Vec<&'i Issue> {
        issues
            .iter()
            .filter(|issue| self.matches(issue, directory))
            .collect()
    }
}

fn ids(key: &str, value: &str) -> Result<BTreeSet<u64>> {
    value
        .split(',')
        .map(|id| id.trim().parse::<u64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| {
            TrackportError::InvalidFilter(format!("'{value}' is not a list of IDs for '{key}'"))
        })
}

/// Whether `project_id` or one of its ancestors is named by `tokens`, by ID
/// or identifier.
fn in_projects(project_id: u64, tokens: &[String], directory: &SourceDirectory) -> bool {
    let mut visited = HashSet::new();
    let mut current = Some(project_id);
    while let Some(id) = current {
        if !visited.insert(id) {
            return false;
        }
        let project = directory.project(id);
        let named = tokens.iter().any(|token| {
            *token == id.to_string() || project.is_some_and(|p| p.identifier == *token)
        });
        if named {
            return true;
        }
        current = project.and_then(|p| p.parent.as_ref()).map(|parent| parent.id);
    }
    false
}
