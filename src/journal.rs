//! Rebuilds comments and field history from an issue's journal.
//!
//! Details are bucketed per property and coalesced newest to oldest:
//! references to records that no longer exist are repaired or skipped, and
//! transitions that change nothing are dropped. The surviving changes are
//! then regrouped into one history event per original edit.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::catalog::{IssueField, ResourceTypeMapping, SourceType};
use crate::document::{CommentEntry, FieldKind, HistoryEvent, HistoryItem, timestamp};
use crate::error::{Result, TrackportError};
use crate::export::ExportContext;
use crate::model::{
    CustomFieldDef, Group, Issue, IssueCategory, IssuePriority, IssueStatus, Journal,
    JournalDetail, NamedRef, Project, PropertyKind, RawValue, SourceResource, Tracker, User,
    Version,
};
use crate::projector::convert_custom_value;
use crate::prompt::Prompter;

/// Source record a journal value points to.
#[derive(Debug, Clone, Copy)]
enum ResourceRef<'a> {
    User(&'a User),
    Group(&'a Group),
    Project(&'a Project),
    Tracker(&'a Tracker),
    Status(&'a IssueStatus),
    Priority(&'a IssuePriority),
    Category(&'a IssueCategory),
    Version(&'a Version),
}

impl<'a> ResourceRef<'a> {
    fn source_type(self) -> SourceType {
        match self {
            Self::User(_) => SourceType::User,
            Self::Group(_) => SourceType::Group,
            Self::Project(_) => SourceType::Project,
            Self::Tracker(_) => SourceType::Tracker,
            Self::Status(_) => SourceType::IssueStatus,
            Self::Priority(_) => SourceType::IssuePriority,
            Self::Category(_) => SourceType::IssueCategory,
            Self::Version(_) => SourceType::Version,
        }
    }

    fn resource(self) -> &'a dyn SourceResource {
        match self {
            Self::User(r) => r,
            Self::Group(r) => r,
            Self::Project(r) => r,
            Self::Tracker(r) => r,
            Self::Status(r) => r,
            Self::Priority(r) => r,
            Self::Category(r) => r,
            Self::Version(r) => r,
        }
    }

    fn is_project_scoped(self) -> bool {
        matches!(self, Self::Category(_) | Self::Version(_))
    }

    fn identifying_value(self) -> &'a str {
        let field = self.source_type().identifying_field();
        self.resource().attribute(field.key).unwrap_or_default()
    }
}

impl PartialEq for ResourceRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.source_type() == other.source_type() && self.resource().id() == other.resource().id()
    }
}

/// A journal value after lookup.
#[derive(Debug, Clone, PartialEq)]
enum DetailValue<'a> {
    /// Not a record reference; kept as recorded.
    Raw(RawValue),
    Resource(ResourceRef<'a>),
    Resources(Vec<ResourceRef<'a>>),
    /// Reference to a record that no longer exists.
    Missing,
}

impl DetailValue<'_> {
    fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    fn is_present(&self) -> bool {
        match self {
            Self::Raw(raw) => !raw.is_blank(),
            Self::Resource(_) => true,
            Self::Resources(list) => !list.is_empty(),
            Self::Missing => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct PropertyKey {
    kind: PropertyKind,
    name: String,
}

impl PropertyKey {
    fn unsupported(&self) -> TrackportError {
        TrackportError::UnsupportedProperty {
            kind: self.kind.to_string(),
            name: self.name.clone(),
        }
    }

    fn custom_field_id(&self) -> Result<u64> {
        self.name.parse().map_err(|_| self.unsupported())
    }
}

/// One collected detail, values still raw.
struct RawChange<'j> {
    author: &'j NamedRef,
    created_on: DateTime<Utc>,
    old: Option<&'j RawValue>,
    new: Option<&'j RawValue>,
}

#[derive(Debug, Clone)]
struct Change<'j, 'a> {
    author: &'j NamedRef,
    created_on: DateTime<Utc>,
    old: Option<DetailValue<'a>>,
    new: Option<DetailValue<'a>>,
}

impl Change<'_, '_> {
    /// A set, an unset, or a replacement between two existing values.
    fn is_transition(&self) -> bool {
        match (&self.old, &self.new) {
            (None, Some(new)) => new.is_present(),
            (Some(old), None) => old.is_present(),
            (Some(old), Some(new)) => !old.is_missing() && !new.is_missing(),
            (None, None) => false,
        }
    }

    fn is_noop(&self) -> bool {
        matches!((&self.old, &self.new), (Some(old), Some(new)) if old == new)
    }
}

/// A history value in target terms.
struct HistoryValue {
    internal: Value,
    display: String,
    mapping: Option<ResourceTypeMapping>,
}

impl HistoryValue {
    fn text(text: String) -> Self {
        Self {
            internal: Value::String(text.clone()),
            display: text,
            mapping: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct Timeline {
    pub comments: Vec<CommentEntry>,
    pub history: Vec<HistoryEvent>,
}

pub struct JournalNormalizer<'c, 'a, P> {
    ctx: &'c mut ExportContext<'a, P>,
}

impl<'c, 'a, P: Prompter> JournalNormalizer<'c, 'a, P> {
    pub fn new(ctx: &'c mut ExportContext<'a, P>) -> Self {
        Self { ctx }
    }

    pub fn normalize(&mut self, issue: &Issue, project: &'a Project) -> Result<Timeline> {
        let mut journals: Vec<&Journal> = issue.journals.iter().collect();
        journals.sort_by_key(|journal| journal.created_on);

        let mut comments = Vec::new();
        let mut collected: BTreeMap<PropertyKey, Vec<RawChange<'_>>> = BTreeMap::new();
        for journal in journals {
            if let Some(notes) = journal.notes.as_deref().filter(|n| !n.trim().is_empty()) {
                comments.push(CommentEntry {
                    author: self.ctx.user_name(&journal.user)?,
                    body: self.ctx.rich_text(notes),
                    created: timestamp(journal.created_on),
                });
            }
            for detail in journal.details.iter().filter(|d| self.is_tracked(d)) {
                let key = PropertyKey {
                    kind: detail.property,
                    name: detail.name.clone(),
                };
                collected.entry(key).or_default().push(RawChange {
                    author: &journal.user,
                    created_on: journal.created_on,
                    old: detail.old_value.as_ref(),
                    new: detail.new_value.as_ref(),
                });
            }
        }

        let mut coalesced = BTreeMap::new();
        for (key, changes) in &collected {
            let changes = self.coalesce(issue, key, changes, project)?;
            if !changes.is_empty() {
                coalesced.insert(key.clone(), changes);
            }
        }

        let history = self.reconstruct(coalesced, project)?;
        Ok(Timeline { comments, history })
    }

    /// Attribute and custom field changes are kept; details of custom fields
    /// that no longer exist are dropped.
    fn is_tracked(&self, detail: &JournalDetail) -> bool {
        match detail.property {
            PropertyKind::Attr => true,
            PropertyKind::Cf => detail
                .name
                .parse()
                .is_ok_and(|id| self.ctx.directory.custom_field(id).is_some()),
            _ => false,
        }
    }

    fn coalesce<'j>(
        &mut self,
        issue: &Issue,
        key: &PropertyKey,
        changes: &[RawChange<'j>],
        project: &'a Project,
    ) -> Result<Vec<Change<'j, 'a>>> {
        let mut coalesced = Vec::new();
        let mut pending: Option<Change<'j, 'a>> = None;

        for (position, raw) in changes.iter().rev().enumerate() {
            let mut change = Change {
                author: raw.author,
                created_on: raw.created_on,
                old: raw.old.map(|v| self.lookup(key, v, project)).transpose()?,
                new: raw.new.map(|v| self.lookup(key, v, project)).transpose()?,
            };

            // The newest value of a chain may point at a record that is gone;
            // the issue's live value is what it became.
            if position == 0 && change.new.as_ref().is_some_and(DetailValue::is_missing) {
                if let Some(current) = self.current_value(issue, key, project)? {
                    change.new = Some(current);
                }
            }

            let merged = match pending.take() {
                None => change,
                Some(mut merged) => {
                    if merged.old.as_ref().is_some_and(DetailValue::is_missing) {
                        match change.old {
                            Some(old) if !old.is_missing() => merged.old = Some(old),
                            None => merged.old = None,
                            Some(_) => {}
                        }
                    }
                    merged
                }
            };

            if merged.is_transition() {
                if !merged.is_noop() {
                    coalesced.push(merged);
                }
            } else {
                // Keep it open; an older entry may supply the old value.
                pending = Some(merged);
            }
        }

        coalesced.reverse();
        Ok(coalesced)
    }

    fn lookup(
        &self,
        key: &PropertyKey,
        raw: &RawValue,
        project: &'a Project,
    ) -> Result<DetailValue<'a>> {
        let directory = self.ctx.directory;
        match key.kind {
            PropertyKind::Attr => {
                let field =
                    IssueField::from_journal_name(&key.name).ok_or_else(|| key.unsupported())?;
                let id = match raw {
                    RawValue::One(text) if field.related().is_some() => text.trim().parse().ok(),
                    _ => None,
                };
                Ok(match id {
                    Some(id) => self
                        .find(field, id, project)
                        .map_or(DetailValue::Missing, DetailValue::Resource),
                    None => DetailValue::Raw(raw.clone()),
                })
            }
            PropertyKind::Cf => {
                let definition = directory.require_custom_field(key.custom_field_id()?)?;
                let pick = |id: u64| match definition.field_format.as_str() {
                    "user" => directory.user(id).map(ResourceRef::User),
                    "version" => directory.version(project.id, id).map(ResourceRef::Version),
                    _ => None,
                };
                let is_reference = matches!(definition.field_format.as_str(), "user" | "version");
                let Some(ids) = raw.ids().filter(|_| is_reference) else {
                    return Ok(DetailValue::Raw(raw.clone()));
                };

                if definition.multiple || matches!(raw, RawValue::Many(_)) {
                    let mut found: Vec<ResourceRef<'a>> =
                        ids.iter().copied().filter_map(pick).collect();
                    found.sort_by_key(|r| r.identifying_value());
                    Ok(DetailValue::Resources(found))
                } else {
                    Ok(ids
                        .first()
                        .and_then(|&id| pick(id))
                        .map_or(DetailValue::Missing, DetailValue::Resource))
                }
            }
            _ => Err(key.unsupported()),
        }
    }

    fn find(&self, field: IssueField, id: u64, project: &'a Project) -> Option<ResourceRef<'a>> {
        let directory = self.ctx.directory;
        match field {
            IssueField::Project => directory.project(id).map(ResourceRef::Project),
            IssueField::Tracker => directory.tracker(id).map(ResourceRef::Tracker),
            IssueField::Status => directory.status(id).map(ResourceRef::Status),
            IssueField::Priority => directory.priority(id).map(ResourceRef::Priority),
            IssueField::Author => directory.user(id).map(ResourceRef::User),
            IssueField::AssignedTo => directory
                .user(id)
                .map(ResourceRef::User)
                .or_else(|| directory.group(id).map(ResourceRef::Group)),
            IssueField::Category => directory.category(project.id, id).map(ResourceRef::Category),
            IssueField::FixedVersion => directory.version(project.id, id).map(ResourceRef::Version),
            _ => None,
        }
    }

    /// The issue's live value for a property, if it has a usable one.
    fn current_value(
        &self,
        issue: &Issue,
        key: &PropertyKey,
        project: &'a Project,
    ) -> Result<Option<DetailValue<'a>>> {
        let value = match key.kind {
            PropertyKind::Attr => {
                let field =
                    IssueField::from_journal_name(&key.name).ok_or_else(|| key.unsupported())?;
                let reference = match field {
                    IssueField::Project => Some(&issue.project),
                    IssueField::Tracker => Some(&issue.tracker),
                    IssueField::Status => Some(&issue.status),
                    IssueField::Priority => Some(&issue.priority),
                    IssueField::Author => Some(&issue.author),
                    IssueField::AssignedTo => issue.assigned_to.as_ref(),
                    IssueField::Category => issue.category.as_ref(),
                    IssueField::FixedVersion => issue.fixed_version.as_ref(),
                    _ => return Ok(issue.raw_attribute(&key.name).map(DetailValue::Raw)),
                };
                reference
                    .and_then(|r| self.find(field, r.id, project))
                    .map(DetailValue::Resource)
            }
            PropertyKind::Cf => {
                let raw = issue
                    .custom_field(key.custom_field_id()?)
                    .and_then(|cf| cf.value.as_ref());
                match raw {
                    Some(raw) => Some(self.lookup(key, raw, project)?),
                    None => None,
                }
            }
            _ => None,
        };
        Ok(value.filter(DetailValue::is_present))
    }

    fn reconstruct<'j>(
        &mut self,
        coalesced: BTreeMap<PropertyKey, Vec<Change<'j, 'a>>>,
        project: &'a Project,
    ) -> Result<Vec<HistoryEvent>> {
        // Keys arrive in (kind, name) order, so each event's items do too.
        let mut edits: BTreeMap<(DateTime<Utc>, u64), Vec<(PropertyKey, Change<'j, 'a>)>> =
            BTreeMap::new();
        for (key, changes) in coalesced {
            for change in changes {
                edits
                    .entry((change.created_on, change.author.id))
                    .or_default()
                    .push((key.clone(), change));
            }
        }

        let mut history = Vec::new();
        for ((created_on, _), changes) in edits {
            let mut items = Vec::new();
            for (key, change) in &changes {
                if let Some(item) = self.history_item(key, change, project)? {
                    items.push(item);
                }
            }
            let Some((_, first)) = changes.first() else {
                continue;
            };
            if items.is_empty() {
                continue;
            }
            history.push(HistoryEvent {
                author: self.ctx.user_name(first.author)?,
                created: timestamp(created_on),
                items,
            });
        }
        Ok(history)
    }

    fn history_item(
        &mut self,
        key: &PropertyKey,
        change: &Change<'_, 'a>,
        project: &'a Project,
    ) -> Result<Option<HistoryItem>> {
        let (field, field_type, from, to) = match key.kind {
            PropertyKind::Attr => {
                let field =
                    IssueField::from_journal_name(&key.name).ok_or_else(|| key.unsupported())?;
                if field.related().is_none() && field.target_key(None).is_none() {
                    return Ok(None);
                }
                let from = self.attr_value(field, change.old.as_ref(), project)?;
                let to = self.attr_value(field, change.new.as_ref(), project)?;
                // A category may be a component before and a label after;
                // the newer value decides the field.
                let mapping = to
                    .as_ref()
                    .and_then(|v| v.mapping)
                    .or_else(|| from.as_ref().and_then(|v| v.mapping));
                let Some(target) = field.target_key(mapping) else {
                    return Ok(None);
                };
                (target.to_string(), FieldKind::Jira, from, to)
            }
            PropertyKind::Cf => {
                let directory = self.ctx.directory;
                let definition = directory.require_custom_field(key.custom_field_id()?)?;
                let name = self.ctx.resolver.resolve(definition, None, None)?.name;
                let from = self.custom_value(definition, change.old.as_ref(), project)?;
                let to = self.custom_value(definition, change.new.as_ref(), project)?;
                (name, FieldKind::Custom, from, to)
            }
            _ => return Err(key.unsupported()),
        };

        // Distinct source values may map onto the same target value.
        if from.as_ref().map(|v| &v.internal) == to.as_ref().map(|v| &v.internal) {
            return Ok(None);
        }

        let (from, from_string) = split(from);
        let (to, to_string) = split(to);
        Ok(Some(HistoryItem {
            field,
            field_type,
            from,
            from_string,
            to,
            to_string,
        }))
    }

    fn attr_value(
        &mut self,
        field: IssueField,
        value: Option<&DetailValue<'a>>,
        project: &'a Project,
    ) -> Result<Option<HistoryValue>> {
        match value {
            Some(DetailValue::Resource(resource)) => {
                self.resource_value(*resource, project).map(Some)
            }
            Some(DetailValue::Resources(resources)) => {
                self.resources_value(resources, project).map(Some)
            }
            Some(DetailValue::Raw(raw)) => {
                Ok(Some(HistoryValue::text(self.standard_text(field, raw))))
            }
            Some(DetailValue::Missing) | None => Ok(None),
        }
    }

    fn custom_value(
        &mut self,
        definition: &CustomFieldDef,
        value: Option<&DetailValue<'a>>,
        project: &'a Project,
    ) -> Result<Option<HistoryValue>> {
        match value {
            Some(DetailValue::Resource(resource)) => {
                self.resource_value(*resource, project).map(Some)
            }
            Some(DetailValue::Resources(resources)) => {
                self.resources_value(resources, project).map(Some)
            }
            Some(DetailValue::Raw(raw)) => {
                let converted = convert_custom_value(self.ctx, definition, raw, project)?;
                Ok(converted.map(|value| HistoryValue {
                    internal: value.to_json(),
                    display: value.display(),
                    mapping: None,
                }))
            }
            Some(DetailValue::Missing) | None => Ok(None),
        }
    }

    fn resource_value(
        &mut self,
        resource: ResourceRef<'a>,
        project: &'a Project,
    ) -> Result<HistoryValue> {
        let scope = resource.is_project_scoped().then_some(project);
        let (value, mapping) =
            self.ctx
                .resolver
                .resolve_with_type(resource.resource(), Some(resource.source_type()), scope)?;
        let internal = match value.id {
            Some(id) if self.ctx.resolver.history_metadata() => Value::String(id.to_string()),
            _ => Value::String(value.name.clone()),
        };
        Ok(HistoryValue {
            internal,
            display: value.name,
            mapping: Some(mapping),
        })
    }

    fn resources_value(
        &mut self,
        resources: &[ResourceRef<'a>],
        project: &'a Project,
    ) -> Result<HistoryValue> {
        let mut internal = Vec::with_capacity(resources.len());
        let mut names = Vec::with_capacity(resources.len());
        let mut mapping = None;
        for &resource in resources {
            let value = self.resource_value(resource, project)?;
            internal.push(value.internal);
            names.push(value.display);
            mapping = mapping.or(value.mapping);
        }
        Ok(HistoryValue {
            internal: Value::Array(internal),
            display: names.join(", "),
            mapping,
        })
    }

    fn standard_text(&self, field: IssueField, raw: &RawValue) -> String {
        let text = raw.as_text();
        match field {
            IssueField::Description => self.ctx.rich_text(&text),
            IssueField::CreatedOn
            | IssueField::UpdatedOn
            | IssueField::StartDate
            | IssueField::DueDate => {
                NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
                    .map(|date| date.format("%Y-%m-%dT00:00:00").to_string())
                    .unwrap_or(text)
            }
            IssueField::EstimatedHours => text
                .trim()
                .parse::<f64>()
                .map(|hours| ((hours * 3600.0).round() as i64).to_string())
                .unwrap_or(text),
            _ => text,
        }
    }
}

fn split(value: Option<HistoryValue>) -> (Option<Value>, Option<String>) {
    match value {
        Some(value) => (Some(value.internal), Some(value.display)),
        None => (None, None),
    }
}
