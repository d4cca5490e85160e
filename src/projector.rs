//! Builds the export document of one source issue.
//!
//! Cross-referencing fields go through the resolver; scalar fields are
//! converted with fixed rules. Fields the source issue lacks are left out of
//! the document entirely.

use chrono::{DateTime, NaiveDate, Utc};

use crate::catalog::{self, SourceType, TargetType};
use crate::document::{
    AttachmentEntry, CustomFieldEntry, FieldValue, IssueDocument, ProjectBucket, iso_duration,
    timestamp,
};
use crate::error::{Result, TrackportError};
use crate::export::ExportContext;
use crate::journal::JournalNormalizer;
use crate::model::{
    CustomFieldDef, CustomFieldValue, Issue, NamedRef, Project, RawValue, User, Version,
};
use crate::prompt::Prompter;

/// Creation time used when the source record has none.
fn missing_created_on() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1900, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|at| at.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub struct IssueProjector<'c, 'a, P> {
    ctx: &'c mut ExportContext<'a, P>,
}

impl<'c, 'a, P: Prompter> IssueProjector<'c, 'a, P> {
    pub fn new(ctx: &'c mut ExportContext<'a, P>) -> Self {
        Self { ctx }
    }

    /// Project `issue` and append the finished document to `bucket`.
    pub fn project_into(&mut self, issue: &Issue, bucket: &mut ProjectBucket) -> Result<()> {
        let document = self.project(issue, bucket)?;
        bucket.issues.push(document);
        Ok(())
    }

    /// Project `issue`. Components picked for its category are registered
    /// on `bucket`.
    pub fn project(&mut self, issue: &Issue, bucket: &mut ProjectBucket) -> Result<IssueDocument> {
        let directory = self.ctx.directory;
        let project = directory.require_project(&issue.project)?;

        let reporter = self.ctx.user_name(&issue.author)?;
        let tracker = directory.require_tracker(&issue.tracker)?;
        let issue_type = self.ctx.resolver.resolve(tracker, None, None)?.name;
        let status = directory.require_status(&issue.status)?;
        let status = self.ctx.resolver.resolve(status, None, None)?.name;
        let priority = directory.require_priority(&issue.priority)?;
        let priority = self
            .ctx
            .resolver
            .resolve(priority, Some(SourceType::IssuePriority), None)?
            .name;

        let mut document = IssueDocument {
            external_id: issue.id.to_string(),
            summary: issue.subject.clone(),
            reporter,
            issue_type,
            status,
            priority,
            created: timestamp(issue.created_on.unwrap_or_else(missing_created_on)),
            updated: timestamp(issue.updated_on),
            description: issue.description.as_deref().map(|d| self.ctx.rich_text(d)),
            assignee: None,
            components: Vec::new(),
            labels: Vec::new(),
            fixed_versions: Vec::new(),
            original_estimate: issue.estimated_hours.map(iso_duration),
            custom_field_values: Vec::new(),
            watchers: Vec::new(),
            attachments: Vec::new(),
            comments: Vec::new(),
            history: Vec::new(),
        };

        if let Some(assignee) = &issue.assigned_to {
            document.assignee = Some(self.assignee(assignee)?);
        }

        if let Some(category) = &issue.category {
            let category = directory.require_category(project.id, category)?;
            let (value, mapping) = self
                .ctx
                .resolver
                .resolve_with_type(category, None, Some(project))?;
            match mapping.target {
                TargetType::Component => {
                    bucket.add_component(&value.name);
                    document.components.push(value.name);
                }
                _ => document.labels.push(value.name),
            }
        }

        if let Some(version) = &issue.fixed_version {
            let version = directory.require_version(project.id, version)?;
            let value = self.ctx.resolver.resolve(version, None, Some(project))?;
            document.fixed_versions.push(value.name);
        }

        for value in issue.custom_fields.iter().flatten() {
            if let Some(entry) = self.custom_field(value, project)? {
                document.custom_field_values.push(entry);
            }
        }

        for watcher in &issue.watchers {
            let name = self.ctx.user_name(watcher)?;
            document.watchers.push(name);
        }

        for attachment in &issue.attachments {
            document.attachments.push(AttachmentEntry {
                name: attachment.filename.clone(),
                attacher: self.ctx.user_name(&attachment.author)?,
                created: timestamp(attachment.created_on),
                uri: self.ctx.attachment_uri(&attachment.content_url),
                description: attachment.description.clone().filter(|d| !d.is_empty()),
            });
        }

        let timeline = JournalNormalizer::new(self.ctx).normalize(issue, project)?;
        document.comments = timeline.comments;
        document.history = timeline.history;

        if let Some(parent) = &issue.parent {
            tracing::warn!(issue = issue.id, parent = parent.id, "parent link is not exported");
        }
        if !issue.time_entries.is_empty() {
            let hours: f64 = issue.time_entries.iter().map(|t| t.hours).sum();
            tracing::warn!(
                issue = issue.id,
                entries = issue.time_entries.len(),
                hours,
                "time entries are not exported"
            );
        }

        Ok(document)
    }

    fn assignee(&mut self, reference: &NamedRef) -> Result<String> {
        let directory = self.ctx.directory;
        match directory.group(reference.id) {
            Some(group) => Ok(self.ctx.resolver.resolve(group, None, None)?.name),
            None => self.ctx.user_name(reference),
        }
    }

    fn custom_field(
        &mut self,
        value: &CustomFieldValue,
        project: &Project,
    ) -> Result<Option<CustomFieldEntry>> {
        let directory = self.ctx.directory;
        let definition = directory.require_custom_field(value.id)?;
        let field_type = catalog::custom_field_type(&definition.field_format, definition.multiple)
            .ok_or_else(|| {
                TrackportError::UnsupportedFieldFormat(definition.field_format.clone())
            })?;

        let Some(raw) = &value.value else {
            return Ok(None);
        };
        let Some(converted) = convert_custom_value(self.ctx, definition, raw, project)? else {
            return Ok(None);
        };
        let field_name = self.ctx.resolver.resolve(value, None, None)?.name;
        Ok(Some(CustomFieldEntry {
            field_name,
            field_type,
            value: converted,
        }))
    }
}

/// Convert a raw custom field value according to its field format. Blank
/// values yield `None`.
pub(crate) fn convert_custom_value<P: Prompter>(
    ctx: &mut ExportContext<'_, P>,
    definition: &CustomFieldDef,
    raw: &RawValue,
    project: &Project,
) -> Result<Option<FieldValue>> {
    if raw.is_blank() {
        return Ok(None);
    }

    let format = definition.field_format.as_str();
    let value = match (format, raw) {
        (format, _) if catalog::PASSTHROUGH_FIELD_FORMATS.contains(&format) => passthrough(raw),
        ("bool", RawValue::One(flag)) => match flag.as_str() {
            "1" => FieldValue::Text("Yes".into()),
            "0" => FieldValue::Text("No".into()),
            _ => passthrough(raw),
        },
        ("date", RawValue::One(text)) => match NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d") {
            Ok(date) => FieldValue::Text(date.format("%Y-%m-%d").to_string()),
            Err(_) => unparsed(definition, raw),
        },
        ("float", RawValue::One(text)) => match text.trim().parse::<f64>() {
            // NaN and infinities have no JSON representation.
            Ok(number) if !number.is_finite() => {
                return Err(TrackportError::UnsupportedFieldFormat(format.to_string()));
            }
            Ok(number) => FieldValue::Float(number),
            Err(_) => unparsed(definition, raw),
        },
        ("int", RawValue::One(text)) => match text.trim().parse() {
            Ok(number) => FieldValue::Integer(number),
            Err(_) => unparsed(definition, raw),
        },
        ("text" | "string", RawValue::One(text)) => FieldValue::Text(ctx.rich_text(text)),
        ("user", _) => match raw.ids() {
            Some(ids) => referenced_users(ctx, definition, &ids)?,
            None => unparsed(definition, raw),
        },
        ("version", _) => match raw.ids() {
            Some(ids) => referenced_versions(ctx, definition, &ids, project)?,
            None => unparsed(definition, raw),
        },
        ("bool" | "date" | "float" | "int" | "text" | "string", RawValue::Many(_)) => {
            passthrough(raw)
        }
        (format, _) => return Err(TrackportError::UnsupportedFieldFormat(format.to_string())),
    };
    Ok(Some(value))
}

fn passthrough(raw: &RawValue) -> FieldValue {
    match raw {
        RawValue::One(value) => FieldValue::Text(value.clone()),
        RawValue::Many(values) => FieldValue::List(values.clone()),
    }
}

fn unparsed(definition: &CustomFieldDef, raw: &RawValue) -> FieldValue {
    tracing::warn!(
        field = %definition.name,
        format = %definition.field_format,
        value = %raw.as_text(),
        "custom value does not match its format, exporting it unchanged"
    );
    passthrough(raw)
}

fn referenced_users<P: Prompter>(
    ctx: &mut ExportContext<'_, P>,
    definition: &CustomFieldDef,
    ids: &[u64],
) -> Result<FieldValue> {
    let directory = ctx.directory;
    if definition.multiple {
        let mut users: Vec<&User> = directory.users().filter(|u| ids.contains(&u.id)).collect();
        users.sort_by(|a, b| a.login.cmp(&b.login));
        let names = users
            .into_iter()
            .map(|user| ctx.resolver.resolve(user, None, None).map(|value| value.name))
            .collect::<Result<Vec<_>>>()?;
        return Ok(FieldValue::List(names));
    }

    let id = ids.first().copied().unwrap_or_default();
    let user = directory.require_user(&NamedRef { id, name: None })?;
    Ok(FieldValue::Text(ctx.resolver.resolve(user, None, None)?.name))
}

fn referenced_versions<P: Prompter>(
    ctx: &mut ExportContext<'_, P>,
    definition: &CustomFieldDef,
    ids: &[u64],
    project: &Project,
) -> Result<FieldValue> {
    let directory = ctx.directory;
    if definition.multiple {
        let mut versions: Vec<&Version> = directory
            .versions(project.id)
            .iter()
            .filter(|v| ids.contains(&v.id))
            .collect();
        versions.sort_by(|a, b| a.name.cmp(&b.name));
        let names = versions
            .into_iter()
            .map(|version| {
                ctx.resolver
                    .resolve(version, None, Some(project))
                    .map(|value| value.name)
            })
            .collect::<Result<Vec<_>>>()?;
        return Ok(FieldValue::List(names));
    }

    let id = ids.first().copied().unwrap_or_default();
    let version = directory.require_version(project.id, &NamedRef { id, name: None })?;
    Ok(FieldValue::Text(ctx.resolver.resolve(version, None, Some(project))?.name))
}
