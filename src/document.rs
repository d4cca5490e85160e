//! Shapes of the export document consumed by the target importer.
//!
//! Optional fields are skipped when absent or empty; they are never written
//! as `null` placeholders.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ExportDocument {
    pub projects: Vec<ProjectBucket>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<LinkDocument>,
}

impl ExportDocument {
    /// Bucket for a target project key, created on first use. Buckets keep
    /// the order in which their keys were first seen.
    pub fn get_or_create_bucket(&mut self, key: &str) -> &mut ProjectBucket {
        let index = match self.projects.iter().position(|p| p.key == key) {
            Some(index) => index,
            None => {
                self.projects.push(ProjectBucket::new(key));
                self.projects.len() - 1
            }
        };
        &mut self.projects[index]
    }

    #[cfg(test)]
    pub fn bucket(&self, key: &str) -> Option<&ProjectBucket> {
        self.projects.iter().find(|p| p.key == key)
    }

    pub fn issue_count(&self) -> usize {
        self.projects.iter().map(|p| p.issues.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectBucket {
    pub key: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,
    pub issues: Vec<IssueDocument>,
}

impl ProjectBucket {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            components: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn add_component(&mut self, name: &str) {
        if !self.components.iter().any(|c| c == name) {
            self.components.push(name.to_string());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueDocument {
    pub external_id: String,
    pub summary: String,
    pub reporter: String,
    pub issue_type: String,
    pub status: String,
    pub priority: String,
    pub created: String,
    pub updated: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fixed_versions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_estimate: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom_field_values: Vec<CustomFieldEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub watchers: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<CommentEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<HistoryEvent>,
}

/// Converted custom field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    List(Vec<String>),
}

impl FieldValue {
    pub fn display(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Integer(value) => value.to_string(),
            Self::Float(value) => value.to_string(),
            Self::List(values) => values.join(", "),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(text) => Value::from(text.as_str()),
            Self::Integer(value) => Value::from(*value),
            Self::Float(value) => Value::from(*value),
            Self::List(values) => Value::from(values.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFieldEntry {
    pub field_name: String,
    pub field_type: String,
    pub value: FieldValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttachmentEntry {
    pub name: String,
    pub attacher: String,
    pub created: String,
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentEntry {
    pub author: String,
    pub body: String,
    pub created: String,
}

/// One edit action in the rebuilt issue history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEvent {
    pub author: String,
    pub created: String,
    pub items: Vec<HistoryItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Jira,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub field: String,
    pub field_type: FieldKind,
    pub from: Option<Value>,
    pub from_string: Option<String>,
    pub to: Option<Value>,
    pub to_string: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkDocument {
    pub name: String,
    pub source_id: String,
    pub destination_id: String,
}

pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// ISO-8601 duration for a number of hours, rolling whole days over.
pub fn iso_duration(hours: f64) -> String {
    let total = (hours * 3600.0).round() as i64;
    if total == 0 {
        return "P0D".to_string();
    }
    let sign = if total < 0 { "-" } else { "" };
    let total = total.abs();
    let (days, rest) = (total / 86_400, total % 86_400);
    let (h, m, s) = (rest / 3600, rest % 3600 / 60, rest % 60);

    let mut out = format!("{sign}P");
    if days > 0 {
        out.push_str(&format!("{days}D"));
    }
    if rest > 0 {
        out.push('T');
        for (amount, unit) in [(h, 'H'), (m, 'M'), (s, 'S')] {
            if amount > 0 {
                out.push_str(&format!("{amount}{unit}"));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn iso_durations() {
        assert_eq!(iso_duration(2.5), "PT2H30M");
        assert_eq!(iso_duration(8.0), "PT8H");
        assert_eq!(iso_duration(36.0), "P1DT12H");
        assert_eq!(iso_duration(48.0), "P2D");
        assert_eq!(iso_duration(0.0), "P0D");
        assert_eq!(iso_duration(0.01), "PT36S");
    }

    #[test]
    fn timestamps_are_rfc3339_utc() {
        let at = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(timestamp(at), "2020-01-02T03:04:05Z");
    }

    #[test]
    fn buckets_are_created_once_in_first_seen_order() {
        let mut document = ExportDocument::default();
        document.get_or_create_bucket("B");
        document.get_or_create_bucket("A").add_component("ui");
        document.get_or_create_bucket("B");
        document.get_or_create_bucket("A").add_component("ui");

        let keys: Vec<&str> = document.projects.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["B", "A"]);
        assert_eq!(document.bucket("A").unwrap().components, vec!["ui"]);
    }

    #[test]
    fn empty_optional_fields_are_omitted() {
        let bucket = ProjectBucket::new("CORE");
        let json = serde_json::to_value(&bucket).unwrap();
        assert!(json.get("components").is_none());
        assert_eq!(json["issues"], serde_json::json!([]));

        let json = serde_json::to_string(&ExportDocument::default()).unwrap();
        assert_eq!(json, r#"{"projects":[]}"#);
    }

    #[test]
    fn history_items_use_importer_field_names() {
        let item = HistoryItem {
            field: "status".into(),
            field_type: FieldKind::Jira,
            from: None,
            from_string: None,
            to: Some(Value::from("Open")),
            to_string: Some("Open".into()),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["fieldType"], "jira");
        assert_eq!(json["from"], Value::Null);
        assert_eq!(json["toString"], "Open");
    }
}
