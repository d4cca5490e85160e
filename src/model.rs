use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Runtime shape of a source record. Several source types may share a shape
/// (issue priorities are generic enumerations), so a shape alone does not
/// always determine the source type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceShape {
    User,
    Group,
    Project,
    Tracker,
    IssueStatus,
    Enumeration,
    IssueCategory,
    CustomField,
    Version,
    Relation,
}

impl std::fmt::Display for ResourceShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::User => "user",
            Self::Group => "group",
            Self::Project => "project",
            Self::Tracker => "tracker",
            Self::IssueStatus => "issue status",
            Self::Enumeration => "enumeration",
            Self::IssueCategory => "issue category",
            Self::CustomField => "custom field",
            Self::Version => "version",
            Self::Relation => "relation",
        };
        f.write_str(name)
    }
}

/// A source record that can be mapped to a target value.
pub trait SourceResource {
    fn shape(&self) -> ResourceShape;
    fn id(&self) -> u64;
    /// String value of the attribute named `key`, if the record has it.
    fn attribute(&self, key: &str) -> Option<&str>;
}

/// Reference to another record as embedded in issues and journals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub login: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firstname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail: Option<String>,
    /// 1 active, 2 registered, 3 locked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueCategory {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub identifier: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NamedRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issue_categories: Vec<IssueCategory>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<Version>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracker {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueStatus {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub is_closed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuePriority {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Definition of a custom field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldDef {
    pub id: u64,
    pub name: String,
    pub field_format: String,
    pub customized_type: String,
    #[serde(default)]
    pub multiple: bool,
}

/// A raw value as the source stores it: a single string, or a list of
/// strings for multi-valued custom fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    One(String),
    Many(Vec<String>),
}

impl RawValue {
    pub fn is_blank(&self) -> bool {
        match self {
            Self::One(value) => value.is_empty(),
            Self::Many(values) => values.is_empty(),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            Self::One(value) => value.clone(),
            Self::Many(values) => values.join(", "),
        }
    }

    /// Record IDs carried by the value, when every element is one.
    pub fn ids(&self) -> Option<Vec<u64>> {
        match self {
            Self::One(value) => value.trim().parse().ok().map(|id| vec![id]),
            Self::Many(values) => values.iter().map(|v| v.trim().parse().ok()).collect(),
        }
    }
}

/// A custom field value carried by an issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldValue {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<RawValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: u64,
    pub filename: String,
    pub content_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub author: NamedRef,
    pub created_on: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub id: u64,
    pub issue_id: u64,
    pub issue_to_id: u64,
    pub relation_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: u64,
    pub hours: f64,
    pub user: NamedRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spent_on: Option<NaiveDate>,
}

/// Kind of property a journal detail changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    Attr,
    Cf,
    Attachment,
    Relation,
    #[serde(other)]
    Other,
}

impl std::fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Attr => "attr",
            Self::Cf => "cf",
            Self::Attachment => "attachment",
            Self::Relation => "relation",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// One atomic change inside a journal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalDetail {
    pub property: PropertyKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<RawValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<RawValue>,
}

/// One edit action on an issue: optional notes plus property changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journal {
    pub id: u64,
    pub user: NamedRef,
    pub created_on: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<JournalDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: u64,
    pub project: NamedRef,
    pub tracker: NamedRef,
    pub status: NamedRef,
    pub priority: NamedRef,
    pub author: NamedRef,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<NamedRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<NamedRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_version: Option<NamedRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NamedRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_ratio: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<DateTime<Utc>>,
    pub updated_on: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<Vec<CustomFieldValue>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub watchers: Vec<NamedRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub journals: Vec<Journal>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<Relation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub time_entries: Vec<TimeEntry>,
}

impl Issue {
    /// Current raw value of a standard, non-relation attribute as the
    /// journal would record it.
    pub fn raw_attribute(&self, key: &str) -> Option<RawValue> {
        let text = match key {
            "subject" => Some(self.subject.clone()),
            "description" => self.description.clone(),
            "start_date" => self.start_date.map(|d| d.format("%Y-%m-%d").to_string()),
            "due_date" => self.due_date.map(|d| d.format("%Y-%m-%d").to_string()),
            "done_ratio" => self.done_ratio.map(|r| r.to_string()),
            "estimated_hours" => self.estimated_hours.map(|h| h.to_string()),
            "is_private" => self.is_private.map(|p| if p { "1" } else { "0" }.to_string()),
            "parent_id" => self.parent.as_ref().map(|p| p.id.to_string()),
            _ => None,
        };
        text.map(RawValue::One)
    }

    pub fn custom_field(&self, id: u64) -> Option<&CustomFieldValue> {
        self.custom_fields
            .as_deref()
            .unwrap_or_default()
            .iter()
            .find(|cf| cf.id == id)
    }
}

macro_rules! named_resource {
    ($ty:ty, $shape:expr) => {
        impl SourceResource for $ty {
            fn shape(&self) -> ResourceShape {
                $shape
            }

            fn id(&self) -> u64 {
                self.id
            }

            fn attribute(&self, key: &str) -> Option<&str> {
                match key {
                    "name" => Some(&self.name),
                    _ => None,
                }
            }
        }
    };
}

named_resource!(Group, ResourceShape::Group);
named_resource!(Tracker, ResourceShape::Tracker);
named_resource!(IssueStatus, ResourceShape::IssueStatus);
named_resource!(IssuePriority, ResourceShape::Enumeration);
named_resource!(IssueCategory, ResourceShape::IssueCategory);
named_resource!(Version, ResourceShape::Version);
named_resource!(CustomFieldDef, ResourceShape::CustomField);
named_resource!(CustomFieldValue, ResourceShape::CustomField);

impl SourceResource for User {
    fn shape(&self) -> ResourceShape {
        ResourceShape::User
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        match key {
            "login" => Some(&self.login),
            "firstname" => self.firstname.as_deref(),
            "lastname" => self.lastname.as_deref(),
            "mail" => self.mail.as_deref(),
            _ => None,
        }
    }
}

impl SourceResource for Project {
    fn shape(&self) -> ResourceShape {
        ResourceShape::Project
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        match key {
            "identifier" => Some(&self.identifier),
            "name" => Some(&self.name),
            _ => None,
        }
    }
}

impl SourceResource for Relation {
    fn shape(&self) -> ResourceShape {
        ResourceShape::Relation
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        match key {
            "relation_type" => Some(&self.relation_type),
            _ => None,
        }
    }
}
