//! Static schema of the resource types exchanged between the source tracker
//! and the target importer.
//!
//! Every table here is built once at compile time. Lookups never fail except
//! for the custom field format table, whose misses are reported to the caller.

use std::fmt;

use crate::model::ResourceShape;

/// A named attribute of a resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Field {
    pub key: &'static str,
    pub name: &'static str,
}

impl Field {
    const fn new(key: &'static str, name: &'static str) -> Self {
        Self { key, name }
    }
}

/// Resource types of the source tracker that take part in value mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceType {
    User,
    Group,
    Project,
    Tracker,
    IssueStatus,
    IssuePriority,
    IssueCategory,
    CustomField,
    Version,
    Relationship,
}

impl SourceType {
    pub const ALL: [SourceType; 10] = [
        Self::User,
        Self::Group,
        Self::Project,
        Self::Tracker,
        Self::IssueStatus,
        Self::IssuePriority,
        Self::IssueCategory,
        Self::CustomField,
        Self::Version,
        Self::Relationship,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
            Self::Project => "project",
            Self::Tracker => "tracker",
            Self::IssueStatus => "issue_status",
            Self::IssuePriority => "issue_priority",
            Self::IssueCategory => "issue_category",
            Self::CustomField => "custom_field",
            Self::Version => "version",
            Self::Relationship => "relationship",
        }
    }

    pub fn humanized(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Group => "Group",
            Self::Project => "Project",
            Self::Tracker => "Tracker",
            Self::IssueStatus => "Issue status",
            Self::IssuePriority => "Issue priority",
            Self::IssueCategory => "Issue category",
            Self::CustomField => "Custom field",
            Self::Version => "Version",
            Self::Relationship => "Relationship",
        }
    }

    pub fn identifying_field(self) -> Field {
        match self {
            Self::User => Field::new("login", "Login"),
            Self::Project => Field::new("identifier", "Identifier"),
            Self::Relationship => Field::new("relation_type", "Relationship"),
            Self::Group
            | Self::Tracker
            | Self::IssueStatus
            | Self::IssuePriority
            | Self::IssueCategory
            | Self::CustomField
            | Self::Version => Field::new("name", "Name"),
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Resource types understood by the target importer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetType {
    User,
    Project,
    Component,
    IssueType,
    IssueStatus,
    IssuePriority,
    Label,
    CustomField,
    Version,
    LinkType,
}

impl TargetType {
    pub fn slug(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Project => "project",
            Self::Component => "component",
            Self::IssueType => "issue_type",
            Self::IssueStatus => "issue_status",
            Self::IssuePriority => "issue_priority",
            Self::Label => "label",
            Self::CustomField => "custom_field",
            Self::Version => "version",
            Self::LinkType => "link_type",
        }
    }

    pub fn humanized(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Project => "Project",
            Self::Component => "Project component",
            Self::IssueType => "Issue type",
            Self::IssueStatus => "Issue status",
            Self::IssuePriority => "Issue priority",
            Self::Label => "Label",
            Self::CustomField => "Custom field",
            Self::Version => "Version",
            Self::LinkType => "Link type",
        }
    }

    pub fn identifying_field(self) -> Field {
        match self {
            Self::User => Field::new("username", "Username"),
            Self::Project => Field::new("key", "Key"),
            Self::Component
            | Self::IssueType
            | Self::IssueStatus
            | Self::IssuePriority
            | Self::Label
            | Self::CustomField
            | Self::Version
            | Self::LinkType => Field::new("name", "Name"),
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Any resource type known to the catalog, including the two issue types
/// whose relation fields point at mapped resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Source(SourceType),
    Target(TargetType),
    SourceIssue,
    TargetIssue,
}

/// An allowed (source type, target type) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceTypeMapping {
    pub source: SourceType,
    pub target: TargetType,
}

impl ResourceTypeMapping {
    const fn new(source: SourceType, target: TargetType) -> Self {
        Self { source, target }
    }

    /// Name of the static configuration table holding value mappings for this pair.
    pub fn table_name(&self) -> String {
        format!("{}_{}", self.source.slug(), self.target.slug())
    }

    /// Whether static and dynamic value mappings are kept per project.
    pub fn is_project_scoped(&self) -> bool {
        matches!(
            self.source,
            SourceType::IssueCategory | SourceType::Version
        )
    }
}

impl fmt::Display for ResourceTypeMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

/// Identifying fields exchanged when a value is mapped along a type mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMapping {
    pub source: Field,
    pub target: Field,
}

const ALL_MAPPINGS: [ResourceTypeMapping; 11] = [
    ResourceTypeMapping::new(SourceType::User, TargetType::User),
    ResourceTypeMapping::new(SourceType::Group, TargetType::User),
    ResourceTypeMapping::new(SourceType::Project, TargetType::Project),
    ResourceTypeMapping::new(SourceType::Tracker, TargetType::IssueType),
    ResourceTypeMapping::new(SourceType::IssueStatus, TargetType::IssueStatus),
    ResourceTypeMapping::new(SourceType::IssuePriority, TargetType::IssuePriority),
    ResourceTypeMapping::new(SourceType::IssueCategory, TargetType::Component),
    ResourceTypeMapping::new(SourceType::IssueCategory, TargetType::Label),
    ResourceTypeMapping::new(SourceType::Version, TargetType::Version),
    ResourceTypeMapping::new(SourceType::CustomField, TargetType::CustomField),
    ResourceTypeMapping::new(SourceType::Relationship, TargetType::LinkType),
];

pub fn all_mappings() -> &'static [ResourceTypeMapping] {
    &ALL_MAPPINGS
}

/// Target type mappings allowed for `source`, in catalog order.
pub fn target_mappings(source: SourceType) -> Vec<ResourceTypeMapping> {
    ALL_MAPPINGS
        .iter()
        .copied()
        .filter(|mapping| mapping.source == source)
        .collect()
}

pub fn field_mapping(mapping: ResourceTypeMapping) -> FieldMapping {
    FieldMapping {
        source: mapping.source.identifying_field(),
        target: mapping.target.identifying_field(),
    }
}

/// Attribute key that uniquely names an instance of `ty`, if the type has one.
pub fn identifying_field(ty: ResourceType) -> Option<&'static str> {
    match ty {
        ResourceType::Source(source) => Some(source.identifying_field().key),
        ResourceType::Target(target) => Some(target.identifying_field().key),
        ResourceType::SourceIssue | ResourceType::TargetIssue => None,
    }
}

/// Keys of the fields of `ty` whose values are themselves mapped resources.
pub fn relation_fields(ty: ResourceType) -> Vec<&'static str> {
    match ty {
        ResourceType::SourceIssue => IssueField::ALL
            .iter()
            .filter(|field| field.related().is_some())
            .map(|field| field.key())
            .collect(),
        ResourceType::TargetIssue => vec![
            "project",
            "issuetype",
            "status",
            "priority",
            "creator",
            "assignee",
            "components",
            "labels",
            "fixVersions",
        ],
        ResourceType::Source(_) | ResourceType::Target(_) => Vec::new(),
    }
}

/// Source type of a resource shape, or `None` for shapes shared by several
/// types (enumerations), which callers must name explicitly.
pub fn infer_source_type(shape: ResourceShape) -> Option<SourceType> {
    match shape {
        ResourceShape::User => Some(SourceType::User),
        ResourceShape::Group => Some(SourceType::Group),
        ResourceShape::Project => Some(SourceType::Project),
        ResourceShape::Tracker => Some(SourceType::Tracker),
        ResourceShape::IssueStatus => Some(SourceType::IssueStatus),
        ResourceShape::IssueCategory => Some(SourceType::IssueCategory),
        ResourceShape::CustomField => Some(SourceType::CustomField),
        ResourceShape::Version => Some(SourceType::Version),
        ResourceShape::Relation => Some(SourceType::Relationship),
        ResourceShape::Enumeration => None,
    }
}

/// Standard fields of a source issue, as they appear on the issue record and
/// in journal details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueField {
    Project,
    Tracker,
    Status,
    Priority,
    Author,
    AssignedTo,
    Category,
    FixedVersion,
    Subject,
    Description,
    CreatedOn,
    UpdatedOn,
    StartDate,
    DueDate,
    DoneRatio,
    EstimatedHours,
    Parent,
    IsPrivate,
}

impl IssueField {
    pub const ALL: [IssueField; 18] = [
        Self::Project,
        Self::Tracker,
        Self::Status,
        Self::Priority,
        Self::Author,
        Self::AssignedTo,
        Self::Category,
        Self::FixedVersion,
        Self::Subject,
        Self::Description,
        Self::CreatedOn,
        Self::UpdatedOn,
        Self::StartDate,
        Self::DueDate,
        Self::DoneRatio,
        Self::EstimatedHours,
        Self::Parent,
        Self::IsPrivate,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Tracker => "tracker",
            Self::Status => "status",
            Self::Priority => "priority",
            Self::Author => "author",
            Self::AssignedTo => "assigned_to",
            Self::Category => "category",
            Self::FixedVersion => "fixed_version",
            Self::Subject => "subject",
            Self::Description => "description",
            Self::CreatedOn => "created_on",
            Self::UpdatedOn => "updated_on",
            Self::StartDate => "start_date",
            Self::DueDate => "due_date",
            Self::DoneRatio => "done_ratio",
            Self::EstimatedHours => "estimated_hours",
            Self::Parent => "parent",
            Self::IsPrivate => "is_private",
        }
    }

    /// Property name used for this field in journal details.
    pub fn journal_name(self) -> String {
        if self.related().is_some() || self == Self::Parent {
            format!("{}_id", self.key())
        } else {
            self.key().to_string()
        }
    }

    pub fn from_journal_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|field| field.journal_name() == name)
    }

    /// Mapped resource type referenced by this field. Assignees may also be
    /// groups when group assignment is enabled.
    pub fn related(self) -> Option<SourceType> {
        match self {
            Self::Project => Some(SourceType::Project),
            Self::Tracker => Some(SourceType::Tracker),
            Self::Status => Some(SourceType::IssueStatus),
            Self::Priority => Some(SourceType::IssuePriority),
            Self::Author | Self::AssignedTo => Some(SourceType::User),
            Self::Category => Some(SourceType::IssueCategory),
            Self::FixedVersion => Some(SourceType::Version),
            _ => None,
        }
    }

    /// Target issue field receiving this field's value. Relation fields need
    /// the type mapping the resolver picked; unmapped fields yield `None`.
    pub fn target_key(self, mapping: Option<ResourceTypeMapping>) -> Option<&'static str> {
        let target = mapping.map(|m| m.target);
        match (self, target) {
            (Self::Project, Some(TargetType::Project)) => Some("project"),
            (Self::Tracker, Some(TargetType::IssueType)) => Some("issuetype"),
            (Self::Status, Some(TargetType::IssueStatus)) => Some("status"),
            (Self::Priority, Some(TargetType::IssuePriority)) => Some("priority"),
            (Self::Author, Some(TargetType::User)) => Some("creator"),
            (Self::AssignedTo, Some(TargetType::User)) => Some("assignee"),
            (Self::Category, Some(TargetType::Component)) => Some("components"),
            (Self::Category, Some(TargetType::Label)) => Some("labels"),
            (Self::FixedVersion, Some(TargetType::Version)) => Some("fixVersions"),
            (Self::Subject, _) => Some("summary"),
            (Self::Description, _) => Some("description"),
            (Self::CreatedOn, _) => Some("created"),
            (Self::UpdatedOn, _) => Some("updated"),
            (Self::EstimatedHours, _) => Some("timeoriginalestimate"),
            _ => None,
        }
    }
}

/// Custom field formats that are exported with their raw value untouched.
pub const PASSTHROUGH_FIELD_FORMATS: [&str; 2] = ["link", "list"];

const CUSTOM_FIELD_TYPE_PREFIX: &str = "com.atlassian.jira.plugin.system.customfieldtypes:";

/// Target custom field type for a source custom field format, or `None` when
/// the format has no counterpart.
pub fn custom_field_type(format: &str, multiple: bool) -> Option<String> {
    // The target has no boolean type: booleans become a Yes/No select.
    let (single, many) = match format {
        "bool" => ("select", None),
        "date" => ("datepicker", None),
        "float" | "int" => ("float", None),
        "link" => ("url", None),
        "list" => ("select", Some("multiselect")),
        "text" => ("textarea", None),
        "string" => ("textfield", None),
        "user" => ("userpicker", Some("multiuserpicker")),
        "version" => ("version", Some("multiversion")),
        _ => return None,
    };
    let suffix = match (multiple, many) {
        (true, Some(many)) => many,
        _ => single,
    };
    Some(format!("{CUSTOM_FIELD_TYPE_PREFIX}{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_maps_to_component_then_label() {
        let mappings = target_mappings(SourceType::IssueCategory);
        let targets: Vec<TargetType> = mappings.iter().map(|m| m.target).collect();
        assert_eq!(targets, vec![TargetType::Component, TargetType::Label]);
    }

    #[test]
    fn every_source_type_has_at_least_one_mapping() {
        for source in SourceType::ALL {
            assert!(!target_mappings(source).is_empty(), "{source} unmapped");
        }
    }

    #[test]
    fn table_names_are_unique() {
        let mut names: Vec<String> = all_mappings().iter().map(|m| m.table_name()).collect();
        let before = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), before);
        assert!(names.contains(&"tracker_issue_type".to_string()));
        assert!(names.contains(&"issue_category_label".to_string()));
    }

    #[test]
    fn user_field_mapping_pairs_login_with_username() {
        let mapping = target_mappings(SourceType::User)[0];
        let fields = field_mapping(mapping);
        assert_eq!(fields.source.key, "login");
        assert_eq!(fields.target.key, "username");
    }

    #[test]
    fn identifying_and_relation_fields() {
        assert_eq!(
            identifying_field(ResourceType::Source(SourceType::Project)),
            Some("identifier")
        );
        assert_eq!(identifying_field(ResourceType::SourceIssue), None);

        let relations = relation_fields(ResourceType::SourceIssue);
        assert!(relations.contains(&"assigned_to"));
        assert!(relations.contains(&"fixed_version"));
        assert!(!relations.contains(&"subject"));
        assert!(relation_fields(ResourceType::Source(SourceType::User)).is_empty());
    }

    #[test]
    fn journal_names_round_trip_through_issue_fields() {
        assert_eq!(
            IssueField::from_journal_name("status_id"),
            Some(IssueField::Status)
        );
        assert_eq!(
            IssueField::from_journal_name("parent_id"),
            Some(IssueField::Parent)
        );
        assert_eq!(
            IssueField::from_journal_name("subject"),
            Some(IssueField::Subject)
        );
        assert_eq!(IssueField::from_journal_name("status"), None);
    }

    #[test]
    fn category_target_key_follows_chosen_type() {
        let component = target_mappings(SourceType::IssueCategory)[0];
        let label = target_mappings(SourceType::IssueCategory)[1];
        assert_eq!(
            IssueField::Category.target_key(Some(component)),
            Some("components")
        );
        assert_eq!(IssueField::Category.target_key(Some(label)), Some("labels"));
        assert_eq!(IssueField::DueDate.target_key(None), None);
    }

    #[test]
    fn priority_shape_is_ambiguous() {
        assert_eq!(infer_source_type(ResourceShape::Enumeration), None);
        assert_eq!(
            infer_source_type(ResourceShape::User),
            Some(SourceType::User)
        );
    }

    #[test]
    fn custom_field_types_honour_multiple_flag() {
        assert!(custom_field_type("user", true).unwrap().ends_with(":multiuserpicker"));
        assert!(custom_field_type("bool", true).unwrap().ends_with(":select"));
        assert_eq!(custom_field_type("key_value", false), None);
    }
}
