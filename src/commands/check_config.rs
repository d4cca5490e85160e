use std::collections::BTreeSet;
use std::path::Path;

use colored::Colorize;
use serde::Serialize;

use crate::catalog::{self, SourceType};
use crate::config::{MappingConfig, TextFormatting};
use crate::directory::{SourceDirectory, SourceSnapshot};
use crate::error::Result;
use crate::output::Format;

/// What a loaded configuration contains. A configuration that fails
/// validation never gets this far: loading reports the first error.
#[derive(Debug, Serialize)]
struct ConfigReport {
    config: String,
    features: FeatureReport,
    /// Static value count per table, zero when the table is not configured.
    tables: Vec<TableReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    coverage: Option<Vec<CoverageReport>>,
    warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
struct FeatureReport {
    allow_group_assignment: bool,
    text_formatting: TextFormatting,
    history_metadata: bool,
}

#[derive(Debug, Serialize)]
struct TableReport {
    table: String,
    values: usize,
}

#[derive(Debug, Serialize)]
struct CoverageReport {
    resource: String,
    unmapped: Vec<String>,
}

/// Validate a configuration file. With a snapshot, also report source values
/// no static table covers; those will be asked for during the export.
pub fn run(config_path: &Path, source: Option<&Path>, format: Format) -> Result<()> {
    let config = MappingConfig::load(config_path)?;
    let mut report = ConfigReport {
        config: config_path.display().to_string(),
        features: FeatureReport {
            allow_group_assignment: config.features.allow_group_assignment,
            text_formatting: config.features.text_formatting,
            history_metadata: config.features.history_metadata,
        },
        tables: catalog::all_mappings()
            .iter()
            .map(|&mapping| TableReport {
                table: mapping.table_name(),
                values: config.table(mapping).map_or(0, |t| t.len()),
            })
            .collect(),
        coverage: None,
        warnings: Vec::new(),
    };
    if config.source.api_key.is_none() {
        report
            .warnings
            .push("no source api_key: attachment URIs will not authenticate".into());
    }

    if let Some(source) = source {
        let snapshot = SourceSnapshot::load(source)?;
        let directory = SourceDirectory::build(&snapshot, config.features.allow_group_assignment);
        report.coverage = Some(
            coverage(&config, &directory, &snapshot)
                .into_iter()
                .map(|(source_type, unmapped)| CoverageReport {
                    resource: source_type.humanized().to_lowercase(),
                    unmapped,
                })
                .collect(),
        );
    }
    tracing::debug!(tables = config.table_count(), "checked configuration");

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        Format::Pretty => print_report(&report),
    }
    Ok(())
}

fn print_report(report: &ConfigReport) {
    eprintln!("{} {}", report.config.bold(), "is valid".green());
    let features = &report.features;
    eprintln!(
        "group assignment: {}  text formatting: {:?}  history metadata: {}",
        on_off(features.allow_group_assignment),
        features.text_formatting,
        on_off(features.history_metadata)
    );
    eprintln!();
    eprintln!("{:36} {:>6}", "TABLE", "VALUES");
    for table in &report.tables {
        let values = match table.values {
            0 => "-".dimmed().to_string(),
            n => n.to_string(),
        };
        eprintln!("{:36} {:>6}", table.table, values);
    }
    if let Some(coverage) = &report.coverage {
        eprintln!();
        eprintln!("{:20} UNMAPPED", "RESOURCE");
        for entry in coverage {
            let unmapped = if entry.unmapped.is_empty() {
                "none".green().to_string()
            } else {
                entry.unmapped.join(", ").yellow().to_string()
            };
            eprintln!("{:20} {}", entry.resource, unmapped);
        }
    }
    for warning in &report.warnings {
        eprintln!("{} {warning}", "warning:".yellow());
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

/// Source values per type with no static mapping to any target type.
/// Project-scoped values are reported as `project/value`.
fn coverage(
    config: &MappingConfig,
    directory: &SourceDirectory,
    snapshot: &SourceSnapshot,
) -> Vec<(SourceType, Vec<String>)> {
    let mut scoped: Vec<(SourceType, Option<&str>, String)> = Vec::new();
    scoped.extend(directory.users().map(|u| (SourceType::User, None, u.login.clone())));
    scoped.extend(directory.groups().map(|g| (SourceType::Group, None, g.name.clone())));
    scoped.extend(directory.projects().map(|p| (SourceType::Project, None, p.identifier.clone())));
    scoped.extend(directory.trackers().map(|t| (SourceType::Tracker, None, t.name.clone())));
    scoped.extend(directory.statuses().map(|s| (SourceType::IssueStatus, None, s.name.clone())));
    scoped.extend(
        directory
            .priorities()
            .map(|p| (SourceType::IssuePriority, None, p.name.clone())),
    );
    scoped.extend(
        directory
            .custom_fields()
            .map(|c| (SourceType::CustomField, None, c.name.clone())),
    );
    for project in directory.projects() {
        let scope = Some(project.identifier.as_str());
        scoped.extend(
            project
                .issue_categories
                .iter()
                .map(|c| (SourceType::IssueCategory, scope, c.name.clone())),
        );
        scoped.extend(
            project
                .versions
                .iter()
                .map(|v| (SourceType::Version, scope, v.name.clone())),
        );
    }
    let relation_types: BTreeSet<&str> = snapshot
        .issues
        .iter()
        .flat_map(|issue| &issue.relations)
        .map(|r| r.relation_type.as_str())
        .collect();
    scoped.extend(
        relation_types
            .into_iter()
            .map(|t| (SourceType::Relationship, None, t.to_string())),
    );

    let mut report: Vec<(SourceType, Vec<String>)> = Vec::new();
    for source_type in SourceType::ALL {
        if source_type == SourceType::Group && !directory.groups_enabled() {
            continue;
        }
        let mappings = catalog::target_mappings(source_type);
        let missing: Vec<String> = scoped
            .iter()
            .filter(|(ty, _, _)| *ty == source_type)
            .filter(|(_, scope, value)| {
                !mappings
                    .iter()
                    .any(|&m| config.static_value(m, value, *scope).is_some())
            })
            .map(|(_, scope, value)| match scope {
                Some(project) => format!("{project}/{value}"),
                None => value.clone(),
            })
            .collect();
        report.push((source_type, missing));
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn coverage_reports_values_without_static_mappings() {
        let config = MappingConfig::from_yaml(
            "mappings:\n  user_user: {alice: a}\n  issue_category_label:\n    core: {DB: db}\n",
        )
        .unwrap();
        let snapshot = fixtures::snapshot();
        let directory = SourceDirectory::build(&snapshot, false);
        let report = coverage(&config, &directory, &snapshot);

        let find = |ty: SourceType| {
            report
                .iter()
                .find(|(t, _)| *t == ty)
                .map(|(_, missing)| missing.clone())
                .unwrap()
        };
        assert_eq!(find(SourceType::User), vec!["bob", "carol"]);
        assert_eq!(find(SourceType::IssueCategory), vec!["core/UI"]);
        assert!(report.iter().all(|(t, _)| *t != SourceType::Group));
    }
}
