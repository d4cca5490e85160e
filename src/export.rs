//! Export run: owns the resolver for the run and assembles issue documents
//! into per-project buckets.

use std::collections::HashSet;

use crate::config::MappingConfig;
use crate::directory::SourceDirectory;
use crate::document::{ExportDocument, LinkDocument};
use crate::error::Result;
use crate::model::{Issue, NamedRef};
use crate::projector::IssueProjector;
use crate::prompt::Prompter;
use crate::resolver::Resolver;
use crate::text::{RichText, WikiConverter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    /// Append issue documents to their buckets. Buckets are created either way.
    pub export_issues: bool,
    pub export_links: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            export_issues: true,
            export_links: false,
        }
    }
}

/// State shared by every issue of one run.
pub struct ExportContext<'a, P> {
    pub directory: &'a SourceDirectory,
    pub resolver: Resolver<P>,
    pub text: Box<dyn RichText>,
}

impl<'a, P: Prompter> ExportContext<'a, P> {
    pub fn new(
        directory: &'a SourceDirectory,
        resolver: Resolver<P>,
        text: Box<dyn RichText>,
    ) -> Self {
        Self {
            directory,
            resolver,
            text,
        }
    }

    /// Converted rich text, or the text untouched when formatting is off.
    pub fn rich_text(&self, text: &str) -> String {
        if self.resolver.config().features.text_formatting.is_enabled() {
            self.text.convert(text)
        } else {
            text.to_string()
        }
    }

    /// Target name of the user behind a reference.
    pub fn user_name(&mut self, reference: &NamedRef) -> Result<String> {
        let directory = self.directory;
        let user = directory.require_user(reference)?;
        Ok(self.resolver.resolve(user, None, None)?.name)
    }

    /// Download URI of an attachment, carrying the API key when one is set.
    pub fn attachment_uri(&self, content_url: &str) -> String {
        match self.resolver.config().source.api_key.as_deref() {
            Some(key) if !key.is_empty() => {
                let separator = if content_url.contains('?') { '&' } else { '?' };
                format!("{content_url}{separator}key={key}")
            }
            _ => content_url.to_string(),
        }
    }
}

pub struct Exporter<'a, P> {
    ctx: ExportContext<'a, P>,
    options: ExportOptions,
}

impl<'a, P: Prompter> Exporter<'a, P> {
    pub fn new(
        directory: &'a SourceDirectory,
        config: MappingConfig,
        prompter: P,
        options: ExportOptions,
    ) -> Self {
        let text = WikiConverter::new(config.features.text_formatting);
        Self {
            ctx: ExportContext::new(directory, Resolver::new(config, prompter), Box::new(text)),
            options,
        }
    }

    /// Export issues in the order given. Any error aborts the whole run.
    pub fn export<'i>(
        &mut self,
        issues: impl IntoIterator<Item = &'i Issue>,
    ) -> Result<ExportDocument> {
        let mut document = ExportDocument::default();
        let mut seen_relations = HashSet::new();
        let directory = self.ctx.directory;

        for (record, issue) in issues.into_iter().enumerate() {
            tracing::debug!(record = record + 1, issue = issue.id, "exporting issue");

            let project = directory.require_project(&issue.project)?;
            let key = self.ctx.resolver.resolve(project, None, None)?.name;
            let bucket = document.get_or_create_bucket(&key);
            if self.options.export_issues {
                IssueProjector::new(&mut self.ctx).project_into(issue, bucket)?;
            }

            if self.options.export_links {
                for relation in &issue.relations {
                    if !seen_relations.insert(relation.id) {
                        continue;
                    }
                    let name = self.ctx.resolver.resolve(relation, None, None)?.name;
                    document.links.push(LinkDocument {
                        name,
                        source_id: relation.issue_id.to_string(),
                        destination_id: relation.issue_to_id.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            projects = document.projects.len(),
            issues = document.issue_count(),
            links = document.links.len(),
            "export assembled"
        );
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::prompt::NoPrompt;
    use serde_json::json;

    fn export(issues: &[Issue], options: ExportOptions) -> Result<ExportDocument> {
        let directory = fixtures::directory();
        Exporter::new(&directory, fixtures::config(), NoPrompt, options).export(issues)
    }

    #[test]
    fn issues_of_projects_sharing_a_target_key_share_one_bucket() {
        let issues = vec![
            fixtures::issue(json!({"id": 1, "project": {"id": 1}})),
            fixtures::issue(json!({"id": 2, "project": {"id": 3}})),
            fixtures::issue(json!({"id": 3, "project": {"id": 2}})),
        ];
        let document = export(&issues, ExportOptions::default()).unwrap();

        let keys: Vec<&str> = document.projects.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["CORE", "DOCS"]);
        let ids: Vec<&str> = document.projects[0]
            .issues
            .iter()
            .map(|i| i.external_id.as_str())
            .collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn links_are_exported_once_per_relation() {
        let relation = json!({"id": 8, "issue_id": 1, "issue_to_id": 2, "relation_type": "blocks"});
        let issues = vec![
            fixtures::issue(json!({"id": 1, "relations": [relation]})),
            fixtures::issue(json!({"id": 2, "relations": [relation]})),
        ];
        let options = ExportOptions {
            export_issues: false,
            export_links: true,
        };
        let document = export(&issues, options).unwrap();

        assert_eq!(document.issue_count(), 0);
        assert_eq!(document.projects.len(), 1);
        assert_eq!(
            document.links,
            vec![LinkDocument {
                name: "Blocks".into(),
                source_id: "1".into(),
                destination_id: "2".into(),
            }]
        );
    }

    #[test]
    fn unknown_project_aborts_the_run() {
        let issues = vec![fixtures::issue(json!({"project": {"id": 99}}))];
        let err = export(&issues, ExportOptions::default()).unwrap_err();
        assert_eq!(err.code(), "unknown_resource");
    }

    #[test]
    fn attachment_uris_carry_the_api_key() {
        let directory = fixtures::directory();
        let mut config = fixtures::config();
        config.source.api_key = Some("s3cret".into());
        let ctx = ExportContext::new(
            &directory,
            Resolver::new(config, NoPrompt),
            Box::new(WikiConverter::new(Default::default())),
        );
        assert_eq!(
            ctx.attachment_uri("https://rm/attachments/download/1/a.png"),
            "https://rm/attachments/download/1/a.png?key=s3cret"
        );
        assert_eq!(ctx.attachment_uri("https://rm/x?y=1"), "https://rm/x?y=1&key=s3cret");
    }
}
