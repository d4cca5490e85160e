use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use colored::Colorize;
use serde_json::json;

use crate::config::MappingConfig;
use crate::directory::{SourceDirectory, SourceSnapshot};
use crate::document::ExportDocument;
use crate::error::Result;
use crate::export::{ExportOptions, Exporter};
use crate::filter::IssueFilter;
use crate::output::Format;
use crate::prompt::{NoPrompt, TermPrompter};

#[derive(Debug, Clone)]
pub struct ExportArgs {
    pub source: PathBuf,
    pub config: PathBuf,
    /// `None` or `-` writes to stdout.
    pub output: Option<PathBuf>,
    pub pretty_print: bool,
    pub options: ExportOptions,
    pub prompt: bool,
    /// Issue-list query selecting the issues to export.
    pub filter: Option<String>,
}

pub fn run(args: &ExportArgs, format: Format) -> Result<()> {
    // Configuration errors must surface before any issue is touched.
    let config = MappingConfig::load(&args.config)?;
    let filter = args.filter.as_deref().map(IssueFilter::parse).transpose()?;
    let snapshot = SourceSnapshot::load(&args.source)?;
    let directory = SourceDirectory::build(&snapshot, config.features.allow_group_assignment);
    tracing::info!(
        issues = snapshot.issues.len(),
        tables = config.table_count(),
        source = %args.source.display(),
        "loaded source snapshot"
    );

    let issues = match &filter {
        Some(filter) => {
            let selected = filter.apply(&snapshot.issues, &directory);
            tracing::info!(selected = selected.len(), "applied issue filter");
            selected
        }
        None => snapshot.issues.iter().collect(),
    };

    let interactive = std::io::stdin().is_terminal() && std::io::stderr().is_terminal();
    if args.prompt && !interactive {
        tracing::info!("no terminal attached, unmapped values will fail the export");
    }
    let document = if args.prompt && interactive {
        Exporter::new(&directory, config, TermPrompter::stderr(), args.options).export(issues)?
    } else {
        Exporter::new(&directory, config, NoPrompt, args.options).export(issues)?
    };

    let rendered = if args.pretty_print {
        serde_json::to_string_pretty(&document)?
    } else {
        serde_json::to_string(&document)?
    };

    match args.output.as_deref().filter(|p| *p != Path::new("-")) {
        None => println!("{rendered}"),
        Some(path) => {
            fs::write(path, format!("{rendered}\n"))?;
            report(&document, path, format)?;
        }
    }
    Ok(())
}

fn report(document: &ExportDocument, path: &Path, format: Format) -> Result<()> {
    match format {
        Format::Json => println!(
            "{}",
            serde_json::to_string(&json!({
                "output": path.display().to_string(),
                "projects": document.projects.len(),
                "issues": document.issue_count(),
                "links": document.links.len(),
            }))?
        ),
        Format::Pretty => {
            eprintln!(
                "{} {} issues in {} projects ({} links) to {}",
                "Exported".green().bold(),
                document.issue_count(),
                document.projects.len(),
                document.links.len(),
                path.display()
            );
        }
    }
    Ok(())
}
