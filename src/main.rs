use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use trackport::build_info;
use trackport::commands;
use trackport::commands::export::ExportArgs;
use trackport::commands::list::{ListResource, UserStatus};
use trackport::export::ExportOptions;
use trackport::output::Format;

#[derive(Parser)]
#[command(
    name = "trackport",
    version,
    long_version = build_info::LONG_VERSION,
    about = "Map a Redmine issue snapshot onto a Jira import document"
)]
struct Cli {
    /// Output format for summaries and errors
    #[arg(long, global = true, value_enum, default_value = "json")]
    format: Format,
    /// Shorthand for --format pretty
    #[arg(long, global = true, hide = true)]
    pretty: bool,
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export issues from a source snapshot into a Jira import document
    Export {
        /// Source snapshot (JSON)
        #[arg(long, short)]
        source: PathBuf,
        /// Mapping configuration (YAML)
        #[arg(long, short)]
        config: PathBuf,
        /// Write the document here instead of stdout (`-` for stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Indent the exported document
        #[arg(long)]
        pretty_print: bool,
        /// Export issue relations as links
        #[arg(long)]
        links: bool,
        /// Skip issue documents (project buckets are still written)
        #[arg(long)]
        no_issues: bool,
        /// Fail on unmapped values instead of asking for them
        #[arg(long)]
        no_prompt: bool,
        /// Export only the issues matching a Redmine issue-list query,
        /// e.g. `project_id=core&tracker_id=1,2&status_id=*`
        #[arg(long)]
        filter: Option<String>,
    },
    /// Validate a mapping configuration, optionally against a source snapshot
    CheckConfig {
        /// Mapping configuration (YAML)
        #[arg(long, short)]
        config: PathBuf,
        /// Report source values no static table covers
        #[arg(long, short)]
        source: Option<PathBuf>,
    },
    /// List identifying values of source resources
    List {
        #[arg(value_enum)]
        resource: ListResource,
        /// Source snapshot (JSON)
        #[arg(long, short)]
        source: PathBuf,
        /// Project identifier, for categories and versions
        #[arg(long, short)]
        project: Option<String>,
        /// List active and locked users
        #[arg(long, conflicts_with_all = ["active", "locked"])]
        all: bool,
        /// List active users (default)
        #[arg(long, conflicts_with = "locked")]
        active: bool,
        /// List locked users
        #[arg(long)]
        locked: bool,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("trackport={level}").into());
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli, format: Format) -> trackport::error::Result<()> {
    match cli.command {
        Commands::Export {
            source,
            config,
            output,
            pretty_print,
            links,
            no_issues,
            no_prompt,
            filter,
        } => commands::export::run(
            &ExportArgs {
                source,
                config,
                output,
                pretty_print,
                options: ExportOptions {
                    export_issues: !no_issues,
                    export_links: links,
                },
                prompt: !no_prompt,
                filter,
            },
            format,
        ),
        Commands::CheckConfig { config, source } => {
            commands::check_config::run(&config, source.as_deref(), format)
        }
        Commands::List {
            resource,
            source,
            project,
            all,
            active: _,
            locked,
        } => {
            let users = if all {
                UserStatus::All
            } else if locked {
                UserStatus::Locked
            } else {
                UserStatus::Active
            };
            commands::list::run(resource, &source, project.as_deref(), users, format)
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let format = if cli.pretty {
        Format::Pretty
    } else {
        cli.format
    };
    init_tracing(cli.verbose);
    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        commit = build_info::COMMIT,
        "starting trackport"
    );
    if let Err(e) = run(cli, format) {
        match format {
            Format::Json => {
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "error": e.code(),
                        "message": e.to_string()
                    })
                );
            }
            _ => eprintln!("error: {e}"),
        }
        std::process::exit(1);
    }
}
