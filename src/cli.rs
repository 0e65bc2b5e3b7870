use anyhow::Result;
use clap::Parser;
use tracing::info;

use crate::archiver::config::{load_config, strict_exit_from_env};
use crate::commands::CommandReport;
use crate::commands::archive_category::{self, ArchiveCategoryOptions};
use crate::error::ArchiveError;

const USAGE_MESSAGE: &str = "Invalid arguments, pass budget id and category name to be archived";

#[derive(Debug, Parser)]
#[command(
    name = "category-archiver",
    version,
    about = "Move every transaction of a category into Archived, stamping the source in notes, then delete the category."
)]
pub struct Cli {
    /// Budget sync id followed by the exact category name.
    #[arg(value_name = "ARGS", allow_hyphen_values = true)]
    args: Vec<String>,

    /// Resolve and count without creating, updating or deleting anything.
    #[arg(long)]
    dry_run: bool,

    /// Print the report as JSON on stdout; progress logs move to stderr.
    #[arg(long)]
    json: bool,

    /// Cap on concurrent notes updates (0 sends all at once).
    #[arg(long, value_name = "N")]
    max_concurrency: Option<usize>,

    /// Exit non-zero on failures instead of always exiting 0.
    #[arg(long)]
    strict_exit: bool,
}

/// Budget id and category name, ignoring empty values.
fn positional_args(args: &[String]) -> Result<(String, String), ArchiveError> {
    let present: Vec<&String> = args.iter().filter(|a| !a.is_empty()).collect();
    match present.as_slice() {
        [budget_id, category] => Ok(((*budget_id).clone(), (*category).clone())),
        _ => Err(ArchiveError::Usage(format!(
            "expected budget id and category name, got {} value(s)",
            present.len()
        ))),
    }
}

fn render(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for detail in &report.details {
        println!("{detail}");
    }
    for issue in &report.issues {
        eprintln!("issue: {issue}");
    }
    Ok(())
}

/// Parses the command line, runs the archive and returns the exit status.
pub fn run() -> Result<i32> {
    let cli = Cli::parse();

    let (budget_id, category_name) = match positional_args(&cli.args) {
        Ok(pair) => pair,
        Err(err) => {
            eprintln!("{USAGE_MESSAGE}");
            let strict = cli.strict_exit || strict_exit_from_env();
            return Ok(if strict { err.strict_exit_code() } else { 0 });
        }
    };

    let cfg = load_config().map_err(ArchiveError::Config)?;
    crate::logging::init(cli.json);
    info!("=========== Actual Category Archiver ===========");

    let strict = cli.strict_exit || cfg.run.strict_exit;
    let opts = ArchiveCategoryOptions {
        budget_id,
        category_name,
        dry_run: cli.dry_run,
        max_concurrency: cli.max_concurrency.unwrap_or(cfg.run.max_concurrency),
    };

    let report = archive_category::run(&cfg.server, &opts);
    render(&report, cli.json)?;

    Ok(if strict && !report.ok { 1 } else { 0 })
}
