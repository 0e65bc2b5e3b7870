use tracing::error;

use crate::actual::LedgerApi;
use crate::actual::client::ActualClient;
use crate::archiver::config::ServerConfig;
use crate::archiver::orchestrator::{ArchiveOptions, ArchiveOutcome, Archiver, Resolution, Resolved};
use crate::commands::CommandReport;
use crate::error::ArchiveError;

#[derive(Debug, Clone)]
pub struct ArchiveCategoryOptions {
    pub budget_id: String,
    pub category_name: String,
    pub dry_run: bool,
    pub max_concurrency: usize,
}

pub fn run(server: &ServerConfig, opts: &ArchiveCategoryOptions) -> CommandReport {
    let mut report = CommandReport::new("archive-category");
    report.detail(format!("budget_id={}", opts.budget_id));
    report.detail(format!("category={}", opts.category_name));
    if opts.dry_run {
        report.detail("dry-run: no categories created, notes updated or categories deleted");
    }

    let client = match ActualClient::open_budget(server, &opts.budget_id) {
        Ok(client) => client,
        Err(source) => {
            let err = ArchiveError::Session {
                budget_id: opts.budget_id.clone(),
                source,
            };
            error!(kind = err.kind(), "{err}");
            report.fail(&err);
            return report;
        }
    };
    report.detail(format!("accounts={}", client.accounts().len()));

    match execute(&client, opts) {
        Ok(outcome) => describe(&mut report, &outcome),
        Err(err) => {
            error!(kind = err.kind(), "{err}");
            report.fail(&err);
        }
    }
    report
}

pub fn execute<L: LedgerApi + ?Sized>(
    ledger: &L,
    opts: &ArchiveCategoryOptions,
) -> Result<ArchiveOutcome, ArchiveError> {
    let archiver = Archiver::new(
        ledger,
        ArchiveOptions {
            dry_run: opts.dry_run,
            max_concurrency: opts.max_concurrency,
        },
    );
    archiver.run(&opts.category_name)
}

fn resolution_label(resolved: &Resolved) -> String {
    let id = resolved.id.as_deref().unwrap_or("-");
    match resolved.resolution {
        Resolution::Found => format!("found ({id})"),
        Resolution::Created => format!("created ({id})"),
        Resolution::WouldCreate => "would create".to_string(),
    }
}

fn describe(report: &mut CommandReport, outcome: &ArchiveOutcome) {
    report.detail(format!(
        "archive_group={}",
        resolution_label(&outcome.archive_group)
    ));
    report.detail(format!(
        "archive_category={}",
        resolution_label(&outcome.archive_category)
    ));
    report.detail(format!("target_category_id={}", outcome.target_category_id));
    report.detail(format!(
        "matches: top_level={} split={}",
        outcome.top_level, outcome.split
    ));

    let total = outcome.top_level + outcome.split;
    if total == 0 {
        report.detail(format!(
            "NO transactions found for category {}",
            outcome.category_name
        ));
    } else if outcome.dry_run {
        report.detail(format!(
            "Would archive {total} from {}",
            outcome.category_name
        ));
    } else {
        report.detail(format!(
            "Archived {} from {}",
            outcome.archived, outcome.category_name
        ));
    }
}
