use serde::Serialize;
use tracing::{info, warn};

use crate::actual::LedgerApi;
use crate::actual::model::{Category, NewCategory, NewCategoryGroup};
use crate::archiver::collect::collect_archive_set;
use crate::archiver::fanout::annotate_all;
use crate::error::ArchiveError;

pub const ARCHIVE_GROUP_NAME: &str = "Archive Group";
pub const ARCHIVE_CATEGORY_NAME: &str = "Archived";

#[derive(Debug, Clone, Default)]
pub struct ArchiveOptions {
    pub dry_run: bool,
    /// 0 issues every notes update at once.
    pub max_concurrency: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Found,
    Created,
    /// Absent and left alone because the run is a dry run.
    WouldCreate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolved {
    pub id: Option<String>,
    pub resolution: Resolution,
}

impl Resolved {
    fn found(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            resolution: Resolution::Found,
        }
    }

    fn created(id: String) -> Self {
        Self {
            id: Some(id),
            resolution: Resolution::Created,
        }
    }

    fn would_create() -> Self {
        Self {
            id: None,
            resolution: Resolution::WouldCreate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveOutcome {
    pub category_name: String,
    pub target_category_id: String,
    pub archive_group: Resolved,
    pub archive_category: Resolved,
    pub top_level: usize,
    pub split: usize,
    pub archived: usize,
    pub deleted: bool,
    pub dry_run: bool,
}

pub struct Archiver<'a, L: LedgerApi + ?Sized> {
    ledger: &'a L,
    opts: ArchiveOptions,
}

fn first_named<'c>(categories: &'c [Category], name: &str) -> Option<&'c Category> {
    categories.iter().find(|c| c.name == name)
}

impl<'a, L: LedgerApi + ?Sized> Archiver<'a, L> {
    pub fn new(ledger: &'a L, opts: ArchiveOptions) -> Self {
        Self { ledger, opts }
    }

    /// Finds the archive group by exact name, creating it when absent.
    pub fn resolve_archive_group(&self) -> Result<Resolved, ArchiveError> {
        let groups = self.ledger.category_groups()?;
        if let Some(group) = groups.iter().find(|g| g.name == ARCHIVE_GROUP_NAME) {
            info!(group_id = %group.id, "found archive category group");
            return Ok(Resolved::found(&group.id));
        }

        if self.opts.dry_run {
            info!("archive category group missing; dry run leaves it uncreated");
            return Ok(Resolved::would_create());
        }

        info!("could not find archive category group, creating one");
        let id = self.ledger.create_category_group(&NewCategoryGroup {
            name: ARCHIVE_GROUP_NAME.to_string(),
            is_income: false,
        })?;
        info!(group_id = %id, "archive category group created");
        Ok(Resolved::created(id))
    }

    /// Finds the archive category by exact name, creating it inside
    /// `group_id` when absent.
    pub fn resolve_archive_category(&self, group_id: Option<&str>) -> Result<Resolved, ArchiveError> {
        let categories = self.ledger.categories()?;
        if let Some(category) = first_named(&categories, ARCHIVE_CATEGORY_NAME) {
            info!(category_id = %category.id, "found archived category");
            return Ok(Resolved::found(&category.id));
        }

        if self.opts.dry_run {
            info!("archived category missing; dry run leaves it uncreated");
            return Ok(Resolved::would_create());
        }

        let Some(group_id) = group_id else {
            return Err(ArchiveError::Remote(anyhow::anyhow!(
                "archive category group id unavailable; cannot create {ARCHIVE_CATEGORY_NAME}"
            )));
        };
        info!("could not find archived category, creating one");
        let id = self.ledger.create_category(&NewCategory {
            name: ARCHIVE_CATEGORY_NAME.to_string(),
            group_id: group_id.to_string(),
        })?;
        info!(category_id = %id, "archived category created");
        Ok(Resolved::created(id))
    }

    pub fn run(&self, category_name: &str) -> Result<ArchiveOutcome, ArchiveError> {
        let archive_group = self.resolve_archive_group()?;
        let archive_category = self.resolve_archive_category(archive_group.id.as_deref())?;

        let categories = self.ledger.categories()?;
        let target = first_named(&categories, category_name)
            .ok_or_else(|| ArchiveError::CategoryNotFound(category_name.to_string()))?;
        if archive_category.id.as_deref() == Some(target.id.as_str()) {
            return Err(ArchiveError::SelfArchive(category_name.to_string()));
        }

        let transactions = self.ledger.transactions()?;
        let set = collect_archive_set(&transactions, &target.id);

        let mut outcome = ArchiveOutcome {
            category_name: category_name.to_string(),
            target_category_id: target.id.clone(),
            archive_group,
            archive_category,
            top_level: set.top_level,
            split: set.split,
            archived: 0,
            deleted: false,
            dry_run: self.opts.dry_run,
        };

        if set.is_empty() {
            info!(category = category_name, "no transactions found for category");
            return Ok(outcome);
        }

        if self.opts.dry_run {
            info!(
                category = category_name,
                records = set.len(),
                "dry run: notes and category left untouched"
            );
            outcome.archived = set.len();
            return Ok(outcome);
        }

        info!(category = category_name, records = set.len(), "updating notes");
        let summary = annotate_all(
            self.ledger,
            &set.records,
            category_name,
            self.opts.max_concurrency,
        );
        if !summary.ok() {
            let first = summary
                .failures
                .first()
                .map(|f| format!("{}: {}", f.id, f.error))
                .unwrap_or_default();
            warn!(
                failed = summary.failures.len(),
                updated = summary.updated,
                skipped = summary.skipped,
                "notes annotation incomplete; category left in place"
            );
            return Err(ArchiveError::Annotation {
                failed: summary.failures.len(),
                total: set.len(),
                first,
            });
        }

        let Some(archive_id) = outcome.archive_category.id.as_deref() else {
            return Err(ArchiveError::Remote(anyhow::anyhow!(
                "{ARCHIVE_CATEGORY_NAME} category id unavailable"
            )));
        };
        info!(category = category_name, "deleting category");
        self.ledger.delete_category(&target.id, archive_id)?;

        outcome.archived = set.len();
        outcome.deleted = true;
        Ok(outcome)
    }
}
