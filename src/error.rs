use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("invalid arguments: {0}")]
    Usage(String),
    #[error("configuration invalid or unreadable: {0:#}")]
    Config(anyhow::Error),
    #[error("could not open budget {budget_id}: {source:#}")]
    Session {
        budget_id: String,
        source: anyhow::Error,
    },
    #[error("{0} is the archive destination and cannot be archived into itself")]
    SelfArchive(String),
    #[error("{0} category not found")]
    CategoryNotFound(String),
    #[error("{failed} of {total} notes updates failed; first error: {first}")]
    Annotation {
        failed: usize,
        total: usize,
        first: String,
    },
    #[error("ledger request failed: {0:#}")]
    Remote(#[from] anyhow::Error),
}

impl ArchiveError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Usage(_) => "usage",
            Self::Config(_) => "config",
            Self::Session { .. } => "session",
            Self::SelfArchive(_) => "self_archive",
            Self::CategoryNotFound(_) => "category_not_found",
            Self::Annotation { .. } => "annotation",
            Self::Remote(_) => "remote",
        }
    }

    /// Exit status under `--strict-exit`. Compatibility mode exits 0 for
    /// everything but configuration errors.
    pub fn strict_exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) => 2,
            _ => 1,
        }
    }
}
