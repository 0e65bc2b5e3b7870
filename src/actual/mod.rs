pub mod client;
pub mod model;

use anyhow::Result;

use model::{Category, CategoryGroup, NewCategory, NewCategoryGroup, Transaction, TransactionPatch};

/// Remote ledger operations the archiver needs from an open budget.
///
/// Implementations must be shareable across threads: notes updates are
/// issued concurrently against the same session.
pub trait LedgerApi: Sync {
    fn category_groups(&self) -> Result<Vec<CategoryGroup>>;
    fn create_category_group(&self, group: &NewCategoryGroup) -> Result<String>;
    fn categories(&self) -> Result<Vec<Category>>;
    fn create_category(&self, category: &NewCategory) -> Result<String>;
    /// Deletes `id`, moving every transaction that still references it to `transfer_to`.
    fn delete_category(&self, id: &str, transfer_to: &str) -> Result<()>;
    fn transactions(&self) -> Result<Vec<Transaction>>;
    fn update_transaction(&self, id: &str, patch: &TransactionPatch) -> Result<()>;
}
