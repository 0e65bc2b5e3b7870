use anyhow::{Result, anyhow};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use crate::actual::LedgerApi;
use crate::actual::model::{
    Category, CategoryGroup, NewCategory, NewCategoryGroup, Transaction, TransactionPatch,
};

#[derive(Debug, Default)]
struct LedgerState {
    groups: Vec<CategoryGroup>,
    categories: Vec<Category>,
    transactions: Vec<Transaction>,
    next_id: usize,
    created_groups: Vec<NewCategoryGroup>,
    created_categories: Vec<NewCategory>,
    deletes: Vec<(String, String)>,
    updates: Vec<(String, String)>,
    failing_updates: HashSet<String>,
    list_calls: usize,
}

/// In-memory ledger that records every mutation it receives.
#[derive(Debug, Default)]
pub struct FakeLedger {
    state: Mutex<LedgerState>,
}

impl FakeLedger {
    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().expect("fake ledger lock")
    }

    pub fn with_group(self, id: &str, name: &str) -> Self {
        self.state().groups.push(CategoryGroup {
            id: id.to_string(),
            name: name.to_string(),
            is_income: false,
        });
        self
    }

    pub fn with_category(self, id: &str, name: &str, group_id: &str) -> Self {
        self.state().categories.push(Category {
            id: id.to_string(),
            name: name.to_string(),
            group_id: Some(group_id.to_string()),
        });
        self
    }

    pub fn with_transactions(self, transactions: Vec<Transaction>) -> Self {
        self.state().transactions = transactions;
        self
    }

    pub fn failing_update(self, id: &str) -> Self {
        self.state().failing_updates.insert(id.to_string());
        self
    }

    pub fn updates(&self) -> Vec<(String, String)> {
        self.state().updates.clone()
    }

    pub fn deletes(&self) -> Vec<(String, String)> {
        self.state().deletes.clone()
    }

    pub fn created_groups(&self) -> Vec<NewCategoryGroup> {
        self.state().created_groups.clone()
    }

    pub fn created_categories(&self) -> Vec<NewCategory> {
        self.state().created_categories.clone()
    }

    pub fn transaction_list_calls(&self) -> usize {
        self.state().list_calls
    }

    pub fn category_named(&self, name: &str) -> Option<Category> {
        self.state()
            .categories
            .iter()
            .find(|c| c.name == name)
            .cloned()
    }

    pub fn transaction(&self, id: &str) -> Option<Transaction> {
        self.state()
            .transactions
            .iter()
            .find(|tx| tx.id == id)
            .cloned()
    }
}

impl LedgerApi for FakeLedger {
    fn category_groups(&self) -> Result<Vec<CategoryGroup>> {
        Ok(self.state().groups.clone())
    }

    fn create_category_group(&self, group: &NewCategoryGroup) -> Result<String> {
        let mut state = self.state();
        state.next_id += 1;
        let id = format!("group-{}", state.next_id);
        state.groups.push(CategoryGroup {
            id: id.clone(),
            name: group.name.clone(),
            is_income: group.is_income,
        });
        state.created_groups.push(group.clone());
        Ok(id)
    }

    fn categories(&self) -> Result<Vec<Category>> {
        Ok(self.state().categories.clone())
    }

    fn create_category(&self, category: &NewCategory) -> Result<String> {
        let mut state = self.state();
        state.next_id += 1;
        let id = format!("cat-{}", state.next_id);
        state.categories.push(Category {
            id: id.clone(),
            name: category.name.clone(),
            group_id: Some(category.group_id.clone()),
        });
        state.created_categories.push(category.clone());
        Ok(id)
    }

    fn delete_category(&self, id: &str, transfer_to: &str) -> Result<()> {
        let mut state = self.state();
        let before = state.categories.len();
        state.categories.retain(|c| c.id != id);
        if state.categories.len() == before {
            return Err(anyhow!("category {id} does not exist"));
        }
        for tx in state.transactions.iter_mut() {
            if tx.category_id.as_deref() == Some(id) {
                tx.category_id = Some(transfer_to.to_string());
            }
        }
        state.deletes.push((id.to_string(), transfer_to.to_string()));
        Ok(())
    }

    fn transactions(&self) -> Result<Vec<Transaction>> {
        let mut state = self.state();
        state.list_calls += 1;
        Ok(state.transactions.clone())
    }

    fn update_transaction(&self, id: &str, patch: &TransactionPatch) -> Result<()> {
        let mut state = self.state();
        if state.failing_updates.contains(id) {
            return Err(anyhow!("PATCH transactions/{id} failed with status 500"));
        }
        for tx in state.transactions.iter_mut() {
            if tx.id == id {
                tx.notes = Some(patch.notes.clone());
            }
            for sub in tx.subtransactions.iter_mut().flatten() {
                if sub.id == id {
                    sub.notes = Some(patch.notes.clone());
                }
            }
        }
        state.updates.push((id.to_string(), patch.notes.clone()));
        Ok(())
    }
}
