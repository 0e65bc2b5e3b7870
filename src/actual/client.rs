use anyhow::{Context, Result};
use reqwest::Method;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

use crate::actual::LedgerApi;
use crate::actual::model::{
    Account, Category, CategoryGroup, NewCategory, NewCategoryGroup, Transaction,
    TransactionPatch,
};
use crate::archiver::config::ServerConfig;
use crate::util::truncate_with_ellipsis;

const API_KEY_HEADER: &str = "x-api-key";
const BUDGET_PASSWORD_HEADER: &str = "budget-encryption-password";
const EARLIEST_SINCE_DATE: &str = "1970-01-01";
const ERROR_BODY_MAX_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Serialize)]
struct CategoryGroupBody<'a> {
    category_group: &'a NewCategoryGroup,
}

#[derive(Debug, Serialize)]
struct CategoryBody<'a> {
    category: &'a NewCategory,
}

#[derive(Debug, Serialize)]
struct TransactionBody<'a> {
    transaction: &'a TransactionPatch,
}

/// Session against one budget on an actual-http-api bridge.
pub struct ActualClient {
    http: Client,
    budget_url: String,
    api_key: Option<String>,
    budget_password: Option<String>,
    accounts: Vec<Account>,
}

impl ActualClient {
    /// Opens `budget_id`, failing when the bridge is unreachable, the budget
    /// is unknown or the credentials are rejected.
    pub fn open_budget(server: &ServerConfig, budget_id: &str) -> Result<Self> {
        let budget_id = budget_id.trim();
        if budget_id.is_empty() {
            anyhow::bail!("budget id cannot be empty");
        }

        let timeout =
            (server.request_timeout_secs > 0).then(|| Duration::from_secs(server.request_timeout_secs));
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build ledger http client")?;

        let mut client = Self {
            http,
            budget_url: format!(
                "{}/v1/budgets/{}",
                server.base_url.trim().trim_end_matches('/'),
                budget_id
            ),
            api_key: server.api_key.clone(),
            budget_password: server.budget_password.clone(),
            accounts: Vec::new(),
        };
        client.accounts = client
            .get_data::<Vec<Account>>("accounts", &[])
            .with_context(|| format!("failed to open budget {budget_id}"))?;
        debug!(
            budget_id,
            accounts = client.accounts.len(),
            "budget session opened"
        );
        Ok(client)
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.budget_url, path);
        let mut req = self.http.request(method, url);
        if let Some(key) = &self.api_key {
            req = req.header(API_KEY_HEADER, key);
        }
        if let Some(password) = &self.budget_password {
            req = req.header(BUDGET_PASSWORD_HEADER, password);
        }
        req
    }

    fn execute(&self, label: &str, req: RequestBuilder) -> Result<Response> {
        let response = req
            .send()
            .with_context(|| format!("{label} request failed"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            anyhow::bail!(
                "{label} failed with status {status}: {}",
                truncate_with_ellipsis(body.trim(), ERROR_BODY_MAX_CHARS)
            );
        }
        Ok(response)
    }

    fn get_data<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let label = format!("GET {path}");
        let mut req = self.request(Method::GET, path);
        if !query.is_empty() {
            req = req.query(query);
        }
        let response = self.execute(&label, req)?;
        let envelope: DataEnvelope<T> = response
            .json()
            .with_context(|| format!("invalid JSON from {label}"))?;
        Ok(envelope.data)
    }

    fn post_data<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let label = format!("POST {path}");
        let response = self.execute(&label, self.request(Method::POST, path).json(body))?;
        let envelope: DataEnvelope<T> = response
            .json()
            .with_context(|| format!("invalid JSON from {label}"))?;
        Ok(envelope.data)
    }
}

impl LedgerApi for ActualClient {
    fn category_groups(&self) -> Result<Vec<CategoryGroup>> {
        self.get_data("categorygroups", &[])
    }

    fn create_category_group(&self, group: &NewCategoryGroup) -> Result<String> {
        self.post_data(
            "categorygroups",
            &CategoryGroupBody {
                category_group: group,
            },
        )
    }

    fn categories(&self) -> Result<Vec<Category>> {
        self.get_data("categories", &[])
    }

    fn create_category(&self, category: &NewCategory) -> Result<String> {
        self.post_data("categories", &CategoryBody { category })
    }

    fn delete_category(&self, id: &str, transfer_to: &str) -> Result<()> {
        let path = format!("categories/{id}");
        let req = self
            .request(Method::DELETE, &path)
            .query(&[("transfer_category_id", transfer_to)]);
        self.execute(&format!("DELETE {path}"), req)?;
        Ok(())
    }

    fn transactions(&self) -> Result<Vec<Transaction>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for account in &self.accounts {
            let path = format!("accounts/{}/transactions", account.id);
            let batch: Vec<Transaction> =
                self.get_data(&path, &[("since_date", EARLIEST_SINCE_DATE)])?;
            debug!(account = %account.name, count = batch.len(), "fetched transactions");
            for tx in batch {
                if seen.insert(tx.id.clone()) {
                    out.push(tx);
                }
            }
        }
        Ok(out)
    }

    fn update_transaction(&self, id: &str, patch: &TransactionPatch) -> Result<()> {
        let path = format!("transactions/{id}");
        let req = self
            .request(Method::PATCH, &path)
            .json(&TransactionBody { transaction: patch });
        self.execute(&format!("PATCH {path}"), req)?;
        Ok(())
    }
}
