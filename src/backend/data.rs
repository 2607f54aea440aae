//! Thin client for the backend's PostgREST-style table API.
//!
//! Requests are built with a small fluent builder (`from("postcards")
//! .eq("era", "1920s").order_desc("created_at").limit(20)`) and executed
//! exactly once; every failure surfaces as a `reqwest::Error` at the call
//! site. No retries, no caching.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct DataClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl DataClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Start a request against `table`.
    pub fn from(&self, table: &str) -> TableRequest {
        TableRequest {
            client: self.clone(),
            table: table.to_string(),
            select: None,
            filters: Vec::new(),
            order: None,
            limit: None,
            range: None,
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }
}

pub struct TableRequest {
    client: DataClient,
    table: String,
    select: Option<String>,
    filters: Vec<(String, String)>,
    order: Option<String>,
    limit: Option<usize>,
    range: Option<(usize, usize)>,
}

impl TableRequest {
    pub fn select(mut self, columns: &str) -> Self {
        self.select = Some(columns.to_string());
        self
    }

    /// Exact-match equality filter.
    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters
            .push((column.to_string(), format!("eq.{}", value.to_string())));
        self
    }

    pub fn order_desc(mut self, column: &str) -> Self {
        self.order = Some(format!("{}.desc", column));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Inclusive start/end item range, the API's offset-pagination form.
    pub fn range(mut self, start: usize, end: usize) -> Self {
        self.range = Some((start, end));
        self
    }

    /// Query-string pairs for the built request, in emission order.
    fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(ref select) = self.select {
            pairs.push(("select".to_string(), select.clone()));
        }
        pairs.extend(self.filters.iter().cloned());
        if let Some(ref order) = self.order {
            pairs.push(("order".to_string(), order.clone()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }

    fn request(&self, method: reqwest::Method) -> reqwest::RequestBuilder {
        let url = self.client.table_url(&self.table);
        let mut req = self
            .client
            .http
            .request(method, url)
            .header("apikey", &self.client.api_key)
            .bearer_auth(&self.client.api_key)
            .query(&self.query_pairs());
        if let Some((start, end)) = self.range {
            req = req
                .header("Range-Unit", "items")
                .header("Range", format!("{}-{}", start, end));
        }
        req
    }

    /// Execute as a select, returning all matching rows.
    pub async fn fetch<T: DeserializeOwned>(self) -> AppResult<Vec<T>> {
        let rows = self
            .request(reqwest::Method::GET)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(rows)
    }

    /// Execute as a select, returning the first matching row if any.
    pub async fn fetch_one<T: DeserializeOwned>(self) -> AppResult<Option<T>> {
        let mut rows: Vec<T> = self.limit(1).fetch().await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.remove(0))
        })
    }

    /// Insert a row, returning the stored representation.
    pub async fn insert<T: DeserializeOwned, B: Serialize>(self, body: &B) -> AppResult<Vec<T>> {
        let rows = self
            .request(reqwest::Method::POST)
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(rows)
    }

    /// Update rows matching the filters, returning stored representations.
    pub async fn update<T: DeserializeOwned, B: Serialize>(self, body: &B) -> AppResult<Vec<T>> {
        let rows = self
            .request(reqwest::Method::PATCH)
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(rows)
    }

    /// Delete rows matching the filters.
    pub async fn delete(self) -> AppResult<()> {
        self.request(reqwest::Method::DELETE)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Take exactly one row out of a representation response, erroring when the
/// backend reported success but returned nothing.
pub fn single<T>(mut rows: Vec<T>, what: &str) -> AppResult<T> {
    if rows.is_empty() {
        return Err(AppError::Internal(format!(
            "backend returned no {} representation",
            what
        )));
    }
    Ok(rows.remove(0))
}
