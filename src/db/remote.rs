// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Remote Store client for the hosted relational data service.
//!
//! Provides per-table operations over the PostgREST HTTP interface:
//! - select / insert / upsert / update / delete by id
//! - update-all-except (goal deactivation)
//! - delete-all (breed component replacement)
//!
//! Every request is filtered by the owning identity and, for dog-scoped
//! tables, by the owning dog. Errors come back classified (see
//! [`crate::error::FaultKind`]).

use crate::db::Table;
use crate::error::{AppError, Result};
use futures_util::future::BoxFuture;
use serde_json::Value;

/// Identity and ownership context for one remote operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteScope {
    pub user_id: String,
    pub access_token: String,
    /// Remote id of the owning dog. Required for every table except `dogs`.
    pub dog_id: Option<String>,
    /// Identity refresh trigger observed when the scope was built.
    pub generation: u64,
}

impl RemoteScope {
    /// Same identity, different owning dog.
    pub fn for_dog(&self, dog_id: impl Into<String>) -> Self {
        Self {
            dog_id: Some(dog_id.into()),
            ..self.clone()
        }
    }

    /// Check that a row returned by the remote store belongs to this scope.
    pub fn verify_row(&self, table: Table, row: &Value) -> Result<()> {
        let owner = row.get("user_id").and_then(Value::as_str);
        if owner != Some(self.user_id.as_str()) {
            return Err(AppError::rejected(format!(
                "{} row returned for a different identity",
                table
            )));
        }
        if table.is_dog_scoped() {
            let dog = row.get("dog_id").and_then(Value::as_str);
            if dog.is_none() || dog != self.dog_id.as_deref() {
                return Err(AppError::rejected(format!(
                    "{} row returned for a different dog",
                    table
                )));
            }
        }
        Ok(())
    }
}

/// Remote Store operations. All calls are scoped; see [`RemoteScope`].
pub trait RemoteStore: Send + Sync {
    fn select(&self, table: Table, scope: RemoteScope) -> BoxFuture<'_, Result<Vec<Value>>>;

    /// Insert one row, returning it with remote-assigned fields.
    fn insert(&self, table: Table, scope: RemoteScope, row: Value) -> BoxFuture<'_, Result<Value>>;

    /// Insert or merge on `id`.
    fn upsert(&self, table: Table, scope: RemoteScope, row: Value) -> BoxFuture<'_, Result<Value>>;

    fn update(
        &self,
        table: Table,
        scope: RemoteScope,
        id: String,
        row: Value,
    ) -> BoxFuture<'_, Result<Value>>;

    /// Patch every active row in scope. `keep_id`, when given, names a
    /// remote row that is left alone.
    fn deactivate_others(
        &self,
        table: Table,
        scope: RemoteScope,
        keep_id: Option<String>,
        patch: Value,
    ) -> BoxFuture<'_, Result<()>>;

    fn delete(&self, table: Table, scope: RemoteScope, id: String) -> BoxFuture<'_, Result<()>>;

    /// Delete every row in scope.
    fn delete_all(&self, table: Table, scope: RemoteScope) -> BoxFuture<'_, Result<()>>;
}

/// PostgREST client.
#[derive(Clone)]
pub struct PostgrestClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PostgrestClient {
    /// Create a client for `{remote_url}/rest/v1`.
    pub fn new(remote_url: &str, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("{}/rest/v1", remote_url.trim_end_matches('/')),
            api_key: api_key.into(),
        }
    }

    /// Build the table URL with ownership filters plus any extra filters.
    fn url(&self, table: Table, scope: &RemoteScope, extra: &[(&str, String)]) -> Result<String> {
        let mut filters = vec![format!("user_id=eq.{}", urlencoding::encode(&scope.user_id))];
        if table.is_dog_scoped() {
            let dog_id = scope.dog_id.as_deref().ok_or_else(|| {
                AppError::rejected(format!("Refusing {} request without an owning dog", table))
            })?;
            filters.push(format!("dog_id=eq.{}", urlencoding::encode(dog_id)));
        }
        for (column, filter) in extra {
            filters.push(format!("{}={}", column, urlencoding::encode(filter)));
        }
        Ok(format!("{}/{}?{}", self.base_url, table, filters.join("&")))
    }

    fn request(
        &self,
        method: reqwest::Method,
        url: &str,
        scope: &RemoteScope,
    ) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&scope.access_token)
            .header("Prefer", "return=representation")
    }

    /// Send a request and parse the returned row array.
    async fn send_rows(&self, request: reqwest::RequestBuilder) -> Result<Vec<Value>> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::from_status(status.as_u16(), &body));
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str::<Value>(&text)? {
            Value::Array(rows) => Ok(rows),
            row @ Value::Object(_) => Ok(vec![row]),
            other => Err(AppError::rejected(format!(
                "Unexpected response body: {}",
                other
            ))),
        }
    }

    /// Expect exactly one returned row and check it belongs to the scope.
    fn single_row(table: Table, scope: &RemoteScope, rows: Vec<Value>) -> Result<Value> {
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("{} row not returned", table)))?;
        scope.verify_row(table, &row)?;
        Ok(row)
    }

    /// Force the ownership columns of an outgoing row to the scope.
    fn owned_row(table: Table, scope: &RemoteScope, mut row: Value) -> Value {
        if let Value::Object(map) = &mut row {
            map.insert("user_id".to_string(), Value::String(scope.user_id.clone()));
            if let (true, Some(dog_id)) = (table.is_dog_scoped(), scope.dog_id.as_ref()) {
                map.insert("dog_id".to_string(), Value::String(dog_id.clone()));
            }
        }
        row
    }
}

impl RemoteStore for PostgrestClient {
    fn select(&self, table: Table, scope: RemoteScope) -> BoxFuture<'_, Result<Vec<Value>>> {
        Box::pin(async move {
            let url = self.url(table, &scope, &[("order", "created_at.asc".to_string())])?;
            let rows = self
                .send_rows(self.request(reqwest::Method::GET, &url, &scope))
                .await?;
            for row in &rows {
                scope.verify_row(table, row)?;
            }
            tracing::debug!(%table, count = rows.len(), "Selected remote rows");
            Ok(rows)
        })
    }

    fn insert(&self, table: Table, scope: RemoteScope, row: Value) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            let url = self.url(table, &scope, &[])?;
            let body = Self::owned_row(table, &scope, row);
            let rows = self
                .send_rows(self.request(reqwest::Method::POST, &url, &scope).json(&body))
                .await?;
            Self::single_row(table, &scope, rows)
        })
    }

    fn upsert(&self, table: Table, scope: RemoteScope, row: Value) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            let url = self.url(table, &scope, &[])?;
            let body = Self::owned_row(table, &scope, row);
            let request = self
                .http
                .post(&url)
                .header("apikey", &self.api_key)
                .bearer_auth(&scope.access_token)
                .header("Prefer", "return=representation,resolution=merge-duplicates")
                .json(&body);
            let rows = self.send_rows(request).await?;
            Self::single_row(table, &scope, rows)
        })
    }

    fn update(
        &self,
        table: Table,
        scope: RemoteScope,
        id: String,
        row: Value,
    ) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            let url = self.url(table, &scope, &[("id", format!("eq.{}", id))])?;
            let mut body = Self::owned_row(table, &scope, row);
            if let Value::Object(map) = &mut body {
                map.remove("id");
            }
            let rows = self
                .send_rows(self.request(reqwest::Method::PATCH, &url, &scope).json(&body))
                .await?;
            Self::single_row(table, &scope, rows)
        })
    }

    fn deactivate_others(
        &self,
        table: Table,
        scope: RemoteScope,
        keep_id: Option<String>,
        patch: Value,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut filters = vec![("is_active", "eq.true".to_string())];
            if let Some(keep_id) = keep_id {
                filters.push(("id", format!("neq.{}", keep_id)));
            }
            let url = self.url(table, &scope, &filters)?;
            let rows = self
                .send_rows(self.request(reqwest::Method::PATCH, &url, &scope).json(&patch))
                .await?;
            tracing::debug!(%table, count = rows.len(), "Patched remote rows");
            Ok(())
        })
    }

    fn delete(&self, table: Table, scope: RemoteScope, id: String) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let url = self.url(table, &scope, &[("id", format!("eq.{}", id))])?;
            self.send_rows(self.request(reqwest::Method::DELETE, &url, &scope))
                .await?;
            Ok(())
        })
    }

    fn delete_all(&self, table: Table, scope: RemoteScope) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let url = self.url(table, &scope, &[])?;
            self.send_rows(self.request(reqwest::Method::DELETE, &url, &scope))
                .await?;
            Ok(())
        })
    }
}
