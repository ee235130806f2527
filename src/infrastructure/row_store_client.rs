use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreTable {
    Tasks,
    Favorites,
    Trashed,
    Notes,
}

impl StoreTable {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tasks => "tasks",
            Self::Favorites => "favorites",
            Self::Trashed => "trashed_tasks",
            Self::Notes => "notes",
        }
    }
}

/// Owner-scoped row storage. Rows travel as raw JSON objects; the mapping to
/// domain models lives in `record_mapper`.
#[async_trait]
pub trait RowStoreClient: Send + Sync {
    async fn list(
        &self,
        access_token: &str,
        table: StoreTable,
        owner_id: &str,
    ) -> Result<Vec<serde_json::Value>, InfraError>;

    /// Insert a row and return the stored representation, including the
    /// server-assigned id.
    async fn insert(
        &self,
        access_token: &str,
        table: StoreTable,
        row: &serde_json::Value,
    ) -> Result<serde_json::Value, InfraError>;

    async fn update(
        &self,
        access_token: &str,
        table: StoreTable,
        id: &str,
        patch: &serde_json::Value,
    ) -> Result<(), InfraError>;

    async fn delete(
        &self,
        access_token: &str,
        table: StoreTable,
        id: &str,
    ) -> Result<(), InfraError>;

    async fn delete_all(
        &self,
        access_token: &str,
        table: StoreTable,
        owner_id: &str,
    ) -> Result<(), InfraError>;
}

/// PostgREST-convention client: table name in the path, `eq.` filters in the
/// query string, anon key plus user bearer token on every request.
#[derive(Debug, Clone)]
pub struct ReqwestRowStoreClient {
    client: Client,
    rest_endpoint: String,
    anon_key: String,
}

impl ReqwestRowStoreClient {
    pub fn new(rest_endpoint: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            rest_endpoint: rest_endpoint.into(),
            anon_key: anon_key.into(),
        }
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::Store(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn store_http_error(status: reqwest::StatusCode, body: &str) -> InfraError {
        let message = if body.trim().is_empty() {
            format!("row store error: http {}", status.as_u16())
        } else {
            format!("row store error: http {}; body={body}", status.as_u16())
        };
        InfraError::Store(message)
    }

    fn table_endpoint(&self, table: StoreTable) -> Result<Url, InfraError> {
        let mut url = Url::parse(&self.rest_endpoint)
            .map_err(|error| InfraError::Store(format!("invalid rest endpoint: {error}")))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| InfraError::Store("rest endpoint cannot be a base".to_string()))?;
            segments.pop_if_empty();
            segments.push(table.as_str());
        }
        Ok(url)
    }

    async fn read_body(response: reqwest::Response) -> Result<(reqwest::StatusCode, String), InfraError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Store(format!("failed reading row store response: {error}")))?;
        Ok((status, body))
    }
}

#[async_trait]
impl RowStoreClient for ReqwestRowStoreClient {
    async fn list(
        &self,
        access_token: &str,
        table: StoreTable,
        owner_id: &str,
    ) -> Result<Vec<serde_json::Value>, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(owner_id, "owner id")?;

        let mut url = self.table_endpoint(table)?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("owner_id", &format!("eq.{owner_id}"));

        let response = self
            .client
            .get(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| InfraError::Store(format!("network error while listing rows: {error}")))?;

        let (status, body) = Self::read_body(response).await?;
        if !status.is_success() {
            return Err(Self::store_http_error(status, &body));
        }

        serde_json::from_str::<Vec<serde_json::Value>>(&body).map_err(|error| {
            InfraError::Store(format!("invalid row list payload: {error}; body={body}"))
        })
    }

    async fn insert(
        &self,
        access_token: &str,
        table: StoreTable,
        row: &serde_json::Value,
    ) -> Result<serde_json::Value, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;

        let url = self.table_endpoint(table)?;
        let response = self
            .client
            .post(url)
            .header("apikey", &self.anon_key)
            .header("Prefer", "return=representation")
            .bearer_auth(access_token)
            .json(&serde_json::json!([row]))
            .send()
            .await
            .map_err(|error| InfraError::Store(format!("network error while inserting row: {error}")))?;

        let (status, body) = Self::read_body(response).await?;
        if !status.is_success() {
            return Err(Self::store_http_error(status, &body));
        }

        let mut rows = serde_json::from_str::<Vec<serde_json::Value>>(&body).map_err(|error| {
            InfraError::Store(format!("invalid insert payload: {error}; body={body}"))
        })?;
        if rows.is_empty() {
            return Err(InfraError::Store(
                "insert response did not include the stored row".to_string(),
            ));
        }
        Ok(rows.swap_remove(0))
    }

    async fn update(
        &self,
        access_token: &str,
        table: StoreTable,
        id: &str,
        patch: &serde_json::Value,
    ) -> Result<(), InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(id, "row id")?;

        let mut url = self.table_endpoint(table)?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{id}"));

        let response = self
            .client
            .patch(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .json(patch)
            .send()
            .await
            .map_err(|error| InfraError::Store(format!("network error while updating row: {error}")))?;

        let (status, body) = Self::read_body(response).await?;
        if !status.is_success() {
            return Err(Self::store_http_error(status, &body));
        }
        Ok(())
    }

    async fn delete(
        &self,
        access_token: &str,
        table: StoreTable,
        id: &str,
    ) -> Result<(), InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(id, "row id")?;

        let mut url = self.table_endpoint(table)?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{id}"));

        let response = self
            .client
            .delete(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| InfraError::Store(format!("network error while deleting row: {error}")))?;

        let (status, body) = Self::read_body(response).await?;
        if !status.is_success() {
            return Err(Self::store_http_error(status, &body));
        }
        Ok(())
    }

    async fn delete_all(
        &self,
        access_token: &str,
        table: StoreTable,
        owner_id: &str,
    ) -> Result<(), InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(owner_id, "owner id")?;

        let mut url = self.table_endpoint(table)?;
        url.query_pairs_mut()
            .append_pair("owner_id", &format!("eq.{owner_id}"));

        let response = self
            .client
            .delete(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| InfraError::Store(format!("network error while clearing rows: {error}")))?;

        let (status, body) = Self::read_body(response).await?;
        if !status.is_success() {
            return Err(Self::store_http_error(status, &body));
        }
        Ok(())
    }
}

/// In-memory stand-in for the remote store, keyed by table. Assigns row ids
/// the way the server would so insert flows can be exercised offline.
#[derive(Debug, Default)]
pub struct InMemoryRowStore {
    tables: Mutex<HashMap<StoreTable, Vec<serde_json::Value>>>,
    next_row_id: AtomicU64,
}

impl InMemoryRowStore {
    pub fn rows(&self, table: StoreTable) -> Vec<serde_json::Value> {
        self.tables
            .lock()
            .map(|tables| tables.get(&table).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    fn lock_tables(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<StoreTable, Vec<serde_json::Value>>>, InfraError>
    {
        self.tables
            .lock()
            .map_err(|error| InfraError::Store(format!("row store lock poisoned: {error}")))
    }

    fn row_id(row: &serde_json::Value) -> Option<&str> {
        row.get("id").and_then(serde_json::Value::as_str)
    }
}

#[async_trait]
impl RowStoreClient for InMemoryRowStore {
    async fn list(
        &self,
        _access_token: &str,
        table: StoreTable,
        owner_id: &str,
    ) -> Result<Vec<serde_json::Value>, InfraError> {
        let tables = self.lock_tables()?;
        Ok(tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| {
                        row.get("owner_id").and_then(serde_json::Value::as_str) == Some(owner_id)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(
        &self,
        _access_token: &str,
        table: StoreTable,
        row: &serde_json::Value,
    ) -> Result<serde_json::Value, InfraError> {
        let mut stored = row.clone();
        if Self::row_id(&stored).is_none() {
            let sequence = self.next_row_id.fetch_add(1, Ordering::Relaxed);
            if let Some(object) = stored.as_object_mut() {
                object.insert(
                    "id".to_string(),
                    serde_json::Value::String(format!("row-{sequence}")),
                );
            }
        }
        let mut tables = self.lock_tables()?;
        tables.entry(table).or_default().push(stored.clone());
        Ok(stored)
    }

    async fn update(
        &self,
        _access_token: &str,
        table: StoreTable,
        id: &str,
        patch: &serde_json::Value,
    ) -> Result<(), InfraError> {
        let mut tables = self.lock_tables()?;
        let Some(rows) = tables.get_mut(&table) else {
            return Ok(());
        };
        for row in rows.iter_mut() {
            if Self::row_id(row) != Some(id) {
                continue;
            }
            if let (Some(target), Some(fields)) = (row.as_object_mut(), patch.as_object()) {
                for (key, value) in fields {
                    target.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(())
    }

    async fn delete(
        &self,
        _access_token: &str,
        table: StoreTable,
        id: &str,
    ) -> Result<(), InfraError> {
        let mut tables = self.lock_tables()?;
        if let Some(rows) = tables.get_mut(&table) {
            rows.retain(|row| Self::row_id(row) != Some(id));
        }
        Ok(())
    }

    async fn delete_all(
        &self,
        _access_token: &str,
        table: StoreTable,
        owner_id: &str,
    ) -> Result<(), InfraError> {
        let mut tables = self.lock_tables()?;
        if let Some(rows) = tables.get_mut(&table) {
            rows.retain(|row| {
                row.get("owner_id").and_then(serde_json::Value::as_str) != Some(owner_id)
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_scopes_rows_by_owner() {
        let store = InMemoryRowStore::default();
        store
            .insert(
                "token",
                StoreTable::Tasks,
                &serde_json::json!({"owner_id": "user-1", "text": "a"}),
            )
            .await
            .expect("insert");
        store
            .insert(
                "token",
                StoreTable::Tasks,
                &serde_json::json!({"owner_id": "user-2", "text": "b"}),
            )
            .await
            .expect("insert");

        let rows = store
            .list("token", StoreTable::Tasks, "user-1")
            .await
            .expect("list");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["text"], "a");
        assert!(rows[0]["id"].as_str().expect("assigned id").starts_with("row-"));
    }

    #[tokio::test]
    async fn in_memory_store_update_merges_patch_fields() {
        let store = InMemoryRowStore::default();
        let inserted = store
            .insert(
                "token",
                StoreTable::Notes,
                &serde_json::json!({"owner_id": "user-1", "title": "old", "content": "body"}),
            )
            .await
            .expect("insert");
        let id = inserted["id"].as_str().expect("id").to_string();

        store
            .update(
                "token",
                StoreTable::Notes,
                &id,
                &serde_json::json!({"title": "new"}),
            )
            .await
            .expect("update");

        let rows = store
            .list("token", StoreTable::Notes, "user-1")
            .await
            .expect("list");
        assert_eq!(rows[0]["title"], "new");
        assert_eq!(rows[0]["content"], "body");
    }

    #[tokio::test]
    async fn in_memory_store_delete_and_clear() {
        let store = InMemoryRowStore::default();
        let first = store
            .insert(
                "token",
                StoreTable::Trashed,
                &serde_json::json!({"owner_id": "user-1", "text": "x"}),
            )
            .await
            .expect("insert");
        store
            .insert(
                "token",
                StoreTable::Trashed,
                &serde_json::json!({"owner_id": "user-1", "text": "y"}),
            )
            .await
            .expect("insert");

        store
            .delete("token", StoreTable::Trashed, first["id"].as_str().expect("id"))
            .await
            .expect("delete");
        assert_eq!(store.rows(StoreTable::Trashed).len(), 1);

        store
            .delete_all("token", StoreTable::Trashed, "user-1")
            .await
            .expect("clear");
        assert!(store.rows(StoreTable::Trashed).is_empty());
    }
}
