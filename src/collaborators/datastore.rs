use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::models::{
    Entry, NewEntry, NewPair, NewProject, NewShare, Pair, Project, Share,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("row not found")]
    NotFound,

    /// Unique-constraint violation; the machine-checkable signal consumed
    /// by the slug retry.
    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error("datastore request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Request(e.to_string())
    }
}

/// Parameters shared by the two public feed queries.
#[derive(Debug, Clone, Default)]
pub struct FeedQuery {
    /// Case-insensitive substring match on caption
    pub filter: Option<String>,
    /// Strict upper bound on creation time (cursor pagination)
    pub before: Option<DateTime<Utc>>,
    pub limit: usize,
}

/// Typed operations against the hosted relational store. Row-level
/// authorization lives with the collaborator; owner-scoped methods restate
/// it as explicit owner filters since the server holds a trusted key.
#[async_trait]
pub trait VaultStore: Send + Sync {
    async fn insert_project(&self, row: NewProject) -> Result<Project, StoreError>;
    async fn list_projects(&self, owner_id: &str) -> Result<Vec<Project>, StoreError>;
    async fn get_project(&self, owner_id: &str, id: &str) -> Result<Option<Project>, StoreError>;

    async fn insert_entry(&self, row: NewEntry) -> Result<Entry, StoreError>;
    /// Entries for a project, oldest first (journal order).
    async fn list_entries(&self, project_id: &str) -> Result<Vec<Entry>, StoreError>;
    async fn get_entry(&self, id: &str) -> Result<Option<Entry>, StoreError>;
    async fn delete_entry(&self, id: &str) -> Result<(), StoreError>;

    async fn insert_share(&self, row: NewShare) -> Result<Share, StoreError>;
    async fn list_shares(&self, owner_id: &str) -> Result<Vec<Share>, StoreError>;
    async fn get_share(&self, owner_id: &str, id: &str) -> Result<Option<Share>, StoreError>;
    async fn find_public_share_by_slug(&self, slug: &str) -> Result<Option<Share>, StoreError>;
    async fn set_share_visibility(&self, id: &str, is_public: bool) -> Result<(), StoreError>;
    async fn delete_share(&self, id: &str) -> Result<(), StoreError>;

    async fn insert_pair(&self, row: NewPair) -> Result<Pair, StoreError>;
    async fn get_pair(&self, id: i64) -> Result<Option<Pair>, StoreError>;
    async fn delete_pair(&self, id: i64) -> Result<(), StoreError>;

    async fn public_shares(&self, query: &FeedQuery) -> Result<Vec<Share>, StoreError>;
    async fn public_pairs(&self, query: &FeedQuery) -> Result<Vec<Pair>, StoreError>;
}

/// PostgREST client for the hosted store.
pub struct HostedStore {
    base_url: String,
    service_key: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct PgError {
    code: Option<String>,
    message: Option<String>,
}

impl HostedStore {
    pub fn new(base_url: &str, service_key: &str, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
            http,
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", &self.service_key))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if let Ok(err) = serde_json::from_str::<PgError>(&body) {
            // 23505 = Postgres unique_violation
            if err.code.as_deref() == Some("23505") || status == reqwest::StatusCode::CONFLICT {
                return Err(StoreError::Conflict(err.message.unwrap_or(body)));
            }
        }
        Err(StoreError::Request(format!("{}: {}", status, body)))
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, StoreError> {
        let response = self
            .authed(self.http.get(self.table_url(table)))
            .query(params)
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json::<Vec<T>>().await?)
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        params: &[(&str, String)],
    ) -> Result<Option<T>, StoreError> {
        let mut params = params.to_vec();
        params.push(("limit", "1".to_string()));
        let mut rows = self.select::<T>(table, &params).await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    async fn insert<R: serde::Serialize, T: DeserializeOwned>(
        &self,
        table: &str,
        row: &R,
    ) -> Result<T, StoreError> {
        let response = self
            .authed(self.http.post(self.table_url(table)))
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await?;
        let response = Self::check(response).await?;
        let mut rows = response.json::<Vec<T>>().await?;
        if rows.is_empty() {
            return Err(StoreError::Request(format!(
                "insert into {} returned no representation",
                table
            )));
        }
        Ok(rows.swap_remove(0))
    }

    async fn delete_where(&self, table: &str, params: &[(&str, String)]) -> Result<(), StoreError> {
        let response = self
            .authed(self.http.delete(self.table_url(table)))
            .query(params)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    fn feed_params(query: &FeedQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("is_public", "eq.true".to_string()),
            ("order", "created_at.desc".to_string()),
            ("limit", query.limit.to_string()),
        ];
        if let Some(term) = &query.filter {
            params.push(("caption", format!("ilike.*{}*", term)));
        }
        if let Some(cursor) = query.before {
            params.push(("created_at", format!("lt.{}", cursor.to_rfc3339())));
        }
        params
    }
}

#[async_trait]
impl VaultStore for HostedStore {
    async fn insert_project(&self, row: NewProject) -> Result<Project, StoreError> {
        self.insert("projects", &row).await
    }

    async fn list_projects(&self, owner_id: &str) -> Result<Vec<Project>, StoreError> {
        self.select(
            "projects",
            &[
                ("owner_id", format!("eq.{}", owner_id)),
                ("order", "created_at.desc".to_string()),
            ],
        )
        .await
    }

    async fn get_project(&self, owner_id: &str, id: &str) -> Result<Option<Project>, StoreError> {
        self.select_one(
            "projects",
            &[
                ("id", format!("eq.{}", id)),
                ("owner_id", format!("eq.{}", owner_id)),
            ],
        )
        .await
    }

    async fn insert_entry(&self, row: NewEntry) -> Result<Entry, StoreError> {
        self.insert("entries", &row).await
    }

    async fn list_entries(&self, project_id: &str) -> Result<Vec<Entry>, StoreError> {
        self.select(
            "entries",
            &[
                ("project_id", format!("eq.{}", project_id)),
                ("order", "taken_at.asc".to_string()),
            ],
        )
        .await
    }

    async fn get_entry(&self, id: &str) -> Result<Option<Entry>, StoreError> {
        self.select_one("entries", &[("id", format!("eq.{}", id))])
            .await
    }

    async fn delete_entry(&self, id: &str) -> Result<(), StoreError> {
        self.delete_where("entries", &[("id", format!("eq.{}", id))])
            .await
    }

    async fn insert_share(&self, row: NewShare) -> Result<Share, StoreError> {
        self.insert("shares", &row).await
    }

    async fn list_shares(&self, owner_id: &str) -> Result<Vec<Share>, StoreError> {
        self.select(
            "shares",
            &[
                ("user_id", format!("eq.{}", owner_id)),
                ("order", "created_at.desc".to_string()),
            ],
        )
        .await
    }

    async fn get_share(&self, owner_id: &str, id: &str) -> Result<Option<Share>, StoreError> {
        self.select_one(
            "shares",
            &[
                ("id", format!("eq.{}", id)),
                ("user_id", format!("eq.{}", owner_id)),
            ],
        )
        .await
    }

    async fn find_public_share_by_slug(&self, slug: &str) -> Result<Option<Share>, StoreError> {
        self.select_one(
            "shares",
            &[
                ("slug", format!("eq.{}", slug)),
                ("is_public", "eq.true".to_string()),
            ],
        )
        .await
    }

    async fn set_share_visibility(&self, id: &str, is_public: bool) -> Result<(), StoreError> {
        let response = self
            .authed(self.http.patch(self.table_url("shares")))
            .query(&[("id", format!("eq.{}", id))])
            .json(&serde_json::json!({ "is_public": is_public }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn delete_share(&self, id: &str) -> Result<(), StoreError> {
        self.delete_where("shares", &[("id", format!("eq.{}", id))])
            .await
    }

    async fn insert_pair(&self, row: NewPair) -> Result<Pair, StoreError> {
        self.insert("before_after_pairs", &row).await
    }

    async fn get_pair(&self, id: i64) -> Result<Option<Pair>, StoreError> {
        self.select_one("before_after_pairs", &[("id", format!("eq.{}", id))])
            .await
    }

    async fn delete_pair(&self, id: i64) -> Result<(), StoreError> {
        self.delete_where("before_after_pairs", &[("id", format!("eq.{}", id))])
            .await
    }

    async fn public_shares(&self, query: &FeedQuery) -> Result<Vec<Share>, StoreError> {
        self.select("shares", &Self::feed_params(query)).await
    }

    async fn public_pairs(&self, query: &FeedQuery) -> Result<Vec<Pair>, StoreError> {
        self.select("before_after_pairs", &Self::feed_params(query))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_params_apply_filter_and_cursor() {
        let cursor = Utc::now();
        let query = FeedQuery {
            filter: Some("kitchen".to_string()),
            before: Some(cursor),
            limit: 24,
        };
        let params = HostedStore::feed_params(&query);

        assert!(params.contains(&("is_public", "eq.true".to_string())));
        assert!(params.contains(&("caption", "ilike.*kitchen*".to_string())));
        assert!(params.contains(&("created_at", format!("lt.{}", cursor.to_rfc3339()))));
    }

    #[test]
    fn feed_params_omit_optional_clauses() {
        let params = HostedStore::feed_params(&FeedQuery {
            filter: None,
            before: None,
            limit: 8,
        });
        assert_eq!(params.len(), 3);
        assert!(params.contains(&("limit", "8".to_string())));
    }
}
