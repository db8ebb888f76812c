use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use thiserror::Error;

const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode a storage path, keeping `/` separators intact.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|seg| utf8_percent_encode(seg, PATH_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("storage request failed: {0}")]
    Request(String),

    #[error("signing failed for {path}: {message}")]
    Signing { path: String, message: String },
}

impl From<reqwest::Error> for StorageError {
    fn from(e: reqwest::Error) -> Self {
        StorageError::Request(e.to_string())
    }
}

/// Bucket-scoped object storage. Public buckets are readable by path alone;
/// private buckets only through time-limited signed URLs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Deterministic world-readable URL. Existence is not verified.
    fn public_url(&self, bucket: &str, path: &str) -> String;

    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        ttl_secs: u32,
    ) -> Result<String, StorageError>;

    /// Batch variant; result order matches `paths`, `None` per path that
    /// could not be signed.
    async fn create_signed_urls(
        &self,
        bucket: &str,
        paths: &[String],
        ttl_secs: u32,
    ) -> Result<Vec<Option<String>>, StorageError>;

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: &str,
        overwrite: bool,
    ) -> Result<(), StorageError>;

    /// Fetch object bytes. Implementations over hosted storage must not
    /// require the bucket to be world-readable.
    async fn download(&self, bucket: &str, path: &str) -> Result<Bytes, StorageError>;

    /// Remove objects; paths that do not exist count as removed.
    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), StorageError>;
}

/// Storage REST client for the hosted service.
pub struct HostedStorage {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl HostedStorage {
    pub fn new(base_url: &str, api_key: &str, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http,
        }
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            bucket,
            encode_path(path)
        )
    }
}

#[derive(Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

#[derive(Deserialize)]
struct BatchSignedUrlEntry {
    #[serde(rename = "signedURL")]
    signed_url: Option<String>,
    error: Option<String>,
}

#[async_trait]
impl ObjectStore for HostedStorage {
    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            bucket,
            encode_path(path)
        )
    }

    async fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        ttl_secs: u32,
    ) -> Result<String, StorageError> {
        let url = format!(
            "{}/storage/v1/object/sign/{}/{}",
            self.base_url,
            bucket,
            encode_path(path)
        );

        let response = self
            .http
            .post(&url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", &self.api_key))
            .json(&serde_json::json!({ "expiresIn": ttl_secs }))
            .send()
            .await?;

        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StorageError::Signing {
                path: path.to_string(),
                message,
            });
        }

        let signed = response.json::<SignedUrlResponse>().await?;
        Ok(format!("{}{}", self.base_url, signed.signed_url))
    }

    async fn create_signed_urls(
        &self,
        bucket: &str,
        paths: &[String],
        ttl_secs: u32,
    ) -> Result<Vec<Option<String>>, StorageError> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/storage/v1/object/sign/{}", self.base_url, bucket);
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", &self.api_key))
            .json(&serde_json::json!({ "expiresIn": ttl_secs, "paths": paths }))
            .send()
            .await?;

        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StorageError::Request(message));
        }

        let entries = response.json::<Vec<BatchSignedUrlEntry>>().await?;
        Ok(entries
            .into_iter()
            .map(|e| match (e.signed_url, e.error) {
                (Some(u), None) => Some(format!("{}{}", self.base_url, u)),
                _ => None,
            })
            .collect())
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: &str,
        overwrite: bool,
    ) -> Result<(), StorageError> {
        let response = self
            .http
            .post(self.object_url(bucket, path))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", &self.api_key))
            .header("Content-Type", content_type)
            .header("x-upsert", if overwrite { "true" } else { "false" })
            .body(data)
            .send()
            .await?;

        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StorageError::Request(format!(
                "upload {}/{} failed: {}",
                bucket, path, message
            )));
        }
        Ok(())
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Bytes, StorageError> {
        // The private bucket is never world-readable: mint a short-lived
        // signed URL and fetch through it.
        let signed = self.create_signed_url(bucket, path, 60).await?;
        let response = self.http.get(&signed).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(format!("{}/{}", bucket, path)));
        }
        if !response.status().is_success() {
            return Err(StorageError::Request(format!(
                "download {}/{} failed with status {}",
                bucket,
                path,
                response.status()
            )));
        }
        Ok(response.bytes().await?)
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), StorageError> {
        if paths.is_empty() {
            return Ok(());
        }

        let url = format!("{}/storage/v1/object/{}", self.base_url, bucket);
        let response = self
            .http
            .delete(&url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", &self.api_key))
            .json(&serde_json::json!({ "prefixes": paths }))
            .send()
            .await?;

        // A missing object is already in the desired state.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StorageError::Request(format!(
                "remove from {} failed: {}",
                bucket, message
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_url_is_deterministic() {
        let storage = HostedStorage::new(
            "https://example.test/",
            "anon",
            reqwest::Client::new(),
        );
        let url = storage.public_url("community", "user-1/entry-2.jpg");
        assert_eq!(
            url,
            "https://example.test/storage/v1/object/public/community/user-1/entry-2.jpg"
        );
    }

    #[test]
    fn encode_path_keeps_separators() {
        assert_eq!(encode_path("a/b c/d"), "a/b%20c/d");
    }
}
