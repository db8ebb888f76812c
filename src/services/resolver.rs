//! Turns stored media paths into displayable URLs. Public-bucket paths map
//! to deterministic public URLs; private-bucket paths get signed URLs whose
//! lifetime depends on where the image is being shown.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::collaborators::ObjectStore;
use crate::config::AppConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketClass {
    Public,
    Private,
}

/// Display context controlling signed-URL lifetime: long-lived for feed
/// and detail pages, short-lived while the owner is actively editing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlContext {
    Feed,
    Editing,
}

pub struct DisplayResolver {
    storage: Arc<dyn ObjectStore>,
    public_bucket: String,
    private_bucket: String,
    feed_ttl_secs: u32,
    edit_ttl_secs: u32,
}

impl DisplayResolver {
    pub fn new(storage: Arc<dyn ObjectStore>, config: &AppConfig) -> Self {
        Self {
            storage,
            public_bucket: config.public_bucket.clone(),
            private_bucket: config.private_bucket.clone(),
            feed_ttl_secs: config.signed_url_ttl_secs,
            edit_ttl_secs: config.edit_signed_url_ttl_secs,
        }
    }

    fn bucket(&self, class: BucketClass) -> &str {
        match class {
            BucketClass::Public => &self.public_bucket,
            BucketClass::Private => &self.private_bucket,
        }
    }

    fn ttl(&self, context: UrlContext) -> u32 {
        match context {
            UrlContext::Feed => self.feed_ttl_secs,
            UrlContext::Editing => self.edit_ttl_secs,
        }
    }

    /// Resolve one path. A signing failure degrades that image to `None`
    /// rather than failing the whole page.
    pub async fn resolve(
        &self,
        class: BucketClass,
        path: &str,
        context: UrlContext,
    ) -> Option<String> {
        match class {
            BucketClass::Public => Some(self.storage.public_url(&self.public_bucket, path)),
            BucketClass::Private => {
                match self
                    .storage
                    .create_signed_url(&self.private_bucket, path, self.ttl(context))
                    .await
                {
                    Ok(url) => Some(url),
                    Err(err) => {
                        tracing::warn!(path, error = %err, "could not sign media path");
                        None
                    }
                }
            }
        }
    }

    /// Resolve many private paths with a single signing round trip. Paths
    /// that fail to sign are absent from the returned map.
    pub async fn resolve_batch(
        &self,
        paths: &[String],
        context: UrlContext,
    ) -> HashMap<String, String> {
        if paths.is_empty() {
            return HashMap::new();
        }

        match self
            .storage
            .create_signed_urls(&self.private_bucket, paths, self.ttl(context))
            .await
        {
            Ok(urls) => paths
                .iter()
                .zip(urls)
                .filter_map(|(path, url)| url.map(|u| (path.clone(), u)))
                .collect(),
            Err(err) => {
                tracing::warn!(count = paths.len(), error = %err, "batch signing failed");
                HashMap::new()
            }
        }
    }

    /// Mint a fresh short-lived URL for an image that failed to load,
    /// with a cache-busting parameter so stale browser caches are skipped.
    pub async fn refresh(&self, class: BucketClass, path: &str) -> Option<String> {
        let url = match class {
            BucketClass::Public => Some(self.storage.public_url(&self.public_bucket, path)),
            BucketClass::Private => self.resolve(class, path, UrlContext::Editing).await,
        }?;

        let sep = if url.contains('?') { '&' } else { '?' };
        Some(format!("{}{}rb={}", url, sep, Utc::now().timestamp_millis()))
    }

    /// Deterministic URL for a public-bucket path, no signing involved.
    pub fn public_url(&self, path: &str) -> String {
        self.storage.public_url(&self.public_bucket, path)
    }

    pub fn bucket_name(&self, class: BucketClass) -> &str {
        self.bucket(class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::MemoryStorage;
    use bytes::Bytes;

    async fn resolver_with_object(path: &str) -> DisplayResolver {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .upload("media", path, Bytes::from_static(b"img"), "image/jpeg", false)
            .await
            .unwrap();
        DisplayResolver::new(storage, &AppConfig::development())
    }

    #[tokio::test]
    async fn public_paths_resolve_without_signing() {
        let storage = Arc::new(MemoryStorage::new());
        let resolver = DisplayResolver::new(storage, &AppConfig::development());
        let url = resolver
            .resolve(BucketClass::Public, "u1/share.jpg", UrlContext::Feed)
            .await
            .unwrap();
        assert_eq!(url, "memory://public/community/u1/share.jpg");
    }

    #[tokio::test]
    async fn private_paths_use_context_ttl() {
        let resolver = resolver_with_object("u1/p/photo.jpg").await;
        let feed = resolver
            .resolve(BucketClass::Private, "u1/p/photo.jpg", UrlContext::Feed)
            .await
            .unwrap();
        let edit = resolver
            .resolve(BucketClass::Private, "u1/p/photo.jpg", UrlContext::Editing)
            .await
            .unwrap();
        assert!(feed.contains("exp=604800"));
        assert!(edit.contains("exp=3600"));
    }

    #[tokio::test]
    async fn signing_failure_degrades_to_none() {
        let storage = Arc::new(MemoryStorage::new());
        let resolver = DisplayResolver::new(storage, &AppConfig::development());
        let url = resolver
            .resolve(BucketClass::Private, "u1/missing.jpg", UrlContext::Feed)
            .await;
        assert!(url.is_none());
    }

    #[tokio::test]
    async fn batch_skips_unsignable_paths() {
        let resolver = resolver_with_object("u1/a.jpg").await;
        let urls = resolver
            .resolve_batch(
                &["u1/a.jpg".to_string(), "u1/missing.jpg".to_string()],
                UrlContext::Feed,
            )
            .await;
        assert!(urls.contains_key("u1/a.jpg"));
        assert!(!urls.contains_key("u1/missing.jpg"));
    }

    #[tokio::test]
    async fn refresh_appends_cache_buster() {
        let resolver = resolver_with_object("u1/a.jpg").await;
        let url = resolver
            .refresh(BucketClass::Private, "u1/a.jpg")
            .await
            .unwrap();
        assert!(url.contains("rb="));
    }
}
