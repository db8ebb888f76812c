//! The community feed: merges public single-image shares and before/after
//! pairs into one reverse-chronological stream with cursor pagination.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::collaborators::{FeedQuery, StoreError, VaultStore};
use crate::config::AppConfig;
use crate::models::{Pair, Share};
use crate::services::resolver::{DisplayResolver, UrlContext};

/// Attribution shown under a shared image, filtered to safe link schemes.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Attribution {
    pub name: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedItem {
    Single {
        slug: String,
        caption: Option<String>,
        created_at: DateTime<Utc>,
        image_url: String,
        attribution: Option<Attribution>,
        /// Shareable page link, `{origin}/s/{slug}`
        href: String,
    },
    Pair {
        id: i64,
        caption: Option<String>,
        created_at: DateTime<Utc>,
        before_url: Option<String>,
        after_url: Option<String>,
        /// Shareable page link, `{origin}/p/{id}`
        href: String,
    },
}

impl FeedItem {
    fn created_at(&self) -> DateTime<Utc> {
        match self {
            FeedItem::Single { created_at, .. } => *created_at,
            FeedItem::Pair { created_at, .. } => *created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FeedPage {
    pub items: Vec<FeedItem>,
    /// Pass back as `cursor` to fetch the next page
    pub next_cursor: Option<DateTime<Utc>>,
    /// True once no further page can contain items
    pub exhausted: bool,
}

pub struct FeedService {
    store: Arc<dyn VaultStore>,
    resolver: Arc<DisplayResolver>,
    page_size: usize,
    per_source_limit: usize,
    site_origin: String,
}

impl FeedService {
    pub fn new(
        store: Arc<dyn VaultStore>,
        resolver: Arc<DisplayResolver>,
        config: &AppConfig,
    ) -> Self {
        Self {
            store,
            resolver,
            page_size: config.page_size,
            per_source_limit: config.per_source_limit,
            site_origin: config.site_origin.trim_end_matches('/').to_string(),
        }
    }

    pub async fn fetch_page(
        &self,
        filter: Option<String>,
        cursor: Option<DateTime<Utc>>,
    ) -> Result<FeedPage, StoreError> {
        let query = FeedQuery {
            filter,
            before: cursor,
            limit: self.per_source_limit,
        };

        let (shares, pairs) = tokio::join!(
            self.store.public_shares(&query),
            self.store.public_pairs(&query),
        );
        let shares = shares?;
        let pairs = pairs?;
        let sources_empty = shares.is_empty() && pairs.is_empty();

        // One signing round trip covers every pair image on the page.
        let pair_paths: Vec<String> = pairs
            .iter()
            .flat_map(|p| [p.before_path.clone(), p.after_path.clone()])
            .collect();
        let signed = self
            .resolver
            .resolve_batch(&pair_paths, UrlContext::Feed)
            .await;

        let mut items: Vec<FeedItem> = Vec::with_capacity(shares.len() + pairs.len());
        for share in shares {
            items.push(self.single_item(share));
        }
        for pair in pairs {
            items.push(FeedItem::Pair {
                href: format!("{}/p/{}", self.site_origin, pair.id),
                id: pair.id,
                caption: pair.caption,
                created_at: pair.created_at,
                before_url: signed.get(&pair.before_path).cloned(),
                after_url: signed.get(&pair.after_path).cloned(),
            });
        }

        items.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        items.truncate(self.page_size);

        let next_cursor = items.iter().map(|i| i.created_at()).min().or(cursor);
        let exhausted = sources_empty || items.is_empty();

        Ok(FeedPage {
            items,
            next_cursor,
            exhausted,
        })
    }

    fn single_item(&self, share: Share) -> FeedItem {
        let image_url = self.resolver.public_url(&share.media_path);
        let attribution = attribution_for(&share);
        FeedItem::Single {
            href: format!("{}/s/{}", self.site_origin, share.slug),
            slug: share.slug,
            caption: share.caption,
            created_at: share.created_at,
            image_url,
            attribution,
        }
    }
}

/// Attribution for a share, honoring the owner's visibility toggle and
/// dropping URLs with unsafe schemes.
pub fn attribution_for(share: &Share) -> Option<Attribution> {
    if !share.show_attribution {
        return None;
    }
    let name = share.attribution_name.clone()?;
    if name.trim().is_empty() {
        return None;
    }
    let url = share
        .attribution_url
        .clone()
        .filter(|u| is_safe_link(u));
    Some(Attribution { name, url })
}

/// Only plain web and mail links survive into rendered attribution.
fn is_safe_link(raw: &str) -> bool {
    match url::Url::parse(raw) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https" | "mailto"),
        Err(_) => false,
    }
}

/// Detail payload for a pair page.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PairView {
    pub id: i64,
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
    pub before_url: Option<String>,
    pub after_url: Option<String>,
    pub href: String,
}

/// Detail payload for a single-share page.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ShareView {
    pub slug: String,
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
    pub image_url: String,
    pub attribution: Option<Attribution>,
    pub href: String,
}

impl FeedService {
    /// Public share detail, used by `/s/:slug`.
    pub fn share_view(&self, share: Share, image_url: String) -> ShareView {
        let attribution = attribution_for(&share);
        ShareView {
            href: format!("{}/s/{}", self.site_origin, share.slug),
            slug: share.slug,
            caption: share.caption,
            created_at: share.created_at,
            image_url,
            attribution,
        }
    }

    /// Public pair detail, used by `/p/:id`.
    pub async fn pair_view(&self, pair: Pair) -> PairView {
        let signed = self
            .resolver
            .resolve_batch(
                &[pair.before_path.clone(), pair.after_path.clone()],
                UrlContext::Feed,
            )
            .await;
        PairView {
            href: format!("{}/p/{}", self.site_origin, pair.id),
            id: pair.id,
            caption: pair.caption,
            created_at: pair.created_at,
            before_url: signed.get(&pair.before_path).cloned(),
            after_url: signed.get(&pair.after_path).cloned(),
        }
    }
}
