use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{
        HeaderMap, StatusCode,
        header::{HeaderName, HeaderValue},
    },
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::AppState;
use crate::api::error::AppError;
use crate::collaborators::AuthUser;
use crate::services::BucketClass;
use crate::services::feed::FeedPage;

#[derive(Deserialize)]
pub struct FeedParams {
    /// Case-insensitive caption filter
    pub q: Option<String>,
    /// Opaque cursor from the previous page
    pub cursor: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct RefreshParams {
    pub scope: String,
    pub path: String,
}

/// Share and pair pages are public but unlisted; keep crawlers away.
fn noindex() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("x-robots-tag"),
        HeaderValue::from_static("noindex"),
    );
    headers
}

#[utoipa::path(
    get,
    path = "/community",
    params(
        ("q" = Option<String>, Query, description = "Caption filter"),
        ("cursor" = Option<String>, Query, description = "Cursor from the previous page")
    ),
    responses((status = 200, description = "One feed page", body = FeedPage)),
    tag = "community"
)]
pub async fn community_feed(
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> Result<Json<FeedPage>, AppError> {
    let filter = params.q.map(|q| q.trim().to_string()).filter(|q| !q.is_empty());
    Ok(Json(state.feed.fetch_page(filter, params.cursor).await?))
}

#[utoipa::path(
    get,
    path = "/s/{slug}",
    params(("slug" = String, Path, description = "Share slug")),
    responses(
        (status = 200, description = "Public share page data", body = ShareView),
        (status = 404, description = "Unknown slug or withdrawn share")
    ),
    tag = "community"
)]
pub async fn share_page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let share = match state.store.find_public_share_by_slug(&slug).await? {
        Some(share) => share,
        None => return Ok(not_found("this share is no longer available")),
    };

    let image_url = state.resolver.public_url(&share.media_path);
    let view = state.feed.share_view(share, image_url);
    Ok((noindex(), Json(view)).into_response())
}

#[utoipa::path(
    get,
    path = "/p/{id}",
    params(("id" = String, Path, description = "Numeric pair id")),
    responses(
        (status = 200, description = "Public pair page data", body = PairView),
        (status = 404, description = "Unknown, non-numeric, or private pair")
    ),
    tag = "community"
)]
pub async fn pair_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    // A non-numeric id is indistinguishable from an unknown one.
    let id: i64 = match id.parse() {
        Ok(id) => id,
        Err(_) => return Ok(not_found("this post is no longer available")),
    };

    let pair = match state.store.get_pair(id).await? {
        Some(pair) if pair.is_public => pair,
        _ => return Ok(not_found("this post is no longer available")),
    };

    let view = state.feed.pair_view(pair).await;
    Ok((noindex(), Json(view)).into_response())
}

fn not_found(message: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        noindex(),
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

#[utoipa::path(
    get,
    path = "/media/refresh",
    params(
        ("scope" = String, Query, description = "public or private"),
        ("path" = String, Query, description = "Stored media path")
    ),
    responses(
        (status = 200, description = "Fresh display URL"),
        (status = 404, description = "Path could not be signed")
    ),
    security(("bearer_auth" = [])),
    tag = "community"
)]
pub async fn refresh_media_url(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<RefreshParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let class = match params.scope.as_str() {
        "public" => BucketClass::Public,
        "private" => BucketClass::Private,
        other => {
            return Err(AppError::BadRequest(format!("unknown scope: {}", other)));
        }
    };

    // Private paths are owner-prefixed; refuse to sign someone else's.
    if class == BucketClass::Private && !params.path.starts_with(&format!("{}/", user.id)) {
        return Err(AppError::NotFound("object not found".to_string()));
    }

    let url = state
        .resolver
        .refresh(class, &params.path)
        .await
        .ok_or_else(|| AppError::NotFound("object not found".to_string()))?;
    Ok(Json(serde_json::json!({ "url": url })))
}
