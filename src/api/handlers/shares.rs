use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::AppState;
use crate::api::error::AppError;
use crate::collaborators::AuthUser;
use crate::models::Share;

/// A share as the owner sees it: row fields plus display and page links.
#[derive(Serialize, ToSchema)]
pub struct OwnedShareView {
    #[serde(flatten)]
    pub share: Share,
    pub image_url: String,
    pub href: String,
}

#[utoipa::path(
    get,
    path = "/my-shares",
    responses((status = 200, description = "Caller's shares, newest first", body = [OwnedShareView])),
    security(("bearer_auth" = [])),
    tag = "shares"
)]
pub async fn list_my_shares(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<OwnedShareView>>, AppError> {
    let origin = state.config.site_origin.trim_end_matches('/').to_string();
    let shares = state.store.list_shares(&user.id).await?;

    let views = shares
        .into_iter()
        .map(|share| OwnedShareView {
            image_url: state.resolver.public_url(&share.media_path),
            href: format!("{}/s/{}", origin, share.slug),
            share,
        })
        .collect();
    Ok(Json(views))
}

#[utoipa::path(
    post,
    path = "/shares/{id}/unshare",
    params(("id" = String, Path, description = "Share id")),
    responses(
        (status = 204, description = "Share withdrawn from the community"),
        (status = 404, description = "Not found or not owned by the caller")
    ),
    security(("bearer_auth" = [])),
    tag = "shares"
)]
pub async fn unshare(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.publisher.unshare(&user.id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/shares/{id}",
    params(("id" = String, Path, description = "Share id")),
    responses(
        (status = 204, description = "Share and its public image deleted"),
        (status = 404, description = "Not found or not owned by the caller")
    ),
    security(("bearer_auth" = [])),
    tag = "shares"
)]
pub async fn delete_share(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.publisher.delete_share(&user.id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
