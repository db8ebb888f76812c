use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use bytes::Bytes;
use serde::Serialize;
use utoipa::ToSchema;

use crate::AppState;
use crate::api::error::AppError;
use crate::collaborators::AuthUser;
use crate::models::Pair;
use crate::services::UploadedFile;

const MAX_CAPTION_LEN: usize = 160;

#[derive(Serialize, ToSchema)]
pub struct PairCreatedResponse {
    #[serde(flatten)]
    pub pair: Pair,
    pub href: String,
}

#[utoipa::path(
    post,
    path = "/pairs",
    request_body(content = Multipart, description = "before and after photos, visibility, optional caption"),
    responses(
        (status = 201, description = "Pair published", body = PairCreatedResponse),
        (status = 400, description = "Missing a side, bad file, or missing visibility"),
        (status = 413, description = "A file exceeds the upload limit")
    ),
    security(("bearer_auth" = [])),
    tag = "pairs"
)]
pub async fn create_pair(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut caption: Option<String> = None;
    let mut is_public: Option<bool> = None;
    let mut before: Option<UploadedFile> = None;
    let mut after: Option<UploadedFile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {}", e)))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("caption") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                if value.chars().count() > MAX_CAPTION_LEN {
                    return Err(AppError::BadRequest(format!(
                        "caption is limited to {} characters",
                        MAX_CAPTION_LEN
                    )));
                }
                caption = Some(value);
            }
            Some("is_public") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                is_public = Some(value.parse::<bool>().map_err(|_| {
                    AppError::BadRequest("is_public must be true or false".to_string())
                })?);
            }
            Some(name @ ("before" | "after")) => {
                let slot = if name == "before" { &mut before } else { &mut after };
                let file_name = field.file_name().unwrap_or("photo").to_string();
                let bytes: Bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                *slot = Some(UploadedFile { file_name, bytes });
            }
            _ => {}
        }
    }

    let before = before.ok_or_else(|| AppError::BadRequest("missing file: before".to_string()))?;
    let after = after.ok_or_else(|| AppError::BadRequest("missing file: after".to_string()))?;
    // Visibility is always an explicit choice, never a default.
    let is_public =
        is_public.ok_or_else(|| AppError::BadRequest("missing field: is_public".to_string()))?;

    let pair = state
        .publisher
        .create_pair(&user.id, caption, is_public, before, after)
        .await?;

    let href = format!(
        "{}/p/{}",
        state.config.site_origin.trim_end_matches('/'),
        pair.id
    );
    Ok((StatusCode::CREATED, Json(PairCreatedResponse { pair, href })))
}

#[utoipa::path(
    delete,
    path = "/pairs/{id}",
    params(("id" = i64, Path, description = "Pair id")),
    responses(
        (status = 204, description = "Pair and both photos deleted"),
        (status = 404, description = "Not found or not owned by the caller")
    ),
    security(("bearer_auth" = [])),
    tag = "pairs"
)]
pub async fn delete_pair(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.publisher.delete_pair(&user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
