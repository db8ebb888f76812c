use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::AppState;
use crate::api::error::AppError;
use crate::collaborators::AuthUser;
use crate::models::{Category, Entry, EntryKind, Project, Share};
use crate::services::{BucketClass, NewShareRequest, UploadedFile, UrlContext};

// ── Request / Response Types ──────────────────────────────────────────

#[derive(Deserialize, Validate, ToSchema)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 80))]
    pub title: String,
    pub category: Category,
}

/// An entry plus a display URL for its photo, signed for active editing.
#[derive(Serialize, ToSchema)]
pub struct EntryView {
    #[serde(flatten)]
    pub entry: Entry,
    pub media_url: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub entries: Vec<EntryView>,
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct ShareEntryRequest {
    #[validate(length(max = 160, message = "caption is limited to 160 characters"))]
    pub caption: Option<String>,
    #[validate(length(max = 80))]
    pub attribution_name: Option<String>,
    #[validate(url)]
    pub attribution_url: Option<String>,
    #[serde(default)]
    pub show_attribution: bool,
}

/// The created share plus the copyable page link.
#[derive(Serialize, ToSchema)]
pub struct ShareCreatedResponse {
    #[serde(flatten)]
    pub share: Share,
    pub href: String,
}

async fn entry_view(state: &AppState, entry: Entry) -> EntryView {
    let media_url = match &entry.media_path {
        Some(path) => {
            state
                .resolver
                .resolve(BucketClass::Private, path, UrlContext::Editing)
                .await
        }
        None => None,
    };
    EntryView { entry, media_url }
}

// ── Handlers ──────────────────────────────────────────────────────────

#[utoipa::path(
    get,
    path = "/projects",
    responses((status = 200, description = "Caller's projects, newest first", body = [Project])),
    security(("bearer_auth" = [])),
    tag = "projects"
)]
pub async fn list_projects(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Project>>, AppError> {
    Ok(Json(state.store.list_projects(&user.id).await?))
}

#[utoipa::path(
    post,
    path = "/projects",
    request_body = CreateProjectRequest,
    responses((status = 201, description = "Project created", body = Project)),
    security(("bearer_auth" = [])),
    tag = "projects"
)]
pub async fn create_project(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateProjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let project = state
        .publisher
        .create_project(&user.id, body.title, body.category)
        .await?;
    Ok((StatusCode::CREATED, Json(project)))
}

#[utoipa::path(
    get,
    path = "/projects/{id}",
    params(("id" = String, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project with entries in journal order", body = ProjectDetail),
        (status = 404, description = "Not found or not owned by the caller")
    ),
    security(("bearer_auth" = [])),
    tag = "projects"
)]
pub async fn get_project(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<ProjectDetail>, AppError> {
    let project = state
        .store
        .get_project(&user.id, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("project not found".to_string()))?;

    let rows = state.store.list_entries(&project.id).await?;
    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        entries.push(entry_view(&state, row).await);
    }
    Ok(Json(ProjectDetail { project, entries }))
}

#[utoipa::path(
    post,
    path = "/projects/{id}/entries",
    params(("id" = String, Path, description = "Project id")),
    request_body(content = Multipart, description = "kind, optional note, optional photo"),
    responses(
        (status = 201, description = "Entry created", body = EntryView),
        (status = 400, description = "Missing note and photo, or unsupported file"),
        (status = 413, description = "File exceeds the upload limit")
    ),
    security(("bearer_auth" = [])),
    tag = "projects"
)]
pub async fn create_entry(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<String>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut kind: Option<EntryKind> = None;
    let mut note: Option<String> = None;
    let mut file: Option<UploadedFile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {}", e)))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("kind") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                kind = Some(parse_kind(&value)?);
            }
            Some("note") => {
                note = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(e.to_string()))?,
                );
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or("photo").to_string();
                let bytes: Bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                file = Some(UploadedFile { file_name, bytes });
            }
            _ => {}
        }
    }

    let kind = kind.ok_or_else(|| AppError::BadRequest("missing field: kind".to_string()))?;
    let entry = state
        .publisher
        .create_entry(&user.id, &project_id, kind, note, file)
        .await?;
    Ok((StatusCode::CREATED, Json(entry_view(&state, entry).await)))
}

fn parse_kind(value: &str) -> Result<EntryKind, AppError> {
    match value {
        "before" => Ok(EntryKind::Before),
        "update" => Ok(EntryKind::Update),
        "after" => Ok(EntryKind::After),
        other => Err(AppError::BadRequest(format!("unknown entry kind: {}", other))),
    }
}

#[utoipa::path(
    delete,
    path = "/entries/{id}",
    params(("id" = String, Path, description = "Entry id")),
    responses(
        (status = 204, description = "Entry and photo deleted"),
        (status = 404, description = "Not found or not owned by the caller")
    ),
    security(("bearer_auth" = [])),
    tag = "projects"
)]
pub async fn delete_entry(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.publisher.delete_entry(&user.id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/entries/{id}/share",
    params(("id" = String, Path, description = "Entry id")),
    request_body = ShareEntryRequest,
    responses(
        (status = 201, description = "Entry published to the community", body = ShareCreatedResponse),
        (status = 400, description = "Entry has no photo to share")
    ),
    security(("bearer_auth" = [])),
    tag = "shares"
)]
pub async fn share_entry(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<ShareEntryRequest>,
) -> Result<impl IntoResponse, AppError> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let share = state
        .publisher
        .share_entry(
            &user.id,
            &id,
            NewShareRequest {
                caption: body.caption,
                attribution_name: body.attribution_name,
                attribution_url: body.attribution_url,
                show_attribution: body.show_attribution,
            },
        )
        .await?;

    let href = format!(
        "{}/s/{}",
        state.config.site_origin.trim_end_matches('/'),
        share.slug
    );
    Ok((StatusCode::CREATED, Json(ShareCreatedResponse { share, href })))
}
