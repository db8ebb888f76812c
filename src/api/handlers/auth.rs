use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::AppState;
use crate::api::error::AppError;
use crate::api::middleware::AccessToken;
use crate::collaborators::{Session, SignUpOutcome};

// ── Request / Response Types ──────────────────────────────────────────

#[derive(Deserialize, Validate, ToSchema)]
pub struct CredentialsRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct EmailRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Serialize, ToSchema)]
pub struct AcceptedResponse {
    pub sent: bool,
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    pub code: String,
}

#[derive(Deserialize)]
pub struct OAuthQuery {
    pub next: Option<String>,
}

fn validated<T: Validate>(body: T) -> Result<T, AppError> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    Ok(body)
}

fn callback_url(state: &AppState) -> String {
    format!("{}/auth/callback", state.config.site_origin.trim_end_matches('/'))
}

// ── Handlers ──────────────────────────────────────────────────────────

#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Account created", body = SignUpOutcome),
        (status = 409, description = "Email already registered")
    ),
    tag = "auth"
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<CredentialsRequest>,
) -> Result<Json<SignUpOutcome>, AppError> {
    let body = validated(body)?;
    let outcome = state
        .auth
        .sign_up(&body.email, &body.password, &callback_url(&state))
        .await?;
    if let Some(session) = &outcome.session {
        state.sessions.set(session.clone());
    }
    Ok(Json(outcome))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Signed in", body = Session),
        (status = 401, description = "Invalid credentials or unconfirmed email")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<CredentialsRequest>,
) -> Result<Json<Session>, AppError> {
    let body = validated(body)?;
    let session = state.auth.sign_in(&body.email, &body.password).await?;
    state.sessions.set(session.clone());
    Ok(Json(session))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Signed out")),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    Extension(token): Extension<AccessToken>,
) -> Result<impl IntoResponse, AppError> {
    state.auth.sign_out(&token.0).await?;
    state.sessions.clear();
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/auth/reset",
    request_body = EmailRequest,
    responses((status = 200, description = "Reset email requested", body = AcceptedResponse)),
    tag = "auth"
)]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<EmailRequest>,
) -> Result<Json<AcceptedResponse>, AppError> {
    let body = validated(body)?;
    state
        .auth
        .reset_password(&body.email, &callback_url(&state))
        .await?;
    Ok(Json(AcceptedResponse { sent: true }))
}

#[utoipa::path(
    post,
    path = "/auth/resend",
    request_body = EmailRequest,
    responses((status = 200, description = "Confirmation email re-sent", body = AcceptedResponse)),
    tag = "auth"
)]
pub async fn resend_confirmation(
    State(state): State<AppState>,
    Json(body): Json<EmailRequest>,
) -> Result<Json<AcceptedResponse>, AppError> {
    let body = validated(body)?;
    state
        .auth
        .resend_confirmation(&body.email, &callback_url(&state))
        .await?;
    Ok(Json(AcceptedResponse { sent: true }))
}

#[utoipa::path(
    get,
    path = "/auth/oauth/{provider}",
    params(("provider" = String, Path, description = "OAuth provider name")),
    responses((status = 307, description = "Redirect to the provider")),
    tag = "auth"
)]
pub async fn oauth_start(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<OAuthQuery>,
) -> Result<Redirect, AppError> {
    let mut redirect_to = callback_url(&state);
    if let Some(next) = query.next {
        redirect_to = format!("{}?next={}", redirect_to, next);
    }
    Ok(Redirect::temporary(
        &state.auth.oauth_url(&provider, &redirect_to),
    ))
}

#[utoipa::path(
    get,
    path = "/auth/callback",
    params(("code" = String, Query, description = "Provider callback code")),
    responses(
        (status = 200, description = "Session established", body = Session),
        (status = 401, description = "Code expired or invalid")
    ),
    tag = "auth"
)]
pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<Session>, AppError> {
    let session = state.auth.exchange_code(&query.code).await?;
    state.sessions.set(session.clone());
    Ok(Json(session))
}
