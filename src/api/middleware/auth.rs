use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use crate::AppState;
use crate::collaborators::AuthError;

/// Bearer token carried through to handlers that need to talk to the
/// identity provider on the caller's behalf.
#[derive(Debug, Clone)]
pub struct AccessToken(pub String);

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.to_string());

    if let Some(token) = token {
        match state.auth.get_user(&token).await {
            Ok(user) => {
                req.extensions_mut().insert(user);
                req.extensions_mut().insert(AccessToken(token));
                return Ok(next.run(req).await);
            }
            // A provider outage is not the caller's fault.
            Err(AuthError::Request(err)) => {
                tracing::error!(error = %err, "token check failed against the identity provider");
                return Err(StatusCode::BAD_GATEWAY);
            }
            Err(_) => {}
        }
    }

    Err(StatusCode::UNAUTHORIZED)
}
