use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("email not confirmed")]
    EmailNotConfirmed,

    #[error("an account with this email already exists")]
    AlreadyRegistered,

    #[error("link expired or invalid")]
    LinkExpired,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("identity provider request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        AuthError::Request(e.to_string())
    }
}

/// Classify a raw provider message into the taxonomy above. Unknown
/// messages stay generic request errors.
pub fn classify_auth_message(message: &str) -> AuthError {
    let m = message.to_lowercase();
    if m.contains("already registered") || m.contains("already exists") {
        AuthError::AlreadyRegistered
    } else if m.contains("email not confirmed") {
        AuthError::EmailNotConfirmed
    } else if m.contains("invalid login") {
        AuthError::InvalidCredentials
    } else if m.contains("expired") {
        AuthError::LinkExpired
    } else {
        AuthError::Request(message.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: AuthUser,
}

/// Outcome of a sign-up attempt: hosted providers may require email
/// confirmation before a session exists.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SignUpOutcome {
    pub session: Option<Session>,
    pub confirmation_required: bool,
}

/// The identity provider seam. Sessions are issued and refreshed by the
/// provider; this service only forwards credentials and verifies tokens.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: &str,
    ) -> Result<SignUpOutcome, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;

    /// Verify a bearer token and return the account it belongs to.
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError>;

    /// OAuth / email-confirmation landing: trade the callback code for a session.
    async fn exchange_code(&self, code: &str) -> Result<Session, AuthError>;

    async fn reset_password(&self, email: &str, redirect_to: &str) -> Result<(), AuthError>;

    async fn resend_confirmation(&self, email: &str, redirect_to: &str) -> Result<(), AuthError>;

    /// Provider-hosted OAuth entry URL for browser redirection.
    fn oauth_url(&self, provider: &str, redirect_to: &str) -> String;
}

/// GoTrue-compatible REST client for the hosted identity provider.
pub struct HostedAuth {
    base_url: String,
    anon_key: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct ProviderError {
    msg: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct SessionResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: AuthUser,
}

impl From<SessionResponse> for Session {
    fn from(r: SessionResponse) -> Self {
        Session {
            access_token: r.access_token,
            refresh_token: r.refresh_token,
            expires_in: r.expires_in,
            user: r.user,
        }
    }
}

impl HostedAuth {
    pub fn new(base_url: &str, anon_key: &str, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            http,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    async fn provider_error(response: reqwest::Response) -> AuthError {
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ProviderError>(&body) {
            Ok(err) => {
                let msg = err
                    .msg
                    .or(err.error_description)
                    .or(err.message)
                    .unwrap_or(body);
                classify_auth_message(&msg)
            }
            Err(_) => AuthError::Request(body),
        }
    }
}

#[async_trait]
impl AuthGateway for HostedAuth {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: &str,
    ) -> Result<SignUpOutcome, AuthError> {
        let response = self
            .http
            .post(self.endpoint("signup"))
            .query(&[("redirect_to", redirect_to)])
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::provider_error(response).await);
        }

        // With email confirmation enabled the provider returns a user
        // object without tokens; only a full session means confirmed.
        let body = response.json::<serde_json::Value>().await?;
        match serde_json::from_value::<SessionResponse>(body.clone()) {
            Ok(session) => Ok(SignUpOutcome {
                session: Some(session.into()),
                confirmation_required: false,
            }),
            Err(_) => Ok(SignUpOutcome {
                session: None,
                confirmation_required: true,
            }),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let response = self
            .http
            .post(self.endpoint("token?grant_type=password"))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::provider_error(response).await);
        }
        Ok(response.json::<SessionResponse>().await?.into())
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .http
            .post(self.endpoint("logout"))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::provider_error(response).await);
        }
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        let response = self
            .http
            .get(self.endpoint("user"))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AuthError::InvalidToken);
        }
        if !response.status().is_success() {
            return Err(Self::provider_error(response).await);
        }
        Ok(response.json::<AuthUser>().await?)
    }

    async fn exchange_code(&self, code: &str) -> Result<Session, AuthError> {
        let response = self
            .http
            .post(self.endpoint("token?grant_type=authorization_code"))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "code": code }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::provider_error(response).await);
        }
        Ok(response.json::<SessionResponse>().await?.into())
    }

    async fn reset_password(&self, email: &str, redirect_to: &str) -> Result<(), AuthError> {
        let response = self
            .http
            .post(self.endpoint("recover"))
            .query(&[("redirect_to", redirect_to)])
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::provider_error(response).await);
        }
        Ok(())
    }

    async fn resend_confirmation(&self, email: &str, redirect_to: &str) -> Result<(), AuthError> {
        let response = self
            .http
            .post(self.endpoint("resend"))
            .query(&[("redirect_to", redirect_to)])
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "type": "signup", "email": email }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::provider_error(response).await);
        }
        Ok(())
    }

    fn oauth_url(&self, provider: &str, redirect_to: &str) -> String {
        format!(
            "{}?provider={}&redirect_to={}",
            self.endpoint("authorize"),
            provider,
            utf8_percent_encode(redirect_to, NON_ALPHANUMERIC)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_provider_messages() {
        assert!(matches!(
            classify_auth_message("User already registered"),
            AuthError::AlreadyRegistered
        ));
        assert!(matches!(
            classify_auth_message("Email not confirmed"),
            AuthError::EmailNotConfirmed
        ));
        assert!(matches!(
            classify_auth_message("Invalid login credentials"),
            AuthError::InvalidCredentials
        ));
        assert!(matches!(
            classify_auth_message("Token has expired"),
            AuthError::LinkExpired
        ));
        assert!(matches!(
            classify_auth_message("something else"),
            AuthError::Request(_)
        ));
    }

    #[test]
    fn oauth_url_carries_provider_and_redirect() {
        let auth = HostedAuth::new("https://example.test", "anon", reqwest::Client::new());
        let url = auth.oauth_url("github", "https://app.test/auth/callback");
        assert!(url.starts_with("https://example.test/auth/v1/authorize?provider=github"));
        assert!(url.contains("redirect_to="));
    }
}
