pub mod api;
pub mod collaborators;
pub mod config;
pub mod models;
pub mod services;

use axum::{
    Router,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::collaborators::{AuthGateway, ObjectStore, VaultStore};
use crate::config::AppConfig;
use crate::services::{DisplayResolver, FeedService, Publisher, SessionContext};

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::auth::signup,
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::auth::reset_password,
        api::handlers::auth::resend_confirmation,
        api::handlers::auth::oauth_start,
        api::handlers::auth::callback,
        api::handlers::projects::list_projects,
        api::handlers::projects::create_project,
        api::handlers::projects::get_project,
        api::handlers::projects::create_entry,
        api::handlers::projects::delete_entry,
        api::handlers::projects::share_entry,
        api::handlers::shares::list_my_shares,
        api::handlers::shares::unshare,
        api::handlers::shares::delete_share,
        api::handlers::pairs::create_pair,
        api::handlers::pairs::delete_pair,
        api::handlers::community::community_feed,
        api::handlers::community::share_page,
        api::handlers::community::pair_page,
        api::handlers::community::refresh_media_url,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::auth::CredentialsRequest,
            api::handlers::auth::EmailRequest,
            api::handlers::auth::AcceptedResponse,
            api::handlers::projects::CreateProjectRequest,
            api::handlers::projects::EntryView,
            api::handlers::projects::ProjectDetail,
            api::handlers::projects::ShareEntryRequest,
            api::handlers::projects::ShareCreatedResponse,
            api::handlers::shares::OwnedShareView,
            api::handlers::pairs::PairCreatedResponse,
            api::handlers::health::HealthResponse,
            collaborators::auth::AuthUser,
            collaborators::auth::Session,
            collaborators::auth::SignUpOutcome,
            models::Category,
            models::EntryKind,
            models::Project,
            models::Entry,
            models::Share,
            models::Pair,
            services::feed::FeedPage,
            services::feed::FeedItem,
            services::feed::Attribution,
            services::feed::ShareView,
            services::feed::PairView,
        )
    ),
    tags(
        (name = "auth", description = "Account and session endpoints"),
        (name = "projects", description = "Private transformation projects"),
        (name = "shares", description = "Publishing entries to the community"),
        (name = "pairs", description = "Before/after pair posts"),
        (name = "community", description = "Public feed and share pages")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub auth: Arc<dyn AuthGateway>,
    pub store: Arc<dyn VaultStore>,
    pub storage: Arc<dyn ObjectStore>,
    pub publisher: Arc<Publisher>,
    pub feed: Arc<FeedService>,
    pub resolver: Arc<DisplayResolver>,
    pub sessions: Arc<SessionContext>,
}

impl AppState {
    /// Wire services on top of a collaborator set.
    pub fn new(
        config: AppConfig,
        auth: Arc<dyn AuthGateway>,
        store: Arc<dyn VaultStore>,
        storage: Arc<dyn ObjectStore>,
    ) -> Self {
        let resolver = Arc::new(DisplayResolver::new(storage.clone(), &config));
        let feed = Arc::new(FeedService::new(store.clone(), resolver.clone(), &config));
        let publisher = Arc::new(Publisher::new(
            store.clone(),
            storage.clone(),
            config.clone(),
        ));

        Self {
            config,
            auth,
            store,
            storage,
            publisher,
            feed,
            resolver,
            sessions: Arc::new(SessionContext::new()),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let authed = |state: &AppState| from_fn_with_state(state.clone(), api::middleware::auth_middleware);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/auth/signup", post(api::handlers::auth::signup))
        .route("/auth/login", post(api::handlers::auth::login))
        .route("/auth/reset", post(api::handlers::auth::reset_password))
        .route("/auth/resend", post(api::handlers::auth::resend_confirmation))
        .route("/auth/oauth/:provider", get(api::handlers::auth::oauth_start))
        .route("/auth/callback", get(api::handlers::auth::callback))
        .route(
            "/auth/logout",
            post(api::handlers::auth::logout).layer(authed(&state)),
        )
        .route(
            "/projects",
            get(api::handlers::projects::list_projects)
                .post(api::handlers::projects::create_project)
                .layer(authed(&state)),
        )
        .route(
            "/projects/:id",
            get(api::handlers::projects::get_project).layer(authed(&state)),
        )
        .route(
            "/projects/:id/entries",
            post(api::handlers::projects::create_entry)
                .layer(axum::extract::DefaultBodyLimit::max(
                    state.config.max_upload_size + 1024 * 1024,
                ))
                .layer(authed(&state)),
        )
        .route(
            "/entries/:id",
            axum::routing::delete(api::handlers::projects::delete_entry).layer(authed(&state)),
        )
        .route(
            "/entries/:id/share",
            post(api::handlers::projects::share_entry).layer(authed(&state)),
        )
        .route(
            "/my-shares",
            get(api::handlers::shares::list_my_shares).layer(authed(&state)),
        )
        .route(
            "/shares/:id/unshare",
            post(api::handlers::shares::unshare).layer(authed(&state)),
        )
        .route(
            "/shares/:id",
            axum::routing::delete(api::handlers::shares::delete_share).layer(authed(&state)),
        )
        .route(
            "/pairs",
            post(api::handlers::pairs::create_pair)
                // Two files per request, plus multipart overhead
                .layer(axum::extract::DefaultBodyLimit::max(
                    state.config.max_upload_size * 2 + 1024 * 1024,
                ))
                .layer(authed(&state)),
        )
        .route(
            "/pairs/:id",
            axum::routing::delete(api::handlers::pairs::delete_pair).layer(authed(&state)),
        )
        .route(
            "/media/refresh",
            get(api::handlers::community::refresh_media_url).layer(authed(&state)),
        )
        .route("/community", get(api::handlers::community::community_feed))
        .route("/s/:slug", get(api::handlers::community::share_page))
        .route("/p/:id", get(api::handlers::community::pair_page))
        .layer(cors_layer(&state.config))
        .with_state(state)
}

/// Browser access is limited to the configured origins; `*` opens it up.
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    if config.allowed_origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(AllowOrigin::list(origins))
    }
}
