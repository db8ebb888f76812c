use ba_vault::collaborators::{
    AuthGateway, HostedAuth, HostedStorage, HostedStore, MemoryAuth, MemoryStorage, MemoryStore,
    ObjectStore, VaultStore,
};
use ba_vault::config::AppConfig;
use ba_vault::{AppState, create_app};
use clap::Parser;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port for the API server
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// Override collaborator mode (hosted, memory)
    #[arg(short, long)]
    collaborators: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ba_vault=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = AppConfig::from_env();
    if let Some(mode) = args.collaborators {
        config.collaborators = mode;
    }
    info!(
        "Starting vault backend [collaborators: {}, buckets: {}/{}]",
        config.collaborators, config.public_bucket, config.private_bucket
    );

    let (auth, store, storage): (
        Arc<dyn AuthGateway>,
        Arc<dyn VaultStore>,
        Arc<dyn ObjectStore>,
    ) = if config.collaborators == "memory" {
        (
            Arc::new(MemoryAuth::new()),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStorage::new()),
        )
    } else {
        let http = reqwest::Client::new();
        (
            Arc::new(HostedAuth::new(
                &config.service_url,
                &config.anon_key,
                http.clone(),
            )),
            Arc::new(HostedStore::new(
                &config.service_url,
                &config.service_key,
                http.clone(),
            )),
            Arc::new(HostedStorage::new(
                &config.service_url,
                &config.service_key,
                http,
            )),
        )
    };

    let state = AppState::new(config, auth, store, storage);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
            )
        })
        .on_response(
            |response: &axum::http::Response<_>,
             latency: std::time::Duration,
             _span: &tracing::Span| {
                info!("Finished in {:?} with status {}", latency, response.status());
            },
        );

    let app = create_app(state).layer(trace_layer);
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("API server listening on http://0.0.0.0:{}", args.port);
    info!(
        "Swagger UI available at http://localhost:{}/swagger-ui",
        args.port
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Backend exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("SIGTERM received, initiating graceful shutdown...");
        },
    }
}
