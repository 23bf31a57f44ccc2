use std::sync::Arc;

use axum::middleware;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use auth_backend::auth::{AuthService, SessionTokens};
use auth_backend::config::Config;
use auth_backend::provider::FirebaseClient;
use auth_backend::store::UserStore;
use auth_backend::{logging, routes, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting auth backend");

    // Construct collaborators explicitly and inject them; no hidden
    // global provider initialization.
    let store = Arc::new(UserStore::new(&config.database_url)?);
    let provider = Arc::new(FirebaseClient::new(&config.firebase).await?);
    let sessions = SessionTokens::new(&config.jwt_secret, config.session_ttl_secs);
    let auth = AuthService::new(provider, store.clone(), sessions);

    let state = Arc::new(AppState {
        config: config.clone(),
        auth,
        store,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::router(state)
        .layer(middleware::from_fn(logging::request_logger))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
