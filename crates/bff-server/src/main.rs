//! BFF authentication server.
//!
//! Mediates the OAuth2 authorization-code flow with PKCE against a Cognito
//! user pool on behalf of a browser SPA. Tokens live server-side in a TTL
//! store; the browser holds an opaque session id in an HttpOnly cookie and a
//! script-readable CSRF token it echoes back on state-changing requests.

mod api;
mod config;
mod cookies;
mod csrf;
mod error;
mod state;

use anyhow::{Context, Result};
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{middleware, Router};
use bff_store::build_store;
use config::Config;
use state::AppState;
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bff_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let store = build_store(&config.store_backend).await?;
    let provider_config = config.provider_config();
    let bind_address = config.bind_address;

    let state = Arc::new(AppState::new(config, provider_config, store));
    let app = create_router(state)?;

    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    tracing::info!(address = %bind_address, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

fn create_router(state: Arc<AppState>) -> Result<Router> {
    let origin: HeaderValue = state
        .config
        .frontend_origin
        .parse()
        .context("FRONTEND_ORIGIN is not a valid header value")?;

    // Credentialed CORS requires an exact origin, never a wildcard.
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(cookies::CSRF_HEADER_NAME),
        ]);

    Ok(Router::new()
        .route("/health", get(api::health::health_check))
        .route("/login", get(api::auth::login))
        .route("/callback", get(api::auth::callback))
        .route("/logout", post(api::auth::logout))
        .route("/me", get(api::auth::me))
        .route("/refresh", post(api::auth::refresh))
        .layer(middleware::from_fn(csrf::require_csrf))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            csrf::issue_csrf,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
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
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
