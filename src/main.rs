use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use cartophile::config::{Cli, Config};
use cartophile::state::AppState;
use cartophile::{extractors, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let config = Config::load(&cli)?;

    let state = AppState::new(config.clone());

    // Verify the image bucket exists and is public; not fatal if it fails.
    state.storage.ensure_ready().await;

    // Build router
    let app = Router::new()
        .route("/", get(routes::home::index))
        .route("/assets/{*path}", get(routes::assets::serve))
        .merge(routes::postcards::router())
        .merge(routes::auth::router())
        .merge(routes::profile::router())
        .merge(routes::admin::router())
        .fallback(routes::home::not_found)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            extractors::resolve_principal,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(config.uploads.max_bytes))
        .with_state(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
