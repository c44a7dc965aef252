// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

/*!
The HTTP front-end of the mapper.

A thin axum router over the engine façade: `POST /{list}/query` and
`POST /{list}/response` dispatch raw JSON bodies to the engine, `GET /`
serves the embedded UI page. The engine is built once at startup from the
configured rule sources and shared read-only by all requests.
*/

pub mod config;
pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use koral_engine::Engine;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub use config::{Args, Settings};

/// Request bodies above this are rejected before the engine sees them.
const MAX_BODY_BYTES: usize = 1024 * 1024;

pub struct AppState {
    pub engine: Engine,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/{list}/query", post(handlers::map_query))
        .route("/{list}/response", post(handlers::map_response))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Loads the configuration, builds the engine, and serves until the process
/// is stopped.
pub async fn serve(args: Args) -> anyhow::Result<()> {
    let (settings, engine) = config::load(&args)?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&settings.loglevel))
        .with(tracing_subscriber::fmt::layer())
        .init();
    let mut ids: Vec<_> = engine.list_ids().map(str::to_string).collect();
    ids.sort_unstable();
    tracing::info!(lists = %ids.join(", "), "mapping lists compiled");

    let state = Arc::new(AppState { engine });
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", settings.port)).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
