mod acquisition;
mod export;
mod models;
mod orchestrator;
mod preview;
mod raster;
mod routes;
mod store;
mod synthesis;

use axum::{Router, response::Html, routing::{get, post}};
use include_dir::{Dir, include_dir};
use routes::{
    AppState, creation_frame, export_creation, get_session, list_creations, original_artifact,
    original_page, reset_session, select_creation, set_focus, set_input, set_split_view,
    submit_generation,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{EnvFilter, fmt};

use crate::orchestrator::Orchestrator;
use crate::store::CreationStore;
use crate::synthesis::{GeminiClient, Synthesizer};

static ASSETS: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/static");

async fn index() -> Html<&'static str> {
    Html(
        ASSETS
            .get_file("index.html")
            .and_then(|f| f.contents_utf8())
            .unwrap_or("<h1>Blueprint Studio</h1>"),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let api_key = std::env::var("SYNTHESIS_API_KEY").unwrap_or_else(|_| "DEMO_KEY".into());
    tracing::info!("Using API key: {}...", &api_key[..std::cmp::min(10, api_key.len())]);

    let store = Arc::new(CreationStore::default());
    let synthesizer: Arc<dyn Synthesizer> = Arc::new(GeminiClient::new(api_key));
    let orchestrator = Arc::new(Orchestrator::new(store.clone(), synthesizer));
    let state = AppState { store, orchestrator };

    let app = Router::new()
        .route("/", get(index))
        .route("/api/generations", post(submit_generation))
        .route("/api/session", get(get_session))
        .route("/api/session/select/:id", post(select_creation))
        .route("/api/session/reset", post(reset_session))
        .route("/api/session/focus", post(set_focus))
        .route("/api/session/split", post(set_split_view))
        .route("/api/session/input", post(set_input))
        .route("/api/creations", get(list_creations))
        .route("/api/creations/:id/export", get(export_creation))
        .route("/api/creations/:id/original", get(original_artifact))
        .route("/api/creations/:id/original/page", get(original_page))
        .route("/api/creations/:id/frame", get(creation_frame))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state);

    let port: u16 = std::env::var("PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "Starting server");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
