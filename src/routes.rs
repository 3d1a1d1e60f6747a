use axum::{Json, extract::{Path, State}, http::{HeaderValue, StatusCode, header}, response::{Html, IntoResponse, Response}};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    export,
    models::{CreationSummary, GenerationPhase, IncomingArtifact, PreviewSession, ProgressStage},
    orchestrator::Orchestrator,
    preview::{self, PreviewSurface},
    raster::{self, RasterError},
    store::CreationStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CreationStore>,
    pub orchestrator: Arc<Orchestrator>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub artifact: Option<IncomingArtifact>,
}

#[derive(Debug, Deserialize)]
pub struct FocusBody {
    pub focused: bool,
}

#[derive(Debug, Deserialize)]
pub struct SplitBody {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct InputBody {
    pub disabled: bool,
}

/// Everything a client needs to render the current preview.
#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    pub phase: GenerationPhase,
    pub stage: ProgressStage,
    pub notice: Option<String>,
    pub session: PreviewSession,
    pub surface: PreviewSurface,
}

fn snapshot(state: &AppState) -> SessionSnapshot {
    let session_state = state.orchestrator.session();
    let session = session_state.preview();
    let stage = session_state.stage();
    SessionSnapshot {
        phase: session_state.phase(),
        stage,
        notice: session_state.notice(),
        surface: preview::surface_for(&session, stage, &state.store),
        session,
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Submit a generation request. Submissions while a generation is in flight
/// or while input is disabled are silent no-ops; the unchanged snapshot is
/// returned either way.
pub async fn submit_generation(
    State(state): State<AppState>,
    Json(body): Json<SubmitBody>,
) -> Response {
    match state.orchestrator.submit(&body.prompt, body.artifact) {
        Ok(_) => Json(snapshot(&state)).into_response(),
        Err(e) => error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
    }
}

pub async fn get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(snapshot(&state))
}

pub async fn list_creations(State(state): State<AppState>) -> Json<Vec<CreationSummary>> {
    Json(state.store.newest_first())
}

/// History selection: the chosen creation becomes the active display and the
/// loading state is always exited. An in-flight generation is not cancelled.
pub async fn select_creation(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Response {
    match state.store.select(id) {
        Some(creation) => {
            state.orchestrator.session().select(&creation);
            Json(snapshot(&state)).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn reset_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    state.orchestrator.session().reset();
    Json(snapshot(&state))
}

pub async fn set_focus(
    State(state): State<AppState>,
    Json(body): Json<FocusBody>,
) -> Json<SessionSnapshot> {
    state.orchestrator.session().set_focused(body.focused);
    Json(snapshot(&state))
}

pub async fn set_split_view(
    State(state): State<AppState>,
    Json(body): Json<SplitBody>,
) -> Json<SessionSnapshot> {
    state.orchestrator.session().set_split_view(body.enabled, &state.store);
    Json(snapshot(&state))
}

pub async fn set_input(
    State(state): State<AppState>,
    Json(body): Json<InputBody>,
) -> Json<SessionSnapshot> {
    state.orchestrator.session().set_input_disabled(body.disabled);
    Json(snapshot(&state))
}

/// Download the full creation record as a structured document. No network
/// call is involved beyond serving the bytes.
pub async fn export_creation(Path(id): Path<Uuid>, State(state): State<AppState>) -> Response {
    let Some(creation) = state.store.select(id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match export::export_document(&creation) {
        Ok(bytes) => {
            let mut headers = axum::http::HeaderMap::new();
            headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
            headers.insert(
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export::export_file_name(&creation.name))
                    .parse()
                    .unwrap(),
            );
            (StatusCode::OK, headers, bytes).into_response()
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// The original artifact, decoded, under its own media type.
pub async fn original_artifact(Path(id): Path<Uuid>, State(state): State<AppState>) -> Response {
    let Some(creation) = state.store.select(id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(artifact) = creation.original_image else {
        return error_response(StatusCode::NOT_FOUND, "creation has no original artifact");
    };
    match base64::engine::general_purpose::STANDARD.decode(&artifact.data) {
        Ok(bytes) => {
            let content_type = HeaderValue::from_str(&artifact.media_type)
                .unwrap_or(HeaderValue::from_static("application/octet-stream"));
            (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], bytes).into_response()
        }
        Err(e) => error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
    }
}

/// First page of a PDF artifact rasterized to a PNG. Rendering failures are
/// reported in-place for this pane only; there is no retry.
#[axum::debug_handler]
pub async fn original_page(Path(id): Path<Uuid>, State(state): State<AppState>) -> Response {
    let Some(creation) = state.store.select(id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(artifact) = creation.original_image else {
        return error_response(StatusCode::NOT_FOUND, "creation has no original artifact");
    };

    // pdfium is not async-safe; keep it off the event loop
    let rendered = tokio::task::spawn_blocking(move || raster::render_first_page(&artifact)).await;
    match rendered {
        Ok(Ok(page)) => {
            tracing::debug!(width = page.width, height = page.height, "serving rasterized page");
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, HeaderValue::from_static("image/png"))],
                page.png,
            )
                .into_response()
        }
        Ok(Err(RasterError::NotPdf)) => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, RasterError::NotPdf.to_string())
        }
        Ok(Err(e @ RasterError::EngineUnavailable(_))) => {
            tracing::error!("PDF rasterization unavailable: {e}");
            error_response(StatusCode::BAD_GATEWAY, "Could not render PDF preview.")
        }
        Ok(Err(e)) => {
            tracing::warn!("PDF rasterization failed: {e}");
            error_response(StatusCode::UNPROCESSABLE_ENTITY, "Could not render PDF preview.")
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Host page embedding the generated document inside the sandbox boundary.
pub async fn creation_frame(Path(id): Path<Uuid>, State(state): State<AppState>) -> Response {
    match state.store.select(id) {
        Some(creation) => Html(preview::host_document(&creation)).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
