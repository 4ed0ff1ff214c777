use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Path as UrlPath, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};

use crate::controller::ScanController;
use crate::error::ScanError;
use crate::http_scan::{HttpScanRequest, HttpScanner};
use crate::port_scan::{PortScanRequest, PortScanner};
use crate::sink::LogRecord;
use crate::types::ScanStatus;

#[derive(Clone)]
pub struct AppState {
    pub http: Arc<HttpScanner>,
    pub ports: Arc<PortScanner>,
}

/// Control actions that take no request body.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Pause,
    Resume,
    Stop,
    Clear,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsQuery {
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedProject {
    pub project_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ScanError {
    fn into_response(self) -> Response {
        let status = match &self {
            e if e.is_config_error() => StatusCode::BAD_REQUEST,
            ScanError::AlreadyRunning { .. } | ScanError::InvalidTransition { .. } => {
                StatusCode::CONFLICT
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

pub fn router(state: AppState, ui_dir: &Path) -> Router {
    let api = Router::new()
        .route("/http/status", get(http_status))
        .route("/http/start", post(http_start))
        .route("/http/results", get(http_results))
        .route("/http/{action}", post(http_control))
        .route("/ports/status", get(ports_status))
        .route("/ports/start", post(ports_start))
        .route("/ports/results", get(ports_results))
        .route("/ports/{action}", post(ports_control))
        .route("/project/selected", get(get_selected).put(put_selected))
        .with_state(state);

    let static_svc = ServeDir::new(ui_dir).append_index_html_on_directories(true);

    Router::new()
        .nest("/api", api)
        .fallback_service(static_svc)
        .layer(TraceLayer::new_for_http())
}

pub async fn spawn_server(bind: &str, state: AppState, ui_dir: &Path) -> Result<()> {
    let app = router(state, ui_dir);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("serving API on http://{}", bind);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn apply<R: LogRecord>(
    controller: &ScanController<R>,
    action: Action,
) -> Result<ScanStatus, ScanError> {
    match action {
        Action::Pause => controller.pause().await.map(|_| ()),
        Action::Resume => controller.resume().await.map(|_| ()),
        Action::Stop => controller.stop().await.map(|_| ()),
        Action::Clear => controller.clear_results().await,
    }?;
    Ok(controller.status())
}

async fn http_status(State(app): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(app.http.controller().status()))
}

async fn http_start(
    State(app): State<AppState>,
    Json(req): Json<HttpScanRequest>,
) -> Result<impl IntoResponse, ScanError> {
    app.http.start(req).await?;
    Ok((StatusCode::ACCEPTED, Json(app.http.controller().status())))
}

async fn http_control(
    State(app): State<AppState>,
    UrlPath(action): UrlPath<Action>,
) -> Result<Json<ScanStatus>, ScanError> {
    apply(app.http.controller(), action).await.map(Json)
}

async fn http_results(
    State(app): State<AppState>,
    Query(q): Query<ResultsQuery>,
) -> impl IntoResponse {
    Json(app.http.results(q.project_id.as_deref()).await)
}

async fn ports_status(State(app): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(app.ports.controller().status()))
}

async fn ports_start(
    State(app): State<AppState>,
    Json(req): Json<PortScanRequest>,
) -> Result<impl IntoResponse, ScanError> {
    app.ports.start(req).await?;
    Ok((StatusCode::ACCEPTED, Json(app.ports.controller().status())))
}

async fn ports_control(
    State(app): State<AppState>,
    UrlPath(action): UrlPath<Action>,
) -> Result<Json<ScanStatus>, ScanError> {
    apply(app.ports.controller(), action).await.map(Json)
}

async fn ports_results(State(app): State<AppState>) -> impl IntoResponse {
    Json(app.ports.results().await)
}

async fn get_selected(State(app): State<AppState>) -> impl IntoResponse {
    Json(SelectedProject {
        project_id: app.http.selected_project(),
    })
}

async fn put_selected(
    State(app): State<AppState>,
    Json(body): Json<SelectedProject>,
) -> impl IntoResponse {
    let Some(id) = body.project_id.filter(|id| !id.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "projectId is required".into(),
            }),
        )
            .into_response();
    };
    match app.http.select_project(&id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            warn!(error = %e, "failed to store selected project");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}
