use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use pdf_chat_core::{PdfStats, Pipeline, PipelineError, PresignedPost};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, warn};

const INDEX_HTML: &str = include_str!("../static/index.html");

pub type SharedPipeline = Arc<Pipeline>;

pub fn router(pipeline: SharedPipeline) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/ask", post(ask))
        .route("/stats", get(stats))
        .route("/upload-url", post(upload_url))
        .route("/reindex", post(reindex))
        .route("/health", get(health))
        .with_state(pipeline)
}

pub struct AppError(PipelineError);

impl From<PipelineError> for AppError {
    fn from(value: PipelineError) -> Self {
        Self(value)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            error!(error = %self.0, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub filename: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReindexResponse {
    pub ok: bool,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub warm: bool,
}

async fn index_page(State(pipeline): State<SharedPipeline>) -> Html<&'static str> {
    if let Err(error) = pipeline.warmup().await {
        warn!(%error, "warmup failed while serving the index page");
    }
    Html(INDEX_HTML)
}

async fn ask(
    State(pipeline): State<SharedPipeline>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let answer = pipeline.ask(&request.query).await?;
    Ok(Json(AskResponse { answer }))
}

async fn stats(State(pipeline): State<SharedPipeline>) -> Result<Json<Vec<PdfStats>>, AppError> {
    Ok(Json(pipeline.stats().await?))
}

async fn upload_url(
    State(pipeline): State<SharedPipeline>,
    Json(request): Json<UploadRequest>,
) -> Result<Json<PresignedPost>, AppError> {
    Ok(Json(pipeline.presign_upload(&request.filename)?))
}

async fn reindex(State(pipeline): State<SharedPipeline>) -> Result<Json<ReindexResponse>, AppError> {
    let summary = pipeline.reindex().await?;
    Ok(Json(ReindexResponse {
        ok: true,
        count: summary.files,
    }))
}

async fn health(State(pipeline): State<SharedPipeline>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        warm: pipeline.is_warm().await,
    })
}
