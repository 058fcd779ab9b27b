#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Form, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::chat::{ChatAnswer, ChatPipeline};
use crate::config::Config;
use crate::index::{DocumentChunk, SourceMetadata, VectorIndexClient};
use crate::ingest::ingest_chunk;
use crate::notify::NotificationDispatcher;
use crate::openai::OpenAiClient;
use crate::tokens::{RedeemOutcome, TokenStore};
use crate::{ChatError, Result};

/// Shared application state handed to every handler. Configuration and
/// clients are immutable; the only mutable state lives in the token store's
/// database.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: ChatPipeline,
    pub openai: OpenAiClient,
    pub index: VectorIndexClient,
    pub tokens: TokenStore,
    pub notify: NotificationDispatcher,
}

impl AppState {
    #[inline]
    pub async fn from_config(config: Config) -> Result<Self> {
        let tokens = TokenStore::new(config.database_path(), config.tokens.ttl_hours)
            .await
            .map_err(|e| ChatError::Database(e.to_string()))?;

        Ok(Self {
            pipeline: ChatPipeline::new(&config)?,
            openai: OpenAiClient::new(&config)?,
            index: VectorIndexClient::new(&config)?,
            tokens,
            notify: NotificationDispatcher::new(&config)?,
            config: Arc::new(config),
        })
    }
}

/// Run the HTTP server until the process is terminated.
#[inline]
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let bind_address = config.server.bind_address.clone();
    let state = AppState::from_config(config).await?;
    let app = build_router(state);

    info!("Listening on http://{}", bind_address);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[inline]
pub fn build_router(state: AppState) -> Router {
    let cors = match HeaderValue::from_str(&state.config.server.allowed_origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
        Err(_) => CorsLayer::new(),
    };

    Router::new()
        .route("/api/ingest", post(handle_ingest))
        .route("/api/chat", post(handle_chat))
        .route("/api/request-pdf", post(handle_request_pdf))
        .route("/download/cv", get(handle_download))
        .fallback(handle_not_found)
        .method_not_allowed_fallback(handle_method_not_allowed)
        .layer(cors)
        .with_state(state)
}

impl IntoResponse for ChatError {
    #[inline]
    fn into_response(self) -> Response {
        let status = match &self {
            ChatError::Validation(_) | ChatError::BadRequest(_) | ChatError::UnknownFile(_) => {
                StatusCode::BAD_REQUEST
            }
            ChatError::TokenExpired => StatusCode::GONE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error_response(status, &self.to_string())
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

async fn handle_not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn handle_method_not_allowed() -> Response {
    error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

#[derive(Debug, Deserialize)]
struct IngestRequest {
    #[serde(default)]
    id: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    metadata: SourceMetadata,
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    success: bool,
    inserted: u64,
}

async fn handle_ingest(
    State(state): State<AppState>,
    body: std::result::Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<IngestResponse>> {
    let Json(request) = body.map_err(|_| ChatError::BadRequest("Invalid JSON body".to_string()))?;

    if request.id.is_empty() {
        return Err(ChatError::Validation("id"));
    }
    if request.text.is_empty() {
        return Err(ChatError::Validation("text"));
    }

    let chunk = DocumentChunk {
        id: request.id,
        text: request.text,
        metadata: request.metadata,
    };

    let inserted = ingest_chunk(&state.openai, &state.index, &chunk).await?;
    Ok(Json(IngestResponse {
        success: true,
        inserted,
    }))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    question: String,
}

async fn handle_chat(
    State(state): State<AppState>,
    body: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatAnswer>> {
    let Json(request) = body.map_err(|_| ChatError::BadRequest("Invalid JSON body".to_string()))?;

    let question = request.question.trim();
    if question.is_empty() {
        return Err(ChatError::Validation("question"));
    }

    let answer = state.pipeline.answer(question).await?;
    Ok(Json(answer))
}

#[derive(Debug, Deserialize)]
struct RequestPdfForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    cv: String,
}

#[derive(Debug, Serialize)]
struct RequestPdfResponse {
    status: &'static str,
}

async fn handle_request_pdf(
    State(state): State<AppState>,
    Form(form): Form<RequestPdfForm>,
) -> Result<Json<RequestPdfResponse>> {
    if !is_plausible_email(&form.email) {
        return Err(ChatError::BadRequest("Invalid email address".to_string()));
    }

    let file_name = state
        .config
        .tokens
        .files
        .get(&form.cv)
        .ok_or_else(|| ChatError::UnknownFile(form.cv.clone()))?;

    let record = state
        .tokens
        .issue(&form.email, file_name)
        .await
        .map_err(|e| ChatError::Database(e.to_string()))?;

    // An undelivered link must fail the whole request; the caller may not
    // believe a token is usable when no email went out.
    state.notify.send_issued(&form.email, &record.token).await?;

    info!("Issued download token for {}", file_name);
    Ok(Json(RequestPdfResponse { status: "sent" }))
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

#[derive(Debug, Deserialize)]
struct DownloadQuery {
    #[serde(default)]
    token: String,
}

async fn handle_download(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response> {
    if query.token.is_empty() {
        return Err(ChatError::Validation("token"));
    }

    let outcome = state
        .tokens
        .redeem(&query.token)
        .await
        .map_err(|e| ChatError::Database(e.to_string()))?;

    let record = match outcome {
        RedeemOutcome::Redeemed(record) => record,
        RedeemOutcome::Expired | RedeemOutcome::NotFound => return Err(ChatError::TokenExpired),
    };

    if record.download_count == 1 {
        // The download is already committed; a failed notice is reported but
        // must not block the stream.
        if let Err(e) = state
            .notify
            .send_first_download(&record.email, &record.file_name, Utc::now())
            .await
        {
            warn!("First-download notification failed: {}", e);
        }
    }

    let file_path = state.config.tokens.files_dir.join(&record.file_name);
    let bytes = tokio::fs::read(&file_path)
        .await
        .map_err(|e| ChatError::Other(anyhow::anyhow!("File unavailable: {}", e)))?;

    let disposition = format!("attachment; filename=\"{}\"", record.file_name);
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (header::CONTENT_DISPOSITION, disposition),
    ];

    Ok((headers, bytes).into_response())
}
