use axum::{
    extract::{Json, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    app_state::{AppState, SharedSession},
    errors::AppError,
    models::{ChatMessage, UploadedFile},
    session::{Notice, NoticeKind, SessionPhase},
};

// --- Payloads y Respuestas de la API ---

#[derive(Deserialize)]
pub struct ChatPayload {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct SessionCreated {
    pub session_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: ChatMessage,
    pub transcript: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct SessionStatus {
    pub session_id: Uuid,
    pub phase: SessionPhase,
    pub fingerprint: Option<String>,
    pub chunks: usize,
    pub messages: usize,
    pub can_chat: bool,
    pub notice: Option<Notice>,
}

type ApiResult<T> = Result<Json<T>, Response>;

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/sessions", post(create_session_handler))
        .route("/api/sessions/:id", delete(delete_session_handler))
        .route("/api/sessions/:id/upload", post(upload_handler))
        .route("/api/sessions/:id/chat", post(chat_handler))
        .route("/api/sessions/:id/history", get(history_handler))
        .route("/api/sessions/:id/clear-history", post(clear_history_handler))
        .route("/api/sessions/:id/status", get(status_handler))
        .route("/api/shutdown", post(shutdown_handler))
        .with_state(app_state)
}

// --- Handlers ---

#[axum::debug_handler]
async fn create_session_handler(State(state): State<AppState>) -> (StatusCode, Json<SessionCreated>) {
    let session_id = state.create_session();
    info!("Sesión creada: {session_id}");
    (StatusCode::CREATED, Json(SessionCreated { session_id }))
}

#[axum::debug_handler]
async fn delete_session_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, Response> {
    if state.remove_session(&id) {
        info!("Sesión eliminada: {id}");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(session_not_found(id))
    }
}

#[axum::debug_handler]
async fn upload_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Notice>), Response> {
    let session = find_session(&state, id)?;

    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(e.to_string()).into_response())?
    {
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidInput(e.to_string()).into_response())?;
        files.push(UploadedFile::new(name, bytes.to_vec()));
    }

    Ok(upload_files(&state, &session, files).await)
}

/// Valida que todo sean PDFs y delega en el controlador de sesión.
pub async fn upload_files(
    state: &AppState,
    session: &SharedSession,
    files: Vec<UploadedFile>,
) -> (StatusCode, Json<Notice>) {
    if let Some(bad) = files.iter().find(|f| !is_pdf(&f.name)) {
        warn!("Fichero rechazado (no es PDF): {}", bad.name);
        let notice = Notice {
            kind: NoticeKind::Error,
            message: format!("Error: sólo se aceptan PDFs, recibido '{}'", bad.name),
            trace: None,
        };
        return (StatusCode::UNSUPPORTED_MEDIA_TYPE, Json(notice));
    }

    let mut session = session.lock().await;
    let notice = state.controller.handle_upload(&mut session, files).await;
    let status = match notice.kind {
        NoticeKind::Success => StatusCode::OK,
        NoticeKind::Error => StatusCode::UNPROCESSABLE_ENTITY,
    };
    (status, Json(notice))
}

fn is_pdf(name: &str) -> bool {
    mime_guess::from_path(name)
        .first()
        .is_some_and(|m| m.essence_str() == "application/pdf")
}

#[axum::debug_handler]
async fn chat_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChatPayload>,
) -> ApiResult<ChatResponse> {
    let session = find_session(&state, id)?;
    let mut session = session.lock().await;

    let answer = state
        .controller
        .chat_turn(&mut session, &payload.question)
        .await
        .map_err(IntoResponse::into_response)?;

    Ok(Json(ChatResponse {
        answer,
        transcript: session.transcript.clone(),
    }))
}

#[axum::debug_handler]
async fn history_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<ChatMessage>> {
    let session = find_session(&state, id)?;
    let session = session.lock().await;
    Ok(Json(session.transcript.clone()))
}

#[axum::debug_handler]
async fn clear_history_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, Response> {
    let session = find_session(&state, id)?;
    let mut session = session.lock().await;
    state.controller.clear_history(&mut session);
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
async fn status_handler(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<SessionStatus> {
    let session = find_session(&state, id)?;

    // Si la sesión está ocupada es que hay una subida en curso.
    let Ok(session) = session.try_lock() else {
        return Ok(Json(SessionStatus {
            session_id: id,
            phase: SessionPhase::Building,
            fingerprint: None,
            chunks: 0,
            messages: 0,
            can_chat: false,
            notice: None,
        }));
    };

    Ok(Json(SessionStatus {
        session_id: id,
        phase: session.phase,
        fingerprint: session.fingerprint.clone(),
        chunks: session.index.as_ref().map(|i| i.len()).unwrap_or(0),
        messages: session.transcript.len(),
        can_chat: session.can_answer(),
        notice: session.last_notice.clone(),
    }))
}

// --- Handler de Apagado y Utilidades ---

#[axum::debug_handler]
async fn shutdown_handler(State(state): State<AppState>) -> impl IntoResponse {
    info!("Petición de apagado recibida.");
    if let Some(sender) = state.take_shutdown_sender() {
        let _ = sender.send(());
    }
    StatusCode::OK
}

fn find_session(state: &AppState, id: Uuid) -> Result<SharedSession, Response> {
    state.session(&id).ok_or_else(|| session_not_found(id))
}

fn session_not_found(id: Uuid) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": format!("Sesión desconocida: {id}"), "status": "error"})),
    )
        .into_response()
}
