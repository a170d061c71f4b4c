use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use parley_shared::protocol::{
    CreateChatRequest, CreatePromptRequest, HealthResponse, PromptReply, RenameChatRequest,
    SendMessageRequest, SendPromptRequest,
};
use parley_shared::types::{Chat, Message, Prompt, Settings, SettingsPatch};
use parley_shared::ValidationError;
use parley_store::DocumentStore;

use crate::error::ServerError;
use crate::gateway::CompletionGateway;

#[derive(Clone)]
pub struct AppState {
    /// Every store call takes this lock; it is never held across an
    /// upstream call.
    pub store: Arc<Mutex<DocumentStore>>,
    pub gateway: CompletionGateway,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/chats", get(list_chats).post(create_chat))
        .route(
            "/api/chats/:id",
            get(get_chat).patch(rename_chat).delete(delete_chat),
        )
        .route("/api/chats/:id/messages", post(send_message))
        .route("/api/chats/:id/prompt", post(send_prompt))
        .route("/api/prompts", get(list_prompts).post(create_prompt))
        .route("/api/settings", get(get_settings).put(update_settings))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Unwrap a JSON body, turning extractor rejections into a 400.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServerError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ValidationError::MalformedBody(e.body_text()).into())
}

/// Chat ids that do not parse can never match a stored chat.
fn parse_chat_id(raw: &str) -> Result<Uuid, ServerError> {
    Uuid::parse_str(raw).map_err(|_| ServerError::ChatNotFound)
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ─── Chats ───

async fn list_chats(State(state): State<AppState>) -> Json<Vec<Chat>> {
    let store = state.store.lock().await;
    Json(store.list_chats().to_vec())
}

async fn get_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Chat>, ServerError> {
    let id = parse_chat_id(&id)?;
    let store = state.store.lock().await;
    store
        .get_chat(id)
        .cloned()
        .map(Json)
        .ok_or(ServerError::ChatNotFound)
}

async fn create_chat(
    State(state): State<AppState>,
    payload: Result<Json<CreateChatRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Chat>), ServerError> {
    let title = json_body(payload)?.validate()?;
    let chat = state.store.lock().await.create_chat(&title)?;

    info!(chat = %chat.id, "Chat created via API");
    Ok((StatusCode::CREATED, Json(chat)))
}

async fn rename_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<RenameChatRequest>, JsonRejection>,
) -> Result<Json<Chat>, ServerError> {
    let title = json_body(payload)?.validate()?;
    let id = parse_chat_id(&id)?;
    let chat = state.store.lock().await.rename_chat(id, &title)?;
    Ok(Json(chat))
}

async fn delete_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServerError> {
    let id = parse_chat_id(&id)?;
    state.store.lock().await.delete_chat(id)?;

    info!(chat = %id, "Chat deleted via API");
    Ok(StatusCode::NO_CONTENT)
}

// ─── Completions ───

/// Single-turn: only the new message goes upstream.
async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<Message>, ServerError> {
    let (role, content) = json_body(payload)?.validate()?;
    let id = parse_chat_id(&id)?;

    let reply = state
        .gateway
        .single_turn(&state.store, id, role, content)
        .await?;
    Ok(Json(reply))
}

/// History-aware: the whole conversation goes upstream.
async fn send_prompt(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<SendPromptRequest>, JsonRejection>,
) -> Result<Json<PromptReply>, ServerError> {
    let content = json_body(payload)?.validate()?;
    let id = parse_chat_id(&id)?;

    let (user, ai) = state.gateway.prompt_to_chat(&state.store, id, content).await?;
    Ok(Json(PromptReply {
        user_message: user.content,
        ai_message: ai,
    }))
}

// ─── Prompts ───

async fn list_prompts(State(state): State<AppState>) -> Json<Vec<Prompt>> {
    let store = state.store.lock().await;
    Json(store.list_prompts().to_vec())
}

async fn create_prompt(
    State(state): State<AppState>,
    payload: Result<Json<CreatePromptRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Prompt>), ServerError> {
    let (title, content) = json_body(payload)?.validate()?;
    let prompt = state.store.lock().await.create_prompt(&title, &content)?;
    Ok((StatusCode::CREATED, Json(prompt)))
}

// ─── Settings ───

async fn get_settings(State(state): State<AppState>) -> Json<Settings> {
    let store = state.store.lock().await;
    Json(store.settings().clone())
}

async fn update_settings(
    State(state): State<AppState>,
    payload: Result<Json<SettingsPatch>, JsonRejection>,
) -> Result<Json<Settings>, ServerError> {
    let patch = json_body(payload)?;
    let settings = state.store.lock().await.update_settings(patch)?;
    Ok(Json(settings))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
