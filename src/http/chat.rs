use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use super::error::json_rejection;
use crate::{
    chat::{build_prompt, system_instruction, ChatError, StableSnapshot},
    model::Caller,
    repo::{horses, pregnancies, vaccines, visits},
    state::AppState,
    AppError, AppResult,
};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
}

pub async fn chat(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    if !state.chat.is_configured() {
        return Err(ChatError::NotConfigured.into());
    }
    let Json(request) = payload.map_err(json_rejection)?;
    let message = request
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| AppError::missing_field("message"))?;

    let horses = horses::list_scoped(&state.pool, caller.scope()).await?;
    let visits = visits::list(&state.pool, &caller.tenant_id).await?;
    let vaccines = vaccines::list(&state.pool, &caller.tenant_id).await?;
    let pregnancies = pregnancies::list(&state.pool, &caller.tenant_id).await?;
    let snapshot = StableSnapshot {
        horses: &horses,
        visits: &visits,
        vaccines: &vaccines,
        pregnancies: &pregnancies,
    };

    let chat_config = &state.config.chat;
    let system = system_instruction(&chat_config.stable_name, &chat_config.reply_language);
    let prompt = build_prompt(&snapshot, message);
    let reply = state.chat.reply(&system, &prompt).await.map_err(|err| {
        error!(target: "stablebook", event = "chat_failed", tenant = %caller.tenant_id, error = %err);
        AppError::from(err)
    })?;
    Ok(Json(json!({ "reply": reply })))
}
