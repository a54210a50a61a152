use axum::extract::State;
use chrono::Utc;
use uuid::Uuid;

use teamdesk_core::model::PageRequest;

use crate::gateway::auth::CurrentUser;
use crate::gateway::response::{report, ApiResponse, ApiResult};
use crate::gateway::server::AppState;
use crate::service::{ChatInput, MessageInput, ReactionInput};

use super::{Body, Ids, Params};

pub async fn list(State(state): State<AppState>, user: CurrentUser) -> ApiResult {
    ApiResponse::ok(state.services.chat.list(&user.actor()).await?)
}

pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Body(input): Body<ChatInput>,
) -> ApiResult {
    let chat = report("create_chat", state.services.chat.create(&user.actor(), input).await?);
    ApiResponse::created(chat)
}

pub async fn team(State(state): State<AppState>, _user: CurrentUser) -> ApiResult {
    ApiResponse::ok(state.services.chat.team().await?)
}

pub async fn get(State(state): State<AppState>, user: CurrentUser, Ids(id): Ids<Uuid>) -> ApiResult {
    ApiResponse::ok(state.services.chat.get(&user.actor(), id).await?)
}

pub async fn messages(
    State(state): State<AppState>,
    user: CurrentUser,
    Ids(id): Ids<Uuid>,
    Params(page): Params<PageRequest>,
) -> ApiResult {
    ApiResponse::page(state.services.chat.messages(&user.actor(), id, &page).await?)
}

pub async fn send_message(
    State(state): State<AppState>,
    user: CurrentUser,
    Ids(id): Ids<Uuid>,
    Body(input): Body<MessageInput>,
) -> ApiResult {
    let message = report(
        "send_message",
        state
            .services
            .chat
            .send_message(&user.actor(), id, input)
            .await?,
    );
    ApiResponse::created(message)
}

pub async fn react(
    State(state): State<AppState>,
    user: CurrentUser,
    Ids((id, message)): Ids<(Uuid, Uuid)>,
    Body(input): Body<ReactionInput>,
) -> ApiResult {
    ApiResponse::ok(
        state
            .services
            .chat
            .react(&user.actor(), id, message, input)
            .await?,
    )
}

pub async fn mark_read(State(state): State<AppState>, user: CurrentUser, Ids(id): Ids<Uuid>) -> ApiResult {
    ApiResponse::ok(
        state
            .services
            .chat
            .mark_read(&user.actor(), id, Utc::now())
            .await?,
    )
}
