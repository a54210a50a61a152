use axum::extract::State;
use chrono::Utc;
use uuid::Uuid;

use teamdesk_core::model::PageRequest;

use crate::gateway::auth::CurrentUser;
use crate::gateway::response::{report, ApiResponse, ApiResult};
use crate::gateway::server::AppState;
use crate::service::{BroadcastInput, InboxQuery};

use super::{Body, Ids, Params};

pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Params(query): Params<InboxQuery>,
    Params(page): Params<PageRequest>,
) -> ApiResult {
    let inbox = state
        .services
        .notifications
        .list(&user.actor(), query, &page, Utc::now())
        .await?;
    Ok(ApiResponse::page(inbox.page)?.with_field("unreadCount", inbox.unread_count))
}

pub async fn mark_read(State(state): State<AppState>, user: CurrentUser, Ids(id): Ids<Uuid>) -> ApiResult {
    let notification = state
        .services
        .notifications
        .mark_read(&user.actor(), id, Utc::now())
        .await?;
    ApiResponse::ok(notification)
}

pub async fn mark_all_read(State(state): State<AppState>, user: CurrentUser) -> ApiResult {
    let marked = state
        .services
        .notifications
        .mark_all_read(&user.actor(), Utc::now())
        .await?;
    Ok(ApiResponse::ok(marked)?.with_message("All notifications marked as read"))
}

pub async fn delete(State(state): State<AppState>, user: CurrentUser, Ids(id): Ids<Uuid>) -> ApiResult {
    state.services.notifications.delete(&user.actor(), id).await?;
    Ok(ApiResponse::message("Notification deleted"))
}

pub async fn broadcast(
    State(state): State<AppState>,
    user: CurrentUser,
    Body(input): Body<BroadcastInput>,
) -> ApiResult {
    let notification = report(
        "broadcast",
        state
            .services
            .notifications
            .broadcast(&user.actor(), input)
            .await?,
    );
    Ok(ApiResponse::created(notification)?.with_message("Announcement sent successfully"))
}
