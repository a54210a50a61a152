use axum::extract::State;
use uuid::Uuid;

use teamdesk_core::model::PageRequest;

use crate::gateway::auth::CurrentUser;
use crate::gateway::response::{report, ApiResponse, ApiResult};
use crate::gateway::server::AppState;
use crate::service::{UserQuery, UserUpdate};

use super::{Body, Ids, Params};

pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Params(query): Params<UserQuery>,
    Params(page): Params<PageRequest>,
) -> ApiResult {
    let users = state.services.users.list(&user.actor(), query, &page).await?;
    ApiResponse::page(users)
}

pub async fn get(State(state): State<AppState>, user: CurrentUser, Ids(id): Ids<Uuid>) -> ApiResult {
    ApiResponse::ok(state.services.users.get(&user.actor(), id).await?)
}

pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Ids(id): Ids<Uuid>,
    Body(update): Body<UserUpdate>,
) -> ApiResult {
    let updated = report(
        "update_user",
        state.services.users.update(&user.actor(), id, update).await?,
    );
    Ok(ApiResponse::ok(updated)?.with_message("User updated successfully"))
}

pub async fn delete(State(state): State<AppState>, user: CurrentUser, Ids(id): Ids<Uuid>) -> ApiResult {
    report("delete_user", state.services.users.delete(&user.actor(), id).await?);
    Ok(ApiResponse::message("User deactivated successfully"))
}

pub async fn activities(
    State(state): State<AppState>,
    user: CurrentUser,
    Ids(id): Ids<Uuid>,
    Params(page): Params<PageRequest>,
) -> ApiResult {
    let feed = state
        .services
        .activities
        .list_for_user(&user.actor(), id, &page)
        .await?;
    ApiResponse::page(feed)
}
