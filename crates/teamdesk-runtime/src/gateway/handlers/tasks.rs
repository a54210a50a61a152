use axum::extract::State;
use uuid::Uuid;

use teamdesk_core::model::PageRequest;

use crate::gateway::auth::CurrentUser;
use crate::gateway::response::{report, ApiResponse, ApiResult};
use crate::gateway::server::AppState;
use crate::service::{CommentInput, TaskInput, TaskQuery, TaskUpdate};

use super::{Body, Ids, Params};

pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Params(query): Params<TaskQuery>,
    Params(page): Params<PageRequest>,
) -> ApiResult {
    ApiResponse::page(state.services.tasks.list(&user.actor(), query, &page).await?)
}

pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Body(input): Body<TaskInput>,
) -> ApiResult {
    let task = report("create_task", state.services.tasks.create(&user.actor(), input).await?);
    Ok(ApiResponse::created(task)?.with_message("Task created successfully"))
}

pub async fn get(State(state): State<AppState>, user: CurrentUser, Ids(id): Ids<Uuid>) -> ApiResult {
    ApiResponse::ok(state.services.tasks.get(&user.actor(), id).await?)
}

pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Ids(id): Ids<Uuid>,
    Body(update): Body<TaskUpdate>,
) -> ApiResult {
    let task = report(
        "update_task",
        state.services.tasks.update(&user.actor(), id, update).await?,
    );
    Ok(ApiResponse::ok(task)?.with_message("Task updated successfully"))
}

pub async fn delete(State(state): State<AppState>, user: CurrentUser, Ids(id): Ids<Uuid>) -> ApiResult {
    report("delete_task", state.services.tasks.delete(&user.actor(), id).await?);
    Ok(ApiResponse::message("Task deleted successfully"))
}

pub async fn comments(State(state): State<AppState>, user: CurrentUser, Ids(id): Ids<Uuid>) -> ApiResult {
    ApiResponse::ok(state.services.comments.list(&user.actor(), id).await?)
}

pub async fn add_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Ids(id): Ids<Uuid>,
    Body(input): Body<CommentInput>,
) -> ApiResult {
    let comment = report(
        "add_comment",
        state.services.comments.add(&user.actor(), id, input).await?,
    );
    Ok(ApiResponse::created(comment)?.with_message("Comment added successfully"))
}
