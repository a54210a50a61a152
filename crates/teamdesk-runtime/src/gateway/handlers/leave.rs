use axum::extract::State;
use chrono::Utc;
use uuid::Uuid;

use teamdesk_core::model::{LeaveStatus, PageRequest};

use crate::gateway::auth::CurrentUser;
use crate::gateway::response::{report, ApiResponse, ApiResult};
use crate::gateway::server::AppState;
use crate::service::{LeaveDecision, LeaveInput, LeaveQuery};

use super::{Body, Ids, Params};

pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Body(input): Body<LeaveInput>,
) -> ApiResult {
    let request = report("request_leave", state.services.leave.create(&user.actor(), input).await?);
    Ok(ApiResponse::created(request)?.with_message("Leave request submitted successfully"))
}

pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Params(query): Params<LeaveQuery>,
    Params(page): Params<PageRequest>,
) -> ApiResult {
    ApiResponse::page(state.services.leave.list(&user.actor(), query, &page).await?)
}

pub async fn get(State(state): State<AppState>, user: CurrentUser, Ids(id): Ids<Uuid>) -> ApiResult {
    ApiResponse::ok(state.services.leave.get(&user.actor(), id).await?)
}

pub async fn update_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Ids(id): Ids<Uuid>,
    Body(decision): Body<LeaveDecision>,
) -> ApiResult {
    let request = report(
        "decide_leave",
        state
            .services
            .leave
            .update_status(&user.actor(), id, decision, Utc::now())
            .await?,
    );
    let message = match request.status {
        LeaveStatus::Approved => "Leave request approved",
        _ => "Leave request rejected",
    };
    Ok(ApiResponse::ok(request)?.with_message(message))
}

pub async fn cancel(State(state): State<AppState>, user: CurrentUser, Ids(id): Ids<Uuid>) -> ApiResult {
    let request = report(
        "cancel_leave",
        state
            .services
            .leave
            .cancel(&user.actor(), id, Utc::now())
            .await?,
    );
    Ok(ApiResponse::ok(request)?.with_message("Leave request cancelled"))
}
