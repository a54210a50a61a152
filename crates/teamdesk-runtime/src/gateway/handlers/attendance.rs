use axum::extract::State;
use chrono::Utc;
use uuid::Uuid;

use teamdesk_core::model::PageRequest;

use crate::gateway::auth::CurrentUser;
use crate::gateway::response::{report, ApiResponse, ApiResult};
use crate::gateway::server::AppState;
use crate::service::{AttendanceQuery, AttendanceUpdate, BreakInput, CheckInput};

use super::{Body, Ids, Params};

pub async fn check_in(
    State(state): State<AppState>,
    user: CurrentUser,
    Body(input): Body<CheckInput>,
) -> ApiResult {
    let record = report(
        "check_in",
        state
            .services
            .attendance
            .check_in(&user.actor(), input, Utc::now())
            .await?,
    );
    Ok(ApiResponse::created(record)?.with_message("Checked in successfully"))
}

pub async fn check_out(
    State(state): State<AppState>,
    user: CurrentUser,
    Body(input): Body<CheckInput>,
) -> ApiResult {
    let record = report(
        "check_out",
        state
            .services
            .attendance
            .check_out(&user.actor(), input, Utc::now())
            .await?,
    );
    Ok(ApiResponse::ok(record)?.with_message("Checked out successfully"))
}

pub async fn start_break(
    State(state): State<AppState>,
    user: CurrentUser,
    Body(input): Body<BreakInput>,
) -> ApiResult {
    let record = report(
        "start_break",
        state
            .services
            .attendance
            .start_break(&user.actor(), input, Utc::now())
            .await?,
    );
    Ok(ApiResponse::ok(record)?.with_message("Break started"))
}

pub async fn end_break(State(state): State<AppState>, user: CurrentUser) -> ApiResult {
    let record = report(
        "end_break",
        state
            .services
            .attendance
            .end_break(&user.actor(), Utc::now())
            .await?,
    );
    Ok(ApiResponse::ok(record)?.with_message("Break ended"))
}

pub async fn today(State(state): State<AppState>, user: CurrentUser) -> ApiResult {
    ApiResponse::ok(
        state
            .services
            .attendance
            .today(&user.actor(), Utc::now())
            .await?,
    )
}

pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Params(query): Params<AttendanceQuery>,
    Params(page): Params<PageRequest>,
) -> ApiResult {
    ApiResponse::page(
        state
            .services
            .attendance
            .list(&user.actor(), query, &page)
            .await?,
    )
}

pub async fn summary(
    State(state): State<AppState>,
    user: CurrentUser,
    Params(query): Params<AttendanceQuery>,
) -> ApiResult {
    ApiResponse::ok(state.services.attendance.summary(&user.actor(), query).await?)
}

pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Ids(id): Ids<Uuid>,
    Body(update): Body<AttendanceUpdate>,
) -> ApiResult {
    let record = report(
        "update_attendance",
        state
            .services
            .attendance
            .update(&user.actor(), id, update)
            .await?,
    );
    Ok(ApiResponse::ok(record)?.with_message("Attendance updated successfully"))
}
