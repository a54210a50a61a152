use axum::extract::State;
use uuid::Uuid;

use teamdesk_core::model::PageRequest;

use crate::gateway::auth::CurrentUser;
use crate::gateway::response::{report, ApiResponse, ApiResult};
use crate::gateway::server::AppState;
use crate::service::{MemberInput, ProjectInput, ProjectQuery, ProjectUpdate};

use super::{Body, Ids, Params};

pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Params(query): Params<ProjectQuery>,
    Params(page): Params<PageRequest>,
) -> ApiResult {
    ApiResponse::page(state.services.projects.list(&user.actor(), query, &page).await?)
}

pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Body(input): Body<ProjectInput>,
) -> ApiResult {
    let project = report(
        "create_project",
        state.services.projects.create(&user.actor(), input).await?,
    );
    Ok(ApiResponse::created(project)?.with_message("Project created successfully"))
}

pub async fn get(State(state): State<AppState>, user: CurrentUser, Ids(id): Ids<Uuid>) -> ApiResult {
    ApiResponse::ok(state.services.projects.get(&user.actor(), id).await?)
}

pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Ids(id): Ids<Uuid>,
    Body(update): Body<ProjectUpdate>,
) -> ApiResult {
    let project = report(
        "update_project",
        state.services.projects.update(&user.actor(), id, update).await?,
    );
    Ok(ApiResponse::ok(project)?.with_message("Project updated successfully"))
}

pub async fn delete(State(state): State<AppState>, user: CurrentUser, Ids(id): Ids<Uuid>) -> ApiResult {
    report(
        "delete_project",
        state.services.projects.delete(&user.actor(), id).await?,
    );
    Ok(ApiResponse::message("Project deleted successfully"))
}

pub async fn add_member(
    State(state): State<AppState>,
    user: CurrentUser,
    Ids(id): Ids<Uuid>,
    Body(input): Body<MemberInput>,
) -> ApiResult {
    let project = report(
        "add_project_member",
        state.services.projects.add_member(&user.actor(), id, input).await?,
    );
    Ok(ApiResponse::ok(project)?.with_message("Team member added successfully"))
}

pub async fn remove_member(
    State(state): State<AppState>,
    user: CurrentUser,
    Ids((id, member)): Ids<(Uuid, Uuid)>,
) -> ApiResult {
    let project = report(
        "remove_project_member",
        state
            .services
            .projects
            .remove_member(&user.actor(), id, member)
            .await?,
    );
    Ok(ApiResponse::ok(project)?.with_message("Team member removed successfully"))
}
