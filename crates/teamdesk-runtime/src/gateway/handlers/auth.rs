use axum::extract::State;

use crate::gateway::auth::CurrentUser;
use crate::gateway::response::{report, ApiResponse, ApiResult};
use crate::gateway::server::AppState;
use crate::service::{LoginInput, PasswordChange, ProfileUpdate, RegisterInput};

use super::Body;

pub async fn register(State(state): State<AppState>, Body(input): Body<RegisterInput>) -> ApiResult {
    let session = report("register", state.services.auth.register(input).await?);
    Ok(ApiResponse::created(session)?.with_message("User registered successfully"))
}

pub async fn login(State(state): State<AppState>, Body(input): Body<LoginInput>) -> ApiResult {
    let session = state.services.auth.login(input).await?;
    ApiResponse::ok(session)
}

pub async fn me(user: CurrentUser) -> ApiResult {
    ApiResponse::ok(user.0.public())
}

pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Body(update): Body<ProfileUpdate>,
) -> ApiResult {
    let profile = report(
        "update_profile",
        state.services.auth.update_profile(user, update).await?,
    );
    Ok(ApiResponse::ok(profile)?.with_message("Profile updated successfully"))
}

pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Body(change): Body<PasswordChange>,
) -> ApiResult {
    report(
        "change_password",
        state.services.auth.change_password(user, change).await?,
    );
    Ok(ApiResponse::message("Password updated successfully"))
}
