use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

use teamdesk_core::model::{Actor, User};
use teamdesk_core::AuthContext;

use super::response::ApiError;
use super::server::AppState;
use crate::auth::{bearer_token, TokenService};

/// Build the auth context for a request from its `Authorization` header.
pub fn extract_auth_context(headers: &HeaderMap, tokens: &TokenService) -> AuthContext {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token);

    match token {
        Some(token) => match tokens.validate(token) {
            Ok(claims) => match claims.user_id() {
                Some(id) => AuthContext::authenticated(id),
                None => AuthContext::rejected("Not authorized, token failed"),
            },
            Err(e) => AuthContext::rejected(format!(
                "Not authorized, {}",
                e.to_string().to_lowercase()
            )),
        },
        None => AuthContext::unauthenticated(),
    }
}

/// Authentication middleware function.
pub async fn auth_middleware(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let auth_context = extract_auth_context(req.headers(), state.services.auth.tokens());
    req.extensions_mut().insert(auth_context);
    next.run(req).await
}

/// The active user behind a request's bearer token.
///
/// Extraction fails with 401 when no valid token was presented or the
/// account no longer exists or is deactivated.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn actor(&self) -> Actor {
        self.0.actor()
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let context = parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .unwrap_or_default();
        let id = context.require_user_id()?;
        let user = state.services.auth.current_user(id).await?;
        Ok(Self(user))
    }
}
