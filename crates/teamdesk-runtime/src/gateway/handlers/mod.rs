//! REST handlers, one module per resource.
//!
//! Handlers translate between HTTP and the services: extract the caller and
//! the inputs, call exactly one service operation, and wrap its result in
//! the JSON envelope.

pub mod attendance;
pub mod auth;
pub mod chat;
pub mod leave;
pub mod notifications;
pub mod projects;
pub mod tasks;
pub mod users;

use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;

use teamdesk_core::TeamdeskError;

use super::response::ApiError;

/// JSON request body. Rejections are reported as validation errors and an
/// empty body reads as `{}`.
#[derive(Debug, Clone)]
pub struct Body<T>(pub T);

impl<S, T> FromRequest<S> for Body<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError(TeamdeskError::validation(e.body_text())))?;
        let raw: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
            b"{}"
        } else {
            &bytes
        };
        serde_json::from_slice(raw)
            .map(Body)
            .map_err(|e| ApiError(TeamdeskError::validation(format!("Invalid request body: {}", e))))
    }
}

/// Query-string parameters.
#[derive(Debug, Clone)]
pub struct Params<T>(pub T);

impl<S, T> FromRequestParts<S> for Params<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(v)| Params(v))
            .map_err(|e| ApiError(TeamdeskError::validation(e.body_text())))
    }
}

/// Path segments, typically entity ids.
#[derive(Debug, Clone)]
pub struct Ids<T>(pub T);

impl<S, T> FromRequestParts<S> for Ids<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Path::<T>::from_request_parts(parts, state)
            .await
            .map(|Path(v)| Ids(v))
            .map_err(|_| ApiError(TeamdeskError::validation("Invalid id")))
    }
}
