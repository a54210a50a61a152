use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, warn};

use teamdesk_core::model::{Page, Pagination};
use teamdesk_core::{Outcome, TeamdeskError};

/// JSON envelope returned by every REST endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    /// Endpoint-specific top-level fields such as `unreadCount`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(skip)]
    status: StatusCode,
}

impl ApiResponse {
    /// A 200 response carrying `data`.
    pub fn ok(data: impl Serialize) -> Result<Self, ApiError> {
        Ok(Self {
            success: true,
            message: None,
            data: Some(serde_json::to_value(data).map_err(TeamdeskError::from)?),
            pagination: None,
            extra: Map::new(),
            status: StatusCode::OK,
        })
    }

    /// A 201 response carrying `data`.
    pub fn created(data: impl Serialize) -> Result<Self, ApiError> {
        let mut resp = Self::ok(data)?;
        resp.status = StatusCode::CREATED;
        Ok(resp)
    }

    /// A page of items with its pagination block.
    pub fn page<T: Serialize>(page: Page<T>) -> Result<Self, ApiError> {
        let mut resp = Self::ok(page.items)?;
        resp.pagination = Some(page.pagination);
        Ok(resp)
    }

    /// A data-less success carrying only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
            pagination: None,
            extra: Map::new(),
            status: StatusCode::OK,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Log side effects that failed after the entity itself was saved.
pub fn report<T>(operation: &str, outcome: Outcome<T>) -> T {
    if !outcome.is_complete() {
        warn!(
            operation,
            failures = ?outcome.failures(),
            "Mutation completed with failed side effects"
        );
    }
    outcome.entity
}

/// A failed request, rendered as `{success: false, message}`.
#[derive(Debug)]
pub struct ApiError(pub TeamdeskError);

/// Detail of a server error, attached to the response for
/// [`expose_error_details`] to render outside production.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            TeamdeskError::Validation(_)
            | TeamdeskError::Conflict(_)
            | TeamdeskError::Duplicate { .. } => StatusCode::BAD_REQUEST,
            TeamdeskError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            TeamdeskError::Forbidden(_) => StatusCode::FORBIDDEN,
            TeamdeskError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Store and internal failures collapse to a
    /// generic message.
    pub fn message(&self) -> String {
        match &self.0 {
            TeamdeskError::Validation(m)
            | TeamdeskError::Conflict(m)
            | TeamdeskError::Unauthorized(m)
            | TeamdeskError::Forbidden(m) => m.clone(),
            TeamdeskError::NotFound(what) => format!("{} not found", what),
            TeamdeskError::Duplicate { .. } => "Resource already exists".to_string(),
            _ => "Server Error".to_string(),
        }
    }
}

impl From<TeamdeskError> for ApiError {
    fn from(error: TeamdeskError) -> Self {
        Self(error)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            success: false,
            message: self.message(),
            error: None,
        };
        let mut response = (status, Json(body)).into_response();
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
            response
                .extensions_mut()
                .insert(ErrorDetail(self.0.to_string()));
        }
        response
    }
}

/// Re-render server errors with their detail. Installed only outside
/// production.
pub async fn expose_error_details(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let response = next.run(req).await;
    match response.extensions().get::<ErrorDetail>().cloned() {
        Some(ErrorDetail(detail)) => {
            let body = ErrorBody {
                success: false,
                message: "Server Error".to_string(),
                error: Some(detail),
            };
            (response.status(), Json(body)).into_response()
        }
        None => response,
    }
}

pub type ApiResult = Result<ApiResponse, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use teamdesk_core::model::PageRequest;
    use teamdesk_core::StepOutcome;

    #[test]
    fn test_ok_envelope() {
        let resp = ApiResponse::ok(serde_json::json!({"id": 1})).unwrap();
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["id"], 1);
        assert!(json.get("message").is_none());
        assert!(json.get("pagination").is_none());
    }

    #[test]
    fn test_page_envelope_with_extra_field() {
        let page = Page {
            items: vec![1, 2],
            pagination: PageRequest::new(1, 2).pagination(5),
        };
        let resp = ApiResponse::page(page).unwrap().with_field("unreadCount", 3);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["pagination"]["pages"], 3);
        assert_eq!(json["unreadCount"], 3);
    }

    #[test]
    fn test_created_status() {
        let resp = ApiResponse::created("x").unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    #[test]
    fn test_error_status_codes() {
        let status = |e: TeamdeskError| ApiError(e).status_code();
        assert_eq!(status(TeamdeskError::validation("")), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(TeamdeskError::Conflict("".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(TeamdeskError::Unauthorized("".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status(TeamdeskError::forbidden("")), StatusCode::FORBIDDEN);
        assert_eq!(status(TeamdeskError::not_found("Task")), StatusCode::NOT_FOUND);
        assert_eq!(
            status(TeamdeskError::Database("down".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_server_error_detail_kept_out_of_body() {
        let response = ApiError(TeamdeskError::Database("connection reset".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let detail = response.extensions().get::<ErrorDetail>().unwrap();
        assert!(detail.0.contains("connection reset"));
    }

    #[test]
    fn test_not_found_message() {
        let err = ApiError(TeamdeskError::not_found("Task"));
        assert_eq!(err.message(), "Task not found");
    }

    #[test]
    fn test_report_returns_entity() {
        let outcome = Outcome::new(7).with_activity(StepOutcome::Failed {
            reason: "store down".into(),
        });
        assert_eq!(report("test", outcome), 7);
    }
}
