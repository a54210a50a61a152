//! HTTP gateway: REST routes under `/api`, the relay upgrade at `/ws`, and
//! the request middleware stack.

mod auth;
mod handlers;
mod response;
mod server;
mod tracing;

pub use auth::{auth_middleware, extract_auth_context, CurrentUser};
pub use response::{report, ApiError, ApiResponse, ApiResult};
pub use server::{AppState, GatewayServer, HealthResponse};
pub use self::tracing::{TracingState, REQUEST_ID_HEADER, TRACE_ID_HEADER};
