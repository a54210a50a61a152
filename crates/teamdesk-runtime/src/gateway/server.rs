use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use teamdesk_core::config::GatewayConfig;

use super::auth::auth_middleware;
use super::handlers::{attendance, auth, chat, leave, notifications, projects, tasks, users};
use super::response::expose_error_details;
use super::tracing::tracing_middleware;
use crate::realtime::{ws_handler, RoomManager};
use crate::service::Services;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub rooms: Arc<RoomManager>,
}

impl AppState {
    pub fn new(services: Services, rooms: Arc<RoomManager>) -> Self {
        Self { services, rooms }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub store: &'static str,
    pub connections: usize,
}

/// Gateway HTTP server.
pub struct GatewayServer {
    config: GatewayConfig,
    state: AppState,
    expose_errors: bool,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, state: AppState) -> Self {
        Self {
            config,
            state,
            expose_errors: true,
        }
    }

    /// Include server error details in responses. Disabled in production.
    pub fn expose_errors(mut self, expose: bool) -> Self {
        self.expose_errors = expose;
        self
    }

    /// Build the Axum router.
    pub fn router(&self) -> Router {
        let api = Router::new()
            .route("/auth/register", post(auth::register))
            .route("/auth/login", post(auth::login))
            .route("/auth/me", get(auth::me))
            .route("/auth/profile", put(auth::update_profile))
            .route("/auth/password", put(auth::change_password))
            .route("/users", get(users::list))
            .route(
                "/users/{id}",
                get(users::get).put(users::update).delete(users::delete),
            )
            .route("/users/{id}/activities", get(users::activities))
            .route("/tasks", get(tasks::list).post(tasks::create))
            .route(
                "/tasks/{id}",
                get(tasks::get).put(tasks::update).delete(tasks::delete),
            )
            .route(
                "/tasks/{id}/comments",
                get(tasks::comments).post(tasks::add_comment),
            )
            .route("/projects", get(projects::list).post(projects::create))
            .route(
                "/projects/{id}",
                get(projects::get)
                    .put(projects::update)
                    .delete(projects::delete),
            )
            .route("/projects/{id}/team", post(projects::add_member))
            .route(
                "/projects/{id}/team/{user_id}",
                axum::routing::delete(projects::remove_member),
            )
            .route("/attendance", get(attendance::list))
            .route("/attendance/check-in", post(attendance::check_in))
            .route("/attendance/check-out", post(attendance::check_out))
            .route("/attendance/break/start", post(attendance::start_break))
            .route("/attendance/break/end", post(attendance::end_break))
            .route("/attendance/today", get(attendance::today))
            .route("/attendance/summary", get(attendance::summary))
            .route("/attendance/{id}", put(attendance::update))
            .route("/leave", get(leave::list).post(leave::create))
            .route("/leave/{id}", get(leave::get))
            .route("/leave/{id}/status", put(leave::update_status))
            .route("/leave/{id}/cancel", put(leave::cancel))
            .route("/notifications", get(notifications::list))
            .route("/notifications/read-all", put(notifications::mark_all_read))
            .route("/notifications/broadcast", post(notifications::broadcast))
            .route("/notifications/{id}/read", put(notifications::mark_read))
            .route(
                "/notifications/{id}",
                axum::routing::delete(notifications::delete),
            )
            .route("/chat", get(chat::list).post(chat::create))
            .route("/chat/team", get(chat::team))
            .route("/chat/{id}", get(chat::get))
            .route(
                "/chat/{id}/messages",
                get(chat::messages).post(chat::send_message),
            )
            .route(
                "/chat/{id}/messages/{message_id}/reactions",
                post(chat::react),
            )
            .route("/chat/{id}/read", put(chat::mark_read));

        let mut router = Router::new()
            .route("/health", get(health_handler))
            .route("/ws", get(ws_handler))
            .nest("/api", api)
            .fallback(not_found);

        if self.expose_errors {
            router = router.layer(middleware::from_fn(expose_error_details));
        }

        router
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                auth_middleware,
            ))
            .layer(
                ServiceBuilder::new()
                    .layer(middleware::from_fn(tracing_middleware))
                    .layer(TraceLayer::new_for_http())
                    .layer(self.cors())
                    .layer(CompressionLayer::new())
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        self.config.request_timeout_secs,
                    ))),
            )
            .with_state(self.state.clone())
    }

    fn cors(&self) -> CorsLayer {
        if self.config.cors_origins.is_empty()
            || self.config.cors_origins.iter().any(|o| o == "*")
        {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = self
                .config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }

    /// Get the socket address to bind to.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.config.port))
    }

    /// Serve until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.addr();
        let router = self.router();

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Gateway server listening on {}", addr);
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let healthy = match state.services.store.health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Store health check failed");
            false
        }
    };
    let body = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" },
        version: env!("CARGO_PKG_VERSION"),
        store: state.services.store.backend_name(),
        connections: state.rooms.stats().await.connections,
    };
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

async fn not_found(req: Request) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "success": false,
            "message": format!("Not found - {}", req.uri().path()),
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use teamdesk_core::model::{Role, User};

    use crate::auth::{hash_password, TokenService};
    use crate::store::Store;

    struct TestApp {
        router: Router,
        state: AppState,
    }

    impl TestApp {
        fn new() -> Self {
            let services = Services::new(Store::memory(), TokenService::new("test-secret", 3600));
            let state = AppState::new(services, Arc::new(RoomManager::new()));
            let router = GatewayServer::new(GatewayConfig::default(), state.clone()).router();
            Self { router, state }
        }

        async fn seed(&self, name: &str, email: &str, role: Role) -> (User, String) {
            let user = User::new(name, email, hash_password("password123").unwrap(), role);
            self.state.services.store.insert(&user).await.unwrap();
            let token = self.state.services.auth.tokens().issue(&user).unwrap();
            (user, token)
        }

        async fn call(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = axum::http::Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
            }
            let request = match body {
                Some(body) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let json = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, json)
        }
    }

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new();
        let (status, body) = app.call(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["store"], "memory");
    }

    #[tokio::test]
    async fn test_register_login_me() {
        let app = TestApp::new();
        let (status, body) = app
            .call(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({"name": "Ann", "email": "Ann@Example.com", "password": "secret123"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["user"]["role"], "employee");

        let (status, body) = app
            .call(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({"email": "ann@example.com", "password": "secret123"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["data"]["token"].as_str().unwrap().to_string();

        let (status, body) = app.call(Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["email"], "ann@example.com");
        assert!(body["data"].get("passwordHash").is_none());
    }

    #[tokio::test]
    async fn test_missing_and_bad_tokens() {
        let app = TestApp::new();
        let (status, body) = app.call(Method::GET, "/api/tasks", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Not authorized, no token");

        let (status, _) = app
            .call(Method::GET, "/api/tasks", Some("garbage"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_deactivated_user_rejected() {
        let app = TestApp::new();
        let (mut user, token) = app.seed("Ann", "ann@example.com", Role::Employee).await;
        user.is_active = false;
        app.state.services.store.save(&user).await.unwrap();

        let (status, body) = app.call(Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Account is deactivated");
    }

    #[tokio::test]
    async fn test_unknown_route_envelope() {
        let app = TestApp::new();
        let (status, body) = app.call(Method::GET, "/api/nope", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Not found - /api/nope");
    }

    #[tokio::test]
    async fn test_task_assignment_flow() {
        let app = TestApp::new();
        let (_admin, admin_token) = app.seed("Boss", "boss@example.com", Role::Admin).await;
        let (emp, emp_token) = app.seed("Emp", "emp@example.com", Role::Employee).await;

        let (status, body) = app
            .call(
                Method::POST,
                "/api/tasks",
                Some(&admin_token),
                Some(json!({"title": "Write report", "assignedTo": emp.id, "dueDate": "2024-06-01"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let task_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = app
            .call(Method::GET, "/api/notifications", Some(&emp_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["unreadCount"], 1);
        assert_eq!(body["pagination"]["total"], 1);
        assert_eq!(body["data"][0]["type"], "task_assigned");

        let (status, body) = app
            .call(
                Method::PUT,
                &format!("/api/tasks/{}", task_id),
                Some(&emp_token),
                Some(json!({"status": "done"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["completedDate"].is_string());

        let (_, body) = app
            .call(Method::GET, "/api/notifications", Some(&admin_token), None)
            .await;
        assert_eq!(body["data"][0]["type"], "task_completed");
    }

    #[tokio::test]
    async fn test_attendance_double_check_in() {
        let app = TestApp::new();
        let (_, token) = app.seed("Emp", "emp@example.com", Role::Employee).await;

        let (status, _) = app
            .call(Method::POST, "/api/attendance/check-in", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = app
            .call(Method::POST, "/api/attendance/check-in", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Already checked in today");
    }

    #[tokio::test]
    async fn test_employee_cannot_broadcast() {
        let app = TestApp::new();
        let (_, token) = app.seed("Emp", "emp@example.com", Role::Employee).await;
        let (status, body) = app
            .call(
                Method::POST,
                "/api/notifications/broadcast",
                Some(&token),
                Some(json!({"title": "Hi", "message": "All hands"})),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Admin access required");
    }

    #[tokio::test]
    async fn test_invalid_body_is_validation_error() {
        let app = TestApp::new();
        let (_, token) = app.seed("Emp", "emp@example.com", Role::Employee).await;
        let (status, body) = app
            .call(
                Method::POST,
                "/api/leave",
                Some(&token),
                Some(json!({"type": "holiday"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"]
            .as_str()
            .unwrap()
            .starts_with("Invalid request body"));
    }

    #[tokio::test]
    async fn test_pagination_params() {
        let app = TestApp::new();
        let (_, token) = app.seed("Boss", "boss@example.com", Role::Admin).await;
        for i in 0..3 {
            app.seed(&format!("User {}", i), &format!("u{}@example.com", i), Role::Employee)
                .await;
        }

        let (status, body) = app
            .call(Method::GET, "/api/users?page=2&limit=3", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["total"], 4);
        assert_eq!(body["pagination"]["pages"], 2);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_huge_page_is_empty_not_an_error() {
        let app = TestApp::new();
        let (_, token) = app.seed("Boss", "boss@example.com", Role::Admin).await;

        let (status, body) = app
            .call(
                Method::GET,
                "/api/tasks?page=18446744073709551615",
                Some(&token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 0);
        assert_eq!(body["pagination"]["total"], 0);
    }
}
