//! TeamDesk runtime: storage backends, domain services, the HTTP gateway and
//! the chat relay.

pub mod auth;
pub mod db;
pub mod gateway;
pub mod maintenance;
pub mod migrations;
pub mod realtime;
pub mod service;
pub mod store;

pub use auth::TokenService;
pub use db::Database;
pub use gateway::{AppState, GatewayServer};
pub use maintenance::NotificationPurger;
pub use migrations::MigrationRunner;
pub use realtime::RoomManager;
pub use service::Services;
pub use store::{MemoryStore, PgStore, Store};
