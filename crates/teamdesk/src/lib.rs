//! TeamDesk server.
//!
//! Wires configuration, storage, services, the HTTP gateway and background
//! maintenance into one process.

mod runtime;

pub use runtime::{init_tracing, TeamDesk, TeamDeskBuilder};
pub use teamdesk_core::TeamdeskConfig;
