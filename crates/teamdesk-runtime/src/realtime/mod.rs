//! Real-time chat relay.
//!
//! Connections join rooms keyed by chat id. Events are forwarded between
//! connections without persistence; clients persist messages over REST
//! and use the relay only for delivery.

mod relay;
mod rooms;

pub use relay::{ws_handler, ClientEvent, ServerEvent};
pub use rooms::{ConnectionId, RoomManager, RoomStats};
