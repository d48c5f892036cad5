//! Realtime event stream
//!
//! - `events`: frame decoding
//! - `connection`: WebSocket transport
//! - `manager`: connect/reconnect loop feeding frames to the service

mod connection;
pub mod events;
mod manager;

pub use connection::{StreamConnector, StreamEvent, WebSocketConnector};
pub use events::{ConversationMarked, DesktopNotification, DirectMessageMarked, RtmEvent};
pub use manager::{
    ConnectionState, KEEP_ALIVE_INTERVAL, ReconnectPolicy, SessionEnd, StreamManager,
};
