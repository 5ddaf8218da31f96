//! Real-time connections: handles, fan-out, protocol types and the socket
//! endpoint.

mod broadcaster;
mod connection;
mod handler;
mod types;

pub use broadcaster::Broadcaster;
pub use connection::{ChannelConnection, ConnectionHandle, ConnectionId, next_connection_id};
pub use handler::ws_handler;
pub use types::{MemberEvent, NewGroupEvent, SendMessage, WsCommand, WsEvent};

#[cfg(test)]
pub(crate) use connection::testing;
