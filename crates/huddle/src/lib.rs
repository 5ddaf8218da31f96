//! Huddle: a group chat backend.
//!
//! Users chat in open groups and one-to-one private groups. Messages are
//! stored once per recipient and pushed live over WebSocket connections
//! attached to cookie sessions. Service notices are encrypted per member
//! with the member's RSA public key.

pub mod api;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod group;
pub mod message;
pub mod session;
pub mod user;
pub mod ws;
