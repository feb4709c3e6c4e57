//! HTTP media gateway and WebSocket endpoint

pub mod handlers;
pub mod media;
pub mod server;
pub mod websocket;

pub use media::{resolve_range, ByteRange};
pub use server::{router, serve, ws_router, AppState};
