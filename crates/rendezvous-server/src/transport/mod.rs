//! Session transport: accepts WebSocket connections.

pub mod websocket;
