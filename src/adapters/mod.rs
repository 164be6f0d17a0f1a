// Adapters layer: concrete implementations of the domain ports (login server, websocket).

pub mod auth;
pub mod websocket;
