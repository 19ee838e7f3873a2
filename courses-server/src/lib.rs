//! Collaborative grocery list server
//!
//! Real-time shared shopping lists with automatic French store-section
//! classification. Exposes a JSON REST API plus one WebSocket room per list
//! through which connected clients exchange mutation commands and receive
//! broadcast change events.

pub mod api;
pub mod auth;
pub mod rooms;
pub mod services;
