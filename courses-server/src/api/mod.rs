//! HTTP and WebSocket API

pub mod handlers;
pub mod ws;

use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

use crate::auth::AccessGate;
use crate::rooms::RoomRegistry;
use crate::services::section_assigner::SectionAssigner;

/// Application state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub rooms: Arc<RoomRegistry>,
    pub assigner: Arc<SectionAssigner>,
    pub gate: Arc<dyn AccessGate>,
}

/// Build the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/lists",
            get(handlers::get_lists).post(handlers::create_list),
        )
        .route(
            "/api/lists/:list_id",
            get(handlers::get_list_detail)
                .patch(handlers::patch_list)
                .delete(handlers::delete_list),
        )
        .route("/api/lists/:list_id/items", post(handlers::create_item))
        .route(
            "/api/lists/:list_id/items/:item_id",
            patch(handlers::patch_item).delete(handlers::delete_item),
        )
        .route("/api/lists/:list_id/reorder", patch(handlers::reorder))
        .route(
            "/api/lists/:list_id/deduplicate",
            post(handlers::deduplicate),
        )
        .route(
            "/api/lists/:list_id/parse-import",
            post(handlers::parse_import),
        )
        .route("/ws/list/:list_id", get(ws::list_socket))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
