//! REST request handlers for lists and items
//!
//! JSON in, JSON out; user-facing error messages in French. Mutations made
//! here are last-write-wins relative to the rooms and are not broadcast.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use courses_common::api::{
    validate_list_name, ImportEntry, ItemOrderEntry, ItemView, ListDetail, ListSummary, ListView,
};
use courses_common::db::models::GroceryList;
use courses_common::db::queries;
use courses_common::Error;

use crate::api::AppState;
use crate::services::item_service::{self, ItemUpdate};
use crate::services::dedup;

// ============================================================================
// Error mapping
// ============================================================================

/// Error response carrying the HTTP status and a user-facing message
pub struct ApiError(StatusCode, String);

impl ApiError {
    fn not_found(message: &str) -> Self {
        Self(StatusCode::NOT_FOUND, message.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::NotFound(message) => Self(StatusCode::NOT_FOUND, message),
            Error::InvalidInput(message) => Self(StatusCode::BAD_REQUEST, message),
            other => {
                error!("request failed: {}", other);
                Self(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Erreur interne.".to_string(),
                )
            }
        }
    }
}

/// Fetch a list by id or answer 404 (also for syntactically invalid ids)
async fn require_list(state: &AppState, list_id: &str) -> Result<GroceryList, ApiError> {
    if Uuid::parse_str(list_id).is_err() {
        return Err(ApiError::not_found("Liste introuvable."));
    }
    queries::get_list(&state.db, list_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Liste introuvable."))
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ListsResponse {
    lists: Vec<ListSummary>,
}

#[derive(Debug, Deserialize)]
pub struct CreateListRequest {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PatchListRequest {
    pub name: Option<String>,
    pub archived: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    #[serde(default)]
    pub name: String,
    pub quantity: Option<String>,
    pub notes: Option<String>,
    pub section_slug: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PatchItemRequest {
    pub name: Option<String>,
    pub quantity: Option<String>,
    pub notes: Option<String>,
    pub checked: Option<bool>,
    pub position: Option<i64>,
    pub section_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub section_order: Option<Vec<i64>>,
    pub item_orders: Option<Vec<ItemOrderEntry>>,
}

#[derive(Debug, Deserialize)]
pub struct ParseImportRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    items: Vec<ImportEntry>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health - health check endpoint
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "module": "courses-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/lists - all lists, active first
pub async fn get_lists(State(state): State<AppState>) -> Result<Json<ListsResponse>, ApiError> {
    let lists = queries::list_summaries(&state.db).await?;
    Ok(Json(ListsResponse { lists }))
}

/// POST /api/lists - create a new list
pub async fn create_list(
    State(state): State<AppState>,
    Json(body): Json<CreateListRequest>,
) -> Result<(StatusCode, Json<ListView>), ApiError> {
    let name = validate_list_name(body.name.as_deref());
    let list = queries::create_list(&state.db, &name).await?;
    info!(list_id = %list.id, name = %name, "list created");
    Ok((StatusCode::CREATED, Json(queries::list_view(&list))))
}

/// GET /api/lists/:id - list detail with items grouped by section
pub async fn get_list_detail(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
) -> Result<Json<ListDetail>, ApiError> {
    let list = require_list(&state, &list_id).await?;
    let detail = queries::list_detail(&state.db, &list).await?;
    Ok(Json(detail))
}

/// PATCH /api/lists/:id - update name and/or archived flag
pub async fn patch_list(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
    Json(body): Json<PatchListRequest>,
) -> Result<Json<ListView>, ApiError> {
    let list = require_list(&state, &list_id).await?;
    let name = body.name.map(|n| validate_list_name(Some(&n)));
    let updated = queries::update_list(&state.db, &list.id, name, body.archived)
        .await?
        .ok_or_else(|| ApiError::not_found("Liste introuvable."))?;
    info!(list_id = %list_id, archived = updated.archived, "list updated");
    Ok(Json(queries::list_view(&updated)))
}

/// DELETE /api/lists/:id - delete the list and all of its items
pub async fn delete_list(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let list = require_list(&state, &list_id).await?;
    queries::delete_list(&state.db, &list.id).await?;
    info!(list_id = %list_id, "list deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/lists/:id/items - create an item; section via assignment
pub async fn create_item(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
    Json(body): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<ItemView>), ApiError> {
    let list = require_list(&state, &list_id).await?;
    let item = item_service::create_item(
        &state.db,
        &state.assigner,
        &list,
        &body.name,
        body.quantity.as_deref().unwrap_or(""),
        body.notes.as_deref().unwrap_or(""),
        body.section_slug.as_deref(),
    )
    .await?;
    info!(list_id = %list_id, item_id = %item.id, "item created");
    Ok((StatusCode::CREATED, Json(item)))
}

/// PATCH /api/lists/:id/items/:item_id - update provided fields
pub async fn patch_item(
    State(state): State<AppState>,
    Path((list_id, item_id)): Path<(String, String)>,
    Json(body): Json<PatchItemRequest>,
) -> Result<Json<ItemView>, ApiError> {
    let list = require_list(&state, &list_id).await?;
    if Uuid::parse_str(&item_id).is_err() {
        return Err(ApiError::not_found("Article introuvable."));
    }
    let update = ItemUpdate {
        name: body.name,
        quantity: body.quantity,
        notes: body.notes,
        checked: body.checked,
        position: body.position,
        section_id: body.section_id,
    };
    let item = item_service::update_item(&state.db, &list.id, &item_id, update)
        .await?
        .ok_or_else(|| ApiError::not_found("Article introuvable."))?;
    info!(list_id = %list_id, item_id = %item_id, "item updated");
    Ok(Json(item))
}

/// DELETE /api/lists/:id/items/:item_id
pub async fn delete_item(
    State(state): State<AppState>,
    Path((list_id, item_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let list = require_list(&state, &list_id).await?;
    let deleted = Uuid::parse_str(&item_id).is_ok()
        && queries::delete_item(&state.db, &list.id, &item_id).await?;
    if !deleted {
        return Err(ApiError::not_found("Article introuvable."));
    }
    info!(list_id = %list_id, item_id = %item_id, "item deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/lists/:id/reorder - reorder sections and/or items
pub async fn reorder(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
    Json(body): Json<ReorderRequest>,
) -> Result<Json<ListDetail>, ApiError> {
    let list = require_list(&state, &list_id).await?;
    let detail = item_service::apply_reorder(
        &state.db,
        &list,
        body.section_order.as_deref(),
        body.item_orders.as_deref(),
    )
    .await?;
    info!(list_id = %list_id, "list reordered");
    Ok(Json(detail))
}

/// POST /api/lists/:id/deduplicate - merge duplicate items by name
pub async fn deduplicate(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
) -> Result<Json<ListDetail>, ApiError> {
    let list = require_list(&state, &list_id).await?;
    let detail = dedup::deduplicate_list_items(&state.db, &list).await?;
    info!(list_id = %list_id, "list deduplicated");
    Ok(Json(detail))
}

/// POST /api/lists/:id/parse-import - normalize pasted text through the
/// classifier. 503 when it yields nothing so clients can fall back to naive
/// line parsing.
pub async fn parse_import(
    State(state): State<AppState>,
    Path(list_id): Path<String>,
    Json(body): Json<ParseImportRequest>,
) -> Result<Response, ApiError> {
    require_list(&state, &list_id).await?;
    let items = state.assigner.normalize_import(&body.text).await?;
    if items.is_empty() {
        return Ok((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "error": "llm_unavailable",
                "message": "LLM indisponible ou échec de l'analyse.",
            })),
        )
            .into_response());
    }
    Ok(Json(ImportResponse { items }).into_response())
}
