//! Database models
//!
//! List and item ids are UUIDs stored as text; sections and keywords use
//! integer rowids. Syntax validation of incoming id strings happens at the
//! API boundary, so the storage layer works with plain strings.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Store section (e.g. Fruits & Légumes). French label, slug for assignment.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Section {
    pub id: i64,
    pub name_slug: String,
    pub label_fr: String,
    pub position: i64,
}

/// Normalized keyword mapping to a section. Seeded at init, learned from the
/// classifier afterwards.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SectionKeyword {
    pub id: i64,
    pub keyword: String,
    pub section_id: i64,
}

/// A single grocery list. One URL = one list.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct GroceryList {
    pub id: String,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub archived: bool,
    pub position: i64,
}

/// An item on a grocery list. Belongs to a list and a section.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub list_id: String,
    pub name: String,
    pub section_id: i64,
    pub quantity: String,
    pub notes: String,
    pub checked: bool,
    pub position: i64,
}

/// Secret access token. Presenting a non-revoked token grants entry.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AccessToken {
    pub id: i64,
    pub token: String,
    pub label: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub revoked: bool,
}
