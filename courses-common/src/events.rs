//! Broadcast event types for the real-time channel
//!
//! Each applied room command produces at most one of these events, which is
//! fanned out to every subscriber of the list's room. The `action` tag is the
//! outbound wire vocabulary; error replies are plain `{"error": ...}` objects
//! and are never represented here (they go to the originating connection
//! only).

use serde::{Deserialize, Serialize};

use crate::api::{ItemView, ListDetail};

/// Events broadcast to all live subscribers of one list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ListEvent {
    /// A new item was created on the list
    ItemAdded { item: ItemView },

    /// An existing item was modified (includes check/uncheck)
    ItemUpdated { item: ItemView },

    /// An item was removed from the list
    ItemDeleted { item_id: String },

    /// A bulk change touched many positions; clients should re-render
    /// from the full detail snapshot
    ListUpdated { list: ListDetail },
}
