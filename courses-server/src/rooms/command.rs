//! Closed command vocabulary for the real-time channel
//!
//! Inbound messages are decoded into this enum at the gateway boundary;
//! anything outside it is answered with a direct error reply and never
//! reaches the room logic.

use serde::Deserialize;

use courses_common::api::ItemOrderEntry;

fn default_checked() -> bool {
    true
}

/// One mutation command sent by a connected client
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientCommand {
    AddItem {
        #[serde(default)]
        name: String,
        #[serde(default)]
        quantity: String,
        #[serde(default)]
        notes: String,
        #[serde(default)]
        section_slug: Option<String>,
    },
    UpdateItem {
        #[serde(default)]
        item_id: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        quantity: Option<String>,
        #[serde(default)]
        notes: Option<String>,
        #[serde(default)]
        checked: Option<bool>,
        #[serde(default)]
        position: Option<i64>,
        #[serde(default)]
        section_id: Option<i64>,
    },
    DeleteItem {
        #[serde(default)]
        item_id: String,
    },
    /// Convenience alias for update_item limited to the checked flag
    CheckItem {
        #[serde(default)]
        item_id: String,
        #[serde(default = "default_checked")]
        checked: bool,
    },
    ReorderItems {
        #[serde(default)]
        section_order: Option<Vec<i64>>,
        #[serde(default)]
        item_orders: Option<Vec<ItemOrderEntry>>,
    },
}
