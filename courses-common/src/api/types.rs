//! View types returned to clients plus input validation helpers.
//!
//! All user-supplied text fields are length-bounded by truncation, never by
//! rejection; only an empty item name is a hard validation error.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Maximum length (chars) of a list name
pub const MAX_LIST_NAME: usize = 200;
/// Maximum length (chars) of an item name
pub const MAX_ITEM_NAME: usize = 200;
/// Maximum length (chars) of an item quantity
pub const MAX_QUANTITY: usize = 80;
/// Maximum length (chars) of item notes
pub const MAX_NOTES: usize = 2000;

/// Store section as exposed to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionView {
    pub id: i64,
    pub slug: String,
    pub label_fr: String,
    pub position: i64,
}

/// Item as exposed to clients (section slug/label denormalized for display)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemView {
    pub id: String,
    pub name: String,
    pub section_id: i64,
    pub section_slug: String,
    pub section_label: String,
    pub quantity: String,
    pub notes: String,
    pub checked: bool,
    pub position: i64,
}

/// List header as exposed to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListView {
    pub id: String,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub archived: bool,
    pub position: i64,
}

/// List header plus item counters, for the list index endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListSummary {
    #[serde(flatten)]
    pub list: ListView,
    pub items_count: i64,
    pub items_checked: i64,
}

/// One catalog section with the list's items assigned to it, in position order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionGroup {
    pub section_id: i64,
    pub section_slug: String,
    pub section_label: String,
    pub items: Vec<ItemView>,
}

/// Full list detail: header plus items grouped under every catalog section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListDetail {
    #[serde(flatten)]
    pub list: ListView,
    pub sections: Vec<SectionGroup>,
}

/// One normalized entry from a bulk free-text import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportEntry {
    pub name: String,
    pub quantity: String,
    pub section_slug: Option<String>,
}

/// One entry of a `reorder_items` request.
///
/// Either an explicit `{item_id, position}` pair, or a `{section_id,
/// item_ids}` group where each item's position becomes its index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemOrderEntry {
    ByPosition { item_id: String, position: i64 },
    BySection { section_id: i64, item_ids: Vec<String> },
}

/// Truncate to at most `max` characters (not bytes)
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Default list name, e.g. "Liste du 06/08/2026"
pub fn default_list_name() -> String {
    format!("Liste du {}", chrono::Local::now().format("%d/%m/%Y"))
}

/// Validate a list name: trimmed and bounded, falling back to the default
pub fn validate_list_name(name: Option<&str>) -> String {
    let s = truncate_chars(name.unwrap_or("").trim(), MAX_LIST_NAME);
    if s.is_empty() {
        default_list_name()
    } else {
        s
    }
}

/// Validate an item name: required non-empty after trimming, bounded
pub fn validate_item_name(name: &str) -> Result<String> {
    let s = truncate_chars(name.trim(), MAX_ITEM_NAME);
    if s.is_empty() {
        return Err(Error::InvalidInput(
            "Le nom de l'article est requis.".to_string(),
        ));
    }
    Ok(s)
}

/// Bound a quantity value (empty when absent)
pub fn bound_quantity(value: Option<&str>) -> String {
    truncate_chars(value.unwrap_or("").trim(), MAX_QUANTITY)
}

/// Bound a notes value (empty when absent)
pub fn bound_notes(value: Option<&str>) -> String {
    truncate_chars(value.unwrap_or("").trim(), MAX_NOTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_name_required() {
        assert!(validate_item_name("").is_err());
        assert!(validate_item_name("   ").is_err());
        assert_eq!(validate_item_name("  Lait ").unwrap(), "Lait");
    }

    #[test]
    fn list_name_falls_back_to_default() {
        assert!(validate_list_name(None).starts_with("Liste du "));
        assert!(validate_list_name(Some("  ")).starts_with("Liste du "));
        assert_eq!(validate_list_name(Some("Courses")), "Courses");
    }

    #[test]
    fn truncation_counts_chars_not_bytes() {
        // multi-byte characters must not panic on boundaries
        let s = "éléphant".repeat(40);
        let bounded = truncate_chars(&s, MAX_QUANTITY);
        assert_eq!(bounded.chars().count(), MAX_QUANTITY);
    }

    #[test]
    fn order_entry_decodes_both_shapes() {
        let by_pos: ItemOrderEntry =
            serde_json::from_str(r#"{"item_id": "abc", "position": 5}"#).unwrap();
        assert!(matches!(by_pos, ItemOrderEntry::ByPosition { position: 5, .. }));

        let by_section: ItemOrderEntry =
            serde_json::from_str(r#"{"section_id": 3, "item_ids": ["a", "b"]}"#).unwrap();
        assert!(matches!(by_section, ItemOrderEntry::BySection { section_id: 3, .. }));
    }
}
