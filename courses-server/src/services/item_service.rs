//! Shared item operations for the REST API and the room commands:
//! create, update, reorder.

use sqlx::SqlitePool;
use uuid::Uuid;

use courses_common::api::{
    bound_notes, bound_quantity, validate_item_name, ItemOrderEntry, ItemView, ListDetail,
};
use courses_common::db::models::GroceryList;
use courses_common::db::queries;
use courses_common::{Error, Result};

use crate::services::section_assigner::SectionAssigner;

/// Field subset applied by an item update; absent fields keep their value
#[derive(Debug, Clone, Default)]
pub struct ItemUpdate {
    pub name: Option<String>,
    pub quantity: Option<String>,
    pub notes: Option<String>,
    pub checked: Option<bool>,
    pub position: Option<i64>,
    pub section_id: Option<i64>,
}

/// Create one item on a list.
///
/// An explicit valid section slug wins; otherwise the assigner decides. The
/// receiving section is re-sorted alphabetically afterwards so manual adds
/// stay roughly ordered without an explicit reorder call.
pub async fn create_item(
    db: &SqlitePool,
    assigner: &SectionAssigner,
    list: &GroceryList,
    name: &str,
    quantity: &str,
    notes: &str,
    section_slug: Option<&str>,
) -> Result<ItemView> {
    let name = validate_item_name(name)?;
    let quantity = bound_quantity(Some(quantity));
    let notes = bound_notes(Some(notes));

    let section = match section_slug.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) => match queries::section_by_slug(db, slug).await? {
            Some(section) => section,
            None => assigner.assign_section(&name).await?,
        },
        None => assigner.assign_section(&name).await?,
    };

    let item = queries::insert_item(db, &list.id, &name, section.id, &quantity, &notes).await?;
    reorder_section_by_name(db, &list.id, section.id).await?;

    // re-read: the alphabetical re-sort may have moved the new item
    let item = queries::get_item(db, &list.id, &item.id)
        .await?
        .ok_or_else(|| Error::Internal("item vanished after insert".to_string()))?;
    queries::item_view(db, &item).await
}

/// Update an item by list and item id. Only provided fields are applied.
/// Returns `None` when the item no longer exists.
pub async fn update_item(
    db: &SqlitePool,
    list_id: &str,
    item_id: &str,
    update: ItemUpdate,
) -> Result<Option<ItemView>> {
    let Some(mut item) = queries::get_item(db, list_id, item_id).await? else {
        return Ok(None);
    };
    if let Some(name) = update.name {
        item.name = validate_item_name(&name)?;
    }
    if let Some(quantity) = update.quantity {
        item.quantity = bound_quantity(Some(&quantity));
    }
    if let Some(notes) = update.notes {
        item.notes = bound_notes(Some(&notes));
    }
    if let Some(checked) = update.checked {
        item.checked = checked;
    }
    if let Some(position) = update.position {
        item.position = position;
    }
    if let Some(section_id) = update.section_id {
        // unknown section ids are skipped, not an error
        if queries::section_by_id(db, section_id).await?.is_some() {
            item.section_id = section_id;
        }
    }
    queries::save_item(db, &item).await?;
    Ok(Some(queries::item_view(db, &item).await?))
}

/// Apply a best-effort reorder of sections and/or items.
///
/// Unknown section or item ids are skipped silently; the call never aborts
/// halfway through. Returns the full detail snapshot after applying.
pub async fn apply_reorder(
    db: &SqlitePool,
    list: &GroceryList,
    section_order: Option<&[i64]>,
    item_orders: Option<&[ItemOrderEntry]>,
) -> Result<ListDetail> {
    if let Some(order) = section_order {
        for (position, section_id) in order.iter().enumerate() {
            // an UPDATE on an unknown id touches zero rows
            queries::set_section_position(db, *section_id, position as i64).await?;
        }
    }
    if let Some(entries) = item_orders {
        for entry in entries {
            match entry {
                ItemOrderEntry::ByPosition { item_id, position } => {
                    if Uuid::parse_str(item_id).is_ok() {
                        queries::set_item_position(db, &list.id, item_id, *position).await?;
                    }
                }
                ItemOrderEntry::BySection { item_ids, .. } => {
                    for (position, item_id) in item_ids.iter().enumerate() {
                        if Uuid::parse_str(item_id).is_ok() {
                            queries::set_item_position(db, &list.id, item_id, position as i64)
                                .await?;
                        }
                    }
                }
            }
        }
    }
    queries::list_detail(db, list).await
}

/// Re-number one section's items so they display in case-insensitive name
/// order. Stable: equal names keep their previous relative order.
pub async fn reorder_section_by_name(
    db: &SqlitePool,
    list_id: &str,
    section_id: i64,
) -> Result<()> {
    let mut items = queries::items_in_section(db, list_id, section_id).await?;
    items.sort_by_key(|item| item.name.to_lowercase());
    for (position, item) in items.iter().enumerate() {
        queries::set_item_position(db, list_id, &item.id, position as i64).await?;
    }
    Ok(())
}
