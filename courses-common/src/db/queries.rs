//! Storage queries for lists, items, sections, keywords and access tokens
//!
//! Plus builders for the client-facing view types. Item position allocation
//! happens inside the INSERT statement so two concurrent creations in the
//! same section can never observe the same maximum.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::api::{ItemView, ListDetail, ListSummary, ListView, SectionGroup};
use crate::db::models::{AccessToken, GroceryList, Item, Section};
use crate::{Error, Result};

// ============================================================================
// Lists
// ============================================================================

pub async fn create_list(pool: &SqlitePool, name: &str) -> Result<GroceryList> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO lists (id, name, created_at, archived, position)
         VALUES (?, ?, ?, 0, 0)",
    )
    .bind(&id)
    .bind(name)
    .bind(chrono::Utc::now())
    .execute(pool)
    .await?;

    get_list(pool, &id)
        .await?
        .ok_or_else(|| Error::Internal("list vanished after insert".to_string()))
}

pub async fn get_list(pool: &SqlitePool, id: &str) -> Result<Option<GroceryList>> {
    let list = sqlx::query_as::<_, GroceryList>("SELECT * FROM lists WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(list)
}

/// All lists with item counters, active first then archived
pub async fn list_summaries(pool: &SqlitePool) -> Result<Vec<ListSummary>> {
    let rows = sqlx::query_as::<
        _,
        (
            String,
            String,
            chrono::DateTime<chrono::Utc>,
            bool,
            i64,
            i64,
            i64,
        ),
    >(
        "SELECT l.id, l.name, l.created_at, l.archived, l.position,
                COUNT(i.id),
                COALESCE(SUM(CASE WHEN i.checked = 1 THEN 1 ELSE 0 END), 0)
         FROM lists l
         LEFT JOIN items i ON i.list_id = l.id
         GROUP BY l.id
         ORDER BY l.archived ASC, l.position ASC, l.created_at DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, name, created_at, archived, position, count, checked)| ListSummary {
            list: ListView {
                id,
                name,
                created_at,
                archived,
                position,
            },
            items_count: count,
            items_checked: checked,
        })
        .collect())
}

pub async fn update_list(
    pool: &SqlitePool,
    id: &str,
    name: Option<String>,
    archived: Option<bool>,
) -> Result<Option<GroceryList>> {
    let Some(mut list) = get_list(pool, id).await? else {
        return Ok(None);
    };
    if let Some(name) = name {
        list.name = name;
    }
    if let Some(archived) = archived {
        list.archived = archived;
    }
    sqlx::query("UPDATE lists SET name = ?, archived = ? WHERE id = ?")
        .bind(&list.name)
        .bind(list.archived)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(Some(list))
}

/// Delete a list and (by cascade) all of its items
pub async fn delete_list(pool: &SqlitePool, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM lists WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Sections
// ============================================================================

pub async fn sections_ordered(pool: &SqlitePool) -> Result<Vec<Section>> {
    let sections =
        sqlx::query_as::<_, Section>("SELECT * FROM sections ORDER BY position, id")
            .fetch_all(pool)
            .await?;
    Ok(sections)
}

pub async fn section_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Section>> {
    let section = sqlx::query_as::<_, Section>("SELECT * FROM sections WHERE name_slug = ?")
        .bind(slug)
        .fetch_optional(pool)
        .await?;
    Ok(section)
}

pub async fn section_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Section>> {
    let section = sqlx::query_as::<_, Section>("SELECT * FROM sections WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(section)
}

pub async fn set_section_position(pool: &SqlitePool, id: i64, position: i64) -> Result<()> {
    sqlx::query("UPDATE sections SET position = ? WHERE id = ?")
        .bind(position)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

// ============================================================================
// Keywords
// ============================================================================

/// All keywords with their section id, in lexical keyword order
pub async fn keywords_for_matching(pool: &SqlitePool) -> Result<Vec<(String, i64)>> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT keyword, section_id FROM section_keywords ORDER BY keyword",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Idempotent upsert keyed on the keyword text. Concurrent first-time learns
/// of the same phrase leave exactly one row; the first write wins.
pub async fn learn_keyword(pool: &SqlitePool, keyword: &str, section_id: i64) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO section_keywords (keyword, section_id) VALUES (?, ?)")
        .bind(keyword)
        .bind(section_id)
        .execute(pool)
        .await?;
    Ok(())
}

// ============================================================================
// Items
// ============================================================================

/// Create an item at the end of its section. The position is computed inside
/// the statement, so it is atomic with the insert.
pub async fn insert_item(
    pool: &SqlitePool,
    list_id: &str,
    name: &str,
    section_id: i64,
    quantity: &str,
    notes: &str,
) -> Result<Item> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO items (id, list_id, name, section_id, quantity, notes, checked, position)
         VALUES (?, ?, ?, ?, ?, ?, 0,
                 (SELECT COALESCE(MAX(position), 0) + 1 FROM items
                  WHERE list_id = ? AND section_id = ?))",
    )
    .bind(&id)
    .bind(list_id)
    .bind(name)
    .bind(section_id)
    .bind(quantity)
    .bind(notes)
    .bind(list_id)
    .bind(section_id)
    .execute(pool)
    .await?;

    get_item(pool, list_id, &id)
        .await?
        .ok_or_else(|| Error::Internal("item vanished after insert".to_string()))
}

pub async fn get_item(pool: &SqlitePool, list_id: &str, item_id: &str) -> Result<Option<Item>> {
    let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = ? AND list_id = ?")
        .bind(item_id)
        .bind(list_id)
        .fetch_optional(pool)
        .await?;
    Ok(item)
}

pub async fn save_item(pool: &SqlitePool, item: &Item) -> Result<()> {
    sqlx::query(
        "UPDATE items
         SET name = ?, section_id = ?, quantity = ?, notes = ?, checked = ?, position = ?
         WHERE id = ? AND list_id = ?",
    )
    .bind(&item.name)
    .bind(item.section_id)
    .bind(&item.quantity)
    .bind(&item.notes)
    .bind(item.checked)
    .bind(item.position)
    .bind(&item.id)
    .bind(&item.list_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_item(pool: &SqlitePool, list_id: &str, item_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM items WHERE id = ? AND list_id = ?")
        .bind(item_id)
        .bind(list_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Items of a list in display order: section position first, then item
/// position within the section.
pub async fn items_for_list(pool: &SqlitePool, list_id: &str) -> Result<Vec<Item>> {
    let items = sqlx::query_as::<_, Item>(
        "SELECT i.* FROM items i
         JOIN sections s ON s.id = i.section_id
         WHERE i.list_id = ?
         ORDER BY s.position, i.position, i.id",
    )
    .bind(list_id)
    .fetch_all(pool)
    .await?;
    Ok(items)
}

pub async fn items_in_section(
    pool: &SqlitePool,
    list_id: &str,
    section_id: i64,
) -> Result<Vec<Item>> {
    let items = sqlx::query_as::<_, Item>(
        "SELECT * FROM items WHERE list_id = ? AND section_id = ?
         ORDER BY position, id",
    )
    .bind(list_id)
    .bind(section_id)
    .fetch_all(pool)
    .await?;
    Ok(items)
}

pub async fn set_item_position(
    pool: &SqlitePool,
    list_id: &str,
    item_id: &str,
    position: i64,
) -> Result<bool> {
    let result = sqlx::query("UPDATE items SET position = ? WHERE id = ? AND list_id = ?")
        .bind(position)
        .bind(item_id)
        .bind(list_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ============================================================================
// View builders
// ============================================================================

pub fn list_view(list: &GroceryList) -> ListView {
    ListView {
        id: list.id.clone(),
        name: list.name.clone(),
        created_at: list.created_at,
        archived: list.archived,
        position: list.position,
    }
}

fn item_view_with(item: &Item, section: &Section) -> ItemView {
    ItemView {
        id: item.id.clone(),
        name: item.name.clone(),
        section_id: section.id,
        section_slug: section.name_slug.clone(),
        section_label: section.label_fr.clone(),
        quantity: item.quantity.clone(),
        notes: item.notes.clone(),
        checked: item.checked,
        position: item.position,
    }
}

pub async fn item_view(pool: &SqlitePool, item: &Item) -> Result<ItemView> {
    let section = section_by_id(pool, item.section_id)
        .await?
        .ok_or_else(|| Error::Internal(format!("missing section {}", item.section_id)))?;
    Ok(item_view_with(item, &section))
}

/// Full list detail: every catalog section (even empty ones) with the list's
/// items grouped under it in display order.
pub async fn list_detail(pool: &SqlitePool, list: &GroceryList) -> Result<ListDetail> {
    let sections = sections_ordered(pool).await?;
    let items = items_for_list(pool, &list.id).await?;

    let mut groups: Vec<SectionGroup> = sections
        .iter()
        .map(|s| SectionGroup {
            section_id: s.id,
            section_slug: s.name_slug.clone(),
            section_label: s.label_fr.clone(),
            items: Vec::new(),
        })
        .collect();

    for item in &items {
        if let (Some(group), Some(section)) = (
            groups.iter_mut().find(|g| g.section_id == item.section_id),
            sections.iter().find(|s| s.id == item.section_id),
        ) {
            group.items.push(item_view_with(item, section));
        }
    }

    Ok(ListDetail {
        list: list_view(list),
        sections: groups,
    })
}

// ============================================================================
// Access tokens
// ============================================================================

/// Create a new secret access token
pub async fn create_access_token(pool: &SqlitePool, label: &str) -> Result<AccessToken> {
    use rand::distributions::Alphanumeric;
    use rand::Rng;

    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(43)
        .map(char::from)
        .collect();

    sqlx::query("INSERT INTO access_tokens (token, label, created_at, revoked) VALUES (?, ?, ?, 0)")
        .bind(&token)
        .bind(label)
        .bind(chrono::Utc::now())
        .execute(pool)
        .await?;

    let record = sqlx::query_as::<_, AccessToken>("SELECT * FROM access_tokens WHERE token = ?")
        .bind(&token)
        .fetch_one(pool)
        .await?;
    Ok(record)
}

/// True when the token exists and has not been revoked
pub async fn token_is_valid(pool: &SqlitePool, token: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM access_tokens WHERE token = ? AND revoked = 0",
    )
    .bind(token)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

pub async fn revoke_access_token(pool: &SqlitePool, token: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE access_tokens SET revoked = 1 WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
