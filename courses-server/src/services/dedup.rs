//! Duplicate merging: items whose normalized names collapse to the same key
//! are merged into the first occurrence.

use std::collections::HashMap;

use sqlx::SqlitePool;
use tracing::info;

use courses_common::api::{truncate_chars, ListDetail, MAX_NOTES, MAX_QUANTITY};
use courses_common::db::models::{GroceryList, Item};
use courses_common::db::queries;
use courses_common::Result;

/// Dedup key: trim, lowercase, then a light singularization so "pommes" and
/// "pomme" (or "choux" and "chou") collapse. A heuristic, not stemming.
fn dedup_name_key(name: &str) -> String {
    let mut key = name.trim().to_lowercase();
    if key.chars().count() >= 3 {
        if key.ends_with('s') && !key.ends_with("ss") {
            key.pop();
        } else if key.ends_with('x') {
            key.pop();
        }
    }
    key
}

/// Parse "100 g" or "1,5 l" into (number, lowercase unit). The unit must be
/// a single run of letters; anything else refuses to parse.
fn parse_quantity_with_unit(s: &str) -> Option<(f64, String)> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let number: String = s
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if number.is_empty() {
        return None;
    }
    // the numeric prefix is ASCII, so byte indexing is safe here
    let unit = s[number.len()..].trim();
    if !unit.is_empty() && !unit.chars().all(char::is_alphabetic) {
        return None;
    }
    let value: f64 = number.replace(',', ".").parse().ok()?;
    Some((value, unit.to_lowercase()))
}

/// Render a sum without a trailing ".0" for integral values
fn render_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Merge quantity strings: sum when every entry carries the same unit
/// (including "no unit"), else sum plain numbers, else concatenate with
/// " + ". Always bounded.
fn merge_quantities(quantities: &[String]) -> String {
    let present: Vec<&str> = quantities
        .iter()
        .map(|q| q.trim())
        .filter(|q| !q.is_empty())
        .collect();
    if present.is_empty() {
        return String::new();
    }

    let parsed: Vec<Option<(f64, String)>> =
        present.iter().map(|q| parse_quantity_with_unit(q)).collect();
    if parsed.iter().all(Option::is_some) {
        let parsed: Vec<&(f64, String)> = parsed.iter().flatten().collect();
        let unit = &parsed[0].1;
        if parsed.iter().all(|(_, u)| u == unit) {
            let total: f64 = parsed.iter().map(|(v, _)| v).sum();
            let rendered = if unit.is_empty() {
                render_number(total)
            } else {
                format!("{} {}", render_number(total), unit)
            };
            return truncate_chars(&rendered, MAX_QUANTITY);
        }
    }

    // second chance: every entry is a bare number
    let mut total = 0.0;
    for q in &present {
        match q.replace(',', ".").parse::<f64>() {
            Ok(v) => total += v,
            Err(_) => return truncate_chars(&present.join(" + "), MAX_QUANTITY),
        }
    }
    truncate_chars(&render_number(total), MAX_QUANTITY)
}

/// Merge items with the same dedup key: quantities summed or concatenated,
/// notes joined with " ; ", checked if any member was, all non-target
/// members deleted. Groups form in (section position, item position) scan
/// order and the first member is the merge target. Returns the detail
/// snapshot after merging.
pub async fn deduplicate_list_items(db: &SqlitePool, list: &GroceryList) -> Result<ListDetail> {
    let items = queries::items_for_list(db, &list.id).await?;

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<Item>> = HashMap::new();
    for item in items {
        let key = dedup_name_key(&item.name);
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(item);
    }

    let mut merged_groups = 0;
    for key in order {
        let Some(group) = groups.remove(&key) else {
            continue;
        };
        if group.len() <= 1 {
            continue;
        }

        let mut target = group[0].clone();

        let quantities: Vec<String> = group.iter().map(|i| i.quantity.clone()).collect();
        target.quantity = merge_quantities(&quantities);

        let notes: Vec<&str> = group
            .iter()
            .map(|i| i.notes.trim())
            .filter(|n| !n.is_empty())
            .collect();
        target.notes = truncate_chars(&notes.join(" ; "), MAX_NOTES);

        target.checked = group.iter().any(|i| i.checked);

        queries::save_item(db, &target).await?;
        for duplicate in &group[1..] {
            queries::delete_item(db, &list.id, &duplicate.id).await?;
        }
        merged_groups += 1;
    }

    if merged_groups > 0 {
        info!(list_id = %list.id, merged_groups, "deduplicated list items");
    }

    queries::list_detail(db, list).await
}
