//! Section assignment: keyword rules from the database first, classifier
//! fallback second
//!
//! Successful classifier answers are written back to the keyword table so the
//! same phrase resolves by rule lookup next time. The learn write is an
//! idempotent upsert keyed on the normalized keyword, which tolerates two
//! rooms classifying the same phrase at the same moment.

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::{debug, info};

use courses_common::api::ImportEntry;
use courses_common::db::models::Section;
use courses_common::db::queries;
use courses_common::{Error, Result};

use crate::services::llm_client::Classifier;

/// Slug of the catch-all section used when nothing matches
pub const DEFAULT_SECTION_SLUG: &str = "autre";

pub struct SectionAssigner {
    db: SqlitePool,
    classifier: Arc<dyn Classifier>,
}

/// Normalize for matching: trim, lowercase, collapse internal whitespace.
/// Idempotent.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Return the section id of the first keyword contained in the normalized
/// name. Longer keywords are tried first so multi-word phrases beat their
/// prefixes ("pomme de terre" before "pomme"); equal-length keywords are
/// tried in lexical order, which makes the scan deterministic.
fn keyword_match(mut keywords: Vec<(String, i64)>, normalized: &str) -> Option<i64> {
    if normalized.is_empty() {
        return None;
    }
    keywords.sort_by(|a, b| {
        b.0.chars()
            .count()
            .cmp(&a.0.chars().count())
            .then_with(|| a.0.cmp(&b.0))
    });
    keywords
        .into_iter()
        .find(|(keyword, _)| normalized.contains(keyword.as_str()))
        .map(|(_, section_id)| section_id)
}

impl SectionAssigner {
    pub fn new(db: SqlitePool, classifier: Arc<dyn Classifier>) -> Self {
        Self { db, classifier }
    }

    /// Assign a section to an item name.
    ///
    /// Keyword rules first, then the classifier (whose answer is learned),
    /// then the catch-all section, then the lowest-position section as a
    /// last resort. Classifier unavailability is never an error.
    pub async fn assign_section(&self, item_name: &str) -> Result<Section> {
        let normalized = normalize(item_name);
        debug!(normalized = %normalized, "assigning section");

        let keywords = queries::keywords_for_matching(&self.db).await?;
        if let Some(section_id) = keyword_match(keywords, &normalized) {
            if let Some(section) = queries::section_by_id(&self.db, section_id).await? {
                info!(
                    item_name = %item_name,
                    section = %section.name_slug,
                    source = "keyword",
                    "section assigned"
                );
                return Ok(section);
            }
        }

        let candidates = queries::sections_ordered(&self.db).await?;
        if let Some(slug) = self.classifier.classify_one(item_name, &candidates).await {
            if let Some(section) = candidates.iter().find(|s| s.name_slug == slug) {
                if !normalized.is_empty() {
                    queries::learn_keyword(&self.db, &normalized, section.id).await?;
                    info!(
                        keyword = %normalized,
                        section = %section.name_slug,
                        "learned keyword"
                    );
                }
                info!(
                    item_name = %item_name,
                    section = %section.name_slug,
                    source = "classifier",
                    "section assigned"
                );
                return Ok(section.clone());
            }
        }

        if let Some(section) = candidates
            .iter()
            .find(|s| s.name_slug == DEFAULT_SECTION_SLUG)
        {
            info!(
                item_name = %item_name,
                section = %section.name_slug,
                source = "default",
                "section assigned"
            );
            return Ok(section.clone());
        }

        // catalog without the catch-all: take the first section by position
        candidates
            .into_iter()
            .next()
            .ok_or_else(|| Error::Internal("section catalog is empty".to_string()))
    }

    /// Normalize pasted free text into structured import entries.
    ///
    /// Empty on any classifier failure so the caller can fall back to naive
    /// line parsing.
    pub async fn normalize_import(&self, raw_text: &str) -> Result<Vec<ImportEntry>> {
        let candidates = queries::sections_ordered(&self.db).await?;
        Ok(self
            .classifier
            .classify_bulk(raw_text, &candidates)
            .await
            .unwrap_or_default())
    }
}
