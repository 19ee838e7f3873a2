//! Domain services: classification, item operations, merge and reorder

pub mod dedup;
pub mod item_service;
pub mod llm_client;
pub mod section_assigner;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use async_trait::async_trait;

    use courses_common::api::ImportEntry;
    use courses_common::db::models::Section;

    use super::llm_client::Classifier;
    use super::section_assigner::SectionAssigner;

    /// Classifier stub that is permanently unavailable
    pub struct NullClassifier;

    #[async_trait]
    impl Classifier for NullClassifier {
        async fn classify_one(&self, _name: &str, _candidates: &[Section]) -> Option<String> {
            None
        }

        async fn classify_bulk(
            &self,
            _text: &str,
            _candidates: &[Section],
        ) -> Option<Vec<ImportEntry>> {
            None
        }
    }

    pub async fn test_pool() -> (tempfile::TempDir, sqlx::SqlitePool) {
        let dir = tempfile::tempdir().expect("tempdir");
        let pool = courses_common::db::init_database(&dir.path().join("test.db"))
            .await
            .expect("init_database");
        (dir, pool)
    }

    pub fn null_assigner(pool: &sqlx::SqlitePool) -> SectionAssigner {
        SectionAssigner::new(pool.clone(), Arc::new(NullClassifier))
    }
}
