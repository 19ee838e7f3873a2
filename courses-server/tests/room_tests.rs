//! Room registry integration tests: broadcast fan-out, list isolation,
//! per-list serialization and room lifecycle.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use courses_common::api::ImportEntry;
use courses_common::db::models::Section;
use courses_common::db::{init_database, queries};
use courses_common::events::ListEvent;
use courses_server::rooms::{ClientCommand, CommandOutcome, RoomRegistry};
use courses_server::services::llm_client::Classifier;
use courses_server::services::section_assigner::SectionAssigner;

struct NullClassifier;

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

async fn setup() -> (tempfile::TempDir, sqlx::SqlitePool, Arc<RoomRegistry>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let pool = init_database(&dir.path().join("test.db"))
        .await
        .expect("init_database");
    let assigner = Arc::new(SectionAssigner::new(pool.clone(), Arc::new(NullClassifier)));
    let registry = RoomRegistry::new(pool.clone(), assigner);
    (dir, pool, registry)
}

fn add_item(name: &str) -> ClientCommand {
    ClientCommand::AddItem {
        name: name.to_string(),
        quantity: String::new(),
        notes: String::new(),
        section_slug: None,
    }
}

#[tokio::test]
async fn add_item_broadcasts_to_every_subscriber() {
    let (_dir, pool, registry) = setup().await;
    let list = queries::create_list(&pool, "Partagée").await.unwrap();

    let mut sub_a = registry.subscribe(&list.id);
    let sub_b = registry.subscribe(&list.id);

    let outcome = sub_b.send_command(add_item("Lait")).await;
    assert!(matches!(outcome, CommandOutcome::Applied));

    let event = timeout(Duration::from_secs(2), sub_a.next_event())
        .await
        .expect("subscriber A should receive the broadcast")
        .unwrap();
    match event {
        ListEvent::ItemAdded { item } => {
            assert_eq!(item.name, "Lait");
            assert_eq!(item.section_slug, "produits_laitiers_oeufs");
            assert_eq!(item.quantity, "");
            assert!(!item.checked);
        }
        other => panic!("expected item_added, got {:?}", other),
    }
}

#[tokio::test]
async fn other_lists_receive_nothing() {
    let (_dir, pool, registry) = setup().await;
    let list_a = queries::create_list(&pool, "A").await.unwrap();
    let list_b = queries::create_list(&pool, "B").await.unwrap();

    let sub_a = registry.subscribe(&list_a.id);
    let mut sub_b = registry.subscribe(&list_b.id);

    sub_a.send_command(add_item("Pain")).await;

    let result = timeout(Duration::from_millis(200), sub_b.next_event()).await;
    assert!(result.is_err(), "room B must not see room A's events");
}

#[tokio::test]
async fn vanished_target_is_a_silent_no_op() {
    let (_dir, pool, registry) = setup().await;
    let list = queries::create_list(&pool, "Courses").await.unwrap();

    let mut sub = registry.subscribe(&list.id);

    let outcome = sub
        .send_command(ClientCommand::DeleteItem {
            item_id: uuid::Uuid::new_v4().to_string(),
        })
        .await;
    assert!(matches!(outcome, CommandOutcome::Ignored));

    let result = timeout(Duration::from_millis(200), sub.next_event()).await;
    assert!(result.is_err(), "a no-op must not broadcast");
}

#[tokio::test]
async fn commands_on_a_deleted_list_are_ignored() {
    let (_dir, pool, registry) = setup().await;
    let list = queries::create_list(&pool, "Éphémère").await.unwrap();

    let sub = registry.subscribe(&list.id);
    queries::delete_list(&pool, &list.id).await.unwrap();

    let outcome = sub.send_command(add_item("Lait")).await;
    assert!(matches!(outcome, CommandOutcome::Ignored));
}

#[tokio::test]
async fn invalid_name_is_rejected_without_broadcast() {
    let (_dir, pool, registry) = setup().await;
    let list = queries::create_list(&pool, "Courses").await.unwrap();

    let mut sub = registry.subscribe(&list.id);

    let outcome = sub.send_command(add_item("   ")).await;
    assert!(matches!(outcome, CommandOutcome::Rejected(_)));

    let result = timeout(Duration::from_millis(200), sub.next_event()).await;
    assert!(result.is_err(), "a rejected command must not broadcast");
}

#[tokio::test]
async fn concurrent_adds_get_distinct_positions() {
    let (_dir, pool, registry) = setup().await;
    let list = queries::create_list(&pool, "Courses").await.unwrap();

    let mut handles = Vec::new();
    for i in 0..6 {
        let sub = registry.subscribe(&list.id);
        handles.push(tokio::spawn(async move {
            // every name lands in the default section
            sub.send_command(add_item(&format!("zz-article-{i}"))).await
        }));
    }
    for handle in handles {
        assert!(matches!(handle.await.unwrap(), CommandOutcome::Applied));
    }

    let section = queries::section_by_slug(&pool, "autre").await.unwrap().unwrap();
    let items = queries::items_in_section(&pool, &list.id, section.id)
        .await
        .unwrap();
    assert_eq!(items.len(), 6);
    let mut positions: Vec<i64> = items.iter().map(|i| i.position).collect();
    positions.sort_unstable();
    positions.dedup();
    assert_eq!(positions.len(), 6, "no two items may share a position");
}

#[tokio::test]
async fn broadcast_order_matches_application_order() {
    let (_dir, pool, registry) = setup().await;
    let list = queries::create_list(&pool, "Courses").await.unwrap();

    let mut watcher = registry.subscribe(&list.id);
    let sender = registry.subscribe(&list.id);

    for name in ["aaa", "bbb", "ccc"] {
        sender.send_command(add_item(name)).await;
    }

    let mut seen = Vec::new();
    for _ in 0..3 {
        match timeout(Duration::from_secs(2), watcher.next_event())
            .await
            .unwrap()
            .unwrap()
        {
            ListEvent::ItemAdded { item } => seen.push(item.name),
            other => panic!("expected item_added, got {:?}", other),
        }
    }
    assert_eq!(seen, vec!["aaa", "bbb", "ccc"]);
}

#[tokio::test]
async fn issuer_leaving_does_not_cancel_its_command() {
    let (_dir, pool, registry) = setup().await;
    let list = queries::create_list(&pool, "Courses").await.unwrap();

    let mut watcher = registry.subscribe(&list.id);

    {
        // subscription dropped as soon as the command is enqueued and applied
        let transient = registry.subscribe(&list.id);
        transient.send_command(add_item("Beurre")).await;
    }

    let event = timeout(Duration::from_secs(2), watcher.next_event())
        .await
        .expect("mutation must outlive the issuing connection")
        .unwrap();
    assert!(matches!(event, ListEvent::ItemAdded { .. }));
}

#[tokio::test]
async fn room_is_destroyed_with_its_last_subscriber() {
    let (_dir, pool, registry) = setup().await;
    let list = queries::create_list(&pool, "Courses").await.unwrap();

    assert_eq!(registry.room_count(), 0);
    let sub_a = registry.subscribe(&list.id);
    let sub_b = registry.subscribe(&list.id);
    assert_eq!(registry.room_count(), 1);

    drop(sub_a);
    assert_eq!(registry.room_count(), 1, "room lives while one subscriber remains");
    drop(sub_b);
    assert_eq!(registry.room_count(), 0, "last unsubscribe tears the room down");

    // a fresh subscribe lazily recreates the room
    let _sub = registry.subscribe(&list.id);
    assert_eq!(registry.room_count(), 1);
}

#[tokio::test]
async fn reorder_command_broadcasts_full_detail() {
    let (_dir, pool, registry) = setup().await;
    let list = queries::create_list(&pool, "Courses").await.unwrap();

    let mut sub = registry.subscribe(&list.id);
    sub.send_command(add_item("Pomme")).await;
    let added = match timeout(Duration::from_secs(2), sub.next_event())
        .await
        .unwrap()
        .unwrap()
    {
        ListEvent::ItemAdded { item } => item,
        other => panic!("expected item_added, got {:?}", other),
    };

    let outcome = sub
        .send_command(ClientCommand::ReorderItems {
            section_order: None,
            item_orders: Some(vec![courses_common::api::ItemOrderEntry::ByPosition {
                item_id: added.id.clone(),
                position: 7,
            }]),
        })
        .await;
    assert!(matches!(outcome, CommandOutcome::Applied));

    match timeout(Duration::from_secs(2), sub.next_event())
        .await
        .unwrap()
        .unwrap()
    {
        ListEvent::ListUpdated { list: detail } => {
            let item = detail
                .sections
                .iter()
                .flat_map(|g| g.items.iter())
                .find(|i| i.id == added.id)
                .expect("item present in detail");
            assert_eq!(item.position, 7);
        }
        other => panic!("expected list_updated, got {:?}", other),
    }
}
