//! Bulk link-import validation tests over in-memory repositories.

mod helpers;

use std::sync::Arc;

use gramin_linking::{defaults, AuditAction, BulkImporter, Error, ImportItem, ItemKind, LinkStatus, Role};
use helpers::InMemoryStore;

fn importer(store: &Arc<InMemoryStore>) -> BulkImporter {
    BulkImporter::new(store.clone(), store.clone())
}

fn row(item_type: &str, item_id: Option<uuid::Uuid>) -> ImportItem {
    ImportItem {
        item_type: item_type.to_string(),
        item_id,
        promote: None,
        priority: None,
    }
}

#[tokio::test]
async fn test_import_applies_valid_rows_and_reports_invalid_ones() {
    let store = InMemoryStore::new();
    let imports = importer(&store);
    let village = store.add_village("Kanda");
    let actor = store.add_user(Role::Admin);

    let items = vec![
        row("provider", Some(uuid::Uuid::new_v4())),
        row("bogus", Some(uuid::Uuid::new_v4())),
        row("listing", Some(uuid::Uuid::new_v4())),
    ];

    let report = imports.import(village.id, items, actor).await.unwrap();

    assert_eq!(report.success_count, 2);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].row, 2);
    assert!(report.errors[0].error.contains("bogus"));

    // Two links landed, each with its paired audit entry.
    assert_eq!(store.links.lock().unwrap().len(), 2);
    let audit = store.audit.lock().unwrap();
    assert_eq!(audit.len(), 2);
    assert!(audit.iter().all(|e| e.action == AuditAction::Link));
    assert!(audit.iter().all(|e| e.reason == defaults::BULK_IMPORT_REASON));
}

#[tokio::test]
async fn test_import_missing_item_id_is_a_row_error() {
    let store = InMemoryStore::new();
    let imports = importer(&store);
    let village = store.add_village("Kanda");
    let actor = store.add_user(Role::Admin);

    let report = imports
        .import(village.id, vec![row("package", None)], actor)
        .await
        .unwrap();

    assert_eq!(report.success_count, 0);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].row, 1);
    assert_eq!(report.errors[0].error, "Missing item_id");
}

#[tokio::test]
async fn test_oversize_batch_rejected_before_any_row_applies() {
    let store = InMemoryStore::new();
    let imports = importer(&store);
    let village = store.add_village("Kanda");
    let actor = store.add_user(Role::Admin);

    let items: Vec<ImportItem> = (0..defaults::BULK_IMPORT_MAX_ROWS + 1)
        .map(|_| row("provider", Some(uuid::Uuid::new_v4())))
        .collect();

    let result = imports.import(village.id, items, actor).await;

    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert!(store.links.lock().unwrap().is_empty());
    assert!(store.audit.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_import_unknown_village_fails() {
    let store = InMemoryStore::new();
    let imports = importer(&store);
    let actor = store.add_user(Role::Admin);

    let result = imports
        .import(
            uuid::Uuid::new_v4(),
            vec![row("provider", Some(uuid::Uuid::new_v4()))],
            actor,
        )
        .await;

    assert!(matches!(result, Err(Error::VillageNotFound(_))));
}

#[tokio::test]
async fn test_import_honors_promote_and_priority() {
    let store = InMemoryStore::new();
    let imports = importer(&store);
    let village = store.add_village("Kanda");
    let actor = store.add_user(Role::Admin);
    let item_id = uuid::Uuid::new_v4();

    let items = vec![ImportItem {
        item_type: "product".to_string(),
        item_id: Some(item_id),
        promote: Some(true),
        priority: Some(7),
    }];

    let report = imports.import(village.id, items, actor).await.unwrap();
    assert_eq!(report.success_count, 1);

    let link = store.link_for(village.id, ItemKind::Product, item_id).unwrap();
    assert_eq!(link.status, LinkStatus::Linked);
    assert!(link.promote);
    assert_eq!(link.priority, 7);
    assert_eq!(link.created_by, actor);
}

#[tokio::test]
async fn test_import_reimport_updates_existing_link() {
    let store = InMemoryStore::new();
    let imports = importer(&store);
    let village = store.add_village("Kanda");
    let actor = store.add_user(Role::Admin);
    let item_id = uuid::Uuid::new_v4();

    imports
        .import(village.id, vec![row("provider", Some(item_id))], actor)
        .await
        .unwrap();
    imports
        .import(
            village.id,
            vec![ImportItem {
                item_type: "provider".to_string(),
                item_id: Some(item_id),
                promote: Some(true),
                priority: Some(3),
            }],
            actor,
        )
        .await
        .unwrap();

    assert_eq!(store.links.lock().unwrap().len(), 1);
    let link = store.link_for(village.id, ItemKind::Provider, item_id).unwrap();
    assert!(link.promote);
    assert_eq!(link.priority, 3);

    let audit = store.audit.lock().unwrap();
    let actions: Vec<AuditAction> = audit.iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![AuditAction::Link, AuditAction::Update]);
}
