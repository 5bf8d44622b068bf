//! Contract tests shared by every `ItemStore` implementation.
//!
//! The in-memory store runs the contract on every `cargo test`. The PostgreSQL
//! store runs the same contract against a real database through SQLx test
//! macros; those tests are ignored unless a database is available.
//!
//! Run with: `DATABASE_URL=postgres://... cargo test --test item_store_contract -- --include-ignored`

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use todo_shared::Item;
use todo_store_repository::{
    InMemoryItemStore, ItemFilter, ItemStore, ItemStoreError, PostgresItemStore,
    PostgresSyncStateRepository, StoreConfig, SyncCommit, SyncLease, SyncStateRepository,
};

// ============================================================================
// Contract
// ============================================================================

async fn create_then_get_returns_equivalent_item(store: &dyn ItemStore) {
    let item = Item::new("Buy milk")
        .with_description("2 litres")
        .with_due_date(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap())
        .with_tags(["groceries", "home"]);

    store.create(&item).await.unwrap();
    let fetched = store.get_by_id(&item.id, &item.id).await.unwrap();

    assert_eq!(fetched, item);
}

async fn update_then_get_reflects_new_values(store: &dyn ItemStore) {
    let mut item = Item::new("Walk dog");
    store.create(&item).await.unwrap();

    item.title = "Walk the dog".into();
    item.complete();
    store.update(&item.id, &item).await.unwrap();

    let fetched = store.get_by_id(&item.id, &item.id).await.unwrap();
    assert_eq!(fetched.title, "Walk the dog");
    assert!(fetched.completed);

    let missing = Item::new("Nope");
    let result = store.update(&missing.id, &missing).await;
    assert!(matches!(result, Err(ItemStoreError::NotFound { .. })));
}

async fn delete_is_final_and_not_idempotent(store: &dyn ItemStore) {
    let item = Item::new("File taxes");
    store.create(&item).await.unwrap();

    store.delete(&item.id, &item.id).await.unwrap();

    assert!(store.get_by_id(&item.id, &item.id).await.unwrap_err().is_not_found());
    assert!(store.delete(&item.id, &item.id).await.unwrap_err().is_not_found());
}

async fn create_conflicts_on_existing_id(store: &dyn ItemStore) {
    let item = Item::new("Water plants");
    store.create(&item).await.unwrap();

    let duplicate = Item::new("Something else").with_id(item.id.clone());
    let result = store.create(&duplicate).await;

    assert!(matches!(result, Err(ItemStoreError::Conflict { .. })));
}

async fn queries_apply_filters(store: &dyn ItemStore) {
    let mut done = Item::new("Pay rent").with_tags(["Bills"]);
    done.complete();
    store.create(&done).await.unwrap();
    store
        .create(&Item::new("Buy bread").with_tags(["groceries"]))
        .await
        .unwrap();

    let bills = store.find(&ItemFilter::HasTag("bills".into())).await.unwrap();
    assert_eq!(bills.len(), 1);
    assert_eq!(bills[0].id, done.id);

    let open = store
        .find(&ItemFilter::Completed(true).negate())
        .await
        .unwrap();
    assert!(open.iter().all(|item| !item.completed));
    assert!(open.iter().any(|item| item.title == "Buy bread"));

    let first = store
        .get(&ItemFilter::TitleContains("RENT".into()))
        .await
        .unwrap();
    assert_eq!(first.map(|item| item.id), Some(done.id.clone()));

    let none = store
        .get(&ItemFilter::TitleContains("nothing like this".into()))
        .await
        .unwrap();
    assert!(none.is_none());
}

async fn change_scan_follows_watermark(store: &dyn ItemStore) {
    let first = Item::new("one");
    store.create(&first).await.unwrap();
    let watermark = store.changed_since(0).await.unwrap().last().unwrap().ts;

    let second = Item::new("two");
    store.create(&second).await.unwrap();

    let changed = store.changed_since(watermark).await.unwrap();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].item.id, second.id);
    assert_eq!(changed[0].partition_key, second.id);

    let keys = store.list_keys().await.unwrap();
    assert_eq!(keys.len(), 2);
}

// ============================================================================
// In-memory store
// ============================================================================

#[tokio::test]
async fn memory_create_then_get() {
    create_then_get_returns_equivalent_item(&InMemoryItemStore::new()).await;
}

#[tokio::test]
async fn memory_update_then_get() {
    update_then_get_reflects_new_values(&InMemoryItemStore::new()).await;
}

#[tokio::test]
async fn memory_delete_not_idempotent() {
    delete_is_final_and_not_idempotent(&InMemoryItemStore::new()).await;
}

#[tokio::test]
async fn memory_create_conflicts() {
    create_conflicts_on_existing_id(&InMemoryItemStore::new()).await;
}

#[tokio::test]
async fn memory_queries_apply_filters() {
    queries_apply_filters(&InMemoryItemStore::new()).await;
}

#[tokio::test]
async fn memory_change_scan() {
    change_scan_follows_watermark(&InMemoryItemStore::new()).await;
}

// ============================================================================
// PostgreSQL store
// ============================================================================

fn postgres_store(pool: sqlx::PgPool) -> PostgresItemStore {
    PostgresItemStore::new(pool, StoreConfig::default()).unwrap()
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn postgres_create_then_get(pool: sqlx::PgPool) {
    create_then_get_returns_equivalent_item(&postgres_store(pool)).await;
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn postgres_update_then_get(pool: sqlx::PgPool) {
    update_then_get_reflects_new_values(&postgres_store(pool)).await;
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn postgres_delete_not_idempotent(pool: sqlx::PgPool) {
    delete_is_final_and_not_idempotent(&postgres_store(pool)).await;
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn postgres_create_conflicts(pool: sqlx::PgPool) {
    create_conflicts_on_existing_id(&postgres_store(pool)).await;
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn postgres_queries_apply_filters(pool: sqlx::PgPool) {
    queries_apply_filters(&postgres_store(pool)).await;
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn postgres_change_scan(pool: sqlx::PgPool) {
    change_scan_follows_watermark(&postgres_store(pool)).await;
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn postgres_concurrent_first_calls_provision_once(pool: sqlx::PgPool) {
    let store = Arc::new(postgres_store(pool.clone()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.list_keys().await })
        })
        .collect();
    for result in futures::future::join_all(handles).await {
        result.unwrap().unwrap();
    }

    let tables: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM information_schema.tables WHERE table_schema = 'todo' AND table_name = 'items'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(tables, 1);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn postgres_rejects_changed_partition_key_path(pool: sqlx::PgPool) {
    postgres_store(pool.clone()).ensure_collection().await.unwrap();

    let reopened = PostgresItemStore::new(
        pool,
        StoreConfig::default().with_partition_key_path("/title"),
    )
    .unwrap();
    let result = reopened.ensure_collection().await;

    assert!(matches!(result, Err(ItemStoreError::ProvisioningError(_))));
}

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn postgres_sync_state_commit_and_load(pool: sqlx::PgPool) {
    let repository = PostgresSyncStateRepository::new(pool).await.unwrap();

    repository
        .commit_cycle(
            "sync",
            &SyncCommit {
                watermark: 42,
                upserted: vec![("a".into(), "h1".into()), ("b".into(), "h2".into())],
                removed: vec![],
            },
        )
        .await
        .unwrap();
    repository
        .commit_cycle(
            "sync",
            &SyncCommit {
                watermark: 43,
                upserted: vec![],
                removed: vec!["a".into()],
            },
        )
        .await
        .unwrap();

    let state = repository.load("sync").await.unwrap();
    assert_eq!(state.watermark, 43);
    assert_eq!(state.ledger.len(), 1);
    assert_eq!(state.ledger["b"], "h2");

    repository.clear("sync").await.unwrap();
    assert_eq!(repository.load("sync").await.unwrap().watermark, 0);
}

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn postgres_sync_state_watermark_never_moves_back(pool: sqlx::PgPool) {
    let repository = PostgresSyncStateRepository::new(pool).await.unwrap();

    for watermark in [200, 150] {
        repository
            .commit_cycle(
                "sync",
                &SyncCommit {
                    watermark,
                    ..SyncCommit::default()
                },
            )
            .await
            .unwrap();
    }

    assert_eq!(repository.load("sync").await.unwrap().watermark, 200);
}

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn postgres_sync_lease_excludes_other_holders(pool: sqlx::PgPool) {
    let first = PostgresSyncStateRepository::new(pool.clone()).await.unwrap();
    let second = PostgresSyncStateRepository::new(pool).await.unwrap();

    let lease = first.try_acquire("sync").await.unwrap().unwrap();
    assert!(second.try_acquire("sync").await.unwrap().is_none());
    assert!(second.try_acquire("other").await.unwrap().is_some());

    lease.release().await.unwrap();
    assert!(second.try_acquire("sync").await.unwrap().is_some());
}
