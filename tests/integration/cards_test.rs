//! Card lifecycle integration tests.

use std::sync::Arc;

use mika_sql::cards::{CardManager, CardUpdate, DEFAULT_DISPLAY_TYPE};
use mika_sql::error::MikaError;
use mika_sql::metabase::{paths, Method, MockMetabase, RemoteId};
use mika_sql::metadata::{Database, MetadataCache};
use pretty_assertions::assert_eq;
use serde_json::json;

/// Builds a manager whose cache was refreshed from the mock.
async fn refreshed_manager(mock: Arc<MockMetabase>) -> CardManager {
    let cache = Arc::new(MetadataCache::new(mock.clone()));
    cache.refresh().await.unwrap();
    CardManager::new(mock, cache)
}

#[tokio::test]
async fn test_create_targets_first_database() {
    let mock = Arc::new(
        MockMetabase::new()
            .with_database(Database::new(RemoteId::from(5), "Primary"))
            .with_database(Database::new(RemoteId::from(9), "Secondary")),
    );
    let manager = refreshed_manager(mock.clone()).await;

    let created = manager
        .create("SELECT * FROM payments", "Payments", Some("line"))
        .await
        .unwrap();

    let writes = mock.write_requests();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].method, Method::Post);
    assert_eq!(writes[0].path, paths::CARDS);
    assert_eq!(
        writes[0].body,
        Some(json!({
            "name": "Payments",
            "dataset_query": {
                "type": "native",
                "native": {"query": "SELECT * FROM payments"},
                "database": 5
            },
            "display": "line",
            "visualization_settings": {}
        }))
    );
    assert_eq!(created.display_type, "line");
    assert_eq!(created.url, format!("http://metabase.test/card/{}", created.id));
}

#[tokio::test]
async fn test_create_defaults_display_type() {
    let mock = Arc::new(MockMetabase::sample());
    let manager = refreshed_manager(mock.clone()).await;

    let created = manager.create("SELECT 1", "One", None).await.unwrap();

    assert_eq!(created.display_type, DEFAULT_DISPLAY_TYPE);
    assert_eq!(mock.card(&created.id).unwrap()["display"], "table");
}

#[tokio::test]
async fn test_create_with_empty_cache_issues_no_write() {
    let mock = Arc::new(MockMetabase::new());
    let manager = refreshed_manager(mock.clone()).await;

    let err = manager.create("SELECT 1", "One", None).await.unwrap_err();

    assert_eq!(err, MikaError::NoDatabaseAvailable);
    assert!(mock.write_requests().is_empty());
}

#[tokio::test]
async fn test_create_after_failed_warm_up() {
    let mock = Arc::new(MockMetabase::sample());
    mock.fail_on(Method::Get, paths::DATABASES, MikaError::transport("refused"));
    let cache = Arc::new(MetadataCache::new(mock.clone()));
    assert!(!cache.warm_up().await);

    let manager = CardManager::new(mock.clone(), cache);
    let err = manager.create("SELECT 1", "One", None).await.unwrap_err();

    assert_eq!(err, MikaError::NoDatabaseAvailable);
    assert!(mock.write_requests().is_empty());
}

#[tokio::test]
async fn test_update_merges_only_given_fields() {
    let mock = Arc::new(
        MockMetabase::sample().with_card(json!({
            "id": 12,
            "name": "A",
            "dataset_query": {"native": {"query": "X"}},
            "display": "bar"
        })),
    );
    let manager = refreshed_manager(mock.clone()).await;

    let update = CardUpdate {
        sql: Some("Y".to_string()),
        ..CardUpdate::default()
    };
    let updated = manager.update(&RemoteId::from(12), &update).await.unwrap();

    let writes = mock.write_requests();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].method, Method::Put);
    assert_eq!(
        writes[0].body,
        Some(json!({
            "id": 12,
            "name": "A",
            "dataset_query": {
                "type": "native",
                "native": {"query": "Y"},
                "database": 1
            },
            "display": "bar",
            "visualization_settings": {}
        }))
    );
    assert_eq!(updated.id, RemoteId::from(12));
    assert_eq!(updated.name, "A");
}

#[tokio::test]
async fn test_update_keeps_card_database() {
    let mock = Arc::new(
        MockMetabase::sample()
            .with_database(Database::new(RemoteId::from(42), "Archive"))
            .with_card(json!({
            "id": 20,
            "name": "Old",
            "dataset_query": {"type": "native", "native": {"query": "X"}, "database": 42},
            "display": "table",
            "visualization_settings": {"column_settings": {}}
        })),
    );
    let manager = refreshed_manager(mock.clone()).await;

    let update = CardUpdate {
        name: Some("New".to_string()),
        display_type: Some("pie".to_string()),
        ..CardUpdate::default()
    };
    manager.update(&RemoteId::from(20), &update).await.unwrap();

    let card = mock.card(&RemoteId::from(20)).unwrap();
    assert_eq!(card["name"], "New");
    assert_eq!(card["display"], "pie");
    assert_eq!(card["dataset_query"]["database"], 42);
    assert_eq!(card["dataset_query"]["native"]["query"], "X");
    assert_eq!(card["visualization_settings"], json!({}));
}

#[tokio::test]
async fn test_update_without_any_database_issues_no_write() {
    let mock = Arc::new(MockMetabase::new().with_card(json!({"id": 3, "name": "Loose"})));
    let manager = refreshed_manager(mock.clone()).await;

    let update = CardUpdate {
        sql: Some("SELECT 1".to_string()),
        ..CardUpdate::default()
    };
    let err = manager.update(&RemoteId::from(3), &update).await.unwrap_err();

    assert_eq!(err, MikaError::NoDatabaseAvailable);
    assert!(mock.write_requests().is_empty());
}

#[tokio::test]
async fn test_update_with_unrefreshed_cache_issues_no_write() {
    let mock = Arc::new(MockMetabase::sample().with_card(json!({
        "id": 7,
        "name": "A",
        "dataset_query": {"type": "native", "native": {"query": "X"}, "database": 1}
    })));
    let manager = CardManager::new(mock.clone(), Arc::new(MetadataCache::new(mock.clone())));

    let update = CardUpdate {
        sql: Some("Y".to_string()),
        ..CardUpdate::default()
    };
    let err = manager.update(&RemoteId::from(7), &update).await.unwrap_err();

    assert_eq!(err, MikaError::NoDatabaseAvailable);
    assert!(mock.write_requests().is_empty());
}

#[tokio::test]
async fn test_update_rejects_unknown_card_database() {
    let mock = Arc::new(
        MockMetabase::new()
            .with_database(Database::new(RemoteId::from(5), "Primary"))
            .with_card(json!({
                "id": 7,
                "name": "A",
                "dataset_query": {"type": "native", "native": {"query": "X"}, "database": 999}
            })),
    );
    let manager = refreshed_manager(mock.clone()).await;

    let update = CardUpdate {
        name: Some("B".to_string()),
        ..CardUpdate::default()
    };
    let err = manager.update(&RemoteId::from(7), &update).await.unwrap_err();

    assert!(matches!(err, MikaError::Validation(ref msg) if msg.contains("database 999")));
    assert!(mock.write_requests().is_empty());
    assert_eq!(mock.card(&RemoteId::from(7)).unwrap()["name"], "A");
}

#[tokio::test]
async fn test_update_put_failure_is_passed_through() {
    let mock = Arc::new(MockMetabase::sample());
    mock.fail_on(
        Method::Put,
        paths::card(&RemoteId::from(1)).unwrap(),
        MikaError::remote(403, "You don't have permissions to do that."),
    );
    let manager = refreshed_manager(mock.clone()).await;

    let err = manager
        .update(&RemoteId::from(1), &CardUpdate::default())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        MikaError::remote(403, "You don't have permissions to do that.")
    );
}

#[tokio::test]
async fn test_list_by_name_ignores_case() {
    let mock = Arc::new(
        MockMetabase::sample()
            .with_card(json!({"name": "Churn by Month"}))
            .with_card(json!({"name": "SALES pipeline"})),
    );
    let manager = refreshed_manager(mock).await;

    let found = manager.list_by_name("sales").await.unwrap();

    let names: Vec<&str> = found.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Q1 Sales Report", "SALES pipeline"]);
    assert_eq!(found[0].url, "http://metabase.test/card/1");
}

#[tokio::test]
async fn test_list_by_name_accepts_wrapped_list() {
    let mock = Arc::new(MockMetabase::sample().with_wrapped_lists(true));
    let manager = refreshed_manager(mock).await;

    let found = manager.list_by_name("q1").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, RemoteId::from(1));
}
