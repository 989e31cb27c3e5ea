//! HTTP client integration tests.
//!
//! Runs `MetabaseClient` against a wiremock server. The live test at the
//! bottom needs METABASE_URL and METABASE_TOKEN and is skipped otherwise.

use std::sync::Arc;
use std::time::Duration;

use mika_sql::cards::CardManager;
use mika_sql::config::MetabaseConfig;
use mika_sql::error::MikaError;
use mika_sql::metabase::{paths, MetabaseApi, MetabaseClient, RemoteId};
use mika_sql::metadata::MetadataCache;
use mika_sql::tools::{self, Toolbox};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "mb_test_key_123456";

fn client_for(server: &MockServer) -> MetabaseClient {
    MetabaseClient::new(MetabaseConfig::new(format!("{}/", server.uri()), API_KEY)).unwrap()
}

#[tokio::test]
async fn test_get_sends_api_key_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/database"))
        .and(header("x-api-key", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1, "name": "Sample"}])))
        .expect(1)
        .mount(&server)
        .await;

    let response = client_for(&server).get(paths::DATABASES).await.unwrap();

    assert_eq!(response, json!([{"id": 1, "name": "Sample"}]));
}

#[tokio::test]
async fn test_custom_api_key_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/card"))
        .and(header("x-metabase-session", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let config = MetabaseConfig {
        api_key_header: "X-Metabase-Session".to_string(),
        ..MetabaseConfig::new(server.uri(), API_KEY)
    };
    let response = MetabaseClient::new(config)
        .unwrap()
        .get(paths::CARDS)
        .await
        .unwrap();

    assert_eq!(response, json!([]));
}

#[tokio::test]
async fn test_non_success_status_is_remote_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/card/7"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthenticated"))
        .mount(&server)
        .await;
    let client = client_for(&server);

    let err = client
        .get(&paths::card(&RemoteId::from(7)).unwrap())
        .await
        .unwrap_err();
    assert_eq!(err, MikaError::remote(401, "Unauthenticated"));

    let err = client.get("/api/unknown").await.unwrap_err();
    assert!(matches!(err, MikaError::Remote { status: 404, .. }));
}

#[tokio::test]
async fn test_post_and_put_send_json_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/card"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"name": "One"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 31})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/card/31"))
        .and(header_exists("x-api-key"))
        .and(body_json(json!({"name": "Two"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let client = client_for(&server);

    let created = client
        .post(paths::CARDS, &json!({"name": "One"}))
        .await
        .unwrap();
    let updated = client
        .put(&paths::card(&RemoteId::from(31)).unwrap(), &json!({"name": "Two"}))
        .await
        .unwrap();

    assert_eq!(created, json!({"id": 31}));
    assert_eq!(updated, Value::Null);
}

#[tokio::test]
async fn test_invalid_json_is_internal_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/database"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server).get(paths::DATABASES).await.unwrap_err();
    assert!(matches!(err, MikaError::Internal(_)));
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = MetabaseClient::new(MetabaseConfig::new(format!("http://{addr}"), API_KEY)).unwrap();
    let err = client.get(paths::DATABASES).await.unwrap_err();

    assert!(matches!(err, MikaError::Transport(_)));
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/database"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = MetabaseConfig {
        read_timeout_secs: 1,
        ..MetabaseConfig::new(server.uri(), API_KEY)
    };
    let err = MetabaseClient::new(config)
        .unwrap()
        .get(paths::DATABASES)
        .await
        .unwrap_err();

    assert_eq!(err, MikaError::transport("Request timed out after 1s"));
}

#[tokio::test]
async fn test_refresh_and_create_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/database"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": [{"id": 4, "name": "Shop"}], "total": 1})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/database/4/metadata"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 4,
            "tables": [{
                "id": 40,
                "name": "payments",
                "fields": [{"id": 400, "name": "payment_method", "base_type": "type/Text"}]
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/card"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 77, "name": "Mix"})))
        .expect(1)
        .mount(&server)
        .await;

    let api: Arc<dyn MetabaseApi> = Arc::new(client_for(&server));
    let cache = Arc::new(MetadataCache::new(Arc::clone(&api)));
    cache.refresh().await.unwrap();

    let snapshot = cache.current();
    assert_eq!(snapshot.databases[0].tables[0].fields[0].display_name, "payment_method");

    let created = CardManager::new(api, cache)
        .create("SELECT 1", "Mix", Some("pie"))
        .await
        .unwrap();

    assert_eq!(created.url, format!("{}/card/77", server.uri()));
    let requests = server.received_requests().await.unwrap();
    let post = requests
        .iter()
        .find(|r| r.method.as_str() == "POST")
        .unwrap();
    let body: Value = serde_json::from_slice(&post.body).unwrap();
    assert_eq!(body["dataset_query"]["database"], 4);
}

#[tokio::test]
async fn test_update_card_with_traversal_id_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/database"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1, "name": "Shop"}])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/database/1/metadata"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "tables": []})))
        .mount(&server)
        .await;

    let api: Arc<dyn MetabaseApi> = Arc::new(client_for(&server));
    let cache = Arc::new(MetadataCache::new(Arc::clone(&api)));
    cache.refresh().await.unwrap();
    let refresh_requests = server.received_requests().await.unwrap().len();

    let toolbox = Toolbox::new(api, cache);
    let output: Value = serde_json::from_str(
        &toolbox
            .invoke(
                tools::UPDATE_CARD,
                r#"{"card_id": "1/../../user/1", "name": "renamed"}"#,
            )
            .await,
    )
    .unwrap();

    assert_eq!(output["error"]["kind"], "validation");
    assert_eq!(
        server.received_requests().await.unwrap().len(),
        refresh_requests
    );
}

#[tokio::test]
async fn test_live_metabase_lists_databases() {
    let _ = dotenvy::dotenv();
    let Ok(client) = MetabaseClient::from_env() else {
        eprintln!("Skipping test: invalid METABASE_URL");
        return;
    };
    if !client.config().is_configured() {
        eprintln!("Skipping test: METABASE_URL or METABASE_TOKEN not set");
        return;
    }

    let cache = MetadataCache::new(Arc::new(client));
    cache.refresh().await.unwrap();
    assert!(cache.completed_refreshes() == 1);
}
