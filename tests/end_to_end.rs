//! Full pipeline: Rhai mappings, SQLite links and an HTTP directory.

use directory_sync::storage::{LinkKey, LinkStore};
use directory_sync::{
    EvaluatorLimits, HttpDirectoryClient, HttpDirectoryConfig, LocalUser, ObjectKind, PropertyMapping,
    Provider, SqliteLinkStore, StopReason, SyncClient, SyncConfig, SyncError,
};
use serde_json::json;
use wiremock::matchers::{any, body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROVIDER: &str = "workspace";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn provider() -> Provider {
    Provider::new(PROVIDER, "Workspace")
        .with_address_domain("example.com")
        .with_mapping(PropertyMapping::user(
            "10-name",
            r#"
                let parts = object.name.split(" ");
                #{ "name": #{ "givenName": parts[0], "familyName": parts[1] } }
            "#,
        ))
        .with_mapping(PropertyMapping::user(
            "20-status",
            r#"if object.is_active { () } else { #{ "suspended": true } }"#,
        ))
}

fn jane() -> LocalUser {
    LocalUser::new("user-1", "jane", "jane@example.com").with_name("Jane Doe")
}

async fn client_for(
    server: &MockServer,
    provider: Provider,
    config: SyncConfig,
) -> SyncClient<HttpDirectoryClient, SqliteLinkStore> {
    let directory =
        HttpDirectoryClient::new(HttpDirectoryConfig::new(server.uri(), "users")).unwrap();
    let links = SqliteLinkStore::new_in_memory().await.unwrap();
    SyncClient::builder(provider, directory, links)
        .with_config(config)
        .build()
        .unwrap()
}

fn expected_body() -> serde_json::Value {
    json!({
        "name": {"givenName": "Jane", "familyName": "Doe"},
        "primaryEmail": "jane@example.com"
    })
}

#[tokio::test]
async fn test_create_update_delete_lifecycle() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .and(body_json(expected_body()))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "104857"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/users/104857"))
        .and(body_json(expected_body()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "104857"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/users/104857"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, provider(), SyncConfig::default()).await;
    let key = LinkKey::new(PROVIDER, ObjectKind::User, "user-1");

    client.write(&jane()).await.unwrap();
    let link = client.links().find(&key).await.unwrap().unwrap();
    assert_eq!(link.external_id, "104857");

    client.write(&jane()).await.unwrap();
    assert_eq!(client.links().count(PROVIDER).await.unwrap(), 1);

    client.delete(&jane()).await.unwrap();
    assert!(!client.links().exists(&key).await.unwrap());
}

#[tokio::test]
async fn test_existing_remote_user_is_adopted() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": {"code": 409, "message": "Entity already exists."}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/users/jane@example.com"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, provider(), SyncConfig::default()).await;
    let key = LinkKey::new(PROVIDER, ObjectKind::User, "user-1");

    client.write(&jane()).await.unwrap();
    let link = client.links().find(&key).await.unwrap().unwrap();
    assert_eq!(link.external_id, "jane@example.com");

    client.write(&jane()).await.unwrap();
}

#[tokio::test]
async fn test_inactive_user_mapping_adds_suspended_flag() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .and(body_json(json!({
            "name": {"givenName": "Jane", "familyName": "Doe"},
            "suspended": true,
            "primaryEmail": "jane@example.com"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "1"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, provider(), SyncConfig::default()).await;
    client.write(&jane().inactive()).await.unwrap();
}

#[tokio::test]
async fn test_runaway_mapping_never_reaches_directory() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let provider = provider().with_mapping(PropertyMapping::user(
        "30-spin",
        "let n = 0; loop { n += 1; }",
    ));
    let config = SyncConfig::default().with_evaluator_limits(EvaluatorLimits {
        max_operations: 10_000,
        ..EvaluatorLimits::default()
    });
    let client = client_for(&server, provider, config).await;

    let err = client.write(&jane()).await.unwrap_err();
    match err {
        SyncError::StopSync(stop) => {
            assert_eq!(stop.reason, StopReason::MappingFailed);
            assert_eq!(stop.mapping.as_deref(), Some("30-spin"));
        }
        other => panic!("expected StopSync, got {:?}", other),
    }
    assert_eq!(client.links().count(PROVIDER).await.unwrap(), 0);
}

#[tokio::test]
async fn test_foreign_domain_address_never_reaches_directory() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server, provider(), SyncConfig::default()).await;
    let outsider = LocalUser::new("user-2", "eve", "eve@elsewhere.org").with_name("Eve Smith");

    let err = client.write(&outsider).await.unwrap_err();
    match err {
        SyncError::StopSync(stop) => assert_eq!(stop.reason, StopReason::InvalidAddress),
        other => panic!("expected StopSync, got {:?}", other),
    }
}
