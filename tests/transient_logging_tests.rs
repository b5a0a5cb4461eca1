//! Warn-level logging under a sustained rate limit.
//!
//! Installs a process-wide recording logger, so this file holds a single test.

use directory_sync::{
    DirectoryClient, ExternalDocument, HttpDirectoryClient, HttpDirectoryConfig, InMemoryLinkStore,
    LocalUser, PropertyMapping, Provider, SyncClient,
};
use log::{Level, LevelFilter, Log, Metadata, Record};
use serde_json::json;
use std::sync::Mutex;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Records the level of every log record emitted by this crate.
struct RecordingLogger {
    levels: Mutex<Vec<Level>>,
}

impl RecordingLogger {
    fn warnings(&self) -> usize {
        self.levels
            .lock()
            .unwrap()
            .iter()
            .filter(|level| **level <= Level::Warn)
            .count()
    }

    fn reset(&self) {
        self.levels.lock().unwrap().clear();
    }
}

impl Log for RecordingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.target().starts_with("directory_sync")
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.levels.lock().unwrap().push(record.level());
        }
    }

    fn flush(&self) {}
}

static LOGGER: RecordingLogger = RecordingLogger {
    levels: Mutex::new(Vec::new()),
};

fn document() -> ExternalDocument {
    json!({"primaryEmail": "jane@example.com"})
        .as_object()
        .cloned()
        .unwrap()
}

#[tokio::test]
async fn test_sustained_rate_limit_warns_once_per_provider() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Trace);

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "30")
                .set_body_string("Quota exceeded"),
        )
        .mount(&server)
        .await;
    let config = HttpDirectoryConfig::new(server.uri(), "users");

    // The transport layer classifies but leaves warning to the sync client.
    let directory = HttpDirectoryClient::new(config.clone()).unwrap();
    for _ in 0..20 {
        let err = directory.create(&document()).await.unwrap_err();
        assert!(err.is_transient());
    }
    assert_eq!(LOGGER.warnings(), 0);

    LOGGER.reset();
    let provider = Provider::new("workspace", "Workspace").with_mapping(PropertyMapping::user(
        "10-name",
        r#"#{ "name": #{ "fullName": object.name } }"#,
    ));
    let client = SyncClient::builder(
        provider,
        HttpDirectoryClient::new(config).unwrap(),
        InMemoryLinkStore::new(),
    )
    .build()
    .unwrap();

    for i in 0..20 {
        let user = LocalUser::new(
            format!("user-{}", i),
            format!("user{}", i),
            format!("user{}@example.com", i),
        )
        .with_name("Rate Limited");
        let err = client.write(&user).await.unwrap_err();
        assert!(err.is_retryable());
    }
    assert_eq!(LOGGER.warnings(), 1);
}
