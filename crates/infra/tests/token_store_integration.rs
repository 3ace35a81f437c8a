//! Integration tests for file-backed session persistence
//!
//! A session written by one client must be visible to the next one started
//! on the same file, and a failed refresh must leave nothing behind on disk.

use std::sync::Arc;

use serde_json::{json, Value};
use tradepost_core::TokenStore;
use tradepost_domain::{ClientConfig, Session};
use tradepost_infra::{ApiClient, JsonFileBackend, KeyValueTokenStore};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn file_store(path: &std::path::Path) -> Arc<KeyValueTokenStore<JsonFileBackend>> {
    Arc::new(KeyValueTokenStore::new(Arc::new(JsonFileBackend::new(path))))
}

#[test]
fn session_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("session.json");

    let user = serde_json::from_value(json!({ "_id": "u1", "email": "ada@example.com" })).unwrap();
    file_store(&file)
        .set_session(&Session::new("T1").with_refresh_token("R1").with_user(user))
        .unwrap();

    let reopened = file_store(&file);
    let session = reopened.session().expect("session should be persisted");

    assert_eq!(session.access_token, "T1");
    assert_eq!(session.refresh_token.as_deref(), Some("R1"));
    assert_eq!(session.user.map(|u| u.id), Some("u1".to_string()));
}

#[test]
fn file_keeps_unrelated_keys_on_clear() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("session.json");
    std::fs::write(&file, r#"{ "theme": "dark", "accessToken": "legacy" }"#).unwrap();

    let store = file_store(&file);
    assert_eq!(store.access_token().as_deref(), Some("legacy"));

    store.clear().unwrap();

    let on_disk: Value = serde_json::from_str(&std::fs::read_to_string(&file).unwrap()).unwrap();
    assert_eq!(on_disk, json!({ "theme": "dark" }));
}

#[tokio::test]
async fn failed_refresh_clears_the_session_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("session.json");
    let store = file_store(&file);
    store.set_session(&Session::new("T1").with_refresh_token("R1")).unwrap();

    let client = ApiClient::builder()
        .config(ClientConfig { api_url: server.uri(), ..Default::default() })
        .store(store)
        .build()
        .unwrap();

    assert!(client.get::<Value>("/me").await.is_err());

    assert!(file_store(&file).session().is_none());
}

#[test]
fn file_session_is_read_from_one_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("session.json");
    let store = file_store(&file);
    store.set_session(&Session::new("T0").with_refresh_token("R0")).unwrap();

    let writer = {
        let store = Arc::clone(&store);
        std::thread::spawn(move || {
            for n in 1..=200 {
                let session = Session::new(format!("T{n}")).with_refresh_token(format!("R{n}"));
                store.set_session(&session).unwrap();
            }
        })
    };

    while !writer.is_finished() {
        let session = store.session().expect("a session is always stored");
        assert_eq!(
            session.access_token.trim_start_matches('T'),
            session.refresh_token.as_deref().unwrap_or_default().trim_start_matches('R'),
        );
    }
    writer.join().unwrap();
}
