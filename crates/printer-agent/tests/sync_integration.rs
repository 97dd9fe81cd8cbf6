//! End-to-end sync passes: a real `ConfigStore` on disk, a real
//! `BackendClient`, and a `wiremock` server standing in for the backend.

use std::sync::Arc;
use std::time::Duration;

use printer_agent::application::{PrinterSync, SyncError, SyncOutcome};
use printer_agent::infrastructure::backend_client::BackendClient;
use printer_agent::infrastructure::storage::ConfigStore;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OWNER: &str = "owner-1";
const DEFAULT_ACTIVE_PATH: &str = "/api/public/printer/owner-1/default-active";

struct Fixture {
    _dir: TempDir,
    store: Arc<ConfigStore>,
    sync: PrinterSync,
}

fn fixture(server: &MockServer, timeout: Duration) -> Fixture {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(ConfigStore::new(dir.path().join("printer-config.json")));
    let client = BackendClient::new(&server.uri(), timeout).unwrap();
    let sync = PrinterSync::new(store.clone(), Arc::new(client));
    Fixture {
        _dir: dir,
        store,
        sync,
    }
}

fn envelope(printer: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "statuscode": 200,
        "status": true,
        "data": printer,
    }))
}

#[tokio::test]
async fn test_backend_printer_replaces_local_printer() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DEFAULT_ACTIVE_PATH))
        .respond_with(envelope("HP-2"))
        .expect(1)
        .mount(&server)
        .await;
    let f = fixture(&server, Duration::from_secs(5));
    f.store.set_active_printer("HP-1", Some(OWNER));

    // Act
    let outcome = f.sync.run_pass().await;

    // Assert
    assert_eq!(
        outcome,
        SyncOutcome::Updated {
            previous: Some("HP-1".to_string()),
            current: "HP-2".to_string(),
        }
    );
    let reopened = ConfigStore::new(f.store.path());
    assert_eq!(reopened.get_active_printer().as_deref(), Some("HP-2"));
    assert_eq!(reopened.get_owner_id().as_deref(), Some(OWNER));
}

#[tokio::test]
async fn test_matching_printer_leaves_document_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DEFAULT_ACTIVE_PATH))
        .respond_with(envelope("HP-1"))
        .mount(&server)
        .await;
    let f = fixture(&server, Duration::from_secs(5));
    f.store.set_active_printer("HP-1", Some(OWNER));
    let before = f.store.get_all_config();

    let outcome = f.sync.run_pass().await;

    assert_eq!(
        outcome,
        SyncOutcome::Unchanged {
            printer: "HP-1".to_string()
        }
    );
    assert_eq!(f.store.get_all_config().last_updated, before.last_updated);
}

#[tokio::test]
async fn test_no_owner_means_no_backend_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(envelope("HP-2"))
        .expect(0)
        .mount(&server)
        .await;
    let f = fixture(&server, Duration::from_secs(5));
    f.store.set_active_printer("HP-1", None);

    let outcome = f.sync.run_pass().await;

    assert_eq!(outcome, SyncOutcome::NoOwner);
    assert_eq!(f.store.get_active_printer().as_deref(), Some("HP-1"));
}

#[tokio::test]
async fn test_http_error_status_keeps_local_printer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DEFAULT_ACTIVE_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let f = fixture(&server, Duration::from_secs(5));
    f.store.set_active_printer("HP-1", Some(OWNER));

    let outcome = f.sync.run_pass().await;

    assert_eq!(outcome, SyncOutcome::RemoteFailed(SyncError::HttpStatus(500)));
    assert_eq!(f.store.get_active_printer().as_deref(), Some("HP-1"));
}

#[tokio::test]
async fn test_unsuccessful_envelope_keeps_local_printer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DEFAULT_ACTIVE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "statuscode": 500,
            "status": false,
        })))
        .mount(&server)
        .await;
    let f = fixture(&server, Duration::from_secs(5));
    f.store.set_active_printer("HP-1", Some(OWNER));

    let outcome = f.sync.run_pass().await;

    assert!(matches!(outcome, SyncOutcome::Rejected(_)));
    assert_eq!(f.store.get_active_printer().as_deref(), Some("HP-1"));
}

#[tokio::test]
async fn test_non_json_body_is_a_decode_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DEFAULT_ACTIVE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;
    let f = fixture(&server, Duration::from_secs(5));
    f.store.set_active_printer("HP-1", Some(OWNER));

    let outcome = f.sync.run_pass().await;

    assert!(matches!(
        outcome,
        SyncOutcome::RemoteFailed(SyncError::Decode(_))
    ));
}

#[tokio::test]
async fn test_slow_backend_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DEFAULT_ACTIVE_PATH))
        .respond_with(envelope("HP-2").set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;
    let f = fixture(&server, Duration::from_millis(200));
    f.store.set_active_printer("HP-1", Some(OWNER));

    let outcome = f.sync.run_pass().await;

    assert_eq!(outcome, SyncOutcome::RemoteFailed(SyncError::Timeout));
    assert_eq!(f.store.get_active_printer().as_deref(), Some("HP-1"));
}

#[tokio::test]
async fn test_owner_id_is_percent_encoded_in_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/public/printer/team%2Fa%20b/default-active"))
        .respond_with(envelope("Lab"))
        .expect(1)
        .mount(&server)
        .await;
    let f = fixture(&server, Duration::from_secs(5));
    f.store.set_active_printer("Office", Some("team/a b"));

    let outcome = f.sync.run_pass().await;

    assert!(matches!(outcome, SyncOutcome::Updated { .. }));
}

#[tokio::test]
async fn test_user_choice_during_slow_fetch_is_not_overwritten() {
    // Arrange: the backend answers for the old owner after 500 ms.
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/public/printer/owner-A/default-active"))
        .respond_with(envelope("Remote-A").set_delay(Duration::from_millis(500)))
        .expect(1)
        .mount(&server)
        .await;
    let f = fixture(&server, Duration::from_secs(5));
    f.store.set_active_printer("Old", Some("owner-A"));

    // Act: the user picks a new printer and owner while the pass waits.
    let pass = async { f.sync.run_pass().await };
    let user = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        f.store.set_active_printer("UserPick", Some("owner-B"));
    };
    let (outcome, ()) = tokio::join!(pass, user);

    // Assert
    assert_eq!(
        outcome,
        SyncOutcome::OwnerChanged {
            expected: "owner-A".to_string(),
            current: Some("owner-B".to_string()),
        }
    );
    let reopened = ConfigStore::new(f.store.path());
    assert_eq!(reopened.get_active_printer().as_deref(), Some("UserPick"));
    assert_eq!(reopened.get_owner_id().as_deref(), Some("owner-B"));
}
