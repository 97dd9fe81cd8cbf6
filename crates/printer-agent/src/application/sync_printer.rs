//! One reconciliation pass between the local active printer and the
//! backend's default printer for the configured owner.
//!
//! The pass is a small decision procedure:
//!
//! 1. No owner stored: nothing to ask the backend about, stop.
//! 2. Fetch the backend's default printer for that owner.  Any transport,
//!    status, or decode failure stops the pass with local state untouched.
//! 3. Only an envelope with `statuscode == 200`, `status == true`, and a
//!    non-empty `data` is authoritative.  Anything else stops the pass.
//! 4. If the backend's printer differs (exact, case-sensitive comparison) from
//!    the local one, write it together with the owner id.  Otherwise do not
//!    write at all, so `lastUpdated` keeps pointing at the last real change.
//!
//! Step 4 is one compare-and-write inside the store: if the owner was changed
//! while the backend call was in flight, the user's newer choice stands and
//! nothing is written.
//!
//! Store calls touch the file system, so they run on Tokio's blocking pool.
//!
//! The pass never fails from the caller's point of view; it reports what it
//! did as a [`SyncOutcome`] and logs the details.

use std::sync::Arc;

use async_trait::async_trait;
use printer_agent_core::RemoteEnvelope;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a call to the backend produced no envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("backend did not answer within the timeout")]
    Timeout,

    #[error("backend unreachable: {0}")]
    Unreachable(String),

    #[error("backend answered with HTTP {0}")]
    HttpStatus(u16),

    #[error("backend response is not a valid envelope: {0}")]
    Decode(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Result of [`ActivePrinterStore::replace_printer_if_owner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrinterReplacement {
    /// The stored printer already had the requested name; nothing written.
    Unchanged,
    /// The printer was replaced and persisted.
    Replaced { previous: Option<String> },
    /// The stored owner is no longer the expected one; nothing written.
    OwnerChanged { current: Option<String> },
    /// The write was attempted but did not reach the disk.
    NotPersisted(String),
}

/// The slice of the config store a sync pass reads and writes.
pub trait ActivePrinterStore: Send + Sync {
    /// The owner id the printer is registered under, if any.
    fn owner_id(&self) -> Option<String>;

    /// Atomically, with respect to other writers: if the stored owner is
    /// still `expected_owner` and the stored printer differs from `name`,
    /// stores `name` with that owner.
    fn replace_printer_if_owner(&self, expected_owner: &str, name: &str) -> PrinterReplacement;
}

/// Source of the backend's authoritative printer for an owner.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemotePrinterSource: Send + Sync {
    /// Fetches the `{statuscode, status, data}` envelope for `owner_id`.
    async fn fetch_default_printer(&self, owner_id: &str) -> Result<RemoteEnvelope, SyncError>;
}

/// What a sync pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No owner id stored; the backend was not contacted.
    NoOwner,
    /// The backend agrees with the local printer; nothing written.
    Unchanged { printer: String },
    /// The local printer was replaced with the backend's.
    Updated {
        previous: Option<String>,
        current: String,
    },
    /// The backend call failed; nothing written.
    RemoteFailed(SyncError),
    /// The backend answered but not with an authoritative printer.
    Rejected(String),
    /// The owner was changed locally during the pass; nothing written.
    OwnerChanged {
        expected: String,
        current: Option<String>,
    },
    /// The store could not be read or written.
    StoreFailed(String),
    /// A previous pass was still running; this one did not start.
    Skipped,
}

/// Runs sync passes against a store and a remote source.
pub struct PrinterSync {
    store: Arc<dyn ActivePrinterStore>,
    remote: Arc<dyn RemotePrinterSource>,
}

impl PrinterSync {
    pub fn new(store: Arc<dyn ActivePrinterStore>, remote: Arc<dyn RemotePrinterSource>) -> Self {
        Self { store, remote }
    }

    /// Executes one pass.  See the module docs for the decision procedure.
    pub async fn run_pass(&self) -> SyncOutcome {
        let owner_id = match self.with_store(|store| store.owner_id()).await {
            Ok(Some(owner_id)) => owner_id,
            Ok(None) => {
                info!("printer sync: no owner id configured, skipping");
                return SyncOutcome::NoOwner;
            }
            Err(outcome) => return outcome,
        };

        debug!("printer sync: asking backend for owner {owner_id}");
        let envelope = match self.remote.fetch_default_printer(&owner_id).await {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("printer sync: backend call failed: {e}");
                return SyncOutcome::RemoteFailed(e);
            }
        };

        let remote_printer = match envelope.authoritative_printer() {
            Ok(name) => name.to_string(),
            Err(e) => {
                warn!("printer sync: ignoring backend response: {e}");
                return SyncOutcome::Rejected(e.to_string());
            }
        };

        let replacement = {
            let owner_id = owner_id.clone();
            let name = remote_printer.clone();
            self.with_store(move |store| store.replace_printer_if_owner(&owner_id, &name))
                .await
        };

        match replacement {
            Ok(PrinterReplacement::Unchanged) => {
                info!("printer sync: '{remote_printer}' already active");
                SyncOutcome::Unchanged {
                    printer: remote_printer,
                }
            }
            Ok(PrinterReplacement::Replaced { previous }) => {
                info!(
                    "printer sync: active printer changed from {} to '{remote_printer}'",
                    previous
                        .as_deref()
                        .map_or_else(|| "<none>".to_string(), |p| format!("'{p}'"))
                );
                SyncOutcome::Updated {
                    previous,
                    current: remote_printer,
                }
            }
            Ok(PrinterReplacement::OwnerChanged { current }) => {
                info!(
                    "printer sync: owner changed from {owner_id} to {} during the pass; \
                     keeping the local choice",
                    current.as_deref().unwrap_or("<none>")
                );
                SyncOutcome::OwnerChanged {
                    expected: owner_id,
                    current,
                }
            }
            Ok(PrinterReplacement::NotPersisted(reason)) => SyncOutcome::StoreFailed(reason),
            Err(outcome) => outcome,
        }
    }

    /// Runs `work` against the store on the blocking pool.
    async fn with_store<T, F>(&self, work: F) -> Result<T, SyncOutcome>
    where
        F: FnOnce(&dyn ActivePrinterStore) -> T + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || work(store.as_ref()))
            .await
            .map_err(|e| {
                warn!("printer sync: store task failed: {e}");
                SyncOutcome::StoreFailed(e.to_string())
            })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use mockall::predicate::eq;

    // ── Test doubles ──────────────────────────────────────────────────────────

    #[derive(Default)]
    struct MemoryStore {
        printer: Mutex<Option<String>>,
        owner: Mutex<Option<String>>,
        writes: Mutex<Vec<(String, Option<String>)>>,
    }

    impl MemoryStore {
        fn with(printer: Option<&str>, owner: Option<&str>) -> Self {
            Self {
                printer: Mutex::new(printer.map(str::to_string)),
                owner: Mutex::new(owner.map(str::to_string)),
                writes: Mutex::default(),
            }
        }

        fn write_count(&self) -> usize {
            self.writes.lock().unwrap().len()
        }

        fn active_printer(&self) -> Option<String> {
            self.printer.lock().unwrap().clone()
        }

        /// Simulates a user choosing a printer through the HTTP API.
        fn user_selects(&self, printer: &str, owner: &str) {
            *self.printer.lock().unwrap() = Some(printer.to_string());
            *self.owner.lock().unwrap() = Some(owner.to_string());
        }
    }

    impl ActivePrinterStore for MemoryStore {
        fn owner_id(&self) -> Option<String> {
            self.owner.lock().unwrap().clone()
        }

        fn replace_printer_if_owner(&self, expected_owner: &str, name: &str) -> PrinterReplacement {
            let owner = self.owner.lock().unwrap().clone();
            if owner.as_deref() != Some(expected_owner) {
                return PrinterReplacement::OwnerChanged { current: owner };
            }

            let mut printer = self.printer.lock().unwrap();
            if printer.as_deref() == Some(name) {
                return PrinterReplacement::Unchanged;
            }
            let previous = printer.replace(name.to_string());
            self.writes
                .lock()
                .unwrap()
                .push((name.to_string(), Some(expected_owner.to_string())));
            PrinterReplacement::Replaced { previous }
        }
    }

    /// Store whose conditional write never reaches the disk.
    struct ReadOnlyStore;

    impl ActivePrinterStore for ReadOnlyStore {
        fn owner_id(&self) -> Option<String> {
            Some("u".to_string())
        }

        fn replace_printer_if_owner(&self, _expected_owner: &str, _name: &str) -> PrinterReplacement {
            PrinterReplacement::NotPersisted("read-only file system".to_string())
        }
    }

    fn remote_returning(
        result: Result<RemoteEnvelope, SyncError>,
    ) -> MockRemotePrinterSource {
        let mut remote = MockRemotePrinterSource::new();
        remote
            .expect_fetch_default_printer()
            .times(1)
            .returning(move |_| result.clone());
        remote
    }

    fn sync_with(store: &Arc<MemoryStore>, remote: MockRemotePrinterSource) -> PrinterSync {
        PrinterSync::new(Arc::clone(store) as Arc<dyn ActivePrinterStore>, Arc::new(remote))
    }

    // ── Decision procedure ────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_no_owner_never_calls_backend() {
        // Arrange
        let store = Arc::new(MemoryStore::with(Some("HP-1"), None));
        let mut remote = MockRemotePrinterSource::new();
        remote.expect_fetch_default_printer().times(0);

        // Act
        let outcome = sync_with(&store, remote).run_pass().await;

        // Assert
        assert_eq!(outcome, SyncOutcome::NoOwner);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_backend_is_asked_for_stored_owner() {
        let store = Arc::new(MemoryStore::with(Some("HP-1"), Some("owner-9")));
        let mut remote = MockRemotePrinterSource::new();
        remote
            .expect_fetch_default_printer()
            .with(eq("owner-9"))
            .times(1)
            .returning(|_| Ok(RemoteEnvelope::ok("HP-1")));

        sync_with(&store, remote).run_pass().await;
    }

    #[tokio::test]
    async fn test_different_remote_printer_replaces_local() {
        // Arrange
        let store = Arc::new(MemoryStore::with(Some("HP-1"), Some("u")));
        let remote = remote_returning(Ok(RemoteEnvelope::ok("HP-2")));

        // Act
        let outcome = sync_with(&store, remote).run_pass().await;

        // Assert
        assert_eq!(
            outcome,
            SyncOutcome::Updated {
                previous: Some("HP-1".to_string()),
                current: "HP-2".to_string()
            }
        );
        assert_eq!(store.active_printer().as_deref(), Some("HP-2"));
        assert_eq!(store.owner_id().as_deref(), Some("u"));
    }

    #[tokio::test]
    async fn test_same_remote_printer_writes_nothing() {
        let store = Arc::new(MemoryStore::with(Some("HP-1"), Some("u")));
        let remote = remote_returning(Ok(RemoteEnvelope::ok("HP-1")));

        let outcome = sync_with(&store, remote).run_pass().await;

        assert_eq!(
            outcome,
            SyncOutcome::Unchanged {
                printer: "HP-1".to_string()
            }
        );
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_comparison_is_case_sensitive() {
        let store = Arc::new(MemoryStore::with(Some("hp-1"), Some("u")));
        let remote = remote_returning(Ok(RemoteEnvelope::ok("HP-1")));

        let outcome = sync_with(&store, remote).run_pass().await;

        assert!(matches!(outcome, SyncOutcome::Updated { .. }));
        assert_eq!(store.active_printer().as_deref(), Some("HP-1"));
    }

    #[tokio::test]
    async fn test_owner_without_local_printer_gets_remote_printer() {
        let store = Arc::new(MemoryStore::with(None, Some("u")));
        let remote = remote_returning(Ok(RemoteEnvelope::ok("HP-2")));

        let outcome = sync_with(&store, remote).run_pass().await;

        assert_eq!(
            outcome,
            SyncOutcome::Updated {
                previous: None,
                current: "HP-2".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_error_envelope_leaves_state_untouched() {
        // Arrange
        let store = Arc::new(MemoryStore::with(Some("HP-1"), Some("u")));
        let remote = remote_returning(Ok(RemoteEnvelope {
            statuscode: 500,
            status: false,
            data: None,
        }));

        // Act
        let outcome = sync_with(&store, remote).run_pass().await;

        // Assert
        assert!(matches!(outcome, SyncOutcome::Rejected(_)));
        assert_eq!(store.write_count(), 0);
        assert_eq!(store.active_printer().as_deref(), Some("HP-1"));
    }

    #[tokio::test]
    async fn test_successful_envelope_without_printer_is_rejected() {
        let store = Arc::new(MemoryStore::with(Some("HP-1"), Some("u")));
        let remote = remote_returning(Ok(RemoteEnvelope {
            statuscode: 200,
            status: true,
            data: Some(String::new()),
        }));

        let outcome = sync_with(&store, remote).run_pass().await;

        assert!(matches!(outcome, SyncOutcome::Rejected(_)));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_leaves_state_untouched() {
        let store = Arc::new(MemoryStore::with(Some("HP-1"), Some("u")));
        let remote = remote_returning(Err(SyncError::Timeout));

        let outcome = sync_with(&store, remote).run_pass().await;

        assert_eq!(outcome, SyncOutcome::RemoteFailed(SyncError::Timeout));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_update_writes_owner_alongside_printer() {
        let store = Arc::new(MemoryStore::with(Some("HP-1"), Some("owner-3")));
        let remote = remote_returning(Ok(RemoteEnvelope::ok("HP-7")));

        sync_with(&store, remote).run_pass().await;

        assert_eq!(
            store.writes.lock().unwrap().as_slice(),
            &[("HP-7".to_string(), Some("owner-3".to_string()))]
        );
    }

    // ── Concurrent local changes ──────────────────────────────────────────────

    #[tokio::test]
    async fn test_owner_changed_during_fetch_keeps_user_choice() {
        // Arrange: the user picks a new printer and owner while the backend
        // call for the old owner is in flight.
        let store = Arc::new(MemoryStore::with(Some("Old"), Some("owner-A")));
        let during_fetch = Arc::clone(&store);
        let mut remote = MockRemotePrinterSource::new();
        remote
            .expect_fetch_default_printer()
            .with(eq("owner-A"))
            .times(1)
            .returning(move |_| {
                during_fetch.user_selects("UserPick", "owner-B");
                Ok(RemoteEnvelope::ok("Remote-A"))
            });

        // Act
        let outcome = sync_with(&store, remote).run_pass().await;

        // Assert
        assert_eq!(
            outcome,
            SyncOutcome::OwnerChanged {
                expected: "owner-A".to_string(),
                current: Some("owner-B".to_string()),
            }
        );
        assert_eq!(store.active_printer().as_deref(), Some("UserPick"));
        assert_eq!(store.owner_id().as_deref(), Some("owner-B"));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_unpersisted_write_is_reported_as_store_failure() {
        let remote = remote_returning(Ok(RemoteEnvelope::ok("HP-2")));
        let sync = PrinterSync::new(Arc::new(ReadOnlyStore), Arc::new(remote));

        let outcome = sync.run_pass().await;

        assert!(matches!(outcome, SyncOutcome::StoreFailed(_)));
    }
}
