//! JSON-file persistence for the agent's [`ConfigDocument`].
//!
//! One process owns one file (`printer-config.json` in the working directory
//! unless configured otherwise).  The store exposes the operations the HTTP
//! API and the backend sync need, and never returns an error to its callers:
//!
//! - A missing, unreadable, or corrupt file reads as the empty document.
//! - A failed write is logged and the in-memory value is discarded; the next
//!   read sees whatever is on disk.
//!
//! # Concurrency
//!
//! Every mutation is a read-modify-write of the whole file.  Mutations are
//! serialised through a process-wide mutex so two concurrent writers to
//! different keys both land.  Readers take no lock: each write goes to a
//! uniquely named temporary file in the same directory which is then renamed
//! over the target, so a reader sees either the old or the new document and
//! never a truncated one.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use printer_agent_core::{ConfigDocument, SettingValue};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::sync_printer::{ActivePrinterStore, PrinterReplacement};
use crate::domain::config::DEFAULT_CONFIG_FILE;

/// Internal failure while touching the config file.  Logged, never surfaced.
#[derive(Debug, Error)]
enum StoreError {
    #[error("I/O error accessing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("config file is not a valid document: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("failed to serialize config document: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Durable home of the active printer, owner id, and print settings.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The configured printer, or `None` when none is stored.
    pub fn get_active_printer(&self) -> Option<String> {
        self.read_document().active_printer().map(str::to_string)
    }

    /// The owner id the printer is registered under, or `None`.
    pub fn get_owner_id(&self) -> Option<String> {
        self.read_document().owner_id().map(str::to_string)
    }

    /// Stores `name` and `owner_id` together and stamps `lastUpdated`.
    ///
    /// Print settings and unknown keys already in the file are preserved.
    pub fn set_active_printer(&self, name: &str, owner_id: Option<&str>) {
        let persisted = self.mutate("set active printer", |doc, now| {
            doc.set_active_printer(name, owner_id.map(str::to_string), now);
        });
        if persisted {
            info!("active printer set to '{name}' (owner: {})", owner_id.unwrap_or("none"));
        }
    }

    /// Replaces the printer only while `expected_owner` is still the stored
    /// owner and the stored printer differs from `name`.
    ///
    /// The check and the write happen under the write lock, so a user choice
    /// made after `expected_owner` was read is never overwritten.
    pub fn replace_printer_if_owner(&self, expected_owner: &str, name: &str) -> PrinterReplacement {
        let _guard = self.lock_writes();

        let mut doc = self.read_document();
        if doc.owner_id() != Some(expected_owner) {
            return PrinterReplacement::OwnerChanged {
                current: doc.owner_id().map(str::to_string),
            };
        }
        if doc.active_printer() == Some(name) {
            return PrinterReplacement::Unchanged;
        }

        let previous = doc.active_printer().map(str::to_string);
        doc.set_active_printer(
            name,
            Some(expected_owner.to_string()),
            chrono::Utc::now().timestamp_millis(),
        );

        match self.save(&doc) {
            Ok(()) => {
                info!("active printer set to '{name}' (owner: {expected_owner})");
                PrinterReplacement::Replaced { previous }
            }
            Err(e) => {
                warn!("replace active printer not persisted: {e}");
                PrinterReplacement::NotPersisted(e.to_string())
            }
        }
    }

    /// Upserts one print setting and stamps `lastUpdated`.
    pub fn set_print_setting(&self, key: &str, value: SettingValue) {
        debug!("setting print option {key} = {value}");
        self.mutate("set print setting", |doc, now| {
            doc.set_print_setting(key, value, now);
        });
    }

    /// Returns the setting for `key` as text, or `default` when it is not set.
    pub fn get_print_setting(&self, key: &str, default: &str) -> String {
        self.read_document()
            .print_setting(key)
            .unwrap_or_else(|| default.to_string())
    }

    /// The whole document; empty when the file is absent or unreadable.
    pub fn get_all_config(&self) -> ConfigDocument {
        self.read_document()
    }

    /// Deletes the config file so every subsequent read is empty.
    pub fn reset_config(&self) {
        let _guard = self.lock_writes();

        match fs::remove_file(&self.path) {
            Ok(()) => info!("configuration reset: removed {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("configuration reset: {} did not exist", self.path.display());
            }
            Err(source) => {
                let err = StoreError::Io {
                    path: self.path.clone(),
                    source,
                };
                warn!("configuration reset failed: {err}");
            }
        }
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn read_document(&self) -> ConfigDocument {
        match self.load() {
            Ok(Some(doc)) => doc,
            Ok(None) => ConfigDocument::default(),
            Err(e) => {
                warn!("treating config as empty: {e}");
                ConfigDocument::default()
            }
        }
    }

    fn load(&self) -> Result<Option<ConfigDocument>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(StoreError::Parse)
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `change` to the current document under the write lock and
    /// persists the result.  `change` receives the current epoch millis.
    ///
    /// Returns `false` when the document could not be saved.
    fn mutate<F>(&self, operation: &str, change: F) -> bool
    where
        F: FnOnce(&mut ConfigDocument, i64),
    {
        let _guard = self.lock_writes();

        let mut doc = self.read_document();
        change(&mut doc, chrono::Utc::now().timestamp_millis());

        match self.save(&doc) {
            Ok(()) => true,
            Err(e) => {
                warn!("{operation} not persisted: {e}");
                false
            }
        }
    }

    fn save(&self, doc: &ConfigDocument) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(doc).map_err(StoreError::Serialize)?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| StoreError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let tmp = temp_path_for(&self.path);
        if let Err(source) = write_synced(&tmp, content.as_bytes()) {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::Io { path: tmp, source });
        }

        fs::rename(&tmp, &self.path).map_err(|source| {
            let _ = fs::remove_file(&tmp);
            StoreError::Io {
                path: self.path.clone(),
                source,
            }
        })
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_FILE)
    }
}

impl ActivePrinterStore for ConfigStore {
    fn owner_id(&self) -> Option<String> {
        self.get_owner_id()
    }

    fn replace_printer_if_owner(&self, expected_owner: &str, name: &str) -> PrinterReplacement {
        ConfigStore::replace_printer_if_owner(self, expected_owner, name)
    }
}

/// `<dir>/.<file>.<uuid>.tmp`, next to the target so the rename stays on one
/// file system.
fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
    path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()))
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
