//! The configuration document persisted by the agent.
//!
//! The document is a single JSON object:
//!
//! ```json
//! {
//!   "activePrinter": "HP-LaserJet",
//!   "ownerId": "partner-42",
//!   "printSettings": { "copies": 2, "duplex": true, "paper": "A4" },
//!   "lastUpdated": 1718000000000
//! }
//! ```
//!
//! # Field rules
//!
//! - `activePrinter` and `ownerId` are always written together by
//!   [`ConfigDocument::set_active_printer`].
//! - `printSettings` entries are upserted one key at a time and never touch
//!   the printer/owner pair.
//! - `lastUpdated` (epoch milliseconds) is stamped by every mutation and never
//!   by a read.
//!
//! Files written by older agents stored the owner under
//! `productionPartnerUserId`; that name is still accepted when reading.
//! Unknown top-level keys are carried through untouched so a newer agent's
//! fields survive a round-trip through an older one.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ── SettingValue ──────────────────────────────────────────────────────────────

/// A scalar print-setting value.
///
/// Settings arrive from the web application as arbitrary JSON.  Booleans and
/// integers keep their JSON type on disk; everything else (floats, nested
/// objects, arrays, `null`) is stored as its JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl SettingValue {
    /// Converts an arbitrary JSON value into a setting, keeping the scalar
    /// type where it is a boolean, an integer, or a string.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Bool(b) => Self::Bool(*b),
            Value::String(s) => Self::Text(s.clone()),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Text(n.to_string()),
            },
            other => Self::Text(other.to_string()),
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

// Reading is lenient: any JSON value is accepted and normalised through
// `from_json`, so a hand-edited float does not make the whole file unreadable.
impl<'de> Deserialize<'de> for SettingValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(|v| Self::from_json(&v))
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for SettingValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

// ── ConfigDocument ────────────────────────────────────────────────────────────

/// The whole persisted configuration.
///
/// `ConfigDocument::default()` is the "absent" document: every field unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDocument {
    /// Name of the selected printer.  Empty means "none configured".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_printer: Option<String>,

    /// Account the printer is registered under.  Opaque to the agent.
    #[serde(
        default,
        alias = "productionPartnerUserId",
        skip_serializing_if = "Option::is_none"
    )]
    pub owner_id: Option<String>,

    /// Free-form print settings, one value per key.
    #[serde(
        default,
        deserialize_with = "settings_or_empty",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub print_settings: BTreeMap<String, SettingValue>,

    /// Epoch milliseconds of the most recent mutation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<i64>,

    /// Top-level keys this version does not know about.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConfigDocument {
    /// Returns `true` when nothing has ever been written to the document.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// The configured printer, treating an empty name as unset.
    pub fn active_printer(&self) -> Option<&str> {
        non_empty(self.active_printer.as_deref())
    }

    /// The configured owner id, treating an empty id as unset.
    pub fn owner_id(&self) -> Option<&str> {
        non_empty(self.owner_id.as_deref())
    }

    /// Sets the printer and owner as one unit and stamps `last_updated`.
    ///
    /// Passing `owner_id = None` clears any previously stored owner; the pair
    /// always reflects the most recent call.
    pub fn set_active_printer(
        &mut self,
        name: impl Into<String>,
        owner_id: Option<String>,
        now_ms: i64,
    ) {
        self.active_printer = Some(name.into());
        self.owner_id = owner_id;
        self.last_updated = Some(now_ms);
    }

    /// Inserts or replaces one print setting and stamps `last_updated`.
    pub fn set_print_setting(
        &mut self,
        key: impl Into<String>,
        value: SettingValue,
        now_ms: i64,
    ) {
        self.print_settings.insert(key.into(), value);
        self.last_updated = Some(now_ms);
    }

    /// Returns a print setting rendered as text.
    pub fn print_setting(&self, key: &str) -> Option<String> {
        self.print_settings.get(key).map(ToString::to_string)
    }
}

/// `printSettings` that is `null` or not an object reads as no settings, so
/// the rest of the document stays usable.
fn settings_or_empty<'de, D>(deserializer: D) -> Result<BTreeMap<String, SettingValue>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| (key.clone(), SettingValue::from_json(value)))
            .collect(),
        _ => BTreeMap::new(),
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
