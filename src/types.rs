// Copyright 2025 Saorsa Labs Limited
//
// Dual-licensed under AGPL-3.0-or-later and a commercial license.

//! Shared types: agent identifiers, cached name records, and the
//! runtime-selectable formatting mode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use uuid::Uuid;

/// Placeholder returned while an identifier is still being resolved.
pub const LOADING_NAME: &str = "Loading...";

/// Fixed string returned for the nil identifier.
pub const UNKNOWN_NAME: &str = "(unknown)";

/// Marker the directory uses for names it could not produce.
pub const INVALID_NAME_MARKER: &str = "???";

/// Legacy last name sentinel for single-word names.
pub const RESIDENT_LAST_NAME: &str = "Resident";

/// Opaque 128-bit agent identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct AgentId(Uuid);

impl AgentId {
    /// Wrap a raw UUID.
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// The zero identifier, never resolved over the network.
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// True for the zero identifier.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Generate a fresh random identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for AgentId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// How cached records are rendered for display.
///
/// Changing the mode never invalidates cached records; it only changes
/// formatting — except that `LegacyOnly` never triggers a display-name
/// network request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum NameMode {
    /// Always the stable `"First Last"` legacy name.
    LegacyOnly = 0,
    /// The user-chosen display name alone.
    DisplayNameOnly = 1,
    /// Display name with the derived user name appended.
    DisplayPlusUserName = 2,
    /// Display name, with the user name appended only when the display
    /// name is not the default.
    SmartDisplay = 3,
}

impl NameMode {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::LegacyOnly,
            1 => Self::DisplayNameOnly,
            2 => Self::DisplayPlusUserName,
            _ => Self::SmartDisplay,
        }
    }
}

impl Default for NameMode {
    fn default() -> Self {
        Self::SmartDisplay
    }
}

/// Shared, atomically-read handle to the current [`NameMode`].
///
/// The mode value is owned by the embedding application; the service only
/// ever reads it at decision points (enqueue, dispatch, format). Clones
/// share the same underlying value.
#[derive(Debug, Clone)]
pub struct ModeSetting(Arc<AtomicU8>);

impl ModeSetting {
    /// Create a handle starting at the given mode.
    pub fn new(mode: NameMode) -> Self {
        Self(Arc::new(AtomicU8::new(mode as u8)))
    }

    /// Read the current mode.
    pub fn get(&self) -> NameMode {
        NameMode::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Replace the current mode.
    pub fn set(&self, mode: NameMode) {
        self.0.store(mode as u8, Ordering::Release);
    }
}

impl Default for ModeSetting {
    fn default() -> Self {
        Self::new(NameMode::default())
    }
}

/// One cached name record per agent identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameRecord {
    /// Unique key; at most one record per identifier in the store.
    pub id: AgentId,
    /// Stable legacy first name.
    pub legacy_first: String,
    /// Stable legacy last name; may be the `"Resident"` sentinel or empty.
    pub legacy_last: String,
    /// User-chosen display name; may equal the legacy name.
    pub display_name: String,
    /// Derived lowercase `first.last` user name.
    pub user_name: String,
    /// True until a non-legacy display name is confirmed.
    pub is_default_display_name: bool,
    /// Timestamp of the last successful resolution; never moves backwards.
    pub updated: DateTime<Utc>,
    /// `None` marks a legacy-name-only record with no display-name data
    /// yet; `Some` carries the refresh-due time stamped by display-name
    /// resolutions.
    pub next_update: Option<DateTime<Utc>>,
}

impl NameRecord {
    /// Build a legacy-only stub from a `"First Last"` pair.
    pub fn from_legacy(
        id: AgentId,
        first: impl Into<String>,
        last: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let legacy_first = first.into();
        let legacy_last = last.into();
        let user_name = derive_user_name(&legacy_first, &legacy_last);
        let mut record = Self {
            id,
            legacy_first,
            legacy_last,
            display_name: String::new(),
            user_name,
            is_default_display_name: true,
            updated: now,
            next_update: None,
        };
        record.display_name = record.legacy_name();
        record
    }

    /// The `"First Last"` legacy name (bare first name when the last name
    /// is empty).
    pub fn legacy_name(&self) -> String {
        if self.legacy_last.is_empty() {
            self.legacy_first.clone()
        } else {
            format!("{} {}", self.legacy_first, self.legacy_last)
        }
    }

    /// Whether a display-name resolution has populated this record.
    pub fn has_display_data(&self) -> bool {
        self.next_update.is_some()
    }

    /// A record is valid only if its display name is non-empty and not a
    /// placeholder. Invalid records are storable but never satisfy a
    /// pending display-name request.
    pub fn is_valid(&self) -> bool {
        !self.display_name.is_empty()
            && self.display_name != INVALID_NAME_MARKER
            && self.display_name != LOADING_NAME
    }
}

/// Derive the lowercase `first.last` user name from a legacy pair.
///
/// Single-word names (empty last name or the `"Resident"` sentinel)
/// collapse to the bare lowercase first name.
pub fn derive_user_name(first: &str, last: &str) -> String {
    let first = first.to_lowercase();
    if last.is_empty() || last.eq_ignore_ascii_case(RESIDENT_LAST_NAME) {
        first
    } else {
        format!("{}.{}", first, last.to_lowercase())
    }
}
