//! Dirty-tracked observable key/value container.
//!
//! Every local mutation is applied to the underlying map and appended to an
//! ordered change log. The owner ships the log as a delta with
//! [`ObservableContainer::get_updates`], or the whole map as a snapshot with
//! [`ObservableContainer::to_bytes`], and clears the log once it has been
//! delivered.
//!
//! Remote deltas are replayed with [`ObservableContainer::apply_updates`] and
//! are never written back into the local change log, so a mirror can relay
//! its own edits without echoing what it received.

use crate::observable::{Observable, ObservableKey};
use bytes::Bytes;
use obsync_core::delta::{self, Change};
use obsync_core::kind::{KeyKind, ValueKind};
use obsync_core::{snapshot, text, Result};
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use tracing::trace;

/// Observable map with string keys and string values.
pub type ObservableStringMap = ObservableContainer<String, String>;

/// Observable map with `i32` keys and `i32` values.
pub type ObservableIntMap = ObservableContainer<i32, i32>;

/// A key/value map that records its mutations as an ordered delta.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObservableContainer<K: KeyKind, V: ValueKind> {
    key: ObservableKey,
    entries: BTreeMap<K, V>,
    changes: Vec<Change<K, V>>,
    dirty: bool,
}

impl<K: KeyKind, V: ValueKind> ObservableContainer<K, V> {
    /// Create an empty container identified by `key` within its owner.
    pub fn new(key: ObservableKey) -> Self {
        Self::with_values(key, BTreeMap::new())
    }

    /// Create a container with initial contents. Initial values are not
    /// recorded as changes.
    pub fn with_values(key: ObservableKey, values: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            key,
            entries: values.into_iter().collect(),
            changes: Vec::new(),
            dirty: false,
        }
    }

    pub fn key(&self) -> ObservableKey {
        self.key
    }

    /// Insert or overwrite `key`.
    ///
    /// For string values the assignment is an `Option`, and `None` removes
    /// the key exactly as [`remove`](Self::remove) would. Other kinds always
    /// store the value.
    pub fn set_value(&mut self, key: impl Into<K>, value: V::Assign) {
        let key = key.into();
        let Some(value) = V::resolve(value) else {
            self.remove(key);
            return;
        };

        self.entries.insert(key.clone(), value.clone());
        self.mark_dirty();
        self.changes.push(Change::Set { key, value });
    }

    /// Remove `key`. Removing an absent key is still recorded.
    pub fn remove(&mut self, key: impl Into<K>) {
        let key = key.into();
        self.entries.remove(&key);
        self.mark_dirty();
        self.changes.push(Change::Remove { key });
    }

    /// The value for `key`, or the kind's default when absent.
    pub fn get_value(&self, key: &K) -> V {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Copy of the current values.
    pub fn values(&self) -> Vec<V> {
        self.entries.values().cloned().collect()
    }

    /// Copy of the current key/value pairs.
    pub fn pairs(&self) -> Vec<(K, V)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Read-only view of the underlying map.
    pub fn entries(&self) -> &BTreeMap<K, V> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pending change records, oldest first.
    pub fn changes(&self) -> &[Change<K, V>] {
        &self.changes
    }

    pub fn pending_updates(&self) -> usize {
        self.changes.len()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Full snapshot of the current contents.
    pub fn to_bytes(&self) -> Bytes {
        snapshot::encode_entries(&self.entries)
    }

    /// Replace the contents with a decoded snapshot. On error nothing changes.
    pub fn from_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.entries = snapshot::decode_entries(data)?;
        Ok(())
    }

    /// JSON snapshot of the current contents.
    pub fn serialize_to_string(&self) -> String {
        text::entries_to_string(&self.entries)
    }

    /// Replace the contents with a parsed JSON snapshot. On error nothing
    /// changes.
    ///
    /// Keys missing from `value` are dropped, the same as with
    /// [`from_bytes`](Self::from_bytes); the text form is not merged into the
    /// existing entries.
    pub fn deserialize_from_string(&mut self, value: &str) -> Result<()> {
        self.entries = text::entries_from_str(value)?;
        Ok(())
    }

    /// Encode the pending change log. The log is left in place.
    pub fn get_updates(&self) -> Bytes {
        delta::encode_changes(&self.changes)
    }

    /// Replay a remote delta.
    ///
    /// The delta is fully decoded before anything is applied, so a corrupt
    /// stream leaves the map untouched. Applied records are not added to the
    /// local change log.
    pub fn apply_updates(&mut self, data: &[u8]) -> Result<()> {
        let changes = delta::decode_changes::<K, V>(data)?;
        trace!(key = self.key, records = changes.len(), "applying delta");

        for change in changes {
            match change {
                Change::Set { key, value } => {
                    self.entries.insert(key, value);
                }
                Change::Remove { key } => {
                    self.entries.remove(&key);
                }
            }
        }

        self.mark_dirty();
        Ok(())
    }

    pub fn clear_updates(&mut self) {
        self.changes.clear();
    }
}

impl<K: KeyKind, V: ValueKind> Observable for ObservableContainer<K, V> {
    fn key(&self) -> ObservableKey {
        self.key
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    fn has_updates(&self) -> bool {
        !self.changes.is_empty()
    }

    fn to_bytes(&self) -> Bytes {
        ObservableContainer::to_bytes(self)
    }

    fn from_bytes(&mut self, data: &[u8]) -> Result<()> {
        ObservableContainer::from_bytes(self, data)
    }

    fn validate_snapshot(&self, data: &[u8]) -> Result<()> {
        snapshot::decode_entries::<K, V>(data).map(|_| ())
    }

    fn to_json(&self) -> Value {
        text::entries_to_json(&self.entries)
    }

    fn serialize_to_string(&self) -> String {
        ObservableContainer::serialize_to_string(self)
    }

    fn deserialize_from_string(&mut self, value: &str) -> Result<()> {
        ObservableContainer::deserialize_from_string(self, value)
    }

    fn get_updates(&self) -> Bytes {
        ObservableContainer::get_updates(self)
    }

    fn apply_updates(&mut self, data: &[u8]) -> Result<()> {
        ObservableContainer::apply_updates(self, data)
    }

    fn validate_updates(&self, data: &[u8]) -> Result<()> {
        delta::decode_changes::<K, V>(data).map(|_| ())
    }

    fn clear_updates(&mut self) {
        self.changes.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
