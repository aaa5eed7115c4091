//! Profile: a keyed group of observables replicated together.
//!
//! Deltas and snapshots of the individual properties travel in one frame:
//!
//! ```text
//! int32   section count
//! repeat:
//!   int16  property key
//!   int32  payload length
//!   bytes  payload          delta or snapshot of that property
//! ```
//!
//! Applying a frame is all-or-nothing across properties: every section is
//! checked against its property before any of them is touched.

use crate::container::ObservableContainer;
use crate::error::{ProfileError, Result};
use crate::observable::{Observable, ObservableKey};
use bytes::Bytes;
use obsync_core::kind::{KeyKind, ValueKind};
use obsync_core::{WireError, WireReader, WireWriter};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// A set of observables owned by one session or player.
#[derive(Default)]
pub struct ObservableProfile {
    properties: BTreeMap<ObservableKey, Box<dyn Observable>>,
}

impl ObservableProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`add_property`](Self::add_property).
    pub fn with_property(mut self, property: impl Observable) -> Result<Self> {
        self.add_property(property)?;
        Ok(self)
    }

    pub fn add_property(&mut self, property: impl Observable) -> Result<()> {
        self.add_boxed(Box::new(property))
    }

    pub fn add_boxed(&mut self, property: Box<dyn Observable>) -> Result<()> {
        let key = property.key();
        if self.properties.contains_key(&key) {
            return Err(ProfileError::DuplicateKey(key));
        }
        self.properties.insert(key, property);
        Ok(())
    }

    pub fn property(&self, key: ObservableKey) -> Option<&dyn Observable> {
        self.properties.get(&key).map(|p| p.as_ref())
    }

    pub fn property_mut(&mut self, key: ObservableKey) -> Option<&mut (dyn Observable + 'static)> {
        self.properties.get_mut(&key).map(|p| p.as_mut())
    }

    /// Typed access to a container property.
    pub fn container<K: KeyKind, V: ValueKind>(
        &self,
        key: ObservableKey,
    ) -> Option<&ObservableContainer<K, V>> {
        self.property(key)?.as_any().downcast_ref()
    }

    pub fn container_mut<K: KeyKind, V: ValueKind>(
        &mut self,
        key: ObservableKey,
    ) -> Option<&mut ObservableContainer<K, V>> {
        self.property_mut(key)?.as_any_mut().downcast_mut()
    }

    pub fn keys(&self) -> impl Iterator<Item = ObservableKey> + '_ {
        self.properties.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.properties.values().any(|p| p.is_dirty())
    }

    /// Pack the deltas of every dirty property and reset them.
    ///
    /// Dirty properties have their change log and dirty flag cleared.
    /// Returns `None` when no property has pending changes.
    pub fn collect_updates(&mut self) -> Option<Bytes> {
        let mut sections = Vec::new();

        for (key, property) in self.properties.iter_mut() {
            if !property.is_dirty() {
                continue;
            }
            if property.has_updates() {
                sections.push((*key, property.get_updates()));
                property.clear_updates();
            }
            property.clear_dirty();
        }

        if sections.is_empty() {
            return None;
        }

        debug!(sections = sections.len(), "collected profile updates");
        Some(write_frame(&sections))
    }

    /// Apply a frame produced by [`collect_updates`](Self::collect_updates).
    pub fn apply_updates(&mut self, frame: &[u8]) -> Result<()> {
        let sections = read_frame(frame)?;

        for (key, payload) in &sections {
            let property = self.properties.get(key).ok_or(ProfileError::UnknownKey(*key))?;
            property.validate_updates(payload).map_err(|source| {
                warn!(key, error = %source, "rejecting profile delta");
                ProfileError::Property { key: *key, source }
            })?;
        }

        for (key, payload) in sections {
            if let Some(property) = self.properties.get_mut(&key) {
                property
                    .apply_updates(payload)
                    .map_err(|source| ProfileError::Property { key, source })?;
            }
        }
        Ok(())
    }

    /// Full snapshot of every property.
    pub fn to_bytes(&self) -> Bytes {
        let sections: Vec<_> = self
            .properties
            .iter()
            .map(|(key, property)| (*key, property.to_bytes()))
            .collect();
        write_frame(&sections)
    }

    /// Replace property contents from a frame produced by
    /// [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(&mut self, frame: &[u8]) -> Result<()> {
        let sections = read_frame(frame)?;

        for (key, payload) in &sections {
            let property = self.properties.get(key).ok_or(ProfileError::UnknownKey(*key))?;
            property.validate_snapshot(payload).map_err(|source| {
                warn!(key, error = %source, "rejecting profile snapshot");
                ProfileError::Property { key: *key, source }
            })?;
        }

        for (key, payload) in sections {
            if let Some(property) = self.properties.get_mut(&key) {
                property
                    .from_bytes(payload)
                    .map_err(|source| ProfileError::Property { key, source })?;
            }
        }
        Ok(())
    }

    /// JSON object keyed by the decimal property key.
    pub fn to_json(&self) -> Value {
        let object: Map<String, Value> = self
            .properties
            .iter()
            .map(|(key, property)| (key.to_string(), property.to_json()))
            .collect();
        Value::Object(object)
    }
}

impl std::fmt::Debug for ObservableProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableProfile")
            .field("keys", &self.properties.keys().collect::<Vec<_>>())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

fn write_frame(sections: &[(ObservableKey, Bytes)]) -> Bytes {
    let mut writer = WireWriter::new();
    writer.write_count(sections.len());
    for (key, payload) in sections {
        writer.write_i16(*key);
        writer.write_blob(payload);
    }
    writer.into_bytes()
}

fn read_frame(frame: &[u8]) -> Result<Vec<(ObservableKey, &[u8])>> {
    parse_sections(frame).map_err(ProfileError::CorruptFrame)
}

fn parse_sections(frame: &[u8]) -> std::result::Result<Vec<(ObservableKey, &[u8])>, WireError> {
    let mut reader = WireReader::new(frame);
    let count = reader.read_count()?;
    let mut sections = Vec::with_capacity(count);
    for _ in 0..count {
        let key = reader.read_i16()?;
        let payload = reader.read_blob()?;
        sections.push((key, payload));
    }
    reader.finish()?;
    Ok(sections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{ObservableIntMap, ObservableStringMap};

    const ATTRIBUTES: ObservableKey = 1;
    const INVENTORY: ObservableKey = 2;

    fn profile() -> ObservableProfile {
        ObservableProfile::new()
            .with_property(ObservableStringMap::new(ATTRIBUTES))
            .unwrap()
            .with_property(ObservableIntMap::new(INVENTORY))
            .unwrap()
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut profile = profile();
        assert_eq!(
            profile.add_property(ObservableIntMap::new(ATTRIBUTES)),
            Err(ProfileError::DuplicateKey(ATTRIBUTES))
        );
        assert_eq!(profile.len(), 2);
    }

    #[test]
    fn test_typed_lookup() {
        let mut profile = profile();
        assert!(profile.container::<String, String>(ATTRIBUTES).is_some());
        assert!(profile.container::<i32, i32>(ATTRIBUTES).is_none());

        profile
            .container_mut::<i32, i32>(INVENTORY)
            .unwrap()
            .set_value(100, 3);
        assert!(profile.is_dirty());
    }

    #[test]
    fn test_collect_and_apply_updates() {
        let mut server = profile();
        let mut client = profile();

        server
            .container_mut::<String, String>(ATTRIBUTES)
            .unwrap()
            .set_value("class", Some("ranger".to_string()));
        server
            .container_mut::<i32, i32>(INVENTORY)
            .unwrap()
            .set_value(7, 12);

        let frame = server.collect_updates().unwrap();
        assert!(!server.is_dirty());
        assert_eq!(server.container::<i32, i32>(INVENTORY).unwrap().pending_updates(), 0);
        assert!(server.collect_updates().is_none());

        client.apply_updates(&frame).unwrap();
        assert_eq!(
            client
                .container::<String, String>(ATTRIBUTES)
                .unwrap()
                .get_value(&"class".to_string()),
            "ranger"
        );
        assert_eq!(client.container::<i32, i32>(INVENTORY).unwrap().get_value(&7), 12);
    }

    #[test]
    fn test_mirrored_profile_sends_nothing_back() {
        let mut server = profile();
        let mut client = profile();

        server
            .container_mut::<i32, i32>(INVENTORY)
            .unwrap()
            .set_value(1, 1);
        client.apply_updates(&server.collect_updates().unwrap()).unwrap();

        assert!(client.is_dirty());
        assert!(client.collect_updates().is_none());
        assert!(!client.is_dirty());
    }

    #[test]
    fn test_corrupt_section_applies_nothing() {
        let mut server = profile();
        server
            .container_mut::<String, String>(ATTRIBUTES)
            .unwrap()
            .set_value("a", Some("b".to_string()));

        let good = server
            .container::<String, String>(ATTRIBUTES)
            .unwrap()
            .get_updates();
        let bad = Bytes::from_static(&[0, 0, 0, 1, 9]);
        let frame = write_frame(&[(ATTRIBUTES, good), (INVENTORY, bad)]);

        let mut client = profile();
        let err = client.apply_updates(&frame).unwrap_err();
        assert!(matches!(err, ProfileError::Property { key: INVENTORY, .. }));
        assert!(client.container::<String, String>(ATTRIBUTES).unwrap().is_empty());
        assert!(!client.is_dirty());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let frame = write_frame(&[(99, ObservableIntMap::new(99).get_updates())]);
        let mut client = profile();
        assert_eq!(client.apply_updates(&frame), Err(ProfileError::UnknownKey(99)));
    }

    #[test]
    fn test_truncated_frame_rejected() {
        let mut client = profile();
        assert!(matches!(
            client.apply_updates(&[0, 0, 0, 1, 0]),
            Err(ProfileError::CorruptFrame(_))
        ));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut server = profile();
        server
            .container_mut::<String, String>(ATTRIBUTES)
            .unwrap()
            .set_value("name", Some("Ash".to_string()));
        server
            .container_mut::<i32, i32>(INVENTORY)
            .unwrap()
            .set_value(-1, i32::MIN);

        let mut client = profile();
        client.from_bytes(&server.to_bytes()).unwrap();

        assert_eq!(client.to_json(), server.to_json());
        assert_eq!(client.to_json()["2"]["-1"], Value::from(i32::MIN));
    }
}
