//! Full snapshot codec: a count-prefixed flat key/value dump.

use crate::error::{CodecError, Result, WireError};
use crate::kind::Primitive;
use crate::wire::{WireReader, WireWriter};
use bytes::Bytes;
use std::collections::BTreeMap;

/// Encode every entry of `entries`.
pub fn encode_entries<K: Primitive, V: Primitive>(entries: &BTreeMap<K, V>) -> Bytes {
    let mut writer = WireWriter::new();
    writer.write_count(entries.len());
    for (key, value) in entries {
        key.encode(&mut writer);
        value.encode(&mut writer);
    }
    writer.into_bytes()
}

/// Decode a snapshot into a fresh map. Duplicate keys keep the last value.
pub fn decode_entries<K: Primitive, V: Primitive>(data: &[u8]) -> Result<BTreeMap<K, V>> {
    read_entries(data).map_err(CodecError::CorruptSnapshot)
}

fn read_entries<K: Primitive, V: Primitive>(
    data: &[u8],
) -> std::result::Result<BTreeMap<K, V>, WireError> {
    let mut reader = WireReader::new(data);
    let count = reader.read_count()?;
    let mut entries = BTreeMap::new();

    for _ in 0..count {
        let key = K::decode(&mut reader)?;
        let value = V::decode(&mut reader)?;
        entries.insert(key, value);
    }

    reader.finish()?;
    Ok(entries)
}
