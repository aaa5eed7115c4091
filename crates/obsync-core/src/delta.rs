//! Binary delta codec.
//!
//! A delta is an ordered list of change records:
//!
//! ```text
//! int32   record count
//! repeat:
//!   uint8 operation      0 = Set, 1 = Remove
//!   <K>   key
//!   <V>   value          Set only
//! ```
//!
//! Decoding is all-or-nothing: the whole stream must parse, with no bytes
//! left over, before any record is handed back.

use crate::error::{CodecError, Result, WireError};
use crate::kind::Primitive;
use crate::wire::{WireReader, WireWriter};
use bytes::Bytes;

/// Operation tag of a change record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Operation {
    Set = 0,
    Remove = 1,
}

impl Operation {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> std::result::Result<Self, WireError> {
        match tag {
            0 => Ok(Operation::Set),
            1 => Ok(Operation::Remove),
            other => Err(WireError::UnknownOperation(other)),
        }
    }
}

/// A single recorded mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Change<K, V> {
    Set { key: K, value: V },
    Remove { key: K },
}

impl<K, V> Change<K, V> {
    pub fn operation(&self) -> Operation {
        match self {
            Change::Set { .. } => Operation::Set,
            Change::Remove { .. } => Operation::Remove,
        }
    }

    pub fn key(&self) -> &K {
        match self {
            Change::Set { key, .. } | Change::Remove { key } => key,
        }
    }
}

/// Encode change records in order.
pub fn encode_changes<K: Primitive, V: Primitive>(changes: &[Change<K, V>]) -> Bytes {
    let mut writer = WireWriter::new();
    writer.write_count(changes.len());

    for change in changes {
        writer.write_u8(change.operation().tag());
        match change {
            Change::Set { key, value } => {
                key.encode(&mut writer);
                value.encode(&mut writer);
            }
            Change::Remove { key } => key.encode(&mut writer),
        }
    }

    writer.into_bytes()
}

/// Decode a delta produced by [`encode_changes`].
pub fn decode_changes<K: Primitive, V: Primitive>(data: &[u8]) -> Result<Vec<Change<K, V>>> {
    read_changes(data).map_err(CodecError::CorruptDelta)
}

fn read_changes<K: Primitive, V: Primitive>(
    data: &[u8],
) -> std::result::Result<Vec<Change<K, V>>, WireError> {
    let mut reader = WireReader::new(data);
    let count = reader.read_count()?;
    let mut changes = Vec::with_capacity(count);

    for _ in 0..count {
        let operation = Operation::from_tag(reader.read_u8()?)?;
        let key = K::decode(&mut reader)?;

        let change = match operation {
            Operation::Remove => Change::Remove { key },
            Operation::Set => Change::Set {
                key,
                value: V::decode(&mut reader)?,
            },
        };
        changes.push(change);
    }

    reader.finish()?;
    Ok(changes)
}
