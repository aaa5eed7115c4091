//! obsync core - primitive kinds and wire codecs
//!
//! This crate holds everything an observable container needs to get its
//! state onto the wire and back:
//! - [`kind`]: the closed set of key/value kinds (`String`, `bool`, `i16`,
//!   `i32`, `i64`) and their encoding rules
//! - [`wire`]: big-endian reader/writer with bounds-checked reads
//! - [`delta`]: ordered Set/Remove change records
//! - [`snapshot`]: flat count-prefixed key/value dumps
//! - [`text`]: the JSON snapshot form
//!
//! # Example
//!
//! ```rust
//! use obsync_core::delta::{decode_changes, encode_changes, Change};
//!
//! let changes: Vec<Change<i32, i32>> = vec![
//!     Change::Set { key: 1, value: 10 },
//!     Change::Remove { key: 2 },
//! ];
//! let bytes = encode_changes(&changes);
//! assert_eq!(decode_changes::<i32, i32>(&bytes).unwrap(), changes);
//! ```

pub mod delta;
pub mod error;
pub mod kind;
pub mod snapshot;
pub mod text;
pub mod wire;

pub use delta::{Change, Operation};
pub use error::{CodecError, Result, WireError};
pub use kind::{KeyKind, Primitive, ValueKind};
pub use wire::{WireReader, WireWriter};
