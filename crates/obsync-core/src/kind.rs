//! Primitive key/value kinds.
//!
//! Each kind is a capability descriptor: it knows its wire encoding, its
//! default for absent keys, its text rendering, and whether it has an
//! absence sentinel that turns a set into a removal. The set of kinds is
//! closed.

use crate::error::WireError;
use crate::wire::{WireReader, WireWriter};
use serde_json::Value;
use std::fmt::Debug;

mod sealed {
    pub trait Sealed {}
}

/// A type that can appear as a key or value in an observable container.
pub trait Primitive:
    sealed::Sealed + Clone + Ord + Default + Debug + Send + Sync + 'static
{
    /// Name used in diagnostics.
    const NAME: &'static str;

    fn encode(&self, writer: &mut WireWriter);

    fn decode(reader: &mut WireReader<'_>) -> Result<Self, WireError>;
}

/// Kinds usable as container keys.
pub trait KeyKind: Primitive {
    /// Field name in the text snapshot.
    fn to_field_name(&self) -> String;

    fn from_field_name(name: &str) -> Option<Self>;
}

/// Kinds usable as container values.
pub trait ValueKind: Primitive {
    /// What `set_value` accepts.
    ///
    /// Kinds with an absence sentinel take `Option<Self>`, where `None`
    /// means "remove". Kinds without one take `Self`.
    type Assign;

    /// `None` when the assignment is the absence sentinel.
    fn resolve(assign: Self::Assign) -> Option<Self>;

    fn to_json(&self) -> Value;

    fn from_json(value: &Value) -> Option<Self>;
}

impl sealed::Sealed for String {}

impl Primitive for String {
    const NAME: &'static str = "string";

    fn encode(&self, writer: &mut WireWriter) {
        writer.write_string(self);
    }

    fn decode(reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        reader.read_string()
    }
}

impl KeyKind for String {
    fn to_field_name(&self) -> String {
        self.clone()
    }

    fn from_field_name(name: &str) -> Option<Self> {
        Some(name.to_owned())
    }
}

impl ValueKind for String {
    type Assign = Option<String>;

    fn resolve(assign: Option<String>) -> Option<Self> {
        assign
    }

    fn to_json(&self) -> Value {
        Value::String(self.clone())
    }

    fn from_json(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_owned)
    }
}

impl sealed::Sealed for bool {}

impl Primitive for bool {
    const NAME: &'static str = "bool";

    fn encode(&self, writer: &mut WireWriter) {
        writer.write_bool(*self);
    }

    fn decode(reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        reader.read_bool()
    }
}

impl KeyKind for bool {
    fn to_field_name(&self) -> String {
        self.to_string()
    }

    fn from_field_name(name: &str) -> Option<Self> {
        name.parse().ok()
    }
}

impl ValueKind for bool {
    type Assign = bool;

    fn resolve(assign: bool) -> Option<Self> {
        Some(assign)
    }

    fn to_json(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_json(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

macro_rules! integer_kind {
    ($ty:ty, $write:ident, $read:ident) => {
        impl sealed::Sealed for $ty {}

        impl Primitive for $ty {
            const NAME: &'static str = stringify!($ty);

            fn encode(&self, writer: &mut WireWriter) {
                writer.$write(*self);
            }

            fn decode(reader: &mut WireReader<'_>) -> Result<Self, WireError> {
                reader.$read()
            }
        }

        impl KeyKind for $ty {
            fn to_field_name(&self) -> String {
                self.to_string()
            }

            fn from_field_name(name: &str) -> Option<Self> {
                name.parse().ok()
            }
        }

        impl ValueKind for $ty {
            type Assign = $ty;

            fn resolve(assign: $ty) -> Option<Self> {
                Some(assign)
            }

            fn to_json(&self) -> Value {
                Value::from(*self)
            }

            fn from_json(value: &Value) -> Option<Self> {
                value.as_i64().and_then(|n| <$ty>::try_from(n).ok())
            }
        }
    };
}

integer_kind!(i16, write_i16, read_i16);
integer_kind!(i32, write_i32, read_i32);
integer_kind!(i64, write_i64, read_i64);
