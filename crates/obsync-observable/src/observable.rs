//! Object-safe view of an observable, used by owners that hold containers of
//! different kinds side by side.

use bytes::Bytes;
use obsync_core::Result;
use serde_json::Value;
use std::any::Any;

/// Identifier of an observable within its owner.
pub type ObservableKey = i16;

/// Replication surface shared by every observable.
pub trait Observable: Send + 'static {
    fn key(&self) -> ObservableKey;

    fn is_dirty(&self) -> bool;

    fn clear_dirty(&mut self);

    /// Whether the change log holds anything to ship.
    fn has_updates(&self) -> bool;

    fn to_bytes(&self) -> Bytes;

    fn from_bytes(&mut self, data: &[u8]) -> Result<()>;

    /// Check that `data` is a snapshot this observable would accept.
    fn validate_snapshot(&self, data: &[u8]) -> Result<()>;

    /// JSON tree of the current contents.
    fn to_json(&self) -> Value;

    fn serialize_to_string(&self) -> String;

    fn deserialize_from_string(&mut self, value: &str) -> Result<()>;

    fn get_updates(&self) -> Bytes;

    fn apply_updates(&mut self, data: &[u8]) -> Result<()>;

    /// Check that `data` is a delta this observable would accept.
    fn validate_updates(&self, data: &[u8]) -> Result<()>;

    fn clear_updates(&mut self);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
