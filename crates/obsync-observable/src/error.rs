//! Error types for profiles.

use crate::observable::ObservableKey;
use obsync_core::{CodecError, WireError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error("property {key}: {source}")]
    Property {
        key: ObservableKey,
        #[source]
        source: CodecError,
    },

    #[error("duplicate property key: {0}")]
    DuplicateKey(ObservableKey),

    #[error("unknown property key: {0}")]
    UnknownKey(ObservableKey),

    #[error("corrupt profile frame: {0}")]
    CorruptFrame(WireError),
}

pub type Result<T> = std::result::Result<T, ProfileError>;
