//! obsync - observable state replication
//!
//! Umbrella crate re-exporting the workspace members:
//!
//! - [`core`]: wire primitives plus delta, snapshot and text codecs
//! - [`observable`]: dirty-tracked containers and profiles
//! - [`net`]: peer transports and grace-buffered channels
//!
//! [`soak`] drives all three together and backs the `obsync` binary.

pub use obsync_core as core;
pub use obsync_net as net;
pub use obsync_observable as observable;

pub mod soak;
