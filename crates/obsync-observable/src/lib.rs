//! obsync observable - dirty-tracked containers and profiles
//!
//! An [`ObservableContainer`] is a key/value map that remembers every
//! mutation as an ordered change record. Owners ship those records as
//! deltas and wipe the log once delivered; peers replay them into mirrors.
//!
//! ```text
//! server                               client
//! ------                               ------
//! set_value / remove
//!   -> entries updated
//!   -> change appended, dirty = true
//! get_updates()  ---- delta bytes ---> apply_updates()
//! clear_updates()                        -> entries updated, log untouched
//! ```
//!
//! An [`ObservableProfile`] groups several observables of different kinds
//! under short keys and packs their deltas into a single frame.
//!
//! # Example
//!
//! ```rust
//! use obsync_observable::{ObservableIntMap, ObservableStringMap};
//!
//! let mut server = ObservableStringMap::new(1);
//! server.set_value("title", Some("Warden".to_string()));
//!
//! let mut client = ObservableStringMap::new(1);
//! client.apply_updates(&server.get_updates()).unwrap();
//! assert_eq!(client.get_value(&"title".to_string()), "Warden");
//!
//! let mut stats = ObservableIntMap::new(2);
//! stats.set_value(10, 250);
//! assert_eq!(stats.get_value(&10), 250);
//! ```

pub mod container;
pub mod error;
pub mod observable;
pub mod profile;

pub use container::{ObservableContainer, ObservableIntMap, ObservableStringMap};
pub use error::{ProfileError, Result};
pub use observable::{Observable, ObservableKey};
pub use profile::ObservableProfile;

pub use obsync_core::{Change, CodecError, Operation, WireError};
