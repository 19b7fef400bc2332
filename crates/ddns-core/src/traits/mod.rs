//! Collaborator traits for the DDNS client
//!
//! This module defines the interfaces between the core and the outside world.
//!
//! - [`AddressSource`]: Enumerate the host's addresses
//! - [`ChangeFeed`]: Live link/address notifications
//! - [`RecordSource`]: Read the published DNS records
//! - [`UpdateSink`]: Publish new addresses

pub mod address_source;
pub mod change_feed;
pub mod record_source;
pub mod update_sink;

pub use address_source::AddressSource;
pub use change_feed::{ChangeEvent, ChangeFeed, ChangeKind, ChangeStream};
pub use record_source::{RecordSource, RecordSourceFactory, SyncRecord};
pub use update_sink::{UpdateSink, UpdateSinkFactory};
