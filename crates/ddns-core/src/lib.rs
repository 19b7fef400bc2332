// # ddns-core
//
// Core library for the event-driven dynamic DNS client.
//
// ## Architecture Overview
//
// This library decides which of the host's addresses to publish and when:
// - **Scoring / Filter / Selector**: Rank candidate addresses and pick the best per family
// - **ChangeMonitor**: Coalesce link/address notifications into a single trigger
// - **Reconciler**: Compare the selection against DNS and push only on drift
// - **Daemon**: Run the reconciler loop and the monitor side by side
// - **Hooks**: nftables set files and shell commands run when local addresses change
// - **ProviderRegistry**: Plugin-based registry for update sinks and record sources
//
// Collaborators (address enumeration, notification feed, DNS lookup, update
// delivery) are traits in [`traits`], implemented by the plugin crates.
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Decisions live here, I/O lives in plugins
// 2. **Event-Driven**: Notifications set a level-triggered flag checked once per tick
// 3. **Plugin-Based**: Sinks and sources are registered dynamically, no hard-coded if-else
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Idempotency**: A family is only pushed when it drifted from the reference

pub mod address;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod filter;
pub mod hooks;
pub mod monitor;
pub mod registry;
pub mod scoring;
pub mod selector;
pub mod traits;

// Re-export core types for convenience
pub use address::{IpFamily, NetworkAddress, ScoredAddress};
pub use config::{DdnsConfig, HookConfig, RecordSourceConfig, UpdateSinkConfig};
pub use context::ReconciliationContext;
pub use engine::{Daemon, FamilyOutcome, PassOutcome, Reconciler};
pub use error::{Error, Result};
pub use filter::AddressFilter;
pub use monitor::ChangeMonitor;
pub use registry::ProviderRegistry;
pub use selector::{FamilySet, HostAddressState, select_best};
pub use traits::{AddressSource, ChangeEvent, ChangeFeed, ChangeKind, RecordSource, SyncRecord, UpdateSink};
