//! Plugin-based provider registry
//!
//! The registry allows update sinks and record sources to be registered
//! dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ddns_core::registry::ProviderRegistry;
//!
//! let registry = ProviderRegistry::new();
//!
//! // Each plugin crate registers its factories
//! ddns_provider_http::register(&registry);
//! ddns_provider_nsupdate::register(&registry);
//!
//! // Create the sink named by the `update` section
//! let sink = registry.create_update_sink(&config.update)?;
//! ```

use crate::config::{RecordSourceConfig, UpdateSinkConfig};
use crate::error::{Error, Result};
use crate::traits::{RecordSource, RecordSourceFactory, UpdateSink, UpdateSinkFactory};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type Factories<F> = RwLock<HashMap<String, Box<F>>>;

fn read<F: ?Sized>(map: &Factories<F>) -> RwLockReadGuard<'_, HashMap<String, Box<F>>> {
    map.read().unwrap_or_else(|p| p.into_inner())
}

fn write<F: ?Sized>(map: &Factories<F>) -> RwLockWriteGuard<'_, HashMap<String, Box<F>>> {
    map.write().unwrap_or_else(|p| p.into_inner())
}

/// Registry of update sink and record source factories
///
/// Maps the `type` (or custom `factory`) name of a configuration section to
/// the factory that builds it.
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    update_sinks: Factories<dyn UpdateSinkFactory>,
    record_sources: Factories<dyn RecordSourceFactory>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an update sink factory
    ///
    /// # Parameters
    ///
    /// - `name`: Sink type name (e.g., "http", "nsupdate")
    /// - `factory`: Factory object for creating sink instances
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use ddns_core::registry::ProviderRegistry;
    /// # use ddns_core::traits::{UpdateSink, UpdateSinkFactory};
    /// # struct MyFactory;
    /// # impl UpdateSinkFactory for MyFactory {
    /// #     fn create(&self, _: &ddns_core::config::UpdateSinkConfig) -> ddns_core::Result<Box<dyn UpdateSink>> { unimplemented!() }
    /// # }
    /// let registry = ProviderRegistry::new();
    /// registry.register_update_sink("mysink", Box::new(MyFactory));
    /// ```
    pub fn register_update_sink(&self, name: impl Into<String>, factory: Box<dyn UpdateSinkFactory>) {
        write(&self.update_sinks).insert(name.into(), factory);
    }

    /// Register a record source factory
    ///
    /// # Parameters
    ///
    /// - `name`: Source type name (e.g., "dig")
    /// - `factory`: Factory object for creating source instances
    pub fn register_record_source(
        &self,
        name: impl Into<String>,
        factory: Box<dyn RecordSourceFactory>,
    ) {
        write(&self.record_sources).insert(name.into(), factory);
    }

    /// Create an update sink from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn UpdateSink>)`: Created sink instance
    /// - `Err(Error::Config)`: If the sink type is not registered
    /// - `Err(Error)`: If the factory rejects the configuration
    pub fn create_update_sink(&self, config: &UpdateSinkConfig) -> Result<Box<dyn UpdateSink>> {
        let sink_type = config.type_name();
        let sinks = read(&self.update_sinks);

        let factory = sinks
            .get(sink_type)
            .ok_or_else(|| Error::config(format!("Unknown update type: {}", sink_type)))?;

        factory.create(config)
    }

    /// Create a record source from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn RecordSource>)`: Created source instance
    /// - `Err(Error::Config)`: If the source type is not registered
    pub fn create_record_source(&self, config: &RecordSourceConfig) -> Result<Box<dyn RecordSource>> {
        let source_type = config.type_name();
        let sources = read(&self.record_sources);

        let factory = sources
            .get(source_type)
            .ok_or_else(|| Error::config(format!("Unknown record source type: {}", source_type)))?;

        factory.create(config)
    }

    /// List all registered update sink types
    pub fn list_update_sinks(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.update_sinks).keys().cloned().collect();
        names.sort();
        names
    }

    /// List all registered record source types
    pub fn list_record_sources(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.record_sources).keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if an update sink type is registered
    pub fn has_update_sink(&self, name: &str) -> bool {
        read(&self.update_sinks).contains_key(name)
    }

    /// Check if a record source type is registered
    pub fn has_record_source(&self, name: &str) -> bool {
        read(&self.record_sources).contains_key(name)
    }
}
