// # Update Sink Trait
//
// Defines the interface for publishing a hostname's new addresses.
//
// ## Implementations
//
// - HTTP dyndns endpoint: `ddns-provider-http` crate
// - RFC 2136 dynamic update via `nsupdate`: `ddns-provider-nsupdate` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::UpdateSink;
//
// // Publish only the IPv6 address; the A record is left alone.
// sink.apply("host.example.org", None, Some("2a01:4f8::1".parse()?)).await?;
// ```

use async_trait::async_trait;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Trait for update delivery
///
/// The reconciliation loop calls `apply` once per family that drifted, with
/// only that family's address set. A `None` family must be left untouched.
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - Perform one delivery (HTTP request or `nsupdate` run) per call
/// - Parse the delivery's response
///
/// ## Forbidden Capabilities
/// - Retry or back off (the next pass retries)
/// - Keep state between calls
/// - Decide whether an update is needed
#[async_trait]
pub trait UpdateSink: Send + Sync {
    /// Publish the given addresses for `hostname`
    ///
    /// # Parameters
    ///
    /// - `hostname`: The managed hostname
    /// - `ipv4`: New A record value, or `None` to leave it alone
    /// - `ipv6`: New AAAA record value, or `None` to leave it alone
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The update was accepted
    /// - `Err(Error)`: The update failed; the previous baseline is kept
    async fn apply(
        &self,
        hostname: &str,
        ipv4: Option<Ipv4Addr>,
        ipv6: Option<Ipv6Addr>,
    ) -> Result<(), crate::Error>;

    /// Sink name (for logging)
    fn sink_name(&self) -> &'static str;
}

/// Helper trait for constructing update sinks from configuration
pub trait UpdateSinkFactory: Send + Sync {
    /// Create an UpdateSink instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: The `update` section of the configuration file
    ///
    /// # Returns
    ///
    /// A boxed UpdateSink trait object
    fn create(
        &self,
        config: &crate::config::UpdateSinkConfig,
    ) -> Result<Box<dyn UpdateSink>, crate::Error>;
}
