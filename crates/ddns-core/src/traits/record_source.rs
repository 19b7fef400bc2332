// # Record Source Trait
//
// Defines the interface for reading what DNS currently publishes for the
// managed hostname.
//
// ## Implementations
//
// - `dig` queries against the zone's server: `ddns-provider-nsupdate` crate

use async_trait::async_trait;
use std::net::{Ipv4Addr, Ipv6Addr};

/// What DNS currently holds for a hostname
///
/// Read fresh on every pass and never cached across passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncRecord {
    /// The queried hostname
    pub hostname: String,
    /// Published A record, if any
    pub ipv4: Option<Ipv4Addr>,
    /// Published AAAA record, if any
    pub ipv6: Option<Ipv6Addr>,
}

impl SyncRecord {
    /// A record with nothing published
    pub fn empty(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ipv4: None,
            ipv6: None,
        }
    }
}

/// Trait for authoritative record lookups
///
/// # Trust Level: Untrusted
///
/// Record sources perform a single query per call, hold no state between
/// calls, and never retry; the reconciliation loop retries on its next pass.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Look up the published A and AAAA records for `hostname`
    ///
    /// # Returns
    ///
    /// - `Ok(SyncRecord)`: Missing records are `None`, not errors
    /// - `Err(Error)`: If the query itself failed
    async fn lookup(&self, hostname: &str) -> Result<SyncRecord, crate::Error>;

    /// Source name (for logging)
    fn source_name(&self) -> &'static str;
}

/// Helper trait for constructing record sources from configuration
pub trait RecordSourceFactory: Send + Sync {
    /// Create a RecordSource instance from configuration
    fn create(
        &self,
        config: &crate::config::RecordSourceConfig,
    ) -> Result<Box<dyn RecordSource>, crate::Error>;
}
