//! Test doubles and common utilities for contract tests
//!
//! Every double is `Clone` and shares its state through `Arc`s, so a test can
//! hand one copy to the reconciler and keep another to steer it and read its
//! counters.

#![allow(dead_code)]

use ddns_core::address::{IFA_F_MANAGETEMPADDR, NetworkAddress};
use ddns_core::config::{DdnsConfig, UpdateSinkConfig};
use ddns_core::error::{Error, Result};
use ddns_core::traits::{
    AddressSource, ChangeEvent, ChangeFeed, ChangeStream, RecordSource, SyncRecord, UpdateSink,
};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Globally routable IPv4
pub const PUBLIC_V4: &str = "85.207.1.2";
/// Global IPv6 with an EUI-64 interface identifier
pub const STABLE_V6: &str = "2a01:4f8:10a:1:211:22ff:fe33:4455";
/// Global IPv6 without an EUI-64 interface identifier
pub const TEMP_V6: &str = "2a01:4f8:10a:1:8d3c:1a2b:3c4d:5e6f";

/// Address on an up interface
pub fn addr(interface: &str, address: &str) -> NetworkAddress {
    addr_with_flags(interface, address, 0)
}

pub fn addr_with_flags(interface: &str, address: &str, flags: u32) -> NetworkAddress {
    let ip: IpAddr = address.parse().expect("test address parses");
    NetworkAddress::new(ip, interface, flags, true)
}

/// Temporary (privacy extension) IPv6 address on an up interface
pub fn temporary(interface: &str, address: &str) -> NetworkAddress {
    addr_with_flags(interface, address, IFA_F_MANAGETEMPADDR)
}

/// An address source returning a settable snapshot
#[derive(Clone, Default)]
pub struct StaticAddressSource {
    snapshot: Arc<Mutex<Vec<NetworkAddress>>>,
    failing: Arc<AtomicBool>,
    discover_calls: Arc<AtomicUsize>,
}

impl StaticAddressSource {
    pub fn new(snapshot: Vec<NetworkAddress>) -> Self {
        let source = Self::default();
        source.set(snapshot);
        source
    }

    pub fn set(&self, snapshot: Vec<NetworkAddress>) {
        *self.snapshot.lock().unwrap() = snapshot;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn discover_calls(&self) -> usize {
        self.discover_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AddressSource for StaticAddressSource {
    async fn discover(&self) -> Result<Vec<NetworkAddress>> {
        self.discover_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::address_source("netlink dump failed"));
        }
        Ok(self.snapshot.lock().unwrap().clone())
    }

    fn source_name(&self) -> &'static str {
        "static"
    }
}

/// An address source whose discovery never completes
pub struct StalledAddressSource;

#[async_trait::async_trait]
impl AddressSource for StalledAddressSource {
    async fn discover(&self) -> Result<Vec<NetworkAddress>> {
        std::future::pending().await
    }

    fn source_name(&self) -> &'static str {
        "stalled"
    }
}

/// A change feed driven by the test through an unbounded channel
///
/// Dropping the sender returned by [`ControlledChangeFeed::new`] ends the
/// stream.
pub struct ControlledChangeFeed {
    rx: Mutex<Option<mpsc::UnboundedReceiver<Result<ChangeEvent>>>>,
    subscribe_calls: Arc<AtomicUsize>,
}

impl ControlledChangeFeed {
    pub fn new() -> (Self, mpsc::UnboundedSender<Result<ChangeEvent>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let feed = Self {
            rx: Mutex::new(Some(rx)),
            subscribe_calls: Arc::new(AtomicUsize::new(0)),
        };
        (feed, tx)
    }

    pub fn subscribe_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.subscribe_calls)
    }
}

impl ChangeFeed for ControlledChangeFeed {
    fn subscribe(&self) -> Result<ChangeStream> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let rx = self
            .rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::change_feed("already subscribed"))?;
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}

/// A record source returning a settable record
#[derive(Clone, Default)]
pub struct MockRecordSource {
    record: Arc<Mutex<SyncRecord>>,
    failing: Arc<AtomicBool>,
    lookup_calls: Arc<AtomicUsize>,
}

impl MockRecordSource {
    pub fn new(ipv4: Option<Ipv4Addr>, ipv6: Option<Ipv6Addr>) -> Self {
        let source = Self::default();
        source.set(ipv4, ipv6);
        source
    }

    pub fn set(&self, ipv4: Option<Ipv4Addr>, ipv6: Option<Ipv6Addr>) {
        let mut record = self.record.lock().unwrap();
        record.ipv4 = ipv4;
        record.ipv6 = ipv6;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RecordSource for MockRecordSource {
    async fn lookup(&self, hostname: &str) -> Result<SyncRecord> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::record_source("SERVFAIL"));
        }
        let mut record = self.record.lock().unwrap().clone();
        record.hostname = hostname.to_string();
        Ok(record)
    }

    fn source_name(&self) -> &'static str {
        "mock"
    }
}

/// One recorded `apply` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkCall {
    pub hostname: String,
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
}

/// An update sink that records every call
#[derive(Clone, Default)]
pub struct MockUpdateSink {
    apply_calls: Arc<AtomicUsize>,
    calls: Arc<Mutex<Vec<SinkCall>>>,
    failing: Arc<AtomicBool>,
}

impl MockUpdateSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A second handle observing the same counters
    pub fn sharing_counters_with(other: &Self) -> Self {
        other.clone()
    }

    pub fn apply_call_count(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl UpdateSink for MockUpdateSink {
    async fn apply(
        &self,
        hostname: &str,
        ipv4: Option<Ipv4Addr>,
        ipv6: Option<Ipv6Addr>,
    ) -> Result<()> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(SinkCall {
            hostname: hostname.to_string(),
            ipv4,
            ipv6,
        });
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::update_sink("HTTP 500"));
        }
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "mock"
    }
}

/// Create a minimal valid configuration for tests
pub fn minimal_config(hostname: &str) -> DdnsConfig {
    DdnsConfig::new(
        hostname,
        UpdateSinkConfig::Custom {
            factory: "mock".to_string(),
            config: serde_json::Value::Object(Default::default()),
        },
    )
}
