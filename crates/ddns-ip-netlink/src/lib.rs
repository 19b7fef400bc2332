// # Netlink Address Source
//
// This crate provides the Linux implementations of the two host-facing
// collaborators of the reconciler:
//
// - `NetlinkAddressSource`: enumerates every address on every interface with
//   an RTM_GETLINK dump followed by an RTM_GETADDR dump
// - `NetlinkChangeFeed`: subscribes to the link and address multicast groups
//   and turns each kernel notification into a `ChangeEvent`
//
// ## Threading
//
// Sockets are plain blocking `netlink-sys` sockets. Dumps run on tokio's
// blocking pool; the change feed owns a dedicated thread that forwards
// events through an unbounded channel.
//
// ## Platform Support
//
// Netlink is Linux-only. On other platforms both types exist but every call
// returns an error.

#[cfg(target_os = "linux")]
mod parse;
#[cfg(target_os = "linux")]
mod socket;

use ddns_core::address::NetworkAddress;
use ddns_core::traits::{AddressSource, ChangeFeed, ChangeStream};
use ddns_core::{Error, Result};
use tracing::debug;

/// Address source backed by an rtnetlink dump
#[derive(Debug, Default, Clone, Copy)]
pub struct NetlinkAddressSource;

impl NetlinkAddressSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl AddressSource for NetlinkAddressSource {
    #[cfg(target_os = "linux")]
    async fn discover(&self) -> Result<Vec<NetworkAddress>> {
        let addresses = tokio::task::spawn_blocking(socket::dump_addresses)
            .await
            .map_err(|e| Error::address_source(format!("netlink dump task failed: {}", e)))??;
        debug!("Netlink dump returned {} address(es)", addresses.len());
        Ok(addresses)
    }

    #[cfg(not(target_os = "linux"))]
    async fn discover(&self) -> Result<Vec<NetworkAddress>> {
        debug!("Netlink address discovery requested on an unsupported platform");
        Err(Error::address_source(
            "Netlink address discovery is only supported on Linux",
        ))
    }

    fn source_name(&self) -> &'static str {
        "netlink"
    }
}

/// Change feed backed by the rtnetlink multicast groups
#[derive(Debug, Default, Clone, Copy)]
pub struct NetlinkChangeFeed;

impl NetlinkChangeFeed {
    pub fn new() -> Self {
        Self
    }
}

impl ChangeFeed for NetlinkChangeFeed {
    #[cfg(target_os = "linux")]
    fn subscribe(&self) -> Result<ChangeStream> {
        use tokio_stream::wrappers::UnboundedReceiverStream;

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        socket::spawn_listener(tx)?;
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    #[cfg(not(target_os = "linux"))]
    fn subscribe(&self) -> Result<ChangeStream> {
        Err(Error::change_feed(
            "Netlink notifications are only supported on Linux",
        ))
    }
}
